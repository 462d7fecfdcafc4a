//! Readiness KPIs and status derivation.

use std::collections::BTreeMap;

use sapds_core::types::{Readiness, ReadinessKpis};
use sapds_odata::{or_filter, ODataService, QueryParams};
use serde_json::Value;
use tracing::warn;

use crate::constants::{ES_FORCE_ELEMENT_TP, ID_FIELD, READINESS_FIELDS};
use crate::rows::{normalize_ids, parse_rows, value_text, ForceElementRow};

/// Integer percentage from a loosely typed KPI value, clamped to `0..=100`.
///
/// Accepts integers, integer strings, and decimals (truncated). Anything
/// else, including null and empty strings, is `None`.
pub fn to_int_pct(value: &Value) -> Option<u8> {
    let number = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))?,
        Value::String(_) => {
            let text = value_text(value)?;
            match text.parse::<i64>() {
                Ok(n) => n,
                Err(_) => text.parse::<f64>().ok().filter(|f| f.is_finite())?.trunc() as i64,
            }
        }
        _ => return None,
    };
    Some(number.clamp(0, 100) as u8)
}

fn kpis(row: &ForceElementRow) -> ReadinessKpis {
    ReadinessKpis {
        material_pct: row.material_pct.as_ref().and_then(to_int_pct),
        personnel_pct: row.personnel_pct.as_ref().and_then(to_int_pct),
        training_pct: row.training_pct.as_ref().and_then(to_int_pct),
    }
}

/// Readiness for each ID found upstream, in batches of `chunk_size`.
///
/// IDs without a record are absent from the result. A failed batch is
/// logged and skipped.
pub async fn fetch_readiness_bulk<I, S>(
    svc: &ODataService,
    ids: I,
    chunk_size: usize,
) -> BTreeMap<String, Readiness>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let ids = normalize_ids(ids);
    let mut out = BTreeMap::new();
    let select = std::iter::once(ID_FIELD)
        .chain(READINESS_FIELDS)
        .collect::<Vec<_>>()
        .join(",");

    for batch in ids.chunks(chunk_size.max(1)) {
        let params = QueryParams::from([
            ("$select".to_string(), select.clone()),
            ("$filter".to_string(), or_filter(ID_FIELD, batch)),
            ("$top".to_string(), batch.len().to_string()),
        ]);

        match svc.read(ES_FORCE_ELEMENT_TP, &params, None).await {
            Ok(rows) => {
                for row in parse_rows::<ForceElementRow>(rows) {
                    if let Some(id) = row.id.clone() {
                        out.insert(id, Readiness::from_kpis(kpis(&row)));
                    }
                }
            }
            Err(e) => warn!(batch = batch.len(), error = %e, "readiness batch failed, skipping"),
        }
    }
    out
}
