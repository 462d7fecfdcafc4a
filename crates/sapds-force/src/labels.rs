//! Display name resolution for Force Elements.

use std::collections::BTreeMap;

use sapds_odata::{or_filter, ODataService, QueryParams};
use tracing::warn;

use crate::constants::{ES_FORCE_ELEMENT_TP, ID_FIELD, NAME_FIELDS, NAME_SELECT_COUNT};
use crate::rows::{normalize_ids, parse_rows, ForceElementRow};

/// Resolve names for `ids`, in batches of `chunk_size`.
///
/// Every input ID gets an entry: a failed batch or a record without a name
/// falls back to the ID itself. Never fails.
pub async fn fetch_names_for_ids<I, S>(
    svc: &ODataService,
    ids: I,
    chunk_size: usize,
) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let ids = normalize_ids(ids);
    let mut out = BTreeMap::new();
    if ids.is_empty() {
        return out;
    }

    let select = std::iter::once(ID_FIELD)
        .chain(NAME_FIELDS.iter().copied().take(NAME_SELECT_COUNT))
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
                    let Some(id) = row.id.clone() else {
                        continue;
                    };
                    let name = row.display_name().unwrap_or_else(|| id.clone());
                    out.insert(id, name);
                }
            }
            Err(e) => {
                warn!(batch = batch.len(), status = ?e.status(), error = %e, "name batch failed, using IDs");
                for id in batch {
                    out.entry(id.clone()).or_insert_with(|| id.clone());
                }
            }
        }
    }

    for id in ids {
        out.entry(id.clone()).or_insert(id);
    }
    out
}
