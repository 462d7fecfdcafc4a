//! Military symbol code (SIDC) discovery and lookup.
//!
//! The property carrying the symbol code differs between systems, so it is
//! found by probing candidate fields with trial queries. The outcome, found
//! or not, is cached per client and the probe runs at most once.

use std::collections::BTreeMap;

use sapds_odata::{or_filter, ODataService, QueryParams};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::constants::{ES_FORCE_ELEMENT_TP, ID_FIELD, SIDC_FIELD_CANDIDATES};
use crate::rows::{normalize_ids, parse_rows, ForceElementRow};

/// Lazily filled result of the SIDC field probe.
#[derive(Debug, Default)]
pub struct SidcFieldCache {
    field: OnceCell<Option<String>>,
}

impl SidcFieldCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached probe result, probing on first use. Concurrent callers share one probe.
    pub async fn field(&self, svc: &ODataService) -> Option<&str> {
        self.field
            .get_or_init(|| probe_sidc_field(svc))
            .await
            .as_deref()
    }

    /// Whether the probe has already run.
    pub fn is_probed(&self) -> bool {
        self.field.initialized()
    }
}

/// First candidate field that the entity set accepts in `$select`, if any.
///
/// Uncached; use [`SidcFieldCache::field`] for the shared result.
pub async fn probe_sidc_field(svc: &ODataService) -> Option<String> {
    for field in SIDC_FIELD_CANDIDATES {
        let params = QueryParams::from([
            ("$select".to_string(), format!("{ID_FIELD},{field}")),
            ("$top".to_string(), "1".to_string()),
        ]);
        match svc.read(ES_FORCE_ELEMENT_TP, &params, None).await {
            Ok(_) => {
                info!(field, "SIDC field found");
                return Some(field.to_string());
            }
            Err(e) => debug!(field, status = ?e.status(), "SIDC candidate rejected"),
        }
    }
    warn!("no SIDC field found among candidates");
    None
}

/// SIDC per ID, for IDs whose record carries a non-empty code.
///
/// Returns an empty map without querying when no SIDC field exists. A
/// failed batch is logged and skipped.
pub async fn fetch_sidc_bulk<I, S>(
    svc: &ODataService,
    cache: &SidcFieldCache,
    ids: I,
    chunk_size: usize,
) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = BTreeMap::new();
    let ids = normalize_ids(ids);
    if ids.is_empty() {
        return out;
    }
    let Some(field) = cache.field(svc).await else {
        return out;
    };

    for batch in ids.chunks(chunk_size.max(1)) {
        let params = QueryParams::from([
            ("$select".to_string(), format!("{ID_FIELD},{field}")),
            ("$filter".to_string(), or_filter(ID_FIELD, batch)),
            ("$top".to_string(), batch.len().to_string()),
        ]);

        match svc.read(ES_FORCE_ELEMENT_TP, &params, None).await {
            Ok(rows) => {
                for row in parse_rows::<ForceElementRow>(rows) {
                    if let (Some(id), Some(sidc)) = (row.id.clone(), row.text(field)) {
                        out.insert(id, sidc);
                    }
                }
            }
            Err(e) => warn!(batch = batch.len(), field, error = %e, "SIDC batch failed, skipping"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sapds_odata::mock::{results, upstream_error, MockTransport};
    use serde_json::json;

    use super::*;
    use crate::constants::SVC_FORCE_ELEMENT;

    /// Accepts only `accepted` in `$select`, mimicking a 400 for unknown properties.
    fn schema_mock(accepted: &'static str) -> Arc<MockTransport> {
        Arc::new(MockTransport::new().on_get(
            SVC_FORCE_ELEMENT,
            ES_FORCE_ELEMENT_TP,
            move |params| {
                let select = params.get("$select").cloned().unwrap_or_default();
                if select != format!("{ID_FIELD},{accepted}") {
                    return Err(upstream_error(400, "mock://probe"));
                }
                Ok(results(vec![
                    json!({ID_FIELD: "A", accepted: "SFGPUCI----"}),
                    json!({ID_FIELD: "B", accepted: ""}),
                ]))
            },
        ))
    }

    #[tokio::test]
    async fn test_probe_returns_first_accepted_candidate() {
        let mock = schema_mock("MilSymbol");
        let svc = ODataService::new(mock.clone(), SVC_FORCE_ELEMENT);

        assert_eq!(probe_sidc_field(&svc).await.as_deref(), Some("MilSymbol"));
        let position = SIDC_FIELD_CANDIDATES
            .iter()
            .position(|f| *f == "MilSymbol")
            .unwrap();
        assert_eq!(mock.calls().len(), position + 1);
        assert_eq!(mock.calls()[0].param("$top"), Some("1"));
    }

    #[tokio::test]
    async fn test_cache_probes_once_even_when_nothing_found() {
        let mock = Arc::new(MockTransport::new().with_failure(
            SVC_FORCE_ELEMENT,
            ES_FORCE_ELEMENT_TP,
            400,
        ));
        let svc = ODataService::new(mock.clone(), SVC_FORCE_ELEMENT);
        let cache = SidcFieldCache::new();

        assert!(!cache.is_probed());
        assert_eq!(cache.field(&svc).await, None);
        assert_eq!(cache.field(&svc).await, None);
        assert!(cache.is_probed());
        assert_eq!(mock.calls().len(), SIDC_FIELD_CANDIDATES.len());

        let map = fetch_sidc_bulk(&svc, &cache, ["A"], 20).await;
        assert!(map.is_empty());
        assert_eq!(mock.calls().len(), SIDC_FIELD_CANDIDATES.len());
    }

    #[tokio::test]
    async fn test_bulk_uses_cached_field() {
        let mock = schema_mock("SIDC");
        let svc = ODataService::new(mock.clone(), SVC_FORCE_ELEMENT);
        let cache = SidcFieldCache::new();

        let map = fetch_sidc_bulk(&svc, &cache, ["A", "B"], 20).await;
        assert_eq!(
            map,
            BTreeMap::from([("A".to_string(), "SFGPUCI----".to_string())])
        );

        fetch_sidc_bulk(&svc, &cache, ["A"], 20).await;
        // one probe plus two bulk reads
        assert_eq!(mock.calls().len(), 3);
        assert!(mock.calls()[2].param("$filter").is_some());
    }

    #[tokio::test]
    async fn test_empty_ids_skip_probe() {
        let mock = schema_mock("SIDC");
        let svc = ODataService::new(mock.clone(), SVC_FORCE_ELEMENT);
        let cache = SidcFieldCache::new();

        assert!(fetch_sidc_bulk(&svc, &cache, Vec::<String>::new(), 20).await.is_empty());
        assert!(!cache.is_probed());
        assert!(mock.calls().is_empty());
    }
}
