//! Service-scoped query client with paging and `$select` validation.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ODataError, Result};
use crate::metadata::MetadataCache;
use crate::transport::{QueryParams, Transport};

/// Escape a string for use inside a single-quoted OData literal.
pub fn escape_odata_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Comma-join trimmed, non-empty items.
pub fn join_csv<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// `field eq 'a' or field eq 'b' ...` with every literal escaped.
pub fn or_filter<S: AsRef<str>>(field: &str, values: &[S]) -> String {
    values
        .iter()
        .map(|v| format!("{field} eq '{}'", escape_odata_literal(v.as_ref())))
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Records and continuation link of one response page.
///
/// Accepts the v2 envelope (`d.results`, `d.__next`) and the flat v4 one
/// (`value`, `@odata.nextLink`).
pub fn extract_page(doc: &Value) -> (Vec<Value>, Option<String>) {
    let nested = doc
        .get("d")
        .and_then(|d| d.get("results"))
        .and_then(Value::as_array)
        .filter(|rows| !rows.is_empty());
    let flat = doc.get("value").and_then(Value::as_array);
    let records = nested.or(flat).cloned().unwrap_or_default();

    let next = doc
        .get("d")
        .and_then(|d| d.get("__next"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            doc.get("@odata.nextLink")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        })
        .map(str::to_string);

    (records, next)
}

// ── Query options ─────────────────────────────────────────────────

/// How requested `$select` fields are checked against `$metadata`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldValidation {
    /// Send fields as given.
    Off,
    /// Drop fields the schema does not know.
    #[default]
    Lenient,
    /// Fail with [`ODataError::UnknownFields`].
    Strict,
}

/// Options for [`ODataService::query`].
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub fields: Vec<String>,
    pub filter: Option<String>,
    pub orderby: Option<String>,
    pub top: Option<usize>,
    pub skip: Option<usize>,
    pub expand: Option<String>,
    pub max_pages: Option<usize>,
    pub sap_client: Option<String>,
    pub validation: FieldValidation,
    pub extra: QueryParams,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn orderby(mut self, orderby: impl Into<String>) -> Self {
        self.orderby = Some(orderby.into());
        self
    }

    pub fn top(mut self, top: usize) -> Self {
        self.top = Some(top);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }

    pub fn max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn sap_client(mut self, sap_client: Option<String>) -> Self {
        self.sap_client = sap_client;
        self
    }

    pub fn validation(mut self, validation: FieldValidation) -> Self {
        self.validation = validation;
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

// ── Service ───────────────────────────────────────────────────────

/// Query client bound to one OData service.
pub struct ODataService {
    transport: Arc<dyn Transport>,
    service: String,
    sap_client: Option<String>,
    meta: MetadataCache,
}

impl ODataService {
    /// Bind to `service`, using the transport's default `sap-client`.
    pub fn new(transport: Arc<dyn Transport>, service: impl Into<String>) -> Self {
        Self::with_sap_client(transport, service, None)
    }

    /// Bind to `service` with an explicit default `sap-client`, falling back
    /// to the transport's.
    pub fn with_sap_client(
        transport: Arc<dyn Transport>,
        service: impl Into<String>,
        sap_client: Option<String>,
    ) -> Self {
        let service = service.into();
        let sap_client =
            sap_client.or_else(|| transport.default_sap_client().map(str::to_string));
        let meta = MetadataCache::new(Arc::clone(&transport), service.clone(), sap_client.clone());
        Self {
            transport,
            service,
            sap_client,
            meta,
        }
    }

    pub fn name(&self) -> &str {
        &self.service
    }

    pub fn sap_client(&self) -> Option<&str> {
        self.sap_client.as_deref()
    }

    pub fn metadata(&self) -> &MetadataCache {
        &self.meta
    }

    fn client<'a>(&'a self, sap_client: Option<&'a str>) -> Option<&'a str> {
        sap_client.or(self.sap_client.as_deref())
    }

    /// Single page read.
    pub async fn read(
        &self,
        entity_set: &str,
        params: &QueryParams,
        sap_client: Option<&str>,
    ) -> Result<Vec<Value>> {
        let doc = self
            .transport
            .get(&self.service, entity_set, params, self.client(sap_client))
            .await?;
        Ok(extract_page(&doc).0)
    }

    /// Lazily page through `entity_set`, following continuation links.
    pub fn iterate(
        &self,
        entity_set: &str,
        params: QueryParams,
        sap_client: Option<&str>,
        max_pages: Option<usize>,
    ) -> PageStream<'_> {
        PageStream {
            service: self,
            entity_set: entity_set.to_string(),
            params,
            sap_client: self.client(sap_client).map(str::to_string),
            max_pages,
            cursor: Cursor::Start,
            seen: HashSet::new(),
            yielded: 0,
        }
    }

    /// All records across pages.
    pub async fn read_all(
        &self,
        entity_set: &str,
        params: QueryParams,
        sap_client: Option<&str>,
        max_pages: Option<usize>,
    ) -> Result<Vec<Value>> {
        let mut stream = self.iterate(entity_set, params, sap_client, max_pages);
        let mut out = Vec::new();
        while let Some(page) = stream.next_page().await? {
            out.extend(page);
        }
        Ok(out)
    }

    /// Build query options into OData parameters and read every page.
    pub async fn query(&self, entity_set: &str, opts: &QueryOptions) -> Result<Vec<Value>> {
        let mut params = opts.extra.clone();

        if !opts.fields.is_empty() {
            let fields = self.checked_fields(entity_set, opts).await?;
            if !fields.is_empty() {
                params.insert("$select".to_string(), join_csv(&fields));
            }
        }
        if let Some(filter) = opts.filter.as_deref().filter(|f| !f.is_empty()) {
            params.insert("$filter".to_string(), filter.to_string());
        }
        if let Some(orderby) = opts.orderby.as_deref().filter(|o| !o.is_empty()) {
            params.insert("$orderby".to_string(), orderby.to_string());
        }
        if let Some(expand) = opts.expand.as_deref().filter(|e| !e.is_empty()) {
            params.insert("$expand".to_string(), expand.to_string());
        }
        if let Some(top) = opts.top {
            params.insert("$top".to_string(), top.to_string());
        }
        if let Some(skip) = opts.skip {
            params.insert("$skip".to_string(), skip.to_string());
        }

        self.read_all(entity_set, params, opts.sap_client.as_deref(), opts.max_pages)
            .await
    }

    async fn checked_fields(&self, entity_set: &str, opts: &QueryOptions) -> Result<Vec<String>> {
        match opts.validation {
            FieldValidation::Off => Ok(opts.fields.clone()),
            FieldValidation::Lenient => {
                let (valid, unknown) = self.meta.validate_select(entity_set, &opts.fields).await?;
                if !unknown.is_empty() {
                    debug!(service = %self.service, entity_set, ?unknown, "dropping unknown $select fields");
                }
                Ok(valid)
            }
            FieldValidation::Strict => {
                let (valid, unknown) = self.meta.validate_select(entity_set, &opts.fields).await?;
                if !unknown.is_empty() {
                    return Err(ODataError::UnknownFields {
                        entity_set: entity_set.to_string(),
                        fields: unknown,
                    });
                }
                Ok(valid)
            }
        }
    }

    pub async fn list_entity_sets(&self) -> Result<Vec<String>> {
        self.meta.entity_sets().await
    }

    pub async fn list_fields(&self, entity_set: &str) -> Result<Vec<String>> {
        self.meta.properties(entity_set).await
    }
}

// ── Paging ────────────────────────────────────────────────────────

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Cursor over the non-empty pages of a collection.
///
/// Stops when no continuation link is returned, when a link repeats, or
/// after `max_pages` non-empty pages. The first non-empty page is always
/// yielded, so `Some(0)` behaves like `Some(1)`. An upstream error ends the stream.
pub struct PageStream<'a> {
    service: &'a ODataService,
    entity_set: String,
    params: QueryParams,
    sap_client: Option<String>,
    max_pages: Option<usize>,
    cursor: Cursor,
    seen: HashSet<String>,
    yielded: usize,
}

impl PageStream<'_> {
    /// Next non-empty page, or `None` when exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Value>>> {
        loop {
            if self.yielded > 0 && self.max_pages.is_some_and(|max| self.yielded >= max) {
                return Ok(None);
            }

            let svc = self.service;
            let doc = match std::mem::replace(&mut self.cursor, Cursor::Done) {
                Cursor::Done => return Ok(None),
                Cursor::Start => {
                    svc.transport
                        .get(
                            &svc.service,
                            &self.entity_set,
                            &self.params,
                            self.sap_client.as_deref(),
                        )
                        .await?
                }
                Cursor::Next(link) => {
                    if !self.seen.insert(link.clone()) {
                        warn!(entity_set = %self.entity_set, link, "continuation link repeated, stopping");
                        return Ok(None);
                    }
                    svc.transport.get_link(&svc.service, &link).await?
                }
            };

            let (records, next) = extract_page(&doc);
            if let Some(link) = next {
                self.cursor = Cursor::Next(link);
            }
            if !records.is_empty() {
                self.yielded += 1;
                return Ok(Some(records));
            }
        }
    }

    /// Pages yielded so far.
    pub fn pages(&self) -> usize {
        self.yielded
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::mock::{results, MockTransport};

    const EDMX: &str = r#"<edmx:Edmx xmlns:edmx="x"><edmx:DataServices><Schema Namespace="NS">
        <EntityType Name="T"><Property Name="ID"/><Property Name="Name"/></EntityType>
        <EntityContainer><EntitySet Name="C_Set" EntityType="NS.T"/></EntityContainer>
    </Schema></edmx:DataServices></edmx:Edmx>"#;

    fn service(mock: MockTransport) -> (Arc<MockTransport>, ODataService) {
        let mock = Arc::new(mock);
        let svc = ODataService::new(mock.clone(), "SVC");
        (mock, svc)
    }

    #[test]
    fn test_escape_odata_literal() {
        assert_eq!(escape_odata_literal("O'Brien"), "O''Brien");
        assert_eq!(escape_odata_literal("a'b'c"), "a''b''c");
        assert_eq!(escape_odata_literal("plain"), "plain");
    }

    #[test]
    fn test_join_csv_and_or_filter() {
        assert_eq!(join_csv(&[" ID ", "", "Name", "  "]), "ID,Name");
        assert_eq!(
            or_filter("ID", &["A", "O'B"]),
            "ID eq 'A' or ID eq 'O''B'"
        );
        assert_eq!(or_filter::<&str>("ID", &[]), "");
    }

    #[test]
    fn test_extract_page_envelopes() {
        let (rows, next) = extract_page(&json!({"d": {"results": [{"ID": 1}], "__next": "n1"}}));
        assert_eq!(rows.len(), 1);
        assert_eq!(next.as_deref(), Some("n1"));

        let (rows, next) = extract_page(&json!({"value": [{"ID": 1}, {"ID": 2}], "@odata.nextLink": "n2"}));
        assert_eq!(rows.len(), 2);
        assert_eq!(next.as_deref(), Some("n2"));

        let (rows, next) = extract_page(&json!({"d": {"ID": "single"}}));
        assert!(rows.is_empty());
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_iterate_follows_links_and_skips_empty_pages() {
        let mock = MockTransport::new()
            .with_json("SVC", "C_Set", json!({"d": {"results": [{"ID": "1"}], "__next": "p2"}}))
            .with_link("p2", json!({"d": {"results": [], "__next": "p3"}}))
            .with_link("p3", json!({"value": [{"ID": "2"}, {"ID": "3"}]}));
        let (mock, svc) = service(mock);

        let rows = svc.read_all("C_Set", QueryParams::new(), None, None).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(mock.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_iterate_stops_on_repeated_link() {
        let mock = MockTransport::new()
            .with_json("SVC", "C_Set", json!({"d": {"results": [{"ID": "1"}], "__next": "loop"}}))
            .with_link("loop", json!({"d": {"results": [{"ID": "2"}], "__next": "loop"}}));
        let (mock, svc) = service(mock);

        let rows = svc.read_all("C_Set", QueryParams::new(), None, None).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(mock.calls_to("loop"), 1);
    }

    #[tokio::test]
    async fn test_iterate_respects_max_pages() {
        let mock = MockTransport::new()
            .with_json("SVC", "C_Set", json!({"d": {"results": [{"ID": "1"}], "__next": "p2"}}))
            .with_link("p2", json!({"d": {"results": [{"ID": "2"}], "__next": "p3"}}));
        let (mock, svc) = service(mock);

        let mut stream = svc.iterate("C_Set", QueryParams::new(), None, Some(1));
        assert!(stream.next_page().await.unwrap().is_some());
        assert!(stream.next_page().await.unwrap().is_none());
        assert_eq!(stream.pages(), 1);
        assert_eq!(mock.calls_to("p2"), 0);

        let first = svc.read_all("C_Set", QueryParams::new(), None, Some(0)).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(mock.calls_to("C_Set"), 2);
        assert_eq!(mock.calls_to("p2"), 0);
    }

    #[tokio::test]
    async fn test_read_propagates_upstream_error() {
        let (_, svc) = service(MockTransport::new().with_failure("SVC", "C_Set", 500));
        let err = svc.read("C_Set", &QueryParams::new(), None).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_sap_client_resolution() {
        let mock = MockTransport::new()
            .with_sap_client("100")
            .with_json("SVC", "C_Set", results(vec![]));
        let mock = Arc::new(mock);

        let svc = ODataService::new(mock.clone(), "SVC");
        assert_eq!(svc.sap_client(), Some("100"));
        svc.read("C_Set", &QueryParams::new(), None).await.unwrap();
        svc.read("C_Set", &QueryParams::new(), Some("300")).await.unwrap();

        let explicit = ODataService::with_sap_client(mock.clone(), "SVC", Some("200".to_string()));
        explicit.read("C_Set", &QueryParams::new(), None).await.unwrap();

        let clients: Vec<_> = mock.calls().into_iter().map(|c| c.sap_client).collect();
        assert_eq!(
            clients,
            vec![
                Some("100".to_string()),
                Some("300".to_string()),
                Some("200".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_query_builds_params_and_drops_unknown_fields() {
        let mock = MockTransport::new()
            .with_text("SVC", "$metadata", EDMX)
            .with_json("SVC", "C_Set", results(vec![json!({"ID": "1"})]));
        let (mock, svc) = service(mock);

        let opts = QueryOptions::new()
            .select(["ID", "Name", "Ghost"])
            .filter("ID eq '1'")
            .orderby("Name")
            .top(10)
            .skip(5)
            .param("search", "x");
        let rows = svc.query("C_Set", &opts).await.unwrap();
        assert_eq!(rows.len(), 1);

        let call = mock.calls().into_iter().find(|c| c.path == "C_Set").unwrap();
        assert_eq!(call.param("$select"), Some("ID,Name"));
        assert_eq!(call.param("$filter"), Some("ID eq '1'"));
        assert_eq!(call.param("$orderby"), Some("Name"));
        assert_eq!(call.param("$top"), Some("10"));
        assert_eq!(call.param("$skip"), Some("5"));
        assert_eq!(call.param("search"), Some("x"));
    }

    #[tokio::test]
    async fn test_query_omits_select_when_every_field_unknown() {
        let mock = MockTransport::new()
            .with_text("SVC", "$metadata", EDMX)
            .with_json("SVC", "C_Set", results(vec![]));
        let (mock, svc) = service(mock);

        svc.query("C_Set", &QueryOptions::new().select(["Ghost"]))
            .await
            .unwrap();
        let call = mock.calls().into_iter().find(|c| c.path == "C_Set").unwrap();
        assert_eq!(call.param("$select"), None);
    }

    #[tokio::test]
    async fn test_strict_query_rejects_unknown_fields() {
        let mock = MockTransport::new().with_text("SVC", "$metadata", EDMX);
        let (mock, svc) = service(mock);

        let opts = QueryOptions::new()
            .select(["ID", "Ghost"])
            .validation(FieldValidation::Strict);
        let err = svc.query("C_Set", &opts).await.unwrap_err();
        assert!(matches!(err, ODataError::UnknownFields { ref fields, .. } if fields == &["Ghost"]));
        assert_eq!(mock.calls_to("C_Set"), 0);
    }

    #[tokio::test]
    async fn test_unvalidated_query_skips_metadata() {
        let mock = MockTransport::new().with_json("SVC", "C_Set", results(vec![]));
        let (mock, svc) = service(mock);

        let opts = QueryOptions::new()
            .select(["Anything"])
            .validation(FieldValidation::Off);
        svc.query("C_Set", &opts).await.unwrap();
        assert_eq!(mock.calls_to("$metadata"), 0);
        assert_eq!(mock.calls()[0].param("$select"), Some("Anything"));
    }

    #[tokio::test]
    async fn test_discovery_helpers() {
        let (_, svc) = service(MockTransport::new().with_text("SVC", "$metadata", EDMX));
        assert_eq!(svc.list_entity_sets().await.unwrap(), vec!["C_Set"]);
        assert_eq!(svc.list_fields("C_Set").await.unwrap(), vec!["ID", "Name"]);
    }
}
