//! Scripted in-memory [`Transport`] for tests.
//!
//! Routes are keyed by `(service, path)`; a handler sees the query parameters
//! and returns a document or an error. Every call is recorded.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{ODataError, Result};
use crate::transport::{QueryParams, Transport};

type Handler = Box<dyn Fn(&QueryParams) -> Result<Value> + Send + Sync>;

/// A request observed by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub service: String,
    /// Entity path, or the full link for continuation requests.
    pub path: String,
    pub params: QueryParams,
    pub sap_client: Option<String>,
}

impl RecordedCall {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

#[derive(Default)]
pub struct MockTransport {
    routes: HashMap<(String, String), Handler>,
    links: HashMap<String, Value>,
    texts: HashMap<(String, String), String>,
    default_client: Option<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sap_client(mut self, client: impl Into<String>) -> Self {
        self.default_client = Some(client.into());
        self
    }

    /// Answer GETs on `(service, path)` with `handler`.
    pub fn on_get<F>(mut self, service: &str, path: &str, handler: F) -> Self
    where
        F: Fn(&QueryParams) -> Result<Value> + Send + Sync + 'static,
    {
        self.routes
            .insert((service.to_string(), path.to_string()), Box::new(handler));
        self
    }

    /// Answer GETs on `(service, path)` with a fixed document.
    pub fn with_json(self, service: &str, path: &str, doc: Value) -> Self {
        self.on_get(service, path, move |_| Ok(doc.clone()))
    }

    /// Answer GETs on `(service, path)` with an upstream error.
    pub fn with_failure(self, service: &str, path: &str, status: u16) -> Self {
        let url = format!("mock://{service}/{path}");
        self.on_get(service, path, move |_| Err(upstream_error(status, &url)))
    }

    /// Answer a continuation link with a fixed document.
    pub fn with_link(mut self, link: &str, doc: Value) -> Self {
        self.links.insert(link.to_string(), doc);
        self
    }

    /// Answer `get_text` on `(service, path)`.
    pub fn with_text(mut self, service: &str, path: &str, text: &str) -> Self {
        self.texts
            .insert((service.to_string(), path.to_string()), text.to_string());
        self
    }

    fn record(&self, service: &str, path: &str, params: &QueryParams, sap_client: Option<&str>) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                service: service.to_string(),
                path: path.to_string(),
                params: params.clone(),
                sap_client: sap_client.map(str::to_string),
            });
        }
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of calls whose path equals `path`.
    pub fn calls_to(&self, path: &str) -> usize {
        self.calls().iter().filter(|c| c.path == path).count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(
        &self,
        service: &str,
        path: &str,
        params: &QueryParams,
        sap_client: Option<&str>,
    ) -> Result<Value> {
        self.record(service, path, params, sap_client);
        match self.routes.get(&(service.to_string(), path.to_string())) {
            Some(handler) => handler(params),
            None => Err(upstream_error(404, &format!("mock://{service}/{path}"))),
        }
    }

    async fn get_link(&self, service: &str, link: &str) -> Result<Value> {
        self.record(service, link, &QueryParams::new(), None);
        self.links
            .get(link)
            .cloned()
            .ok_or_else(|| upstream_error(404, link))
    }

    async fn get_text(
        &self,
        service: &str,
        path: &str,
        sap_client: Option<&str>,
    ) -> Result<String> {
        self.record(service, path, &QueryParams::new(), sap_client);
        self.texts
            .get(&(service.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| upstream_error(404, &format!("mock://{service}/{path}")))
    }

    async fn post(
        &self,
        service: &str,
        entity_set: &str,
        payload: &Value,
        sap_client: Option<&str>,
    ) -> Result<Value> {
        self.record(service, entity_set, &QueryParams::new(), sap_client);
        Ok(json!({ "d": payload }))
    }

    fn default_sap_client(&self) -> Option<&str> {
        self.default_client.as_deref()
    }
}

/// An upstream error as the HTTP session would raise it.
pub fn upstream_error(status: u16, url: &str) -> ODataError {
    ODataError::Upstream {
        status,
        body: format!("mock status {status}"),
        url: url.to_string(),
    }
}

/// Wrap rows in the OData v2 `{"d": {"results": [...]}}` envelope.
pub fn results(rows: Vec<Value>) -> Value {
    json!({ "d": { "results": rows } })
}

/// Literal values compared against `field` in an `F eq 'a' or F eq 'b'` filter.
pub fn filter_values(filter: &str, field: &str) -> Vec<String> {
    let needle = format!("{field} eq '");
    let mut out = Vec::new();
    let mut rest = filter;

    while let Some(pos) = rest.find(&needle) {
        let tail = &rest[pos + needle.len()..];
        let mut value = String::new();
        let mut consumed = tail.len();
        let mut chars = tail.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            if c == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    value.push('\'');
                    chars.next();
                    continue;
                }
                consumed = i + 1;
                break;
            }
            value.push(c);
        }

        out.push(value);
        rest = &tail[consumed..];
    }
    out
}
