//! The network capability consumed by the query layer.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Query-string parameters, ordered for stable request URLs.
pub type QueryParams = BTreeMap<String, String>;

/// A gateway that can answer OData requests for a named service.
///
/// Implemented by [`crate::ODataSession`] over HTTP and by the scripted
/// in-memory transport used in tests. Implementations own retry, auth, and
/// error surfacing; callers only see documents or [`crate::ODataError`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `{service}/{path}` as JSON. `sap_client` overrides the transport default.
    async fn get(
        &self,
        service: &str,
        path: &str,
        params: &QueryParams,
        sap_client: Option<&str>,
    ) -> Result<Value>;

    /// Follow a continuation link returned in a previous page.
    async fn get_link(&self, service: &str, link: &str) -> Result<Value>;

    /// GET `{service}/{path}` as raw text (used for `$metadata`).
    async fn get_text(&self, service: &str, path: &str, sap_client: Option<&str>)
        -> Result<String>;

    /// POST a JSON entity into `entity_set`.
    async fn post(
        &self,
        service: &str,
        entity_set: &str,
        payload: &Value,
        sap_client: Option<&str>,
    ) -> Result<Value>;

    /// The `sap-client` applied when a call does not override it.
    fn default_sap_client(&self) -> Option<&str>;
}
