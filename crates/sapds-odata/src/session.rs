//! HTTP session for SAP OData v2 gateways.
//!
//! Handles authentication, `sap-client` injection, retry with exponential
//! backoff, CSRF tokens for writes, and SAP error extraction.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, ETAG, LOCATION,
};
use reqwest::{Client, Method, RequestBuilder, Response};
use sapds_core::config::{ODataAuth, ODataConfig};
use sapds_core::CoreError;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{ODataError, Result};
use crate::transport::{QueryParams, Transport};

/// Statuses worth another attempt.
const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Redirects are never followed; the gateway answering with one is an error.
const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

const CSRF_HEADER: &str = "x-csrf-token";

/// Authenticated HTTP session against one gateway base URL.
///
/// Cheap to share behind an `Arc`; the reqwest client pools connections and
/// keeps the cookie jar that CSRF tokens are bound to.
pub struct ODataSession {
    client: Client,
    base_url: String,
    auth: ODataAuth,
    sap_client: Option<String>,
    retries: u32,
    backoff: Duration,
    csrf_tokens: Mutex<HashMap<String, String>>,
}

impl ODataSession {
    /// Build a session from configuration. Fails on missing base URL or credentials.
    pub fn connect(config: &ODataConfig) -> Result<Self> {
        let auth = config.auth()?;
        let base_url = config.normalized_base_url()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_LANGUAGE, header_value(&config.lang.to_lowercase())?);
        headers.insert(
            HeaderName::from_static("sap-language"),
            header_value(&config.lang.to_uppercase())?,
        );
        headers.insert(
            HeaderName::from_static("dataserviceversion"),
            HeaderValue::from_static("2.0"),
        );
        headers.insert(
            HeaderName::from_static("maxdataserviceversion"),
            HeaderValue::from_static("2.0"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .cookie_store(true)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        debug!(base_url = %base_url, "OData session ready");

        Ok(Self {
            client,
            base_url,
            auth,
            sap_client: config.default_sap_client().map(str::to_string),
            retries: config.retries,
            backoff: Duration::from_millis(config.backoff_ms),
            csrf_tokens: Mutex::new(HashMap::new()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, service: &str, path: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            service.trim_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Absolute links pass through; anything else is relative to the service root.
    fn resolve_link(&self, service: &str, link: &str) -> String {
        if link.starts_with("http://") || link.starts_with("https://") {
            link.to_string()
        } else {
            self.url(service, link)
        }
    }

    fn effective_client<'a>(&'a self, sap_client: Option<&'a str>) -> Option<&'a str> {
        sap_client
            .or(self.sap_client.as_deref())
            .filter(|c| !c.is_empty())
    }

    fn params(
        &self,
        params: &QueryParams,
        sap_client: Option<&str>,
        include_format: bool,
    ) -> QueryParams {
        let mut q = QueryParams::new();
        if include_format {
            q.insert("$format".to_string(), "json".to_string());
        }
        if let Some(client) = self.effective_client(sap_client) {
            q.insert("sap-client".to_string(), client.to_string());
        }
        q.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        q
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.auth {
            ODataAuth::Basic { user, password } => builder.basic_auth(user, Some(password)),
            ODataAuth::Bearer(token) => builder.bearer_auth(token),
        }
    }

    /// Send with retry, then turn error statuses into [`ODataError::Upstream`].
    async fn execute(&self, builder: RequestBuilder, url: &str) -> Result<Response> {
        let attempts = self.retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let request = builder
                .try_clone()
                .ok_or_else(|| ODataError::Decode("request body cannot be cloned".to_string()))?
                .build()?;
            let method = request.method().clone();
            debug!(attempt, %method, url, "sending OData request");

            match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if RETRY_STATUSES.contains(&status) && attempt < attempts {
                        warn!(attempt, status, url, "retryable status, backing off");
                        self.sleep_with_backoff(attempt).await;
                        continue;
                    }
                    return raise_for_error(response, url).await;
                }
                Err(err) => {
                    if attempt < attempts && should_retry_error(&err) {
                        warn!(attempt, url, error = %err, "request failed, backing off");
                        self.sleep_with_backoff(attempt).await;
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
    }

    fn backoff_delay(&self, retry_number: u32) -> Duration {
        let shift = retry_number.saturating_sub(1).min(8);
        self.backoff.saturating_mul(1u32 << shift)
    }

    async fn sleep_with_backoff(&self, retry_number: u32) {
        let delay = self.backoff_delay(retry_number);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// CSRF token for `(service, sap-client)`, fetched once under the lock.
    async fn csrf_token(&self, service: &str, sap_client: Option<&str>) -> Result<String> {
        let client = self.effective_client(sap_client);
        let key = format!("{service}::{}", client.unwrap_or(""));

        let mut tokens = self.csrf_tokens.lock().await;
        if let Some(token) = tokens.get(&key) {
            return Ok(token.clone());
        }

        let url = self.url(service, "$metadata");
        let builder = self
            .request(Method::GET, &url)
            .header(CSRF_HEADER, "Fetch")
            .header(ACCEPT, "application/xml")
            .query(&self.params(&QueryParams::new(), sap_client, false));
        let response = self.execute(builder, &url).await?;

        let token = response
            .headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ODataError::Upstream {
                status: 400,
                body: "Failed to obtain CSRF token".to_string(),
                url: url.clone(),
            })?;

        debug!(service, "CSRF token acquired");
        tokens.insert(key, token.clone());
        Ok(token)
    }
}

#[async_trait]
impl Transport for ODataSession {
    async fn get(
        &self,
        service: &str,
        path: &str,
        params: &QueryParams,
        sap_client: Option<&str>,
    ) -> Result<Value> {
        let url = self.url(service, path);
        let is_metadata = path.trim().eq_ignore_ascii_case("$metadata");

        let mut builder = self
            .request(Method::GET, &url)
            .query(&self.params(params, sap_client, !is_metadata));
        if is_metadata {
            builder = builder.header(ACCEPT, "application/xml");
        }

        let response = self.execute(builder, &url).await?;
        json_or_raw(response).await
    }

    async fn get_link(&self, service: &str, link: &str) -> Result<Value> {
        let url = self.resolve_link(service, link);
        let response = self.execute(self.request(Method::GET, &url), &url).await?;
        json_or_raw(response).await
    }

    async fn get_text(
        &self,
        service: &str,
        path: &str,
        sap_client: Option<&str>,
    ) -> Result<String> {
        let url = self.url(service, path);
        let mut builder = self
            .request(Method::GET, &url)
            .query(&self.params(&QueryParams::new(), sap_client, false));
        if path == "$metadata" || path.ends_with("/$metadata") {
            builder = builder.header(ACCEPT, "application/xml");
        }

        let response = self.execute(builder, &url).await?;
        Ok(response.text().await?)
    }

    async fn post(
        &self,
        service: &str,
        entity_set: &str,
        payload: &Value,
        sap_client: Option<&str>,
    ) -> Result<Value> {
        let token = self.csrf_token(service, sap_client).await?;
        let url = self.url(service, entity_set);
        let builder = self
            .request(Method::POST, &url)
            .query(&self.params(&QueryParams::new(), sap_client, true))
            .header(CSRF_HEADER, token)
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(payload).map_err(|e| ODataError::Decode(e.to_string()))?);

        let response = self.execute(builder, &url).await?;
        let location = header_string(&response, LOCATION);
        let etag = header_string(&response, ETAG);
        let text = response.text().await?;

        Ok(serde_json::from_str(&text)
            .unwrap_or_else(|_| json!({ "location": location, "etag": etag })))
    }

    fn default_sap_client(&self) -> Option<&str> {
        self.sap_client.as_deref()
    }
}

// ── Helpers ───────────────────────────────────────────────────────

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| CoreError::Config(format!("invalid header value {value:?}: {e}")).into())
}

fn header_string(response: &Response, name: HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn should_retry_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

async fn raise_for_error(response: Response, url: &str) -> Result<Response> {
    let status = response.status().as_u16();
    if status < 400 && !REDIRECT_STATUSES.contains(&status) {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    Err(ODataError::Upstream {
        status,
        body: summarize_sap_error(&text).unwrap_or(text),
        url: url.to_string(),
    })
}

/// Condense a SAP error envelope into `code=… | message=… | txid=… | ts=…`.
///
/// Returns `None` when the body is not a recognizable envelope.
pub fn summarize_sap_error(body: &str) -> Option<String> {
    let doc: Value = serde_json::from_str(body).ok()?;
    let err = doc.get("error")?.as_object()?;

    let code = err.get("code").and_then(Value::as_str);
    let message = match err.get("message") {
        Some(Value::Object(m)) => m.get("value").and_then(Value::as_str),
        Some(Value::String(s)) => Some(s.as_str()),
        _ => None,
    };
    let inner = err.get("innererror").or_else(|| err.get("innerError"));
    let txid = inner
        .and_then(|i| i.get("transactionid"))
        .and_then(Value::as_str);
    let ts = inner.and_then(|i| i.get("timestamp")).and_then(Value::as_str);

    let parts: Vec<String> = [("code", code), ("message", message), ("txid", txid), ("ts", ts)]
        .into_iter()
        .filter_map(|(label, value)| {
            value
                .filter(|v| !v.is_empty())
                .map(|v| format!("{label}={v}"))
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" | "))
    }
}

/// Parse a JSON response, or wrap a non-JSON body as `{raw, content_type}`.
async fn json_or_raw(response: Response) -> Result<Value> {
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let text = response.text().await?;

    if content_type.to_lowercase().contains("json") {
        if let Ok(doc) = serde_json::from_str(&text) {
            return Ok(doc);
        }
    }
    Ok(json!({ "raw": text, "content_type": content_type }))
}
