use thiserror::Error;

/// Maximum number of body characters rendered in an upstream error message.
pub const BODY_SNIPPET_CHARS: usize = 1200;

/// Errors from the OData transport, metadata, and query layers.
#[derive(Error, Debug)]
pub enum ODataError {
    /// Non-success or redirect response from the gateway. `body` holds the full text.
    #[error("HTTP {status} for {url}: {}", snippet(.body))]
    Upstream {
        status: u16,
        body: String,
        url: String,
    },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Unknown fields for {entity_set}: {}", .fields.join(", "))]
    UnknownFields {
        entity_set: String,
        fields: Vec<String>,
    },

    #[error("Unexpected response shape: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(#[from] sapds_core::CoreError),
}

impl ODataError {
    /// HTTP status of an upstream error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_CHARS).collect()
}

pub type Result<T> = std::result::Result<T, ODataError>;
