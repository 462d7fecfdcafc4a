//! sapds-odata: OData v2 client plumbing for SAP gateways.
//!
//! Layers, leaves first:
//! - [`Transport`]: the network capability (`get`, `get_link`, `get_text`, `post`)
//! - [`ODataSession`]: the reqwest-backed transport with retry, CSRF, and SAP error extraction
//! - [`MetadataCache`]: lazily parsed `$metadata` per service
//! - [`ODataService`]: paged reads and the generic `query` builder

pub mod error;
pub mod metadata;
pub mod service;
pub mod session;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use error::{ODataError, Result};
pub use metadata::{EntitySetInfo, MetadataCache, ServiceSchema};
pub use service::{
    escape_odata_literal, extract_page, join_csv, or_filter, FieldValidation, ODataService,
    PageStream, QueryOptions,
};
pub use session::ODataSession;
pub use transport::{QueryParams, Transport};
