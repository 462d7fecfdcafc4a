//! sapds-core: Shared types, configuration, and error handling for the SAP D&S data client.
//!
//! This crate provides the foundational pieces used by the OData transport
//! and the Force Element graph engine:
//! - Graph, tree, and enrichment payload types
//! - Layered configuration (`sapds.toml` plus `SAPDS__` environment overrides)
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, ForceElementConfig, ODataAuth, ODataConfig};
pub use error::{CoreError, Result};
