//! Google Sheets provider for Hemmer
//!
//! Manages the values of spreadsheet ranges as a `googlespreadsheets_rows`
//! resource and finds the first empty row of a range through the
//! `googlespreadsheets_find_empty_row` data source. The provider runs as a
//! subprocess and speaks the `hemmer.provider.v1` gRPC protocol.
//!
//! # Overview
//!
//! - **Provider**: [`GoogleSpreadsheetsProvider`] implements [`ProviderService`]
//! - **Sheets client**: the [`sheets::SheetsApi`] seam, with a `google-sheets4`
//!   backend wrapped in logging and retry layers
//! - **Resources**: [`rows`] and [`find_empty_row`]
//! - **Configuration**: credentials and environment fallbacks in [`config`]
//! - **Server**: [`serve`] prints the handshake and serves gRPC until signalled
//!
//! # Quick Start
//!
//! ```ignore
//! use googlespreadsheets_provider::{init_logging, serve, GoogleSpreadsheetsProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!     serve(GoogleSpreadsheetsProvider::new()).await
//! }
//! ```
//!
//! # Handshake Protocol
//!
//! Once listening, the provider prints one line to stdout:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `HEMMER_PROVIDER|<protocol_version>|<address>`. Logs go to stderr.

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod find_empty_row;
pub mod logging;
pub mod provider;
pub mod rows;
pub mod schema;
pub mod server;
pub mod sheets;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use error::ProviderError;
pub use logging::{init_logging, try_init_logging};
pub use provider::{GoogleConnector, GoogleSpreadsheetsProvider, SheetsConnector};
pub use schema::ProviderSchema;
pub use server::{
    serve, serve_on, serve_on_with_options, serve_with_options, serve_with_shutdown,
    ProviderService, ServeOptions,
};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::{validate, validate_result};

pub use async_trait::async_trait;
