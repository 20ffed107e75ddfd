//! tfplug - Terraform Plugin Framework for Rust
//!
//! The provider-facing half of a Terraform plugin: request-scoped contexts,
//! the dynamic attribute model, schemas, the resource/data source contracts
//! and the helpers providers lean on (state-change waiters, data source
//! filters, import passthrough).

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod data_source;
pub mod provider;
pub mod resource;

// Helper modules
pub mod defaults;
pub mod filter;
pub mod import;
pub mod retry;

// Re-exports for convenience
pub use context::Context;
pub use data_source::{DataSource, DataSourceWithConfigure};
pub use defaults::StaticDefault;
pub use error::{Result, TfplugError};
pub use filter::Filter;
pub use import::import_state_passthrough_id;
pub use provider::Provider;
pub use resource::{Resource, ResourceWithConfigure, ResourceWithImportState};
pub use retry::{Converged, ErrorClass, NotFoundPolicy, StateChangeConf, WaitError};
pub use schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
pub use types::{AttributePath, Diagnostic, Dynamic, DynamicValue, StateBuilder};
