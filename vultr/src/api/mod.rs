//! Typed client for the Vultr v2 REST API

pub mod billing;
pub mod block_storage;
pub mod cdn;
pub mod client;
pub mod common;
pub mod error;
pub mod vfs;

pub use client::{Client, RetryConfig, DEFAULT_ENDPOINT};
pub use common::{ListOptions, Meta};
pub use error::ApiError;
