//! Provider trait and the host-side wiring of resource factories
//!
//! The host creates a fresh resource or data source instance per operation
//! through the factories a provider exposes, then hands it the provider data
//! produced by `Provider::configure`.

use crate::context::Context;
use crate::data_source::{ConfigureDataSourceRequest, DataSourceWithConfigure};
use crate::error::{Result, TfplugError};
use crate::resource::{ConfigureResourceRequest, ResourceWithConfigure};
use crate::schema::Schema;
use crate::types::{Diagnostic, DynamicValue};
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

pub type ResourceFactory = fn() -> Box<dyn ResourceWithConfigure>;
pub type DataSourceFactory = fn() -> Box<dyn DataSourceWithConfigure>;

/// Data shared with every resource and data source after configuration
pub type ProviderData = Arc<dyn Any + Send + Sync>;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider type name, the prefix of every resource type name
    fn type_name(&self) -> &str;

    async fn schema(&self, ctx: Context) -> ProviderSchemaResponse;

    /// Validates the provider block and builds the provider data
    async fn configure(
        &mut self,
        ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse;

    fn resources(&self) -> HashMap<String, ResourceFactory>;

    fn data_sources(&self) -> HashMap<String, DataSourceFactory>;
}

pub struct ProviderSchemaResponse {
    pub schema: Schema,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ConfigureProviderRequest {
    pub config: DynamicValue,
}

pub struct ConfigureProviderResponse {
    pub provider_data: Option<ProviderData>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Instantiates `type_name` through the provider's factory and configures it
pub async fn configured_resource(
    ctx: &Context,
    provider: &dyn Provider,
    type_name: &str,
    provider_data: Option<ProviderData>,
) -> Result<Box<dyn ResourceWithConfigure>> {
    let factory = provider
        .resources()
        .get(type_name)
        .copied()
        .ok_or_else(|| TfplugError::UnknownResourceType(type_name.to_string()))?;

    let provider_data = provider_data.ok_or(TfplugError::ProviderNotConfigured)?;
    let mut resource = factory();
    let response = resource
        .configure(
            ctx.clone(),
            ConfigureResourceRequest {
                provider_data: Some(provider_data),
            },
        )
        .await;

    match response.diagnostics.iter().find(|d| d.is_error()) {
        Some(diag) => Err(TfplugError::ConfigureFailed {
            type_name: type_name.to_string(),
            summary: diag.summary.clone(),
        }),
        None => Ok(resource),
    }
}

/// Data source counterpart of [`configured_resource`]
pub async fn configured_data_source(
    ctx: &Context,
    provider: &dyn Provider,
    type_name: &str,
    provider_data: Option<ProviderData>,
) -> Result<Box<dyn DataSourceWithConfigure>> {
    let factory = provider
        .data_sources()
        .get(type_name)
        .copied()
        .ok_or_else(|| TfplugError::UnknownDataSourceType(type_name.to_string()))?;

    let provider_data = provider_data.ok_or(TfplugError::ProviderNotConfigured)?;
    let mut data_source = factory();
    let response = data_source
        .configure(
            ctx.clone(),
            ConfigureDataSourceRequest {
                provider_data: Some(provider_data),
            },
        )
        .await;

    match response.diagnostics.iter().find(|d| d.is_error()) {
        Some(diag) => Err(TfplugError::ConfigureFailed {
            type_name: type_name.to_string(),
            summary: diag.summary.clone(),
        }),
        None => Ok(data_source),
    }
}
