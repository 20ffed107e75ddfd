//! Terraform provider for Vultr storage, CDN and billing

pub mod api;
pub mod data_sources;
pub mod provider_data;
pub mod resources;

pub use provider_data::VultrProviderData;

use api::{Client, RetryConfig, DEFAULT_ENDPOINT};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::DataSourceWithConfigure;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderSchemaResponse, ResourceFactory,
};
use tfplug::resource::ResourceWithConfigure;
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

pub const API_KEY_ENV: &str = "VULTR_API_KEY";
pub const ENDPOINT_ENV: &str = "VULTR_API_ENDPOINT";
pub const RETRY_LIMIT_ENV: &str = "VULTR_RETRY_LIMIT";

#[derive(Default)]
pub struct VultrProvider {
    provider_data: Option<VultrProviderData>,
}

impl VultrProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider data from the last successful `configure`
    pub fn provider_data(&self) -> Option<&VultrProviderData> {
        self.provider_data.as_ref()
    }
}

/// A string from the provider block, falling back to the environment
fn string_setting(config: &DynamicValue, name: &str, env: &str) -> Option<String> {
    config
        .get_string(&AttributePath::new(name))
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| std::env::var(env).ok().filter(|v| !v.is_empty()))
}

fn retry_limit(config: &DynamicValue) -> Result<u32, Diagnostic> {
    let invalid = |value: String| {
        Diagnostic::error(
            "Invalid retry_limit",
            format!("retry_limit must be a non-negative whole number, got {}", value),
        )
        .with_attribute(AttributePath::new("retry_limit"))
    };

    if let Ok(limit) = config.get_number(&AttributePath::new("retry_limit")) {
        if limit < 0.0 || limit.fract() != 0.0 || limit > u32::MAX as f64 {
            return Err(invalid(limit.to_string()));
        }
        return Ok(limit as u32);
    }

    match std::env::var(RETRY_LIMIT_ENV) {
        Ok(value) if !value.is_empty() => value.trim().parse::<u32>().map_err(|_| invalid(value)),
        _ => Ok(RetryConfig::default().max_retries),
    }
}

fn resource<R: ResourceWithConfigure + 'static>(resource: R) -> Box<dyn ResourceWithConfigure> {
    Box::new(resource)
}

fn data_source<D: DataSourceWithConfigure + 'static>(
    data_source: D,
) -> Box<dyn DataSourceWithConfigure> {
    Box::new(data_source)
}

#[async_trait]
impl Provider for VultrProvider {
    fn type_name(&self) -> &str {
        "vultr"
    }

    async fn schema(&self, _ctx: Context) -> ProviderSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .attribute(
                AttributeBuilder::new("api_key", AttributeType::String)
                    .description("Vultr API key; defaults to the VULTR_API_KEY environment variable")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("endpoint", AttributeType::String)
                    .description("Vultr API endpoint; defaults to https://api.vultr.com")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("retry_limit", AttributeType::Number)
                    .description("How many times a rate limited or failed request is retried")
                    .optional()
                    .build(),
            )
            .build();

        ProviderSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let mut diagnostics = vec![];
        let config = &request.config;

        let api_key = string_setting(config, "api_key", API_KEY_ENV);
        let endpoint = string_setting(config, "endpoint", ENDPOINT_ENV)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let max_retries = match retry_limit(config) {
            Ok(limit) => limit,
            Err(diag) => {
                diagnostics.push(diag);
                return ConfigureProviderResponse {
                    provider_data: None,
                    diagnostics,
                };
            }
        };

        let Some(api_key) = api_key else {
            diagnostics.push(
                Diagnostic::error(
                    "Missing API key",
                    format!(
                        "api_key is required (set in provider config or {} env var)",
                        API_KEY_ENV
                    ),
                )
                .with_attribute(AttributePath::new("api_key")),
            );
            return ConfigureProviderResponse {
                provider_data: None,
                diagnostics,
            };
        };

        let retry_config = RetryConfig {
            max_retries,
            ..RetryConfig::default()
        };

        match Client::with_config(&endpoint, &api_key, retry_config) {
            Ok(client) => {
                tracing::info!("Configured Vultr provider for {}", endpoint);
                let data = VultrProviderData::new(client);
                self.provider_data = Some(data.clone());
                ConfigureProviderResponse {
                    provider_data: Some(Arc::new(data)),
                    diagnostics,
                }
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create API client",
                    e.to_string(),
                ));
                ConfigureProviderResponse {
                    provider_data: None,
                    diagnostics,
                }
            }
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
        factories.insert("vultr_block_storage".to_string(), || {
            resource(resources::BlockStorageResource::new())
        });
        factories.insert("vultr_virtual_file_system_storage".to_string(), || {
            resource(resources::VirtualFileSystemStorageResource::new())
        });
        factories.insert("vultr_cdn_pull_zone".to_string(), || {
            resource(resources::CdnZoneResource::pull())
        });
        factories.insert("vultr_cdn_push_zone".to_string(), || {
            resource(resources::CdnZoneResource::push())
        });
        factories
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut factories: HashMap<String, DataSourceFactory> = HashMap::new();
        factories.insert("vultr_cdn_pull_zones".to_string(), || {
            data_source(data_sources::CdnZonesDataSource::pull())
        });
        factories.insert("vultr_cdn_pull_zone".to_string(), || {
            data_source(data_sources::CdnZoneDataSource::pull())
        });
        factories.insert("vultr_cdn_push_zones".to_string(), || {
            data_source(data_sources::CdnZonesDataSource::push())
        });
        factories.insert("vultr_cdn_push_zone".to_string(), || {
            data_source(data_sources::CdnZoneDataSource::push())
        });
        factories.insert("vultr_billing_history".to_string(), || {
            data_source(data_sources::BillingHistoryDataSource::new())
        });
        factories.insert("vultr_invoices".to_string(), || {
            data_source(data_sources::InvoicesDataSource::new())
        });
        factories.insert("vultr_invoice".to_string(), || {
            data_source(data_sources::InvoiceDataSource::new())
        });
        factories.insert("vultr_invoice_items".to_string(), || {
            data_source(data_sources::InvoiceItemsDataSource::new())
        });
        factories.insert("vultr_pending_charges".to_string(), || {
            data_source(data_sources::PendingChargesDataSource::new())
        });
        factories
    }
}
