//! Data source contract
//!
//! Data sources are read-only: the host validates the configuration during
//! plan and calls `read` to fill in every computed attribute.

use crate::context::Context;
use crate::schema::Schema;
use crate::types::{Diagnostic, DynamicValue};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Type name should be constant (e.g., "vultr_invoices")
    /// MUST match the key used in Provider.data_sources()
    fn type_name(&self) -> &str;

    async fn metadata(
        &self,
        _ctx: Context,
        _request: DataSourceMetadataRequest,
    ) -> DataSourceMetadataResponse {
        DataSourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        ctx: Context,
        request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse;

    /// Plan-time checks. Values may still be unknown here.
    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: vec![],
        }
    }

    /// MUST populate all computed attributes in response.state
    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse;
}

pub struct DataSourceMetadataRequest;

pub struct DataSourceMetadataResponse {
    pub type_name: String,
}

pub struct DataSourceSchemaRequest;

pub struct DataSourceSchemaResponse {
    pub schema: Schema,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ValidateDataSourceConfigRequest {
    pub type_name: String,
    pub config: DynamicValue,
}

pub struct ValidateDataSourceConfigResponse {
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ReadDataSourceRequest {
    pub type_name: String,
    pub config: DynamicValue,
}

pub struct ReadDataSourceResponse {
    pub state: DynamicValue,
    pub diagnostics: Vec<Diagnostic>,
}

impl ReadDataSourceResponse {
    /// A failed read hands the configuration back untouched
    pub fn failed(config: DynamicValue, diagnostic: Diagnostic) -> Self {
        Self {
            state: config,
            diagnostics: vec![diagnostic],
        }
    }

    pub fn from_result(config: DynamicValue, result: Result<DynamicValue, Diagnostic>) -> Self {
        match result {
            Ok(state) => Self {
                state,
                diagnostics: vec![],
            },
            Err(diagnostic) => Self::failed(config, diagnostic),
        }
    }
}

/// Called right after the factory builds the data source, before any read
#[async_trait]
pub trait DataSourceWithConfigure: DataSource {
    async fn configure(
        &mut self,
        ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse;
}

pub struct ConfigureDataSourceRequest {
    pub provider_data: Option<Arc<dyn Any + Send + Sync>>,
}

pub struct ConfigureDataSourceResponse {
    pub diagnostics: Vec<Diagnostic>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaBuilder;
    use crate::types::{AttributePath, StateBuilder};

    struct Fixed;

    #[async_trait]
    impl DataSource for Fixed {
        fn type_name(&self) -> &str {
            "test_fixed"
        }

        async fn schema(
            &self,
            _ctx: Context,
            _request: DataSourceSchemaRequest,
        ) -> DataSourceSchemaResponse {
            DataSourceSchemaResponse {
                schema: SchemaBuilder::new().build(),
                diagnostics: vec![],
            }
        }

        async fn read(
            &self,
            _ctx: Context,
            request: ReadDataSourceRequest,
        ) -> ReadDataSourceResponse {
            ReadDataSourceResponse::from_result(
                request.config,
                Ok(StateBuilder::new().string("id", "fixed").build()),
            )
        }
    }

    #[tokio::test]
    async fn defaults_report_type_name_and_accept_any_config() {
        let metadata = Fixed.metadata(Context::new(), DataSourceMetadataRequest).await;
        assert_eq!(metadata.type_name, "test_fixed");

        let validated = Fixed
            .validate(
                Context::new(),
                ValidateDataSourceConfigRequest {
                    type_name: "test_fixed".to_string(),
                    config: DynamicValue::empty_object(),
                },
            )
            .await;
        assert!(validated.diagnostics.is_empty());
    }

    #[test]
    fn failed_read_echoes_config() {
        let config = StateBuilder::new().string("label", "web").build();
        let response = ReadDataSourceResponse::from_result(
            config,
            Err(Diagnostic::error("No results", "nothing matched")),
        );

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(
            response.state.get_string(&AttributePath::new("label")).unwrap(),
            "web"
        );
    }
}
