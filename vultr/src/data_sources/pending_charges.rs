//! `vultr_pending_charges` data source

use crate::api::billing::round_cents;
use crate::provider_data::{not_configured, VultrProviderData};
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, StateBuilder};

#[derive(Default)]
pub struct PendingChargesDataSource {
    provider_data: Option<VultrProviderData>,
}

impl PendingChargesDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for PendingChargesDataSource {
    fn type_name(&self) -> &str {
        "vultr_pending_charges"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("pending_charges", AttributeType::Number)
                    .description("Charges accrued since the last invoice")
                    .computed()
                    .build(),
            )
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let data = match self.provider_data.as_ref().ok_or_else(not_configured) {
            Ok(data) => data,
            Err(diag) => return ReadDataSourceResponse::failed(request.config, diag),
        };

        let result = data
            .client
            .billing()
            .pending_charges()
            .await
            .map(|items| {
                let total: f64 = items.iter().map(|item| item.total).sum();
                StateBuilder::from_state(&request.config)
                    .string("id", "pending_charges")
                    .number("pending_charges", round_cents(total))
                    .build()
            })
            .map_err(|e| {
                Diagnostic::error(
                    "Failed to read pending charges",
                    format!("Error getting pending charges: {}", e),
                )
            });

        ReadDataSourceResponse::from_result(request.config, result)
    }
}

#[async_trait]
impl DataSourceWithConfigure for PendingChargesDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        let mut diagnostics = vec![];

        match VultrProviderData::from_configure(request.provider_data) {
            Ok(data) => self.provider_data = Some(data),
            Err(diag) => diagnostics.push(diag),
        }

        ConfigureDataSourceResponse { diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider_data::test_provider_data;
    use mockito::Server;
    use std::any::Any;
    use std::sync::Arc;
    use tfplug::types::{AttributePath, DynamicValue};

    async fn read_against(body: &str, status: usize) -> ReadDataSourceResponse {
        let mut server = Server::new_async().await;
        let _charges = server
            .mock("GET", "/v2/billing/pending-charges")
            .with_status(status)
            .with_body(body)
            .create_async()
            .await;

        let mut data_source = PendingChargesDataSource::new();
        let data: Arc<dyn Any + Send + Sync> = Arc::new(test_provider_data(&server.url()));
        data_source
            .configure(
                Context::new(),
                ConfigureDataSourceRequest {
                    provider_data: Some(data),
                },
            )
            .await;

        data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "vultr_pending_charges".to_string(),
                    config: DynamicValue::empty_object(),
                },
            )
            .await
    }

    #[tokio::test]
    async fn test_sums_totals_rounded_to_cents() {
        let response = read_against(
            r#"{"pending_charges":[{"description":"Cloud Compute","total":1.234},{"description":"Block Storage","total":2.2}]}"#,
            200,
        )
        .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(
            response
                .state
                .get_number(&AttributePath::new("pending_charges"))
                .unwrap(),
            3.43
        );
        assert_eq!(
            response.state.get_string(&AttributePath::new("id")).unwrap(),
            "pending_charges"
        );
    }

    #[tokio::test]
    async fn test_no_charges_is_zero() {
        let response = read_against(r#"{"pending_charges":[]}"#, 200).await;
        assert_eq!(
            response
                .state
                .get_number(&AttributePath::new("pending_charges"))
                .unwrap(),
            0.0
        );
    }

    #[tokio::test]
    async fn test_api_error_surfaces() {
        let response = read_against(r#"{"error":"Forbidden","status":403}"#, 403).await;
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Failed to read pending charges");
    }
}
