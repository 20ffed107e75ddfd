//! `vultr_billing_history` data source

use super::{filter_items, read_filters};
use crate::api::billing::{round_cents, BillingHistory};
use crate::provider_data::{not_configured, VultrProviderData};
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::filter::filter_block;
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, Dynamic, StateBuilder};

#[derive(Default)]
pub struct BillingHistoryDataSource {
    provider_data: Option<VultrProviderData>,
}

impl BillingHistoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn history_object(entry: &BillingHistory) -> Dynamic {
    StateBuilder::new()
        .number("id", entry.id as f64)
        .string("date", entry.date.clone())
        .string("type", entry.entry_type.clone())
        .string("description", entry.description.clone())
        .number("amount", round_cents(entry.amount))
        .number("balance", round_cents(entry.balance))
        .build_object()
}

#[async_trait]
impl DataSource for BillingHistoryDataSource {
    fn type_name(&self) -> &str {
        "vultr_billing_history"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let entry = AttributeType::object([
            ("id", AttributeType::Number),
            ("date", AttributeType::String),
            ("type", AttributeType::String),
            ("description", AttributeType::String),
            ("amount", AttributeType::Number),
            ("balance", AttributeType::Number),
        ]);

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Billing history of the account")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("billing_history", AttributeType::List(Box::new(entry)))
                    .description("Billing entries; amounts are rounded to cents")
                    .computed()
                    .build(),
            )
            .block(filter_block(false))
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: read_filters(&request.config).err().into_iter().collect(),
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let result = async {
            let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
            let filters = read_filters(&request.config)?;

            let history = data.client.billing().list_history().await.map_err(|e| {
                Diagnostic::error(
                    "Failed to read billing history",
                    format!("Error getting billing history: {}", e),
                )
            })?;
            let history = filter_items(history, filters.as_deref())?;

            Ok::<_, Diagnostic>(
                StateBuilder::from_state(&request.config)
                    .string("id", "billing_history")
                    .list("billing_history", history.iter().map(history_object).collect())
                    .build(),
            )
        }
        .await;

        ReadDataSourceResponse::from_result(request.config, result)
    }
}

#[async_trait]
impl DataSourceWithConfigure for BillingHistoryDataSource {
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
    use mockito::{Matcher, Server};
    use std::any::Any;
    use std::sync::Arc;
    use tfplug::filter::FILTER_BLOCK;
    use tfplug::types::{AttributePath, DynamicValue};

    #[tokio::test]
    async fn test_read_follows_cursor_and_rounds_amounts() {
        let mut server = Server::new_async().await;
        let _first = server
            .mock("GET", "/v2/billing/history")
            .match_query(Matcher::Exact("per_page=100".to_string()))
            .with_body(
                r#"{"billing_history":[{"id":1,"date":"2024-01-01","type":"invoice","description":"January","amount":10.456,"balance":-10.456}],
                    "meta":{"total":2,"links":{"next":"abc","prev":""}}}"#,
            )
            .create_async()
            .await;
        let _second = server
            .mock("GET", "/v2/billing/history")
            .match_query(Matcher::Exact("per_page=100&cursor=abc".to_string()))
            .with_body(
                r#"{"billing_history":[{"id":2,"date":"2024-01-05","type":"payment","description":"Card","amount":-10.0,"balance":0.0}],
                    "meta":{"total":2,"links":{"next":"","prev":"abc"}}}"#,
            )
            .create_async()
            .await;

        let mut data_source = BillingHistoryDataSource::new();
        let data: Arc<dyn Any + Send + Sync> = Arc::new(test_provider_data(&server.url()));
        data_source
            .configure(
                Context::new(),
                ConfigureDataSourceRequest {
                    provider_data: Some(data),
                },
            )
            .await;

        let filter = StateBuilder::new()
            .string("name", "type")
            .strings("values", ["invoice"])
            .build_object();
        let config = StateBuilder::new().list(FILTER_BLOCK, vec![filter]).build();

        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "vultr_billing_history".to_string(),
                    config,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let entries = response
            .state
            .get_list(&AttributePath::new("billing_history"))
            .unwrap();
        assert_eq!(entries.len(), 1);
        let entry = DynamicValue::new(entries[0].clone());
        assert_eq!(entry.get_number(&AttributePath::new("amount")).unwrap(), 10.46);
        assert_eq!(entry.get_number(&AttributePath::new("balance")).unwrap(), -10.46);
        assert_eq!(
            response.state.get_string(&AttributePath::new("id")).unwrap(),
            "billing_history"
        );
    }

    #[tokio::test]
    async fn test_unconfigured_read_fails() {
        let response = BillingHistoryDataSource::new()
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "vultr_billing_history".to_string(),
                    config: DynamicValue::empty_object(),
                },
            )
            .await;
        assert_eq!(response.diagnostics[0].summary, "Provider not configured");
    }
}
