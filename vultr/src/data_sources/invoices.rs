//! `vultr_invoices` and `vultr_invoice` data sources

use super::{filter_items, read_filters, required_filters, single};
use crate::api::billing::Invoice;
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
use tfplug::types::{Diagnostic, StateBuilder};

async fn list_invoices(data: Option<&VultrProviderData>) -> Result<Vec<Invoice>, Diagnostic> {
    let data = data.ok_or_else(not_configured)?;
    data.client.billing().list_invoices().await.map_err(|e| {
        Diagnostic::error(
            "Failed to read invoices",
            format!("Error getting invoices: {}", e),
        )
    })
}

/// Invoice fields shared by the list element and the single lookup
fn invoice_fields(builder: StateBuilder, invoice: &Invoice) -> StateBuilder {
    builder
        .string("date", invoice.date.clone())
        .string("description", invoice.description.clone())
        .number("amount", invoice.amount)
        .number("balance", invoice.balance)
}

#[derive(Default)]
pub struct InvoicesDataSource {
    provider_data: Option<VultrProviderData>,
}

impl InvoicesDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for InvoicesDataSource {
    fn type_name(&self) -> &str {
        "vultr_invoices"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let invoice = AttributeType::object([
            ("id", AttributeType::Number),
            ("date", AttributeType::String),
            ("description", AttributeType::String),
            ("amount", AttributeType::Number),
            ("balance", AttributeType::Number),
        ]);

        let schema = SchemaBuilder::new()
            .version(0)
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("invoices", AttributeType::List(Box::new(invoice)))
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
            let filters = read_filters(&request.config)?;
            let invoices = list_invoices(self.provider_data.as_ref()).await?;
            let invoices = filter_items(invoices, filters.as_deref())?;

            let elements = invoices
                .iter()
                .map(|invoice| {
                    invoice_fields(StateBuilder::new(), invoice)
                        .number("id", invoice.id as f64)
                        .build_object()
                })
                .collect();

            Ok::<_, Diagnostic>(
                StateBuilder::from_state(&request.config)
                    .string("id", "invoices")
                    .list("invoices", elements)
                    .build(),
            )
        }
        .await;

        ReadDataSourceResponse::from_result(request.config, result)
    }
}

#[async_trait]
impl DataSourceWithConfigure for InvoicesDataSource {
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

#[derive(Default)]
pub struct InvoiceDataSource {
    provider_data: Option<VultrProviderData>,
}

impl InvoiceDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for InvoiceDataSource {
    fn type_name(&self) -> &str {
        "vultr_invoice"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("A single invoice selected by filters")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("The invoice ID")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("date", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("amount", AttributeType::Number)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("balance", AttributeType::Number)
                    .computed()
                    .build(),
            )
            .block(filter_block(true))
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
            diagnostics: required_filters(&request.config)
                .err()
                .into_iter()
                .collect(),
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let result = async {
            let filters = required_filters(&request.config)?;
            let invoices = list_invoices(self.provider_data.as_ref()).await?;
            let invoice = single(filter_items(invoices, Some(&filters))?)?;

            Ok::<_, Diagnostic>(
                invoice_fields(StateBuilder::from_state(&request.config), &invoice)
                    .string("id", invoice.id.to_string())
                    .build(),
            )
        }
        .await;

        ReadDataSourceResponse::from_result(request.config, result)
    }
}

#[async_trait]
impl DataSourceWithConfigure for InvoiceDataSource {
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
