//! `vultr_invoice_items` data source

use super::{filter_items, read_filters};
use crate::api::billing::InvoiceItem;
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
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue, StateBuilder};

#[derive(Default)]
pub struct InvoiceItemsDataSource {
    provider_data: Option<VultrProviderData>,
}

impl InvoiceItemsDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The configured invoice id; must be a positive whole number
fn invoice_id(config: &DynamicValue) -> Result<i64, Diagnostic> {
    let path = AttributePath::new("invoice_id");
    let invalid = || {
        Diagnostic::error(
            "Invalid invoice_id",
            "invoice_id must be a positive whole number",
        )
        .with_attribute(AttributePath::new("invoice_id"))
    };

    let id = config.get_number(&path).map_err(|_| invalid())?;
    if id < 1.0 || id.fract() != 0.0 {
        return Err(invalid());
    }
    Ok(id as i64)
}

fn item_object(item: &InvoiceItem) -> Dynamic {
    StateBuilder::new()
        .string("description", item.description.clone())
        .string("product", item.product.clone())
        .string("start_date", item.start_date.clone())
        .string("end_date", item.end_date.clone())
        .number("units", item.units as f64)
        .string("unit_type", item.unit_type.clone())
        .number("unit_price", item.unit_price)
        .number("amount", item.total)
        .build_object()
}

#[async_trait]
impl DataSource for InvoiceItemsDataSource {
    fn type_name(&self) -> &str {
        "vultr_invoice_items"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let item = AttributeType::object([
            ("description", AttributeType::String),
            ("product", AttributeType::String),
            ("start_date", AttributeType::String),
            ("end_date", AttributeType::String),
            ("units", AttributeType::Number),
            ("unit_type", AttributeType::String),
            ("unit_price", AttributeType::Number),
            ("amount", AttributeType::Number),
        ]);

        let schema = SchemaBuilder::new()
            .version(0)
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("invoice_id", AttributeType::Number)
                    .description("The invoice ID to get items for")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("invoice_items", AttributeType::List(Box::new(item)))
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
        let mut diagnostics: Vec<Diagnostic> =
            read_filters(&request.config).err().into_iter().collect();

        // Unknown until apply when it comes from another resource
        let path = AttributePath::new("invoice_id");
        if request.config.is_set(&path) {
            diagnostics.extend(invoice_id(&request.config).err());
        }

        ValidateDataSourceConfigResponse { diagnostics }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let result = async {
            let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
            let invoice_id = invoice_id(&request.config)?;
            let filters = read_filters(&request.config)?;

            let items = data
                .client
                .billing()
                .list_invoice_items(invoice_id)
                .await
                .map_err(|e| {
                    Diagnostic::error(
                        "Failed to read invoice items",
                        format!("Error getting invoice items: {}", e),
                    )
                })?;
            let items = filter_items(items, filters.as_deref())?;

            Ok::<_, Diagnostic>(
                StateBuilder::from_state(&request.config)
                    .string("id", invoice_id.to_string())
                    .list("invoice_items", items.iter().map(item_object).collect())
                    .build(),
            )
        }
        .await;

        ReadDataSourceResponse::from_result(request.config, result)
    }
}

#[async_trait]
impl DataSourceWithConfigure for InvoiceItemsDataSource {
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
