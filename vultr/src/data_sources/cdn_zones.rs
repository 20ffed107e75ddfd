//! CDN zone data sources: the filtered list and the single-zone lookup,
//! for both pull and push zones

use super::{filter_items, read_filters, required_filters, single};
use crate::api::cdn::{CdnZone, ZoneKind};
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

fn zone_fields(kind: ZoneKind) -> Vec<&'static str> {
    match kind {
        ZoneKind::Pull => vec!["id", "label", "origin_domain", "cdn_domain", "date_created", "status"],
        ZoneKind::Push => vec!["id", "label", "cdn_domain", "date_created", "status"],
    }
}

fn zone_values(kind: ZoneKind, zone: &CdnZone) -> Vec<(&'static str, String)> {
    let mut values = vec![
        ("id", zone.id.clone()),
        ("label", zone.label.clone()),
        ("cdn_domain", zone.cdn_url.clone()),
        ("date_created", zone.date_created.clone()),
        ("status", zone.status.clone()),
    ];
    if kind == ZoneKind::Pull {
        values.push(("origin_domain", zone.origin_domain.clone()));
    }
    values
}

fn zone_object(kind: ZoneKind, zone: &CdnZone) -> Dynamic {
    zone_values(kind, zone)
        .into_iter()
        .fold(StateBuilder::new(), |builder, (name, value)| {
            builder.string(name, value)
        })
        .build_object()
}

fn fetch_error(kind: ZoneKind, e: impl std::fmt::Display) -> Diagnostic {
    Diagnostic::error(
        format!("Failed to read CDN {} zones", kind.name()),
        format!("Error getting CDN {} zones: {}", kind.name(), e),
    )
}

/// `vultr_cdn_pull_zones` / `vultr_cdn_push_zones`
pub struct CdnZonesDataSource {
    kind: ZoneKind,
    provider_data: Option<VultrProviderData>,
}

impl CdnZonesDataSource {
    pub fn new(kind: ZoneKind) -> Self {
        Self {
            kind,
            provider_data: None,
        }
    }

    pub fn pull() -> Self {
        Self::new(ZoneKind::Pull)
    }

    pub fn push() -> Self {
        Self::new(ZoneKind::Push)
    }

    fn list_attribute(&self) -> &'static str {
        match self.kind {
            ZoneKind::Pull => "cdn_pull_zones",
            ZoneKind::Push => "cdn_push_zones",
        }
    }
}

#[async_trait]
impl DataSource for CdnZonesDataSource {
    fn type_name(&self) -> &str {
        match self.kind {
            ZoneKind::Pull => "vultr_cdn_pull_zones",
            ZoneKind::Push => "vultr_cdn_push_zones",
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let zone = AttributeType::object(
            zone_fields(self.kind)
                .into_iter()
                .map(|name| (name, AttributeType::String)),
        );

        let schema = SchemaBuilder::new()
            .version(0)
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(self.list_attribute(), AttributeType::List(Box::new(zone)))
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

            let zones = data
                .client
                .cdn()
                .zones(self.kind)
                .list()
                .await
                .map_err(|e| fetch_error(self.kind, e))?;
            let zones = filter_items(zones, filters.as_deref())?;
            tracing::debug!("Found {} CDN {} zones", zones.len(), self.kind.name());

            Ok::<_, Diagnostic>(
                StateBuilder::from_state(&request.config)
                    .string("id", self.list_attribute())
                    .list(
                        self.list_attribute(),
                        zones.iter().map(|z| zone_object(self.kind, z)).collect(),
                    )
                    .build(),
            )
        }
        .await;

        ReadDataSourceResponse::from_result(request.config, result)
    }
}

#[async_trait]
impl DataSourceWithConfigure for CdnZonesDataSource {
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

/// `vultr_cdn_pull_zone` / `vultr_cdn_push_zone`: exactly one zone matching
/// the filters
pub struct CdnZoneDataSource {
    kind: ZoneKind,
    provider_data: Option<VultrProviderData>,
}

impl CdnZoneDataSource {
    pub fn new(kind: ZoneKind) -> Self {
        Self {
            kind,
            provider_data: None,
        }
    }

    pub fn pull() -> Self {
        Self::new(ZoneKind::Pull)
    }

    pub fn push() -> Self {
        Self::new(ZoneKind::Push)
    }
}

#[async_trait]
impl DataSource for CdnZoneDataSource {
    fn type_name(&self) -> &str {
        match self.kind {
            ZoneKind::Pull => "vultr_cdn_pull_zone",
            ZoneKind::Push => "vultr_cdn_push_zone",
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = zone_fields(self.kind)
            .into_iter()
            .fold(SchemaBuilder::new().version(0), |builder, name| {
                builder.attribute(
                    AttributeBuilder::new(name, AttributeType::String)
                        .computed()
                        .build(),
                )
            })
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
            let data = self.provider_data.as_ref().ok_or_else(not_configured)?;
            let filters = required_filters(&request.config)?;

            let zones = data
                .client
                .cdn()
                .zones(self.kind)
                .list()
                .await
                .map_err(|e| fetch_error(self.kind, e))?;
            let zone = single(filter_items(zones, Some(&filters))?)?;

            Ok::<_, Diagnostic>(
                zone_values(self.kind, &zone)
                    .into_iter()
                    .fold(StateBuilder::from_state(&request.config), |builder, (name, value)| {
                        builder.string(name, value)
                    })
                    .build(),
            )
        }
        .await;

        ReadDataSourceResponse::from_result(request.config, result)
    }
}

#[async_trait]
impl DataSourceWithConfigure for CdnZoneDataSource {
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
#[path = "./cdn_zones_test.rs"]
mod cdn_zones_test;
