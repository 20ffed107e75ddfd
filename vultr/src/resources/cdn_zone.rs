//! CDN pull and push zone resources
//!
//! Both zone kinds share one implementation; a pull zone additionally
//! tracks the origin domain it mirrors.

use super::{state_id, state_with_id, string_attr};
use crate::api::cdn::{CdnZone, CdnZoneRequest, ZoneKind, ZonesApi};
use crate::api::ApiError;
use crate::provider_data::{not_configured, VultrProviderData};
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue, StateBuilder};

pub struct CdnZoneResource {
    kind: ZoneKind,
    provider_data: Option<VultrProviderData>,
}

impl CdnZoneResource {
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

    fn provider_data(&self) -> Result<&VultrProviderData, Diagnostic> {
        self.provider_data.as_ref().ok_or_else(not_configured)
    }

    fn zones<'a>(&self, data: &'a VultrProviderData) -> ZonesApi<'a> {
        data.client.cdn().zones(self.kind)
    }

    /// "CDN pull zone" / "CDN push zone", for messages
    fn noun(&self) -> String {
        format!("CDN {} zone", self.kind.name())
    }

    fn tracks_origin(&self) -> bool {
        self.kind == ZoneKind::Pull
    }

    fn zone_state(&self, prior: &DynamicValue, zone: &CdnZone) -> DynamicValue {
        let builder = StateBuilder::from_state(prior)
            .string("id", zone.id.clone())
            .string("label", zone.label.clone())
            .string("cdn_domain", zone.cdn_url.clone())
            .string("date_created", zone.date_created.clone())
            .string("status", zone.status.clone());

        if self.tracks_origin() {
            builder
                .string("origin_domain", zone.origin_domain.clone())
                .build()
        } else {
            builder.build()
        }
    }

    async fn refresh(
        &self,
        data: &VultrProviderData,
        id: &str,
        state: DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        match self.zones(data).get(id).await {
            Ok(zone) => Ok(Some(self.zone_state(&state, &zone))),
            Err(e) if zone_is_gone(&e) => {
                tracing::warn!("Removing {} ({}) because it is gone", self.noun(), id);
                Ok(None)
            }
            Err(e) => Err(Diagnostic::error(
                format!("Failed to read {}", self.noun()),
                format!("API error: {}", e),
            )),
        }
    }

    /// Field values taken from a planned state for create
    fn zone_request(&self, planned: &DynamicValue) -> CdnZoneRequest {
        CdnZoneRequest {
            label: Some(string_attr(planned, "label")),
            origin_domain: self
                .tracks_origin()
                .then(|| string_attr(planned, "origin_domain")),
        }
    }
}

fn zone_is_gone(err: &ApiError) -> bool {
    err.is_not_found() || err.contains("Invalid")
}

#[async_trait]
impl Resource for CdnZoneResource {
    fn type_name(&self) -> &str {
        match self.kind {
            ZoneKind::Pull => "vultr_cdn_pull_zone",
            ZoneKind::Push => "vultr_cdn_push_zone",
        }
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let mut builder = SchemaBuilder::new()
            .version(0)
            .description(&format!("Manages a Vultr {}", self.noun()))
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("label", AttributeType::String)
                    .description(&format!("The label for the {}", self.noun()))
                    .required()
                    .build(),
            );

        if self.tracks_origin() {
            builder = builder.attribute(
                AttributeBuilder::new("origin_domain", AttributeType::String)
                    .description("The origin domain that the CDN will pull content from")
                    .required()
                    .build(),
            );
        }

        let schema = builder
            .attribute(
                AttributeBuilder::new("cdn_domain", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("date_created", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .computed()
                    .build(),
            )
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut required = vec!["label"];
        if self.tracks_origin() {
            required.push("origin_domain");
        }

        let diagnostics = required
            .into_iter()
            .filter(|name| {
                matches!(
                    request.config.get_string(&AttributePath::new(name)),
                    Ok(value) if value.is_empty()
                )
            })
            .map(|name| {
                Diagnostic::error(
                    format!("Invalid {}", name),
                    format!("{} must not be empty", name),
                )
                .with_attribute(AttributePath::new(name))
            })
            .collect();

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];

        let data = match self.provider_data() {
            Ok(data) => data,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        let zone = match self
            .zones(data)
            .create(&self.zone_request(&request.planned_state))
            .await
        {
            Ok(zone) => zone,
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    format!("Failed to create {}", self.noun()),
                    format!("API error: {}", e),
                ));
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };
        tracing::info!("{} ID: {}", self.noun(), zone.id);

        let state = state_with_id(&request.planned_state, &zone.id, &mut diagnostics);

        match self.refresh(data, &zone.id, state.clone()).await {
            Ok(Some(new_state)) => CreateResourceResponse {
                new_state,
                diagnostics,
            },
            Ok(None) => {
                diagnostics.push(Diagnostic::error(
                    format!("{} disappeared", self.noun()),
                    format!("{} was not found after creation", zone.id),
                ));
                CreateResourceResponse {
                    new_state: state,
                    diagnostics,
                }
            }
            Err(diag) => {
                diagnostics.push(diag);
                CreateResourceResponse {
                    new_state: state,
                    diagnostics,
                }
            }
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let data = match self.provider_data() {
            Ok(data) => data,
            Err(diag) => {
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics: vec![diag],
                }
            }
        };

        let Some(id) = state_id(&request.current_state) else {
            return ReadResourceResponse {
                new_state: None,
                diagnostics: vec![],
            };
        };

        match self.refresh(data, &id, request.current_state.clone()).await {
            Ok(new_state) => ReadResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(diag) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![diag],
            },
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let mut diagnostics = vec![];

        let data = match self.provider_data() {
            Ok(data) => data,
            Err(diag) => {
                diagnostics.push(diag);
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        };

        let Some(id) = state_id(&request.prior_state) else {
            diagnostics.push(Diagnostic::error(
                format!("Missing {} ID", self.noun()),
                "The prior state has no id to update",
            ));
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics,
            };
        };

        let changed = |name: &str| {
            let planned = string_attr(&request.planned_state, name);
            (planned != string_attr(&request.prior_state, name)).then_some(planned)
        };
        let update_request = CdnZoneRequest {
            label: changed("label"),
            origin_domain: if self.tracks_origin() {
                changed("origin_domain")
            } else {
                None
            },
        };

        if update_request.label.is_some() || update_request.origin_domain.is_some() {
            tracing::info!("Updating {}: {}", self.noun(), id);
            if let Err(e) = self.zones(data).update(&id, &update_request).await {
                diagnostics.push(Diagnostic::error(
                    format!("Failed to update {}", self.noun()),
                    format!("Error updating {} ({}): {}", self.noun(), id, e),
                ));
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        }

        let state = state_with_id(&request.planned_state, &id, &mut diagnostics);

        match self.refresh(data, &id, state.clone()).await {
            Ok(Some(new_state)) => UpdateResourceResponse {
                new_state,
                diagnostics,
            },
            Ok(None) => {
                diagnostics.push(Diagnostic::error(
                    format!("{} disappeared", self.noun()),
                    format!("{} was not found after update", id),
                ));
                UpdateResourceResponse {
                    new_state: state,
                    diagnostics,
                }
            }
            Err(diag) => {
                diagnostics.push(diag);
                UpdateResourceResponse {
                    new_state: state,
                    diagnostics,
                }
            }
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        let data = match self.provider_data() {
            Ok(data) => data,
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        let Some(id) = state_id(&request.prior_state) else {
            return DeleteResourceResponse { diagnostics };
        };
        tracing::info!("Deleting {}: {}", self.noun(), id);

        match self.zones(data).delete(&id).await {
            Ok(()) => {}
            Err(e) if zone_is_gone(&e) => {
                tracing::info!("{} {} was already deleted", self.noun(), id);
            }
            Err(e) => diagnostics.push(Diagnostic::error(
                format!("Failed to delete {}", self.noun()),
                format!("Error destroying {} ({}): {}", self.noun(), id, e),
            )),
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for CdnZoneResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];

        match VultrProviderData::from_configure(request.provider_data) {
            Ok(data) => self.provider_data = Some(data),
            Err(diag) => diagnostics.push(diag),
        }

        ConfigureResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithImportState for CdnZoneResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_state_passthrough_id(AttributePath::new("id"), &request)
    }
}

#[cfg(test)]
#[path = "./cdn_zone_test.rs"]
mod cdn_zone_test;
