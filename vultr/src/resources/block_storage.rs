//! Block storage resource implementation

use super::waiters::{
    block_is_gone, fetch_block_settled, wait_failed, wait_for_block_attached,
    wait_for_block_available, wait_for_block_detached,
};
use super::{state_id, state_with_id, string_attr, u64_attr, MIN_SIZE_GB};
use crate::api::block_storage::{
    AttachBlockStorageRequest, BlockStorage, CreateBlockStorageRequest, DetachBlockStorageRequest,
    UpdateBlockStorageRequest,
};
use crate::provider_data::{not_configured, VultrProviderData};
use async_trait::async_trait;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceTimeouts, ResourceWithConfigure,
    ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::retry::WaitError;
use tfplug::defaults::StaticDefault;
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue, StateBuilder};

const BLOCK_TYPES: [&str; 2] = ["storage_opt", "high_perf"];

#[derive(Default)]
pub struct BlockStorageResource {
    provider_data: Option<VultrProviderData>,
}

impl BlockStorageResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn provider_data(&self) -> Result<&VultrProviderData, Diagnostic> {
        self.provider_data.as_ref().ok_or_else(not_configured)
    }

    /// Re-reads the volume into `state`. `Ok(None)` when the volume is gone.
    async fn refresh(
        &self,
        data: &VultrProviderData,
        id: &str,
        state: DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        match data.client.block_storage().get(id).await {
            Ok(block) => Ok(Some(block_state(&state, &block))),
            Err(e) if e.is_nothing_to_change() => {
                tracing::info!(
                    "Block storage {} returned 'Nothing to change', keeping current state",
                    id
                );
                Ok(Some(state))
            }
            Err(e) if block_is_gone(&e) => {
                tracing::warn!("Removing block storage ({}) because it is gone", id);
                Ok(None)
            }
            Err(e) => Err(Diagnostic::error(
                "Failed to read block storage",
                format!("API error: {}", e),
            )),
        }
    }

    async fn attach(
        &self,
        ctx: &Context,
        data: &VultrProviderData,
        id: &str,
        instance_id: &str,
        live: bool,
    ) -> Result<(), Diagnostic> {
        tracing::info!("Attaching block storage {} to instance {}", id, instance_id);
        let request = AttachBlockStorageRequest {
            instance_id: instance_id.to_string(),
            live,
        };
        data.client
            .block_storage()
            .attach(id, &request)
            .await
            .map_err(|e| {
                Diagnostic::error(
                    "Failed to attach block storage",
                    format!("Error attaching {} to instance {}: {}", id, instance_id, e),
                )
            })?;

        wait_for_block_attached(ctx, &data.client, id, instance_id, &data.poll)
            .await
            .map_err(|e| wait_failed("Failed waiting for block storage attachment", e))?;
        Ok(())
    }

    /// Moves the volume off `old_instance` when it is still attached there.
    /// A returned diagnostic is a warning the caller should surface.
    async fn detach_from(
        &self,
        ctx: &Context,
        data: &VultrProviderData,
        id: &str,
        (old_instance, new_instance): (&str, &str),
        live: bool,
    ) -> Result<Option<Diagnostic>, Diagnostic> {
        // Skip the detach when the old instance was tainted or destroyed in
        // the meantime and the volume already moved.
        let current = fetch_block_settled(ctx, &data.client, id, &data.poll)
            .await
            .map_err(|e| wait_failed("Failed to read block storage", e))?;

        let Some(block) = current else {
            tracing::info!(
                "Could not observe block storage {}, assuming it is already detached",
                id
            );
            return Ok(None);
        };

        if !block.is_attached() {
            tracing::info!("Block storage {} is already detached", id);
            return Ok(None);
        }
        if block.attached_to_instance != old_instance {
            return Ok(None);
        }

        tracing::info!("Detaching block storage {} from instance {}", id, old_instance);
        match data
            .client
            .block_storage()
            .detach(id, &DetachBlockStorageRequest { live })
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_nothing_to_change() => {
                tracing::info!("Block storage {} already detached", id);
                return Ok(None);
            }
            Err(e) if new_instance.is_empty() && e.contains("not attached") => {
                tracing::info!("Block storage {} already detached", id);
                return Ok(None);
            }
            Err(e) => {
                return Err(Diagnostic::error(
                    "Failed to detach block storage",
                    format!("Error detaching {} from instance {}: {}", id, old_instance, e),
                ))
            }
        }

        match wait_for_block_detached(ctx, &data.client, id, &data.poll).await {
            Ok(_) => Ok(None),
            Err(e) if new_instance.is_empty() && e.is_timeout() => {
                tracing::warn!(
                    "Block storage detachment did not complete, continuing with removal: {}",
                    e
                );
                Ok(Some(Diagnostic::warning(
                    "Block storage detachment incomplete",
                    e.to_string(),
                )))
            }
            Err(e) => Err(wait_failed("Failed waiting for block storage detachment", e)),
        }
    }
}

/// Flattens the API object over `prior`, keeping configuration-only values
fn block_state(prior: &DynamicValue, block: &BlockStorage) -> DynamicValue {
    let live = prior
        .get_bool(&AttributePath::new("live"))
        .unwrap_or(false);
    let attachment = StateBuilder::new()
        .string("instance_id", block.attached_to_instance.clone())
        .string(
            "mount_id",
            if block.is_attached() {
                block.mount_id.clone()
            } else {
                String::new()
            },
        )
        .bool("attached", block.is_attached())
        .build_object();

    StateBuilder::from_state(prior)
        .string("id", block.id.clone())
        .bool("live", live)
        .string("date_created", block.date_created.clone())
        .number("cost", block.cost)
        .string("status", block.status.clone())
        .number("size_gb", block.size_gb as f64)
        .string("region", block.region.clone())
        .string("attached_to_instance", block.attached_to_instance.clone())
        .string("label", block.label.clone())
        .string("mount_id", block.mount_id.clone())
        .string("block_type", block.block_type.clone())
        .list("attachment_info", vec![attachment])
        .build()
}

fn block_storage_schema() -> Schema {
    let attachment_info = AttributeType::object([
        ("instance_id", AttributeType::String),
        ("mount_id", AttributeType::String),
        ("attached", AttributeType::Bool),
    ]);

    SchemaBuilder::new()
        .version(0)
        .description("Manages a Vultr block storage volume")
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .description("The block storage ID")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("size_gb", AttributeType::Number)
                .description("The size of the block storage in GB. Minimum size is 10 GB.")
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("region", AttributeType::String)
                .description("The region the block storage is created in")
                .required()
                .force_new()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("attached_to_instance", AttributeType::String)
                .description("ID of the instance the block storage is attached to")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("label", AttributeType::String)
                .description("Label of the block storage")
                .optional()
                .default(StaticDefault::string(""))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("live", AttributeType::Bool)
                .description("Attach and detach without restarting the instance")
                .optional()
                .default(StaticDefault::bool(false))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("block_type", AttributeType::String)
                .description("Storage type: storage_opt or high_perf")
                .optional()
                .computed()
                .force_new()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("date_created", AttributeType::String)
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("cost", AttributeType::Number)
                .description("Monthly cost of the block storage")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("status", AttributeType::String)
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("mount_id", AttributeType::String)
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new(
                "attachment_info",
                AttributeType::List(Box::new(attachment_info)),
            )
            .description("Current attachment of the block storage")
            .computed()
            .build(),
        )
        .build()
}

#[async_trait]
impl Resource for BlockStorageResource {
    fn type_name(&self) -> &str {
        "vultr_block_storage"
    }

    fn timeouts(&self) -> ResourceTimeouts {
        ResourceTimeouts {
            create: Duration::from_secs(30 * 60),
            update: Duration::from_secs(30 * 60),
            delete: Duration::from_secs(10 * 60),
            ..ResourceTimeouts::default()
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
        ResourceSchemaResponse {
            schema: block_storage_schema(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];

        if let Ok(size) = request.config.get_number(&AttributePath::new("size_gb")) {
            if size < MIN_SIZE_GB {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid size_gb",
                        format!("size_gb must be at least {}, got {}", MIN_SIZE_GB, size),
                    )
                    .with_attribute(AttributePath::new("size_gb")),
                );
            }
        }

        if let Ok(block_type) = request.config.get_string(&AttributePath::new("block_type")) {
            if !BLOCK_TYPES.contains(&block_type.as_str()) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid block_type",
                        format!("block_type must be one of: {:?}", BLOCK_TYPES),
                    )
                    .with_attribute(AttributePath::new("block_type")),
                );
            }
        }

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(
        &self,
        ctx: Context,
        mut request: CreateResourceRequest,
    ) -> CreateResourceResponse {
        block_storage_schema().apply_defaults(&mut request.planned_state);
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

        let config = &request.planned_state;
        let Some(size_gb) = u64_attr(config, "size_gb") else {
            diagnostics.push(Diagnostic::error(
                "Missing size_gb",
                "size_gb must be set to create block storage",
            ));
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics,
            };
        };
        let block_type = string_attr(config, "block_type");
        let create_request = CreateBlockStorageRequest {
            region: string_attr(config, "region"),
            size_gb,
            label: string_attr(config, "label"),
            block_type: (!block_type.is_empty()).then_some(block_type),
        };

        let block = match data.client.block_storage().create(&create_request).await {
            Ok(block) => block,
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create block storage",
                    format!("API error: {}", e),
                ));
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };
        tracing::info!("Block Storage ID: {}", block.id);

        let state = state_with_id(&request.planned_state, &block.id, &mut diagnostics);

        if let Err(e) = wait_for_block_available(
            &ctx,
            &data.client,
            &block.id,
            &data.poll,
            self.timeouts().create,
        )
        .await
        {
            diagnostics.push(wait_failed("Failed waiting for block storage", e));
            return CreateResourceResponse {
                new_state: state,
                diagnostics,
            };
        }

        let instance_id = string_attr(config, "attached_to_instance");
        if !instance_id.is_empty() {
            let live = config
                .get_bool(&AttributePath::new("live"))
                .unwrap_or(false);
            if let Err(diag) = self.attach(&ctx, data, &block.id, &instance_id, live).await {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: state,
                    diagnostics,
                };
            }
        }

        match self.refresh(data, &block.id, state.clone()).await {
            Ok(Some(new_state)) => CreateResourceResponse {
                new_state,
                diagnostics,
            },
            Ok(None) => {
                diagnostics.push(Diagnostic::error(
                    "Block storage disappeared",
                    format!("Block storage {} was not found after creation", block.id),
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

    async fn update(
        &self,
        ctx: Context,
        mut request: UpdateResourceRequest,
    ) -> UpdateResourceResponse {
        block_storage_schema().apply_defaults(&mut request.planned_state);
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
                "Missing block storage ID",
                "The prior state has no id to update",
            ));
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics,
            };
        };

        let prior = &request.prior_state;
        let planned = &request.planned_state;

        let mut update_request = UpdateBlockStorageRequest::default();
        let label = string_attr(planned, "label");
        if label != string_attr(prior, "label") {
            update_request.label = Some(label);
        }
        let size_gb = u64_attr(planned, "size_gb");
        if size_gb.is_some() && size_gb != u64_attr(prior, "size_gb") {
            update_request.size_gb = size_gb;
        }

        if !update_request.is_empty() {
            if let Err(e) = data.client.block_storage().update(&id, &update_request).await {
                diagnostics.push(Diagnostic::error(
                    "Failed to update block storage",
                    format!("API error: {}", e),
                ));
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        }

        let old_instance = string_attr(prior, "attached_to_instance");
        let new_instance = string_attr(planned, "attached_to_instance");
        if old_instance != new_instance {
            let live = planned
                .get_bool(&AttributePath::new("live"))
                .unwrap_or(false);

            if !old_instance.is_empty() {
                match self
                    .detach_from(&ctx, data, &id, (&old_instance, &new_instance), live)
                    .await
                {
                    Ok(warning) => diagnostics.extend(warning),
                    Err(diag) => {
                        diagnostics.push(diag);
                        return UpdateResourceResponse {
                            new_state: request.prior_state,
                            diagnostics,
                        };
                    }
                }
            }

            if !new_instance.is_empty() {
                if let Err(diag) = self.attach(&ctx, data, &id, &new_instance, live).await {
                    diagnostics.push(diag);
                    return UpdateResourceResponse {
                        new_state: request.prior_state,
                        diagnostics,
                    };
                }
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
                    "Block storage disappeared",
                    format!("Block storage {} was not found after update", id),
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

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
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
        tracing::info!("Deleting block storage: {}", id);

        let api = data.client.block_storage();
        let current = match api.get(&id).await {
            Ok(block) => Some(block),
            Err(e) if e.is_nothing_to_change() => {
                tracing::info!(
                    "Block storage {} returned 'Nothing to change', proceeding with deletion",
                    id
                );
                None
            }
            Err(e) if block_is_gone(&e) => {
                tracing::info!("Block storage {} appears to already be deleted", id);
                return DeleteResourceResponse { diagnostics };
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read block storage",
                    format!("Error getting block storage {} during deletion: {}", id, e),
                ));
                return DeleteResourceResponse { diagnostics };
            }
        };

        if let Some(block) = current.filter(BlockStorage::is_attached) {
            tracing::info!(
                "Detaching block storage {} from instance {} before deletion",
                id,
                block.attached_to_instance
            );
            let live = request
                .prior_state
                .get_bool(&AttributePath::new("live"))
                .unwrap_or(false);

            match api.detach(&id, &DetachBlockStorageRequest { live }).await {
                Ok(()) => match wait_for_block_detached(&ctx, &data.client, &id, &data.poll).await
                {
                    Ok(_) => {}
                    Err(WaitError::Cancelled) => {
                        diagnostics.push(wait_failed(
                            "Failed waiting for block storage detachment",
                            WaitError::Cancelled,
                        ));
                        return DeleteResourceResponse { diagnostics };
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Block storage detachment did not complete, attempting deletion anyway: {}",
                            e
                        );
                        diagnostics.push(Diagnostic::warning(
                            "Block storage detachment incomplete",
                            e.to_string(),
                        ));
                    }
                },
                Err(e) if e.is_nothing_to_change() => {
                    tracing::info!("Block storage {} already detached", id);
                }
                Err(e) => {
                    tracing::warn!(
                        "Error detaching block storage {} (will attempt deletion anyway): {}",
                        id,
                        e
                    );
                    diagnostics.push(Diagnostic::warning(
                        "Failed to detach block storage",
                        e.to_string(),
                    ));
                }
            }
        }

        match api.delete(&id).await {
            Ok(()) => {}
            Err(e) if block_is_gone(&e) => {
                tracing::info!("Block storage {} was already deleted", id);
            }
            Err(e) if e.contains("attached") => {
                diagnostics.push(Diagnostic::error(
                    "Failed to delete block storage",
                    format!(
                        "Error deleting block storage {}: storage is still attached. Please detach manually: {}",
                        id, e
                    ),
                ));
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to delete block storage",
                    format!("Error deleting block storage {}: {}", id, e),
                ));
            }
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for BlockStorageResource {
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
impl ResourceWithImportState for BlockStorageResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_state_passthrough_id(AttributePath::new("id"), &request)
    }
}

#[cfg(test)]
#[path = "./block_storage_test.rs"]
mod block_storage_test;
