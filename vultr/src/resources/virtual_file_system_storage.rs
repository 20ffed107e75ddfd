//! Virtual file system storage resource implementation

use super::waiters::{budget, wait_failed, wait_for_vfs_attachment, wait_for_vfs_available};
use super::{state_id, state_with_id, string_attr, u64_attr, MIN_SIZE_GB};
use crate::api::vfs::{
    Attachment, CreateVfsRequest, StorageSize, UpdateVfsRequest, VirtualFileSystemStorage,
    ATTACHMENT_ATTACHED,
};
use crate::provider_data::{not_configured, VultrProviderData};
use async_trait::async_trait;
use std::collections::BTreeSet;
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
use tfplug::retry::{retry_context, RetryError, RetryFailed};
use tfplug::defaults::StaticDefault;
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue, StateBuilder};

const DISK_TYPES: [&str; 2] = ["nvme", "ssd"];
const DEFAULT_DISK_TYPE: &str = "nvme";

/// Returned by delete while any instance is still attached (the typo is the API's)
const STILL_ATTACHED: &str = "Can not delete this subscription until it is detatched from all machines";

#[derive(Default)]
pub struct VirtualFileSystemStorageResource {
    provider_data: Option<VultrProviderData>,
}

impl VirtualFileSystemStorageResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn provider_data(&self) -> Result<&VultrProviderData, Diagnostic> {
        self.provider_data.as_ref().ok_or_else(not_configured)
    }

    async fn refresh(
        &self,
        data: &VultrProviderData,
        id: &str,
        state: DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let api = data.client.vfs();

        let storage = match api.get(id).await {
            Ok(storage) => storage,
            Err(e) if e.is_not_found() => {
                tracing::warn!(
                    "Removing virtual file system storage ({}) because it is gone",
                    id
                );
                return Ok(None);
            }
            Err(e) => {
                return Err(Diagnostic::error(
                    "Failed to read virtual file system storage",
                    format!("API error: {}", e),
                ))
            }
        };

        let attachments = api.attachments(id).await.map_err(|e| {
            Diagnostic::error(
                "Failed to read virtual file system storage attachments",
                format!("Unable to retrieve attachments for {}: {}", id, e),
            )
        })?;

        Ok(Some(vfs_state(&state, &storage, &attachments)))
    }

    async fn attach(
        &self,
        ctx: &Context,
        data: &VultrProviderData,
        id: &str,
        instance_id: &str,
        wait: bool,
    ) -> Result<(), Diagnostic> {
        tracing::info!(
            "Attaching virtual file system storage {} to instance {}",
            id,
            instance_id
        );
        let attachment = data.client.vfs().attach(id, instance_id).await.map_err(|e| {
            Diagnostic::error(
                "Failed to attach virtual file system storage",
                format!("Error attaching instance {} to {}: {}", instance_id, id, e),
            )
        })?;
        tracing::info!(
            "Attachment created: state={}, mount_tag={}",
            attachment.state,
            attachment.mount_tag
        );

        if wait && attachment.state != ATTACHMENT_ATTACHED {
            wait_for_vfs_attachment(ctx, &data.client, id, instance_id, &data.poll)
                .await
                .map_err(|e| wait_failed("Failed waiting for attachment", e))?;
        }
        Ok(())
    }
}

fn vfs_state(
    prior: &DynamicValue,
    storage: &VirtualFileSystemStorage,
    attachments: &[Attachment],
) -> DynamicValue {
    let attachment_states = attachments
        .iter()
        .map(|a| {
            StateBuilder::new()
                .string("instance_id", a.target_id.clone())
                .string("state", a.state.clone())
                .number("mount", a.mount_tag as f64)
                .build_object()
        })
        .collect();

    StateBuilder::from_state(prior)
        .string("id", storage.id.clone())
        .string("region", storage.region.clone())
        .number("size_gb", storage.storage_size.gb as f64)
        .string("label", storage.label.clone())
        .strings("tags", storage.tags.iter().cloned())
        .string("date_created", storage.date_created.clone())
        .string("status", storage.status.clone())
        .string("disk_type", storage.disk_type.clone())
        .number("cost", storage.billing.monthly)
        .number("charges", storage.billing.charges)
        .strings("attached_instances", attachments.iter().map(|a| a.target_id.clone()))
        .list("attachments", attachment_states)
        .build()
}

fn instance_set(value: &DynamicValue) -> BTreeSet<String> {
    value
        .get_string_list(&AttributePath::new("attached_instances"))
        .unwrap_or_default()
        .into_iter()
        .filter(|id| !id.is_empty())
        .collect()
}

fn vfs_schema() -> Schema {
    let attachment = AttributeType::object([
        ("instance_id", AttributeType::String),
        ("state", AttributeType::String),
        ("mount", AttributeType::Number),
    ]);

    SchemaBuilder::new()
        .version(0)
        .description("Manages a Vultr virtual file system storage subscription")
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("region", AttributeType::String)
                .description("Region of the storage")
                .required()
                .force_new()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("size_gb", AttributeType::Number)
                .description(
                    "The size of the virtual file system storage in GB. Minimum size is 10 GB.",
                )
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("label", AttributeType::String)
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("tags", AttributeType::Set(Box::new(AttributeType::String)))
                .optional()
                .force_new()
                .build(),
        )
        .attribute(
            AttributeBuilder::new(
                "attached_instances",
                AttributeType::Set(Box::new(AttributeType::String)),
            )
            .description("IDs of the instances the storage is attached to")
            .optional()
            .build(),
        )
        .attribute(
            AttributeBuilder::new("disk_type", AttributeType::String)
                .description("The underlying disk type. Options are `nvme` (default) or `ssd`.")
                .optional()
                .default(StaticDefault::string(DEFAULT_DISK_TYPE))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("status", AttributeType::String)
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("date_created", AttributeType::String)
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("cost", AttributeType::Number)
                .description("Monthly cost")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("charges", AttributeType::Number)
                .description("Pending charges")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("attachments", AttributeType::List(Box::new(attachment)))
                .computed()
                .build(),
        )
        .build()
}

#[async_trait]
impl Resource for VirtualFileSystemStorageResource {
    fn type_name(&self) -> &str {
        "vultr_virtual_file_system_storage"
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
            schema: vfs_schema(),
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

        if let Ok(disk_type) = request.config.get_string(&AttributePath::new("disk_type")) {
            if !DISK_TYPES.contains(&disk_type.as_str()) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid disk_type",
                        format!("disk_type must be one of: {:?}", DISK_TYPES),
                    )
                    .with_attribute(AttributePath::new("disk_type")),
                );
            }
        }

        if let Ok(label) = request.config.get_string(&AttributePath::new("label")) {
            if label.trim().is_empty() {
                diagnostics.push(
                    Diagnostic::error("Invalid label", "label must not be empty")
                        .with_attribute(AttributePath::new("label")),
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
        vfs_schema().apply_defaults(&mut request.planned_state);
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
        let disk_type = string_attr(config, "disk_type");
        let create_request = CreateVfsRequest {
            region: string_attr(config, "region"),
            label: string_attr(config, "label"),
            storage_size: StorageSize {
                gb: u64_attr(config, "size_gb").unwrap_or_default(),
            },
            tags: config
                .get_string_list(&AttributePath::new("tags"))
                .unwrap_or_default(),
            disk_type: Some(disk_type),
        };

        let storage = match data.client.vfs().create(&create_request).await {
            Ok(storage) => storage,
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create virtual file system storage",
                    format!("API error: {}", e),
                ));
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };
        tracing::info!("Virtual File System Storage ID: {}", storage.id);

        let state = state_with_id(&request.planned_state, &storage.id, &mut diagnostics);

        if let Err(e) = wait_for_vfs_available(
            &ctx,
            &data.client,
            &storage.id,
            &data.poll,
            self.timeouts().create,
        )
        .await
        {
            diagnostics.push(wait_failed(
                "Failed waiting for virtual file system storage",
                e,
            ));
            return CreateResourceResponse {
                new_state: state,
                diagnostics,
            };
        }

        for instance_id in instance_set(config) {
            if let Err(diag) = self
                .attach(&ctx, data, &storage.id, &instance_id, false)
                .await
            {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: state,
                    diagnostics,
                };
            }
        }

        match self.refresh(data, &storage.id, state.clone()).await {
            Ok(Some(new_state)) => CreateResourceResponse {
                new_state,
                diagnostics,
            },
            Ok(None) => {
                diagnostics.push(Diagnostic::error(
                    "Virtual file system storage disappeared",
                    format!("{} was not found after creation", storage.id),
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
        vfs_schema().apply_defaults(&mut request.planned_state);
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
                "Missing virtual file system storage ID",
                "The prior state has no id to update",
            ));
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics,
            };
        };

        let prior = &request.prior_state;
        let planned = &request.planned_state;

        let mut update_request = UpdateVfsRequest::default();
        let label = string_attr(planned, "label");
        if label != string_attr(prior, "label") {
            update_request.label = Some(label);
        }
        let size_gb = u64_attr(planned, "size_gb");
        if let Some(gb) = size_gb.filter(|_| size_gb != u64_attr(prior, "size_gb")) {
            update_request.storage_size = Some(StorageSize { gb });
        }

        if !update_request.is_empty() {
            if let Err(e) = data.client.vfs().update(&id, &update_request).await {
                diagnostics.push(Diagnostic::error(
                    "Failed to update virtual file system storage",
                    format!("API error: {}", e),
                ));
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        }

        let old_instances = instance_set(prior);
        let new_instances = instance_set(planned);

        for instance_id in old_instances.difference(&new_instances) {
            tracing::info!(
                "Detaching virtual file system storage {} from instance {}",
                id,
                instance_id
            );
            if let Err(e) = data.client.vfs().detach(&id, instance_id).await {
                diagnostics.push(Diagnostic::error(
                    "Failed to detach virtual file system storage",
                    format!("Error detaching instance {} from {}: {}", instance_id, id, e),
                ));
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        }

        for instance_id in new_instances.difference(&old_instances) {
            if let Err(diag) = self.attach(&ctx, data, &id, instance_id, true).await {
                diagnostics.push(diag);
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
                    "Virtual file system storage disappeared",
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
        tracing::info!("Deleting virtual file system storage: {}", id);

        let api = data.client.vfs();
        let attachments = match api.attachments(&id).await {
            Ok(attachments) => attachments,
            Err(e) if e.is_not_found() => {
                tracing::info!("Virtual file system storage {} is already gone", id);
                return DeleteResourceResponse { diagnostics };
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to read virtual file system storage attachments",
                    format!("Unable to retrieve attachments for {} during deletion: {}", id, e),
                ));
                return DeleteResourceResponse { diagnostics };
            }
        };

        for attachment in &attachments {
            if let Err(e) = api.detach(&id, &attachment.target_id).await {
                diagnostics.push(Diagnostic::error(
                    "Failed to detach virtual file system storage",
                    format!(
                        "Error detaching instance {} from {} during deletion: {}",
                        attachment.target_id, id, e
                    ),
                ));
                return DeleteResourceResponse { diagnostics };
            }
        }

        let limit = self
            .timeouts()
            .delete
            .saturating_sub(data.poll.vfs_delete_margin);
        let vfs_id = id.as_str();
        let result = retry_context(
            &ctx,
            budget(&ctx, limit),
            data.poll.vfs_delete_retry_interval,
            move || async move {
                match api.delete(vfs_id).await {
                    Ok(()) => Ok(()),
                    Err(e) if e.contains(STILL_ATTACHED) => {
                        tracing::debug!("Virtual file system storage {} is still attached", vfs_id);
                        Err(RetryError::Retryable(e))
                    }
                    Err(e) => Err(RetryError::NonRetryable(e)),
                }
            },
        )
        .await;

        match result {
            Ok(()) => {}
            Err(RetryFailed::NonRetryable(e)) if e.is_not_found() => {
                tracing::info!("Virtual file system storage {} was already deleted", id);
            }
            Err(e) => diagnostics.push(Diagnostic::error(
                "Failed to delete virtual file system storage",
                format!("Error destroying virtual file system storage {}: {}", id, e),
            )),
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for VirtualFileSystemStorageResource {
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
impl ResourceWithImportState for VirtualFileSystemStorageResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_state_passthrough_id(AttributePath::new("id"), &request)
    }
}

#[cfg(test)]
#[path = "./virtual_file_system_storage_test.rs"]
mod virtual_file_system_storage_test;
