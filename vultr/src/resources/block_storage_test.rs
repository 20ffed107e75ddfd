#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::provider_data::test_provider_data;
    use mockito::{Matcher, Server, ServerGuard};
    use std::any::Any;
    use std::sync::Arc;
    use tfplug::types::Dynamic;

    async fn configured(server: &ServerGuard) -> BlockStorageResource {
        let mut resource = BlockStorageResource::new();
        let data: Arc<dyn Any + Send + Sync> = Arc::new(test_provider_data(&server.url()));
        let response = resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: Some(data),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
        resource
    }

    fn block_json(status: &str, instance: &str, mount_id: &str) -> String {
        serde_json::json!({
            "block": {
                "id": "b1",
                "date_created": "2024-03-01T10:00:00+00:00",
                "cost": 2.5,
                "status": status,
                "size_gb": 25,
                "region": "ewr",
                "attached_to_instance": instance,
                "label": "data",
                "mount_id": mount_id,
                "block_type": "high_perf"
            }
        })
        .to_string()
    }

    fn error_json(message: &str) -> String {
        serde_json::json!({"error": message, "status": 400}).to_string()
    }

    fn state(instance: &str) -> DynamicValue {
        StateBuilder::new()
            .string("id", "b1")
            .number("size_gb", 25.0)
            .string("region", "ewr")
            .string("label", "data")
            .string("attached_to_instance", instance)
            .bool("live", true)
            .build()
    }

    fn attr(value: &DynamicValue, name: &str) -> String {
        value.get_string(&AttributePath::new(name)).unwrap()
    }

    #[test]
    fn test_resource_type_name_and_timeouts() {
        let resource = BlockStorageResource::new();
        assert_eq!(resource.type_name(), "vultr_block_storage");

        let timeouts = resource.timeouts();
        assert_eq!(timeouts.create, Duration::from_secs(1800));
        assert_eq!(timeouts.update, Duration::from_secs(1800));
        assert_eq!(timeouts.delete, Duration::from_secs(600));
    }

    #[tokio::test]
    async fn test_resource_schema() {
        let resource = BlockStorageResource::new();
        let response = resource.schema(Context::new(), ResourceSchemaRequest).await;

        assert!(response.diagnostics.is_empty());
        let schema = response.schema;
        assert!(schema.attribute("size_gb").unwrap().required);
        assert!(schema.attribute("region").unwrap().force_new);
        assert!(schema.attribute("block_type").unwrap().force_new);
        assert!(schema.attribute("attachment_info").unwrap().computed);
        assert!(schema.attribute("mount_id").unwrap().computed);

        let label = schema.attribute("label").unwrap();
        assert!(label.optional && !label.computed);
        assert_eq!(
            label.default.as_ref().unwrap().default_value(),
            Dynamic::String(String::new())
        );
        let live = schema.attribute("live").unwrap();
        assert!(!live.computed);
        assert_eq!(
            live.default.as_ref().unwrap().default_value(),
            Dynamic::Bool(false)
        );
    }

    #[tokio::test]
    async fn test_validate_rejects_small_size_and_unknown_type() {
        let resource = BlockStorageResource::new();
        let config = StateBuilder::new()
            .number("size_gb", 5.0)
            .string("region", "ewr")
            .string("block_type", "archive")
            .build();

        let response = resource
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "vultr_block_storage".to_string(),
                    config,
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 2);
        assert_eq!(response.diagnostics[0].summary, "Invalid size_gb");
        assert_eq!(response.diagnostics[1].summary, "Invalid block_type");
    }

    #[tokio::test]
    async fn test_validate_accepts_minimum_size() {
        let resource = BlockStorageResource::new();
        let config = StateBuilder::new()
            .number("size_gb", 10.0)
            .string("block_type", "storage_opt")
            .build();

        let response = resource
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "vultr_block_storage".to_string(),
                    config,
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_create_waits_for_active_then_attaches() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/v2/blocks")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "region": "ewr",
                "size_gb": 25,
                "label": "data"
            })))
            .with_status(202)
            .with_body(block_json("pending", "", ""))
            .create_async()
            .await;
        let _pending = server
            .mock("GET", "/v2/blocks/b1")
            .with_body(block_json("pending", "", ""))
            .expect(1)
            .create_async()
            .await;
        let _active = server
            .mock("GET", "/v2/blocks/b1")
            .with_body(block_json("active", "", ""))
            .expect(1)
            .create_async()
            .await;
        let _attached = server
            .mock("GET", "/v2/blocks/b1")
            .with_body(block_json("active", "i1", "ewr-mount"))
            .create_async()
            .await;
        let attach = server
            .mock("POST", "/v2/blocks/b1/attach")
            .match_body(Matcher::Json(serde_json::json!({
                "instance_id": "i1",
                "live": true
            })))
            .with_status(204)
            .create_async()
            .await;

        let resource = configured(&server).await;
        let planned = StateBuilder::new()
            .number("size_gb", 25.0)
            .string("region", "ewr")
            .string("label", "data")
            .string("attached_to_instance", "i1")
            .bool("live", true)
            .value("id", Dynamic::Unknown)
            .build();

        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "vultr_block_storage".to_string(),
                    planned_state: planned.clone(),
                    config: planned,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state;
        assert_eq!(attr(&state, "id"), "b1");
        assert_eq!(attr(&state, "status"), "active");
        assert_eq!(attr(&state, "mount_id"), "ewr-mount");
        assert_eq!(attr(&state, "attached_to_instance"), "i1");
        assert!(state.get_bool(&AttributePath::new("live")).unwrap());

        let info = state.get_list(&AttributePath::new("attachment_info")).unwrap();
        assert_eq!(info.len(), 1);
        let info = DynamicValue::new(info[0].clone());
        assert!(info.get_bool(&AttributePath::new("attached")).unwrap());

        create.assert_async().await;
        attach.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_reports_api_error() {
        let mut server = Server::new_async().await;
        let _create = server
            .mock("POST", "/v2/blocks")
            .with_status(400)
            .with_body(error_json("Invalid region"))
            .create_async()
            .await;

        let resource = configured(&server).await;
        let planned = StateBuilder::new()
            .number("size_gb", 25.0)
            .string("region", "nowhere")
            .build();

        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "vultr_block_storage".to_string(),
                    planned_state: planned.clone(),
                    config: planned,
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Failed to create block storage");
        assert!(response.diagnostics[0].detail.contains("Invalid region"));
    }

    #[tokio::test]
    async fn test_read_flattens_attachment_info() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/v2/blocks/b1")
            .with_body(block_json("active", "", "ewr-mount"))
            .create_async()
            .await;

        let resource = configured(&server).await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "vultr_block_storage".to_string(),
                    current_state: state(""),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        let state = response.new_state.unwrap();
        assert_eq!(state.get_number(&AttributePath::new("cost")).unwrap(), 2.5);
        assert_eq!(attr(&state, "block_type"), "high_perf");
        assert!(state.get_bool(&AttributePath::new("live")).unwrap());

        let info = state.get_list(&AttributePath::new("attachment_info")).unwrap();
        let info = DynamicValue::new(info[0].clone());
        assert!(!info.get_bool(&AttributePath::new("attached")).unwrap());
        assert_eq!(attr(&info, "mount_id"), "");
    }

    #[tokio::test]
    async fn test_read_removes_missing_volume() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/v2/blocks/b1")
            .with_status(400)
            .with_body(error_json("Invalid block storage ID"))
            .create_async()
            .await;

        let resource = configured(&server).await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "vultr_block_storage".to_string(),
                    current_state: state(""),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn test_read_keeps_state_on_nothing_to_change() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/v2/blocks/b1")
            .with_status(400)
            .with_body(error_json("Nothing to change"))
            .create_async()
            .await;

        let resource = configured(&server).await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "vultr_block_storage".to_string(),
                    current_state: state("i1"),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert_eq!(response.new_state, Some(state("i1")));
    }

    #[tokio::test]
    async fn test_read_surfaces_other_errors() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/v2/blocks/b1")
            .with_status(403)
            .with_body(error_json("Unauthorized IP address"))
            .create_async()
            .await;

        let resource = configured(&server).await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "vultr_block_storage".to_string(),
                    current_state: state(""),
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Failed to read block storage");
        assert_eq!(response.new_state, Some(state("")));
    }

    #[tokio::test]
    async fn test_update_detaches_when_attachment_removed() {
        let mut server = Server::new_async().await;
        let _attached = server
            .mock("GET", "/v2/blocks/b1")
            .with_body(block_json("active", "i1", "ewr-mount"))
            .expect(1)
            .create_async()
            .await;
        let _detached = server
            .mock("GET", "/v2/blocks/b1")
            .with_body(block_json("active", "", ""))
            .create_async()
            .await;
        let detach = server
            .mock("POST", "/v2/blocks/b1/detach")
            .match_body(Matcher::Json(serde_json::json!({"live": true})))
            .with_status(204)
            .create_async()
            .await;
        let patch = server
            .mock("PATCH", "/v2/blocks/b1")
            .expect(0)
            .create_async()
            .await;

        let resource = configured(&server).await;
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "vultr_block_storage".to_string(),
                    prior_state: state("i1"),
                    planned_state: state(""),
                    config: state(""),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(attr(&response.new_state, "attached_to_instance"), "");
        detach.assert_async().await;
        patch.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_resets_label_removed_from_config() {
        let mut server = Server::new_async().await;
        let patch = server
            .mock("PATCH", "/v2/blocks/b1")
            .match_body(Matcher::Json(serde_json::json!({"label": ""})))
            .with_status(204)
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/v2/blocks/b1")
            .with_body(block_json("active", "", ""))
            .create_async()
            .await;

        let planned = StateBuilder::new()
            .string("id", "b1")
            .number("size_gb", 25.0)
            .string("region", "ewr")
            .string("attached_to_instance", "")
            .build();

        let resource = configured(&server).await;
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "vultr_block_storage".to_string(),
                    prior_state: state(""),
                    planned_state: planned.clone(),
                    config: planned,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        patch.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_tolerates_not_attached_when_removing() {
        let mut server = Server::new_async().await;
        let _attached = server
            .mock("GET", "/v2/blocks/b1")
            .with_body(block_json("active", "i1", "ewr-mount"))
            .expect(1)
            .create_async()
            .await;
        let _detached = server
            .mock("GET", "/v2/blocks/b1")
            .with_body(block_json("active", "", ""))
            .create_async()
            .await;
        let _detach = server
            .mock("POST", "/v2/blocks/b1/detach")
            .with_status(400)
            .with_body(error_json("Block storage is not attached"))
            .create_async()
            .await;

        let resource = configured(&server).await;
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "vultr_block_storage".to_string(),
                    prior_state: state("i1"),
                    planned_state: state(""),
                    config: state(""),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    }

    #[tokio::test]
    async fn test_update_resizes_and_moves_attachment() {
        let mut server = Server::new_async().await;
        let patch = server
            .mock("PATCH", "/v2/blocks/b1")
            .match_body(Matcher::Json(serde_json::json!({"size_gb": 40})))
            .with_status(204)
            .create_async()
            .await;
        // Prefetch sees the old attachment, the detach wait sees none, then
        // the attach wait and final read see the new instance.
        let _old = server
            .mock("GET", "/v2/blocks/b1")
            .with_body(block_json("active", "i1", "ewr-mount"))
            .expect(1)
            .create_async()
            .await;
        let _free = server
            .mock("GET", "/v2/blocks/b1")
            .with_body(block_json("active", "", ""))
            .expect(1)
            .create_async()
            .await;
        let _new = server
            .mock("GET", "/v2/blocks/b1")
            .with_body(block_json("active", "i2", "ewr-mount-2"))
            .create_async()
            .await;
        let detach = server
            .mock("POST", "/v2/blocks/b1/detach")
            .with_status(204)
            .create_async()
            .await;
        let attach = server
            .mock("POST", "/v2/blocks/b1/attach")
            .match_body(Matcher::Json(serde_json::json!({
                "instance_id": "i2",
                "live": true
            })))
            .with_status(204)
            .create_async()
            .await;

        let resource = configured(&server).await;
        let mut planned = state("i2");
        planned
            .set_number(&AttributePath::new("size_gb"), 40.0)
            .unwrap();

        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "vultr_block_storage".to_string(),
                    prior_state: state("i1"),
                    planned_state: planned.clone(),
                    config: planned,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(attr(&response.new_state, "attached_to_instance"), "i2");
        assert_eq!(attr(&response.new_state, "mount_id"), "ewr-mount-2");
        patch.assert_async().await;
        detach.assert_async().await;
        attach.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_detaches_first() {
        let mut server = Server::new_async().await;
        let _attached = server
            .mock("GET", "/v2/blocks/b1")
            .with_body(block_json("active", "i1", "ewr-mount"))
            .expect(1)
            .create_async()
            .await;
        let _detached = server
            .mock("GET", "/v2/blocks/b1")
            .with_body(block_json("active", "", ""))
            .create_async()
            .await;
        let detach = server
            .mock("POST", "/v2/blocks/b1/detach")
            .with_status(204)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/v2/blocks/b1")
            .with_status(204)
            .create_async()
            .await;

        let resource = configured(&server).await;
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "vultr_block_storage".to_string(),
                    prior_state: state("i1"),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        detach.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_of_missing_volume_succeeds() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/v2/blocks/b1")
            .with_status(404)
            .with_body(error_json("block storage not found"))
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/v2/blocks/b1")
            .expect(0)
            .create_async()
            .await;

        let resource = configured(&server).await;
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "vultr_block_storage".to_string(),
                    prior_state: state(""),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_reports_still_attached() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/v2/blocks/b1")
            .with_body(block_json("active", "", ""))
            .create_async()
            .await;
        let _delete = server
            .mock("DELETE", "/v2/blocks/b1")
            .with_status(400)
            .with_body(error_json("Block storage is attached to an instance"))
            .create_async()
            .await;

        let resource = configured(&server).await;
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "vultr_block_storage".to_string(),
                    prior_state: state(""),
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0]
            .detail
            .contains("storage is still attached. Please detach manually"));
    }

    #[tokio::test]
    async fn test_unconfigured_resource_reports_error() {
        let resource = BlockStorageResource::new();
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "vultr_block_storage".to_string(),
                    prior_state: state(""),
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Provider not configured");
    }

    #[tokio::test]
    async fn test_import_passes_id_through() {
        let resource = BlockStorageResource::new();
        let response = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: "vultr_block_storage".to_string(),
                    id: "b1".to_string(),
                },
            )
            .await;

        assert_eq!(response.imported_resources.len(), 1);
        assert_eq!(attr(&response.imported_resources[0].state, "id"), "b1");
    }
}
