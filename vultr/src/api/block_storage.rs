//! Block storage API implementation

use super::client::Client;
use super::error::ApiError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockStorage {
    pub id: String,
    #[serde(default)]
    pub date_created: String,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub size_gb: u64,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub attached_to_instance: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub mount_id: String,
    #[serde(default)]
    pub block_type: String,
}

impl BlockStorage {
    pub fn is_attached(&self) -> bool {
        !self.attached_to_instance.is_empty()
    }

    /// Attached to `instance_id` and the mount is ready
    pub fn is_mounted_on(&self, instance_id: &str) -> bool {
        self.attached_to_instance == instance_id && !self.mount_id.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct BlockStorageEnvelope {
    block: BlockStorage,
}

#[derive(Debug, Serialize)]
pub struct CreateBlockStorageRequest {
    pub region: String,
    pub size_gb: u64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_type: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct UpdateBlockStorageRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_gb: Option<u64>,
}

impl UpdateBlockStorageRequest {
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.size_gb.is_none()
    }
}

#[derive(Debug, Serialize)]
pub struct AttachBlockStorageRequest {
    pub instance_id: String,
    pub live: bool,
}

#[derive(Debug, Serialize)]
pub struct DetachBlockStorageRequest {
    pub live: bool,
}

#[derive(Clone, Copy)]
pub struct BlockStorageApi<'a> {
    client: &'a Client,
}

impl<'a> BlockStorageApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn path(id: &str) -> String {
        format!("/v2/blocks/{}", urlencoding::encode(id))
    }

    pub async fn create(
        &self,
        request: &CreateBlockStorageRequest,
    ) -> Result<BlockStorage, ApiError> {
        let envelope: BlockStorageEnvelope = self.client.post("/v2/blocks", request).await?;
        Ok(envelope.block)
    }

    pub async fn get(&self, id: &str) -> Result<BlockStorage, ApiError> {
        let envelope: BlockStorageEnvelope = self.client.get(&Self::path(id)).await?;
        Ok(envelope.block)
    }

    pub async fn update(
        &self,
        id: &str,
        request: &UpdateBlockStorageRequest,
    ) -> Result<(), ApiError> {
        self.client.patch(&Self::path(id), request).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&Self::path(id)).await
    }

    pub async fn attach(
        &self,
        id: &str,
        request: &AttachBlockStorageRequest,
    ) -> Result<(), ApiError> {
        self.client
            .post(&format!("{}/attach", Self::path(id)), request)
            .await
    }

    pub async fn detach(
        &self,
        id: &str,
        request: &DetachBlockStorageRequest,
    ) -> Result<(), ApiError> {
        self.client
            .post(&format!("{}/detach", Self::path(id)), request)
            .await
    }
}
