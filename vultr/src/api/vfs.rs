//! Virtual file system storage API implementation

use super::client::Client;
use super::error::ApiError;
use serde::{Deserialize, Serialize};

pub const ATTACHMENT_ATTACHED: &str = "ATTACHED";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualFileSystemStorage {
    pub id: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub date_created: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub disk_type: String,
    #[serde(default)]
    pub storage_size: StorageSize,
    #[serde(default)]
    pub billing: Billing,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSize {
    #[serde(default)]
    pub gb: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Billing {
    #[serde(default)]
    pub charges: f64,
    #[serde(default)]
    pub monthly: f64,
}

/// Link between a storage subscription and an instance
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub vfs_id: String,
    #[serde(default)]
    pub target_id: String,
    #[serde(default)]
    pub mount_tag: u64,
}

#[derive(Debug, Deserialize)]
struct AttachmentList {
    #[serde(default)]
    attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
pub struct CreateVfsRequest {
    pub region: String,
    pub label: String,
    pub storage_size: StorageSize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_type: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct UpdateVfsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_size: Option<StorageSize>,
}

impl UpdateVfsRequest {
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.storage_size.is_none()
    }
}

#[derive(Clone, Copy)]
pub struct VfsApi<'a> {
    client: &'a Client,
}

impl<'a> VfsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn path(id: &str) -> String {
        format!("/v2/vfs/{}", urlencoding::encode(id))
    }

    fn attachment_path(id: &str, target_id: &str) -> String {
        format!(
            "{}/attachments/{}",
            Self::path(id),
            urlencoding::encode(target_id)
        )
    }

    pub async fn create(
        &self,
        request: &CreateVfsRequest,
    ) -> Result<VirtualFileSystemStorage, ApiError> {
        self.client.post("/v2/vfs", request).await
    }

    pub async fn get(&self, id: &str) -> Result<VirtualFileSystemStorage, ApiError> {
        self.client.get(&Self::path(id)).await
    }

    pub async fn update(
        &self,
        id: &str,
        request: &UpdateVfsRequest,
    ) -> Result<VirtualFileSystemStorage, ApiError> {
        self.client.put(&Self::path(id), request).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&Self::path(id)).await
    }

    pub async fn attachments(&self, id: &str) -> Result<Vec<Attachment>, ApiError> {
        let list: AttachmentList = self
            .client
            .get(&format!("{}/attachments", Self::path(id)))
            .await?;
        Ok(list.attachments)
    }

    pub async fn attachment(&self, id: &str, target_id: &str) -> Result<Attachment, ApiError> {
        self.client
            .get(&Self::attachment_path(id, target_id))
            .await
    }

    pub async fn attach(&self, id: &str, target_id: &str) -> Result<Attachment, ApiError> {
        self.client
            .put(
                &Self::attachment_path(id, target_id),
                &serde_json::Map::new(),
            )
            .await
    }

    pub async fn detach(&self, id: &str, target_id: &str) -> Result<(), ApiError> {
        self.client
            .delete(&Self::attachment_path(id, target_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::test_client;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn get_reads_nested_size_and_billing() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v2/vfs/v1")
            .with_body(
                r#"{"id":"v1","region":"ewr","status":"active","label":"shared",
                    "tags":["web"],"disk_type":"nvme",
                    "storage_size":{"bytes":10737418240,"gb":10},
                    "billing":{"charges":0.25,"monthly":1.0}}"#,
            )
            .create_async()
            .await;

        let vfs = test_client(&server.url()).vfs().get("v1").await.unwrap();

        assert_eq!(vfs.storage_size.gb, 10);
        assert_eq!(vfs.billing.monthly, 1.0);
        assert_eq!(vfs.billing.charges, 0.25);
        assert_eq!(vfs.tags, vec!["web".to_string()]);
    }

    #[tokio::test]
    async fn update_sends_only_changed_fields() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/v2/vfs/v1")
            .match_body(Matcher::Json(serde_json::json!({"storage_size": {"gb": 20}})))
            .with_body(r#"{"id":"v1","storage_size":{"gb":20}}"#)
            .create_async()
            .await;

        let request = UpdateVfsRequest {
            label: None,
            storage_size: Some(StorageSize { gb: 20 }),
        };
        let vfs = test_client(&server.url())
            .vfs()
            .update("v1", &request)
            .await
            .unwrap();

        assert_eq!(vfs.storage_size.gb, 20);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn attachment_endpoints() {
        let mut server = Server::new_async().await;
        let _list = server
            .mock("GET", "/v2/vfs/v1/attachments")
            .with_body(
                r#"{"attachments":[{"state":"ATTACHED","vfs_id":"v1","target_id":"i1","mount_tag":7}]}"#,
            )
            .create_async()
            .await;
        let attach = server
            .mock("PUT", "/v2/vfs/v1/attachments/i2")
            .with_body(r#"{"state":"PENDING","vfs_id":"v1","target_id":"i2","mount_tag":8}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let attachments = client.vfs().attachments("v1").await.unwrap();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].state, ATTACHMENT_ATTACHED);
        assert_eq!(attachments[0].mount_tag, 7);

        let attachment = client.vfs().attach("v1", "i2").await.unwrap();
        assert_eq!(attachment.state, "PENDING");
        attach.assert_async().await;
    }
}
