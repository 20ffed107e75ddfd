//! CDN pull and push zone API implementation

use super::client::Client;
use super::error::ApiError;
use serde::{Deserialize, Serialize};

/// Pull zones mirror an origin domain, push zones serve uploaded files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneKind {
    Pull,
    Push,
}

impl ZoneKind {
    fn collection_path(self) -> &'static str {
        match self {
            ZoneKind::Pull => "/v2/cdns/pull-zones",
            ZoneKind::Push => "/v2/cdns/push-zones",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ZoneKind::Pull => "pull",
            ZoneKind::Push => "push",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CdnZone {
    pub id: String,
    #[serde(default)]
    pub date_created: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub origin_domain: String,
    #[serde(default)]
    pub cdn_url: String,
}

#[derive(Debug, Deserialize)]
struct ZoneEnvelope {
    #[serde(rename = "pull_zone", alias = "push_zone")]
    zone: CdnZone,
}

#[derive(Debug, Deserialize)]
struct ZoneListEnvelope {
    #[serde(rename = "pull_zones", alias = "push_zones", default)]
    zones: Vec<CdnZone>,
}

#[derive(Debug, Default, Serialize)]
pub struct CdnZoneRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_domain: Option<String>,
}

#[derive(Clone, Copy)]
pub struct CdnApi<'a> {
    client: &'a Client,
}

impl<'a> CdnApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub fn zones(&self, kind: ZoneKind) -> ZonesApi<'a> {
        ZonesApi {
            client: self.client,
            kind,
        }
    }

    pub fn pull_zones(&self) -> ZonesApi<'a> {
        self.zones(ZoneKind::Pull)
    }

    pub fn push_zones(&self) -> ZonesApi<'a> {
        self.zones(ZoneKind::Push)
    }
}

#[derive(Clone, Copy)]
pub struct ZonesApi<'a> {
    client: &'a Client,
    kind: ZoneKind,
}

impl ZonesApi<'_> {
    fn path(&self, id: &str) -> String {
        format!(
            "{}/{}",
            self.kind.collection_path(),
            urlencoding::encode(id)
        )
    }

    pub async fn create(&self, request: &CdnZoneRequest) -> Result<CdnZone, ApiError> {
        let envelope: ZoneEnvelope = self
            .client
            .post(self.kind.collection_path(), request)
            .await?;
        Ok(envelope.zone)
    }

    pub async fn get(&self, id: &str) -> Result<CdnZone, ApiError> {
        let envelope: ZoneEnvelope = self.client.get(&self.path(id)).await?;
        Ok(envelope.zone)
    }

    pub async fn update(&self, id: &str, request: &CdnZoneRequest) -> Result<CdnZone, ApiError> {
        let envelope: ZoneEnvelope = self.client.put(&self.path(id), request).await?;
        Ok(envelope.zone)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&self.path(id)).await
    }

    pub async fn list(&self) -> Result<Vec<CdnZone>, ApiError> {
        let envelope: ZoneListEnvelope = self.client.get(self.kind.collection_path()).await?;
        Ok(envelope.zones)
    }
}
