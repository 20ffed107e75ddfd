//! Provider data structure passed to resources and data sources

use crate::api::Client;
use crate::resources::waiters::PollSettings;
use std::any::Any;
use std::sync::Arc;
use tfplug::types::Diagnostic;

#[derive(Clone)]
pub struct VultrProviderData {
    pub client: Arc<Client>,
    pub poll: PollSettings,
}

impl VultrProviderData {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
            poll: PollSettings::default(),
        }
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Extracts the provider data handed to a resource or data source by
    /// `configure`
    pub fn from_configure(
        provider_data: Option<Arc<dyn Any + Send + Sync>>,
    ) -> Result<Self, Diagnostic> {
        let Some(data) = provider_data else {
            tracing::warn!("No provider data provided");
            return Err(Diagnostic::error(
                "No provider data",
                "No provider data was provided; configure the provider first",
            ));
        };

        match data.downcast_ref::<VultrProviderData>() {
            Some(provider_data) => Ok(provider_data.clone()),
            None => {
                tracing::error!("Failed to downcast provider data to VultrProviderData");
                Err(Diagnostic::error(
                    "Invalid provider data",
                    "Failed to extract VultrProviderData from provider data",
                ))
            }
        }
    }
}

/// Error diagnostic for handlers invoked before `configure`
pub(crate) fn not_configured() -> Diagnostic {
    Diagnostic::error(
        "Provider not configured",
        "Provider data was not properly configured",
    )
}

/// Provider data against a mock API with millisecond poll timings
#[cfg(test)]
pub(crate) fn test_provider_data(url: &str) -> VultrProviderData {
    VultrProviderData::new(crate::api::client::test_client(url))
        .with_poll_settings(PollSettings::immediate())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_configure_downcasts() {
        let client = Client::new("https://api.vultr.com", "key").unwrap();
        let data: Arc<dyn Any + Send + Sync> = Arc::new(VultrProviderData::new(client));

        let extracted = VultrProviderData::from_configure(Some(data)).unwrap();
        assert_eq!(extracted.client.base_url(), "https://api.vultr.com");
    }

    #[test]
    fn from_configure_rejects_missing_or_foreign_data() {
        let missing = VultrProviderData::from_configure(None).err().unwrap();
        assert_eq!(missing.summary, "No provider data");

        let foreign: Arc<dyn Any + Send + Sync> = Arc::new("not provider data");
        let invalid = VultrProviderData::from_configure(Some(foreign)).err().unwrap();
        assert_eq!(invalid.summary, "Invalid provider data");
    }
}
