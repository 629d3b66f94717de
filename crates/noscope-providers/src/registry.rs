use std::sync::Arc;

use noscope_types::provider::ProviderInfo;

use crate::provider::Provider;

/// Holds every provider configured for a run and resolves the default
/// used when a plan or phase doesn't name one explicitly.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
    default_provider: Option<String>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Arc<dyn Provider>>, default_provider: Option<String>) -> Self {
        Self { providers, default_provider }
    }

    pub fn list(&self) -> Vec<ProviderInfo> {
        self.providers.iter().map(|p| p.info()).collect()
    }

    pub fn select(&self, provider_id: Option<&str>) -> anyhow::Result<Arc<dyn Provider>> {
        let wanted = provider_id.or(self.default_provider.as_deref());
        match wanted {
            Some(id) => self
                .providers
                .iter()
                .find(|p| p.info().id == id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no provider registered with id '{id}'")),
            None => self
                .providers
                .first()
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no providers configured")),
        }
    }
}
