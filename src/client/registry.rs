//! The set of sources a search can fan out to.

use crate::client::providers::{builtin_providers, SourceDescriptor, SourceProvider};
use crate::client::record::Category;
use crate::client::torznab::TorznabProvider;
use crate::Config;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Every adapter known to the application, in display order
#[derive(Clone, Default)]
pub struct SourceRegistry {
    providers: Vec<Arc<dyn SourceProvider>>,
}

impl SourceRegistry {
    /// Create a registry from already constructed adapters.
    ///
    /// Ids must be unique; later duplicates are skipped.
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn SourceProvider>>) -> Self {
        let mut seen = HashSet::new();
        let providers = providers
            .into_iter()
            .filter(|provider| {
                let fresh = seen.insert(provider.id().to_string());
                if !fresh {
                    warn!("Skipping duplicate source id '{}'", provider.id());
                }
                fresh
            })
            .collect();
        Self { providers }
    }

    /// Builtins (with base URL overrides applied) followed by the configured indexers
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut providers = builtin_providers(&config.sources.base_urls);
        providers.extend(
            config
                .indexers
                .iter()
                .cloned()
                .map(|indexer| Arc::new(TorznabProvider::new(indexer)) as Arc<dyn SourceProvider>),
        );

        let registry = Self::new(providers);
        info!(
            "Registered {} sources ({} indexers)",
            registry.len(),
            config.indexers.len()
        );
        registry
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.providers.iter().map(|provider| provider.descriptor())
    }

    /// Ids of the sources enabled when the user has not chosen any
    #[must_use]
    pub fn default_enabled(&self) -> Vec<String> {
        self.descriptors()
            .filter(|descriptor| descriptor.default_enabled)
            .map(|descriptor| descriptor.id.clone())
            .collect()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn SourceProvider>> {
        self.providers
            .iter()
            .find(|provider| provider.id() == id)
            .cloned()
    }

    /// Adapters that are enabled and serve `category`, in registry order
    #[must_use]
    pub fn eligible(
        &self,
        enabled: &HashSet<String>,
        category: Category,
    ) -> Vec<Arc<dyn SourceProvider>> {
        self.providers
            .iter()
            .filter(|provider| enabled.contains(provider.id()))
            .filter(|provider| provider.descriptor().serves(category))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
