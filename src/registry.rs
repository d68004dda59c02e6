//! Provider registry and selection policy.
//!
//! Resolves which adapters handle a given document based on:
//! 1. Disaster domain hints → up to 3 adapters, disaster-capable first
//! 2. Complex document types (policy, legal) → all registered adapters
//! 3. Default → top 2 adapters by prior reliability
//!
//! Selection is a static, input-dependent decision: identical hints and an
//! unchanged registry always yield the same adapter order (stable sorts,
//! registration order as the base order).

use std::cmp::Ordering;
use std::sync::Arc;

use crate::config::CredentialStore;
use crate::provider::{
    GeminiProvider, GrokProvider, OpenAiProvider, ProviderAdapter, ProviderMetadata,
};
use crate::types::{DocumentType, DomainHints};

/// Tags that mark an adapter (by name or specialty) as disaster-capable.
const DISASTER_TAGS: &[&str] = &["disaster", "damage", "storm", "hurricane", "flood"];

/// Maximum fan-out in a disaster scenario.
const DISASTER_SELECTION_LIMIT: usize = 3;

/// Default fan-out for ordinary documents.
const DEFAULT_SELECTION_LIMIT: usize = 2;

/// Holds all configured adapters in registration order.
#[derive(Default)]
pub struct ProviderRegistry {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from a credentials bag. A provider whose
    /// credential is absent is silently not registered — never an error.
    pub fn from_credentials(credentials: &CredentialStore) -> Self {
        let mut registry = Self::new();
        if let Some(key) = credentials.get("openai") {
            registry.register(Arc::new(OpenAiProvider::new(key)));
        }
        if let Some(key) = credentials.get("gemini") {
            registry.register(Arc::new(GeminiProvider::new(key)));
        }
        if let Some(key) = credentials.get("grok") {
            registry.register(Arc::new(GrokProvider::new(key)));
        }
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.push(adapter);
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Pick the ordered subset of adapters to invoke for one document.
    pub fn select(
        &self,
        document_type_hint: Option<DocumentType>,
        domain_hints: DomainHints,
    ) -> Vec<Arc<dyn ProviderAdapter>> {
        if domain_hints.is_disaster() {
            // Disaster scenario: disaster-capable adapters first, relative
            // order preserved otherwise, capped fan-out.
            let mut selected = self.adapters.clone();
            selected.sort_by_key(|a| !matches_disaster_tags(a.metadata()));
            selected.truncate(DISASTER_SELECTION_LIMIT);
            return selected;
        }

        if document_type_hint.is_some_and(|t| t.is_complex()) {
            // Complex documents benefit from maximum cross-checking.
            return self.adapters.clone();
        }

        let mut selected = self.adapters.clone();
        selected.sort_by(|a, b| {
            b.metadata()
                .base_confidence
                .partial_cmp(&a.metadata().base_confidence)
                .unwrap_or(Ordering::Equal)
        });
        selected.truncate(DEFAULT_SELECTION_LIMIT);
        selected
    }
}

fn matches_disaster_tags(meta: &ProviderMetadata) -> bool {
    DISASTER_TAGS.iter().any(|tag| {
        meta.name.contains(tag) || meta.specialties.contains(tag)
    })
}
