//! Provider Registry - Loads, Negotiates and Looks Up Providers

use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;

use crate::diagnostics::Diagnostic;
use crate::handshake::{check_compatibility, ProviderHandshake};
use crate::provider::Provider;

/// A provider excluded at load time, with the reasons.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedProvider {
    pub provider_id: String,
    pub handshake: ProviderHandshake,
    pub diagnostics: Vec<Diagnostic>,
}

/// Active providers in registration order.
pub struct ProviderRegistry {
    expected_sdk: String,
    providers: IndexMap<String, Arc<dyn Provider>>,
    rejected: Vec<RejectedProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::with_sdk_version(crate::SDK_VERSION)
    }

    pub fn with_sdk_version(expected_sdk: impl Into<String>) -> Self {
        Self {
            expected_sdk: expected_sdk.into(),
            providers: IndexMap::new(),
            rejected: vec![],
        }
    }

    /// Registry holding every built-in provider that negotiates successfully.
    pub fn builtin() -> Self {
        Self::load(crate::providers::builtin())
    }

    pub fn load(candidates: impl IntoIterator<Item = Arc<dyn Provider>>) -> Self {
        let mut registry = Self::new();
        for provider in candidates {
            // Rejections are kept on the registry; nothing to do here.
            let _ = registry.register(provider);
        }
        registry
    }

    /// Negotiates the provider's SDK version and activates it when
    /// compatible. Re-registering an id replaces the previous provider.
    pub fn register(&mut self, provider: Arc<dyn Provider>) -> Result<(), Vec<Diagnostic>> {
        let handshake = provider.handshake().clone();
        let diagnostics = check_compatibility(&self.expected_sdk, &handshake);

        if !diagnostics.is_empty() {
            for diagnostic in &diagnostics {
                log::warn!("Excluding provider '{}': {}", handshake.provider_id, diagnostic.message);
            }
            self.rejected.push(RejectedProvider {
                provider_id: handshake.provider_id.clone(),
                handshake,
                diagnostics: diagnostics.clone(),
            });
            return Err(diagnostics);
        }

        log::debug!(
            "Registered provider '{}' v{} (sdk {})",
            handshake.provider_id,
            handshake.version,
            handshake.sdk_version
        );
        self.providers.insert(handshake.provider_id, provider);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Provider>> {
        self.providers.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    pub fn list(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.providers.values()
    }

    pub fn rejected(&self) -> &[RejectedProvider] {
        &self.rejected
    }

    pub fn expected_sdk(&self) -> &str {
        &self.expected_sdk
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
