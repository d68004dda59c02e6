use std::collections::HashMap;

/// Bounded per-call timeout applied by every HTTP adapter.
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 45;

/// Environment variables consulted by [`CredentialStore::from_env`],
/// keyed by provider name.
const ENV_KEYS: &[(&str, &str)] = &[
    ("openai", "OPENAI_API_KEY"),
    ("gemini", "GEMINI_API_KEY"),
    ("grok", "XAI_API_KEY"),
];

/// Credentials bag keyed by provider name.
///
/// Absence of a credential simply excludes that provider from the registry;
/// no partial-credential error is ever raised.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    keys: HashMap<String, String>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read known provider keys from the environment. Unset or empty
    /// variables are silently skipped.
    pub fn from_env() -> Self {
        let mut store = Self::new();
        for (provider, var) in ENV_KEYS {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    store.keys.insert(provider.to_string(), value);
                }
            }
        }
        store
    }

    pub fn with_key(mut self, provider: &str, key: &str) -> Self {
        self.keys.insert(provider.to_string(), key.to_string());
        self
    }

    pub fn get(&self, provider: &str) -> Option<&str> {
        self.keys.get(provider).map(String::as_str)
    }

    pub fn has(&self, provider: &str) -> bool {
        self.keys.contains_key(provider)
    }
}
