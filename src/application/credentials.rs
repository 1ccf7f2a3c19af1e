// Credential check gating ingestion
use std::collections::HashSet;

/// Yes/no credential policy supplied by the administration layer.
pub trait CredentialVerifier: Send + Sync {
    fn is_valid_credential(&self, key: &str) -> bool;
}

/// Fixed set of API keys loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticApiKeys {
    keys: HashSet<String>,
}

impl StaticApiKeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(Into::into)
                .filter(|k: &String| !k.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl CredentialVerifier for StaticApiKeys {
    fn is_valid_credential(&self, key: &str) -> bool {
        !key.is_empty() && self.keys.contains(key)
    }
}
