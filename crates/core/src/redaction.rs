//! Secret redaction
//!
//! Credentials are passed to the data-plane client on its command line, so every
//! command line is run through the registry before it is logged or embedded in an
//! error. Detection is plain substring scanning.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

/// Values shorter than this are not registered; they would mangle unrelated text
const MIN_REDACTION_LENGTH: usize = 4;

/// Replacement text for redacted secrets
pub const REDACTION_PLACEHOLDER: &str = "****";

/// Thread-safe registry of secret values
#[derive(Debug, Clone, Default)]
pub struct SecretRegistry {
    inner: Arc<RwLock<BTreeSet<String>>>,
}

impl SecretRegistry {
    /// Create a new empty secret registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret value to the registry
    pub fn add_secret(&self, secret: &str) {
        if secret.len() < MIN_REDACTION_LENGTH {
            return;
        }
        if let Ok(mut inner) = self.inner.write() {
            inner.insert(secret.to_string());
        }
    }

    /// Replace every registered secret in `text` with the placeholder.
    ///
    /// Longer secrets are replaced first so that a secret containing another one
    /// is not left half-redacted.
    pub fn redact_text(&self, text: &str) -> String {
        let Ok(inner) = self.inner.read() else {
            return text.to_string();
        };

        let mut secrets: Vec<&String> = inner.iter().collect();
        secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));

        let mut result = text.to_string();
        for secret in secrets {
            if result.contains(secret.as_str()) {
                result = result.replace(secret.as_str(), REDACTION_PLACEHOLDER);
            }
        }
        result
    }

    /// Number of registered secrets
    pub fn secret_count(&self) -> usize {
        self.inner.read().map(|inner| inner.len()).unwrap_or(0)
    }

    /// Clear all registered secrets
    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.clear();
        }
    }
}

static GLOBAL_REGISTRY: once_cell::sync::Lazy<SecretRegistry> =
    once_cell::sync::Lazy::new(SecretRegistry::new);

/// Get the global secret registry instance
pub fn global_registry() -> &'static SecretRegistry {
    &GLOBAL_REGISTRY
}

/// Add a secret to the global registry
pub fn add_global_secret(secret: &str) {
    global_registry().add_secret(secret);
}

/// Redact text using the global registry
pub fn redact(text: &str) -> String {
    global_registry().redact_text(text)
}
