//! Runtime configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::BackendKind;
use crate::error::Error;

/// Default purpose a verification method must be authorized for when a proof
/// does not state one.
pub const DEFAULT_PROOF_PURPOSE: &str = "assertionMethod";

/// Network permission supplied by the host environment.
///
/// `Unknown` is what an absent connectivity signal maps to: network
/// operations are attempted optimistically. Only an explicit `Offline`
/// forces the offline-only resolution paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    #[default]
    Unknown,
    Online,
    Offline,
}

impl Connectivity {
    pub fn allows_network(&self) -> bool {
        !self.is_offline()
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, Connectivity::Offline)
    }
}

impl From<Option<bool>> for Connectivity {
    fn from(online: Option<bool>) -> Self {
        match online {
            None => Connectivity::Unknown,
            Some(true) => Connectivity::Online,
            Some(false) => Connectivity::Offline,
        }
    }
}

impl From<bool> for Connectivity {
    fn from(online: bool) -> Self {
        Some(online).into()
    }
}

/// Verifier configuration.
///
/// Every field has a default so a partial JSON document is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifierConfig {
    /// Connectivity signal; absent means "try the network".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
    pub crypto_backend: BackendKind,
    pub http_timeout_secs: u64,
    /// Storage key prefix isolating this cache instance from others sharing
    /// the same storage.
    pub cache_namespace: String,
    pub default_proof_purpose: String,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            online: None,
            crypto_backend: BackendKind::default(),
            http_timeout_secs: 10,
            cache_namespace: "ssi-offline".to_string(),
            default_proof_purpose: DEFAULT_PROOF_PURPOSE.to_string(),
        }
    }
}

impl VerifierConfig {
    pub fn connectivity(&self) -> Connectivity {
        self.online.into()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn from_json_str(data: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(data)?)
    }

    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let data = async_std::fs::read_to_string(path.as_ref()).await?;
        Self::from_json_str(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_from_signal() {
        assert_eq!(Connectivity::from(None), Connectivity::Unknown);
        assert!(Connectivity::Unknown.allows_network());
        assert!(Connectivity::from(true).allows_network());
        assert!(Connectivity::from(false).is_offline());
        assert!(!Connectivity::from(false).allows_network());
    }

    #[test]
    fn partial_config() {
        let config = VerifierConfig::from_json_str(r#"{"online": false}"#).unwrap();
        assert_eq!(config.connectivity(), Connectivity::Offline);
        assert_eq!(config.http_timeout_secs, 10);
        assert_eq!(config.default_proof_purpose, "assertionMethod");

        let config = VerifierConfig::from_json_str(
            r#"{"cryptoBackend": "software", "cacheNamespace": "tenant-a"}"#,
        )
        .unwrap();
        assert_eq!(config.crypto_backend, BackendKind::Software);
        assert_eq!(config.cache_namespace, "tenant-a");
        assert_eq!(config.connectivity(), Connectivity::Unknown);
    }
}
