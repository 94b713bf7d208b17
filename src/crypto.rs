//! Digest and signature primitives.
//!
//! Verification never calls a primitive directly: a [`CryptoBackend`] is
//! chosen once when the verifier is built and passed down. The host backend
//! uses `ring` (feature `ring`); the software backend uses `sha2` and
//! `ed25519-dalek` and is available on every target.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// SHA-256 digest and Ed25519 signature verification.
pub trait CryptoBackend: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn sha256(&self, data: &[u8]) -> [u8; 32];

    /// Verify an Ed25519 signature over `message`. Malformed keys and
    /// signatures verify as `false`.
    fn verify_ed25519(&self, public_key: &[u8; 32], message: &[u8], signature: &[u8]) -> bool;
}

/// Which backend to select at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Host,
    Software,
}

/// Select the backend for `kind`.
///
/// Asking for the host backend in a build without the `ring` feature yields
/// the software backend.
pub fn select_backend(kind: BackendKind) -> Arc<dyn CryptoBackend> {
    match kind {
        #[cfg(feature = "ring")]
        BackendKind::Host => Arc::new(RingBackend),
        #[cfg(not(feature = "ring"))]
        BackendKind::Host => {
            log::warn!("host crypto backend not compiled in, using software backend");
            Arc::new(SoftwareBackend)
        }
        BackendKind::Software => Arc::new(SoftwareBackend),
    }
}

/// Lowercase hex SHA-256, as used by the canonicalization algorithm.
pub fn sha256_hex(backend: &dyn CryptoBackend, data: &[u8]) -> String {
    hex::encode(backend.sha256(data))
}

#[cfg(feature = "ring")]
#[derive(Debug, Clone, Copy, Default)]
pub struct RingBackend;

#[cfg(feature = "ring")]
impl CryptoBackend for RingBackend {
    fn name(&self) -> &'static str {
        "ring"
    }

    fn sha256(&self, data: &[u8]) -> [u8; 32] {
        let digest = ring::digest::digest(&ring::digest::SHA256, data);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(digest.as_ref());
        hash
    }

    fn verify_ed25519(&self, public_key: &[u8; 32], message: &[u8], signature: &[u8]) -> bool {
        ring::signature::UnparsedPublicKey::new(&ring::signature::ED25519, public_key)
            .verify(message, signature)
            .is_ok()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareBackend;

impl CryptoBackend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "software"
    }

    fn sha256(&self, data: &[u8]) -> [u8; 32] {
        use sha2::Digest;
        sha2::Sha256::digest(data).into()
    }

    fn verify_ed25519(&self, public_key: &[u8; 32], message: &[u8], signature: &[u8]) -> bool {
        use ed25519_dalek::Verifier;
        let Ok(key) = ed25519_dalek::VerifyingKey::from_bytes(public_key) else {
            return false;
        };
        let Ok(signature) = ed25519_dalek::Signature::from_slice(signature) else {
            return false;
        };
        key.verify(message, &signature).is_ok()
    }
}
