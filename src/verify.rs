//! Credential verification: proofs, then revocation, then expiry.
//!
//! Every call ends in a [`VerificationResult`]; no error reaches the caller.
//! Only a missing offline dependency keeps its identity across the proof
//! boundary. Any other failure is reported as a failed verification with a
//! message.

use std::sync::Arc;

use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::cache::CacheStore;
use crate::cancel::Cancellation;
use crate::config::{Connectivity, VerifierConfig};
use crate::context_loader::DocumentResolver;
use crate::crypto::select_backend;
use crate::error::Error;
use crate::http::HttpClient;
use crate::key_resolver::PublicKeyResolver;
use crate::ldp::LinkedDataProofs;
use crate::vc::{Credential, CredentialInput};

/// Stable result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// A context or key is not cached and the network may not be used.
    OfflineDependenciesMissing,
    SignatureVerificationFailed,
    /// The signature is valid but the credential has expired.
    VcExpired,
    /// The signature is valid but the credential is revoked.
    VcRevoked,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub verification_status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl VerificationResult {
    fn success(payload: Value) -> Self {
        Self {
            verification_status: true,
            verification_message: None,
            verification_error_code: None,
            payload: Some(payload),
        }
    }

    fn failure(code: ErrorCode, message: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            verification_status: false,
            verification_message: Some(message.into()),
            verification_error_code: Some(code),
            payload,
        }
    }

    fn from_error(err: &Error, payload: Option<Value>) -> Self {
        let code = if err.is_offline_missing() {
            ErrorCode::OfflineDependenciesMissing
        } else {
            match err {
                Error::Cancelled => ErrorCode::Unknown,
                _ => ErrorCode::SignatureVerificationFailed,
            }
        };
        Self::failure(code, err.to_string(), payload)
    }
}

/// A verification result with the bookkeeping a history store keeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub id: Uuid,
    /// Where the credential came from, e.g. `scan` or `upload`.
    pub source: String,
    pub verified_at: DateTime<Utc>,
    pub result: VerificationResult,
}

pub struct CredentialVerifier {
    cache: Arc<CacheStore>,
    proofs: LinkedDataProofs,
    connectivity: Connectivity,
}

impl CredentialVerifier {
    pub fn new(cache: Arc<CacheStore>, http: Arc<dyn HttpClient>, config: &VerifierConfig) -> Self {
        let proofs = LinkedDataProofs::new(
            DocumentResolver::new(cache.clone(), http.clone()),
            PublicKeyResolver::new(cache.clone(), http),
            select_backend(config.crypto_backend),
            config.default_proof_purpose.clone(),
        );
        Self {
            cache,
            proofs,
            connectivity: config.connectivity(),
        }
    }

    pub async fn verify(&self, input: impl Into<CredentialInput>) -> VerificationResult {
        self.verify_with(input, self.connectivity, &Cancellation::default())
            .await
    }

    pub async fn verify_with(
        &self,
        input: impl Into<CredentialInput>,
        connectivity: Connectivity,
        cancellation: &Cancellation,
    ) -> VerificationResult {
        let credential = match input.into().parse() {
            Ok(credential) => credential,
            Err(e) => {
                log::info!("credential rejected: {}", e);
                return VerificationResult::failure(
                    ErrorCode::Unknown,
                    format!("Invalid credential: {}", e),
                    None,
                );
            }
        };
        let result = match self.check(&credential, connectivity, cancellation).await {
            Ok(result) => result,
            Err(e) => VerificationResult::from_error(&e, Some(credential.as_value().clone())),
        };
        log::info!(
            "credential {} verified: {} {:?}",
            credential.id().unwrap_or("<no id>"),
            result.verification_status,
            result.verification_error_code
        );
        result
    }

    pub async fn verify_report(
        &self,
        input: impl Into<CredentialInput>,
        source: impl Into<String>,
    ) -> VerificationReport {
        let result = self.verify(input).await;
        VerificationReport {
            id: Uuid::new_v4(),
            source: source.into(),
            verified_at: Utc::now(),
            result,
        }
    }

    async fn check(
        &self,
        credential: &Credential,
        connectivity: Connectivity,
        cancellation: &Cancellation,
    ) -> Result<VerificationResult, Error> {
        cancellation.check()?;
        let document = credential.as_value();
        self.proofs.preflight(document, connectivity).await?;
        let proofs = credential.proofs()?;
        for proof in &proofs {
            cancellation.check()?;
            self.proofs.verify(document, proof, connectivity).await?;
        }

        let key_id = proofs
            .first()
            .and_then(|proof| proof.get("verificationMethod"))
            .and_then(Value::as_str);
        if self.is_revoked(credential, key_id).await {
            return Ok(VerificationResult::failure(
                ErrorCode::VcRevoked,
                "Credential has been revoked",
                Some(document.clone()),
            ));
        }
        match credential.is_expired_at(Utc::now()) {
            Ok(true) => {
                return Ok(VerificationResult {
                    verification_status: true,
                    verification_message: Some("Credential has expired".to_string()),
                    verification_error_code: Some(ErrorCode::VcExpired),
                    payload: Some(document.clone()),
                })
            }
            Ok(false) => {}
            Err(e) => log::warn!("ignoring expiration: {}", e),
        }
        Ok(VerificationResult::success(document.clone()))
    }

    /// Revoked for the organization owning the signing key, or for the
    /// credential's issuer.
    async fn is_revoked(&self, credential: &Credential, key_id: Option<&str>) -> bool {
        let Some(vc_id) = credential.id() else {
            return false;
        };
        let organization_id = match key_id {
            Some(key_id) => match self.cache.keys.get(key_id).await {
                Ok(record) => record.and_then(|record| record.organization_id),
                Err(e) => {
                    log::warn!("key cache read failed for {}: {}", key_id, e);
                    None
                }
            },
            None => None,
        };
        match self
            .cache
            .revoked
            .find_revoked(vc_id, organization_id.as_deref(), credential.issuer())
            .await
        {
            Ok(record) => record.is_some(),
            Err(e) => {
                log::warn!("revocation cache read failed for {}: {}", vc_id, e);
                false
            }
        }
    }
}
