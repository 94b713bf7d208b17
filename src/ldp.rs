//! Ed25519 Linked Data Proofs.
//!
//! <https://w3c-ccg.github.io/ld-proofs/#proof-verification-algorithm>
//!
//! Both `Ed25519Signature2018` and `Ed25519Signature2020` sign
//! `sha256(canonical proof options) || sha256(canonical document)`, where the
//! canonical form is the URDNA2015 normalization of the JSON-LD document as
//! N-Quads. A `proofValue` carries the signature as multibase; a `jws` is a
//! detached JWS with an unencoded payload.

use std::sync::Arc;

use chrono::prelude::*;
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::Connectivity;
use crate::context_loader::DocumentResolver;
use crate::crypto::CryptoBackend;
use crate::did::{self, DID_CONTEXT};
use crate::error::Error;
use crate::jsonld::{self, Loader, AT_CONTEXT};
use crate::key_resolver::{KeyView, PublicKeyResolver};
use crate::keys;
use crate::urdna2015;

const PROOF_VALUE: &str = "proofValue";
const JWS: &str = "jws";
const SIGNATURE_VALUE: &str = "signatureValue";

/// Signature suites this verifier understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofSuite {
    Ed25519Signature2020,
    Ed25519Signature2018,
    Unsupported(String),
}

impl ProofSuite {
    pub fn from_type(type_: &str) -> Self {
        match type_ {
            "Ed25519Signature2020" => Self::Ed25519Signature2020,
            "Ed25519Signature2018" => Self::Ed25519Signature2018,
            other => Self::Unsupported(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Ed25519Signature2020 => "Ed25519Signature2020",
            Self::Ed25519Signature2018 => "Ed25519Signature2018",
            Self::Unsupported(name) => name,
        }
    }
}

/// Options for creating a proof.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedDataProofOptions {
    pub verification_method: String,
    pub proof_purpose: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl LinkedDataProofOptions {
    pub fn new(verification_method: impl Into<String>) -> Self {
        Self {
            verification_method: verification_method.into(),
            proof_purpose: crate::config::DEFAULT_PROOF_PURPOSE.to_string(),
            created: None,
        }
    }
}

/// Verifies the proofs of a credential against resolved keys and contexts.
pub struct LinkedDataProofs {
    documents: DocumentResolver,
    keys: PublicKeyResolver,
    backend: Arc<dyn CryptoBackend>,
    default_proof_purpose: String,
}

impl LinkedDataProofs {
    pub fn new(
        documents: DocumentResolver,
        keys: PublicKeyResolver,
        backend: Arc<dyn CryptoBackend>,
        default_proof_purpose: impl Into<String>,
    ) -> Self {
        Self {
            documents,
            keys,
            backend,
            default_proof_purpose: default_proof_purpose.into(),
        }
    }

    /// When offline, every `@context` the credential names must already be
    /// cached.
    pub async fn preflight(&self, credential: &Value, connectivity: Connectivity) -> Result<(), Error> {
        if !connectivity.is_offline() {
            return Ok(());
        }
        for url in jsonld::top_level_context_urls(credential) {
            if !self.documents.is_cached(&url).await {
                log::debug!("offline preflight: context {} not cached", url);
                return Err(Error::OfflineDependenciesMissing(url));
            }
        }
        Ok(())
    }

    /// Verify one proof of `credential`. `Ok(())` means the signature is
    /// valid.
    pub async fn verify(
        &self,
        credential: &Value,
        proof: &Map<String, Value>,
        connectivity: Connectivity,
    ) -> Result<(), Error> {
        let type_ = proof.get("type").and_then(Value::as_str).unwrap_or_default();
        match ProofSuite::from_type(type_) {
            ProofSuite::Ed25519Signature2020 | ProofSuite::Ed25519Signature2018 => {}
            ProofSuite::Unsupported(name) => return Err(Error::UnsupportedProofType(name)),
        }

        let key_id = proof
            .get("verificationMethod")
            .and_then(Value::as_str)
            .ok_or(Error::MissingVerificationMethod)?;
        let key = match self.keys.resolve(key_id, connectivity).await? {
            Some(key) => key,
            None if connectivity.is_offline() => {
                return Err(Error::OfflineDependenciesMissing(key_id.to_string()))
            }
            None => return Err(Error::VerificationMethodNotFound(key_id.to_string())),
        };

        let purpose = proof
            .get("proofPurpose")
            .and_then(Value::as_str)
            .unwrap_or(self.default_proof_purpose.as_str());
        let vm = key.to_verification_method();
        let controller = controller_document(&key, purpose);
        check_purpose(&vm, &controller, key_id, purpose)?;

        let public_key = key.ed25519_public_key()?;
        let loader = self.documents.loader(connectivity);
        let (message, signature) = match (proof.get(PROOF_VALUE), proof.get(JWS)) {
            (Some(Value::String(proof_value)), _) => {
                let (_, signature) = multibase::decode(proof_value)?;
                let data = verify_data(credential, proof, &loader, &*self.backend).await?;
                (data, signature)
            }
            (_, Some(Value::String(jws))) => {
                let (header_b64, signature) = split_detached_jws(jws)?;
                let data = verify_data(credential, proof, &loader, &*self.backend).await?;
                ([header_b64.as_bytes(), b".", data.as_slice()].concat(), signature)
            }
            _ => return Err(Error::MissingProofSignature),
        };
        if !self
            .backend
            .verify_ed25519(&public_key, &message, &signature)
        {
            return Err(Error::InvalidSignature);
        }
        log::debug!("{} proof by {} verified with {}", type_, key_id, self.backend.name());
        Ok(())
    }
}

/// Controller document authorizing `key` for `purpose`.
fn controller_document(key: &KeyView, purpose: &str) -> Value {
    json!({
        "@context": DID_CONTEXT,
        "id": key.controller,
        purpose: [key.id],
    })
}

fn check_purpose(vm: &Value, controller: &Value, key_id: &str, purpose: &str) -> Result<(), Error> {
    if vm.get("id").and_then(Value::as_str) != Some(key_id) {
        return Err(Error::VerificationMethodNotFound(key_id.to_string()));
    }
    if vm.get("controller") != controller.get("id") {
        return Err(Error::InvalidProofPurpose(purpose.to_string()));
    }
    if !did::relationships_of(controller, key_id)
        .iter()
        .any(|relationship| relationship == purpose)
    {
        return Err(Error::InvalidProofPurpose(purpose.to_string()));
    }
    Ok(())
}

/// Split `header..signature` and check the header is an unencoded-payload
/// EdDSA header.
fn split_detached_jws(jws: &str) -> Result<(&str, Vec<u8>), Error> {
    let mut parts = jws.splitn(3, '.');
    let (header_b64, signature_b64) = match (parts.next(), parts.next(), parts.next()) {
        (Some(header_b64), Some(""), Some(signature_b64)) => (header_b64, signature_b64),
        _ => return Err(Error::InvalidJws),
    };
    let header: Map<String, Value> = serde_json::from_slice(&keys::decode_base64url(header_b64)?)?;
    match header.get("alg").and_then(Value::as_str) {
        Some("EdDSA") => {}
        other => return Err(Error::AlgorithmMismatch(other.unwrap_or_default().to_string())),
    }
    if header.get("b64") != Some(&Value::Bool(false)) {
        return Err(Error::ExpectedUnencodedHeader);
    }
    let crit = header.get("crit").and_then(Value::as_array);
    for name in crit.into_iter().flatten() {
        if name.as_str() != Some("b64") {
            return Err(Error::UnknownCriticalHeader);
        }
    }
    Ok((header_b64, keys::decode_base64url(signature_b64)?))
}

/// `sha256(canonical proof options) || sha256(canonical document)`.
pub async fn verify_data(
    credential: &Value,
    proof: &Map<String, Value>,
    loader: &dyn Loader,
    backend: &dyn CryptoBackend,
) -> Result<Vec<u8>, Error> {
    let mut document = credential.as_object().ok_or(Error::ExpectedObject)?.clone();
    document.remove("proof");
    let mut options = proof.clone();
    for property in [PROOF_VALUE, JWS, SIGNATURE_VALUE] {
        options.remove(property);
    }
    options.insert(
        AT_CONTEXT.to_string(),
        document.get(AT_CONTEXT).cloned().unwrap_or(Value::Null),
    );

    let options_nquads = canonicalize(&Value::Object(options), loader, backend).await?;
    let document_nquads = canonicalize(&Value::Object(document), loader, backend).await?;
    Ok([
        backend.sha256(options_nquads.as_bytes()),
        backend.sha256(document_nquads.as_bytes()),
    ]
    .concat())
}

/// URDNA2015 N-Quads of a JSON-LD document.
pub async fn canonicalize(
    document: &Value,
    loader: &dyn Loader,
    backend: &dyn CryptoBackend,
) -> Result<String, Error> {
    let dataset = jsonld::to_dataset(document, loader).await?;
    urdna2015::normalize(&dataset, backend)?.to_nquads()
}

/// Create a proof over `credential`. `Ed25519Signature2020` proofs carry a
/// multibase `proofValue`; `Ed25519Signature2018` proofs a detached JWS.
pub async fn sign(
    credential: &Value,
    suite: &ProofSuite,
    options: &LinkedDataProofOptions,
    key: &SigningKey,
    loader: &dyn Loader,
    backend: &dyn CryptoBackend,
) -> Result<Value, Error> {
    if let ProofSuite::Unsupported(name) = suite {
        return Err(Error::UnsupportedProofType(name.clone()));
    }
    let created = options.created.unwrap_or_else(Utc::now);
    let mut proof = Map::new();
    proof.insert("type".to_string(), suite.name().into());
    proof.insert(
        "created".to_string(),
        created.to_rfc3339_opts(SecondsFormat::Secs, true).into(),
    );
    proof.insert(
        "verificationMethod".to_string(),
        options.verification_method.clone().into(),
    );
    proof.insert("proofPurpose".to_string(), options.proof_purpose.clone().into());

    let data = verify_data(credential, &proof, loader, backend).await?;
    match suite {
        ProofSuite::Ed25519Signature2020 => {
            let signature = key.sign(&data).to_bytes();
            proof.insert(
                PROOF_VALUE.to_string(),
                multibase::encode(multibase::Base::Base58Btc, signature).into(),
            );
        }
        _ => {
            let header = json!({ "alg": "EdDSA", "b64": false, "crit": ["b64"] });
            let header_b64 = keys::encode_base64url(&serde_json::to_vec(&header)?);
            let message = [header_b64.as_bytes(), b".", data.as_slice()].concat();
            let signature = keys::encode_base64url(&key.sign(&message).to_bytes());
            proof.insert(JWS.to_string(), format!("{}..{}", header_b64, signature).into());
        }
    }
    Ok(Value::Object(proof))
}
