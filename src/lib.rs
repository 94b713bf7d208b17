//! Offline verification of [Verifiable Credentials][vc-data-model] secured
//! with Ed25519 [Linked Data Proofs][ld-proofs].
//!
//! Everything a proof depends on (JSON-LD context documents, issuer public
//! keys, revocation records) is read from a local [`CacheStore`]. When the
//! network may be used, missing context documents and keys are fetched and
//! cached so the next verification of a credential from the same issuer needs
//! no network at all. When it may not, a missing dependency is reported as
//! [`ErrorCode::OfflineDependenciesMissing`] rather than as a bad signature.
//!
//! [vc-data-model]: <https://www.w3.org/TR/vc-data-model/>
//! [ld-proofs]: <https://w3c-ccg.github.io/ld-proofs/>
//!
//! # Basic Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use ssi_offline::{CacheStore, CredentialVerifier, FileStorage, VerifierConfig};
//!
//! # async fn run(credential_json: &str) -> Result<(), ssi_offline::Error> {
//! let config = VerifierConfig { online: Some(false), ..VerifierConfig::default() };
//! let storage = Arc::new(FileStorage::open("cache").await?);
//! let cache = Arc::new(CacheStore::new(storage, &config.cache_namespace));
//! let verifier = CredentialVerifier::new(cache, Arc::new(ssi_offline::NoHttpClient), &config);
//!
//! let result = verifier.verify(credential_json).await;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cancel;
pub mod config;
pub mod context_loader;
pub mod crypto;
pub mod did;
pub mod error;
pub mod http;
pub mod jsonld;
pub mod key_resolver;
pub mod keys;
pub mod ldp;
pub mod rdf;
pub mod seed;
pub mod storage;
pub mod urdna2015;
pub mod vc;
pub mod verify;

pub use cache::{CacheStore, ContextRecord, ContextSource, PublicKeyRecord, RevokedVcRecord};
pub use cancel::Cancellation;
pub use config::{Connectivity, VerifierConfig};
pub use crypto::{select_backend, BackendKind, CryptoBackend};
pub use error::Error;
#[cfg(feature = "http")]
pub use http::ReqwestClient;
pub use http::{HttpClient, HttpResponse, NoHttpClient};
pub use ldp::{LinkedDataProofOptions, ProofSuite};
pub use seed::{CacheBundle, OrgResolver};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use vc::{Credential, CredentialInput};
pub use verify::{CredentialVerifier, ErrorCode, VerificationReport, VerificationResult};
