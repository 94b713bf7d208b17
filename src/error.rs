use thiserror::Error;

/// Errors raised by the offline verification pipeline.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A context document or key required for verification is not cached and
    /// the network cannot be used to obtain it.
    #[error("Offline and required dependency is not cached: {0}")]
    OfflineDependenciesMissing(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("HTTP request to {url} failed: {message}")]
    Http { url: String, message: String },
    #[error("HTTP request to {url} returned status {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("Network access is not available")]
    NetworkUnavailable,
    #[error("DID URLs are not resolved as JSON-LD contexts: {0}")]
    DidContextUrl(String),
    #[error("Invalid DID: {0}")]
    InvalidDid(String),
    #[error("Unsupported verification method identifier: {0}")]
    UnsupportedKeyScheme(String),
    #[error("Verification method not found: {0}")]
    VerificationMethodNotFound(String),
    #[error("Key is not active: {0}")]
    InactiveKey(String),
    #[error("No usable key material for {0}")]
    MissingKeyMaterial(String),
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),
    #[error("Invalid key length: {0}")]
    InvalidKeyLength(usize),
    #[error("Invalid multicodec prefix for Ed25519 public key")]
    InvalidMulticodec,
    #[error("Invalid PEM public key")]
    InvalidPem,
    #[error("Invalid JWS")]
    InvalidJws,
    #[error("Unknown critical header name in JWS header")]
    UnknownCriticalHeader,
    #[error("Expected unencoded JWS payload")]
    ExpectedUnencodedHeader,
    #[error("Algorithm in JWS header does not match key: {0}")]
    AlgorithmMismatch(String),
    #[error("Unsupported proof type: {0}")]
    UnsupportedProofType(String),
    #[error("Missing proof property")]
    MissingProof,
    #[error("Missing proof signature")]
    MissingProofSignature,
    #[error("Missing proof verificationMethod")]
    MissingVerificationMethod,
    #[error("Verification method is not authorized for proof purpose {0}")]
    InvalidProofPurpose(String),
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Expected object")]
    ExpectedObject,
    #[error("Verification cancelled")]
    Cancelled,
    #[error("Canonicalization failed: {0}")]
    Canonicalization(String),
    #[error("Loading remote context {url} failed: {source}")]
    ContextLoad {
        url: String,
        #[source]
        source: Box<Error>,
    },
    #[error(transparent)]
    SerdeJSON(#[from] serde_json::Error),
    #[error(transparent)]
    Multibase(#[from] multibase::Error),
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
    #[error(transparent)]
    Ed25519Signature(#[from] ed25519_dalek::SignatureError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error, or any error it wraps, is the offline
    /// missing-dependency condition.
    pub fn is_offline_missing(&self) -> bool {
        match self {
            Error::OfflineDependenciesMissing(_) => true,
            Error::ContextLoad { source, .. } => source.is_offline_missing(),
            _ => false,
        }
    }
}

impl From<Error> for String {
    fn from(err: Error) -> String {
        err.to_string()
    }
}
