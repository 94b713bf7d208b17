//! Verification method identifiers and the documents they dereference to.
//!
//! Supported identifiers: `did:web`, `did:key` (Ed25519), `did:jwk` and plain
//! `https` URLs. `did:key` and `did:jwk` documents are derived from the
//! identifier itself; the others are fetched.

use serde_json::{json, Map, Value};

use crate::error::Error;
use crate::keys::{self, Jwk};

pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";

/// Verification relationships a DID document may list methods under.
pub const VERIFICATION_RELATIONSHIPS: [&str; 5] = [
    "assertionMethod",
    "authentication",
    "capabilityInvocation",
    "capabilityDelegation",
    "keyAgreement",
];

/// Scheme of a verification method identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyScheme {
    DidWeb { did: String },
    DidKey { did: String },
    DidJwk { did: String },
    Https { url: String },
    Unsupported(String),
}

impl KeyScheme {
    pub fn parse(key_id: &str) -> Self {
        let (base, _fragment) = split_fragment(key_id);
        let did = || base.to_string();
        if base.starts_with("did:web:") {
            KeyScheme::DidWeb { did: did() }
        } else if base.starts_with("did:key:") {
            KeyScheme::DidKey { did: did() }
        } else if base.starts_with("did:jwk:") {
            KeyScheme::DidJwk { did: did() }
        } else if base.starts_with("https://") {
            KeyScheme::Https { url: did() }
        } else {
            KeyScheme::Unsupported(key_id.to_string())
        }
    }

    /// Identifier of the document the key lives in.
    pub fn document_id(&self) -> &str {
        match self {
            KeyScheme::DidWeb { did } | KeyScheme::DidKey { did } | KeyScheme::DidJwk { did } => did,
            KeyScheme::Https { url } => url,
            KeyScheme::Unsupported(id) => id,
        }
    }
}

/// Split `id#fragment`.
pub fn split_fragment(id: &str) -> (&str, Option<&str>) {
    match id.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (id, None),
    }
}

/// URL of the DID document for a `did:web` DID.
///
/// <https://w3c-ccg.github.io/did-method-web/#read-resolve>
pub fn did_web_url(did: &str) -> Result<String, Error> {
    let mut parts = did.split(':').peekable();
    let domain_name = match (parts.next(), parts.next(), parts.next()) {
        (Some("did"), Some("web"), Some(domain_name)) if !domain_name.is_empty() => domain_name,
        _ => return Err(Error::InvalidDid(did.to_string())),
    };
    let path = match parts.peek() {
        Some(_) => parts.collect::<Vec<&str>>().join("/"),
        None => ".well-known".to_string(),
    };
    // Use http for localhost, for testing purposes.
    let proto = if domain_name.starts_with("localhost") {
        "http"
    } else {
        "https"
    };
    Ok(format!(
        "{}://{}/{}/did.json",
        proto,
        domain_name.replacen("%3A", ":", 1),
        path
    ))
}

/// DID document of an Ed25519 `did:key`.
pub fn did_key_document(did: &str) -> Result<Value, Error> {
    let method_specific_id = did
        .strip_prefix("did:key:")
        .ok_or_else(|| Error::InvalidDid(did.to_string()))?;
    if !method_specific_id.starts_with('z') {
        return Err(Error::InvalidDid(did.to_string()));
    }
    let public_key = keys::decode_multibase(method_specific_id)?;
    let vm_id = format!("{did}#{method_specific_id}");
    Ok(json!({
        "@context": DID_CONTEXT,
        "id": did,
        "verificationMethod": [{
            "id": vm_id,
            "type": "Ed25519VerificationKey2020",
            "controller": did,
            "publicKeyMultibase": keys::encode_multibase(&public_key),
        }],
        "assertionMethod": [vm_id],
        "authentication": [vm_id],
        "capabilityInvocation": [vm_id],
        "capabilityDelegation": [vm_id],
    }))
}

/// DID document of a `did:jwk`. The embedded JWK must not carry private key
/// parameters.
pub fn did_jwk_document(did: &str) -> Result<Value, Error> {
    let method_specific_id = did
        .strip_prefix("did:jwk:")
        .ok_or_else(|| Error::InvalidDid(did.to_string()))?;
    let data = keys::decode_base64url(method_specific_id)?;
    let jwk: Jwk = serde_json::from_slice(&data)?;
    if jwk.to_public() != jwk {
        return Err(Error::InvalidDid(did.to_string()));
    }
    let vm_id = format!("{did}#0");
    Ok(json!({
        "@context": [DID_CONTEXT, "https://w3id.org/security/suites/jws-2020/v1"],
        "id": did,
        "verificationMethod": [{
            "id": vm_id,
            "type": "JsonWebKey2020",
            "controller": did,
            "publicKeyJwk": jwk,
        }],
        "assertionMethod": [vm_id],
        "authentication": [vm_id],
        "capabilityInvocation": [vm_id],
        "capabilityDelegation": [vm_id],
    }))
}

fn absolute_id(id: &str, document_id: &str) -> String {
    if id.starts_with('#') {
        format!("{document_id}{id}")
    } else {
        id.to_string()
    }
}

fn as_objects(value: Option<&Value>) -> Vec<&Map<String, Value>> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
        Some(Value::Object(object)) => vec![object],
        _ => Vec::new(),
    }
}

/// Find the verification method with id `key_id` in `document`.
///
/// Methods are looked up in `verificationMethod`, the legacy `publicKey`
/// property and embedded in verification relationships. Relative ids
/// (`#key-1`) are resolved against the document id. A document that is
/// itself the requested verification method is returned as is.
pub fn find_verification_method(
    document: &Value,
    key_id: &str,
) -> Result<Map<String, Value>, Error> {
    let object = document.as_object().ok_or(Error::ExpectedObject)?;
    let (base, _) = split_fragment(key_id);
    let document_id = object
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or(base)
        .to_string();

    if document_id == key_id && object.keys().any(|k| k.starts_with("publicKey")) {
        return Ok(object.clone());
    }

    let candidates = ["verificationMethod", "publicKey"]
        .into_iter()
        .chain(VERIFICATION_RELATIONSHIPS)
        .flat_map(|property| as_objects(object.get(property)));
    for candidate in candidates {
        let Some(id) = candidate.get("id").and_then(Value::as_str) else {
            continue;
        };
        if absolute_id(id, &document_id) == key_id {
            let mut vm = candidate.clone();
            vm.insert("id".to_string(), Value::String(key_id.to_string()));
            vm.entry("controller")
                .or_insert_with(|| Value::String(document_id.clone()));
            return Ok(vm);
        }
    }
    Err(Error::VerificationMethodNotFound(key_id.to_string()))
}

/// Relationships of `document` that reference `key_id`, by id or embedded.
pub fn relationships_of(document: &Value, key_id: &str) -> Vec<String> {
    let Some(object) = document.as_object() else {
        return Vec::new();
    };
    let (base, _) = split_fragment(key_id);
    let document_id = object.get("id").and_then(Value::as_str).unwrap_or(base);
    VERIFICATION_RELATIONSHIPS
        .into_iter()
        .filter(|relationship| {
            let entries: Vec<&Value> = match object.get(*relationship) {
                Some(Value::Array(items)) => items.iter().collect(),
                Some(value) => vec![value],
                None => Vec::new(),
            };
            entries.into_iter().any(|entry| {
                let id = match entry {
                    Value::String(id) => Some(id.as_str()),
                    Value::Object(vm) => vm.get("id").and_then(Value::as_str),
                    _ => None,
                };
                id.map(|id| absolute_id(id, document_id) == key_id)
                    .unwrap_or(false)
            })
        })
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_schemes() {
        assert_eq!(
            KeyScheme::parse("did:web:example.org#key-1"),
            KeyScheme::DidWeb {
                did: "did:web:example.org".to_string()
            }
        );
        assert_eq!(
            KeyScheme::parse("https://example.org/keys/1").document_id(),
            "https://example.org/keys/1"
        );
        assert!(matches!(
            KeyScheme::parse("did:ethr:0xabc#controller"),
            KeyScheme::Unsupported(_)
        ));
        assert!(matches!(
            KeyScheme::parse("http://example.org/key"),
            KeyScheme::Unsupported(_)
        ));
    }

    #[test]
    fn parse_did_web() {
        assert_eq!(
            did_web_url("did:web:w3c-ccg.github.io").unwrap(),
            "https://w3c-ccg.github.io/.well-known/did.json"
        );
        assert_eq!(
            did_web_url("did:web:w3c-ccg.github.io:user:alice").unwrap(),
            "https://w3c-ccg.github.io/user/alice/did.json"
        );
        assert_eq!(
            did_web_url("did:web:example.com%3A443:u:bob").unwrap(),
            "https://example.com:443/u/bob/did.json"
        );
        assert_eq!(
            did_web_url("did:web:localhost%3A8080").unwrap(),
            "http://localhost:8080/.well-known/did.json"
        );
        assert!(did_web_url("did:key:z6Mk").is_err());
    }

    #[test]
    fn did_key_round_trip() {
        let multibase = keys::encode_multibase(&[9u8; 32]);
        let did = format!("did:key:{multibase}");
        let doc = did_key_document(&did).unwrap();
        let key_id = format!("{did}#{multibase}");
        let vm = find_verification_method(&doc, &key_id).unwrap();
        assert_eq!(vm["publicKeyMultibase"], multibase.as_str());
        assert_eq!(vm["controller"], did.as_str());
        assert!(relationships_of(&doc, &key_id).contains(&"assertionMethod".to_string()));
    }

    #[test]
    fn did_jwk_rejects_private_keys() {
        let jwk = Jwk::from_ed25519(&[4u8; 32]);
        let did = format!(
            "did:jwk:{}",
            keys::encode_base64url(&serde_json::to_vec(&jwk).unwrap())
        );
        let doc = did_jwk_document(&did).unwrap();
        let vm = find_verification_method(&doc, &format!("{did}#0")).unwrap();
        assert_eq!(vm["publicKeyJwk"]["crv"], "Ed25519");

        let mut private = jwk;
        private.other.insert("d".to_string(), json!("AAAA"));
        let did = format!(
            "did:jwk:{}",
            keys::encode_base64url(&serde_json::to_vec(&private).unwrap())
        );
        assert!(matches!(did_jwk_document(&did), Err(Error::InvalidDid(_))));
    }

    #[test]
    fn find_relative_and_embedded_methods() {
        let doc = json!({
            "id": "did:web:example.org",
            "verificationMethod": [{
                "id": "#key-1",
                "type": "Ed25519VerificationKey2020",
                "publicKeyMultibase": "z6MkTest"
            }],
            "assertionMethod": ["#key-1", {
                "id": "did:web:example.org#key-2",
                "type": "Ed25519VerificationKey2018",
                "controller": "did:web:example.org",
                "publicKeyBase58": "abc"
            }]
        });
        let vm = find_verification_method(&doc, "did:web:example.org#key-1").unwrap();
        assert_eq!(vm["id"], "did:web:example.org#key-1");
        assert_eq!(vm["controller"], "did:web:example.org");
        let vm = find_verification_method(&doc, "did:web:example.org#key-2").unwrap();
        assert_eq!(vm["publicKeyBase58"], "abc");
        assert!(matches!(
            find_verification_method(&doc, "did:web:example.org#key-3"),
            Err(Error::VerificationMethodNotFound(_))
        ));
        assert_eq!(
            relationships_of(&doc, "did:web:example.org#key-1"),
            vec!["assertionMethod".to_string()]
        );
    }

    #[test]
    fn https_document_is_the_method() {
        let doc = json!({
            "id": "https://example.org/keys/1",
            "type": "Ed25519VerificationKey2020",
            "controller": "https://example.org/issuer",
            "publicKeyMultibase": "z6MkTest"
        });
        let vm = find_verification_method(&doc, "https://example.org/keys/1").unwrap();
        assert_eq!(vm["controller"], "https://example.org/issuer");
    }
}
