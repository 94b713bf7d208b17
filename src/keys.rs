//! Ed25519 public key encodings.
//!
//! Keys arrive as multibase strings (multicodec-prefixed), JWKs (`OKP` /
//! `Ed25519`, `x` as base64url), hex (raw 32 bytes or a DER
//! SubjectPublicKeyInfo) or PEM. All of them reduce to the raw 32-byte
//! public key that [`CryptoBackend`](crate::crypto::CryptoBackend) consumes.

use std::collections::BTreeMap;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// Multicodec `ed25519-pub`, varint encoded.
pub const ED25519_MULTICODEC_PREFIX: [u8; 2] = [0xed, 0x01];

/// DER prefix of an Ed25519 SubjectPublicKeyInfo (RFC 8410).
pub const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

pub const ED25519_PUBLIC_KEY_LENGTH: usize = 32;

/// JSON Web Key, restricted to the parameters public key resolution reads.
/// Other members are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl Jwk {
    pub fn from_ed25519(public_key: &[u8; 32]) -> Self {
        Self {
            kty: "OKP".to_string(),
            crv: Some("Ed25519".to_string()),
            x: Some(encode_base64url(public_key)),
            other: BTreeMap::new(),
        }
    }

    /// Copy without private key parameters.
    pub fn to_public(&self) -> Self {
        let mut jwk = self.clone();
        jwk.other.remove("d");
        jwk
    }

    pub fn ed25519_public_key(&self) -> Result<[u8; 32], Error> {
        if self.kty != "OKP" {
            return Err(Error::UnsupportedKeyType(self.kty.clone()));
        }
        match self.crv.as_deref() {
            Some("Ed25519") => {}
            Some(crv) => return Err(Error::UnsupportedKeyType(crv.to_string())),
            None => return Err(Error::UnsupportedKeyType("OKP without crv".to_string())),
        }
        let x = self
            .x
            .as_deref()
            .ok_or_else(|| Error::MissingKeyMaterial("JWK x".to_string()))?;
        raw_key(&decode_base64url(x)?)
    }
}

/// Encode a raw Ed25519 key as multibase base58btc with the multicodec prefix.
pub fn encode_multibase(public_key: &[u8; 32]) -> String {
    let data = [&ED25519_MULTICODEC_PREFIX[..], &public_key[..]].concat();
    multibase::encode(multibase::Base::Base58Btc, data)
}

/// Decode a multibase Ed25519 key. Unprefixed 32-byte payloads are accepted
/// for keys published before multicodec prefixes were required.
pub fn decode_multibase(encoded: &str) -> Result<[u8; 32], Error> {
    let (_base, data) = multibase::decode(encoded)?;
    match data.len() {
        34 if data[..2] == ED25519_MULTICODEC_PREFIX => raw_key(&data[2..]),
        34 => Err(Error::InvalidMulticodec),
        ED25519_PUBLIC_KEY_LENGTH => raw_key(&data),
        len => Err(Error::InvalidKeyLength(len)),
    }
}

/// Decode a bare base58 (`publicKeyBase58`) key.
pub fn decode_base58(encoded: &str) -> Result<[u8; 32], Error> {
    let data = multibase::Base::Base58Btc.decode(encoded)?;
    raw_key(&data)
}

/// Lowercase hex of the raw key.
pub fn encode_hex(public_key: &[u8; 32]) -> String {
    hex::encode(public_key)
}

/// Decode hex, either the raw key or a DER SubjectPublicKeyInfo. Case
/// insensitive.
pub fn decode_hex(encoded: &str) -> Result<[u8; 32], Error> {
    let encoded = encoded.trim();
    let encoded = encoded
        .strip_prefix("0x")
        .or_else(|| encoded.strip_prefix("0X"))
        .unwrap_or(encoded);
    let data = hex::decode(encoded)?;
    unwrap_spki(&data)
}

/// Decode a PEM `PUBLIC KEY` block.
pub fn decode_pem(pem: &str) -> Result<[u8; 32], Error> {
    let body: String = pem
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect();
    if body.is_empty() {
        return Err(Error::InvalidPem);
    }
    let der = STANDARD.decode(body.as_bytes())?;
    unwrap_spki(&der)
}

/// Encode a raw key as a PEM SubjectPublicKeyInfo.
pub fn encode_pem(public_key: &[u8; 32]) -> String {
    let der = [&ED25519_SPKI_PREFIX[..], &public_key[..]].concat();
    format!(
        "-----BEGIN PUBLIC KEY-----\n{}\n-----END PUBLIC KEY-----\n",
        STANDARD.encode(der)
    )
}

/// Base64url without padding.
pub fn encode_base64url(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Base64url, tolerating present or missing padding.
pub fn decode_base64url(encoded: &str) -> Result<Vec<u8>, Error> {
    Ok(URL_SAFE_NO_PAD.decode(encoded.trim().trim_end_matches('='))?)
}

fn unwrap_spki(data: &[u8]) -> Result<[u8; 32], Error> {
    match data.len() {
        ED25519_PUBLIC_KEY_LENGTH => raw_key(data),
        44 if data[..12] == ED25519_SPKI_PREFIX => raw_key(&data[12..]),
        44 => Err(Error::UnsupportedKeyType("non-Ed25519 SubjectPublicKeyInfo".to_string())),
        len => Err(Error::InvalidKeyLength(len)),
    }
}

fn raw_key(data: &[u8]) -> Result<[u8; 32], Error> {
    data.try_into()
        .map_err(|_| Error::InvalidKeyLength(data.len()))
}

/// A key encoding a verification method may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEncoding {
    Pem,
    Multibase,
    Jwk,
    Hex,
    Base58,
}

/// Order in which key material is read from a verification method: the
/// first encoding present wins. Resolvers that published keys in several
/// encodings rely on this order, so it must not change.
pub const KEY_MATERIAL_ORDER: [KeyEncoding; 5] = [
    KeyEncoding::Pem,
    KeyEncoding::Multibase,
    KeyEncoding::Jwk,
    KeyEncoding::Hex,
    KeyEncoding::Base58,
];

impl KeyEncoding {
    pub fn property(&self) -> &'static str {
        match self {
            KeyEncoding::Pem => "publicKeyPem",
            KeyEncoding::Multibase => "publicKeyMultibase",
            KeyEncoding::Jwk => "publicKeyJwk",
            KeyEncoding::Hex => "publicKeyHex",
            KeyEncoding::Base58 => "publicKeyBase58",
        }
    }

    fn read(&self, verification_method: &Map<String, Value>) -> Result<Option<KeyMaterial>, Error> {
        let Some(value) = verification_method.get(self.property()) else {
            return Ok(None);
        };
        let material = match (self, value) {
            (KeyEncoding::Jwk, Value::Object(_)) => {
                KeyMaterial::Jwk(serde_json::from_value(value.clone())?)
            }
            (KeyEncoding::Pem, Value::String(s)) => KeyMaterial::Pem(s.clone()),
            (KeyEncoding::Multibase, Value::String(s)) => KeyMaterial::Multibase(s.clone()),
            (KeyEncoding::Hex, Value::String(s)) => KeyMaterial::Hex(s.clone()),
            (KeyEncoding::Base58, Value::String(s)) => KeyMaterial::Base58(s.clone()),
            _ => return Ok(None),
        };
        Ok(Some(material))
    }
}

/// Key material as published.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyMaterial {
    Pem(String),
    Multibase(String),
    Jwk(Jwk),
    Hex(String),
    Base58(String),
}

impl KeyMaterial {
    /// Pick the key material of a verification method following
    /// [`KEY_MATERIAL_ORDER`].
    pub fn select(verification_method: &Map<String, Value>) -> Result<Option<Self>, Error> {
        for encoding in KEY_MATERIAL_ORDER {
            if let Some(material) = encoding.read(verification_method)? {
                return Ok(Some(material));
            }
        }
        Ok(None)
    }

    pub fn encoding(&self) -> KeyEncoding {
        match self {
            KeyMaterial::Pem(_) => KeyEncoding::Pem,
            KeyMaterial::Multibase(_) => KeyEncoding::Multibase,
            KeyMaterial::Jwk(_) => KeyEncoding::Jwk,
            KeyMaterial::Hex(_) => KeyEncoding::Hex,
            KeyMaterial::Base58(_) => KeyEncoding::Base58,
        }
    }

    pub fn ed25519_public_key(&self) -> Result<[u8; 32], Error> {
        match self {
            KeyMaterial::Pem(pem) => decode_pem(pem),
            KeyMaterial::Multibase(encoded) => decode_multibase(encoded),
            KeyMaterial::Jwk(jwk) => jwk.ed25519_public_key(),
            KeyMaterial::Hex(encoded) => decode_hex(encoded),
            KeyMaterial::Base58(encoded) => decode_base58(encoded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const KEY: [u8; 32] = [
        0x3b, 0x6a, 0x27, 0xbc, 0xce, 0xb6, 0xa4, 0x2d, 0x62, 0xa3, 0xa8, 0xd0, 0x2a, 0x6f, 0x0d,
        0x73, 0x65, 0x32, 0x15, 0x77, 0x1d, 0xe2, 0x43, 0xa6, 0x3a, 0xc0, 0x48, 0xa1, 0x8b, 0x59,
        0xda, 0x29,
    ];

    #[test]
    fn multibase_round_trip() {
        let encoded = encode_multibase(&KEY);
        assert!(encoded.starts_with("z6Mk"));
        assert_eq!(decode_multibase(&encoded).unwrap(), KEY);
    }

    #[test]
    fn multibase_wrong_codec() {
        let data = [&[0xe7u8, 0x01][..], &KEY[..]].concat();
        let encoded = multibase::encode(multibase::Base::Base58Btc, data);
        assert!(matches!(
            decode_multibase(&encoded),
            Err(Error::InvalidMulticodec)
        ));
    }

    #[test]
    fn hex_round_trip_case_insensitive() {
        let encoded = encode_hex(&KEY);
        assert_eq!(decode_hex(&encoded).unwrap(), KEY);
        assert_eq!(decode_hex(&encoded.to_uppercase()).unwrap(), KEY);
        let spki = hex::encode_upper([&ED25519_SPKI_PREFIX[..], &KEY[..]].concat());
        assert_eq!(decode_hex(&spki).unwrap(), KEY);
        assert!(matches!(
            decode_hex("abcd"),
            Err(Error::InvalidKeyLength(2))
        ));
    }

    #[test]
    fn jwk_round_trip() {
        let jwk = Jwk::from_ed25519(&KEY);
        assert_eq!(jwk.ed25519_public_key().unwrap(), KEY);
        let x = jwk.x.clone().unwrap();
        assert!(!x.ends_with('='));
        let padded = Jwk {
            x: Some(format!("{x}=")),
            ..jwk.clone()
        };
        assert_eq!(padded.ed25519_public_key().unwrap(), KEY);
    }

    #[test]
    fn jwk_other_curve() {
        let jwk: Jwk = serde_json::from_value(json!({
            "kty": "EC",
            "crv": "P-256",
            "x": "f83OJ3D2xF1Bg8vub9tLe1gHMzV76e8Tus9uPHvRVEU",
            "y": "x_FEzRu9m36HLN_tue659LNpXW6pCyStikYjKIWI5a0"
        }))
        .unwrap();
        assert!(matches!(
            jwk.ed25519_public_key(),
            Err(Error::UnsupportedKeyType(_))
        ));
        assert!(jwk.other.contains_key("y"));
    }

    #[test]
    fn pem_round_trip() {
        let pem = encode_pem(&KEY);
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert_eq!(decode_pem(&pem).unwrap(), KEY);
        assert!(matches!(decode_pem("-----BEGIN PUBLIC KEY-----\n-----END PUBLIC KEY-----"), Err(Error::InvalidPem)));
    }

    #[test]
    fn selection_follows_priority() {
        let vm = json!({
            "id": "did:web:example.org#key-1",
            "publicKeyHex": encode_hex(&[1u8; 32]),
            "publicKeyJwk": Jwk::from_ed25519(&[2u8; 32]),
            "publicKeyMultibase": encode_multibase(&KEY),
        });
        let material = KeyMaterial::select(vm.as_object().unwrap()).unwrap().unwrap();
        assert_eq!(material.encoding(), KeyEncoding::Multibase);
        assert_eq!(material.ed25519_public_key().unwrap(), KEY);

        let vm = json!({
            "publicKeyHex": encode_hex(&[1u8; 32]),
            "publicKeyJwk": Jwk::from_ed25519(&[2u8; 32]),
        });
        let material = KeyMaterial::select(vm.as_object().unwrap()).unwrap().unwrap();
        assert_eq!(material.encoding(), KeyEncoding::Jwk);

        let vm = json!({
            "publicKeyMultibase": encode_multibase(&[3u8; 32]),
            "publicKeyPem": encode_pem(&KEY),
        });
        let material = KeyMaterial::select(vm.as_object().unwrap()).unwrap().unwrap();
        assert_eq!(material.encoding(), KeyEncoding::Pem);
        assert_eq!(material.ed25519_public_key().unwrap(), KEY);

        let vm = json!({ "id": "did:web:example.org#key-1" });
        assert!(KeyMaterial::select(vm.as_object().unwrap()).unwrap().is_none());
    }
}
