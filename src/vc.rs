//! Read-only view of a Verifiable Credential.
//!
//! Only the properties verification needs are interpreted; everything else
//! (including `credentialSubject`) stays opaque JSON.
//!
//! <https://www.w3.org/TR/vc-data-model/>

use chrono::prelude::*;
use serde_json::{Map, Value};

use crate::error::Error;

/// A credential as received: JSON text or an already-parsed value.
#[derive(Debug, Clone)]
pub enum CredentialInput {
    Text(String),
    Parsed(Value),
}

impl From<&str> for CredentialInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for CredentialInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Value> for CredentialInput {
    fn from(value: Value) -> Self {
        Self::Parsed(value)
    }
}

impl CredentialInput {
    pub fn parse(self) -> Result<Credential, Error> {
        let value = match self {
            Self::Text(text) => serde_json::from_str(&text)?,
            Self::Parsed(value) => value,
        };
        Credential::from_value(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    document: Value,
}

impl Credential {
    pub fn from_value(document: Value) -> Result<Self, Error> {
        if !document.is_object() {
            return Err(Error::ExpectedObject);
        }
        Ok(Self { document })
    }

    pub fn as_value(&self) -> &Value {
        &self.document
    }

    pub fn into_value(self) -> Value {
        self.document
    }

    pub fn id(&self) -> Option<&str> {
        self.document.get("id").and_then(Value::as_str)
    }

    /// Issuer identifier, whether given as a string or as an object with an
    /// `id`.
    pub fn issuer(&self) -> Option<&str> {
        match self.document.get("issuer")? {
            Value::String(issuer) => Some(issuer),
            Value::Object(issuer) => issuer.get("id").and_then(Value::as_str),
            _ => None,
        }
    }

    /// The embedded proofs. A missing or empty `proof` is an error.
    pub fn proofs(&self) -> Result<Vec<Map<String, Value>>, Error> {
        let proofs = match self.document.get("proof") {
            None | Some(Value::Null) => return Err(Error::MissingProof),
            Some(Value::Array(proofs)) => proofs.as_slice(),
            Some(proof) => std::slice::from_ref(proof),
        };
        if proofs.is_empty() {
            return Err(Error::MissingProof);
        }
        proofs
            .iter()
            .map(|proof| match proof {
                Value::Object(proof) => Ok(proof.clone()),
                _ => Err(Error::ExpectedObject),
            })
            .collect()
    }

    /// `expirationDate` (VC 1.1) or `validUntil` (VC 2.0).
    pub fn expiration(&self) -> Result<Option<DateTime<Utc>>, Error> {
        let date = ["expirationDate", "validUntil"]
            .into_iter()
            .find_map(|property| self.document.get(property).and_then(Value::as_str));
        let Some(date) = date else {
            return Ok(None);
        };
        DateTime::parse_from_rfc3339(date)
            .map(|date| Some(date.with_timezone(&Utc)))
            .map_err(|_| Error::InvalidDate(date.to_string()))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> Result<bool, Error> {
        Ok(self.expiration()?.map(|date| date < now).unwrap_or(false))
    }
}
