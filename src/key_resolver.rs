//! Verification method identifier to Ed25519 key material.
//!
//! The cache is consulted first. Records that are missing, or carry no usable
//! encoding, are fetched through the identifier's scheme when the network
//! may be used, normalized to multibase, JWK and hex, and upserted so the
//! next resolution is cache-only.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{CacheStore, PublicKeyRecord};
use crate::config::{Connectivity, DEFAULT_PROOF_PURPOSE};
use crate::did::{self, KeyScheme};
use crate::error::Error;
use crate::http::{get_json, HttpClient};
use crate::keys::{self, Jwk, KeyEncoding, KeyMaterial, KEY_MATERIAL_ORDER};

/// Canonical view of a resolved key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyView {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub controller: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_multibase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_jwk: Option<Jwk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_hex: Option<String>,
}

impl From<&PublicKeyRecord> for KeyView {
    fn from(record: &PublicKeyRecord) -> Self {
        Self {
            id: record.key_id.clone(),
            type_: record.key_type.clone(),
            controller: record.controller.clone(),
            public_key_multibase: record.public_key_multibase.clone(),
            public_key_jwk: record.public_key_jwk.clone(),
            public_key_hex: record.public_key_hex.clone(),
        }
    }
}

impl KeyView {
    fn material(&self, encoding: KeyEncoding) -> Option<KeyMaterial> {
        match encoding {
            KeyEncoding::Multibase => self.public_key_multibase.clone().map(KeyMaterial::Multibase),
            KeyEncoding::Jwk => self.public_key_jwk.clone().map(KeyMaterial::Jwk),
            KeyEncoding::Hex => self.public_key_hex.clone().map(KeyMaterial::Hex),
            KeyEncoding::Pem | KeyEncoding::Base58 => None,
        }
    }

    /// Raw Ed25519 public key from the first encoding present, in
    /// [`KEY_MATERIAL_ORDER`].
    pub fn ed25519_public_key(&self) -> Result<[u8; 32], Error> {
        KEY_MATERIAL_ORDER
            .into_iter()
            .find_map(|encoding| self.material(encoding))
            .ok_or_else(|| Error::MissingKeyMaterial(self.id.clone()))?
            .ed25519_public_key()
    }

    /// Verification method document for this key.
    pub fn to_verification_method(&self) -> Value {
        let mut vm = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(ref mut map) = vm {
            map.retain(|_, value| !value.is_null());
        }
        vm
    }
}

fn record_material(record: &PublicKeyRecord, encoding: KeyEncoding) -> Option<KeyMaterial> {
    match encoding {
        KeyEncoding::Pem => record.public_key_pem.clone().map(KeyMaterial::Pem),
        KeyEncoding::Multibase => record.public_key_multibase.clone().map(KeyMaterial::Multibase),
        KeyEncoding::Jwk => record.public_key_jwk.clone().map(KeyMaterial::Jwk),
        KeyEncoding::Hex => record.public_key_hex.clone().map(KeyMaterial::Hex),
        KeyEncoding::Base58 => None,
    }
}

/// Derive the raw key from the first encoding a record carries, in
/// [`KEY_MATERIAL_ORDER`].
fn record_public_key(record: &PublicKeyRecord) -> Result<[u8; 32], Error> {
    KEY_MATERIAL_ORDER
        .into_iter()
        .find_map(|encoding| record_material(record, encoding))
        .ok_or_else(|| Error::MissingKeyMaterial(record.key_id.clone()))?
        .ed25519_public_key()
}

pub struct PublicKeyResolver {
    cache: Arc<CacheStore>,
    http: Arc<dyn HttpClient>,
}

impl PublicKeyResolver {
    pub fn new(cache: Arc<CacheStore>, http: Arc<dyn HttpClient>) -> Self {
        Self { cache, http }
    }

    pub async fn resolve(
        &self,
        key_id: &str,
        connectivity: Connectivity,
    ) -> Result<Option<KeyView>, Error> {
        Ok(self
            .resolve_record(key_id, connectivity)
            .await?
            .map(|record| KeyView::from(&record)))
    }

    /// Resolve to the stored record. `Ok(None)` means no key could be found;
    /// an inactive key is an error, never a reason to fetch.
    pub async fn resolve_record(
        &self,
        key_id: &str,
        connectivity: Connectivity,
    ) -> Result<Option<PublicKeyRecord>, Error> {
        let cached = match self.cache.keys.get(key_id).await {
            Ok(record) => record,
            Err(e) => {
                log::warn!("key cache read failed for {}: {}", key_id, e);
                None
            }
        };

        if let Some(record) = &cached {
            if !record.is_active {
                return Err(Error::InactiveKey(key_id.to_string()));
            }
            let record = self.backfill(record.clone()).await;
            if record.is_complete() {
                return Ok(Some(record));
            }
            log::debug!("cached key {} has no usable encoding", key_id);
        }

        if connectivity.is_offline() {
            log::debug!("offline and key {} not cached", key_id);
            return Ok(None);
        }

        let mut fetched = match self.fetch(key_id).await {
            Ok(record) => record,
            Err(Error::VerificationMethodNotFound(_)) | Err(Error::HttpStatus { status: 404, .. }) => {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };
        if let Some(existing) = cached {
            fetched.organization_id = existing.organization_id;
            fetched.purpose = existing.purpose;
        }
        self.cache.keys.put(vec![fetched.clone()]).await?;
        Ok(Some(fetched))
    }

    /// Dereference `key_id` through its scheme and normalize the key material.
    pub async fn fetch(&self, key_id: &str) -> Result<PublicKeyRecord, Error> {
        let scheme = KeyScheme::parse(key_id);
        let document = match &scheme {
            KeyScheme::DidWeb { did } => get_json(&*self.http, &did::did_web_url(did)?).await?,
            KeyScheme::DidKey { did } => did::did_key_document(did)?,
            KeyScheme::DidJwk { did } => did::did_jwk_document(did)?,
            KeyScheme::Https { url } => get_json(&*self.http, url).await?,
            KeyScheme::Unsupported(id) => return Err(Error::UnsupportedKeyScheme(id.clone())),
        };
        let vm = did::find_verification_method(&document, key_id)?;
        let material = KeyMaterial::select(&vm)?
            .ok_or_else(|| Error::MissingKeyMaterial(key_id.to_string()))?;
        log::debug!("key {} published as {}", key_id, material.encoding().property());
        let public_key = material.ed25519_public_key()?;

        let key_type = vm
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("Ed25519VerificationKey2020")
            .to_string();
        let controller = vm
            .get("controller")
            .and_then(Value::as_str)
            .unwrap_or(scheme.document_id())
            .to_string();
        let purpose = did::relationships_of(&document, key_id)
            .into_iter()
            .next()
            .unwrap_or_else(|| DEFAULT_PROOF_PURPOSE.to_string());
        Ok(PublicKeyRecord {
            key_id: key_id.to_string(),
            key_type,
            public_key_multibase: Some(keys::encode_multibase(&public_key)),
            public_key_jwk: Some(Jwk::from_ed25519(&public_key)),
            public_key_hex: Some(keys::encode_hex(&public_key)),
            public_key_pem: None,
            controller,
            purpose,
            is_active: true,
            organization_id: None,
        })
    }

    /// Persist a multibase encoding derived from the record's other
    /// encodings. Only `public_key_multibase` changes. A failed write leaves
    /// the cache as it was and still returns the derived record.
    async fn backfill(&self, mut record: PublicKeyRecord) -> PublicKeyRecord {
        if record.public_key_multibase.is_some() {
            return record;
        }
        let public_key = match record_public_key(&record) {
            Ok(public_key) => public_key,
            Err(e) => {
                log::debug!("cannot derive multibase for {}: {}", record.key_id, e);
                return record;
            }
        };
        record.public_key_multibase = Some(keys::encode_multibase(&public_key));
        log::debug!("backfilling multibase for {}", record.key_id);
        if let Err(e) = self.cache.keys.put(vec![record.clone()]).await {
            log::warn!("multibase backfill for {} not persisted: {}", record.key_id, e);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_util::MockHttp;
    use crate::http::NoHttpClient;
    use serde_json::json;

    const KEY: [u8; 32] = [5u8; 32];
    const KEY_ID: &str = "did:web:issuer.example:org:1#key-1";

    fn did_document() -> Value {
        json!({
            "@context": "https://www.w3.org/ns/did/v1",
            "id": "did:web:issuer.example:org:1",
            "verificationMethod": [{
                "id": "#key-1",
                "type": "Ed25519VerificationKey2020",
                "controller": "did:web:issuer.example:org:1",
                "publicKeyMultibase": keys::encode_multibase(&KEY)
            }],
            "assertionMethod": ["#key-1"]
        })
    }

    fn record(key_id: &str) -> PublicKeyRecord {
        PublicKeyRecord {
            key_id: key_id.to_string(),
            key_type: "Ed25519VerificationKey2020".to_string(),
            public_key_multibase: None,
            public_key_jwk: None,
            public_key_hex: None,
            public_key_pem: None,
            controller: "did:web:issuer.example:org:1".to_string(),
            purpose: "assertionMethod".to_string(),
            is_active: true,
            organization_id: Some("org-1".to_string()),
        }
    }

    #[test]
    fn record_encodings_follow_material_order() {
        let other = [9u8; 32];
        let mut record = record(KEY_ID);
        assert!(matches!(
            record_public_key(&record),
            Err(Error::MissingKeyMaterial(_))
        ));
        record.public_key_hex = Some(keys::encode_hex(&other));
        assert_eq!(record_public_key(&record).unwrap(), other);
        record.public_key_jwk = Some(Jwk::from_ed25519(&KEY));
        assert_eq!(record_public_key(&record).unwrap(), KEY);
        record.public_key_multibase = Some(keys::encode_multibase(&other));
        assert_eq!(record_public_key(&record).unwrap(), other);
        record.public_key_pem = Some(keys::encode_pem(&KEY));
        assert_eq!(record_public_key(&record).unwrap(), KEY);

        let view = KeyView::from(&record);
        assert_eq!(view.ed25519_public_key().unwrap(), other);
    }

    #[async_std::test]
    async fn fetches_did_web_and_caches() {
        let cache = Arc::new(CacheStore::in_memory());
        let http = Arc::new(
            MockHttp::default().with("https://issuer.example/org/1/did.json", did_document()),
        );
        let resolver = PublicKeyResolver::new(cache.clone(), http.clone());
        let view = resolver
            .resolve(KEY_ID, Connectivity::Online)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.ed25519_public_key().unwrap(), KEY);
        assert_eq!(view.controller, "did:web:issuer.example:org:1");
        assert!(view.public_key_jwk.is_some() && view.public_key_hex.is_some());

        let offline = PublicKeyResolver::new(cache, Arc::new(NoHttpClient));
        let view = offline
            .resolve(KEY_ID, Connectivity::Offline)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.ed25519_public_key().unwrap(), KEY);
        assert_eq!(http.request_count(), 1);
    }

    #[async_std::test]
    async fn offline_miss_is_none() {
        let resolver =
            PublicKeyResolver::new(Arc::new(CacheStore::in_memory()), Arc::new(NoHttpClient));
        assert!(resolver
            .resolve(KEY_ID, Connectivity::Offline)
            .await
            .unwrap()
            .is_none());
    }

    #[async_std::test]
    async fn inactive_key_is_never_fetched() {
        let cache = Arc::new(CacheStore::in_memory());
        let mut inactive = record(KEY_ID);
        inactive.public_key_hex = Some(keys::encode_hex(&KEY));
        inactive.is_active = false;
        cache.keys.put(vec![inactive]).await.unwrap();
        let http = Arc::new(
            MockHttp::default().with("https://issuer.example/org/1/did.json", did_document()),
        );
        let resolver = PublicKeyResolver::new(cache, http.clone());
        assert!(matches!(
            resolver.resolve(KEY_ID, Connectivity::Online).await,
            Err(Error::InactiveKey(_))
        ));
        assert_eq!(http.request_count(), 0);
    }

    #[async_std::test]
    async fn backfill_only_adds_multibase() {
        let cache = Arc::new(CacheStore::in_memory());
        let mut stored = record(KEY_ID);
        stored.public_key_jwk = Some(Jwk::from_ed25519(&KEY));
        stored.purpose = "authentication".to_string();
        cache.keys.put(vec![stored.clone()]).await.unwrap();

        let resolver = PublicKeyResolver::new(cache.clone(), Arc::new(NoHttpClient));
        let view = resolver
            .resolve(KEY_ID, Connectivity::Offline)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            view.public_key_multibase.as_deref(),
            Some(keys::encode_multibase(&KEY).as_str())
        );

        let persisted = cache.keys.get(KEY_ID).await.unwrap().unwrap();
        let expected = PublicKeyRecord {
            public_key_multibase: Some(keys::encode_multibase(&KEY)),
            ..stored
        };
        assert_eq!(persisted, expected);
    }

    #[async_std::test]
    async fn did_key_resolves_without_http() {
        let multibase = keys::encode_multibase(&KEY);
        let key_id = format!("did:key:{multibase}#{multibase}");
        let resolver =
            PublicKeyResolver::new(Arc::new(CacheStore::in_memory()), Arc::new(NoHttpClient));
        let view = resolver
            .resolve(&key_id, Connectivity::Unknown)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.ed25519_public_key().unwrap(), KEY);
    }

    #[async_std::test]
    async fn fetch_keeps_existing_scope() {
        let cache = Arc::new(CacheStore::in_memory());
        cache.keys.put(vec![record(KEY_ID)]).await.unwrap();
        let http = Arc::new(
            MockHttp::default().with("https://issuer.example/org/1/did.json", did_document()),
        );
        let resolver = PublicKeyResolver::new(cache.clone(), http);
        resolver
            .resolve(KEY_ID, Connectivity::Online)
            .await
            .unwrap()
            .unwrap();
        let stored = cache.keys.get(KEY_ID).await.unwrap().unwrap();
        assert_eq!(stored.organization_id.as_deref(), Some("org-1"));
        assert!(stored.is_complete());
    }

    #[async_std::test]
    async fn unsupported_scheme() {
        let resolver = PublicKeyResolver::new(
            Arc::new(CacheStore::in_memory()),
            Arc::new(MockHttp::default()),
        );
        assert!(matches!(
            resolver
                .resolve("did:ethr:0xb9c5714089478a327f09197987f16f9e5d936e8a#controller", Connectivity::Online)
                .await,
            Err(Error::UnsupportedKeyScheme(_))
        ));
        assert!(resolver
            .resolve("did:web:issuer.example#key-9", Connectivity::Online)
            .await
            .unwrap()
            .is_none());
    }
}
