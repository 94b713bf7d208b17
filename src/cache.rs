//! Local cache of context documents, public keys and revoked credentials.
//!
//! Each table is stored as a single JSON document (`<namespace>:<table>`) in a
//! [`KeyValueStorage`]. A storage `set` replaces the whole value, so every
//! mutation, including a per-organization replace, becomes visible to readers
//! in one step. Writers to the same table are serialized.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_std::sync::{Mutex, RwLock};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::keys::Jwk;
use crate::storage::{KeyValueStorage, MemoryStorage};

/// Where a cached context document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextSource {
    Prime,
    OrgSync,
    Fetched,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextRecord {
    pub url: String,
    pub document: Value,
    pub cached_at: DateTime<Utc>,
    pub source: ContextSource,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "organization_id")]
    pub organization_id: Option<String>,
}

impl ContextRecord {
    pub fn new(url: impl Into<String>, document: Value, source: ContextSource) -> Self {
        Self {
            url: url.into(),
            document,
            cached_at: Utc::now(),
            source,
            organization_id: None,
        }
    }

    pub fn for_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyRecord {
    #[serde(alias = "key_id")]
    pub key_id: String,
    #[serde(alias = "key_type")]
    pub key_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_multibase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_jwk: Option<Jwk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_pem: Option<String>,
    pub controller: String,
    #[serde(default = "default_purpose")]
    pub purpose: String,
    #[serde(default = "default_true", alias = "is_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "organization_id")]
    pub organization_id: Option<String>,
}

fn default_purpose() -> String {
    crate::config::DEFAULT_PROOF_PURPOSE.to_string()
}

impl PublicKeyRecord {
    /// Whether the record carries an encoding verification can use without a
    /// fetch.
    pub fn is_complete(&self) -> bool {
        self.public_key_multibase.is_some()
            || self.public_key_jwk.is_some()
            || self.public_key_hex.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokedVcRecord {
    #[serde(alias = "vc_id")]
    pub vc_id: String,
    pub issuer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(alias = "revoked_at")]
    pub revoked_at: DateTime<Utc>,
    #[serde(alias = "organization_id")]
    pub organization_id: String,
}

/// A record stored in one of the cache tables.
pub trait CacheRecord: Clone + Serialize + DeserializeOwned + Send + Sync {
    const TABLE: &'static str;

    fn id(&self) -> &str;

    fn organization_id(&self) -> Option<&str>;
}

impl CacheRecord for ContextRecord {
    const TABLE: &'static str = "contexts";

    fn id(&self) -> &str {
        &self.url
    }

    fn organization_id(&self) -> Option<&str> {
        self.organization_id.as_deref()
    }
}

impl CacheRecord for PublicKeyRecord {
    const TABLE: &'static str = "public_keys";

    fn id(&self) -> &str {
        &self.key_id
    }

    fn organization_id(&self) -> Option<&str> {
        self.organization_id.as_deref()
    }
}

impl CacheRecord for RevokedVcRecord {
    const TABLE: &'static str = "revoked_vcs";

    fn id(&self) -> &str {
        &self.vc_id
    }

    fn organization_id(&self) -> Option<&str> {
        Some(&self.organization_id)
    }
}

/// One logical table. Records are read from storage once and then served
/// from an in-memory index; writes go to storage first and then replace the
/// index.
pub struct Table<R> {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
    write_lock: Mutex<()>,
    index: RwLock<Option<BTreeMap<String, R>>>,
}

impl<R: CacheRecord> Table<R> {
    fn new(storage: Arc<dyn KeyValueStorage>, namespace: &str) -> Self {
        Self {
            storage,
            key: format!("{}:{}", namespace, R::TABLE),
            write_lock: Mutex::new(()),
            index: RwLock::new(None),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, R>, Error> {
        let Some(data) = self.storage.get(&self.key).await? else {
            return Ok(BTreeMap::new());
        };
        let records: Vec<R> = serde_json::from_str(&data)
            .map_err(|e| Error::Storage(format!("corrupt table {}: {}", self.key, e)))?;
        log::debug!("loaded {} records from {}", records.len(), self.key);
        Ok(records
            .into_iter()
            .map(|record| (record.id().to_string(), record))
            .collect())
    }

    async fn store(&self, records: &BTreeMap<String, R>) -> Result<(), Error> {
        let records: Vec<&R> = records.values().collect();
        let data = serde_json::to_string(&records)?;
        self.storage.set(&self.key, data).await
    }

    async fn with_index<T>(&self, f: impl FnOnce(&BTreeMap<String, R>) -> T) -> Result<T, Error> {
        if let Some(table) = self.index.read().await.as_ref() {
            return Ok(f(table));
        }
        let mut index = self.index.write().await;
        let table = match index.take() {
            Some(table) => table,
            None => self.load().await?,
        };
        let out = f(&table);
        *index = Some(table);
        Ok(out)
    }

    /// Apply `f` to a copy of the table, store it, then publish it.
    async fn update(&self, f: impl FnOnce(&mut BTreeMap<String, R>)) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;
        let mut table = self.with_index(BTreeMap::clone).await?;
        f(&mut table);
        self.store(&table).await?;
        *self.index.write().await = Some(table);
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<R>, Error> {
        self.with_index(|table| table.get(id).cloned()).await
    }

    /// Upsert by id. The last write for an id wins.
    pub async fn put(&self, records: Vec<R>) -> Result<(), Error> {
        if records.is_empty() {
            return Ok(());
        }
        self.update(|table| {
            for record in records {
                table.insert(record.id().to_string(), record);
            }
        })
        .await
    }

    pub async fn list(&self) -> Result<Vec<R>, Error> {
        self.with_index(|table| table.values().cloned().collect()).await
    }

    pub async fn clear(&self) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;
        self.storage.remove(&self.key).await?;
        *self.index.write().await = Some(BTreeMap::new());
        Ok(())
    }

    /// Drop every record scoped to `organization_id` and insert `records` in
    /// its place, in a single storage write. Records in `records` are scoped
    /// to the organization regardless of what they carry. An id already held
    /// by another organization, or by an unscoped record, keeps its owner.
    pub async fn replace_for_organization(
        &self,
        organization_id: &str,
        records: Vec<R>,
    ) -> Result<(), Error>
    where
        R: Scoped,
    {
        let key = &self.key;
        self.update(|table| {
            table.retain(|_, record| record.organization_id() != Some(organization_id));
            for mut record in records {
                if let Some(owner) = table.get(record.id()) {
                    log::debug!(
                        "{}: {} is held by {}, not replaced for {}",
                        key,
                        record.id(),
                        owner.organization_id().unwrap_or("all organizations"),
                        organization_id
                    );
                    continue;
                }
                record.set_organization_id(organization_id);
                table.insert(record.id().to_string(), record);
            }
        })
        .await
    }
}

/// Records whose organization scope can be reassigned.
pub trait Scoped {
    fn set_organization_id(&mut self, organization_id: &str);
}

impl Scoped for ContextRecord {
    fn set_organization_id(&mut self, organization_id: &str) {
        self.organization_id = Some(organization_id.to_string());
    }
}

impl Scoped for PublicKeyRecord {
    fn set_organization_id(&mut self, organization_id: &str) {
        self.organization_id = Some(organization_id.to_string());
    }
}

impl Scoped for RevokedVcRecord {
    fn set_organization_id(&mut self, organization_id: &str) {
        self.organization_id = organization_id.to_string();
    }
}

impl Table<RevokedVcRecord> {
    /// Revocation record for `vc_id` that applies to the given organization
    /// or issuer.
    pub async fn find_revoked(
        &self,
        vc_id: &str,
        organization_id: Option<&str>,
        issuer: Option<&str>,
    ) -> Result<Option<RevokedVcRecord>, Error> {
        Ok(self.get(vc_id).await?.filter(|record| {
            organization_id == Some(record.organization_id.as_str())
                || issuer == Some(record.issuer.as_str())
        }))
    }
}

/// The three cache tables over one storage.
pub struct CacheStore {
    pub contexts: Table<ContextRecord>,
    pub keys: Table<PublicKeyRecord>,
    pub revoked: Table<RevokedVcRecord>,
}

impl CacheStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>, namespace: &str) -> Self {
        Self {
            contexts: Table::new(storage.clone(), namespace),
            keys: Table::new(storage.clone(), namespace),
            revoked: Table::new(storage, namespace),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()), "ssi-offline")
    }

    pub async fn clear(&self) -> Result<(), Error> {
        self.contexts.clear().await?;
        self.keys.clear().await?;
        self.revoked.clear().await
    }
}
