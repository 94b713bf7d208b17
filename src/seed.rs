//! Priming the cache so credentials verify offline.
//!
//! A [`CacheBundle`] is the unit of exchange: derived from a credential, or
//! received as an organization sync payload, then either merged into the
//! cache or used to replace everything an organization owns.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{CacheStore, ContextRecord, ContextSource, PublicKeyRecord, RevokedVcRecord};
use crate::config::Connectivity;
use crate::context_loader::DocumentResolver;
use crate::error::Error;
use crate::http::HttpClient;
use crate::jsonld;
use crate::key_resolver::PublicKeyResolver;
use crate::vc::Credential;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheBundle {
    pub contexts: Vec<ContextRecord>,
    #[serde(alias = "publicKeys")]
    pub keys: Vec<PublicKeyRecord>,
    #[serde(alias = "revokedVcs")]
    pub revoked: Vec<RevokedVcRecord>,
}

impl CacheBundle {
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty() && self.keys.is_empty() && self.revoked.is_empty()
    }

    pub fn from_json_str(data: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(data)?)
    }
}

pub struct OrgResolver {
    cache: Arc<CacheStore>,
    documents: DocumentResolver,
    keys: PublicKeyResolver,
}

impl OrgResolver {
    pub fn new(cache: Arc<CacheStore>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            documents: DocumentResolver::new(cache.clone(), http.clone()),
            keys: PublicKeyResolver::new(cache.clone(), http),
            cache,
        }
    }

    /// Contexts (with the contexts they import) and keys `credential` needs.
    /// Proofs whose key cannot be found contribute nothing.
    pub async fn derive_bundle(
        &self,
        credential: &Credential,
        connectivity: Connectivity,
    ) -> Result<CacheBundle, Error> {
        let mut bundle = CacheBundle::default();

        let mut pending: Vec<String> = jsonld::top_level_context_urls(credential.as_value());
        let mut seen = BTreeSet::new();
        while let Some(url) = pending.pop() {
            if !seen.insert(url.clone()) {
                continue;
            }
            let document = self.documents.resolve(&url, connectivity).await?;
            pending.extend(jsonld::top_level_context_urls(&document));
            bundle
                .contexts
                .push(ContextRecord::new(url, document, ContextSource::Prime));
        }

        let proofs = credential.proofs().unwrap_or_default();
        for key_id in proofs
            .iter()
            .filter_map(|proof| proof.get("verificationMethod").and_then(Value::as_str))
        {
            match self.keys.resolve_record(key_id, connectivity).await? {
                Some(record) => bundle.keys.push(record),
                None => log::warn!("key {} not found, not seeded", key_id),
            }
        }
        Ok(bundle)
    }

    /// Upsert every record of `bundle`.
    pub async fn prime(&self, bundle: CacheBundle) -> Result<(), Error> {
        log::info!(
            "priming {} contexts, {} keys, {} revocations",
            bundle.contexts.len(),
            bundle.keys.len(),
            bundle.revoked.len()
        );
        self.cache.contexts.put(bundle.contexts).await?;
        self.cache.keys.put(bundle.keys).await?;
        self.cache.revoked.put(bundle.revoked).await
    }

    /// Make `bundle` the whole dataset of `organization_id` in all three
    /// tables.
    pub async fn replace_for_organization(
        &self,
        organization_id: &str,
        bundle: CacheBundle,
    ) -> Result<(), Error> {
        log::info!("replacing cached data of organization {}", organization_id);
        let contexts = bundle
            .contexts
            .into_iter()
            .map(|mut record| {
                record.source = ContextSource::OrgSync;
                record
            })
            .collect();
        self.cache
            .contexts
            .replace_for_organization(organization_id, contexts)
            .await?;
        self.cache
            .keys
            .replace_for_organization(organization_id, bundle.keys)
            .await?;
        self.cache
            .revoked
            .replace_for_organization(organization_id, bundle.revoked)
            .await
    }

    /// Derive the bundle for `credential` and store it, scoped to
    /// `organization_id` when one is given.
    pub async fn seed_from_credential(
        &self,
        credential: &Credential,
        organization_id: Option<&str>,
        connectivity: Connectivity,
    ) -> Result<CacheBundle, Error> {
        let bundle = self.derive_bundle(credential, connectivity).await?;
        match organization_id {
            Some(organization_id) => {
                self.replace_for_organization(organization_id, bundle.clone())
                    .await?
            }
            None => self.prime(bundle.clone()).await?,
        }
        Ok(bundle)
    }
}
