//! Two-level assortment cache.
//!
//! Reads go to the in-memory query cache, then the durable store, then the
//! network. Durable entries are stored under [`pcf_core::cache_key`] with the
//! base64 image bodies stripped, next to a schema version marker; opening a
//! cache whose marker differs purges every entry.

use std::collections::HashMap;

use pcf_core::transform::{
    transform_individual_assortment_response, transform_raw_to_assortment_data, MergedImage,
};
use pcf_core::{cache_key, now_rfc3339, AssortmentData, PcfImages};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::api::{AssortmentSource, ResourceKind};
use crate::error::{ClientError, Result};
use crate::store::DurableStore;

/// Schema version of durable entries.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Durable key holding the schema version marker. Kept outside the entry
/// prefix so no assortment id maps onto it.
pub const VERSION_KEY: &str = "pcf-cache-schema-version";

const KEY_PREFIX: &str = "assortment-cache-";

/// Where a cached read was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOrigin {
    Memory,
    Durable,
    Network,
}

/// A resolved assortment read.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub data: AssortmentData,
    pub origin: CacheOrigin,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DurableEntry {
    schema_version: u32,
    kind: ResourceKind,
    stored_at: String,
    data: AssortmentData,
}

/// Assortment cache over a durable store.
pub struct AssortmentCache<S> {
    memory: RwLock<HashMap<(ResourceKind, String), AssortmentData>>,
    store: S,
}

impl<S: DurableStore> AssortmentCache<S> {
    /// Open the cache, purging durable entries written by another schema.
    pub async fn open(store: S) -> Result<Self> {
        let expected = CACHE_SCHEMA_VERSION.to_string();
        let marker = store.get(VERSION_KEY).await?;

        if marker.as_deref() != Some(expected.as_str()) {
            let mut purged = 0usize;
            for key in store.keys().await? {
                if key.starts_with(KEY_PREFIX) {
                    store.remove(&key).await?;
                    purged += 1;
                }
            }
            store.set(VERSION_KEY, &expected).await?;
            info!(
                previous = marker.as_deref().unwrap_or("none"),
                current = CACHE_SCHEMA_VERSION,
                purged,
                "Cache schema changed, purged durable entries"
            );
        }

        Ok(Self {
            memory: RwLock::new(HashMap::new()),
            store,
        })
    }

    /// The durable store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve an assortment through memory, durable store and network.
    ///
    /// A network hit populates both caches. Returns `None` when the server
    /// does not know the assortment.
    pub async fn load<A>(
        &self,
        source: &A,
        kind: ResourceKind,
        assortment_id: &str,
    ) -> Result<Option<Loaded>>
    where
        A: AssortmentSource + ?Sized,
    {
        let memory_key = (kind, assortment_id.to_string());

        if let Some(data) = self.memory.read().await.get(&memory_key) {
            debug!(assortment_id = %assortment_id, "Memory cache hit");
            return Ok(Some(Loaded {
                data: data.clone(),
                origin: CacheOrigin::Memory,
            }));
        }

        if let Some(data) = self.read_durable(kind, assortment_id).await {
            debug!(assortment_id = %assortment_id, "Durable cache hit");
            self.memory.write().await.insert(memory_key, data.clone());
            return Ok(Some(Loaded {
                data,
                origin: CacheOrigin::Durable,
            }));
        }

        let Some(response) = source.fetch_assortment(kind, assortment_id).await? else {
            return Ok(None);
        };
        let data = match kind {
            ResourceKind::IndividualAssortment => {
                transform_individual_assortment_response(response.data)
            }
            ResourceKind::Assortment => transform_raw_to_assortment_data(response.data, response.source),
        };

        self.memory.write().await.insert(memory_key, data.clone());
        if let Err(err) = self.write_durable(kind, assortment_id, &data).await {
            warn!(assortment_id = %assortment_id, error = %err, "Failed to persist cache entry");
        }

        Ok(Some(Loaded {
            data,
            origin: CacheOrigin::Network,
        }))
    }

    /// Drop every cached view of an assortment.
    pub async fn invalidate(&self, assortment_id: &str) -> Result<()> {
        self.memory
            .write()
            .await
            .retain(|(_, id), _| id != assortment_id);
        self.store.remove(&cache_key(assortment_id)).await?;
        debug!(assortment_id = %assortment_id, "Cache invalidated");
        Ok(())
    }

    async fn read_durable(&self, kind: ResourceKind, assortment_id: &str) -> Option<AssortmentData> {
        let key = cache_key(assortment_id);
        let raw = match self.store.get(&key).await {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(key = %key, error = %err, "Durable cache read failed");
                return None;
            }
        };

        match serde_json::from_str::<DurableEntry>(&raw) {
            Ok(entry) if entry.schema_version == CACHE_SCHEMA_VERSION && entry.kind == kind => {
                Some(entry.data)
            }
            Ok(_) => None,
            Err(err) => {
                warn!(key = %key, error = %err, "Dropping unreadable cache entry");
                if let Err(err) = self.store.remove(&key).await {
                    warn!(key = %key, error = %err, "Failed to drop cache entry");
                }
                None
            }
        }
    }

    async fn write_durable(
        &self,
        kind: ResourceKind,
        assortment_id: &str,
        data: &AssortmentData,
    ) -> Result<()> {
        let entry = DurableEntry {
            schema_version: CACHE_SCHEMA_VERSION,
            kind,
            stored_at: now_rfc3339(),
            data: strip_images(data.clone()),
        };
        let raw = serde_json::to_string(&entry).map_err(|err| ClientError::Cache(err.to_string()))?;
        self.store.set(&cache_key(assortment_id), &raw).await
    }
}

fn strip_pcf_images(images: &mut PcfImages) {
    images.for_each_mut(|_, _, _, entry| entry.image.clear());
}

/// Remove base64 image bodies, keeping hashes and metadata.
pub fn strip_images(mut data: AssortmentData) -> AssortmentData {
    strip_pcf_images(&mut data.base_assortment.webhook_images);
    strip_pcf_images(&mut data.merged_data.webhook_images);
    strip_pcf_images(&mut data.merged_data.assortment.pcf_images);
    data.merged_data
        .all_images
        .for_each_mut(|_, _, _, image| {
            if let MergedImage::Webhook(entry) = image {
                entry.image.clear();
            }
        });
    data
}
