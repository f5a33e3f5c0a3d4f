//! Standalone assortment storage.
//!
//! Rows are keyed by item number. Webhook saves overwrite the assortment body
//! and metadata; the `user_modifications` column is only written through
//! [`crate::user_modifications`].

use pcf_core::{cache_key, hash, now_rfc3339, Assortment, UserModifications};
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use crate::error::{DatabaseError, Result};
use crate::models::{
    AssortmentOrigin, AssortmentPayload, IndividualAssortment, IndividualMetadata,
    PerformanceMetrics, VersionEntry,
};

const INDIVIDUAL_COLUMNS: &str = "assortment_id, assortment, user_modifications, status, \
     access_count, last_accessed_at, current_version, version_history, cache_key, total_images, \
     source, order_name, image_collection_hash, average_load_time, total_cache_hits, \
     total_cache_misses, created_at, updated_at";

#[derive(FromRow)]
struct IndividualRow {
    assortment_id: String,
    assortment: Json<Assortment>,
    user_modifications: Option<Json<UserModifications>>,
    status: String,
    access_count: i64,
    last_accessed_at: String,
    current_version: i64,
    version_history: Json<Vec<VersionEntry>>,
    cache_key: String,
    total_images: i64,
    source: String,
    order_name: Option<String>,
    image_collection_hash: String,
    average_load_time: f64,
    total_cache_hits: i64,
    total_cache_misses: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<IndividualRow> for IndividualAssortment {
    type Error = DatabaseError;

    fn try_from(row: IndividualRow) -> Result<Self> {
        let user_modifications = row.user_modifications.map(|json| json.0);
        let loads = row.total_cache_hits + row.total_cache_misses;
        let cache_hit_rate = if loads > 0 {
            row.total_cache_hits as f64 / loads as f64 * 100.0
        } else {
            0.0
        };

        Ok(IndividualAssortment {
            metadata: IndividualMetadata {
                total_images: row.total_images,
                source: row.source,
                image_collection_hash: row.image_collection_hash,
                has_user_modifications: user_modifications.is_some(),
                order_name: row.order_name,
            },
            assortment_data: AssortmentPayload {
                assortment: row.assortment.0,
                user_modifications,
            },
            assortment_id: row.assortment_id,
            status: row.status.parse()?,
            access_count: row.access_count,
            last_accessed_at: row.last_accessed_at,
            current_version: row.current_version,
            version_history: row.version_history.0,
            cache_key: row.cache_key,
            performance_metrics: PerformanceMetrics {
                average_load_time: row.average_load_time,
                cache_hit_rate,
                total_cache_hits: row.total_cache_hits,
                total_cache_misses: row.total_cache_misses,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Save a standalone copy of an assortment, keyed by its item number.
///
/// A first save starts at version 1 with one history entry and an access
/// count of 0. Later saves count an access and a cache miss, overwrite the
/// assortment and metadata, and bump the version only when the image
/// collection hash changed. Stored user modifications are left untouched.
pub async fn save_individual_assortment(
    pool: &SqlitePool,
    assortment: &Assortment,
    origin: &AssortmentOrigin,
) -> Result<IndividualAssortment> {
    let assortment_id = assortment.item_no.trim();
    if assortment_id.is_empty() {
        return Err(DatabaseError::Invalid {
            field: "itemNo",
            reason: "must not be empty".to_string(),
        });
    }

    let digest = hash::hash_collection(&assortment.pcf_images, None);
    let total_images = assortment.pcf_images.image_count() as i64;

    let query = format!(
        r#"
        INSERT INTO individual_assortments (
            assortment_id, assortment, status, access_count, last_accessed_at,
            current_version, version_history, cache_key, total_images, source, order_name,
            image_collection_hash, created_at, updated_at
        )
        VALUES (
            ?1, ?2, 'received', 0, ?3, 1,
            json_array(json_object(
                'version', 1, 'collectionHash', ?4, 'totalImages', ?5, 'recordedAt', ?3
            )),
            ?6, ?5, ?7, ?8, ?4, ?3, ?3
        )
        ON CONFLICT(assortment_id) DO UPDATE SET
            assortment = excluded.assortment,
            status = 'received',
            access_count = individual_assortments.access_count + 1,
            last_accessed_at = excluded.last_accessed_at,
            current_version = CASE
                WHEN individual_assortments.image_collection_hash = excluded.image_collection_hash
                THEN individual_assortments.current_version
                ELSE individual_assortments.current_version + 1
            END,
            version_history = CASE
                WHEN individual_assortments.image_collection_hash = excluded.image_collection_hash
                THEN individual_assortments.version_history
                ELSE json_insert(individual_assortments.version_history, '$[#]', json_object(
                    'version', individual_assortments.current_version + 1,
                    'collectionHash', excluded.image_collection_hash,
                    'totalImages', excluded.total_images,
                    'recordedAt', excluded.updated_at
                ))
            END,
            cache_key = excluded.cache_key,
            total_images = excluded.total_images,
            source = excluded.source,
            order_name = COALESCE(excluded.order_name, individual_assortments.order_name),
            image_collection_hash = excluded.image_collection_hash,
            total_cache_misses = individual_assortments.total_cache_misses + 1,
            updated_at = excluded.updated_at
        RETURNING {columns}
        "#,
        columns = INDIVIDUAL_COLUMNS
    );

    let row = sqlx::query_as::<_, IndividualRow>(&query)
        .bind(assortment_id)
        .bind(Json(assortment))
        .bind(now_rfc3339())
        .bind(&digest.collection_hash)
        .bind(total_images)
        .bind(cache_key(assortment_id))
        .bind(&origin.source)
        .bind(origin.order_name.as_deref())
        .fetch_one(pool)
        .await?;

    let saved = IndividualAssortment::try_from(row)?;
    info!(
        assortment_id = %saved.assortment_id,
        version = saved.current_version,
        total_images = saved.metadata.total_images,
        "Stored individual assortment"
    );
    Ok(saved)
}

/// Fetch an individual assortment, counting the access.
///
/// Returns `None` when the assortment was never saved.
pub async fn get_individual_assortment(
    pool: &SqlitePool,
    assortment_id: &str,
) -> Result<Option<IndividualAssortment>> {
    let query = format!(
        r#"
        UPDATE individual_assortments
        SET access_count = access_count + 1, last_accessed_at = ?
        WHERE assortment_id = ?
        RETURNING {columns}
        "#,
        columns = INDIVIDUAL_COLUMNS
    );

    let row = sqlx::query_as::<_, IndividualRow>(&query)
        .bind(now_rfc3339())
        .bind(assortment_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            debug!(assortment_id = %assortment_id, "Individual assortment accessed");
            Ok(Some(row.try_into()?))
        }
        None => Ok(None),
    }
}

/// Whether an individual assortment exists.
pub async fn individual_assortment_exists(pool: &SqlitePool, assortment_id: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM individual_assortments WHERE assortment_id = ?)",
    )
    .bind(assortment_id)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Number of stored individual assortments.
pub async fn count_individual_assortments(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM individual_assortments")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Record one client load of an assortment.
///
/// Maintains the running average load time and the hit/miss counters.
pub async fn record_load(
    pool: &SqlitePool,
    assortment_id: &str,
    load_time_ms: f64,
    cache_hit: bool,
) -> Result<()> {
    if !load_time_ms.is_finite() || load_time_ms < 0.0 {
        return Err(DatabaseError::Invalid {
            field: "loadTime",
            reason: format!("must be a non-negative number, got {}", load_time_ms),
        });
    }

    let result = sqlx::query(
        r#"
        UPDATE individual_assortments
        SET average_load_time = (average_load_time * load_samples + ?1) / (load_samples + 1),
            load_samples = load_samples + 1,
            total_cache_hits = total_cache_hits + ?2,
            total_cache_misses = total_cache_misses + ?3
        WHERE assortment_id = ?4
        "#,
    )
    .bind(load_time_ms)
    .bind(i64::from(cache_hit))
    .bind(i64::from(!cache_hit))
    .bind(assortment_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "IndividualAssortment",
            id: assortment_id.to_string(),
        });
    }

    Ok(())
}
