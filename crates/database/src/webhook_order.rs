//! Sales-order webhook storage.

use chrono::{SecondsFormat, Utc};
use pcf_core::wire::OrderWebhookPayload;
use pcf_core::{now_rfc3339, Assortment, SalesOrder, INDIVIDUAL_PREFIX};
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};
use tracing::{error, info, warn};

use crate::error::{DatabaseError, Result};
use crate::models::{
    AssortmentLookup, OrderAssortment, OrderMetadata, OrderSummary, WebhookOrder, WebhookStats,
};

const ORDER_COLUMNS: &str = "order_name, sales_order, assortments, status, received_at, \
     processed_at, error_message, total_images, assortment_count, source, odoo_version";

/// Upstream source assumed when a payload does not name one.
pub const DEFAULT_SOURCE: &str = "odoo";

#[derive(FromRow)]
struct OrderRow {
    order_name: String,
    sales_order: Json<SalesOrder>,
    assortments: Json<Vec<Assortment>>,
    status: String,
    received_at: String,
    processed_at: Option<String>,
    error_message: Option<String>,
    total_images: i64,
    assortment_count: i64,
    source: String,
    odoo_version: Option<String>,
}

impl TryFrom<OrderRow> for WebhookOrder {
    type Error = DatabaseError;

    fn try_from(row: OrderRow) -> Result<Self> {
        Ok(WebhookOrder {
            order_name: row.order_name,
            sales_order: row.sales_order.0,
            assortments: row.assortments.0,
            status: row.status.parse()?,
            received_at: row.received_at,
            processed_at: row.processed_at,
            error_message: row.error_message,
            metadata: OrderMetadata {
                total_images: row.total_images,
                assortment_count: row.assortment_count,
                source: row.source,
                odoo_version: row.odoo_version,
            },
        })
    }
}

/// Store an order webhook, inserting or overwriting by order name.
///
/// A re-delivery replaces the sales order, assortments and metadata, resets
/// the status to `received` and clears any previous error. If the write
/// fails, an `error` record carrying the failure message is written on a
/// best-effort basis and the original error is returned.
pub async fn save_order_webhook(
    pool: &SqlitePool,
    order_name: &str,
    payload: &OrderWebhookPayload,
) -> Result<WebhookOrder> {
    if order_name.trim().is_empty() {
        return Err(DatabaseError::Invalid {
            field: "orderName",
            reason: "must not be empty".to_string(),
        });
    }

    match upsert_order(pool, order_name, payload).await {
        Ok(order) => {
            info!(
                order_name = %order_name,
                assortments = order.metadata.assortment_count,
                total_images = order.metadata.total_images,
                "Stored order webhook"
            );
            Ok(order)
        }
        Err(err) => {
            error!(order_name = %order_name, error = %err, "Failed to store order webhook");
            if let Err(record_err) = record_order_error(pool, order_name, &err.to_string()).await {
                warn!(
                    order_name = %order_name,
                    error = %record_err,
                    "Failed to record webhook error state"
                );
            }
            Err(err)
        }
    }
}

async fn upsert_order(
    pool: &SqlitePool,
    order_name: &str,
    payload: &OrderWebhookPayload,
) -> Result<WebhookOrder> {
    let total_images: usize = payload
        .assortments
        .iter()
        .map(|assortment| assortment.pcf_images.image_count())
        .sum();
    let source = payload.source.as_deref().unwrap_or(DEFAULT_SOURCE);

    let query = format!(
        r#"
        INSERT INTO webhook_orders (
            order_name, sales_order, assortments, status, received_at,
            processed_at, error_message, total_images, assortment_count, source, odoo_version
        )
        VALUES (?, ?, ?, 'received', ?, NULL, NULL, ?, ?, ?, ?)
        ON CONFLICT(order_name) DO UPDATE SET
            sales_order = excluded.sales_order,
            assortments = excluded.assortments,
            status = excluded.status,
            received_at = excluded.received_at,
            processed_at = NULL,
            error_message = NULL,
            total_images = excluded.total_images,
            assortment_count = excluded.assortment_count,
            source = excluded.source,
            odoo_version = excluded.odoo_version
        RETURNING {columns}
        "#,
        columns = ORDER_COLUMNS
    );

    let row = sqlx::query_as::<_, OrderRow>(&query)
        .bind(order_name)
        .bind(Json(&payload.sales_order))
        .bind(Json(&payload.assortments))
        .bind(now_rfc3339())
        .bind(total_images as i64)
        .bind(payload.assortments.len() as i64)
        .bind(source)
        .bind(payload.odoo_version.as_deref())
        .fetch_one(pool)
        .await?;

    row.try_into()
}

/// Put an order into the `error` state with the given message.
///
/// Creates a placeholder record when the order was never stored.
pub async fn record_order_error(pool: &SqlitePool, order_name: &str, message: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO webhook_orders (order_name, status, received_at, error_message)
        VALUES (?, 'error', ?, ?)
        ON CONFLICT(order_name) DO UPDATE SET
            status = 'error',
            error_message = excluded.error_message
        "#,
    )
    .bind(order_name)
    .bind(now_rfc3339())
    .bind(message)
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark an order as processed. Returns whether the status changed.
///
/// Failures are logged and reported as `false`; processing state is
/// informational.
pub async fn mark_processed(pool: &SqlitePool, order_name: &str) -> bool {
    let result = sqlx::query(
        r#"
        UPDATE webhook_orders
        SET status = 'processed', processed_at = ?
        WHERE order_name = ?
        "#,
    )
    .bind(now_rfc3339())
    .bind(order_name)
    .execute(pool)
    .await;

    match result {
        Ok(done) if done.rows_affected() == 0 => {
            warn!(order_name = %order_name, "Cannot mark unknown order as processed");
            false
        }
        Ok(_) => true,
        Err(err) => {
            warn!(order_name = %order_name, error = %err, "Failed to mark order as processed");
            false
        }
    }
}

/// Get an order by name.
pub async fn get_order(pool: &SqlitePool, order_name: &str) -> Result<WebhookOrder> {
    let query = format!(
        r#"
        SELECT {columns}
        FROM webhook_orders
        WHERE order_name = ?
        "#,
        columns = ORDER_COLUMNS
    );

    sqlx::query_as::<_, OrderRow>(&query)
        .bind(order_name)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "WebhookOrder",
            id: order_name.to_string(),
        })?
        .try_into()
}

/// Find an assortment embedded in a stored order.
///
/// The most recently received order containing a match wins. Returns `None`
/// when no order contains the assortment.
pub async fn find_assortment_in_order(
    pool: &SqlitePool,
    lookup: &AssortmentLookup,
) -> Result<Option<OrderAssortment>> {
    let condition = match lookup {
        AssortmentLookup::ItemNo(_) => "json_extract(a.value, '$.itemNo') = ?",
        AssortmentLookup::Id(_) => "CAST(json_extract(a.value, '$._id') AS INTEGER) = ?",
    };
    let query = format!(
        r#"
        SELECT {columns}
        FROM webhook_orders
        WHERE EXISTS (
            SELECT 1 FROM json_each(webhook_orders.assortments) AS a
            WHERE {condition}
        )
        ORDER BY received_at DESC
        LIMIT 1
        "#,
        columns = ORDER_COLUMNS,
        condition = condition
    );

    let query = sqlx::query_as::<_, OrderRow>(&query);
    let query = match lookup {
        AssortmentLookup::ItemNo(item_no) => query.bind(item_no.as_str()),
        AssortmentLookup::Id(id) => query.bind(*id),
    };

    let Some(row) = query.fetch_optional(pool).await? else {
        return Ok(None);
    };
    let order = WebhookOrder::try_from(row)?;

    let found = order
        .assortments
        .into_iter()
        .find(|assortment| lookup.matches(assortment))
        .map(|assortment| OrderAssortment {
            assortment,
            sales_order: order.sales_order,
            order_name: order.order_name,
        });

    Ok(found)
}

/// List recent orders, newest first, excluding synthetic individual records.
pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<OrderSummary>> {
    let rows = sqlx::query_as::<_, OrderSummary>(
        r#"
        SELECT order_name,
               COALESCE(json_extract(sales_order, '$.customer'), '') AS customer,
               status, received_at, processed_at, error_message,
               total_images, assortment_count
        FROM webhook_orders
        WHERE substr(order_name, 1, ?) != ?
        ORDER BY received_at DESC
        LIMIT ?
        "#,
    )
    .bind(INDIVIDUAL_PREFIX.len() as i64)
    .bind(INDIVIDUAL_PREFIX)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Aggregate order and individual-assortment statistics.
pub async fn stats(pool: &SqlitePool) -> Result<WebhookStats> {
    let cutoff = (Utc::now() - chrono::Duration::hours(24))
        .to_rfc3339_opts(SecondsFormat::Millis, true);

    let (total_orders, recent_orders, error_orders, total_images) =
        sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN received_at >= ? THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN status = 'error' THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(total_images), 0)
            FROM webhook_orders
            WHERE substr(order_name, 1, ?) != ?
            "#,
        )
        .bind(cutoff)
        .bind(INDIVIDUAL_PREFIX.len() as i64)
        .bind(INDIVIDUAL_PREFIX)
        .fetch_one(pool)
        .await?;

    let individual_assortments =
        crate::individual_assortment::count_individual_assortments(pool).await?;

    Ok(WebhookStats {
        total_orders,
        recent_orders,
        error_orders,
        total_images,
        individual_assortments,
        success_rate: success_rate(total_orders, error_orders),
    })
}

/// Percentage of non-error orders, formatted with one decimal.
pub fn success_rate(total: i64, errors: i64) -> String {
    if total <= 0 {
        return "0%".to_string();
    }
    let rate = (total - errors) as f64 / total as f64 * 100.0;
    format!("{:.1}%", rate)
}
