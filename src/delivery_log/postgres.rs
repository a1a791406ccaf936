//! PostgreSQL persistence for delivery-outcome logs.
//!
//! Runtime-checked queries over the same pool the broker channel uses.
//! Two tables: `relay_success_delivery_logs` (append only, no read path in
//! this crate) and `relay_failed_delivery_logs` (read back by the replay
//! processor).

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use super::types::{
    DeliveryStatus, FailedDeliveryLog, NewFailedDeliveryLog, NewSuccessDeliveryLog,
};
use super::{DeliveryLogRepository, FailedMessageService};
use crate::error::{RelayError, RelayResult};

const FAILED_COLUMNS: &str = "id, message_id, correlation_id, publisher, metadata, payload, \
     entity_name, subscription_name, status, error_message, error_detail, \
     received_at, failed_at, created_at";

/// Delivery-log persistence over a shared PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PostgresDeliveryLog {
    pool: PgPool,
}

impl PostgresDeliveryLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create both log tables when they do not exist yet
    pub async fn ensure_schema(&self) -> RelayResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS relay_success_delivery_logs (
                id BIGSERIAL PRIMARY KEY,
                message_id TEXT NOT NULL,
                correlation_id TEXT,
                publisher TEXT,
                metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
                payload TEXT NOT NULL,
                entity_name TEXT NOT NULL,
                received_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(RelayError::from)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS relay_failed_delivery_logs (
                id BIGSERIAL PRIMARY KEY,
                message_id TEXT NOT NULL,
                correlation_id TEXT,
                publisher TEXT,
                metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
                payload TEXT NOT NULL,
                entity_name TEXT NOT NULL,
                subscription_name TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'failed',
                error_message TEXT,
                error_detail TEXT,
                received_at TIMESTAMP NOT NULL,
                failed_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(RelayError::from)?;

        Ok(())
    }
}

#[async_trait]
impl DeliveryLogRepository for PostgresDeliveryLog {
    async fn append_success(&self, log: NewSuccessDeliveryLog) -> RelayResult<()> {
        sqlx::query(
            r#"
            INSERT INTO relay_success_delivery_logs
                (message_id, correlation_id, publisher, metadata, payload, entity_name, received_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&log.message_id)
        .bind(&log.correlation_id)
        .bind(&log.publisher)
        .bind(&log.metadata)
        .bind(&log.payload)
        .bind(&log.entity_name)
        .bind(log.received_at)
        .execute(&self.pool)
        .await
        .map_err(RelayError::from)?;

        debug!(
            message_id = %log.message_id,
            entity_name = %log.entity_name,
            "✅ Appended success delivery log"
        );
        Ok(())
    }

    async fn append_failure(&self, log: NewFailedDeliveryLog) -> RelayResult<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO relay_failed_delivery_logs
                (message_id, correlation_id, publisher, metadata, payload, entity_name,
                 subscription_name, status, error_message, error_detail, received_at, failed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(&log.message_id)
        .bind(&log.correlation_id)
        .bind(&log.publisher)
        .bind(&log.metadata)
        .bind(&log.payload)
        .bind(&log.entity_name)
        .bind(&log.subscription_name)
        .bind(log.status)
        .bind(&log.error_message)
        .bind(&log.error_detail)
        .bind(log.received_at)
        .bind(log.failed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(RelayError::from)?;

        debug!(
            message_id = %log.message_id,
            entity_name = %log.entity_name,
            failed_log_id = row.0,
            "💥 Appended failed delivery log"
        );
        Ok(row.0)
    }
}

#[async_trait]
impl FailedMessageService for PostgresDeliveryLog {
    async fn find_by_ids(&self, ids: &[i64]) -> RelayResult<Vec<FailedDeliveryLog>> {
        let sql = format!(
            "SELECT {FAILED_COLUMNS} FROM relay_failed_delivery_logs \
             WHERE id = ANY($1) ORDER BY id"
        );

        let rows = sqlx::query_as::<_, FailedDeliveryLog>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(RelayError::from)?;

        Ok(rows)
    }

    async fn update_status(&self, id: i64, status: DeliveryStatus) -> RelayResult<()> {
        sqlx::query(
            "UPDATE relay_failed_delivery_logs SET status = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(&self.pool)
        .await
        .map_err(RelayError::from)?;

        debug!(failed_log_id = id, status = %status, "🔄 Updated failed delivery log status");
        Ok(())
    }

    async fn update_error_message(&self, id: i64, error_message: &str) -> RelayResult<()> {
        sqlx::query(
            "UPDATE relay_failed_delivery_logs SET error_message = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(RelayError::from)?;

        Ok(())
    }
}
