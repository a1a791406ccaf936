//! PostgreSQL-backed entity directory.
//!
//! Runtime-checked queries (no compile-time database dependency) against the
//! `relay_messaging_entities` table. Lookup is read-only; `ensure_schema` and
//! `upsert_entity` exist for bootstrap and test fixtures.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use super::entity::{EntityDirectory, MessagingEntity};
use crate::error::{RelayError, RelayResult};

const SELECT_COLUMNS: &str = "entity_name, owner, primary_connection, secondary_connection, \
     status, created_at, updated_at";

/// Entity directory over a shared PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PostgresEntityDirectory {
    pool: PgPool,
}

impl PostgresEntityDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the directory table when it does not exist yet
    pub async fn ensure_schema(&self) -> RelayResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS relay_messaging_entities (
                entity_name TEXT NOT NULL,
                owner TEXT NOT NULL,
                primary_connection TEXT NOT NULL,
                secondary_connection TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                created_at TIMESTAMP NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP NOT NULL DEFAULT NOW(),
                PRIMARY KEY (entity_name, owner)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(RelayError::from)?;

        Ok(())
    }

    /// Insert or replace a directory entry; used by bootstrap and tests
    pub async fn upsert_entity(&self, entity: &MessagingEntity) -> RelayResult<()> {
        sqlx::query(
            r#"
            INSERT INTO relay_messaging_entities
                (entity_name, owner, primary_connection, secondary_connection, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            ON CONFLICT (entity_name, owner) DO UPDATE SET
                primary_connection = EXCLUDED.primary_connection,
                secondary_connection = EXCLUDED.secondary_connection,
                status = EXCLUDED.status,
                updated_at = NOW()
            "#,
        )
        .bind(&entity.entity_name)
        .bind(&entity.owner)
        .bind(&entity.primary_connection)
        .bind(&entity.secondary_connection)
        .bind(entity.status)
        .execute(&self.pool)
        .await
        .map_err(RelayError::from)?;

        debug!(
            entity_name = %entity.entity_name,
            owner = %entity.owner,
            "📋 Upserted messaging entity"
        );
        Ok(())
    }
}

#[async_trait]
impl EntityDirectory for PostgresEntityDirectory {
    async fn get_entity(
        &self,
        entity_name: &str,
        owner: &str,
    ) -> RelayResult<Option<MessagingEntity>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM relay_messaging_entities \
             WHERE entity_name = $1 AND owner = $2"
        );

        let entity = sqlx::query_as::<_, MessagingEntity>(&sql)
            .bind(entity_name)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
            .map_err(RelayError::from)?;

        debug!(
            entity_name = %entity_name,
            owner = %owner,
            found = entity.is_some(),
            "📋 Entity directory lookup"
        );
        Ok(entity)
    }

    async fn get_all_entities(&self) -> RelayResult<Vec<MessagingEntity>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM relay_messaging_entities \
             ORDER BY entity_name, owner"
        );

        let entities = sqlx::query_as::<_, MessagingEntity>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(RelayError::from)?;

        Ok(entities)
    }
}
