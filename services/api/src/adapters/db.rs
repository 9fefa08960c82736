//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ContentStore` port from the `core` crate. It persists generated
//! educational content in PostgreSQL using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eduforge_core::domain::{EducationalContent, StoredContent};
use eduforge_core::ports::{ContentStore, PortError, PortResult};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ContentStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ContentRecord {
    id: Uuid,
    topic: String,
    learner_level: String,
    learning_style: String,
    payload: Json<EducationalContent>,
    created_at: DateTime<Utc>,
}
impl ContentRecord {
    fn to_domain(self) -> StoredContent {
        StoredContent {
            id: self.id,
            topic: self.topic,
            learner_level: self.learner_level,
            learning_style: self.learning_style,
            content: self.payload.0,
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// `ContentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentStore for DbAdapter {
    async fn save_content(&self, content: &StoredContent) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO educational_content (id, topic, learner_level, learning_style, payload, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(content.id)
        .bind(&content.topic)
        .bind(&content.learner_level)
        .bind(&content.learning_style)
        .bind(Json(&content.content))
        .bind(content.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn get_content(&self, content_id: Uuid) -> PortResult<StoredContent> {
        let record = sqlx::query_as::<_, ContentRecord>(
            "SELECT id, topic, learner_level, learning_style, payload, created_at \
             FROM educational_content WHERE id = $1",
        )
        .bind(content_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Educational content {} not found", content_id))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }
}
