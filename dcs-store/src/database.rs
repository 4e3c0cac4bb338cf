use async_trait::async_trait;
use dcs_core::{Collection, DocumentStore, StoreError, StoreResult, WriteBatch, WriteOp};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgExecutor, Pool, Postgres};
use std::time::Duration;
use tracing::{debug, info};

/// Field equality as containment, so the GIN index on `body` serves it.
const QUERY_EQ_SQL: &str = "SELECT body FROM documents \
     WHERE collection = $1 AND body @> jsonb_build_object($2::text, $3::jsonb) \
     ORDER BY id";

/// Remote document store on PostgreSQL: one `documents` table, JSONB bodies.
#[derive(Clone)]
pub struct PgDocumentStore {
    pub pool: Pool<Postgres>,
}

impl PgDocumentStore {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    /// Pool that connects on first use, so the desk can start while offline.
    pub fn connect_lazy(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect_lazy(connection_string)?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

fn store_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
        other => StoreError::Backend(other.to_string()),
    }
}

async fn put_doc<'e, E: PgExecutor<'e>>(
    executor: E,
    collection: Collection,
    id: &str,
    doc: &Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO documents (collection, id, body)
        VALUES ($1, $2, $3)
        ON CONFLICT (collection, id)
        DO UPDATE SET body = EXCLUDED.body, updated_at = now()
        "#,
    )
    .bind(collection.as_str())
    .bind(id)
    .bind(Json(doc))
    .execute(executor)
    .await?;
    Ok(())
}

/// `||` on JSONB objects replaces top-level keys, which is the merge we want.
async fn merge_doc<'e, E: PgExecutor<'e>>(
    executor: E,
    collection: Collection,
    id: &str,
    patch: &Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO documents (collection, id, body)
        VALUES ($1, $2, $3)
        ON CONFLICT (collection, id)
        DO UPDATE SET body = documents.body || EXCLUDED.body, updated_at = now()
        "#,
    )
    .bind(collection.as_str())
    .bind(id)
    .bind(Json(patch))
    .execute(executor)
    .await?;
    Ok(())
}

async fn delete_doc<'e, E: PgExecutor<'e>>(
    executor: E,
    collection: Collection,
    id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
        .bind(collection.as_str())
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Value>> {
        let row: Option<Json<Value>> = sqlx::query_scalar(
            "SELECT body FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(|Json(body)| body))
    }

    async fn put(&self, collection: Collection, id: &str, doc: Value) -> StoreResult<()> {
        put_doc(&self.pool, collection, id, &doc)
            .await
            .map_err(store_error)
    }

    async fn merge(&self, collection: Collection, id: &str, patch: Value) -> StoreResult<()> {
        merge_doc(&self.pool, collection, id, &patch)
            .await
            .map_err(store_error)
    }

    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<()> {
        delete_doc(&self.pool, collection, id)
            .await
            .map_err(store_error)
    }

    async fn list(&self, collection: Collection) -> StoreResult<Vec<Value>> {
        let rows: Vec<Json<Value>> =
            sqlx::query_scalar("SELECT body FROM documents WHERE collection = $1 ORDER BY id")
                .bind(collection.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(store_error)?;

        Ok(rows.into_iter().map(|Json(body)| body).collect())
    }

    async fn query_eq(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Value>> {
        let rows: Vec<Json<Value>> = sqlx::query_scalar(QUERY_EQ_SQL)
        .bind(collection.as_str())
        .bind(field)
        .bind(Json(value))
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().map(|Json(body)| body).collect())
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let size = batch.len();
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        for op in &batch.ops {
            let result = match op {
                WriteOp::Put { collection, id, doc } => put_doc(&mut *tx, *collection, id, doc).await,
                WriteOp::Merge { collection, id, patch } => {
                    merge_doc(&mut *tx, *collection, id, patch).await
                }
                WriteOp::Delete { collection, id } => delete_doc(&mut *tx, *collection, id).await,
            };
            result.map_err(store_error)?;
        }

        tx.commit().await.map_err(store_error)?;
        debug!("Committed batch of {} writes", size);
        Ok(())
    }
}
