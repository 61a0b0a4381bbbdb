use anyhow::Result;

use crate::config::Config;
use crate::db;

/// Create the schema. Idempotent — safe to run on every start.
///
/// Vectors are kept in a side table rather than a column on `documents`
/// so the document row holds exactly the source-visible fields that
/// participate in change detection.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            key TEXT PRIMARY KEY,
            author TEXT,
            body TEXT,
            summary TEXT,
            url TEXT,
            created_time TEXT,
            inserted_time TEXT,
            likes INTEGER,
            comments INTEGER,
            shares INTEGER,
            tags TEXT
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_vectors (
            key TEXT PRIMARY KEY,
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            model TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (key) REFERENCES documents(key)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_created_time ON documents(created_time DESC)",
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
