//! Sync pipeline orchestration.
//!
//! Coordinates the full run: feed fetch → normalization → change
//! detection → batched embedding → bounded-concurrency upserts. Re-running
//! against unchanged source data is a no-op. Fetch and embedding failures
//! abort the run; individual upsert failures are counted and reported.

use anyhow::{bail, Context, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::db;
use crate::detect;
use crate::embedding;
use crate::models::{DocumentRecord, SyncReport};
use crate::source;

pub async fn run_sync(config: &Config) -> Result<SyncReport> {
    if !config.embedding.is_enabled() {
        bail!("Sync requires embeddings. Set [embedding] provider in config.");
    }

    let pool = db::connect(config).await?;

    // Fatal on retry exhaustion
    let raw_posts = source::fetch_posts(&config.source)
        .await
        .context("Feed fetch failed")?;
    let fetched = raw_posts.len();

    let records: Vec<DocumentRecord> = raw_posts.into_iter().map(source::normalize).collect();

    let empty_keys = records.iter().filter(|r| r.key.is_empty()).count();
    if empty_keys > 0 {
        eprintln!(
            "Warning: {} record(s) have no id or url; their empty keys collide with each other",
            empty_keys
        );
    }

    let existing = load_snapshot(&pool).await?;
    let changes = detect::detect(&existing, &records);
    let skipped = records.len() - changes.len();

    if changes.is_empty() {
        let report = SyncReport {
            fetched,
            processed: 0,
            skipped,
            failed: 0,
        };
        print_report(&report);
        pool.close().await;
        return Ok(report);
    }

    // One embedding input per changed record, batched sequentially so at
    // most one embedding request is in flight.
    let contents: Vec<String> = changes.iter().map(|c| embedding_input(&c.record)).collect();

    let provider = embedding::create_provider(&config.embedding)?;
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(contents.len());

    for (start, end) in plan_batches(contents.len(), config.embedding.batch_size) {
        let vecs = provider
            .embed_batch(&contents[start..end])
            .await
            .with_context(|| format!("Embedding batch {}..{} failed", start, end))?;
        vectors.extend(vecs);
    }

    if vectors.len() != changes.len() {
        bail!(
            "Embedding count mismatch: {} vectors for {} records",
            vectors.len(),
            changes.len()
        );
    }

    let model_name = provider.model_name().to_string();
    let dims = provider.dims();

    // Bounded worker pool: the semaphore caps simultaneous writes so the
    // store is not overwhelmed, while network-bound upserts still overlap.
    let semaphore = Arc::new(Semaphore::new(config.sync.upsert_concurrency));
    let mut tasks = JoinSet::new();

    for (change, vector) in changes.into_iter().zip(vectors.into_iter()) {
        let permit_source = semaphore.clone();
        let pool = pool.clone();
        let model_name = model_name.clone();

        tasks.spawn(async move {
            let _permit = permit_source
                .acquire_owned()
                .await
                .expect("semaphore closed");
            let key = change.record.key.clone();
            let result = upsert_document(&pool, &change.record, &vector, &model_name, dims).await;
            (key, result)
        });
    }

    let mut processed = 0usize;
    let mut failed = 0usize;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => processed += 1,
            Ok((key, Err(e))) => {
                eprintln!("Warning: upsert failed for '{}': {}", key, e);
                failed += 1;
            }
            Err(e) => {
                eprintln!("Warning: upsert task panicked: {}", e);
                failed += 1;
            }
        }
    }

    let report = SyncReport {
        fetched,
        processed,
        skipped,
        failed,
    };
    print_report(&report);

    pool.close().await;
    Ok(report)
}

fn print_report(report: &SyncReport) {
    println!("sync");
    println!("  fetched: {} records", report.fetched);
    println!("  upserted: {}", report.processed);
    println!("  unchanged: {}", report.skipped);
    println!("  failed: {}", report.failed);
    println!("ok");
}

/// Fixed, ordered field list embedded for each record. List-valued fields
/// are joined with whitespace; empty or missing fields are dropped.
pub fn embedding_input(record: &DocumentRecord) -> String {
    let tags = record.tags.as_ref().map(|t| t.join(" "));

    [
        Some(record.key.clone()),
        record.author.clone(),
        record.body.clone(),
        record.summary.clone(),
        tags,
    ]
    .into_iter()
    .flatten()
    .filter(|field| !field.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Split `total` items into sequential `(start, end)` ranges of at most
/// `batch_size`.
pub fn plan_batches(total: usize, batch_size: usize) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0;
    while start < total {
        let end = (start + batch_size).min(total);
        ranges.push((start, end));
        start = end;
    }
    ranges
}

async fn load_snapshot(pool: &SqlitePool) -> Result<HashMap<String, DocumentRecord>> {
    let rows = sqlx::query("SELECT * FROM documents").fetch_all(pool).await?;

    Ok(rows
        .iter()
        .map(DocumentRecord::from_row)
        .map(|r| (r.key.clone(), r))
        .collect())
}

/// Write one record and its vector, keyed by the natural key. Idempotent:
/// the same key+content always converges on the same stored state.
pub async fn upsert_document(
    pool: &SqlitePool,
    record: &DocumentRecord,
    vector: &[f32],
    model: &str,
    dims: usize,
) -> Result<()> {
    let tags_json = record
        .tags
        .as_ref()
        .map(|t| serde_json::to_string(t))
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO documents (key, author, body, summary, url, created_time, inserted_time, likes, comments, shares, tags)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(key) DO UPDATE SET
            author = excluded.author,
            body = excluded.body,
            summary = excluded.summary,
            url = excluded.url,
            created_time = excluded.created_time,
            inserted_time = excluded.inserted_time,
            likes = excluded.likes,
            comments = excluded.comments,
            shares = excluded.shares,
            tags = excluded.tags
        "#,
    )
    .bind(&record.key)
    .bind(&record.author)
    .bind(&record.body)
    .bind(&record.summary)
    .bind(&record.url)
    .bind(&record.created_time)
    .bind(&record.inserted_time)
    .bind(record.likes)
    .bind(record.comments)
    .bind(record.shares)
    .bind(&tags_json)
    .execute(pool)
    .await?;

    let blob = embedding::vec_to_blob(vector);
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO document_vectors (key, embedding, dims, model, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(key) DO UPDATE SET
            embedding = excluded.embedding,
            dims = excluded.dims,
            model = excluded.model,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&record.key)
    .bind(&blob)
    .bind(dims as i64)
    .bind(model)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DocumentRecord {
        DocumentRecord {
            key: "p1".to_string(),
            author: Some("ana".to_string()),
            body: Some("hello world".to_string()),
            summary: None,
            url: Some("https://x/p1".to_string()),
            created_time: None,
            inserted_time: None,
            likes: None,
            comments: None,
            shares: None,
            tags: Some(vec!["news".to_string(), "tech".to_string()]),
        }
    }

    #[test]
    fn test_embedding_input_drops_missing_and_joins_lists() {
        let input = embedding_input(&record());
        assert_eq!(input, "p1 ana hello world news tech");
    }

    #[test]
    fn test_embedding_input_empty_fields_dropped() {
        let mut r = record();
        r.author = Some(String::new());
        r.tags = None;
        assert_eq!(embedding_input(&r), "p1 hello world");
    }

    #[test]
    fn test_plan_batches_53_by_25() {
        let plan = plan_batches(53, 25);
        assert_eq!(plan, vec![(0, 25), (25, 50), (50, 53)]);

        // Ranges tile the input in order, so item-to-vector pairing is
        // preserved when batch outputs are concatenated.
        let flattened: Vec<usize> = plan.iter().flat_map(|&(s, e)| s..e).collect();
        assert_eq!(flattened, (0..53).collect::<Vec<_>>());
    }

    #[test]
    fn test_plan_batches_exact_multiple() {
        assert_eq!(plan_batches(50, 25), vec![(0, 25), (25, 50)]);
    }

    #[test]
    fn test_plan_batches_small_and_empty() {
        assert_eq!(plan_batches(3, 25), vec![(0, 3)]);
        assert!(plan_batches(0, 25).is_empty());
    }
}
