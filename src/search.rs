//! Vector retrieval: query embedding + cosine ranking over stored vectors.
//!
//! The request path is read-only. A retrieval failure (embedding backend
//! down, store unreachable) is surfaced as an error for callers to degrade
//! on — the answer path proceeds with an empty grounding context.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::models::{DocumentRecord, RetrievedDocument};

/// Embed `query` and return the `k` most similar documents, best first.
///
/// The candidate stage scans a pool wider than `k`
/// (`retrieval.candidate_pool`) before final truncation. An empty query
/// string is valid input. Requesting `k` larger than the corpus returns
/// the whole corpus.
pub async fn search_documents(
    pool: &SqlitePool,
    config: &Config,
    provider: &dyn EmbeddingProvider,
    query: &str,
    k: usize,
) -> Result<Vec<RetrievedDocument>> {
    let query_vec = provider
        .embed_query(query)
        .await
        .context("Query embedding failed")?;

    let rows = sqlx::query(
        r#"
        SELECT d.*, v.embedding
        FROM document_vectors v
        JOIN documents d ON d.key = v.key
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Vector scan failed")?;

    let scored: Vec<(DocumentRecord, f64)> = rows
        .iter()
        .map(|row| {
            use sqlx::Row;
            let blob: Vec<u8> = row.get("embedding");
            let vec = embedding::blob_to_vec(&blob);
            let similarity = embedding::cosine_similarity(&query_vec, &vec) as f64;
            (DocumentRecord::from_row(row), similarity)
        })
        .collect();

    let candidate_pool = config.retrieval.candidate_pool.max(k);
    let ranked = rank_candidates(scored, candidate_pool, k);

    Ok(ranked
        .into_iter()
        .map(|(record, score)| RetrievedDocument::from_record(record, score))
        .collect())
}

/// Rank scored candidates by non-increasing similarity and keep the top
/// `k` out of a wider candidate pool. The sort is stable, so ties keep
/// the store scan order.
pub fn rank_candidates(
    mut scored: Vec<(DocumentRecord, f64)>,
    candidate_pool: usize,
    k: usize,
) -> Vec<(DocumentRecord, f64)> {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(candidate_pool);
    scored.truncate(k);
    scored
}

/// CLI entry: run a retrieval and print ranked results.
pub async fn run_search(config: &Config, query: &str, k: Option<usize>) -> Result<()> {
    if !config.embedding.is_enabled() {
        anyhow::bail!("Search requires embeddings. Set [embedding] provider in config.");
    }

    let pool = crate::db::connect(config).await?;
    let provider = embedding::create_provider(&config.embedding)?;
    let k = k.unwrap_or(config.retrieval.default_k);

    let results = search_documents(&pool, config, provider.as_ref(), query, k).await?;

    if results.is_empty() {
        println!("No results.");
        pool.close().await;
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let author = result.author.as_deref().unwrap_or("unknown");
        let excerpt: String = result
            .body
            .as_deref()
            .unwrap_or("")
            .chars()
            .take(120)
            .collect();

        println!("{}. [{:.3}] {}", i + 1, result.score, author);
        if let Some(ref time) = result.created_time {
            println!("    posted: {}", time);
        }
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " "));
        if let Some(ref url) = result.url {
            println!("    url: {}", url);
        }
        println!();
    }

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(key: &str) -> DocumentRecord {
        DocumentRecord {
            key: key.to_string(),
            author: None,
            body: None,
            summary: None,
            url: None,
            created_time: None,
            inserted_time: None,
            likes: None,
            comments: None,
            shares: None,
            tags: None,
        }
    }

    #[test]
    fn test_rank_orders_by_score_desc() {
        let scored = vec![(doc("a"), 0.2), (doc("b"), 0.9), (doc("c"), 0.5)];
        let ranked = rank_candidates(scored, 100, 3);

        let keys: Vec<&str> = ranked.iter().map(|(d, _)| d.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "c", "a"]);
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_rank_truncates_to_k() {
        let scored = vec![
            (doc("a"), 0.1),
            (doc("b"), 0.4),
            (doc("c"), 0.3),
            (doc("d"), 0.2),
        ];
        let ranked = rank_candidates(scored, 100, 3);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].0.key, "b");
    }

    #[test]
    fn test_k_larger_than_corpus_returns_all() {
        let scored = vec![(doc("a"), 0.1), (doc("b"), 0.4)];
        let ranked = rank_candidates(scored, 100, 10);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_ties_keep_scan_order() {
        let scored = vec![(doc("first"), 0.5), (doc("second"), 0.5), (doc("third"), 0.5)];
        let ranked = rank_candidates(scored, 100, 3);
        let keys: Vec<&str> = ranked.iter().map(|(d, _)| d.key.as_str()).collect();
        assert_eq!(keys, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_candidate_pool_bounds_before_k() {
        let scored = vec![(doc("a"), 0.9), (doc("b"), 0.8), (doc("c"), 0.7)];
        let ranked = rank_candidates(scored, 2, 5);
        assert_eq!(ranked.len(), 2);
    }
}
