//! Remote feed client and record normalization.
//!
//! The feed is a single HTTP endpoint returning a JSON array of raw post
//! objects. Fetching is retried with a linear backoff; exhausting the
//! retry budget is fatal to the sync run that asked for the batch.

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::models::DocumentRecord;

/// A post as the feed serves it, before key derivation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPost {
    /// Source identifier. Some feeds serve it as a number, some as a
    /// string; accept both.
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub inserted_time: Option<String>,
    #[serde(default)]
    pub likes: Option<i64>,
    #[serde(default)]
    pub comments: Option<i64>,
    #[serde(default)]
    pub shares: Option<i64>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Fetch the full feed batch, retrying on transport errors, non-2xx
/// responses, and malformed payloads.
pub async fn fetch_posts(config: &SourceConfig) -> Result<Vec<RawPost>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let mut last_err = None;

    for attempt in 1..=config.max_attempts {
        if attempt > 1 {
            tokio::time::sleep(Duration::from_secs(config.retry_backoff_secs)).await;
        }

        match try_fetch(&client, &config.feed_url).await {
            Ok(posts) => return Ok(posts),
            Err(e) => {
                eprintln!(
                    "Warning: feed fetch attempt {}/{} failed: {}",
                    attempt, config.max_attempts, e
                );
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("Feed fetch failed")))
}

async fn try_fetch(client: &reqwest::Client, url: &str) -> Result<Vec<RawPost>> {
    let response = client.get(url).send().await?;
    let status = response.status();

    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("Feed returned {}: {}", status, body_text);
    }

    let posts: Vec<RawPost> = response.json().await?;
    Ok(posts)
}

/// Normalize a raw post into a [`DocumentRecord`].
///
/// Key derivation: source id, falling back to the post URL, falling back
/// to the empty string. Empty keys collide in the change-detection lookup;
/// the sync pipeline counts and reports them rather than deduplicating.
pub fn normalize(raw: RawPost) -> DocumentRecord {
    let key = match &raw.id {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => raw.url.clone().unwrap_or_default(),
    };

    DocumentRecord {
        key,
        author: raw.author,
        body: raw.body,
        summary: raw.summary,
        url: raw.url,
        created_time: raw.created_time,
        inserted_time: raw.inserted_time,
        likes: raw.likes,
        comments: raw.comments,
        shares: raw.shares,
        tags: raw.tags,
    }
}
