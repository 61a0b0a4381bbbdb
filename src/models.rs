//! Core data models for the post-grounded answering pipeline.
//!
//! These types represent the documents, change classifications, and
//! retrieval results that flow through sync and query paths.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// A normalized post from the remote feed.
///
/// Equality is structural over every source-visible field. The embedding
/// vector and the store's internal rowid are deliberately not part of this
/// type — vectors live in the `document_vectors` side table — so change
/// detection can compare records with a derived `PartialEq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Natural key: the source post id, falling back to the post URL,
    /// falling back to the empty string.
    pub key: String,
    pub author: Option<String>,
    pub body: Option<String>,
    pub summary: Option<String>,
    pub url: Option<String>,
    pub created_time: Option<String>,
    pub inserted_time: Option<String>,
    pub likes: Option<i64>,
    pub comments: Option<i64>,
    pub shares: Option<i64>,
    pub tags: Option<Vec<String>>,
}

impl DocumentRecord {
    /// Shallow field-level merge: incoming values win, fields absent from
    /// the incoming record keep their stored values. An update therefore
    /// never reverts a previously-set field to missing.
    pub fn merged_into(&self, incoming: &DocumentRecord) -> DocumentRecord {
        DocumentRecord {
            key: incoming.key.clone(),
            author: incoming.author.clone().or_else(|| self.author.clone()),
            body: incoming.body.clone().or_else(|| self.body.clone()),
            summary: incoming.summary.clone().or_else(|| self.summary.clone()),
            url: incoming.url.clone().or_else(|| self.url.clone()),
            created_time: incoming
                .created_time
                .clone()
                .or_else(|| self.created_time.clone()),
            inserted_time: incoming
                .inserted_time
                .clone()
                .or_else(|| self.inserted_time.clone()),
            likes: incoming.likes.or(self.likes),
            comments: incoming.comments.or(self.comments),
            shares: incoming.shares.or(self.shares),
            tags: incoming.tags.clone().or_else(|| self.tags.clone()),
        }
    }

    /// Map a `documents` table row back into a record.
    pub fn from_row(row: &SqliteRow) -> DocumentRecord {
        let tags_json: Option<String> = row.get("tags");
        let tags = tags_json.and_then(|t| serde_json::from_str(&t).ok());

        DocumentRecord {
            key: row.get("key"),
            author: row.get("author"),
            body: row.get("body"),
            summary: row.get("summary"),
            url: row.get("url"),
            created_time: row.get("created_time"),
            inserted_time: row.get("inserted_time"),
            likes: row.get("likes"),
            comments: row.get("comments"),
            shares: row.get("shares"),
            tags,
        }
    }
}

/// Why a record is being written during a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    New,
    Updated,
}

/// A record that needs (re-)embedding and upserting. Unchanged records
/// are never materialized as changes.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub record: DocumentRecord,
    pub kind: ChangeKind,
}

/// Counts reported at the end of a sync run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncReport {
    /// Records fetched from the feed.
    pub fetched: usize,
    /// Records upserted (new or updated).
    pub processed: usize,
    /// Records identical to their stored snapshot.
    pub skipped: usize,
    /// Individual upserts that failed (non-fatal).
    pub failed: usize,
}

/// A retrieval hit: the document projection with its vector and natural
/// key stripped, annotated with a cosine similarity score.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedDocument {
    pub author: Option<String>,
    pub body: Option<String>,
    pub summary: Option<String>,
    pub url: Option<String>,
    pub created_time: Option<String>,
    pub inserted_time: Option<String>,
    pub likes: Option<i64>,
    pub comments: Option<i64>,
    pub shares: Option<i64>,
    pub tags: Option<Vec<String>>,
    /// Higher = more similar.
    pub score: f64,
}

impl RetrievedDocument {
    pub fn from_record(record: DocumentRecord, score: f64) -> Self {
        RetrievedDocument {
            author: record.author,
            body: record.body,
            summary: record.summary,
            url: record.url,
            created_time: record.created_time,
            inserted_time: record.inserted_time,
            likes: record.likes,
            comments: record.comments,
            shares: record.shares,
            tags: record.tags,
            score,
        }
    }
}
