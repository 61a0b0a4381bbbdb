//! Answer orchestration: retrieval → prompt composition → generation.
//!
//! Retrieval failures degrade to an empty grounding context; generation
//! failures are already absorbed by the dispatcher. The only hard error
//! out of this module is a blank question.

use anyhow::{bail, Result};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::{AnswerConfig, Config};
use crate::embedding::EmbeddingProvider;
use crate::llm;
use crate::models::RetrievedDocument;
use crate::search;

/// Substituted when the provider returns a blank completion.
pub const NO_ANSWER_PLACEHOLDER: &str = "No answer.";

/// MySQL zero-date sentinel some feeds emit for missing creation times.
const ZERO_TIME_SENTINEL: &str = "0000-00-00 00:00:00";

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub model_id: String,
    pub answer: String,
    pub retrieved: Vec<RetrievedDocument>,
}

/// Answer `question` grounded in the top-`k` retrieved posts.
pub async fn answer_question(
    pool: &SqlitePool,
    config: &Config,
    provider: &dyn EmbeddingProvider,
    question: &str,
    model_id: &str,
    k: usize,
) -> Result<AnswerResult> {
    if question.trim().is_empty() {
        bail!("question must not be empty");
    }

    let retrieved = match search::search_documents(pool, config, provider, question, k).await {
        Ok(docs) => docs,
        Err(e) => {
            // Non-fatal: answer without grounding context.
            tracing::warn!("retrieval failed, answering without context: {e:#}");
            Vec::new()
        }
    };

    let prompt = build_prompt(&config.answer, question, &retrieved);
    let result = llm::generate(&config.generation, &prompt, model_id).await;

    Ok(AnswerResult {
        model_id: model_id.to_string(),
        answer: finalize_answer(result.answer),
        retrieved,
    })
}

/// Compose the grounding prompt: instructional preamble, up to
/// `answer.context_docs` rendered posts, the question, and a
/// match-the-question's-language instruction.
pub fn build_prompt(config: &AnswerConfig, question: &str, docs: &[RetrievedDocument]) -> String {
    let mut prompt = String::from(
        "You are a research assistant. Answer concisely and cite the relevant posts.\n\n",
    );

    if docs.is_empty() {
        prompt.push_str("No matching posts were found.\n\n");
    } else {
        prompt.push_str("Posts:\n");
        for (i, doc) in docs.iter().take(config.context_docs).enumerate() {
            let author = doc.author.as_deref().unwrap_or("unknown");
            let mut excerpt: String = doc
                .body
                .as_deref()
                .unwrap_or("")
                .chars()
                .take(config.excerpt_chars)
                .collect();
            if excerpt.is_empty() {
                excerpt = "none".to_string();
            }
            let link = doc.url.as_deref().unwrap_or("none");

            prompt.push_str(&format!(
                "Post {}:\n\
                 - author: {}\n\
                 - posted: {}\n\
                 - content: {}...\n\
                 - likes: {}, comments: {}, shares: {}\n\
                 - link: {}\n\n",
                i + 1,
                author,
                best_timestamp(doc),
                excerpt,
                doc.likes.unwrap_or(0),
                doc.comments.unwrap_or(0),
                doc.shares.unwrap_or(0),
                link,
            ));
        }
    }

    prompt.push_str(&format!(
        "\nQuestion: {}\n\nAnswer in the language of the question.",
        question
    ));
    prompt
}

/// Prefer the structured creation time unless it is missing or the
/// zero-date sentinel, then the ingestion time, then "unknown".
fn best_timestamp(doc: &RetrievedDocument) -> &str {
    match doc.created_time.as_deref() {
        Some(t) if !t.is_empty() && t != ZERO_TIME_SENTINEL => t,
        _ => match doc.inserted_time.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => "unknown",
        },
    }
}

/// The answer surfaced to callers is always a non-empty string.
pub fn finalize_answer(answer: String) -> String {
    if answer.trim().is_empty() {
        NO_ANSWER_PLACEHOLDER.to_string()
    } else {
        answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnswerConfig;

    fn doc(author: &str, body: &str) -> RetrievedDocument {
        RetrievedDocument {
            author: Some(author.to_string()),
            body: Some(body.to_string()),
            summary: None,
            url: Some("https://x/p".to_string()),
            created_time: Some("2024-03-01 09:30:00".to_string()),
            inserted_time: Some("2024-03-02 00:00:00".to_string()),
            likes: Some(5),
            comments: None,
            shares: Some(1),
            tags: None,
            score: 0.9,
        }
    }

    #[test]
    fn test_prompt_renders_documents() {
        let config = AnswerConfig::default();
        let prompt = build_prompt(&config, "What happened?", &[doc("ana", "big news today")]);

        assert!(prompt.starts_with("You are a research assistant."));
        assert!(prompt.contains("Post 1:"));
        assert!(prompt.contains("- author: ana"));
        assert!(prompt.contains("- posted: 2024-03-01 09:30:00"));
        assert!(prompt.contains("- content: big news today..."));
        assert!(prompt.contains("- likes: 5, comments: 0, shares: 1"));
        assert!(prompt.contains("- link: https://x/p"));
        assert!(prompt.contains("Question: What happened?"));
        assert!(prompt.contains("Answer in the language of the question."));
    }

    #[test]
    fn test_prompt_without_documents() {
        let config = AnswerConfig::default();
        let prompt = build_prompt(&config, "Hello?", &[]);
        assert!(prompt.contains("No matching posts were found."));
        assert!(prompt.contains("Question: Hello?"));
    }

    #[test]
    fn test_prompt_caps_context_docs() {
        let config = AnswerConfig::default();
        let docs: Vec<RetrievedDocument> = (0..15).map(|i| doc("a", &format!("post {}", i))).collect();

        let prompt = build_prompt(&config, "q", &docs);
        assert!(prompt.contains("Post 10:"));
        assert!(!prompt.contains("Post 11:"));
    }

    #[test]
    fn test_excerpt_truncated_to_configured_length() {
        let config = AnswerConfig::default();
        let long_body = "x".repeat(500);
        let prompt = build_prompt(&config, "q", &[doc("a", &long_body)]);
        assert!(prompt.contains(&format!("- content: {}...", "x".repeat(200))));
        assert!(!prompt.contains(&"x".repeat(201)));
    }

    #[test]
    fn test_timestamp_prefers_created_time() {
        let d = doc("a", "b");
        assert_eq!(best_timestamp(&d), "2024-03-01 09:30:00");
    }

    #[test]
    fn test_timestamp_zero_sentinel_falls_back() {
        let mut d = doc("a", "b");
        d.created_time = Some(ZERO_TIME_SENTINEL.to_string());
        assert_eq!(best_timestamp(&d), "2024-03-02 00:00:00");

        d.inserted_time = None;
        assert_eq!(best_timestamp(&d), "unknown");
    }

    #[test]
    fn test_missing_body_renders_placeholder_excerpt() {
        let config = AnswerConfig::default();

        let mut d = doc("a", "b");
        d.body = None;
        let prompt = build_prompt(&config, "q", &[d]);
        assert!(prompt.contains("- content: none..."));

        let mut d = doc("a", "b");
        d.body = Some(String::new());
        let prompt = build_prompt(&config, "q", &[d]);
        assert!(prompt.contains("- content: none..."));
    }

    #[test]
    fn test_counters_default_to_zero_and_link_to_none() {
        let config = AnswerConfig::default();
        let mut d = doc("a", "b");
        d.likes = None;
        d.shares = None;
        d.url = None;

        let prompt = build_prompt(&config, "q", &[d]);
        assert!(prompt.contains("- likes: 0, comments: 0, shares: 0"));
        assert!(prompt.contains("- link: none"));
    }

    #[test]
    fn test_finalize_answer_substitutes_placeholder() {
        assert_eq!(finalize_answer(String::new()), NO_ANSWER_PLACEHOLDER);
        assert_eq!(finalize_answer("   \n".to_string()), NO_ANSWER_PLACEHOLDER);
        assert_eq!(finalize_answer("real".to_string()), "real");
    }
}
