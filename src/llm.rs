//! Generation dispatch across text-generation providers.
//!
//! A logical model id resolves through a static route table to a
//! provider + model pair. [`generate`] normalizes every divergent API
//! shape behind one contract and never returns an error: unknown models,
//! transport failures, and provider errors all come back as a
//! [`GenerationResult`] whose `answer` carries a descriptive message, so
//! callers surface text instead of special-casing failures.

use anyhow::{bail, Result};
use serde::Serialize;
use std::time::Duration;

use crate::config::GenerationConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Gemini,
    Qwen,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Gemini => "gemini",
            Provider::Qwen => "qwen",
        }
    }
}

/// A resolved route: which provider serves a logical model id.
#[derive(Debug, Clone, Copy)]
pub struct ModelRoute {
    pub provider: Provider,
    pub model: &'static str,
}

/// Static, process-wide route table. Read-only after compilation.
pub const MODEL_ROUTES: &[(&str, Provider)] = &[
    // OpenAI
    ("gpt-5", Provider::OpenAi),
    ("gpt-5-mini", Provider::OpenAi),
    ("gpt-4.1", Provider::OpenAi),
    ("gpt-4.1-mini", Provider::OpenAi),
    // Gemini
    ("gemini-2.5-pro", Provider::Gemini),
    ("gemini-2.5-flash", Provider::Gemini),
    ("gemini-2.5-flash-lite", Provider::Gemini),
    // Qwen
    ("qwen-max", Provider::Qwen),
    ("qwen-plus", Provider::Qwen),
    ("qwen-flash", Provider::Qwen),
];

pub fn resolve_route(model_id: &str) -> Option<ModelRoute> {
    MODEL_ROUTES
        .iter()
        .find(|(id, _)| *id == model_id)
        .map(|&(id, provider)| ModelRoute {
            provider,
            model: id,
        })
}

/// What the dispatcher always returns. `provider` is `None` when the
/// model id is not in the route table.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub provider: Option<Provider>,
    pub model: String,
    pub answer: String,
}

/// Send `prompt` to the provider routed for `model_id`.
///
/// Infallible by contract: failures degrade to a textual answer naming
/// the provider and the problem.
pub async fn generate(config: &GenerationConfig, prompt: &str, model_id: &str) -> GenerationResult {
    let Some(route) = resolve_route(model_id) else {
        return GenerationResult {
            provider: None,
            model: model_id.to_string(),
            answer: format!("Model '{}' is not supported", model_id),
        };
    };

    let call = match route.provider {
        Provider::OpenAi => call_openai(config, prompt, route.model).await,
        Provider::Gemini => call_gemini(config, prompt, route.model).await,
        Provider::Qwen => call_qwen(config, prompt, route.model).await,
    };

    let answer = match call {
        Ok(text) => text,
        Err(e) => format!("{} call failed: {}", route.provider.as_str(), e),
    };

    GenerationResult {
        provider: Some(route.provider),
        model: route.model.to_string(),
        answer,
    }
}

// ============ OpenAI / Qwen (chat-completions shape) ============

async fn call_openai(config: &GenerationConfig, prompt: &str, model: &str) -> Result<String> {
    let api_key =
        std::env::var("OPENAI_API_KEY").map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;
    call_chat_completions(
        &config.openai_base_url,
        &api_key,
        model,
        prompt,
        config.timeout_secs,
    )
    .await
}

/// Qwen speaks the OpenAI chat-completions dialect through DashScope's
/// compatible-mode endpoint.
async fn call_qwen(config: &GenerationConfig, prompt: &str, model: &str) -> Result<String> {
    let api_key =
        std::env::var("QWEN_API_KEY").map_err(|_| anyhow::anyhow!("QWEN_API_KEY not set"))?;
    call_chat_completions(
        &config.qwen_base_url,
        &api_key,
        model,
        prompt,
        config.timeout_secs,
    )
    .await
}

async fn call_chat_completions(
    base_url: &str,
    api_key: &str,
    model: &str,
    prompt: &str,
    timeout_secs: u64,
) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": model,
        "messages": [{"role": "user", "content": prompt}],
    });

    let response = client
        .post(format!("{}/chat/completions", base_url))
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("API error {}: {}", status, body_text);
    }

    let json: serde_json::Value = response.json().await?;
    Ok(extract_chat_completion(&json))
}

/// Pull the first completion's text out of a chat-completions envelope,
/// falling back to a structured dump when the expected path is missing.
fn extract_chat_completion(json: &serde_json::Value) -> String {
    json.pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| dump_envelope(json))
}

// ============ Gemini ============

async fn call_gemini(config: &GenerationConfig, prompt: &str, model: &str) -> Result<String> {
    let api_key =
        std::env::var("GEMINI_API_KEY").map_err(|_| anyhow::anyhow!("GEMINI_API_KEY not set"))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let url = format!(
        "{}/v1beta/models/{}:generateContent?key={}",
        config.gemini_base_url, model, api_key
    );

    let body = serde_json::json!({
        "contents": [{"role": "user", "parts": [{"text": prompt}]}],
    });

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("API error {}: {}", status, body_text);
    }

    let json: serde_json::Value = response.json().await?;
    Ok(extract_gemini_text(&json))
}

fn extract_gemini_text(json: &serde_json::Value) -> String {
    json.pointer("/candidates/0/content/parts/0/text")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| dump_envelope(json))
}

fn dump_envelope(json: &serde_json::Value) -> String {
    serde_json::to_string_pretty(json).unwrap_or_default()
}

/// CLI entry: print the route table.
pub fn list_models() {
    println!("supported models:");
    for (id, provider) in MODEL_ROUTES {
        println!("  {:<24} {}", id, provider.as_str());
    }
}
