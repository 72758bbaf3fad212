//! Gemini wire shape.
//!
//! Endpoint: `{base}/models/{model}:generateContent?key=...`, or
//! `:streamGenerateContent?alt=sse&key=...` when streaming.
//! Streaming: SSE with `data: {"candidates": [{"content": {"parts": [{"text": "token"}]}}]}`,
//! ending when the body ends (no `[DONE]` line).

use super::{ChatRequest, Role};
use crate::config::ChatConfig;
use reqwest::Client;
use serde_json::{json, Value};

/// `POST` target, carrying the API key in the query string.
pub fn endpoint(config: &ChatConfig, stream: bool) -> String {
    let method = if stream {
        "streamGenerateContent?alt=sse"
    } else {
        "generateContent"
    };
    let mut url = format!("{}/models/{}:{}", config.base(), config.model, method);

    if let Some(ref key) = config.api_key {
        url.push(if stream { '&' } else { '?' });
        url.push_str("key=");
        url.push_str(key);
    }

    url
}

/// Build the request body for `generateContent`.
///
/// Only the first system message and the user messages survive; assistant
/// turns are not sent. Gemini rejects `additionalProperties`, so it is
/// removed from the copy of the schema.
pub fn build_body(request: &ChatRequest, config: &ChatConfig) -> Value {
    let contents: Vec<Value> = request
        .messages
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| json!({"role": "user", "parts": [{"text": m.content}]}))
        .collect();

    let mime_type = if request.schema.is_some() {
        "application/json"
    } else {
        "text/plain"
    };

    let mut generation_config = json!({
        "temperature": config.temperature,
        "responseMimeType": mime_type,
        "maxOutputTokens": config.max_tokens,
    });

    if let Some(ref schema) = request.schema {
        let mut schema = schema.clone();
        if let Some(obj) = schema.as_object_mut() {
            obj.remove("additionalProperties");
        }
        generation_config["responseSchema"] = schema;
    }

    let mut body = json!({
        "contents": contents,
        "generationConfig": generation_config,
    });

    if let Some(system) = request.messages.iter().find(|m| m.role == Role::System) {
        body["systemInstruction"] = json!({"parts": [{"text": system.content}]});
    }

    body
}

/// Build the reqwest request. Auth lives in the URL, never in a header.
pub fn build_http_request(
    client: &Client,
    config: &ChatConfig,
    body: &Value,
    stream: bool,
) -> reqwest::RequestBuilder {
    client.post(endpoint(config, stream)).json(body)
}

/// Concatenated `candidates[0].content.parts[*].text`.
///
/// Used for both buffered responses and streamed chunks, which share the
/// same shape.
pub fn extract_text(response: &Value) -> Option<String> {
    let parts = response
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())?;

    Some(
        parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect(),
    )
}
