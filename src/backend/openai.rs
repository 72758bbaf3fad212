//! OpenAI-compatible wire shape.
//!
//! Endpoint: `{base}/chat/completions`.
//! Streaming: SSE with `data: {"choices": [{"delta": {"content": "token"}}]}`.
//!
//! Covers OpenAI itself and the many servers that mimic it (vLLM, llama.cpp,
//! LM Studio, Ollama's `/v1`, Groq, Together, ...).

use super::ChatRequest;
use crate::config::ChatConfig;
use reqwest::Client;
use serde_json::{json, Value};

/// End-of-turn markers of common chat templates.
pub const STOP_TOKENS: [&str; 3] = ["<|im_end|>", "<|end|>", "<|eot_id|>"];

/// Name given to the strict JSON-schema response format.
pub const SCHEMA_NAME: &str = "response";

/// `POST` target for a chat completion.
pub fn endpoint(config: &ChatConfig) -> String {
    format!("{}/chat/completions", config.base())
}

/// Build the request body for `/chat/completions`.
///
/// Messages go through unchanged and in order. A schema becomes a strict
/// `json_schema` response format named `"response"`.
pub fn build_body(request: &ChatRequest, config: &ChatConfig, stream: bool) -> Value {
    let mut body = json!({
        "messages": request.messages,
        "model": config.model,
        "stop": STOP_TOKENS,
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
        "stream": stream,
    });

    if let Some(ref schema) = request.schema {
        body["response_format"] = json!({
            "type": "json_schema",
            "json_schema": {
                "schema": schema,
                "name": SCHEMA_NAME,
                "strict": true,
            }
        });
    }

    body
}

/// Build the reqwest request, adding bearer auth when a key is configured.
pub fn build_http_request(
    client: &Client,
    config: &ChatConfig,
    body: &Value,
) -> reqwest::RequestBuilder {
    let mut req = client.post(endpoint(config)).json(body);

    if let Some(ref key) = config.api_key {
        req = req.header("Authorization", format!("Bearer {}", key));
    }

    req
}

/// `choices[0].message.content` of a buffered response.
pub fn extract_answer(response: &Value) -> Option<&str> {
    response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|v| v.as_str())
}

/// `choices[0].delta.content` of a streamed chunk.
///
/// Role-only deltas and finish chunks have no content and yield `None`.
pub fn extract_delta(chunk: &Value) -> Option<&str> {
    chunk
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|v| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChatMessage;

    fn test_config() -> ChatConfig {
        ChatConfig::default().with_model("gpt-4o")
    }

    fn test_request() -> ChatRequest {
        ChatRequest::new(vec![
            ChatMessage::system("Be helpful."),
            ChatMessage::user("What is 2+2?"),
            ChatMessage::assistant("4"),
            ChatMessage::user("And 3+3?"),
        ])
    }

    #[test]
    fn test_body_fields() {
        let body = build_body(&test_request(), &test_config(), false);

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["max_tokens"], 200);
        assert_eq!(body["stream"], false);
        assert_eq!(body["stop"], json!(["<|im_end|>", "<|end|>", "<|eot_id|>"]));
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_body_keeps_full_history() {
        let body = build_body(&test_request(), &test_config(), false);
        let messages = body["messages"].as_array().expect("messages");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[2]["content"], "4");
        assert_eq!(messages[3]["content"], "And 3+3?");
    }

    #[test]
    fn test_body_schema_is_strict_response_format() {
        let schema = json!({"type": "object", "additionalProperties": false});
        let request = test_request().with_schema(Some(schema.clone()));
        let body = build_body(&request, &test_config(), true);

        let rf = body.get("response_format").expect("response_format");
        assert_eq!(rf["type"], "json_schema");
        assert_eq!(rf["json_schema"]["name"], "response");
        assert_eq!(rf["json_schema"]["strict"], true);
        assert_eq!(rf["json_schema"]["schema"], schema);
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn test_endpoint() {
        let config = ChatConfig::default().with_base_url("http://localhost:1234/v1/");
        assert_eq!(endpoint(&config), "http://localhost:1234/v1/chat/completions");
    }

    #[test]
    fn test_auth_header() {
        let config = test_config().with_api_key("sk-test123");
        let req = build_http_request(&Client::new(), &config, &json!({"test": true}))
            .build()
            .expect("build request");

        assert_eq!(req.method(), reqwest::Method::POST);
        assert_eq!(req.headers().get("Authorization").expect("auth"), "Bearer sk-test123");
        assert_eq!(
            req.headers().get("Content-Type").expect("content type"),
            "application/json"
        );
    }

    #[test]
    fn test_no_auth_without_key() {
        let req = build_http_request(&Client::new(), &test_config(), &json!({}))
            .build()
            .expect("build request");
        assert!(req.headers().get("Authorization").is_none());
    }

    #[test]
    fn test_extract_answer_and_delta() {
        let response = json!({"choices": [{"message": {"content": "Asphalt."}}]});
        assert_eq!(extract_answer(&response), Some("Asphalt."));

        let chunk = json!({"choices": [{"delta": {"content": "Asph"}}]});
        assert_eq!(extract_delta(&chunk), Some("Asph"));

        let role_only = json!({"choices": [{"delta": {"role": "assistant"}}]});
        assert_eq!(extract_delta(&role_only), None);
    }
}
