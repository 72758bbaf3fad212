//! HTTP chat transport speaking either wire dialect.

use super::gemini;
use super::openai;
use super::sse::{SseDecoder, SseFrame};
use super::{Backend, ChatRequest, Dialect, TokenSink};
use crate::config::ChatConfig;
use crate::error::Result;
use crate::PipelineError;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde_json::Value;

/// Chat transport over HTTP.
///
/// The dialect is picked from the base URL on every call. Streaming is used
/// only when the config enables it and the caller passes a sink; otherwise
/// the answer is buffered and handed to the sink once.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    config: ChatConfig,
}

impl HttpBackend {
    /// Build a backend whose client applies `config.timeout` to connecting
    /// and to each read, so a stream stays open while tokens keep arriving.
    pub fn new(config: ChatConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(PipelineError::InvalidConfig("empty API base URL".into()));
        }
        let client = Client::builder()
            .connect_timeout(config.timeout)
            .read_timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn dialect(&self) -> Dialect {
        Dialect::detect(&self.config.base_url)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn chat(&self, request: &ChatRequest, sink: Option<TokenSink<'_>>) -> Result<String> {
        let dialect = self.dialect();
        let stream = self.config.streaming && sink.is_some();

        for message in &request.messages {
            tracing::debug!(role = message.role.as_str(), content = %message.content, "chat message");
        }

        let builder = match dialect {
            Dialect::OpenAiCompatible => {
                let body = openai::build_body(request, &self.config, stream);
                openai::build_http_request(&self.client, &self.config, &body)
            }
            Dialect::Gemini => {
                let body = gemini::build_body(request, &self.config);
                gemini::build_http_request(&self.client, &self.config, &body, stream)
            }
        };

        let resp = builder.send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::HttpError {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        match sink {
            Some(sink) if stream => {
                let answer = read_stream(resp.bytes_stream(), dialect, sink).await?;
                tracing::debug!(answer = %answer, "streamed completion");
                Ok(answer)
            }
            sink => {
                let json: Value = resp.json().await?;
                let answer = extract_answer(dialect, &json);
                tracing::debug!(answer = %answer, "buffered completion");
                if let Some(sink) = sink {
                    sink(&answer);
                }
                Ok(answer)
            }
        }
    }

    fn name(&self) -> &'static str {
        match self.dialect() {
            Dialect::OpenAiCompatible => "openai",
            Dialect::Gemini => "gemini",
        }
    }
}

/// Trimmed answer of a buffered response; empty when the payload has none.
///
/// Either response shape is accepted, the dialect's own first.
pub fn extract_answer(dialect: Dialect, response: &Value) -> String {
    let answer = match dialect {
        Dialect::OpenAiCompatible => openai::extract_answer(response)
            .map(str::to_string)
            .or_else(|| gemini::extract_text(response)),
        Dialect::Gemini => gemini::extract_text(response)
            .or_else(|| openai::extract_answer(response).map(str::to_string)),
    };
    answer.unwrap_or_default().trim().to_string()
}

fn extract_increment(dialect: Dialect, chunk: &Value) -> Option<String> {
    match dialect {
        Dialect::OpenAiCompatible => openai::extract_delta(chunk).map(str::to_string),
        Dialect::Gemini => gemini::extract_text(chunk),
    }
}

/// Accumulate an SSE body, forwarding every non-empty increment to `sink`.
///
/// Leading whitespace of the answer is dropped. Reading stops at
/// `data: [DONE]` or at the end of the body. A malformed payload fails the
/// whole call; nothing accumulated so far is returned.
pub async fn read_stream<S, B, E>(body: S, dialect: Dialect, sink: TokenSink<'_>) -> Result<String>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    PipelineError: From<E>,
{
    let mut body = std::pin::pin!(body);
    let mut decoder = SseDecoder::new();
    let mut answer = String::new();

    let mut forward = |frames: Vec<SseFrame>, answer: &mut String| -> bool {
        for frame in frames {
            let payload = match frame {
                SseFrame::Done => return true,
                SseFrame::Data(payload) => payload,
            };
            let Some(increment) = extract_increment(dialect, &payload) else {
                continue;
            };
            let increment = if answer.is_empty() {
                increment.trim_start()
            } else {
                increment.as_str()
            };
            if increment.is_empty() {
                continue;
            }
            answer.push_str(increment);
            sink(increment);
        }
        false
    };

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        let frames = decoder.decode(chunk.as_ref())?;
        if forward(frames, &mut answer) {
            return Ok(answer);
        }
    }

    let frames = decoder.flush()?;
    forward(frames, &mut answer);
    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChatMessage;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn chunks(parts: &[&str]) -> impl Stream<Item = std::result::Result<Vec<u8>, PipelineError>> {
        let owned: Vec<_> = parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        futures::stream::iter(owned)
    }

    #[tokio::test]
    async fn test_read_stream_openai_deltas() {
        let body = chunks(&[
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" Pitch\"}}]}\n\n",
            ": keep-alive\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" Lake\"}}]}\n\ndata: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        ]);

        let mut seen = Vec::new();
        let mut sink = |s: &str| seen.push(s.to_string());
        let answer = read_stream(body, Dialect::OpenAiCompatible, &mut sink)
            .await
            .unwrap();

        assert_eq!(answer, "Pitch Lake");
        assert_eq!(seen, vec!["Pitch", " Lake"]);
    }

    #[tokio::test]
    async fn test_read_stream_line_split_across_chunks() {
        let body = chunks(&[
            "data: {\"choices\":[{\"del",
            "ta\":{\"content\":\"asphalt\"}}]}\n",
            "\ndata: [DONE]\n\n",
        ]);
        let mut sink = |_: &str| {};
        let answer = read_stream(body, Dialect::OpenAiCompatible, &mut sink)
            .await
            .unwrap();
        assert_eq!(answer, "asphalt");
    }

    #[tokio::test]
    async fn test_read_stream_gemini_ends_without_done() {
        let body = chunks(&[
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Asph\"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"alt\"}]}}]}",
        ]);
        let mut seen = Vec::new();
        let mut sink = |s: &str| seen.push(s.to_string());
        let answer = read_stream(body, Dialect::Gemini, &mut sink).await.unwrap();

        assert_eq!(answer, "Asphalt");
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn test_read_stream_malformed_payload_fails() {
        let body = chunks(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n\n",
            "data: {not json}\n\n",
        ]);
        let mut sink = |_: &str| {};
        let result = read_stream(body, Dialect::OpenAiCompatible, &mut sink).await;
        assert!(matches!(result, Err(PipelineError::Json(_))));
    }

    #[tokio::test]
    async fn test_read_stream_body_error_propagates() {
        let body = futures::stream::iter(vec![
            Ok(b"data: {\"choices\":[]}\n".to_vec()),
            Err(PipelineError::Other("connection reset".into())),
        ]);
        let mut sink = |_: &str| {};
        let result = read_stream(body, Dialect::OpenAiCompatible, &mut sink).await;
        assert!(matches!(result, Err(PipelineError::Other(_))));
    }

    #[test]
    fn test_extract_answer_trims_and_defaults() {
        let response = json!({"choices": [{"message": {"content": "  Asphalt.\n"}}]});
        assert_eq!(extract_answer(Dialect::OpenAiCompatible, &response), "Asphalt.");

        let empty = json!({"choices": [{"message": {"content": null}}]});
        assert_eq!(extract_answer(Dialect::OpenAiCompatible, &empty), "");
    }

    #[test]
    fn test_extract_answer_gemini_candidates() {
        let response = json!({
            "candidates": [{"content": {"parts": [{"text": "tool: Google\n"}, {"text": "thought: x"}]}}]
        });
        assert_eq!(
            extract_answer(Dialect::Gemini, &response),
            "tool: Google\nthought: x"
        );
    }

    #[test]
    fn test_new_rejects_empty_base_url() {
        let result = HttpBackend::new(ChatConfig::default().with_base_url("  "));
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_name_follows_dialect() {
        let backend = HttpBackend::new(
            ChatConfig::default().with_base_url("https://generativelanguage.googleapis.com/v1beta"),
        )
        .unwrap();
        assert_eq!(backend.name(), "gemini");
        assert_eq!(backend.dialect(), Dialect::Gemini);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_request_error() {
        let config = ChatConfig::default()
            .with_base_url("http://127.0.0.1:9")
            .with_timeout(std::time::Duration::from_secs(2));
        let backend = HttpBackend::new(config).unwrap();
        let request = ChatRequest::new(vec![ChatMessage::user("hi")]);

        let result = backend.chat(&request, None).await;
        assert!(matches!(result, Err(PipelineError::Request(_))));
    }

    /// Serves one canned response on a local port. The handle yields the raw
    /// request that was received.
    async fn serve_once(response: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            while !request_complete(&raw) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8(raw).unwrap()
        });
        (base, handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..end]
            .lines()
            .find_map(|line| {
                line.to_ascii_lowercase()
                    .strip_prefix("content-length:")
                    .map(|v| v.trim().parse::<usize>().unwrap_or(0))
            })
            .unwrap_or(0);
        raw.len() >= end + 4 + length
    }

    fn reply(status: &str, content_type: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            content_type,
            body.len(),
            body
        )
    }

    fn ask() -> ChatRequest {
        ChatRequest::new(vec![
            ChatMessage::system("Be brief."),
            ChatMessage::user("What is Pitch Lake famous for?"),
        ])
    }

    #[tokio::test]
    async fn test_status_error_skips_body() {
        let (base, server) = serve_once(reply("429 Too Many Requests", "text/plain", "not json")).await;
        let backend = HttpBackend::new(ChatConfig::default().with_base_url(base).with_api_key("k")).unwrap();

        match backend.chat(&ask(), None).await {
            Err(PipelineError::HttpError { status, status_text }) => {
                assert_eq!(status, 429);
                assert_eq!(status_text, "Too Many Requests");
            }
            other => panic!("unexpected {:?}", other),
        }

        let raw = server.await.unwrap().to_ascii_lowercase();
        assert!(raw.starts_with("post /chat/completions http/1.1\r\n"));
        assert!(raw.contains("content-type: application/json\r\n"));
        assert!(raw.contains("authorization: bearer k\r\n"));
    }

    #[tokio::test]
    async fn test_buffered_answer_reaches_sink_once() {
        let body = json!({"choices": [{"message": {"content": " Asphalt "}}]}).to_string();
        let (base, server) = serve_once(reply("200 OK", "application/json", &body)).await;
        let config = ChatConfig::default().with_base_url(base).with_streaming(false);
        let backend = HttpBackend::new(config).unwrap();

        let mut seen = Vec::new();
        let mut sink = |s: &str| seen.push(s.to_string());
        let answer = backend.chat(&ask(), Some(&mut sink)).await.unwrap();

        assert_eq!(answer, "Asphalt");
        assert_eq!(seen, vec!["Asphalt"]);
        let raw = server.await.unwrap();
        assert!(raw.contains("\"stream\":false"));
        assert!(!raw.to_ascii_lowercase().contains("authorization:"));
    }

    #[tokio::test]
    async fn test_no_sink_means_no_streaming() {
        let body = json!({"choices": [{"message": {"content": "Asphalt"}}]}).to_string();
        let (base, server) = serve_once(reply("200 OK", "application/json", &body)).await;
        let backend = HttpBackend::new(ChatConfig::default().with_base_url(base)).unwrap();

        assert_eq!(backend.chat(&ask(), None).await.unwrap(), "Asphalt");
        assert!(server.await.unwrap().contains("\"stream\":false"));
    }

    #[tokio::test]
    async fn test_streaming_with_sink() {
        let events = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\" Pitch\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" Lake\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let (base, server) = serve_once(reply("200 OK", "text/event-stream", events)).await;
        let backend = HttpBackend::new(ChatConfig::default().with_base_url(base)).unwrap();

        let mut seen = Vec::new();
        let mut sink = |s: &str| seen.push(s.to_string());
        let answer = backend.chat(&ask(), Some(&mut sink)).await.unwrap();

        assert_eq!(answer, "Pitch Lake");
        assert_eq!(seen, vec!["Pitch", " Lake"]);
        assert!(server.await.unwrap().contains("\"stream\":true"));
    }

    #[tokio::test]
    async fn test_gemini_key_in_url() {
        let body = json!({"candidates": [{"content": {"parts": [{"text": "Asphalt"}]}}]}).to_string();
        let (base, server) = serve_once(reply("200 OK", "application/json", &body)).await;
        let config = ChatConfig::default()
            .with_base_url(format!("{}/generativelanguage.googleapis.com/v1beta", base))
            .with_model("gemini-x")
            .with_api_key("k");
        let backend = HttpBackend::new(config).unwrap();

        assert_eq!(backend.chat(&ask(), None).await.unwrap(), "Asphalt");

        let raw = server.await.unwrap();
        assert!(raw.starts_with(
            "POST /generativelanguage.googleapis.com/v1beta/models/gemini-x:generateContent?key=k HTTP/1.1\r\n"
        ));
        assert!(raw.contains("\"systemInstruction\""));
        assert!(!raw.to_ascii_lowercase().contains("authorization:"));
    }

    #[tokio::test]
    async fn test_gemini_streaming_url() {
        let events = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Asph\"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"alt\"}]}}]}\r\n\r\n",
        );
        let (base, server) = serve_once(reply("200 OK", "text/event-stream", events)).await;
        let config = ChatConfig::default()
            .with_base_url(format!("{}/generativelanguage.googleapis.com/v1beta", base))
            .with_model("gemini-x")
            .with_api_key("k");
        let backend = HttpBackend::new(config).unwrap();

        let mut seen = Vec::new();
        let mut sink = |s: &str| seen.push(s.to_string());
        let answer = backend.chat(&ask(), Some(&mut sink)).await.unwrap();

        assert_eq!(answer, "Asphalt");
        assert_eq!(seen, vec!["Asph", "alt"]);
        assert!(server.await.unwrap().starts_with(
            "POST /generativelanguage.googleapis.com/v1beta/models/gemini-x:streamGenerateContent?alt=sse&key=k HTTP/1.1\r\n"
        ));
    }
}
