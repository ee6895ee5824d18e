use std::{io, time::Duration};

use async_trait::async_trait;
use futures::{stream, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::{
    bytes::Bytes,
    codec::{FramedRead, LinesCodec, LinesCodecError},
    io::StreamReader,
    sync::CancellationToken,
};
use tracing::{debug, warn};

use super::{
    errors::{LlmError, LlmResult},
    provider::{utils::extract_error_message, LlmProvider},
    types::{FragmentStream, Message, MessageRole, ProviderConfig},
};

/// Longest single response record accepted from the backend.
const MAX_RECORD_BYTES: usize = 1024 * 1024;

/// Ollama API client
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

/// Streaming chat request (`POST /api/chat`)
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

/// Legacy single-shot request (`POST /api/generate`)
#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    messages: &'a [Message],
}

/// One newline-delimited record of a streamed chat response.
///
/// Everything besides `message.content` and `error` (`done`, timings,
/// token counts) is ignored.
#[derive(Debug, Deserialize)]
struct OllamaChatRecord {
    #[serde(default)]
    message: Option<OllamaRecordMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaRecordMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Ollama models list response
#[derive(Debug, Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

impl OllamaProvider {
    /// Create a new Ollama client from configuration
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Get available models from Ollama
    pub async fn list_models(&self) -> LlmResult<Vec<String>> {
        let url = self.endpoint("api/tags");
        debug!("Fetching Ollama models from: {}", url);

        let response = Self::check_status(self.client.get(&url).send().await?).await?;
        let models: OllamaModelsResponse = response.json().await?;

        Ok(models.models.into_iter().map(|m| m.name).collect())
    }

    /// Check if the Ollama server answers at all
    pub async fn health_check(&self) -> bool {
        match self.client.get(self.endpoint("api/tags")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Ollama health check failed: {}", e);
                false
            }
        }
    }

    async fn check_status(response: reqwest::Response) -> LlmResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(LlmError::Status {
            status: status.as_u16(),
            body: extract_error_message(&body),
        })
    }
}

/// Parse one response record. `Ok(None)` means the record carried no text.
fn parse_chat_record(line: &str) -> LlmResult<Option<String>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let record: OllamaChatRecord = serde_json::from_str(line)?;
    if let Some(error) = record.error {
        return Err(LlmError::Server(error));
    }

    Ok(record
        .message
        .and_then(|m| m.content)
        .filter(|content| !content.is_empty()))
}

fn codec_error(err: LinesCodecError) -> LlmError {
    match err {
        LinesCodecError::MaxLineLengthExceeded => {
            LlmError::Protocol(format!("record exceeds {} bytes", MAX_RECORD_BYTES))
        }
        LinesCodecError::Io(e) if e.kind() == io::ErrorKind::InvalidData => {
            LlmError::Protocol(e.to_string())
        }
        LinesCodecError::Io(e) => LlmError::Transport(e.to_string()),
    }
}

/// Turn a newline-delimited JSON body into an ordered stream of fragments.
///
/// Records are reassembled across chunk boundaries before parsing. The
/// stream ends at end of body, or right after the first error it yields
/// (including [`LlmError::Cancelled`] once `cancel` fires).
pub fn decode_chat_stream<S>(body: S, cancel: CancellationToken) -> FragmentStream
where
    S: Stream<Item = io::Result<Bytes>> + Send + 'static,
{
    let records = FramedRead::new(
        StreamReader::new(Box::pin(body)),
        LinesCodec::new_with_max_length(MAX_RECORD_BYTES),
    );

    Box::pin(stream::unfold(
        Some((records, cancel)),
        |state| async move {
            let (mut records, cancel) = match state {
                Some(state) => state,
                None => return None,
            };

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Some((Err(LlmError::Cancelled), None)),
                    next = records.next() => next,
                };

                let line = match next {
                    None => return None,
                    Some(Ok(line)) => line,
                    Some(Err(err)) => return Some((Err(codec_error(err)), None)),
                };

                match parse_chat_record(&line) {
                    Ok(Some(fragment)) => return Some((Ok(fragment), Some((records, cancel)))),
                    Ok(None) => continue,
                    Err(err) => {
                        warn!("Dropping stream after bad record: {}", err);
                        return Some((Err(err), None));
                    }
                }
            }
        },
    ))
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn chat_completion_stream(
        &self,
        history: Vec<Message>,
        cancel: CancellationToken,
    ) -> LlmResult<FragmentStream> {
        let url = self.endpoint("api/chat");
        debug!(messages = history.len(), "Starting Ollama streaming chat request to: {}", url);

        let request = OllamaChatRequest {
            model: &self.model,
            messages: &history,
            stream: true,
        };

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
            response = self.client.post(&url).json(&request).send() => response?,
        };
        let response = Self::check_status(response).await?;

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| io::Error::new(io::ErrorKind::Other, e)));

        Ok(decode_chat_stream(body, cancel))
    }

    async fn chat_completion(&self, history: Vec<Message>) -> LlmResult<String> {
        let url = self.endpoint("api/generate");
        debug!(messages = history.len(), "Sending Ollama generate request to: {}", url);

        let prompt = history
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let request = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            messages: &history,
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let response = Self::check_status(response).await?;
        let body = response.text().await?;
        let reply: OllamaGenerateResponse = serde_json::from_str(&body)?;

        if let Some(error) = reply.error {
            return Err(LlmError::Server(error));
        }
        reply
            .response
            .ok_or_else(|| LlmError::Protocol("reply has no `response` field".to_string()))
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(chunks: &[&'static str]) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        let chunks: Vec<io::Result<Bytes>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect();
        stream::iter(chunks)
    }

    async fn collect(stream: FragmentStream) -> Vec<LlmResult<String>> {
        stream.collect().await
    }

    #[test]
    fn test_parse_chat_record() {
        let chunk = r#"{"model":"deepseek-r1","message":{"role":"assistant","content":"Hello"},"done":false}"#;
        assert_eq!(parse_chat_record(chunk).unwrap(), Some("Hello".to_string()));

        let done = r#"{"message":{"role":"assistant","content":""},"done":true,"eval_count":12}"#;
        assert_eq!(parse_chat_record(done).unwrap(), None);

        assert_eq!(parse_chat_record(r#"{"done":true}"#).unwrap(), None);
        assert_eq!(parse_chat_record("   ").unwrap(), None);

        assert!(matches!(parse_chat_record("{not json"), Err(LlmError::Protocol(_))));
        assert!(matches!(
            parse_chat_record(r#"{"error":"model not found"}"#),
            Err(LlmError::Server(msg)) if msg == "model not found"
        ));
    }

    #[tokio::test]
    async fn test_records_split_across_chunks() {
        let stream = decode_chat_stream(
            body(&[
                "{\"message\":{\"content\":\"Hi\"}}\n{\"message\":",
                "{\"content\":\" there\"}}\n",
                "{\"done\":true}",
            ]),
            CancellationToken::new(),
        );

        let fragments: Vec<String> = collect(stream)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(fragments, vec!["Hi".to_string(), " there".to_string()]);
    }

    #[tokio::test]
    async fn test_crlf_and_blank_lines() {
        let stream = decode_chat_stream(
            body(&["\r\n{\"message\":{\"content\":\"a\"}}\r\n\n{\"message\":{\"content\":\"b\"}}\r\n"]),
            CancellationToken::new(),
        );
        let fragments: Vec<String> = collect(stream).await.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(fragments, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_malformed_record_ends_stream() {
        let stream = decode_chat_stream(
            body(&[
                "{\"message\":{\"content\":\"ok\"}}\n",
                "garbage\n",
                "{\"message\":{\"content\":\"never seen\"}}\n",
            ]),
            CancellationToken::new(),
        );

        let items = collect(stream).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "ok");
        assert!(matches!(items[1], Err(LlmError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_oversized_record_is_protocol_error() {
        let huge = format!("{}\n", "x".repeat(MAX_RECORD_BYTES + 16));
        let chunks: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"{\"message\":{\"content\":\"ok\"}}\n")),
            Ok(Bytes::from(huge)),
            Ok(Bytes::from_static(b"{\"message\":{\"content\":\"never seen\"}}\n")),
        ];
        let items = collect(decode_chat_stream(stream::iter(chunks), CancellationToken::new())).await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "ok");
        assert!(matches!(&items[1], Err(LlmError::Protocol(msg)) if msg.contains("exceeds")));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_protocol_error() {
        let chunks: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"\xff\xfe\n")),
            Ok(Bytes::from_static(b"{\"message\":{\"content\":\"never seen\"}}\n")),
        ];
        let items = collect(decode_chat_stream(stream::iter(chunks), CancellationToken::new())).await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(LlmError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_truncated_last_record_is_protocol_error() {
        let stream = decode_chat_stream(
            body(&["{\"message\":{\"content\":\"a\"}}\n{\"message\":{\"con"]),
            CancellationToken::new(),
        );

        let items = collect(stream).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "a");
        assert!(matches!(items[1], Err(LlmError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_transport_error_mid_stream() {
        let chunks: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"{\"message\":{\"content\":\"par\"}}\n")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ];
        let items = collect(decode_chat_stream(stream::iter(chunks), CancellationToken::new())).await;

        assert_eq!(items.len(), 2);
        assert!(matches!(&items[1], Err(e) if e.is_transport()));
    }

    #[tokio::test]
    async fn test_cancelled_stream_stops_reading() {
        let cancel = CancellationToken::new();
        let mut stream = decode_chat_stream(stream::pending::<io::Result<Bytes>>(), cancel.clone());

        cancel.cancel();
        assert!(matches!(stream.next().await, Some(Err(LlmError::Cancelled))));
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_request_shapes() {
        let history = vec![Message::user("Hello")];

        let chat = serde_json::to_value(OllamaChatRequest {
            model: "deepseek-r1",
            messages: &history,
            stream: true,
        })
        .unwrap();
        assert_eq!(chat["stream"], true);
        assert_eq!(chat["messages"][0]["role"], "user");
        assert!(chat.get("prompt").is_none());

        let generate = serde_json::to_value(OllamaGenerateRequest {
            model: "deepseek-r1",
            prompt: "Hello",
            stream: false,
            messages: &history,
        })
        .unwrap();
        assert_eq!(generate["prompt"], "Hello");
        assert_eq!(generate["stream"], false);
    }

    #[test]
    fn test_ollama_provider_creation() {
        let provider = OllamaProvider::new(ProviderConfig {
            base_url: "http://localhost:11434/".to_string(),
            model: "deepseek-r1".to_string(),
            connect_timeout_secs: Some(5),
        })
        .unwrap();

        assert_eq!(provider.endpoint("api/chat"), "http://localhost:11434/api/chat");
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.model(), "deepseek-r1");
    }
}
