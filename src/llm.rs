//! Blocking client for a local text-generation endpoint (Ollama `/api/generate`).

use crate::config::LlmConfig;
use crate::defaults::MISSING_RESPONSE_NOTICE;
use crate::error::{Result, VoxbridgeError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Trait for language model backends.
///
/// Object-safe, Send + Sync so the command handler can share one client.
pub trait LlmClient: Send + Sync {
    /// Send `prompt` and return the generated reply text.
    fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Longest slice of an error body kept in `LlmStatus`.
const MAX_ERROR_BODY: usize = 200;

/// Non-streaming client for an Ollama-compatible generate endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl LlmClient for OllamaClient {
    fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        tracing::debug!(endpoint = %self.endpoint, model = %self.model, "sending generate request");

        let response = self.client.post(&self.endpoint).json(&request).send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(VoxbridgeError::LlmStatus {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let body: GenerateResponse =
            response
                .json()
                .map_err(|e: reqwest::Error| VoxbridgeError::LlmResponse {
                    message: e.to_string(),
                })?;

        Ok(body
            .response
            .unwrap_or_else(|| MISSING_RESPONSE_NOTICE.to_string()))
    }
}

/// Mock LLM client for testing.
///
/// Returns queued replies in order and records every prompt it receives.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: &str) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Ok(reply.to_string()));
        }
        self
    }

    pub fn with_error(self, error: VoxbridgeError) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Err(error));
        }
        self
    }

    /// Prompts received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }
}

impl LlmClient for MockLlmClient {
    fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .unwrap_or_else(|| Ok(String::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// One-shot HTTP responder. Returns the base URL and a handle yielding
    /// the raw request body it received.
    fn serve_once(status_line: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/api/generate", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);

            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':')
                    && name.eq_ignore_ascii_case("content-length")
                {
                    content_length = value.trim().parse().unwrap();
                }
            }

            let mut request_body = vec![0u8; content_length];
            reader.read_exact(&mut request_body).unwrap();

            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();

            String::from_utf8(request_body).unwrap()
        });

        (url, handle)
    }

    fn client_for(endpoint: &str) -> OllamaClient {
        OllamaClient::new(&LlmConfig {
            endpoint: endpoint.to_string(),
            model: "llama3".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_generate_returns_response_field() {
        let (url, server) = serve_once("200 OK", r#"{"model":"llama3","response":"It is noon.","done":true}"#);
        let client = client_for(&url);

        let reply = client.generate("what time is it").unwrap();
        assert_eq!(reply, "It is noon.");
        server.join().unwrap();
    }

    #[test]
    fn test_generate_sends_prompt_verbatim_without_streaming() {
        let (url, server) = serve_once("200 OK", r#"{"response":"ok"}"#);
        let client = client_for(&url);

        client.generate("what time is it").unwrap();

        let sent: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
        assert_eq!(sent["model"], "llama3");
        assert_eq!(sent["prompt"], "what time is it");
        assert_eq!(sent["stream"], false);
    }

    #[test]
    fn test_generate_missing_response_field_uses_notice() {
        let (url, server) = serve_once("200 OK", r#"{"done":true}"#);
        let client = client_for(&url);

        assert_eq!(client.generate("hi").unwrap(), MISSING_RESPONSE_NOTICE);
        server.join().unwrap();
    }

    #[test]
    fn test_generate_http_500_is_status_error() {
        let (url, server) = serve_once("500 Internal Server Error", r#"{"error":"model crashed"}"#);
        let client = client_for(&url);

        match client.generate("hi") {
            Err(VoxbridgeError::LlmStatus { status, body }) => {
                assert_eq!(status, 500);
                assert!(body.contains("model crashed"), "got: {body}");
            }
            other => panic!("Expected LlmStatus, got {:?}", other),
        }
        server.join().unwrap();
    }

    #[test]
    fn test_generate_undecodable_body_is_response_error() {
        let (url, server) = serve_once("200 OK", "not json");
        let client = client_for(&url);

        assert!(matches!(
            client.generate("hi"),
            Err(VoxbridgeError::LlmResponse { .. })
        ));
        server.join().unwrap();
    }

    #[test]
    fn test_generate_connection_refused_is_request_error() {
        // Bind then drop to get a port nothing listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = client_for(&format!("http://127.0.0.1:{port}/api/generate"));

        assert!(matches!(
            client.generate("hi"),
            Err(VoxbridgeError::LlmRequest { .. })
        ));
    }

    #[test]
    fn test_mock_client_records_prompts_and_replays_queue() {
        let client = MockLlmClient::new()
            .with_reply("first")
            .with_error(VoxbridgeError::LlmRequest {
                message: "down".to_string(),
            });

        assert_eq!(client.generate("a").unwrap(), "first");
        assert!(client.generate("b").is_err());
        assert_eq!(client.generate("c").unwrap(), "");
        assert_eq!(client.prompts(), vec!["a", "b", "c"]);
    }
}
