//! Ollama Backend Implementation
//!
//! Inference backend for Ollama (local LLM server).
//!
//! # Ollama API
//!
//! Ollama provides a REST API for:
//! - `/api/chat` - Chat completions with message history
//! - `/api/tags` - List available models
//!
//! This implementation uses the chat endpoint with streaming enabled:
//! the turn list is sent as `messages` and the response arrives as
//! newline-delimited JSON objects carrying `message.content` fragments.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;

use super::traits::{ChatBackend, ChatRequest, StreamingToken};

/// Ollama backend client
#[derive(Clone)]
pub struct OllamaBackend {
    /// Host address
    host: String,
    /// Port number
    port: u16,
    /// HTTP client
    http_client: reqwest::Client,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    pub fn new(host: impl Into<String>, port: u16) -> anyhow::Result<Self> {
        Ok(Self {
            host: host.into(),
            port,
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()?,
        })
    }

    /// Get the base URL
    fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Get chat endpoint URL
    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url())
    }

    /// Get tags endpoint URL
    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url())
    }

    /// Build the chat request body from the turn list
    fn build_body(&self, request: &ChatRequest) -> serde_json::Value {
        serde_json::json!({
            "model": request.model,
            "messages": request.turns,
            "stream": true,
        })
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn name(&self) -> &str {
        "Ollama"
    }

    async fn health_check(&self) -> bool {
        self.http_client
            .get(self.tags_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok()
    }

    async fn send_streaming(
        &self,
        request: &ChatRequest,
    ) -> anyhow::Result<mpsc::Receiver<StreamingToken>> {
        let (tx, rx) = mpsc::channel(100);

        let url = self.chat_url();
        let body = self.build_body(request);

        let response = self.http_client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama returned {status}: {body}");
        }

        let mut stream = response.bytes_stream();

        // Spawn task to process the NDJSON stream
        tokio::spawn(async move {
            let mut buffer = String::new();
            let mut full_response = String::new();

            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));

                        // Parse newline-delimited JSON
                        while let Some(pos) = buffer.find('\n') {
                            let line = buffer[..pos].trim();
                            if !line.is_empty() {
                                if let Ok(data) = serde_json::from_str::<serde_json::Value>(line) {
                                    // Extract token
                                    if let Some(token) = data
                                        .get("message")
                                        .and_then(|m| m.get("content"))
                                        .and_then(|c| c.as_str())
                                    {
                                        if !token.is_empty() {
                                            full_response.push_str(token);
                                            if tx
                                                .send(StreamingToken::Token(token.to_string()))
                                                .await
                                                .is_err()
                                            {
                                                // Receiver dropped, stop streaming
                                                return;
                                            }
                                        }
                                    }

                                    // Check if done
                                    if data
                                        .get("done")
                                        .and_then(serde_json::Value::as_bool)
                                        .unwrap_or(false)
                                    {
                                        let _ = tx
                                            .send(StreamingToken::Complete {
                                                message: full_response,
                                            })
                                            .await;
                                        return;
                                    }
                                }
                            }
                            buffer = buffer[pos + 1..].to_string();
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(StreamingToken::Error(e.to_string())).await;
                        return;
                    }
                }
            }

            // Stream ended without done signal
            if !full_response.is_empty() {
                let _ = tx
                    .send(StreamingToken::Complete {
                        message: full_response,
                    })
                    .await;
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Turn;

    #[test]
    fn test_ollama_backend_urls() {
        let backend = OllamaBackend::new("localhost", 11434).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:11434");
        assert_eq!(backend.chat_url(), "http://localhost:11434/api/chat");
    }

    #[test]
    fn test_build_body_serializes_roles() {
        let backend = OllamaBackend::new("localhost", 11434).unwrap();
        let request = ChatRequest::new(
            "llama3",
            vec![
                Turn::system("You are terse."),
                Turn::user("hello"),
                Turn::assistant("hi"),
            ],
        );

        let body = backend.build_body(&request);
        assert_eq!(body["model"], "llama3");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][2]["role"], "assistant");
        assert_eq!(body["messages"][1]["content"], "hello");
    }
}
