//! Chat-completion client for OpenAI-compatible APIs.
//!
//! Both upstream services (the suggestion model and the search provider)
//! speak the same `POST {api_base}/chat/completions` protocol, so a single
//! client serves both. Calls are made exactly once: there is no retry,
//! backoff, or caching.
//!
//! The [`ChatCompletion`] trait is the seam between the request handlers
//! and the network, so handlers can be driven by a scripted client in tests.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ProxyError;

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Request body for `POST /chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Perplexity extension; omitted for plain OpenAI calls.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub return_related_questions: bool,
}

/// The parts of a completion response the handlers use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatReply {
    /// Message content of the first choice, if any.
    pub content: Option<String>,
    pub related_questions: Vec<String>,
}

/// Where to send a completion and how to authenticate.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint<'a> {
    /// Human-readable service name used in error messages (e.g. `"OpenAI"`).
    pub service: &'static str,
    pub api_base: &'a str,
    pub api_key: &'a str,
}

impl Endpoint<'_> {
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(
        &self,
        endpoint: &Endpoint<'_>,
        request: &ChatRequest,
    ) -> Result<ChatReply, ProxyError>;
}

#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    choices: Vec<RawChoice>,
    #[serde(default)]
    related_questions: Vec<String>,
}

#[derive(Deserialize)]
struct RawChoice {
    message: RawMessage,
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(default)]
    content: Option<String>,
}

impl From<RawResponse> for ChatReply {
    fn from(raw: RawResponse) -> Self {
        ChatReply {
            content: raw.choices.into_iter().next().and_then(|c| c.message.content),
            related_questions: raw.related_questions,
        }
    }
}

/// [`ChatCompletion`] over HTTP with `reqwest`.
#[derive(Clone)]
pub struct HttpChatClient {
    http: reqwest::Client,
}

impl HttpChatClient {
    /// Builds a client. `timeout` of `None` sets no explicit deadline.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
        })
    }
}

#[async_trait]
impl ChatCompletion for HttpChatClient {
    async fn complete(
        &self,
        endpoint: &Endpoint<'_>,
        request: &ChatRequest,
    ) -> Result<ChatReply, ProxyError> {
        let service = endpoint.service;

        let response = self
            .http
            .post(endpoint.completions_url())
            .bearer_auth(endpoint.api_key)
            .json(request)
            .send()
            .await
            .map_err(|source| ProxyError::Transport { service, source })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            tracing::warn!(service, %status, body = %body_text, "upstream returned an error status");
            return Err(ProxyError::Upstream {
                service,
                status: status.to_string(),
            });
        }

        let raw: RawResponse = response
            .json()
            .await
            .map_err(|source| ProxyError::Transport { service, source })?;

        Ok(raw.into())
    }
}
