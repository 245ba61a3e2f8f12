//! Web search pass-through.
//!
//! Forwards a free-text query to a search-capable completion API
//! (Perplexity by default) and normalizes the answer into
//! `{content, related_questions}`.

use crate::config::{Credentials, SearchConfig};
use crate::error::ProxyError;
use crate::llm::{ChatCompletion, ChatMessage, ChatRequest, Endpoint};
use crate::models::SearchAnswer;

const SERVICE: &str = "Perplexity";

pub const SYSTEM_PROMPT: &str = "You are a research assistant helping someone make a decision. \
Give a concise, factual summary of what is known about the question, and cite sources where possible.";

pub async fn run_web_search(
    client: &dyn ChatCompletion,
    settings: &SearchConfig,
    credentials: &Credentials,
    query: &str,
) -> Result<SearchAnswer, ProxyError> {
    let api_key = credentials
        .search_api_key
        .as_deref()
        .ok_or(ProxyError::MissingCredential(SERVICE))?;

    let endpoint = Endpoint {
        service: SERVICE,
        api_base: &settings.api_base,
        api_key,
    };

    let chat = ChatRequest {
        model: settings.model.clone(),
        messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(query)],
        temperature: None,
        max_tokens: None,
        return_related_questions: true,
    };

    let reply = client.complete(&endpoint, &chat).await?;
    let content = reply.content.ok_or(ProxyError::EmptyCompletion(SERVICE))?;

    Ok(SearchAnswer {
        content,
        related_questions: reply.related_questions,
    })
}
