//! AI-generated pros and cons.
//!
//! Builds a prompt from a decision's title and description, sends it to the
//! completion API once, and hands back the model's `{pros, cons}` object.
//! The reply must be a JSON object with two string arrays; it is not
//! repaired or retried. Item counts are not enforced.

use serde_json::Value;

use crate::config::{Credentials, SuggestionsConfig};
use crate::error::ProxyError;
use crate::llm::{ChatCompletion, ChatMessage, ChatRequest, Endpoint};
use crate::models::{SuggestionRequest, Suggestions};

const SERVICE: &str = "OpenAI";

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that responds with valid JSON only.";

/// Requested range of items per side.
const MIN_ITEMS: usize = 3;
const MAX_ITEMS: usize = 5;

pub fn build_prompt(title: &str, description: Option<&str>) -> String {
    let mut prompt = format!(
        "Generate {MIN_ITEMS}-{MAX_ITEMS} pros and {MIN_ITEMS}-{MAX_ITEMS} cons for the following decision:\n\nDecision: {}",
        title.trim()
    );
    if let Some(desc) = description.map(str::trim).filter(|d| !d.is_empty()) {
        prompt.push_str("\nContext: ");
        prompt.push_str(desc);
    }
    prompt.push_str(
        "\n\nRespond with a JSON object in exactly this format, with no text before or after it:\n\
         {\"pros\": [\"pro 1\", \"pro 2\"], \"cons\": [\"con 1\", \"con 2\"]}",
    );
    prompt
}

/// Ask the model for pros and cons of a decision.
pub async fn generate_suggestions(
    client: &dyn ChatCompletion,
    settings: &SuggestionsConfig,
    credentials: &Credentials,
    request: &SuggestionRequest,
) -> Result<Suggestions, ProxyError> {
    let api_key = credentials
        .openai_api_key
        .as_deref()
        .ok_or(ProxyError::MissingCredential(SERVICE))?;

    let endpoint = Endpoint {
        service: SERVICE,
        api_base: &settings.api_base,
        api_key,
    };

    let chat = ChatRequest {
        model: settings.model.clone(),
        messages: vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(&request.title, request.description.as_deref())),
        ],
        temperature: Some(settings.temperature),
        max_tokens: Some(settings.max_tokens),
        return_related_questions: false,
    };

    let reply = client.complete(&endpoint, &chat).await?;
    let content = reply.content.ok_or(ProxyError::EmptyCompletion(SERVICE))?;

    let suggestions = parse_reply(&content)?;

    for (side, items) in [("pros", &suggestions.pros), ("cons", &suggestions.cons)] {
        if !(MIN_ITEMS..=MAX_ITEMS).contains(&items.len()) {
            tracing::warn!(side, count = items.len(), "model returned an unexpected number of items");
        }
    }

    Ok(suggestions)
}

/// Parse the completion text as a `{pros, cons}` object.
///
/// Not-JSON and wrong-shape replies are distinct errors. Keys other than
/// `pros` and `cons` are kept as they came.
pub fn parse_reply(content: &str) -> Result<Suggestions, ProxyError> {
    let value: Value = serde_json::from_str(content).map_err(ProxyError::MalformedReply)?;

    let Value::Object(mut obj) = value else {
        return Err(ProxyError::InvalidReply("expected a JSON object".to_string()));
    };

    let pros = string_array(obj.remove("pros"), "pros")?;
    let cons = string_array(obj.remove("cons"), "cons")?;

    Ok(Suggestions {
        pros,
        cons,
        extra: obj,
    })
}

fn string_array(value: Option<Value>, field: &str) -> Result<Vec<String>, ProxyError> {
    let arr = value
        .as_ref()
        .and_then(Value::as_array)
        .ok_or_else(|| ProxyError::InvalidReply(format!("'{}' must be an array", field)))?;

    arr.iter()
        .map(|v| {
            v.as_str().map(str::to_string).ok_or_else(|| {
                ProxyError::InvalidReply(format!("'{}' must contain only strings", field))
            })
        })
        .collect()
}
