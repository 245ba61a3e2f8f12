//! Core data models.
//!
//! Rows stored in SQLite and the request/response shapes of the two
//! pass-through functions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Whether an item argues for or against a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Pro,
    Con,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Pro => "pro",
            ItemType::Con => "con",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pro" => Ok(ItemType::Pro),
            "con" => Ok(ItemType::Con),
            _ => Err(format!("invalid item type: '{}' (expected 'pro' or 'con')", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    pub display_name: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionItem {
    pub id: String,
    pub decision_id: String,
    pub user_id: String,
    pub content: String,
    pub item_type: ItemType,
    pub created_at: i64,
}

/// Body of the suggestion function.
#[derive(Debug, Clone, Deserialize)]
pub struct SuggestionRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Pros and cons as returned by the model.
///
/// Any other keys in the model's object ride along in `extra` and are
/// serialized back out next to `pros` and `cons`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestions {
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Suggestions {
    /// Flattens into `(type, content)` pairs, pros first. Blank entries
    /// cannot be stored as items and are skipped.
    pub fn into_items(self) -> Vec<(ItemType, String)> {
        self.pros
            .into_iter()
            .map(|p| (ItemType::Pro, p))
            .chain(self.cons.into_iter().map(|c| (ItemType::Con, c)))
            .filter(|(_, content)| !content.trim().is_empty())
            .collect()
    }
}

/// Body of the web search function.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

/// Normalized web search answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchAnswer {
    pub content: String,
    pub related_questions: Vec<String>,
}
