//! Which way a decision is leaning, derived from its items.
//!
//! Always computed from the current item list; never stored.

use serde::Serialize;
use std::fmt;

use crate::models::{DecisionItem, ItemType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Leaning {
    /// More pros than cons.
    Affirmative,
    /// More cons than pros.
    Negative,
    Neutral,
}

impl fmt::Display for Leaning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leaning::Affirmative => write!(f, "leaning yes"),
            Leaning::Negative => write!(f, "leaning no"),
            Leaning::Neutral => write!(f, "neutral"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub pros: usize,
    pub cons: usize,
}

impl Tally {
    pub fn from_items(items: &[DecisionItem]) -> Self {
        items.iter().fold(Tally::default(), |mut t, item| {
            match item.item_type {
                ItemType::Pro => t.pros += 1,
                ItemType::Con => t.cons += 1,
            }
            t
        })
    }

    pub fn leaning(&self) -> Leaning {
        match self.pros.cmp(&self.cons) {
            std::cmp::Ordering::Greater => Leaning::Affirmative,
            std::cmp::Ordering::Less => Leaning::Negative,
            std::cmp::Ordering::Equal => Leaning::Neutral,
        }
    }
}
