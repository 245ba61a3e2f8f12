//! # Decision Desk
//!
//! A personal decision tracker. Users record decisions, attach pros and
//! cons by hand or from an AI suggestion call, and run web searches for
//! research context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌─────────────────┐
//! │   CLI    │──▶│   suggest    │──▶│ OpenAI chat API │
//! │ (decide) │   │  web_search  │──▶│ Perplexity API  │
//! └────┬─────┘   └──────────────┘   └─────────────────┘
//!      │               ▲
//!      │         ┌─────┴────┐        ┌──────────┐
//!      └────────▶│  store   │◀──────▶│  SQLite  │
//!                └─────▲────┘        └──────────┘
//!                      │
//!                ┌─────┴────┐
//!                │   HTTP   │
//!                └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and startup credentials |
//! | [`models`] | Core data types |
//! | [`error`] | Proxy and store error types |
//! | [`llm`] | Chat-completion client |
//! | [`suggest`] | AI pros/cons generation |
//! | [`web_search`] | Web search pass-through |
//! | [`store`] | Decision and item persistence |
//! | [`leaning`] | Derived pros-vs-cons indicator |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema setup |

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod leaning;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod server;
pub mod store;
pub mod suggest;
pub mod web_search;
