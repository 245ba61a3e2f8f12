//! CLI command implementations.
//!
//! Each `run_*` function backs one `decide` subcommand, calling the same
//! library functions as the HTTP server and printing to stdout.

use anyhow::{Context, Result};

use crate::config::{Config, Credentials};
use crate::db;
use crate::leaning::Tally;
use crate::llm::HttpChatClient;
use crate::models::{ItemType, SuggestionRequest};
use crate::store;
use crate::suggest::generate_suggestions;
use crate::web_search::run_web_search;

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

pub async fn run_user_add(config: &Config, name: Option<&str>) -> Result<()> {
    let pool = db::connect(config).await?;
    let profile = store::register_user(&pool, name).await?;
    pool.close().await;

    println!("user id:      {}", profile.user_id);
    if let Some(name) = profile.display_name {
        println!("display name: {}", name);
    }
    Ok(())
}

pub async fn run_decision_new(
    config: &Config,
    user: &str,
    title: &str,
    description: Option<&str>,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let decision = store::create_decision(&pool, user, title, description).await?;
    pool.close().await;

    println!("created decision {}", decision.id);
    Ok(())
}

pub async fn run_decision_list(config: &Config, user: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let decisions = store::list_decisions(&pool, user).await?;

    if decisions.is_empty() {
        println!("No decisions yet.");
    }
    for d in &decisions {
        let items = store::list_items(&pool, user, &d.id).await?;
        let tally = Tally::from_items(&items);
        println!(
            "{}  {}  [+{} / -{}, {}]",
            d.id,
            d.title,
            tally.pros,
            tally.cons,
            tally.leaning()
        );
    }
    pool.close().await;
    Ok(())
}

pub async fn run_decision_show(config: &Config, user: &str, id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let decision = store::get_decision(&pool, user, id).await?;
    let items = store::list_items(&pool, user, id).await?;
    pool.close().await;

    let tally = Tally::from_items(&items);

    println!("--- Decision ---");
    println!("id:          {}", decision.id);
    println!("title:       {}", decision.title);
    if let Some(ref desc) = decision.description {
        println!("description: {}", desc);
    }
    println!("created_at:  {}", format_ts_iso(decision.created_at));
    println!("updated_at:  {}", format_ts_iso(decision.updated_at));
    println!();

    for (label, kind) in [("Pros", ItemType::Pro), ("Cons", ItemType::Con)] {
        let side: Vec<_> = items.iter().filter(|i| i.item_type == kind).collect();
        println!("--- {} ({}) ---", label, side.len());
        for item in side {
            println!("  {}  {}", item.id, item.content);
        }
        println!();
    }

    println!("{} pros, {} cons: {}", tally.pros, tally.cons, tally.leaning());
    Ok(())
}

pub async fn run_decision_rm(config: &Config, user: &str, id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    store::delete_decision(&pool, user, id).await?;
    pool.close().await;

    println!("deleted decision {}", id);
    Ok(())
}

pub async fn run_item_add(
    config: &Config,
    user: &str,
    decision_id: &str,
    item_type: ItemType,
    content: &str,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let item = store::add_item(&pool, user, decision_id, item_type, content).await?;
    pool.close().await;

    println!("added {} {}", item.item_type, item.id);
    Ok(())
}

pub async fn run_item_rm(config: &Config, user: &str, decision_id: &str, item_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    store::delete_item(&pool, user, decision_id, item_id).await?;
    pool.close().await;

    println!("deleted item {}", item_id);
    Ok(())
}

/// Print AI suggestions for a stored decision, optionally saving them.
pub async fn run_suggest(
    config: &Config,
    credentials: &Credentials,
    user: &str,
    decision_id: &str,
    save: bool,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let decision = store::get_decision(&pool, user, decision_id).await?;

    let client = HttpChatClient::new(config.upstream.timeout())?;
    let request = SuggestionRequest {
        title: decision.title.clone(),
        description: decision.description.clone(),
    };
    let suggestions = generate_suggestions(&client, &config.suggestions, credentials, &request)
        .await
        .context("Failed to generate suggestions")?;

    println!("Pros:");
    for p in &suggestions.pros {
        println!("  + {}", p);
    }
    println!("Cons:");
    for c in &suggestions.cons {
        println!("  - {}", c);
    }

    if save {
        let saved = store::insert_items(&pool, user, decision_id, &suggestions.into_items()).await?;
        println!();
        println!("saved {} items", saved.len());
    }

    pool.close().await;
    Ok(())
}

pub async fn run_research(config: &Config, credentials: &Credentials, query: &str) -> Result<()> {
    let client = HttpChatClient::new(config.upstream.timeout())?;
    let answer = run_web_search(&client, &config.search, credentials, query)
        .await
        .context("Web search failed")?;

    println!("{}", answer.content);
    if !answer.related_questions.is_empty() {
        println!();
        println!("Related questions:");
        for q in &answer.related_questions {
            println!("  - {}", q);
        }
    }
    Ok(())
}
