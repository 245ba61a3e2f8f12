//! # Decision Desk CLI (`decide`)
//!
//! ## Usage
//!
//! ```bash
//! decide --config ./config/decide.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `decide init` | Create the SQLite database and schema |
//! | `decide serve` | Start the HTTP server |
//! | `decide user add` | Register a user |
//! | `decide decision new/list/show/rm` | Manage decisions |
//! | `decide item add/rm` | Manage pros and cons |
//! | `decide suggest <id>` | Ask the model for pros and cons |
//! | `decide research "<query>"` | Run a web search |
//!
//! ## Environment
//!
//! `OPENAI_API_KEY` and `PERPLEXITY_API_KEY` are read once at startup.
//! `RUST_LOG` controls log verbosity (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use decision_desk::config::{self, Credentials};
use decision_desk::models::ItemType;
use decision_desk::{commands, migrate, server};

/// Decision Desk: track decisions, weigh pros and cons, and ask an AI for
/// suggestions.
#[derive(Parser)]
#[command(name = "decide", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/decide.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run more than once.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Manage users.
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Manage decisions.
    Decision {
        #[command(subcommand)]
        action: DecisionAction,
    },

    /// Manage pros and cons of a decision.
    Item {
        #[command(subcommand)]
        action: ItemAction,
    },

    /// Generate AI pros and cons for a decision.
    Suggest {
        /// Decision id.
        decision: String,

        /// Owning user id.
        #[arg(long)]
        user: String,

        /// Store the suggestions as items (all or none).
        #[arg(long)]
        save: bool,
    },

    /// Search the web for research context.
    Research {
        /// Free-text question.
        query: String,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Register a new user and print its id.
    Add {
        /// Display name for the profile.
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Subcommand)]
enum DecisionAction {
    /// Create a decision.
    New {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        user: String,
    },
    /// List decisions, newest first.
    List {
        #[arg(long)]
        user: String,
    },
    /// Show a decision with its pros, cons, and leaning.
    Show {
        id: String,
        #[arg(long)]
        user: String,
    },
    /// Delete a decision and all of its items.
    Rm {
        id: String,
        #[arg(long)]
        user: String,
    },
}

#[derive(Subcommand)]
enum ItemAction {
    /// Add a pro or con.
    Add {
        decision: String,
        /// `pro` or `con`.
        #[arg(value_parser = parse_item_type)]
        item_type: ItemType,
        content: String,
        #[arg(long)]
        user: String,
    },
    /// Delete an item.
    Rm {
        decision: String,
        item: String,
        #[arg(long)]
        user: String,
    },
}

fn parse_item_type(s: &str) -> Result<ItemType, String> {
    s.parse()
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let credentials = Credentials::from_env();

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg, credentials).await?;
        }
        Commands::User { action } => match action {
            UserAction::Add { name } => {
                commands::run_user_add(&cfg, name.as_deref()).await?;
            }
        },
        Commands::Decision { action } => match action {
            DecisionAction::New {
                title,
                description,
                user,
            } => {
                commands::run_decision_new(&cfg, &user, &title, description.as_deref()).await?;
            }
            DecisionAction::List { user } => {
                commands::run_decision_list(&cfg, &user).await?;
            }
            DecisionAction::Show { id, user } => {
                commands::run_decision_show(&cfg, &user, &id).await?;
            }
            DecisionAction::Rm { id, user } => {
                commands::run_decision_rm(&cfg, &user, &id).await?;
            }
        },
        Commands::Item { action } => match action {
            ItemAction::Add {
                decision,
                item_type,
                content,
                user,
            } => {
                commands::run_item_add(&cfg, &user, &decision, item_type, &content).await?;
            }
            ItemAction::Rm {
                decision,
                item,
                user,
            } => {
                commands::run_item_rm(&cfg, &user, &decision, &item).await?;
            }
        },
        Commands::Suggest {
            decision,
            user,
            save,
        } => {
            commands::run_suggest(&cfg, &credentials, &user, &decision, save).await?;
        }
        Commands::Research { query } => {
            commands::run_research(&cfg, &credentials, &query).await?;
        }
    }

    Ok(())
}
