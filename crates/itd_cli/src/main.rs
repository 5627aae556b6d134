//! `itd` - query and manage IT incidents in a local SQLite database.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use itd_core::error::{AppError, INVALID_PARAMETER, OUTPUT_FAILED};

#[derive(Parser, Debug)]
#[command(name = "itd", version, about, long_about = None)]
pub struct Cli {
    /// SQLite database file.
    #[arg(long, global = true, env = "ITD_DATABASE", default_value = "itd.sqlite")]
    pub db: PathBuf,

    #[command(flatten)]
    pub actor: ActorArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Identity the command runs as. Required by every command except `init` and `seed-demo`.
#[derive(Args, Debug, Clone)]
pub struct ActorArgs {
    #[arg(long, global = true, env = "ITD_ACTOR_ID")]
    pub actor_id: Option<i64>,

    /// user | admin_system | admin_<sector>
    #[arg(long, global = true, env = "ITD_ROLE")]
    pub role: Option<String>,

    #[arg(long, global = true, env = "ITD_SECTOR")]
    pub sector: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database schema.
    Init,
    /// Insert a deterministic demo dataset.
    SeedDemo,
    /// List incidents visible to the actor.
    List(ListArgs),
    /// Free-text search over title and description.
    Search(SearchArgs),
    /// Aggregate counts: last7days, last90days, byCategory, byStatus.
    Stats { window: String },
    /// Show one incident.
    Get { id: i64 },
    /// Report a new incident.
    Create(CreateArgs),
    /// Change the status of an incident (admins only).
    SetStatus { id: i64, status: String },
    /// Delete an incident (admins only).
    Delete { id: i64 },
}

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    #[arg(long = "status")]
    pub status: Vec<String>,
    #[arg(long = "priority")]
    pub priority: Vec<String>,
    #[arg(long = "category")]
    pub category: Vec<String>,
    #[arg(long)]
    pub search: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    pub start_date: Option<String>,
    #[arg(long)]
    pub sort_by: Option<String>,
    #[arg(long)]
    pub sort_order: Option<String>,
    #[arg(long)]
    pub page: Option<i64>,
    #[arg(long)]
    pub page_size: Option<i64>,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    #[arg(long)]
    pub q: String,
    #[arg(long)]
    pub skip: Option<i64>,
    #[arg(long)]
    pub limit: Option<i64>,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub description: String,
    #[arg(long)]
    pub category: String,
    #[arg(long)]
    pub priority: String,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code_for(err: &AppError) -> u8 {
    if err.is(INVALID_PARAMETER) {
        2
    } else {
        1
    }
}

fn main() -> ExitCode {
    // A missing .env is normal; anything set there never overrides the real environment.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing();

    match commands::run(cli) {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{{\"code\":\"{OUTPUT_FAILED}\",\"message\":\"{e}\"}}");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            let rendered = serde_json::to_string_pretty(&err).unwrap_or_else(|_| err.to_string());
            eprintln!("{rendered}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}
