//! `cap` command-line interface.
//!
//! One subcommand per workflow: run a shelf query, build a query from
//! natural language, validate a canonical object, export shelf data, or
//! print a briefing. Logs go to stderr; results go to stdout.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;

use cap::aggregator::aggregate;
use cap::briefing;
use cap::config::ServerConfig;
use cap::export::{self, ExportFormat};
use cap::query::{self, CapQuery};
use cap::state::CapState;
use cap::types::Shelf;
use cap::validator;

#[derive(Parser)]
#[command(name = "cap", version, about = "Canonical access to personal data")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a cap:// query against the configured connectors
    Query {
        /// Address like cap://tasks?status=active&priority=high
        query: String,
    },
    /// Build a cap:// query string from a natural-language description
    BuildQuery {
        /// Free-text description, e.g. "high priority tasks due this week"
        text: Vec<String>,
        /// Also print the detected shelf and filters
        #[arg(long)]
        explain: bool,
    },
    /// Validate a canonical JSON object against its shelf schema
    Validate {
        /// The object as a JSON string
        data: String,
        /// Shelf name; inferred from structure when omitted
        shelf: Option<String>,
    },
    /// Export shelf data (JSON from --data or stdin) to csv/json/markdown
    Export {
        #[arg(long)]
        format: String,
        #[arg(long)]
        shelf: String,
        /// Items as a JSON string; stdin is read when omitted
        #[arg(long)]
        data: Option<String>,
        /// Output file; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print today's briefing: calendar, due tasks, recent comms
    Briefing,
    /// Overview of client contacts, communications, and tasks
    Pipeline {
        /// Only include clients carrying this tag
        #[arg(long)]
        tag: Option<String>,
    },
    /// Search the docs shelf
    Search {
        query: Vec<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse().command).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match command {
        Command::Query { query } => {
            let parsed = CapQuery::parse(&query)?;
            let state = startup();
            let response = aggregate(&state, parsed.shelf, &parsed.filters).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::BuildQuery { text, explain } => {
            let built = query::build_from_text(&text.join(" "))?;
            println!("{built}");
            if explain {
                println!("\n# Shelf: {}", built.shelf);
                if built.filters.is_empty() {
                    println!("# No filters applied");
                } else {
                    println!("# Filters:");
                    for (key, value) in built.filters.iter() {
                        println!("#   - {key}: {value}");
                    }
                }
            }
        }
        Command::Validate { data, shelf } => {
            let object: Value = serde_json::from_str(&data)?;
            let shelf = match shelf.as_deref() {
                Some(name) => Some(
                    Shelf::parse(name).ok_or_else(|| format!("unknown shelf: {name}"))?,
                ),
                None => None,
            };

            let report = validator::validate(&object, shelf);
            if report.is_valid() {
                println!("VALIDATION PASSED");
            } else {
                println!("VALIDATION FAILED\n\nErrors:");
                for error in &report.errors {
                    println!("  - {error}");
                }
            }
            if !report.warnings.is_empty() {
                println!("\nWarnings:");
                for warning in &report.warnings {
                    println!("  - {warning}");
                }
            }
            if !report.is_valid() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Export {
            format,
            shelf,
            data,
            output,
        } => {
            let format = ExportFormat::parse(&format)
                .ok_or_else(|| format!("unknown format: {format}"))?;
            let shelf =
                Shelf::parse(&shelf).ok_or_else(|| format!("unknown shelf: {shelf}"))?;

            let raw = match data {
                Some(data) => data,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let items = parse_items(&raw)?;

            let rendered = export::export(format, shelf, &items);
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    log::info!("exported {} items to {}", items.len(), path.display());
                }
                None => print!("{rendered}"),
            }
        }
        Command::Briefing => {
            let state = startup();
            print!("{}", briefing::today_briefing(&state).await?);
        }
        Command::Pipeline { tag } => {
            let state = startup();
            print!("{}", briefing::client_pipeline(&state, tag.as_deref()).await?);
        }
        Command::Search { query, limit } => {
            let state = startup();
            print!(
                "{}",
                briefing::knowledge_search(&state, &query.join(" "), limit).await?
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn startup() -> CapState {
    let config = ServerConfig::from_env();
    log::info!(
        "starting {} v{} (connectors: {:?})",
        config.server_name,
        config.server_version,
        config.enabled_connectors
    );
    CapState::new(config)
}

/// Accept a bare item list, a `{"items": [...]}` envelope, or one object.
fn parse_items(raw: &str) -> Result<Vec<Value>, serde_json::Error> {
    let value: Value = serde_json::from_str(raw)?;
    Ok(match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("items") {
            Some(Value::Array(items)) => items,
            Some(other) => vec![other],
            None => vec![Value::Object(obj)],
        },
        other => vec![other],
    })
}
