//! revdb CLI
//!
//! Interactive shell over an embedded revision-tracked document store.
//!
//! # Usage
//!
//! ```bash
//! # In-memory session
//! revdb
//!
//! # Persist to SQLite
//! revdb --db ./revdb.db
//!
//! # Execute single command
//! revdb --db ./revdb.db -c 'GET user:123'
//!
//! # With configuration file
//! revdb --config /etc/revdb/config.toml
//! ```

mod command;
mod config;
mod session;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::info;
use tracing_subscriber::EnvFilter;

use revdb_core::{DocumentStore, Revision};
use revdb_storage::{MemoryStorage, Storage};

use crate::command::{Command, CommandError};
use crate::config::{FileConfig, Settings};
use crate::session::{Reply, Session};

/// revdb Command Line Interface
#[derive(Parser, Debug)]
#[command(name = "revdb")]
#[command(author, version, about = "revdb CLI - revision-tracked document store")]
struct Args {
    /// Configuration file path
    #[arg(long, env = "REVDB_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database path for persistence (default: in-memory only)
    #[arg(long, env = "REVDB_DB")]
    db: Option<PathBuf>,

    /// Log level or filter directive (trace, debug, info, warn, error)
    #[arg(long, env = "REVDB_LOG_LEVEL")]
    log_level: Option<String>,

    /// Execute command and exit
    #[arg(short, long)]
    command: Option<String>,

    /// Quiet mode (no banner)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let file = match &args.config {
        Some(path) => FileConfig::from_toml_file(path)?,
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(args.db, args.log_level, file);

    let filter = EnvFilter::try_new(&settings.log_level)
        .with_context(|| format!("Invalid log level: {}", settings.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let (storage, backend) = open_storage(&settings)?;
    let session = Session::new(DocumentStore::with_limits(settings.limits), storage, backend);

    // Single command mode
    if let Some(line) = args.command {
        let ok = execute_line(&session, &line).await;
        if !ok {
            std::process::exit(1);
        }
        return Ok(());
    }

    if !args.quiet {
        let location = match &settings.db {
            Some(path) => path.display().to_string(),
            None => "memory".to_string(),
        };
        println!(
            "{}",
            format!(
                r#"
  revdb  {}
         Storage: {}
         Type 'help' for commands, 'quit' to exit
"#,
                env!("CARGO_PKG_VERSION"),
                location
            )
            .cyan()
        );
    }

    // Interactive mode
    let mut rl = DefaultEditor::new()?;
    let history_path = dirs_next::home_dir()
        .map(|p| p.join(".revdb_history"))
        .unwrap_or_default();

    let _ = rl.load_history(&history_path);

    loop {
        let prompt = format!("{}> ", "revdb".green());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if line.eq_ignore_ascii_case("CLEAR") {
                    print!("\x1B[2J\x1B[1;1H");
                    continue;
                }

                if matches!(Command::parse(line), Ok(Command::Quit)) {
                    break;
                }

                execute_line(&session, line).await;
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);
    Ok(())
}

#[cfg(feature = "sqlite")]
fn open_storage(settings: &Settings) -> Result<(Arc<dyn Storage>, &'static str)> {
    match &settings.db {
        Some(path) => {
            let storage = revdb_storage::SqliteStorage::new(path)
                .with_context(|| format!("Failed to open database {}", path.display()))?;
            info!(path = %path.display(), "SQLite persistence enabled");
            Ok((Arc::new(storage), "sqlite"))
        }
        None => Ok((Arc::new(MemoryStorage::new()), "memory")),
    }
}

#[cfg(not(feature = "sqlite"))]
fn open_storage(settings: &Settings) -> Result<(Arc<dyn Storage>, &'static str)> {
    if settings.db.is_some() {
        anyhow::bail!("revdb was built without SQLite support");
    }
    Ok((Arc::new(MemoryStorage::new()), "memory"))
}

/// Parse, execute and print one command; returns false on error
async fn execute_line(session: &Session, line: &str) -> bool {
    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}", format_command_error(&e));
            return false;
        }
    };

    match session.execute(command).await {
        Ok(reply) => {
            print_reply(reply);
            true
        }
        Err(e) => {
            eprintln!("{}", format_error(&e));
            false
        }
    }
}

fn format_error(e: &revdb_core::Error) -> String {
    let report = e.report();
    format!("{} {}", format!("(error) {}", report.code).red(), report.message)
}

/// Core failures while parsing (bad IDs, bad revisions) carry their report code
fn format_command_error(e: &CommandError) -> String {
    match e {
        CommandError::Core(core) => format_error(core),
        other => format!("{} {}", "(error)".red(), other),
    }
}

fn print_reply(reply: Reply) {
    match reply {
        Reply::Revision(rev) => print_revision(&rev),
        Reply::Revisions(revs) => {
            if revs.is_empty() {
                println!("{}", "(empty)".dimmed());
            }
            for (i, rev) in revs.iter().enumerate() {
                print!("{}) ", i + 1);
                print_revision(rev);
            }
        }
        Reply::Value(value) => println!("{}", serde_json::Value::from(value)),
        Reply::Ids(ids) => {
            if ids.is_empty() {
                println!("{}", "(empty)".dimmed());
            }
            for (i, id) in ids.iter().enumerate() {
                println!("{}) {}", i + 1, id);
            }
        }
        Reply::Ok(message) => println!("{} {}", "OK".green(), message),
        Reply::Info(fields) => {
            for (key, value) in fields {
                println!("{}:{}", key, value.yellow());
            }
        }
        Reply::Nil => println!("{}", "(nil)".dimmed()),
        Reply::Help => print_help(),
        Reply::Quit => {}
    }
}

fn print_revision(rev: &Revision) {
    let marker = if rev.is_deleted() {
        " (deleted)".red().to_string()
    } else {
        String::new()
    };
    let body = serde_json::Value::from(revdb_core::Value::Object(rev.properties().clone()));
    println!("{}{} {}", rev.id().to_string().yellow(), marker, body);
}

fn print_help() {
    println!(
        r#"
{}

{}
  PUT <id> [REV <rev>|NEW] <json>        Write a revision (default parent: current)
  GET <id> [path]                        Current properties or one (nested) property
  DELETE <id>                            Write a tombstone on the current revision
  PURGE <id>                             Discard the document and its history

{}
  REV <id> <rev>                         Show one revision
  HISTORY <id>                           Root-to-current chain
  LEAVES <id>                            All branch tips, winner first
  CONFLICTS <id>                         Losing branch tips
  FORCE <id> <rev|ROOT> [DELETED] [json] Insert a revision under any parent

{}
  KEYS [pattern]                         List document IDs
  INFO                                   Store information

{}
  help                                   Show this help
  clear                                  Clear screen
  quit/exit                              Exit CLI
"#,
        "revdb Commands".cyan().bold(),
        "Documents".yellow().bold(),
        "Revisions".yellow().bold(),
        "Store".yellow().bold(),
        "Local".yellow().bold(),
    );
}

// Minimal dirs_next replacement for home directory
mod dirs_next {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
    }
}
