//! Diagnostic CLI for the notification core.
//!
//! # Responsibility
//! - Inspect and poke a notification database from a terminal.
//! - Surface raw errors; unlike the UI binding, nothing is swallowed here.

use clap::{Parser, Subcommand};
use notifier_core::db::open_db;
use notifier_core::{
    init_logging_from_config, Notification, NotificationService, NotifierConfig,
    SqliteNotificationStore,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "notifier", about = "Notification core diagnostics")]
struct Cli {
    /// SQLite database path. Falls back to `NOTIFIER_DB_PATH`, then a temp file.
    #[arg(long, global = true, env = "NOTIFIER_DB_PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print core version and health check.
    Version,
    /// Send a DEBUG_TEST notification to one user.
    SendTest {
        #[arg(long)]
        user: i64,
    },
    /// Print a user's unread count.
    Unread {
        #[arg(long)]
        user: i64,
    },
    /// List a user's notifications, most recent first.
    List {
        #[arg(long)]
        user: i64,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long, default_value_t = 0)]
        limit: u32,
    },
    /// Mark one notification read.
    MarkRead {
        #[arg(long)]
        id: i64,
    },
    /// Mark all of a user's notifications read.
    MarkAllRead {
        #[arg(long)]
        user: i64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = NotifierConfig::from_env();
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    init_logging_from_config(&config)?;

    if let Command::Version = cli.command {
        println!("notifier_core ping={}", notifier_core::ping());
        println!("notifier_core version={}", notifier_core::core_version());
        return Ok(());
    }

    let conn = open_db(&config.db_path)?;
    let service = NotificationService::new(SqliteNotificationStore::try_new(&conn)?);

    match cli.command {
        Command::Version => {}
        Command::SendTest { user } => {
            let ids = service.debug_test(user)?;
            println!("sent notification id={}", ids[0]);
        }
        Command::Unread { user } => {
            println!("{}", service.unread_count(user)?);
        }
        Command::List {
            user,
            offset,
            limit,
        } => {
            let page = service.user_notifications(user, offset, limit)?;
            for notification in &page.items {
                println!("{}", format_row(notification));
            }
            println!(
                "-- {} item(s), offset={} limit={}",
                page.items.len(),
                page.offset,
                page.applied_limit
            );
        }
        Command::MarkRead { id } => {
            let transitioned = service.mark_read(id)?;
            println!("transitioned={transitioned}");
        }
        Command::MarkAllRead { user } => {
            println!("changed={}", service.mark_all_read(user)?);
        }
    }

    Ok(())
}

fn format_row(notification: &Notification) -> String {
    let state = match notification.read_at() {
        Some(at) => format!("read@{at}"),
        None => "unread".to_string(),
    };
    format!(
        "#{} [{}] {} {} created={} {}",
        notification.id,
        notification.priority.as_str(),
        notification.kind,
        state,
        notification.created_at,
        notification.title
    )
}
