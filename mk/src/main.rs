use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::*;
use eyre::{Context, Result, bail};
use tracing::{debug, info};

use markstore::MetaStore;
use marksync::cli::{Cli, Command, Filter, get_log_path};
use marksync::{Config, DetectedItem, EventBus, FsDocuments, ItemStatus, Priority, Scanner, SyncEngine, dates};

fn setup_logging(cli_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    let level = match cli_log_level.map(|s| s.to_uppercase()) {
        None => tracing::Level::INFO,
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

fn print_item(item: &DetectedItem) {
    let kind = match item.priority {
        Priority::High => item.kind.to_string().red().bold(),
        Priority::Medium => item.kind.to_string().yellow(),
        Priority::Low => item.kind.to_string().dimmed(),
    };
    let due = match item.due_date {
        Some(date) if date < dates::today() && item.is_open() => format!(" (due {})", date).red().to_string(),
        Some(date) => format!(" (due {})", date).cyan().to_string(),
        None => String::new(),
    };
    let status = match item.status {
        ItemStatus::Open => String::new(),
        other => format!(" [{}]", other).dimmed().to_string(),
    };
    println!(
        "{} {} {}{}{}  {}",
        item.id.dimmed(),
        kind,
        item.description,
        due,
        status,
        format!("{}:{}", item.file_path.display(), item.line_number + 1).dimmed()
    );
}

fn print_items(items: &[DetectedItem]) {
    if items.is_empty() {
        println!("No comments found");
        return;
    }
    for item in items {
        print_item(item);
    }
}

fn find_item(scanner: &Scanner, id: &str) -> Result<DetectedItem> {
    match scanner.get(id) {
        Some(item) => Ok(item.clone()),
        None => bail!("No comment with id {}", id),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let root: PathBuf = root
        .canonicalize()
        .context(format!("Workspace root not found: {}", root.display()))?;

    let meta = MetaStore::open(&config.storage.state_file).context("Failed to open metadata store")?;
    info!(root = %root.display(), records = meta.len(), "marksync starting");

    let mut scanner = Scanner::new(config.todos, vec![root], meta, EventBus::default());
    scanner.scan_workspace().await;

    let engine = SyncEngine::new(FsDocuments::new());

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Scan => {
            println!(
                "{} Found {} comments ({} open, {} due)",
                "✓".green(),
                scanner.all_items().len().to_string().cyan(),
                scanner.open_count(),
                scanner.due_count()
            );
        }
        Command::List { filter } => {
            let items = match filter {
                Filter::Open => scanner.open_items(),
                Filter::All => scanner.all_items(),
                Filter::Overdue => scanner.overdue(),
                Filter::Today => scanner.due_today(),
                Filter::Week => scanner.due_this_week(),
                Filter::NoDate => scanner.no_due_date(),
                Filter::Completed => scanner.completed(),
            };
            print_items(&items);
        }
        Command::Complete { id } => {
            scanner.mark_complete(&id)?;
            println!("{} Completed: {}", "✓".green(), id.cyan());
        }
        Command::Reopen { id } => {
            scanner.mark_open(&id)?;
            println!("{} Reopened: {}", "✓".green(), id.cyan());
        }
        Command::Snooze { id, date } => {
            scanner.snooze(&id, date)?;
            println!("{} Snoozed {} until {}", "✓".green(), id.cyan(), date);
        }
        Command::Due { id, date } => {
            if !engine.set_due_date_by_id(&mut scanner, &id, date).await {
                bail!("Failed to set due date on {}", id);
            }
            println!("{} Due {}: {}", "✓".green(), date, id.cyan());
        }
        Command::Undue { id } => {
            let item = find_item(&scanner, &id)?;
            if !engine.clear_due_date(&mut scanner, &item).await {
                bail!("Failed to clear due date on {}", id);
            }
            println!("{} Cleared due date: {}", "✓".green(), id.cyan());
        }
        Command::Done { id } => {
            let item = find_item(&scanner, &id)?;
            if !engine.mark_done(&mut scanner, &item).await {
                bail!("Failed to mark {} as done", id);
            }
            println!("{} Done: {}", "✓".green(), id.cyan());
        }
        Command::Delete { id, yes } => {
            let item = find_item(&scanner, &id)?;
            if !yes {
                println!("{} Pass --yes to delete {}:{}", "!".yellow(), item.file_path.display(), item.line_number + 1);
                return Ok(());
            }
            if !engine.delete_line(&mut scanner, &item, yes).await {
                bail!("Failed to delete {}", id);
            }
            println!("{} Deleted: {}", "✓".green(), id.cyan());
        }
        Command::Goto { id } => {
            let item = find_item(&scanner, &id)?;
            if !engine.navigate(&item).await {
                bail!("Failed to open {}", item.file_path.display());
            }
        }
        Command::Counts => {
            println!("Open: {}", scanner.open_count());
            println!("Due:  {}", scanner.due_count());
        }
    }

    Ok(())
}
