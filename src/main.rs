use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Result, eyre};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use todostore::{
    Backend, Config, Confirm, FileStorage, Filter, KeyValueStore, SessionLock, SqliteStorage, Task, TaskStore,
    ValidationError, View,
};

#[derive(Parser)]
#[command(name = "todo")]
#[command(about = "Local to-do list manager")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to a YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the task data (overrides config)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Storage backend: file or sqlite (overrides config)
    #[arg(short, long)]
    backend: Option<Backend>,

    /// Print the resulting view as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new task
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Show tasks
    List {
        #[arg(short, long, default_value_t = Filter::All)]
        filter: Filter,
    },

    /// Mark a task done, or not done again
    Toggle { id: String },

    /// Replace the text of a task
    Edit {
        id: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Delete a task
    Remove { id: String },

    /// Delete all completed tasks
    ClearCompleted {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show task counts
    Stats,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        let code = if e.downcast_ref::<ValidationError>().is_some() { 1 } else { 2 };
        process::exit(code);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    // Setup tracing
    let level: tracing::Level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        config
            .log_level
            .parse()
            .map_err(|_| eyre!("Invalid log level: {}", config.log_level))?
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    // Held until the command's last save so concurrent invocations cannot lose updates
    let _session = SessionLock::acquire(&config.data_dir)?;

    let storage: Box<dyn KeyValueStore> = match config.backend {
        Backend::File => Box::new(FileStorage::open(&config.data_dir)?),
        Backend::Sqlite => Box::new(SqliteStorage::open(config.database_path())?),
    };
    let mut store = TaskStore::open(storage, config.key.clone())?;

    match cli.command {
        Commands::Add { text } => {
            store.add(&text.join(" "))?;
        }
        Commands::List { filter } => {
            store.set_filter(filter);
        }
        Commands::Toggle { id } => {
            let id = resolve(&store, &id)?;
            store.toggle(&id)?;
        }
        Commands::Edit { id, text } => {
            let id = resolve(&store, &id)?;
            if store.begin_edit(&id).is_some() {
                store.commit_edit(&id, &text.join(" "))?;
            }
        }
        Commands::Remove { id } => {
            let id = resolve(&store, &id)?;
            store.remove(&id)?;
        }
        Commands::ClearCompleted { yes } => {
            let removed = if yes {
                store.clear_completed(&mut |_: usize| true)?
            } else {
                store.clear_completed(&mut StdinConfirm)?
            };
            if !cli.json && removed > 0 {
                println!("Deleted {} completed task(s)", removed);
            }
        }
        Commands::Stats => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&store.view().counts)?);
            } else {
                print_counts(store.view());
            }
            return Ok(());
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(store.view())?);
    } else {
        print_view(&store);
    }

    Ok(())
}

/// Expand an id prefix to a full id; unknown ids pass through unchanged
fn resolve<S: KeyValueStore>(store: &TaskStore<S>, id: &str) -> Result<String> {
    Ok(store
        .find_by_prefix(id)?
        .map(|t| t.id.clone())
        .unwrap_or_else(|| id.to_string()))
}

struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, count: usize) -> bool {
        eprint!("Are you sure you want to delete {} completed task(s)? [y/N] ", count);
        if io::stderr().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

fn print_view<S: KeyValueStore>(store: &TaskStore<S>) {
    let view = store.view();
    if view.show_empty {
        println!("{}", "No tasks here.".dimmed());
    } else {
        // Rows carry HTML-escaped text; the terminal gets the raw task text
        for task in view.rows.iter().filter_map(|row| store.get(&row.id)) {
            println!("{}", format_row(task));
        }
    }
    println!();
    print_counts(view);
}

fn format_row(task: &Task) -> String {
    let mark = if task.completed { "[x]".green() } else { "[ ]".normal() };
    let text = if task.completed {
        task.text.strikethrough().dimmed()
    } else {
        task.text.normal()
    };
    format!("{} {}  {}", mark, text, task.id.dimmed())
}

fn print_counts(view: &View) {
    let counts = view.counts;
    println!(
        "{} total, {} active, {} completed",
        counts.total.to_string().bold(),
        counts.active.to_string().yellow(),
        counts.completed.to_string().green()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_row_prints_raw_text() {
        let mut task = Task::new(r#"Fix a < b && "c" 'd'"#.to_string());
        let line = format_row(&task);
        assert!(line.contains(r#"Fix a < b && "c" 'd'"#));
        assert!(!line.contains("&lt;"));
        assert!(!line.contains("&amp;"));
        assert!(line.contains(&task.id));

        task.completed = true;
        let line = format_row(&task);
        assert!(line.contains("a < b"));
        assert!(!line.contains("&quot;"));
    }

    #[test]
    fn test_print_view_uses_store_tasks() {
        let mut store = TaskStore::open(todostore::MemoryStorage::new(), todostore::DEFAULT_KEY).unwrap();
        let task = store.add("a < b").unwrap();

        let row = &store.view().rows[0];
        assert_eq!(row.text, "a &lt; b");
        let raw = store.get(&row.id).unwrap();
        assert_eq!(format_row(raw), format_row(&task));
        assert!(format_row(raw).contains("a < b"));
    }
}
