use clap::{Parser, Subcommand};
use eyre::{Result, eyre};
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use todostore::render;
use todostore::{Backend, Config, FilterMode, TaskId, TaskListStore, ThemeStore, open_backend};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "todo")]
#[command(about = "Persistent task list for the terminal")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to a YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the storage files (overrides config)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Storage backend (overrides config)
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task
    Add {
        /// Task text; words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Show tasks
    List {
        #[arg(short, long, value_enum, default_value_t = FilterMode::All)]
        filter: FilterMode,
    },

    /// Mark a task done, or not done again
    Toggle { id: TaskId },

    /// Delete a task
    #[command(visible_alias = "rm")]
    Remove { id: TaskId },

    /// Delete all completed tasks
    ClearCompleted,

    /// Show or switch the colour theme
    Theme {
        #[command(subcommand)]
        action: Option<ThemeAction>,
    },

    /// Rewrite storage files without superseded entries
    Compact,
}

#[derive(Subcommand, Clone, Copy)]
enum ThemeAction {
    /// Print the current theme
    Show,
    /// Switch between light and dark
    Toggle,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if !config.backend.is_persistent() {
        return Err(eyre!(
            "The memory backend keeps nothing between runs; use jsonl or sqlite"
        ));
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with_writer(std::io::stderr)
        .init();

    let storage = open_backend(&config)?;

    let mut theme = ThemeStore::new(storage.clone());
    let dark = Rc::new(Cell::new(theme.load()));
    {
        let dark = dark.clone();
        theme.on_change(move |value| dark.set(value));
    }

    // Re-render from each new snapshot; requests that change nothing show the list as is
    let mut store = TaskListStore::open(storage.clone())?;
    let rendered = Rc::new(Cell::new(false));
    {
        let dark = dark.clone();
        let rendered = rendered.clone();
        store.subscribe(move |list| {
            print!("{}", render::render(list, FilterMode::All, dark.get()));
            rendered.set(true);
        });
    }

    match cli.command {
        Commands::Add { text } => {
            store.add(&text.join(" "))?;
        }
        Commands::List { filter } => {
            print!("{}", render::render(&store.snapshot(), filter, dark.get()));
            return Ok(());
        }
        Commands::Toggle { id } => {
            store.toggle(id)?;
        }
        Commands::Remove { id } => {
            store.remove(id)?;
        }
        Commands::ClearCompleted => {
            store.clear_completed()?;
        }
        Commands::Theme { action } => {
            if let Some(ThemeAction::Toggle) = action {
                theme.toggle(dark.get())?;
            }
            println!("Theme: {}\n", if dark.get() { "dark" } else { "light" });
        }
        Commands::Compact => {
            let dropped = storage.compact()?;
            println!("Compacted storage, dropped {} stale entries", dropped);
            return Ok(());
        }
    }

    if !rendered.get() {
        print!("{}", render::render(&store.snapshot(), FilterMode::All, dark.get()));
    }

    Ok(())
}
