//! kvdb Admin CLI
//!
//! Manage the databases of a store from the command line.

use clap::{Parser, Subcommand};
use kvdb::{Config, KvdbManager};
use tracing_subscriber::{fmt, EnvFilter};

/// Scope used for handlers opened by this tool
const CLI_SCOPE: &str = "kvdb-cli";

/// kvdb admin CLI
#[derive(Parser, Debug)]
#[command(name = "kvdb")]
#[command(about = "Manage key-value databases inside a kvdb store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./kvdb_data")]
    data_dir: String,

    /// Store name inside the data directory
    #[arg(short, long, default_value = "kvdb")]
    store_name: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List all databases
    List,

    /// Create a database
    Create {
        name: String,
    },

    /// Delete a database and its data
    Delete {
        name: String,
    },

    /// Check whether a database exists
    Exists {
        name: String,
    },

    /// Load a JSON object file into a database
    Load {
        name: String,

        /// Path to the JSON file
        file: String,
    },

    /// Get a value by key
    Get {
        db: String,
        key: String,
    },

    /// Set a key-value pair
    Set {
        db: String,
        key: String,
        value: String,
    },

    /// Remove a key
    Remove {
        db: String,
        key: String,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kvdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .store_name(&args.store_name)
        .build();

    let manager = KvdbManager::new(config);
    if let Err(e) = manager.initialize() {
        tracing::error!("Failed to open store: {}", e);
        std::process::exit(1);
    }

    let outcome = run(&manager, args.command);
    let closed = manager.finalize();

    if let Err(e) = outcome.and(closed) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(manager: &KvdbManager, command: Commands) -> kvdb::Result<()> {
    match command {
        Commands::List => {
            for name in manager.list_dbs() {
                println!("{}", name);
            }
        }
        Commands::Create { name } => manager.create_db(&name)?,
        Commands::Delete { name } => manager.delete_db(&name)?,
        Commands::Exists { name } => println!("{}", manager.exists_db(&name)),
        Commands::Load { name, file } => manager.load_from_file(&name, &file)?,
        Commands::Get { db, key } => {
            let handler = manager.get_handler(&db, CLI_SCOPE)?;
            match handler.get(&key)? {
                Some(value) => println!("{}", String::from_utf8_lossy(&value)),
                None => println!("(nil)"),
            }
        }
        Commands::Set { db, key, value } => {
            manager.get_handler(&db, CLI_SCOPE)?.set(&key, value)?;
        }
        Commands::Remove { db, key } => {
            manager.get_handler(&db, CLI_SCOPE)?.remove(&key)?;
        }
    }

    Ok(())
}
