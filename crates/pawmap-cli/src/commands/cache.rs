use std::path::Path;

use pawmap_core::cache::{CachePersistence, FileCacheStore};

use crate::cli::CacheCommands;
use crate::commands::common::format_local_lines;
use crate::error::CliError;

pub fn run_cache(command: &CacheCommands, cache_dir: &Path) -> Result<(), CliError> {
    let store = FileCacheStore::new(cache_dir);
    match command {
        CacheCommands::Show { json } => {
            let entries = store.load()?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("Cache is empty");
            } else {
                for line in format_local_lines(&entries) {
                    println!("{line}");
                }
            }
        }
        CacheCommands::Clear => {
            store.clear()?;
            println!("Cleared {}", store.path().display());
        }
        CacheCommands::Path => println!("{}", store.path().display()),
    }
    Ok(())
}
