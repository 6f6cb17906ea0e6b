use std::path::Path;

use crate::commands::common::{api_client, confirm, open_cache};
use crate::error::CliError;

pub async fn run_clear(assume_yes: bool, server: &str, cache_dir: &Path) -> Result<(), CliError> {
    if !assume_yes && !confirm("Remove every incident on the server?")? {
        return Err(CliError::ClearAborted);
    }

    let client = api_client(server)?;
    let removed = client.clear().await?;

    // The server set is now empty; unsent local reports stay pending.
    let mut cache = open_cache(cache_dir);
    cache.complete_bootstrap(Vec::new());

    println!("Removed {removed} incident(s)");
    Ok(())
}
