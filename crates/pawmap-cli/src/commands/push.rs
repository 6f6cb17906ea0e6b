use std::path::Path;

use pawmap_core::models::ProvisionalIncident;

use crate::commands::common::{api_client, open_cache};
use crate::error::CliError;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PushSummary {
    pub pushed: usize,
    pub discarded: usize,
    pub remaining: usize,
}

pub async fn run_push(server: &str, cache_dir: &Path) -> Result<(), CliError> {
    let client = api_client(server)?;
    let mut cache = open_cache(cache_dir);

    // Reconcile first so reports that already reached the server are not sent twice.
    let records = client.list_all().await?;
    cache.complete_bootstrap(records);

    let pending: Vec<ProvisionalIncident> = cache.pending().cloned().collect();
    let mut summary = PushSummary {
        remaining: pending.len(),
        ..PushSummary::default()
    };

    for provisional in pending {
        match client.submit(&provisional.incident).await {
            Ok(record) => {
                cache.confirm(provisional.temp_id, record.clone());
                summary.pushed += 1;
                summary.remaining -= 1;
                println!("{} -> {}", provisional.temp_id, record.id);
            }
            Err(error) if error.is_retryable() => {
                eprintln!("Server unavailable, stopping: {error}");
                break;
            }
            Err(error) => {
                cache.discard_provisional(provisional.temp_id);
                summary.discarded += 1;
                summary.remaining -= 1;
                eprintln!("Discarded {}: {error}", provisional.temp_id);
            }
        }
    }

    println!(
        "Pushed {}, discarded {}, remaining {}",
        summary.pushed, summary.discarded, summary.remaining
    );
    Ok(())
}
