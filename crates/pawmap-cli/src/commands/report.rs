use std::path::Path;

use crate::cli::ReportArgs;
use crate::commands::common::{api_client, build_incident, open_cache};
use crate::error::CliError;

pub async fn run_report(args: &ReportArgs, server: &str, cache_dir: &Path) -> Result<(), CliError> {
    let incident = build_incident(args)?;
    let client = api_client(server)?;

    let mut cache = open_cache(cache_dir);
    let temp_id = cache.add_provisional(incident.clone());

    match client.submit(&incident).await {
        Ok(record) => {
            cache.confirm(temp_id, record.clone());
            println!("{}", record.id);
            Ok(())
        }
        Err(error) if error.is_retryable() => {
            tracing::warn!("Submission of {} failed: {}", temp_id, error);
            eprintln!("Server unreachable; report saved offline as {temp_id}. Run `pawmap push` to retry.");
            println!("{temp_id}");
            Ok(())
        }
        Err(error) => {
            cache.discard_provisional(temp_id);
            Err(error.into())
        }
    }
}
