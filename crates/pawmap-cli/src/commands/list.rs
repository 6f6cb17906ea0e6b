use std::path::Path;

use crate::commands::common::{
    api_client, format_incident_lines, incident_to_list_item, open_cache, IncidentListItem,
};
use crate::error::CliError;

pub async fn run_list(
    limit: Option<usize>,
    as_json: bool,
    server: &str,
    cache_dir: &Path,
) -> Result<(), CliError> {
    let client = api_client(server)?;
    let records = client.list_all().await?;

    let mut cache = open_cache(cache_dir);
    cache.complete_bootstrap(records.clone());

    let shown = &records[..limit.unwrap_or(records.len()).min(records.len())];
    if as_json {
        let json_items = shown
            .iter()
            .map(incident_to_list_item)
            .collect::<Vec<IncidentListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_incident_lines(shown) {
            println!("{line}");
        }
        let pending = cache.pending().count();
        if pending > 0 {
            eprintln!("{pending} report(s) waiting to be pushed; run `pawmap push`");
        }
    }

    Ok(())
}
