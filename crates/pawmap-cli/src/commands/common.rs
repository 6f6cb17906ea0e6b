use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use pawmap_core::cache::{ClientCache, FileCacheStore};
use pawmap_core::client::IncidentApiClient;
use pawmap_core::models::{IncidentCandidate, LocalIncident, Validator};
use pawmap_core::{IncidentRecord, NewIncident};
use serde::Serialize;

use crate::cli::ReportArgs;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct IncidentListItem {
    pub id: String,
    pub location_name: String,
    pub category: String,
    pub reporter_name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub contact_info: Option<String>,
    pub has_image: bool,
    pub created_at: i64,
    pub relative_time: String,
}

pub fn api_client(server: &str) -> Result<IncidentApiClient, CliError> {
    Ok(IncidentApiClient::new(server)?)
}

pub fn resolve_cache_dir(cli_cache_dir: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match cli_cache_dir {
        Some(dir) => Ok(dir),
        None => default_cache_dir().ok_or(CliError::NoCacheDir),
    }
}

pub fn default_cache_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("pawmap"))
}

/// Load the offline cache, ready for a bootstrap
pub fn open_cache(cache_dir: &Path) -> ClientCache<FileCacheStore> {
    let mut cache = ClientCache::new(FileCacheStore::new(cache_dir));
    cache.start();
    cache
}

/// Validate report flags the same way the server will
pub fn build_incident(args: &ReportArgs) -> Result<NewIncident, CliError> {
    let image_data = args
        .image
        .as_deref()
        .map(image_data_uri)
        .transpose()?;

    let candidate = IncidentCandidate {
        location_name: Some(args.location.clone()),
        position: Some(vec![args.lat, args.lng].into()),
        reporter_name: Some(args.reporter.clone()),
        description: Some(args.description.clone()),
        category: Some(args.category.as_str().to_string()),
        contact_info: args.contact.clone(),
        image_data,
    };
    Ok(Validator::default().validate(&candidate)?)
}

/// Embed an image file as a `data:` URI
pub fn image_data_uri(path: &Path) -> Result<String, CliError> {
    let bytes = std::fs::read(path)?;
    if bytes.is_empty() {
        return Err(CliError::EmptyImage(path.display().to_string()));
    }
    let mime_type = mime_guess::from_path(path).first_or_octet_stream();
    Ok(format!(
        "data:{};base64,{}",
        mime_type.essence_str(),
        STANDARD.encode(bytes)
    ))
}

pub fn format_incident_lines(records: &[IncidentRecord]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    records
        .iter()
        .map(|record| format_incident_line(record, now_ms))
        .collect()
}

pub fn format_incident_line(record: &IncidentRecord, now_ms: i64) -> String {
    let id = record.id.to_string();
    let short_id = id.chars().take(13).collect::<String>();
    let location = text_preview(&record.location_name, 24);
    let description = text_preview(&record.description, 40);
    let relative_time = format_relative_time(record.created_at, now_ms);
    format!(
        "{short_id:<13}  {:<15}  {location:<24}  {description:<40}  {relative_time}",
        record.category.as_str()
    )
}

pub fn format_local_lines(entries: &[LocalIncident]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    entries
        .iter()
        .map(|entry| match entry {
            LocalIncident::Confirmed(record) => format_incident_line(record, now_ms),
            LocalIncident::Provisional(provisional) => {
                let temp_id = provisional.temp_id.to_string();
                let short_id = temp_id.chars().take(13).collect::<String>();
                let location = text_preview(&provisional.incident.location_name, 24);
                let description = text_preview(&provisional.incident.description, 40);
                format!(
                    "{short_id:<13}  {:<15}  {location:<24}  {description:<40}  pending",
                    provisional.incident.category.as_str()
                )
            }
        })
        .collect()
}

pub fn incident_to_list_item(record: &IncidentRecord) -> IncidentListItem {
    let now_ms = Utc::now().timestamp_millis();
    IncidentListItem {
        id: record.id.to_string(),
        location_name: record.location_name.clone(),
        category: record.category.as_str().to_string(),
        reporter_name: record.reporter_name.clone(),
        description: record.description.clone(),
        latitude: record.position.latitude,
        longitude: record.position.longitude,
        contact_info: record.contact_info.clone(),
        has_image: record.image_data.is_some(),
        created_at: record.created_at,
        relative_time: format_relative_time(record.created_at, now_ms),
    }
}

pub fn text_preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Ask a yes/no question on the terminal. Non-interactive stdin answers no.
pub fn confirm(question: &str) -> Result<bool, CliError> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return Ok(false);
    }

    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    stdin.lock().read_line(&mut answer)?;
    Ok(is_affirmative(&answer))
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
