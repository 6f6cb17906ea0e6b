use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use pawmap_core::cache::{ApplyOutcome, CachePersistence, ClientCache};
use pawmap_core::client::IncidentApiClient;
use pawmap_core::sync::SyncEvent;

use crate::commands::common::{api_client, format_incident_line, format_timestamp, open_cache};
use crate::error::CliError;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub async fn run_watch(as_json: bool, server: &str, cache_dir: &Path) -> Result<(), CliError> {
    let client = api_client(server)?;
    let mut cache = open_cache(cache_dir);

    tokio::select! {
        () = watch_loop(&client, &mut cache, as_json) => Ok(()),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            eprintln!("Stopped watching");
            Ok(())
        }
    }
}

async fn watch_loop<P: CachePersistence>(
    client: &IncidentApiClient,
    cache: &mut ClientCache<P>,
    as_json: bool,
) {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        cache.resync();
        let outcome = run_session(client, cache, as_json).await;
        match &outcome {
            Ok(()) => eprintln!("Event stream closed; resynchronizing"),
            Err(error) => {
                tracing::warn!("Watch session failed: {}", error);
                eprintln!("Connection lost ({error}); retrying in {}s", backoff.as_secs());
            }
        }
        cache.disconnected();

        let (delay, next) = retry_schedule(outcome.is_ok(), backoff);
        tokio::time::sleep(delay).await;
        backoff = next;
    }
}

/// One subscribe, fetch, apply cycle. Returns when the stream ends.
async fn run_session<P: CachePersistence>(
    client: &IncidentApiClient,
    cache: &mut ClientCache<P>,
    as_json: bool,
) -> Result<(), CliError> {
    let mut events = client.subscribe().await?;

    let fetch = client.list_all();
    tokio::pin!(fetch);
    let snapshot = loop {
        tokio::select! {
            result = &mut fetch => break result?,
            event = events.next() => match event {
                Some(event) => {
                    cache.apply(event?);
                }
                None => return Ok(()),
            },
        }
    };

    cache.complete_bootstrap(snapshot);
    if !as_json {
        eprintln!(
            "Watching {} incident(s) ({} pending) at {}",
            cache.confirmed().count(),
            cache.pending().count(),
            format_timestamp(Utc::now().timestamp_millis())
        );
    }

    while let Some(event) = events.next().await {
        let event = event?;
        let outcome = cache.apply(event.clone());
        if let Some(line) = describe_event(&event, outcome, as_json)? {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn describe_event(
    event: &SyncEvent,
    outcome: ApplyOutcome,
    as_json: bool,
) -> Result<Option<String>, CliError> {
    if outcome == ApplyOutcome::Duplicate {
        return Ok(None);
    }
    if as_json {
        return Ok(Some(serde_json::to_string(event)?));
    }

    let line = match event {
        SyncEvent::IncidentAdded { record } => {
            format!("+ {}", format_incident_line(record, Utc::now().timestamp_millis()))
        }
        SyncEvent::AllCleared => "- all incidents cleared".to_string(),
    };
    Ok(Some(line))
}

/// Delay before the next session and the backoff to carry after it.
///
/// A clean close starts over from the initial delay; a failure waits the
/// current backoff and doubles it.
pub fn retry_schedule(clean_close: bool, backoff: Duration) -> (Duration, Duration) {
    if clean_close {
        (INITIAL_BACKOFF, INITIAL_BACKOFF)
    } else {
        (backoff, next_backoff(backoff))
    }
}

pub fn next_backoff(current: Duration) -> Duration {
    current.saturating_mul(2).min(MAX_BACKOFF)
}
