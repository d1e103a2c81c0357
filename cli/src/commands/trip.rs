use std::sync::Arc;

use chrono::NaiveDate;
use clap::Subcommand;
use meteotrip_core::draft::{StopUpdate, TripDraft};
use meteotrip_core::forecast::EnrichError;
use meteotrip_core::pipeline::{SubmitError, TripPipeline};
use meteotrip_core::quota::Identity;
use meteotrip_core::store::{StoreError, TripSlot};
use meteotrip_core::trip::{Suggestion, is_guest_trip_id};
use serde_json::json;
use uuid::Uuid;

use crate::remote::RemoteEnricher;
use crate::slot::FileSlot;
use crate::util::{
    api_request, exit_code_for, exit_error, print_connection_error, print_json, raw_api_request,
    read_json_from_file, require_key,
};

#[derive(Subcommand)]
pub enum TripCommands {
    /// Plan a trip: validate, attach forecasts and save it
    ///
    /// With an API key the trip is saved to your account. Without one it is
    /// kept on this device, one trip at a time.
    Create {
        /// Trip name (defaults to the suggestion title with --from-suggestion)
        #[arg(long)]
        name: Option<String>,
        /// Traveler first name
        #[arg(long)]
        first_name: String,
        /// Traveler last name
        #[arg(long)]
        last_name: String,
        /// Stop as "<place>@<YYYY-MM-DD>[..<YYYY-MM-DD>]", repeatable.
        /// With --from-suggestion the place may be left out ("@2026-10-01")
        /// to keep the suggested one at that position.
        #[arg(long = "stop")]
        stops: Vec<String>,
        /// Seed the draft from `meteotrip suggest` output (file path or "-" for stdin)
        #[arg(long)]
        from_suggestion: Option<String>,
        /// Which suggestion to use when the file holds a list
        #[arg(long, default_value_t = 0)]
        pick: usize,
    },
    /// Show the trip kept on this device and, with an API key, your saved trips
    List {
        /// Maximum number of saved trips to return
        #[arg(long)]
        limit: Option<u32>,
        /// Pagination cursor from a previous response
        #[arg(long)]
        cursor: Option<String>,
    },
    /// Delete a trip; `guest-` ids clear the trip kept on this device
    Delete {
        /// Trip id
        id: String,
    },
}

pub async fn run(api_url: &str, api_key: Option<&str>, command: TripCommands) -> i32 {
    match command {
        TripCommands::Create {
            name,
            first_name,
            last_name,
            stops,
            from_suggestion,
            pick,
        } => {
            let suggestion = from_suggestion
                .as_deref()
                .map(|path| load_suggestion(path, pick).unwrap_or_else(|e| exit_error(&e, None)));
            let specs: Vec<StopSpec> = stops
                .iter()
                .map(|s| parse_stop_spec(s))
                .collect::<Result<_, _>>()
                .unwrap_or_else(|e| {
                    exit_error(&e, Some("Format: --stop 'Lyon, France@2026-10-01..2026-10-03'"))
                });
            let session = draft_session(api_key);
            let draft = build_draft(
                name,
                first_name,
                last_name,
                suggestion.as_ref(),
                &specs,
                &session,
            )
            .unwrap_or_else(|e| exit_error(&e, None));

            match api_key {
                Some(key) => create_remote(api_url, key, &draft).await,
                None => {
                    create_local(api_url, draft, Arc::new(FileSlot::default_location())).await
                }
            }
        }
        TripCommands::List { limit, cursor } => {
            list(api_url, api_key, limit, cursor.as_deref(), &FileSlot::default_location()).await
        }
        TripCommands::Delete { id } => {
            delete(api_url, api_key, &id, &FileSlot::default_location()).await
        }
    }
}

/// Draft-editing session. The server resolves the real owner from the key,
/// so a registered session only needs to be distinguishable from anonymous.
fn draft_session(api_key: Option<&str>) -> Identity {
    match api_key {
        Some(_) => Identity::Registered {
            user_id: Uuid::nil(),
        },
        None => Identity::Anonymous,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StopSpec {
    place: Option<String>,
    arrival: NaiveDate,
    departure: Option<NaiveDate>,
}

fn parse_stop_spec(spec: &str) -> Result<StopSpec, String> {
    let (place, dates) = spec
        .rsplit_once('@')
        .ok_or_else(|| format!("Stop '{spec}' is missing '@<date>'"))?;
    let parse_date = |raw: &str| {
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|e| format!("Invalid date '{raw}' in stop '{spec}': {e}"))
    };
    let (arrival, departure) = match dates.split_once("..") {
        Some((from, to)) => (parse_date(from)?, Some(parse_date(to)?)),
        None => (parse_date(dates)?, None),
    };
    let place = place.trim();
    Ok(StopSpec {
        place: (!place.is_empty()).then(|| place.to_string()),
        arrival,
        departure,
    })
}

fn load_suggestion(path: &str, pick: usize) -> Result<Suggestion, String> {
    let value = read_json_from_file(path)?;
    let candidate = match value.get("suggestions").and_then(|s| s.as_array()) {
        Some(list) => list.get(pick).cloned().ok_or_else(|| {
            format!("No suggestion at index {pick} ({} available)", list.len())
        })?,
        None => value,
    };
    serde_json::from_value(candidate).map_err(|e| format!("Not a trip suggestion: {e}"))
}

/// Assemble a draft through the same edits the planner UI performs, so the
/// anonymous one-stop limit applies here too.
fn build_draft(
    name: Option<String>,
    first_name: String,
    last_name: String,
    suggestion: Option<&Suggestion>,
    specs: &[StopSpec],
    session: &Identity,
) -> Result<TripDraft, String> {
    let mut draft = TripDraft::new();
    if let Some(suggestion) = suggestion {
        draft.from_suggestion(suggestion);
    }
    if let Some(name) = name {
        draft.name = name;
    }
    draft.traveler_first_name = first_name;
    draft.traveler_last_name = last_name;

    for (index, spec) in specs.iter().enumerate() {
        if index >= draft.stops.len() {
            draft.add_stop(session).map_err(|e| e.to_string())?;
        }
        let mut updates = Vec::with_capacity(3);
        if let Some(place) = &spec.place {
            updates.push(StopUpdate::LocationName(place.clone()));
        }
        updates.push(StopUpdate::ArrivalDate(Some(spec.arrival)));
        updates.push(match spec.departure {
            Some(departure) => StopUpdate::DepartureDate(Some(departure)),
            None => StopUpdate::SingleDay(true),
        });
        for update in updates {
            draft.update_stop(index, update).map_err(|e| e.to_string())?;
        }
    }
    Ok(draft)
}

async fn create_remote(api_url: &str, api_key: &str, draft: &TripDraft) -> i32 {
    let body = match serde_json::to_value(draft) {
        Ok(body) => body,
        Err(e) => exit_error(&format!("Failed to encode draft: {e}"), None),
    };
    api_request(api_url, reqwest::Method::POST, "/v1/trips", Some(api_key), Some(body), &[], false)
        .await
}

async fn create_local(api_url: &str, draft: TripDraft, slot: Arc<dyn TripSlot>) -> i32 {
    let pipeline = TripPipeline::new(Arc::new(RemoteEnricher::new(api_url))).with_slot(slot);

    match pipeline.submit(draft, &Identity::Anonymous).await {
        Ok(trip) => {
            print_json(&json!(trip), false);
            0
        }
        Err(err) => {
            let (code, body) = submit_failure(&err);
            eprintln!("{}", serde_json::to_string_pretty(&body).unwrap());
            code
        }
    }
}

/// Exit code and JSON error for a failed local submission.
fn submit_failure(err: &SubmitError) -> (i32, serde_json::Value) {
    match err {
        SubmitError::Draft(e) => (
            1,
            json!({"error": "validation_failed", "message": e.to_string(), "field": e.field()}),
        ),
        SubmitError::QuotaExceeded(e) => (
            1,
            json!({
                "error": "quota_exceeded",
                "message": e.to_string(),
                "docs_hint": "Delete the trip kept on this device (meteotrip trip delete guest-...) or use an API key.",
                "next_action": "register"
            }),
        ),
        SubmitError::Enrich(EnrichError::Rejected(message)) => {
            (1, json!({"error": "validation_failed", "message": message}))
        }
        SubmitError::Enrich(EnrichError::Unavailable(message)) => (
            3,
            json!({
                "error": "connection_error",
                "message": message,
                "docs_hint": "Is the API server running? Check METEOTRIP_API_URL."
            }),
        ),
        other => (2, json!({"error": "local_storage_error", "message": other.to_string()})),
    }
}

async fn list(
    api_url: &str,
    api_key: Option<&str>,
    limit: Option<u32>,
    cursor: Option<&str>,
    slot: &FileSlot,
) -> i32 {
    let local = match slot.load().await {
        Ok(trip) => json!(trip),
        Err(e) => {
            tracing::warn!(path = %slot.path().display(), error = %e, "unreadable local trip");
            json!({"error": "local_storage_error", "message": e.to_string()})
        }
    };

    let Some(key) = api_key else {
        print_json(&json!({ "local": local }), false);
        return 0;
    };

    let mut params = Vec::new();
    if let Some(l) = limit {
        params.push(format!("limit={l}"));
    }
    if let Some(c) = cursor {
        params.push(format!("cursor={c}"));
    }
    let path = if params.is_empty() {
        "/v1/trips".to_string()
    } else {
        format!("/v1/trips?{}", params.join("&"))
    };

    match raw_api_request(api_url, reqwest::Method::GET, &path, Some(key), None).await {
        Ok((status, remote)) => {
            let code = exit_code_for(status);
            let output = json!({ "local": local, "remote": remote });
            if code == 0 {
                print_json(&output, false);
            } else {
                eprintln!("{}", serde_json::to_string_pretty(&output).unwrap());
            }
            code
        }
        Err(e) => {
            print_connection_error(&e);
            3
        }
    }
}

async fn delete(api_url: &str, api_key: Option<&str>, id: &str, slot: &FileSlot) -> i32 {
    if is_guest_trip_id(id) {
        return match slot.load().await {
            Ok(Some(trip)) if trip.id == id => clear_local(slot, json!({"deleted": id})).await,
            Ok(_) => {
                eprintln!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "error": "not_found",
                        "message": format!("trip {id} not found on this device")
                    }))
                    .unwrap()
                );
                1
            }
            Err(StoreError::Corrupt(e)) => {
                tracing::warn!(error = %e, path = %slot.path().display(), "clearing unreadable local trip");
                clear_local(
                    slot,
                    json!({"deleted": id, "note": "unreadable local trip cleared"}),
                )
                .await
            }
            Err(e) => {
                eprintln!("{}", json!({"error": "local_storage_error", "message": e.to_string()}));
                2
            }
        };
    }

    let key = require_key(api_key, "Deleting a saved trip");
    api_request(
        api_url,
        reqwest::Method::DELETE,
        &format!("/v1/trips/{id}"),
        Some(key),
        None,
        &[],
        false,
    )
    .await
}

async fn clear_local(slot: &FileSlot, receipt: serde_json::Value) -> i32 {
    match slot.clear().await {
        Ok(_) => {
            print_json(&receipt, false);
            0
        }
        Err(e) => {
            eprintln!("{}", json!({"error": "local_storage_error", "message": e.to_string()}));
            2
        }
    }
}
