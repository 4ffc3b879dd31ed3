//! Inbound payloads on the event-update topic.
//!
//! The backend wraps every broadcast as
//! `{"httpStatus": <code>, "error": <string?>, "data": <Event?>}`. The
//! status code decides what the payload means, so it is parsed into the
//! tagged [`RemoteUpdate`] rather than handed around as a loose wrapper.
//! Older backends instead reply with a bare event, using the name
//! `NoEventFound` to mean "nothing is running"; that shape is accepted too.

use retriage_core::Event;
use serde::Deserialize;

/// Name the backend gives its placeholder event when nothing is active.
pub const NO_EVENT_SENTINEL: &str = "NoEventFound";

/// One message from the update topic, after discrimination.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteUpdate {
    /// A full snapshot of the active event.
    Snapshot(Box<Event>),
    /// No event is running any more.
    NoActiveEvent,
    /// The backend rejected something and says why.
    Error(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    http_status: u16,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<Event>,
}

/// Errors for bodies that are neither an envelope nor an event.
#[derive(Debug, thiserror::Error)]
pub enum UpdateParseError {
    #[error("Update body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Update envelope with status {0} carried no event")]
    MissingData(u16),
}

/// Parse one update-topic body.
pub fn parse_update(body: &str) -> Result<RemoteUpdate, UpdateParseError> {
    let value: serde_json::Value = serde_json::from_str(body)?;

    if value.get("httpStatus").is_some() {
        let envelope: Envelope = serde_json::from_value(value)?;
        return match envelope.http_status {
            404 => Ok(RemoteUpdate::NoActiveEvent),
            400 => Ok(RemoteUpdate::Error(
                envelope
                    .error
                    .unwrap_or_else(|| "The server rejected the update".to_string()),
            )),
            status => envelope
                .data
                .map(|event| RemoteUpdate::Snapshot(Box::new(event)))
                .ok_or(UpdateParseError::MissingData(status)),
        };
    }

    if value.get("name").and_then(|n| n.as_str()) == Some(NO_EVENT_SENTINEL) {
        return Ok(RemoteUpdate::NoActiveEvent);
    }

    let event: Event = serde_json::from_value(value)?;
    Ok(RemoteUpdate::Snapshot(Box::new(event)))
}
