//! Strike event types and wire-shape validation.
//!
//! A decoded frame is a JSON object with optional fields; an event is only
//! usable once it carries both coordinates. The persisted record and the
//! live broadcast payload are deliberately different projections of the
//! same event: the record keeps everything, the broadcast keeps position
//! only.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while turning decoded frame text into an event.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("event has no lat/lon coordinates")]
    MissingCoordinates,
}

/// Raw wire shape of a decoded feed event. Every field is optional;
/// validation decides what the event is good for.
#[derive(Debug, Deserialize)]
pub struct RawEvent {
    pub time: Option<i64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub delay: Option<f64>,
    pub mds: Option<i64>,
    pub status: Option<i64>,
}

/// A validated strike event: coordinates guaranteed present.
///
/// `time_ns` stays optional: an event without a source timestamp is still
/// relayed live, it just cannot be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct StrikeEvent {
    pub time_ns: Option<i64>,
    pub lat: f64,
    pub lon: f64,
    pub delay: Option<f64>,
    pub mds: Option<i64>,
    pub status: Option<i64>,
}

/// Persisted row shape. Identity is the `(time_ns, lat, lon)` triple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrikeRecord {
    pub time_ns: i64,
    pub lat: f64,
    pub lon: f64,
    pub delay: Option<f64>,
    pub mds: Option<i64>,
    pub status: Option<i64>,
    /// Local wall clock at insertion, Unix seconds.
    pub received_at: f64,
}

/// Position-only payload relayed to live subscribers each drain tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BroadcastPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Parse decoded frame text into a validated event.
pub fn parse_event(text: &str) -> Result<StrikeEvent, ParseError> {
    let raw: RawEvent = serde_json::from_str(text)?;
    match (raw.lat, raw.lon) {
        (Some(lat), Some(lon)) => Ok(StrikeEvent {
            time_ns: raw.time,
            lat,
            lon,
            delay: raw.delay,
            mds: raw.mds,
            status: raw.status,
        }),
        _ => Err(ParseError::MissingCoordinates),
    }
}

impl StrikeEvent {
    /// The live-relay projection: position only, never the timestamp.
    pub fn point(&self) -> BroadcastPoint {
        BroadcastPoint {
            lat: self.lat,
            lon: self.lon,
        }
    }

    /// The persistence projection. `None` when the source timestamp is
    /// missing, since the row's identity cannot be formed without it.
    pub fn to_record(&self, received_at: f64) -> Option<StrikeRecord> {
        Some(StrikeRecord {
            time_ns: self.time_ns?,
            lat: self.lat,
            lon: self.lon,
            delay: self.delay,
            mds: self.mds,
            status: self.status,
            received_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
