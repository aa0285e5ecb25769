//! Events forwarded from the platform GNSS status callback.
//!
//! Names and payload shapes match what the application runtime listens for:
//! - `started` / `stopped`: no payload
//! - `first-fix`: `{ "ttffMillis": number }`
//! - `satellites`: `{ "satellites": SatelliteRecord[] }`

use serde::{Deserialize, Serialize};

use crate::types::SatelliteRecord;

pub const EVENT_STARTED: &str = "started";
pub const EVENT_STOPPED: &str = "stopped";
pub const EVENT_FIRST_FIX: &str = "first-fix";
pub const EVENT_SATELLITES: &str = "satellites";

/// Every event name the platform module may emit
pub const EVENT_NAMES: [&str; 4] = [EVENT_STARTED, EVENT_STOPPED, EVENT_FIRST_FIX, EVENT_SATELLITES];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SatellitesPayload {
    pub satellites: Vec<SatelliteRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirstFixPayload {
    pub ttff_millis: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GnssEvent {
    Started,
    Stopped,
    FirstFix(FirstFixPayload),
    Satellites(SatellitesPayload),
}

impl GnssEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GnssEvent::Started => EVENT_STARTED,
            GnssEvent::Stopped => EVENT_STOPPED,
            GnssEvent::FirstFix(_) => EVENT_FIRST_FIX,
            GnssEvent::Satellites(_) => EVENT_SATELLITES,
        }
    }

    /// Encode the payload the way the runtime bridge ships it (`null` for bare events)
    pub fn payload_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            GnssEvent::Started | GnssEvent::Stopped => Ok(serde_json::Value::Null),
            GnssEvent::FirstFix(payload) => serde_json::to_value(payload),
            GnssEvent::Satellites(payload) => serde_json::to_value(payload),
        }
    }

    /// Decode an event received from the runtime bridge.
    ///
    /// Returns `Ok(None)` for event names this crate does not know about.
    pub fn from_payload(name: &str, payload: serde_json::Value) -> serde_json::Result<Option<Self>> {
        let event = match name {
            EVENT_STARTED => GnssEvent::Started,
            EVENT_STOPPED => GnssEvent::Stopped,
            EVENT_FIRST_FIX => GnssEvent::FirstFix(serde_json::from_value(payload)?),
            EVENT_SATELLITES => GnssEvent::Satellites(serde_json::from_value(payload)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}
