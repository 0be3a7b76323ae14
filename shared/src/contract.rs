//! Wire types of the contract API.
//!
//! Requests are strict; responses are read leniently, since the snapshot is
//! owned by the server and may grow fields this client does not know about.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::event::{DriverId, TripId};

/// Waypoint placed between origin and destination on every created route.
pub const INTERMEDIATE_CHECKPOINT: &str = "Intermediate Checkpoint";

/// Location sent with checkpoint updates; the client has no position source.
pub const CURRENT_LOCATION_PLACEHOLDER: &str = "Current location";

pub const HEALTHY_MARKER: &str = "healthy";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateContractRequest {
    pub trip_id: TripId,
    pub driver: DriverId,
    pub route: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManageContractRequest {
    pub trip_id: TripId,
    pub event: TripEvent,
    pub status: String,
    pub location: String,
    pub timestamp: DateTime<Utc>,
}

/// A checkpoint event name. The three lifecycle events drive trip state;
/// anything else is recorded by the server but leaves the trip as it was.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TripEvent {
    Departure,
    Midpoint,
    Arrival,
    Other(String),
}

impl TripEvent {
    pub fn as_str(&self) -> &str {
        match self {
            TripEvent::Departure => "departure",
            TripEvent::Midpoint => "midpoint",
            TripEvent::Arrival => "arrival",
            TripEvent::Other(name) => name,
        }
    }

    /// Status label the convenience actions pair with each lifecycle event.
    pub fn default_status(&self) -> &'static str {
        match self {
            TripEvent::Departure => "ok",
            TripEvent::Midpoint => "checkpoint",
            TripEvent::Arrival => "completed",
            TripEvent::Other(_) => "ok",
        }
    }
}

impl From<String> for TripEvent {
    fn from(name: String) -> Self {
        match name.as_str() {
            "departure" | "saida" => TripEvent::Departure,
            "midpoint" | "meio" => TripEvent::Midpoint,
            "arrival" | "chegada" => TripEvent::Arrival,
            _ => TripEvent::Other(name),
        }
    }
}

impl From<&str> for TripEvent {
    fn from(name: &str) -> Self {
        TripEvent::from(name.to_string())
    }
}

impl From<TripEvent> for String {
    fn from(event: TripEvent) -> Self {
        match event {
            TripEvent::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TripEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-side lifecycle status of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractStatus {
    Pending,
    InProgress,
    Midpoint,
    Completed,
}

impl ContractStatus {
    /// Accepts the English names and the backend's Portuguese ones.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Pending" | "Pendente" => Some(Self::Pending),
            "InProgress" | "EmAndamento" => Some(Self::InProgress),
            "Midpoint" | "PontoIntermediario" => Some(Self::Midpoint),
            "Completed" | "Finalizada" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub timestamp: String,
}

impl Checkpoint {
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|t| t.with_timezone(&Utc))
            .or_else(|_| {
                // Python's isoformat() omits the offset on naive datetimes.
                chrono::NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|t| t.and_utc())
            })
            .ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSnapshot {
    #[serde(default)]
    pub trip_id: Option<String>,
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub route: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub checkpoints: Vec<Checkpoint>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContractSnapshot {
    pub fn latest_checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoints.last()
    }
}

/// Common envelope of the create / manage / query responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    /// FastAPI-style error detail: usually a string, sometimes structured.
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ApiEnvelope {
    pub fn detail_text(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status.as_deref() == Some(HEALTHY_MARKER)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
