use serde::{Deserialize, Serialize};
use std::fmt;

use crate::api::HttpOutcome;
use crate::config::ClientConfig;
use crate::contract::TripEvent;
use crate::model::TripForm;

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(TripId);
typed_id!(DriverId);

/// Sequence number stamped on every outgoing request.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestSeq(pub u64);

impl fmt::Display for RequestSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum Event {
    // Shell lifecycle
    Started,
    Configure(ClientConfig),
    SurfaceMounted,
    SurfaceUnmounted,

    // User actions
    TripFormSaved(TripForm),
    CreateContract,
    ManageContract {
        event: TripEvent,
        status: String,
    },
    MarkDeparture,
    MarkMidpoint,
    MarkArrival,
    ViewContract,
    CheckHealth,

    // Responses (internal)
    #[serde(skip)]
    ContractCreated {
        seq: RequestSeq,
        trip_id: TripId,
        result: Box<HttpOutcome>,
    },
    #[serde(skip)]
    ContractManaged {
        seq: RequestSeq,
        trip_id: TripId,
        event: TripEvent,
        status: String,
        result: Box<HttpOutcome>,
    },
    #[serde(skip)]
    ContractViewed {
        seq: RequestSeq,
        trip_id: TripId,
        result: Box<HttpOutcome>,
    },
    #[serde(skip)]
    HealthChecked {
        seq: RequestSeq,
        result: Box<HttpOutcome>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Started => "started",
            Event::Configure(_) => "configure",
            Event::SurfaceMounted => "surface_mounted",
            Event::SurfaceUnmounted => "surface_unmounted",
            Event::TripFormSaved(_) => "trip_form_saved",
            Event::CreateContract => "create_contract",
            Event::ManageContract { .. } => "manage_contract",
            Event::MarkDeparture => "mark_departure",
            Event::MarkMidpoint => "mark_midpoint",
            Event::MarkArrival => "mark_arrival",
            Event::ViewContract => "view_contract",
            Event::CheckHealth => "check_health",
            Event::ContractCreated { .. } => "contract_created",
            Event::ContractManaged { .. } => "contract_managed",
            Event::ContractViewed { .. } => "contract_viewed",
            Event::HealthChecked { .. } => "health_checked",
        }
    }

    pub fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Event::TripFormSaved(_)
                | Event::CreateContract
                | Event::ManageContract { .. }
                | Event::MarkDeparture
                | Event::MarkMidpoint
                | Event::MarkArrival
                | Event::ViewContract
                | Event::CheckHealth
        )
    }
}
