// lib.rs - Trip contract client core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod api;
pub mod app;
pub mod capabilities;
pub mod config;
pub mod contract;
pub mod error;
pub mod event;
pub mod model;
pub mod sync;

pub use crate::api::{ApiClient, ApiOperation, ApiPayload};
pub use crate::app::App;
pub use crate::api::HttpOutcome;
pub use crate::capabilities::{Capabilities, Effect};
pub use crate::config::{ApiBase, ClientConfig, LogAppendPolicy, DEFAULT_API_URL};
pub use crate::contract::{
    ContractSnapshot, ContractStatus, TripEvent, CURRENT_LOCATION_PLACEHOLDER,
    INTERMEDIATE_CHECKPOINT,
};
pub use crate::error::{ClientError, ConfigError, PreconditionError, SurfaceError};
pub use crate::event::{DriverId, Event, RequestSeq, TripId};
pub use crate::model::{
    Control, LogEntry, Model, OutputEntry, OutputKind, Summary, TripForm, TripIdentity, TripPhase,
    ViewModel,
};
pub use crate::sync::RenderPort;
pub use crux_core::App as CruxApp;
