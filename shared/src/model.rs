use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::config::ClientConfig;
use crate::contract::{Checkpoint, TripEvent, INTERMEDIATE_CHECKPOINT};
use crate::error::{PreconditionError, SurfaceError};
use crate::event::{DriverId, RequestSeq, TripId};
use crate::sync::{self, RenderPort};

pub const MAX_OUTPUT_ENTRIES: usize = 50;

// --- Trip identity ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TripIdentity {
    pub trip_id: TripId,
    pub driver: DriverId,
    pub origin: String,
    pub destination: String,
}

impl TripIdentity {
    /// Record used when a contract is created before any form was saved.
    pub fn example() -> Self {
        Self {
            trip_id: TripId::new("TRIP-EXAMPLE-001"),
            driver: DriverId::new("DRIVER-007"),
            origin: "Rio de Janeiro, RJ".to_string(),
            destination: "São Paulo, SP".to_string(),
        }
    }

    /// `[origin, intermediate checkpoint, destination]`
    pub fn route(&self) -> Vec<String> {
        vec![
            self.origin.clone(),
            INTERMEDIATE_CHECKPOINT.to_string(),
            self.destination.clone(),
        ]
    }
}

/// Raw form input as the shell captured it.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct TripForm {
    pub trip_id: String,
    pub driver: String,
    pub origin: String,
    pub destination: String,
}

impl TripForm {
    pub fn validate(&self) -> Result<TripIdentity, PreconditionError> {
        let trip_id = self.trip_id.trim();
        let driver = self.driver.trim();
        if trip_id.is_empty() {
            return Err(PreconditionError::BlankField("trip_id"));
        }
        if driver.is_empty() {
            return Err(PreconditionError::BlankField("driver"));
        }

        Ok(TripIdentity {
            trip_id: TripId::new(trip_id),
            driver: DriverId::new(driver),
            origin: self.origin.trim().to_string(),
            destination: self.destination.trim().to_string(),
        })
    }
}

// --- Trip view model ---

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TripPhase {
    #[default]
    Unregistered,
    Idle,
    Active,
    Completed,
}

impl fmt::Display for TripPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Local knowledge about the current trip. Mutated only by the app's update
/// loop; `active` is never set unless `registered` is.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct TripViewModel {
    identity: Option<TripIdentity>,
    registered: bool,
    active: bool,
    completed: bool,
}

impl TripViewModel {
    pub fn identity(&self) -> Option<&TripIdentity> {
        self.identity.as_ref()
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn phase(&self) -> TripPhase {
        match (self.registered, self.active, self.completed) {
            (false, _, _) => TripPhase::Unregistered,
            (true, true, _) => TripPhase::Active,
            (true, false, true) => TripPhase::Completed,
            (true, false, false) => TripPhase::Idle,
        }
    }

    /// Takes a freshly captured identity. A different trip id starts a new,
    /// unregistered trip and returns `true`; the same id keeps the flags.
    pub fn capture(&mut self, identity: TripIdentity) -> bool {
        let same_trip = self
            .identity
            .as_ref()
            .is_some_and(|current| current.trip_id == identity.trip_id);
        if !same_trip {
            self.registered = false;
            self.active = false;
            self.completed = false;
        }
        self.identity = Some(identity);
        !same_trip
    }

    /// The identity a create call should use, falling back to the example
    /// record when nothing was captured.
    pub fn identity_or_example(&mut self) -> &TripIdentity {
        if self.identity.is_none() {
            tracing::warn!("no trip form captured, using the example trip");
        }
        self.identity.get_or_insert_with(TripIdentity::example)
    }

    pub fn selected(&self) -> Result<&TripIdentity, PreconditionError> {
        self.identity.as_ref().ok_or(PreconditionError::NoTripSelected)
    }

    pub fn registered(&self) -> Result<&TripIdentity, PreconditionError> {
        match &self.identity {
            Some(identity) if self.registered => Ok(identity),
            _ => Err(PreconditionError::TripNotRegistered),
        }
    }

    pub fn mark_registered(&mut self) {
        self.registered = true;
    }

    /// Applies an acknowledged checkpoint. Only departure and arrival move
    /// the trip; a checkpoint on an unregistered trip changes nothing.
    pub fn apply_checkpoint(&mut self, event: &TripEvent) {
        if !self.registered {
            return;
        }
        match event {
            TripEvent::Departure => {
                self.active = true;
                self.completed = false;
            }
            TripEvent::Arrival => {
                self.active = false;
                self.completed = true;
            }
            TripEvent::Midpoint | TripEvent::Other(_) => {}
        }
    }
}

// --- Request sequencing ---

/// Hands out request sequence numbers and keeps two watermarks.
///
/// `transition` guards the trip flags, which only create and manage answers
/// move. `snapshot` guards the summary and log, which every contract answer
/// rewrites. A view that lands first therefore cannot swallow the
/// registration of an earlier create, but an older snapshot never paints
/// over a newer one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestSequencer {
    issued: u64,
    transition: u64,
    snapshot: u64,
}

impl RequestSequencer {
    pub fn issue(&mut self) -> RequestSeq {
        self.issued += 1;
        RequestSeq(self.issued)
    }

    /// `false` if a newer create or manage answer already moved the trip.
    pub fn accept_transition(&mut self, seq: RequestSeq) -> bool {
        Self::advance(&mut self.transition, seq)
    }

    /// `false` if a newer snapshot was already rendered.
    pub fn accept_snapshot(&mut self, seq: RequestSeq) -> bool {
        Self::advance(&mut self.snapshot, seq)
    }

    fn advance(watermark: &mut u64, seq: RequestSeq) -> bool {
        if seq.0 <= *watermark {
            return false;
        }
        *watermark = seq.0;
        true
    }
}

// --- Presentation ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Summary {
    pub trip_id: String,
    pub driver: String,
    pub status: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub event: String,
    pub status: String,
    pub timestamp: String,
    /// `YYYY-MM-DD HH:MM:SS` (UTC) when the timestamp parses, else raw.
    pub display_time: String,
}

impl LogEntry {
    pub fn from_checkpoint(checkpoint: &Checkpoint) -> Self {
        let display_time = checkpoint
            .parsed_timestamp()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| checkpoint.timestamp.clone());

        Self {
            event: checkpoint.event.clone(),
            status: checkpoint.status.clone(),
            timestamp: checkpoint.timestamp.clone(),
            display_time,
        }
    }

    pub fn same_checkpoint(&self, other: &LogEntry) -> bool {
        self.event == other.event && self.status == other.status && self.timestamp == other.timestamp
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    Start,
    Next,
    End,
    Departure,
    Midpoint,
    Arrival,
}

impl Control {
    pub const ALL: [Control; 6] = [
        Control::Start,
        Control::Next,
        Control::End,
        Control::Departure,
        Control::Midpoint,
        Control::Arrival,
    ];
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Success,
    Error,
    Info,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OutputEntry {
    pub id: u64,
    pub title: String,
    pub kind: OutputKind,
    pub body: serde_json::Value,
}

/// Everything the shell draws. Written by the synchronizer through
/// [`RenderPort`] and by the app for the output sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Presentation {
    mounted: bool,
    summary: Option<Summary>,
    log: Vec<LogEntry>,
    controls: BTreeMap<Control, bool>,
    output: VecDeque<OutputEntry>,
    next_output_id: u64,
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            mounted: true,
            summary: None,
            log: Vec::new(),
            controls: Control::ALL.iter().map(|c| (*c, false)).collect(),
            output: VecDeque::new(),
            next_output_id: 0,
        }
    }
}

impl Presentation {
    pub fn set_mounted(&mut self, mounted: bool) {
        self.mounted = mounted;
    }

    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn is_enabled(&self, control: Control) -> bool {
        self.controls.get(&control).copied().unwrap_or(false)
    }

    /// Newest first.
    pub fn output(&self) -> impl Iterator<Item = &OutputEntry> {
        self.output.iter()
    }

    /// Prepends to the output sink, dropping the oldest entries past
    /// [`MAX_OUTPUT_ENTRIES`]. The sink is not part of the mounted surface.
    pub fn push_output(
        &mut self,
        title: impl Into<String>,
        kind: OutputKind,
        body: serde_json::Value,
    ) {
        self.next_output_id += 1;
        self.output.push_front(OutputEntry {
            id: self.next_output_id,
            title: title.into(),
            kind,
            body,
        });
        self.output.truncate(MAX_OUTPUT_ENTRIES);
    }

    /// Forgets what was drawn for the previous trip.
    pub fn clear_trip(&mut self) {
        self.summary = None;
        self.log.clear();
    }

    fn ensure_mounted(&self) -> Result<(), SurfaceError> {
        if self.mounted {
            Ok(())
        } else {
            Err(SurfaceError::NotMounted)
        }
    }
}

impl RenderPort for Presentation {
    fn render_summary(&mut self, summary: Summary) -> Result<(), SurfaceError> {
        self.ensure_mounted()?;
        self.summary = Some(summary);
        Ok(())
    }

    fn append_log_entry(&mut self, entry: LogEntry) -> Result<(), SurfaceError> {
        self.ensure_mounted()?;
        self.log.push(entry);
        Ok(())
    }

    fn last_log_entry(&self) -> Option<&LogEntry> {
        self.log.last()
    }

    fn set_control_enabled(&mut self, control: Control, enabled: bool) -> Result<(), SurfaceError> {
        self.ensure_mounted()?;
        self.controls.insert(control, enabled);
        Ok(())
    }
}

// --- App model ---

#[derive(Clone, Debug, Default)]
pub struct Model {
    pub config: ClientConfig,
    pub trip: TripViewModel,
    pub presentation: Presentation,
    pub sequencer: RequestSequencer,
    /// In-flight requests and their loading labels.
    pub pending: BTreeMap<RequestSeq, String>,
    /// Outcome of the latest health check, if any finished.
    pub api_healthy: Option<bool>,
}

impl Model {
    /// Selects a trip. Switching to a different trip id wipes the previous
    /// trip's summary and log and disables the controls until it is created.
    pub fn start_trip(&mut self, identity: TripIdentity) {
        if self.trip.capture(identity) {
            self.presentation.clear_trip();
            sync::set_controls_enabled(&mut self.presentation, false);
        }
    }

    pub fn begin_request(&mut self, label: impl Into<String>) -> RequestSeq {
        let seq = self.sequencer.issue();
        self.pending.insert(seq, label.into());
        seq
    }

    pub fn finish_request(&mut self, seq: RequestSeq) {
        self.pending.remove(&seq);
    }

    pub fn loading(&self) -> Option<&str> {
        self.pending.values().next_back().map(String::as_str)
    }
}

// --- View model ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ControlView {
    pub control: Control,
    pub enabled: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewModel {
    pub phase: TripPhase,
    pub registered: bool,
    pub active: bool,
    pub trip: Option<TripIdentity>,
    pub summary: Option<Summary>,
    pub event_log: Vec<LogEntry>,
    pub controls: Vec<ControlView>,
    /// Newest first.
    pub output: Vec<OutputEntry>,
    pub loading: Option<String>,
    pub api_healthy: Option<bool>,
}

impl From<&Model> for ViewModel {
    fn from(model: &Model) -> Self {
        let presentation = &model.presentation;
        Self {
            phase: model.trip.phase(),
            registered: model.trip.is_registered(),
            active: model.trip.is_active(),
            trip: model.trip.identity().cloned(),
            summary: presentation.summary().cloned(),
            event_log: presentation.log().to_vec(),
            controls: Control::ALL
                .iter()
                .map(|control| ControlView {
                    control: *control,
                    enabled: presentation.is_enabled(*control),
                })
                .collect(),
            output: presentation.output().cloned().collect(),
            loading: model.loading().map(str::to_string),
            api_healthy: model.api_healthy,
        }
    }
}
