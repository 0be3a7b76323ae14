//! Projects contract snapshots onto the presentation surface.
//!
//! Everything here writes through [`RenderPort`] and never touches the trip
//! view model. A surface that cannot take an update is logged and skipped:
//! failing to display a state change is not a failed operation.

use crate::config::LogAppendPolicy;
use crate::contract::{ContractSnapshot, ContractStatus};
use crate::error::SurfaceError;
use crate::model::{Control, LogEntry, Summary};

pub const STATUS_IDLE: &str = "Idle";
pub const STATUS_IN_PROGRESS: &str = "InProgress";
pub const STATUS_COMPLETED: &str = "Completed";

/// Placeholder for summary fields the snapshot did not carry.
pub const NOT_AVAILABLE: &str = "N/A";

/// The capability set the synchronizer needs from a presentation surface.
pub trait RenderPort {
    fn render_summary(&mut self, summary: Summary) -> Result<(), SurfaceError>;
    fn append_log_entry(&mut self, entry: LogEntry) -> Result<(), SurfaceError>;
    fn last_log_entry(&self) -> Option<&LogEntry>;
    fn set_control_enabled(&mut self, control: Control, enabled: bool) -> Result<(), SurfaceError>;
}

/// Maps a server status to its display label. Unknown values pass through;
/// absent or empty ones read as idle.
pub fn map_status(status: Option<&str>) -> &str {
    match status {
        None | Some("") => STATUS_IDLE,
        Some(raw) => match ContractStatus::parse(raw) {
            Some(ContractStatus::Pending) => STATUS_IDLE,
            Some(ContractStatus::InProgress | ContractStatus::Midpoint) => STATUS_IN_PROGRESS,
            Some(ContractStatus::Completed) => STATUS_COMPLETED,
            None => raw,
        },
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub summary_rendered: bool,
    pub log_appended: bool,
}

pub fn synchronize<P>(port: &mut P, snapshot: &ContractSnapshot, policy: LogAppendPolicy) -> SyncOutcome
where
    P: RenderPort + ?Sized,
{
    let mut outcome = SyncOutcome::default();

    let summary = Summary {
        trip_id: non_blank(snapshot.trip_id.as_deref()).to_string(),
        driver: non_blank(snapshot.driver.as_deref()).to_string(),
        status: map_status(snapshot.status.as_deref()).to_string(),
    };
    if let Err(e) = port.render_summary(summary) {
        tracing::warn!(error = %e, "trip summary not rendered");
        return outcome;
    }
    outcome.summary_rendered = true;

    let Some(latest) = snapshot.latest_checkpoint() else {
        return outcome;
    };
    let entry = LogEntry::from_checkpoint(latest);

    if policy == LogAppendPolicy::Deduplicate
        && port
            .last_log_entry()
            .is_some_and(|last| last.same_checkpoint(&entry))
    {
        tracing::debug!(event = %entry.event, "checkpoint already logged");
        return outcome;
    }

    match port.append_log_entry(entry) {
        Ok(()) => outcome.log_appended = true,
        Err(e) => tracing::warn!(error = %e, "checkpoint not logged"),
    }
    outcome
}

/// Enables or disables every trip control. Returns how many were updated.
pub fn set_controls_enabled<P>(port: &mut P, enabled: bool) -> usize
where
    P: RenderPort + ?Sized,
{
    let mut updated = 0;
    for control in Control::ALL {
        match port.set_control_enabled(control, enabled) {
            Ok(()) => updated += 1,
            Err(e) => {
                tracing::warn!(error = %e, ?control, "control not toggled");
                break;
            }
        }
    }
    updated
}

fn non_blank(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => NOT_AVAILABLE,
    }
}
