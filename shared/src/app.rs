//! The orchestrator: turns user actions into contract API requests and
//! applies their outcomes to the trip view model and the presentation.
//!
//! Workflows never overlap inside `update`; each one suspends at its `Http`
//! effect and resumes when the shell resolves it. Responses are stamped with
//! the sequence number of their request and the trip they were issued for.
//! A late create or manage answer can never roll the trip flags back, and a
//! late snapshot can never repaint over a newer one.

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::api::{self, ApiClient, ApiOperation, ApiPayload, HttpOutcome};
use crate::capabilities::Capabilities;
use crate::contract::{
    ContractSnapshot, CreateContractRequest, ManageContractRequest, TripEvent,
    CURRENT_LOCATION_PLACEHOLDER,
};
use crate::error::ClientError;
use crate::event::{Event, RequestSeq, TripId};
use crate::model::{Model, OutputKind, TripForm, ViewModel};
use crate::sync;

#[derive(Default)]
pub struct App;

impl App {
    fn check_health(model: &mut Model, caps: &Capabilities) {
        let request = match ApiClient::new(&model.config.base, &caps.http).health() {
            Ok(request) => request,
            Err(e) => {
                model.api_healthy = Some(false);
                let context = json!({ "url": model.config.base.as_str() });
                Self::report_failure(model, "API unavailable", &e, context);
                return;
            }
        };

        let seq = model.begin_request(ApiOperation::Health.loading_label());
        request.send(move |result| Event::HealthChecked {
            seq,
            result: Box::new(result),
        });
    }

    fn capture_form(form: TripForm, model: &mut Model) {
        match form.validate() {
            Ok(identity) => {
                info!(trip_id = %identity.trip_id, driver = %identity.driver, "trip captured");
                model.start_trip(identity);
            }
            Err(e) => Self::report_failure(
                model,
                "Invalid trip form",
                &e.into(),
                json!({ "trip_id": form.trip_id, "driver": form.driver }),
            ),
        }
    }

    fn create_contract(model: &mut Model, caps: &Capabilities) {
        let identity = model.trip.identity_or_example().clone();
        let payload = CreateContractRequest {
            trip_id: identity.trip_id.clone(),
            driver: identity.driver.clone(),
            route: identity.route(),
        };

        let request = match ApiClient::new(&model.config.base, &caps.http).create(&payload) {
            Ok(request) => request,
            Err(e) => {
                Self::report_failure(model, "Failed to create contract", &e, Self::create_context());
                return;
            }
        };

        let seq = model.begin_request(ApiOperation::Create.loading_label());
        let trip_id = payload.trip_id;
        request.send(move |result| Event::ContractCreated {
            seq,
            trip_id,
            result: Box::new(result),
        });
    }

    fn manage_contract(event: TripEvent, status: String, model: &mut Model, caps: &Capabilities) {
        let context = json!({ "event": event, "status": status });

        let identity = match model.trip.registered().cloned() {
            Ok(identity) => identity,
            Err(e) => {
                Self::report_failure(model, "Failed to update contract", &e.into(), context);
                return;
            }
        };

        let payload = ManageContractRequest {
            trip_id: identity.trip_id,
            event: event.clone(),
            status: status.clone(),
            location: CURRENT_LOCATION_PLACEHOLDER.to_string(),
            timestamp: Utc::now(),
        };

        let request = match ApiClient::new(&model.config.base, &caps.http).manage(&payload) {
            Ok(request) => request,
            Err(e) => {
                Self::report_failure(model, "Failed to update contract", &e, context);
                return;
            }
        };

        let seq = model.begin_request(format!("Updating contract - {event}..."));
        let trip_id = payload.trip_id;
        request.send(move |result| Event::ContractManaged {
            seq,
            trip_id,
            event,
            status,
            result: Box::new(result),
        });
    }

    fn view_contract(model: &mut Model, caps: &Capabilities) {
        let trip_id = match model.trip.selected() {
            Ok(identity) => identity.trip_id.clone(),
            Err(e) => {
                let context = json!({ "trip_id": null });
                Self::report_failure(model, "Failed to view contract", &e.into(), context);
                return;
            }
        };

        let request = match ApiClient::new(&model.config.base, &caps.http).query(&trip_id) {
            Ok(request) => request,
            Err(e) => {
                let context = json!({ "trip_id": trip_id });
                Self::report_failure(model, "Failed to view contract", &e, context);
                return;
            }
        };

        let seq = model.begin_request(ApiOperation::Query.loading_label());
        request.send(move |result| Event::ContractViewed {
            seq,
            trip_id,
            result: Box::new(result),
        });
    }

    fn manage_lifecycle(event: TripEvent, model: &mut Model, caps: &Capabilities) {
        let status = event.default_status().to_string();
        Self::manage_contract(event, status, model, caps);
    }

    fn handle_created(seq: RequestSeq, trip_id: TripId, result: HttpOutcome, model: &mut Model) {
        model.finish_request(seq);

        match Self::decode(result, ApiOperation::Create) {
            Ok((payload, snapshot)) => {
                if !Self::accept_transition(seq, &trip_id, model) {
                    return;
                }
                model.trip.mark_registered();
                info!(%trip_id, "contract created");

                model
                    .presentation
                    .push_output("Contract created", OutputKind::Success, payload.data);
                Self::synchronize(seq, model, snapshot.as_ref());
                sync::set_controls_enabled(&mut model.presentation, true);
            }
            Err(e) => {
                Self::report_failure(model, "Failed to create contract", &e, Self::create_context())
            }
        }
    }

    fn handle_managed(
        seq: RequestSeq,
        trip_id: TripId,
        event: TripEvent,
        status: String,
        result: HttpOutcome,
        model: &mut Model,
    ) {
        model.finish_request(seq);

        match Self::decode(result, ApiOperation::Manage) {
            Ok((payload, snapshot)) => {
                if !Self::accept_transition(seq, &trip_id, model) {
                    return;
                }
                model.trip.apply_checkpoint(&event);
                info!(%trip_id, %event, phase = %model.trip.phase(), "checkpoint acknowledged");

                let title = payload
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "Contract updated".to_string());
                model
                    .presentation
                    .push_output(title, OutputKind::Success, payload.data);
                Self::synchronize(seq, model, snapshot.as_ref());
            }
            Err(e) => Self::report_failure(
                model,
                "Failed to update contract",
                &e,
                json!({ "event": event, "status": status }),
            ),
        }
    }

    fn handle_viewed(seq: RequestSeq, trip_id: TripId, result: HttpOutcome, model: &mut Model) {
        model.finish_request(seq);

        match Self::decode(result, ApiOperation::Query) {
            Ok((payload, snapshot)) => {
                if !Self::is_current_trip(seq, &trip_id, model) {
                    return;
                }
                if !model.sequencer.accept_snapshot(seq) {
                    warn!(%seq, %trip_id, "discarding stale contract state");
                    return;
                }
                model
                    .presentation
                    .push_output("Contract state", OutputKind::Info, payload.data);
                Self::render_snapshot(model, snapshot.as_ref());
            }
            Err(e) => Self::report_failure(
                model,
                "Failed to view contract",
                &e,
                json!({ "trip_id": trip_id }),
            ),
        }
    }

    fn handle_health(seq: RequestSeq, result: HttpOutcome, model: &mut Model) {
        model.finish_request(seq);

        match api::normalize_health(result) {
            Ok(report) => {
                let healthy = report.is_healthy();
                model.api_healthy = Some(healthy);
                info!(healthy, status = ?report.status, "health checked");

                let body = serde_json::to_value(&report).unwrap_or_default();
                model.presentation.push_output("API status", OutputKind::Info, body);
            }
            Err(e) => {
                model.api_healthy = Some(false);
                let context = json!({ "url": model.config.base.as_str() });
                Self::report_failure(model, "API unavailable", &e, context);
            }
        }
    }

    fn decode(
        result: HttpOutcome,
        operation: ApiOperation,
    ) -> Result<(ApiPayload, Option<ContractSnapshot>), ClientError> {
        let payload = api::normalize(result, operation)?;
        let snapshot = payload.snapshot()?;
        Ok((payload, snapshot))
    }

    fn is_current_trip(seq: RequestSeq, trip_id: &TripId, model: &Model) -> bool {
        let current = model.trip.identity().map(|identity| &identity.trip_id);
        if current != Some(trip_id) {
            warn!(%seq, %trip_id, "discarding response for a trip no longer selected");
            return false;
        }
        true
    }

    /// A create or manage answer may move the trip only if it is about the
    /// current trip and no newer create or manage answer was applied.
    fn accept_transition(seq: RequestSeq, trip_id: &TripId, model: &mut Model) -> bool {
        if !Self::is_current_trip(seq, trip_id, model) {
            return false;
        }
        if !model.sequencer.accept_transition(seq) {
            warn!(%seq, %trip_id, "discarding stale response");
            return false;
        }
        true
    }

    /// Renders the snapshot that came with an applied transition, unless a
    /// newer snapshot is already on screen.
    fn synchronize(seq: RequestSeq, model: &mut Model, snapshot: Option<&ContractSnapshot>) {
        if model.sequencer.accept_snapshot(seq) {
            Self::render_snapshot(model, snapshot);
        } else {
            debug!(%seq, "newer contract state already rendered");
        }
    }

    fn render_snapshot(model: &mut Model, snapshot: Option<&ContractSnapshot>) {
        match snapshot {
            Some(snapshot) => {
                let policy = model.config.log_policy;
                let outcome = sync::synchronize(&mut model.presentation, snapshot, policy);
                debug!(
                    summary = outcome.summary_rendered,
                    logged = outcome.log_appended,
                    "presentation synchronized"
                );
            }
            None => debug!("response carried no contract data"),
        }
    }

    fn report_failure(model: &mut Model, title: &str, error: &ClientError, context: Value) {
        warn!(error = %error, "{}", title);

        let mut body = json!({ "error": error.reason() });
        if let (Value::Object(body), Value::Object(context)) = (&mut body, context) {
            body.extend(context);
        }
        model.presentation.push_output(title, OutputKind::Error, body);
    }

    fn create_context() -> Value {
        json!({ "details": "check that the contract API is running and reachable" })
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        if event.is_user_initiated() {
            debug!(event = event.name(), "user action");
        }

        match event {
            Event::Started => {
                info!(base = %model.config.base, "client started");
                Self::check_health(model, caps);
            }

            Event::Configure(config) => {
                info!(base = %config.base, log_policy = ?config.log_policy, "client configured");
                model.config = config;
            }

            Event::SurfaceMounted => model.presentation.set_mounted(true),
            Event::SurfaceUnmounted => model.presentation.set_mounted(false),

            Event::TripFormSaved(form) => Self::capture_form(form, model),

            Event::CreateContract => Self::create_contract(model, caps),

            Event::ManageContract { event, status } => {
                Self::manage_contract(event, status, model, caps)
            }
            Event::MarkDeparture => Self::manage_lifecycle(TripEvent::Departure, model, caps),
            Event::MarkMidpoint => Self::manage_lifecycle(TripEvent::Midpoint, model, caps),
            Event::MarkArrival => Self::manage_lifecycle(TripEvent::Arrival, model, caps),

            Event::ViewContract => Self::view_contract(model, caps),

            Event::CheckHealth => Self::check_health(model, caps),

            Event::ContractCreated {
                seq,
                trip_id,
                result,
            } => Self::handle_created(seq, trip_id, *result, model),

            Event::ContractManaged {
                seq,
                trip_id,
                event,
                status,
                result,
            } => Self::handle_managed(seq, trip_id, event, status, *result, model),

            Event::ContractViewed {
                seq,
                trip_id,
                result,
            } => Self::handle_viewed(seq, trip_id, *result, model),

            Event::HealthChecked { seq, result } => Self::handle_health(seq, *result, model),
        }

        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        ViewModel::from(model)
    }
}
