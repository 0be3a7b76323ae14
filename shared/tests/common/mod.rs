#![allow(dead_code)]

use crux_core::testing::AppTester;
use crux_core::Request;
use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};
use serde_json::{json, Value};
use waybill::{App, Effect, Event, Model, TripForm};

pub type Tester = AppTester<App, Effect>;

pub fn form(trip_id: &str) -> TripForm {
    TripForm {
        trip_id: trip_id.to_string(),
        driver: "D1".to_string(),
        origin: "A".to_string(),
        destination: "B".to_string(),
    }
}

pub fn http_requests(effects: Vec<Effect>) -> Vec<Request<HttpRequest>> {
    effects
        .into_iter()
        .filter_map(|effect| match effect {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .collect()
}

/// Sends `event` and returns the single HTTP request it issued.
pub fn expect_request(app: &Tester, model: &mut Model, event: Event) -> Request<HttpRequest> {
    let mut requests = http_requests(app.update(event, model).effects);
    assert_eq!(requests.len(), 1, "expected exactly one HTTP request");
    requests.remove(0)
}

/// Resolves `request` with `result` and feeds the resulting events back in.
pub fn respond(
    app: &Tester,
    model: &mut Model,
    mut request: Request<HttpRequest>,
    result: HttpResult,
) -> Vec<Effect> {
    let update = app.resolve(&mut request, result).expect("resolve http request");
    let mut effects = Vec::new();
    for event in update.events {
        effects.extend(app.update(event, model).effects);
    }
    effects
}

pub fn json_response(status: u16, body: Value) -> HttpResult {
    HttpResult::Ok(HttpResponse::status(status).json(body).build())
}

pub fn raw_response(status: u16, body: &[u8]) -> HttpResult {
    HttpResult::Ok(HttpResponse::status(status).body(body.to_vec()).build())
}

pub fn json_body(request: &Request<HttpRequest>) -> Value {
    serde_json::from_slice(&request.operation.body).expect("request body is JSON")
}

pub fn header<'a>(request: &'a Request<HttpRequest>, name: &str) -> Option<&'a str> {
    request
        .operation
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

pub fn contract_ok(trip_id: &str, status: &str, checkpoints: Value) -> HttpResult {
    json_response(
        200,
        json!({
            "success": true,
            "message": "ok",
            "data": {
                "trip_id": trip_id,
                "driver": "D1",
                "status": status,
                "route": ["A", waybill::INTERMEDIATE_CHECKPOINT, "B"],
                "checkpoints": checkpoints,
            }
        }),
    )
}

pub fn checkpoint(event: &str, status: &str, timestamp: &str) -> Value {
    json!({ "event": event, "status": status, "timestamp": timestamp })
}

/// A session whose trip `T1` has been captured and registered.
pub fn registered_session() -> (Tester, Model) {
    let app = Tester::default();
    let mut model = Model::default();

    app.update(Event::TripFormSaved(form("T1")), &mut model);
    let request = expect_request(&app, &mut model, Event::CreateContract);
    respond(&app, &mut model, request, contract_ok("T1", "Pending", json!([])));
    assert!(model.trip.is_registered());

    (app, model)
}
