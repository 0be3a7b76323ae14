//! Contract API client: builds requests against the configured base and
//! normalizes whatever comes back into `Ok(payload)` or a [`ClientError`].
//!
//! It never performs I/O. Requests leave the core as `Http` effects and the
//! shell's answer is fed back through [`normalize`].

use crux_http::{Http, HttpError, RequestBuilder, Response};
use serde_json::Value;

use crate::config::ApiBase;
use crate::contract::{
    ApiEnvelope, ContractSnapshot, CreateContractRequest, HealthReport, ManageContractRequest,
};
use crate::error::ClientError;
use crate::event::{Event, TripId};

/// What the shell hands back for an `Http` effect.
pub type HttpOutcome = crux_http::Result<Response<Vec<u8>>>;

const JSON: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    Create,
    Manage,
    Query,
    Health,
}

impl ApiOperation {
    pub fn loading_label(self) -> &'static str {
        match self {
            ApiOperation::Create => "Creating contract...",
            ApiOperation::Manage => "Updating contract...",
            ApiOperation::Query => "Querying contract...",
            ApiOperation::Health => "Checking API health...",
        }
    }

    /// Reason used when the server reports `success: false` without a message.
    pub fn fallback_failure(self) -> &'static str {
        match self {
            ApiOperation::Create => "failed to create contract",
            ApiOperation::Manage => "failed to update contract",
            ApiOperation::Query => "contract not found",
            ApiOperation::Health => "API unavailable",
        }
    }
}

/// Successful response body, unwrapped from its envelope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiPayload {
    pub message: Option<String>,
    pub data: Value,
}

impl ApiPayload {
    /// Decodes `data` as a contract snapshot. `null` means the server sent
    /// none, which is not an error.
    pub fn snapshot(&self) -> Result<Option<ContractSnapshot>, ClientError> {
        if self.data.is_null() {
            return Ok(None);
        }
        serde_json::from_value(self.data.clone())
            .map(Some)
            .map_err(|e| ClientError::MalformedResponse {
                reason: format!("contract data: {e}"),
            })
    }
}

/// Builds contract API requests. The caller stamps them and calls `send`.
pub struct ApiClient<'a> {
    base: &'a ApiBase,
    http: &'a Http<Event>,
}

impl<'a> ApiClient<'a> {
    pub fn new(base: &'a ApiBase, http: &'a Http<Event>) -> Self {
        Self { base, http }
    }

    pub fn create(&self, payload: &CreateContractRequest) -> Result<RequestBuilder<Event>, ClientError> {
        let url = self.url(&["contract", "create"])?;
        Ok(self.http.post(url).header("Accept", JSON).body_json(payload)?)
    }

    pub fn manage(&self, payload: &ManageContractRequest) -> Result<RequestBuilder<Event>, ClientError> {
        let url = self.url(&["contract", "manage"])?;
        Ok(self.http.post(url).header("Accept", JSON).body_json(payload)?)
    }

    pub fn query(&self, trip_id: &TripId) -> Result<RequestBuilder<Event>, ClientError> {
        let url = self.url(&["contract", trip_id.as_str()])?;
        Ok(self.http.get(url).header("Accept", JSON))
    }

    pub fn health(&self) -> Result<RequestBuilder<Event>, ClientError> {
        let url = self.url(&["health"])?;
        Ok(self.http.get(url).header("Accept", JSON))
    }

    fn url(&self, segments: &[&str]) -> Result<String, ClientError> {
        self.base
            .endpoint(segments)
            .map_err(|e| ClientError::InvalidRequest(format!("endpoint for {}: {e}", self.base)))
    }
}

/// Status code and body of whatever the server answered. A non-2xx answer
/// may arrive as a response or as `HttpError::Http`; both carry the body.
/// Any other error means no response was received.
fn into_parts(outcome: HttpOutcome) -> Result<(u16, Vec<u8>), ClientError> {
    match outcome {
        Ok(mut response) => {
            let status = u16::from(response.status());
            Ok((status, response.take_body().unwrap_or_default()))
        }
        Err(HttpError::Http { code, body, .. }) => Ok((u16::from(code), body.unwrap_or_default())),
        Err(e) => Err(ClientError::Transport {
            reason: e.to_string(),
        }),
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Normalizes a create / manage / query outcome.
///
/// Order of checks: transport failure, non-2xx status (reason from `detail`
/// when the body carries one), unparseable body, `success: false`.
pub fn normalize(outcome: HttpOutcome, operation: ApiOperation) -> Result<ApiPayload, ClientError> {
    let (status, bytes) = into_parts(outcome)?;
    let body = serde_json::from_slice::<Value>(&bytes);

    if !is_success(status) {
        let reason = body
            .ok()
            .and_then(|value| serde_json::from_value::<ApiEnvelope>(value).ok())
            .and_then(|envelope| envelope.detail_text())
            .unwrap_or_else(|| format!("HTTP {status}"));
        return Err(ClientError::Http { status, reason });
    }

    let body = body.map_err(|e| ClientError::MalformedResponse {
        reason: e.to_string(),
    })?;
    let envelope: ApiEnvelope =
        serde_json::from_value(body).map_err(|e| ClientError::MalformedResponse {
            reason: e.to_string(),
        })?;

    if !envelope.success {
        return Err(ClientError::Application {
            message: envelope
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| operation.fallback_failure().to_string()),
        });
    }

    Ok(ApiPayload {
        message: envelope.message,
        data: envelope.data.unwrap_or(Value::Null),
    })
}

/// Normalizes a health check. The report is read whatever the status code,
/// since an unhealthy API typically answers 503 with a JSON body.
pub fn normalize_health(outcome: HttpOutcome) -> Result<HealthReport, ClientError> {
    let (status, bytes) = into_parts(outcome)?;
    match serde_json::from_slice::<HealthReport>(&bytes) {
        Ok(report) => Ok(report),
        Err(_) if !is_success(status) => Err(ClientError::Http {
            status,
            reason: format!("HTTP {status}"),
        }),
        Err(e) => Err(ClientError::MalformedResponse {
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crux_http::http::StatusCode;
    use crux_http::testing::ResponseBuilder;
    use serde_json::json;

    fn ok(status: StatusCode, body: Value) -> HttpOutcome {
        Ok(ResponseBuilder::with_status(status)
            .body(serde_json::to_vec(&body).unwrap())
            .build())
    }

    fn raw(status: StatusCode, body: &str) -> HttpOutcome {
        Ok(ResponseBuilder::with_status(status)
            .body(body.as_bytes().to_vec())
            .build())
    }

    #[test]
    fn success_unwraps_data() {
        let payload = normalize(
            ok(StatusCode::Ok, json!({ "success": true, "message": "done", "data": { "trip_id": "T1" } })),
            ApiOperation::Create,
        )
        .unwrap();

        assert_eq!(payload.message.as_deref(), Some("done"));
        let snapshot = payload.snapshot().unwrap().unwrap();
        assert_eq!(snapshot.trip_id.as_deref(), Some("T1"));
    }

    #[test]
    fn missing_data_is_not_an_error() {
        let payload = normalize(ok(StatusCode::Ok, json!({ "success": true })), ApiOperation::Manage).unwrap();
        assert_eq!(payload.snapshot().unwrap(), None);
    }

    #[test]
    fn http_error_uses_detail() {
        let err = normalize(
            ok(StatusCode::InternalServerError, json!({ "detail": "boom" })),
            ApiOperation::Manage,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ClientError::Http {
                status: 500,
                reason: "boom".into()
            }
        );
    }

    #[test]
    fn http_error_without_detail() {
        let err = normalize(raw(StatusCode::BadGateway, "<html>bad gateway</html>"), ApiOperation::Query)
            .unwrap_err();
        assert_eq!(err.reason(), "HTTP 502");

        let err = normalize(ok(StatusCode::NotFound, json!({ "success": false })), ApiOperation::Query)
            .unwrap_err();
        assert_eq!(err.reason(), "HTTP 404");
    }

    #[test]
    fn status_error_keeps_body() {
        let outcome = Err(HttpError::Http {
            code: StatusCode::UnprocessableEntity,
            message: "Unprocessable Entity".into(),
            body: Some(br#"{"detail":"route too short"}"#.to_vec()),
        });
        let err = normalize(outcome, ApiOperation::Create).unwrap_err();
        assert_eq!(
            err,
            ClientError::Http {
                status: 422,
                reason: "route too short".into()
            }
        );
    }

    #[test]
    fn unparseable_body_fails() {
        let err = normalize(raw(StatusCode::Ok, "not json"), ApiOperation::Create).unwrap_err();
        assert!(matches!(err, ClientError::MalformedResponse { .. }));

        let err = normalize(ok(StatusCode::Ok, json!([1, 2, 3])), ApiOperation::Create).unwrap_err();
        assert!(matches!(err, ClientError::MalformedResponse { .. }));
    }

    #[test]
    fn application_failure_uses_message_or_fallback() {
        let err = normalize(
            ok(StatusCode::Ok, json!({ "success": false, "message": "trip exists" })),
            ApiOperation::Create,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ClientError::Application {
                message: "trip exists".into()
            }
        );

        let err = normalize(ok(StatusCode::Ok, json!({ "data": {} })), ApiOperation::Query).unwrap_err();
        assert_eq!(err.reason(), "contract not found");
    }

    #[test]
    fn transport_failure_surfaces_message() {
        let err = normalize(
            Err(HttpError::Io("dns error: no such host".into())),
            ApiOperation::Query,
        )
        .unwrap_err();

        assert!(matches!(err, ClientError::Transport { .. }));
        assert!(err.reason().contains("no such host"));

        let err = normalize(Err(HttpError::Timeout), ApiOperation::Manage).unwrap_err();
        assert!(matches!(err, ClientError::Transport { .. }));
    }

    #[test]
    fn malformed_snapshot_data() {
        let payload = normalize(
            ok(StatusCode::Ok, json!({ "success": true, "data": "not an object" })),
            ApiOperation::Query,
        )
        .unwrap();
        assert!(matches!(payload.snapshot(), Err(ClientError::MalformedResponse { .. })));
    }

    #[test]
    fn health_reads_body_on_any_status() {
        let report =
            normalize_health(ok(StatusCode::ServiceUnavailable, json!({ "status": "unhealthy" }))).unwrap();
        assert!(!report.is_healthy());

        let report = normalize_health(ok(
            StatusCode::Ok,
            json!({ "status": "healthy", "stellar_connected": true }),
        ))
        .unwrap();
        assert!(report.is_healthy());
        assert_eq!(report.extra["stellar_connected"], true);

        assert!(matches!(
            normalize_health(raw(StatusCode::ServiceUnavailable, "down")),
            Err(ClientError::Http { status: 503, .. })
        ));
    }
}
