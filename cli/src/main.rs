use std::collections::VecDeque;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use crux_core::Core;
use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};
use crux_http::HttpError;
use tracing::{debug, info};
use waybill::{
    ApiBase, App, ClientConfig, Effect, Event, LogAppendPolicy, OutputKind, TripEvent, TripForm,
    ViewModel, DEFAULT_API_URL,
};

/// Drive a trip contract through the contract API from the command line.
///
/// Steps run in order against one client session, so `create depart arrive`
/// registers the trip before updating it.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Base URL of the contract API.
    #[arg(long, env = "WAYBILL_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// `append-latest` or `deduplicate`.
    #[arg(long, env = "WAYBILL_LOG_POLICY", default_value = "append-latest")]
    log_policy: LogAppendPolicy,

    /// Trip to work on. Without it, `create` registers the example trip.
    #[arg(long)]
    trip_id: Option<String>,

    #[arg(long, default_value = "")]
    driver: String,

    #[arg(long, default_value = "")]
    origin: String,

    #[arg(long, default_value = "")]
    destination: String,

    /// Event name for `manage` steps.
    #[arg(long, default_value = "departure")]
    event: String,

    /// Status label for `manage` steps.
    #[arg(long, default_value = "ok")]
    status: String,

    #[arg(value_enum, required = true)]
    steps: Vec<Step>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Health,
    Create,
    Depart,
    Midpoint,
    Arrive,
    Manage,
    View,
    /// create, depart, midpoint, arrive, view
    Run,
}

impl Step {
    fn expand(self) -> Vec<Step> {
        match self {
            Step::Run => vec![
                Step::Create,
                Step::Depart,
                Step::Midpoint,
                Step::Arrive,
                Step::View,
            ],
            step => vec![step],
        }
    }
}

struct Shell {
    core: Core<Effect, App>,
    client: reqwest::Client,
    printed_up_to: u64,
}

impl Shell {
    fn new() -> Self {
        Self {
            core: Core::new::<waybill::Capabilities>(),
            client: reqwest::Client::new(),
            printed_up_to: 0,
        }
    }

    /// Processes an event and every effect it leads to, then prints the
    /// output entries it produced. Returns how many of them were errors.
    async fn dispatch(&mut self, event: Event) -> anyhow::Result<usize> {
        debug!(event = event.name(), "dispatching");

        let mut queue: VecDeque<Effect> = self.core.process_event(event).into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Render(_) => {}
                Effect::Http(mut request) => {
                    let result = execute(&self.client, &request.operation).await;
                    queue.extend(self.core.resolve(&mut request, result));
                }
            }
        }

        self.print_new_output()
    }

    fn print_new_output(&mut self) -> anyhow::Result<usize> {
        let view = self.core.view();
        let already_printed = self.printed_up_to;
        let mut errors = 0;

        for entry in view.output.iter().rev().filter(|e| e.id > already_printed) {
            if entry.kind == OutputKind::Error {
                errors += 1;
            }
            println!("== {} ==", entry.title);
            println!("{}", serde_json::to_string_pretty(&entry.body)?);
            self.printed_up_to = entry.id;
        }
        Ok(errors)
    }

    fn view(&self) -> ViewModel {
        self.core.view()
    }
}

async fn execute(client: &reqwest::Client, request: &HttpRequest) -> HttpResult {
    match send(client, request).await {
        Ok(response) => HttpResult::Ok(response),
        Err(e) => {
            debug!(error = %e, url = %request.url, "request failed");
            HttpResult::Err(e)
        }
    }
}

/// Performs the request. Anything that keeps a full response from arriving,
/// including a body cut short, is reported as a transport error.
async fn send(client: &reqwest::Client, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
    let method = reqwest::Method::from_bytes(request.method.as_bytes())
        .map_err(|e| HttpError::Io(format!("method {}: {e}", request.method)))?;

    let mut builder = client.request(method, request.url.as_str());
    for header in &request.headers {
        builder = builder.header(header.name.as_str(), header.value.as_str());
    }
    if !request.body.is_empty() {
        builder = builder.body(request.body.clone());
    }

    let response = builder.send().await.map_err(transport_error)?;

    let status = response.status().as_u16();
    let mut reply = HttpResponse::status(status);
    for (name, value) in response.headers() {
        if let Ok(value) = value.to_str() {
            reply.header(name.as_str(), value);
        }
    }

    let body = response.bytes().await.map_err(transport_error)?;
    debug!(status, bytes = body.len(), url = %request.url, "response received");
    Ok(reply.body(body.to_vec()).build())
}

fn transport_error(e: reqwest::Error) -> HttpError {
    if e.is_timeout() {
        HttpError::Timeout
    } else {
        HttpError::Io(e.to_string())
    }
}

fn step_event(step: Step, args: &Args) -> Event {
    match step {
        Step::Health => Event::CheckHealth,
        Step::Create => Event::CreateContract,
        Step::Depart => Event::MarkDeparture,
        Step::Midpoint => Event::MarkMidpoint,
        Step::Arrive => Event::MarkArrival,
        Step::Manage => Event::ManageContract {
            event: TripEvent::from(args.event.as_str()),
            status: args.status.clone(),
        },
        Step::View | Step::Run => Event::ViewContract,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let args = Args::parse();
    let base = ApiBase::parse(args.api_url.as_str()).context("WAYBILL_API_URL")?;
    let config = ClientConfig::new(base).with_log_policy(args.log_policy);
    info!(base = %config.base, policy = ?config.log_policy, "starting session");

    let mut shell = Shell::new();
    let mut errors = shell.dispatch(Event::Configure(config)).await?;

    if let Some(trip_id) = &args.trip_id {
        let form = TripForm {
            trip_id: trip_id.clone(),
            driver: args.driver.clone(),
            origin: args.origin.clone(),
            destination: args.destination.clone(),
        };
        errors += shell.dispatch(Event::TripFormSaved(form)).await?;
    }

    for step in args.steps.iter().flat_map(|step| step.expand()) {
        errors += shell.dispatch(step_event(step, &args)).await?;
    }

    let view = shell.view();
    println!("== Trip ==");
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "phase": view.phase,
            "summary": view.summary,
            "event_log": view.event_log,
            "api_healthy": view.api_healthy,
        }))?
    );

    if errors > 0 {
        anyhow::bail!("{errors} step(s) failed");
    }
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,waybill=debug".into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn get(url: String) -> HttpRequest {
        HttpRequest {
            method: "GET".into(),
            url,
            headers: vec![],
            body: vec![],
        }
    }

    /// Serves one connection with `reply` and hangs up.
    async fn serve_once(reply: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            socket.read(&mut buf).await.unwrap();
            socket.write_all(reply).await.unwrap();
        });
        format!("http://{addr}/health")
    }

    #[tokio::test]
    async fn passes_status_and_body_through() {
        let url = serve_once(
            b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 22\r\nConnection: close\r\n\r\n{\"status\":\"unhealthy\"}",
        )
        .await;

        match execute(&reqwest::Client::new(), &get(url)).await {
            HttpResult::Ok(response) => {
                assert_eq!(response.status, 503);
                assert_eq!(response.body, br#"{"status":"unhealthy"}"#.to_vec());
            }
            HttpResult::Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[tokio::test]
    async fn truncated_body_is_a_transport_error() {
        let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n{\"succ").await;

        let result = execute(&reqwest::Client::new(), &get(url)).await;
        assert!(matches!(result, HttpResult::Err(HttpError::Io(_))));
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = execute(&reqwest::Client::new(), &get(format!("http://{addr}/health"))).await;
        assert!(matches!(result, HttpResult::Err(HttpError::Io(_))));
    }
}
