/*
 * This file is part of the IVMS Online.
 *
 * @copyright 2023 © by Rafał Wrzeszcz - Wrzasq.pl.
 */

use checkin_core::{
    run_lambda, setup_tracing, ApiError, CheckinDao, CheckinRecorder, CheckinSubmission, JsonResponse,
    SuppressionPolicy,
};
use chrono::Utc;
use lambda_http::http::{HeaderMap, Method};
use lambda_http::{Body, Error, Request};
use serde::Deserialize;
use serde_json::from_slice;
use tokio::main as tokio_main;
use tracing::info;

const UNKNOWN_CLIENT_IP: &str = "unknown";

#[derive(Deserialize)]
struct Payload {
    vehicle_id: Option<String>,
    date: Option<String>,
    time: Option<String>,
    amount: Option<f64>,
    device_id: Option<String>,
    #[serde(alias = "ip")]
    client_ip: Option<String>,
    valid_month: Option<String>,
    #[serde(default, alias = "isCheckOnly", alias = "checkOnly")]
    dry_run: bool,
}

impl Payload {
    fn parse(body: &Body) -> Result<Self, ApiError> {
        let bytes: &[u8] = body.as_ref();
        let bytes: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            bytes
        };

        from_slice(bytes).map_err(|error| ApiError::MalformedBody(error.to_string()))
    }

    fn into_submission(self, headers: &HeaderMap) -> CheckinSubmission {
        CheckinSubmission {
            client_ip: resolve_client_ip(self.client_ip, headers),
            vehicle_id: self.vehicle_id,
            date: self.date,
            time: self.time,
            amount: self.amount.unwrap_or_default(),
            device_id: self.device_id,
            valid_month: self.valid_month,
            dry_run: self.dry_run,
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
}

/// Explicit payload value wins over the proxy headers.
fn resolve_client_ip(explicit: Option<String>, headers: &HeaderMap) -> String {
    explicit
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| header_value(headers, "x-forwarded-for"))
        .or_else(|| header_value(headers, "client-ip"))
        .unwrap_or_else(|| UNKNOWN_CLIENT_IP.into())
}

#[tokio_main]
async fn main() -> Result<(), Error> {
    setup_tracing();

    let dao = &CheckinDao::load_from_env().await?;
    let policy = &SuppressionPolicy::load_from_env()?;
    info!(window = %policy.window(), "Check-in recorder initialized.");

    run_lambda!(Method::POST, move |request: Request| async move {
        let submission = Payload::parse(request.body())?.into_submission(request.headers());

        CheckinRecorder::new(dao, policy)
            .record(submission, Utc::now())
            .await
            .and_then(|outcome| JsonResponse::ok(&outcome))
    })
}
