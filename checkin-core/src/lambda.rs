/*
 * This file is part of the IVMS Online.
 *
 * @copyright 2023 © by Rafał Wrzeszcz - Wrzasq.pl.
 */

use crate::api_error::ApiError;
use lambda_http::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
};
use lambda_http::http::{Method, StatusCode};
use lambda_http::{Body, Error, Request, Response};
use serde::Serialize;
use serde_json::{json, to_string, to_value, Value};
use std::future::Future;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// JSON payload with the status code it should be sent with.
#[derive(Debug)]
pub struct JsonResponse {
    status: StatusCode,
    body: Value,
}

impl JsonResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    pub fn ok<T: Serialize>(body: &T) -> Result<Self, ApiError> {
        Ok(Self::new(StatusCode::OK, to_value(body)?))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &Value {
        &self.body
    }
}

impl From<ApiError> for JsonResponse {
    fn from(error: ApiError) -> Self {
        Self::new(
            error.status_code(),
            json!({
                "status": "error",
                "message": error.to_string(),
            }),
        )
    }
}

pub fn setup_tracing() {
    let result = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_current_span(false)
        .with_target(false)
        .without_time()
        .try_init();

    if let Err(error) = result {
        eprintln!("Tracing already initialized: {error}");
    }
}

/// Handles CORS pre-flight and method filtering, then renders the handler result as JSON.
pub async fn dispatch<F, Fut>(method: Method, request: Request, handler: &F) -> Result<Response<Body>, Error>
where
    F: Fn(Request) -> Fut,
    Fut: Future<Output = Result<JsonResponse, ApiError>>,
{
    let allowed_methods = format!("{method},{}", Method::OPTIONS);

    let result = if request.method() == Method::OPTIONS {
        Ok(JsonResponse::new(StatusCode::OK, json!({ "ok": true })))
    } else if request.method() != method {
        Err(ApiError::MethodNotAllowed(request.method().to_string()))
    } else {
        handler(request).await
    };

    let response = result.unwrap_or_else(|api_error| {
        if api_error.status_code().is_server_error() {
            error!(error = %api_error, "Request failed.");
        } else {
            warn!(error = %api_error, "Request rejected.");
        }
        JsonResponse::from(api_error)
    });
    info!(status = response.status.as_u16(), "Responding.");

    Ok(Response::builder()
        .status(response.status)
        .header(CONTENT_TYPE, "application/json; charset=utf-8")
        .header(ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(ACCESS_CONTROL_ALLOW_METHODS, allowed_methods)
        .header(ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type")
        .body(Body::Text(to_string(&response.body)?))?)
}

/// Runs the HTTP handler loop; the handler may borrow resources initialized once per process.
#[macro_export]
macro_rules! run_lambda {
    ($method:expr, $handler:expr) => {{
        let handler = $handler;
        let handler = &handler;

        lambda_http::run(lambda_http::service_fn(move |request: lambda_http::Request| {
            $crate::dispatch($method, request, handler)
        }))
        .await
    }};
}
