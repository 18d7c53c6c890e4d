/*
 * This file is part of the IVMS Online.
 *
 * @copyright 2023 © by Rafał Wrzeszcz - Wrzasq.pl.
 */

use checkin_core::{run_lambda, setup_tracing, ApiError, JsonResponse};
use lambda_http::http::{Method, StatusCode};
use lambda_http::{Error, Request, RequestExt};
use reqwest::Client;
use serde_json::Value;
use std::env::var;
use tokio::main as tokio_main;
use tracing::{info, warn};
use url::Url;

const API_KEY_VARIABLE: &str = "GOOGLE_API_KEY";
const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api";
const DEFAULT_LANGUAGE: &str = "fr";

const ENDPOINT_PARAM: &str = "endpoint";
const KEY_PARAM: &str = "key";
const LANGUAGE_PARAM: &str = "language";

const ENDPOINTS: [(&str, &str); 4] = [
    ("autocomplete", "place/autocomplete/json"),
    ("details", "place/details/json"),
    ("geocode", "geocode/json"),
    ("directions", "directions/json"),
];

fn upstream_path(endpoint: &str) -> Option<&'static str> {
    ENDPOINTS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(endpoint))
        .map(|(_, path)| *path)
}

struct PlacesProxy {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    default_language: String,
}

/**
Required environment variables:
<dl>
    <dt><code>GOOGLE_API_KEY</code></dt>
    <dd>Maps platform key injected into every upstream request.</dd>
</dl>

Optional environment variables:
<dl>
    <dt><code>PLACES_API_BASE_URL</code></dt>
    <dd>Upstream API root, defaults to <code>https://maps.googleapis.com/maps/api</code>.</dd>
    <dt><code>PLACES_DEFAULT_LANGUAGE</code></dt>
    <dd>Language used when the caller does not request one, defaults to <code>fr</code>.</dd>
</dl>
 */
impl PlacesProxy {
    fn load_from_env() -> Result<Self, Error> {
        let api_key = var(API_KEY_VARIABLE).ok().filter(|key| !key.is_empty());
        if api_key.is_none() {
            warn!("{API_KEY_VARIABLE} is not set, all requests will fail.");
        }

        Ok(Self::new(
            Client::builder()
                .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
                .build()?,
            var("PLACES_API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            api_key,
            var("PLACES_DEFAULT_LANGUAGE").unwrap_or_else(|_| DEFAULT_LANGUAGE.into()),
        ))
    }

    fn new(client: Client, base_url: String, api_key: Option<String>, default_language: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').into(),
            api_key,
            default_language,
        }
    }

    fn upstream_url(&self, params: &[(String, String)]) -> Result<Url, ApiError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ApiError::MissingCredential(API_KEY_VARIABLE))?;

        let endpoint = params
            .iter()
            .find(|(name, _)| name == ENDPOINT_PARAM)
            .map(|(_, value)| value.as_str())
            .unwrap_or_default();
        let path = upstream_path(endpoint).ok_or_else(|| ApiError::UnknownEndpoint {
            endpoint: endpoint.into(),
            allowed: ENDPOINTS.map(|(name, _)| name).join("|"),
        })?;

        let mut forwarded = params
            .iter()
            .filter(|(name, _)| name != ENDPOINT_PARAM && name != KEY_PARAM)
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect::<Vec<_>>();
        forwarded.push((KEY_PARAM, api_key));
        if !forwarded.iter().any(|(name, _)| *name == LANGUAGE_PARAM) {
            forwarded.push((LANGUAGE_PARAM, self.default_language.as_str()));
        }

        Url::parse_with_params(&format!("{}/{path}", self.base_url), forwarded)
            .map_err(|error| ApiError::UpstreamError(error.to_string()))
    }

    async fn forward(&self, params: Vec<(String, String)>) -> Result<JsonResponse, ApiError> {
        let url = self.upstream_url(&params)?;
        info!(path = url.path(), "Forwarding request.");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| ApiError::UpstreamError(error.to_string()))?;
        let upstream_status = response.status().as_u16();
        let body = response
            .json::<Value>()
            .await
            .map_err(|error| ApiError::UpstreamError(error.to_string()))?;

        // upstream failures are reported inside the JSON body, callers always get 200
        info!(upstream_status, "Upstream responded.");
        Ok(JsonResponse::new(StatusCode::OK, body))
    }
}

#[tokio_main]
async fn main() -> Result<(), Error> {
    setup_tracing();

    let proxy = &PlacesProxy::load_from_env()?;

    run_lambda!(Method::GET, move |request: Request| async move {
        let params = request
            .query_string_parameters()
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        proxy.forward(params).await
    })
}
