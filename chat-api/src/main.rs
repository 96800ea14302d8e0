//! Chatbot Lambda - Handles the storefront chat endpoint.
//!
//! Endpoints:
//! - POST   - Answer a chat message (`{"message": "...", "sessionId": "..."}`)
//! - OPTIONS - CORS preflight
//!
//! Any other method gets a 405.

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use shared::http::{error_response, json_response, message_response, preflight_response};
use shared::{
    parse_body, Assistant, ChatRequest, Completion, CompletionClient, Config, Credentials,
    Storefront, StorefrontClient,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Body sent for every failure the caller cannot fix.
const GENERIC_ERROR: &str = "Something went wrong processing the request.";

/// Application state shared across requests.
struct AppState<S, C> {
    assistant: Assistant<S, C>,
    allowed_origin: String,
}

impl AppState<StorefrontClient, CompletionClient> {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;
        let credentials = Credentials::load().await?;
        let http_client = reqwest::Client::new();

        info!(
            store_domain = %config.store_domain,
            model = %config.completion_model,
            checkout_strategy = ?config.checkout_strategy,
            "Chatbot configured"
        );

        let storefront =
            StorefrontClient::new(http_client.clone(), &config, credentials.storefront_token);
        let completion =
            CompletionClient::new(http_client, &config, credentials.completion_api_key);

        Ok(Self {
            allowed_origin: config.allowed_origin.clone(),
            assistant: Assistant::new(storefront, completion, config),
        })
    }
}

async fn handler<S: Storefront, C: Completion>(
    state: Arc<AppState<S, C>>,
    event: Request,
) -> Result<Response<Body>, Error> {
    let origin = state.allowed_origin.as_str();

    match event.method().as_str() {
        "OPTIONS" => return preflight_response(origin),
        "POST" => {}
        method => {
            warn!(method = %method, "Method not allowed");
            return message_response(405, origin, "Method not allowed");
        }
    }

    let request: ChatRequest = parse_body!(event.body(), origin);

    if request.message().is_none() {
        return error_response(400, origin, "Message is required");
    }

    match state.assistant.respond(request).await {
        Ok(outcome) => {
            info!(
                session_id = %outcome.body.session_id,
                status = outcome.status,
                "Chat reply sent"
            );
            json_response(outcome.status, origin, &outcome.body)
        }
        Err(e) => {
            error!(error = %e, "Chat request failed");
            let status = e.status_code();
            if status == 500 {
                error_response(500, origin, GENERIC_ERROR)
            } else {
                error_response(status, origin, e.to_string())
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
