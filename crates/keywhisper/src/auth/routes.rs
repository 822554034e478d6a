// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Callback listener routes.
//!
//! Implicit-grant tokens arrive in the URL fragment, which browsers never
//! send to a server. `/` serves a bridge page that reads the fragment and
//! POSTs it back to `/auth-token`, where the session is resolved.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{Request, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, debug_span, error, info, warn, Span};

use crate::auth::csrf::CsrfToken;
use crate::auth::AccessToken;
use crate::error::AuthError;

/// Embedded fragment bridge page.
const BRIDGE_HTML: &str = include_str!("bridge.html");

const NOT_FOUND_TEXT: &str = "Error 404 - Not Found\nNothing to see here.";

const SUCCESS_TEXT: &str = "Authorisation successful, you may now close this page!";

pub type Outcome = Result<AccessToken, AuthError>;

enum Session {
    Pending(oneshot::Sender<Outcome>),
    Resolved,
}

/// Shared state of one authorization attempt.
pub struct GatewayState {
    csrf: CsrfToken,
    session: Mutex<Session>,
    shutdown: CancellationToken,
}

impl GatewayState {
    pub fn new(
        csrf: CsrfToken,
        result_tx: oneshot::Sender<Outcome>,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self { csrf, session: Mutex::new(Session::Pending(result_tx)), shutdown })
    }

    /// Claim the session. Only the first caller gets the sender.
    fn claim(&self) -> Option<oneshot::Sender<Outcome>> {
        match std::mem::replace(&mut *self.session.lock(), Session::Resolved) {
            Session::Pending(tx) => Some(tx),
            Session::Resolved => None,
        }
    }

    /// Deliver the outcome and stop the listener.
    fn resolve(&self, tx: oneshot::Sender<Outcome>, outcome: Outcome) {
        if tx.send(outcome).is_err() {
            debug!("authorization result dropped, nobody is waiting");
        }
        info!("stopping the callback listener");
        self.shutdown.cancel();
    }
}

/// Build the callback router.
pub fn build_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/", get(bridge_page).fallback(not_found))
        .route("/auth-token", post(auth_token).fallback(not_found))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}

/// Request span without the query string, which carries the token and state.
fn request_span(req: &Request<Body>) -> Span {
    debug_span!("request", method = %req.method(), path = req.uri().path())
}

/// `GET /`: the fragment bridge page.
async fn bridge_page() -> Html<&'static str> {
    debug!("serving the fragment bridge page");
    Html(BRIDGE_HTML)
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, NOT_FOUND_TEXT).into_response()
}

/// `POST /auth-token`: validate the forwarded fragment and resolve the session.
async fn auth_token(
    State(s): State<Arc<GatewayState>>,
    Query(mut params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    merge_json_body(&mut params, &body);

    let Some(tx) = s.claim() else {
        warn!("callback received after the session was resolved, ignoring");
        return not_found().await;
    };

    let (status, text, outcome) = evaluate(&s.csrf, &params);
    s.resolve(tx, outcome);
    (status, text).into_response()
}

/// Decide the response and session outcome for a callback.
///
/// CSRF is checked first: a mismatched `state` fails regardless of anything
/// else present. A provider `error` wins over an `access_token`.
fn evaluate(csrf: &CsrfToken, params: &HashMap<String, String>) -> (StatusCode, String, Outcome) {
    let state = params.get("state").map(String::as_str).unwrap_or_default();
    if !csrf.matches(state) {
        error!("CSRF token mismatch, the callback may be forged");
        let text = "Authorisation failed!\nCSRF token mismatch! This could mean (but does not \
                    prove) that you have been targeted by a cross-site request forgery.";
        return (StatusCode::INTERNAL_SERVER_ERROR, text.to_owned(), Err(AuthError::CsrfMismatch));
    }

    if let Some(error) = params.get("error").filter(|e| !e.is_empty()) {
        let description = params.get("error_description").cloned().unwrap_or_default();
        error!(error = %error, description = %description, "provider denied authorization");
        let text = format!("Authorisation failed!\nError: {error}\nDescription: {description}");
        let outcome = Err(AuthError::ProviderDenied { error: error.clone(), description });
        return (StatusCode::BAD_REQUEST, text, outcome);
    }

    match params.get("access_token").filter(|t| !t.is_empty()) {
        Some(token) => {
            info!(
                token_type = params.get("token_type").map(String::as_str).unwrap_or("unknown"),
                scope = params.get("scope").map(String::as_str).unwrap_or_default(),
                "auth token looks good"
            );
            (StatusCode::OK, SUCCESS_TEXT.to_owned(), Ok(AccessToken::new(token.clone())))
        }
        None => {
            error!("callback carried no access token");
            let text = "Authorisation failed!\nNo access token was received.";
            (StatusCode::BAD_REQUEST, text.to_owned(), Err(AuthError::MissingToken))
        }
    }
}

/// Fill keys missing from the query with string values from a JSON object body.
fn merge_json_body(params: &mut HashMap<String, String>, body: &[u8]) {
    if body.is_empty() {
        return;
    }
    let map = match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) => return,
        Err(e) => {
            debug!(err = %e, "ignoring unparseable callback body");
            return;
        }
    };
    for (key, value) in map {
        if let serde_json::Value::String(v) = value {
            params.entry(key).or_insert(v);
        }
    }
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
