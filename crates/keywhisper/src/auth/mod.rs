// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authorization gateway: OAuth2 implicit grant through a local callback listener.
//!
//! `start()` mints a CSRF token, binds the listener from the callback URL and
//! opens the provider's authorize page in a browser. The returned
//! [`AuthHandle`] owns the listener: it is stopped when the session resolves,
//! when the handle is cancelled, or when the handle is dropped.

pub mod csrf;
pub mod routes;
pub mod url;

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::csrf::CsrfToken;
use crate::auth::routes::{build_router, GatewayState, Outcome};
use crate::error::AuthError;

/// Default provider authorize endpoint.
pub const TWITCH_AUTHORIZE_URL: &str = "https://id.twitch.tv/oauth2/authorize";

/// Upper bound on waiting for in-flight callback connections to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Bearer token obtained from the provider.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

/// Provider and callback settings for one gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub client_id: String,
    /// Where the provider redirects; the listener binds to its host and port.
    pub callback_url: String,
    /// Space-separated scopes.
    pub scopes: String,
    pub authorize_endpoint: String,
}

/// Opens the authorize URL for the user.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> anyhow::Result<()>;
}

/// Launches the platform's default browser.
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> anyhow::Result<()> {
        // On macOS use `open`, on Windows `start`, elsewhere `xdg-open`.
        let mut cmd = if cfg!(target_os = "macos") {
            std::process::Command::new("open")
        } else if cfg!(target_os = "windows") {
            let mut c = std::process::Command::new("cmd");
            c.args(["/C", "start", ""]);
            c
        } else {
            std::process::Command::new("xdg-open")
        };
        cmd.arg(url).spawn()?;
        Ok(())
    }
}

/// Prints the URL instead of launching anything.
pub struct ManualBrowser;

impl BrowserLauncher for ManualBrowser {
    fn open(&self, url: &str) -> anyhow::Result<()> {
        eprintln!("Open this URL in a browser to authorize the bot:\n  {url}");
        Ok(())
    }
}

/// Starts authorization attempts. Holds no state between attempts.
pub struct AuthGateway {
    config: GatewayConfig,
    browser: Box<dyn BrowserLauncher>,
}

impl AuthGateway {
    pub fn new(config: GatewayConfig, browser: Box<dyn BrowserLauncher>) -> Self {
        Self { config, browser }
    }

    /// Begin a fresh attempt: new CSRF token, new listener, browser opened.
    pub async fn start(&self) -> Result<AuthHandle, AuthError> {
        let bind_addr = url::callback_bind_addr(&self.config.callback_url)?;
        let csrf = CsrfToken::mint()?;
        let authorize_url = url::build_authorize_url(
            &self.config.authorize_endpoint,
            &self.config.client_id,
            &self.config.callback_url,
            &self.config.scopes,
            csrf.as_str(),
        );

        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| AuthError::Bind { addr: bind_addr.clone(), source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| AuthError::Bind { addr: bind_addr.clone(), source })?;

        let shutdown = CancellationToken::new();
        let (result_tx, result_rx) = oneshot::channel();
        let router = build_router(GatewayState::new(csrf, result_tx, shutdown.clone()));

        let signal = shutdown.clone().cancelled_owned();
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).with_graceful_shutdown(signal).await {
                warn!(err = %e, "callback listener failed");
            }
            debug!("callback listener closed");
        });
        info!(addr = %local_addr, "callback listener started");

        info!(url = %url::redact_state(&authorize_url), "opening the authorize page");
        if let Err(e) = self.browser.open(&authorize_url) {
            warn!(err = %e, "failed to launch a browser");
            eprintln!("Failed to open a browser: {e}");
            eprintln!("Open manually: {authorize_url}");
        }

        Ok(AuthHandle {
            local_addr,
            authorize_url,
            result_rx: Some(result_rx),
            shutdown,
            server: Some(server),
        })
    }

    /// Run one attempt to completion.
    pub async fn authorize(&self) -> Result<AccessToken, AuthError> {
        self.start().await?.wait().await
    }
}

/// A listening authorization attempt.
///
/// Dropping the handle stops the listener; an unresolved attempt is then lost.
pub struct AuthHandle {
    local_addr: SocketAddr,
    authorize_url: String,
    result_rx: Option<oneshot::Receiver<Outcome>>,
    shutdown: CancellationToken,
    server: Option<JoinHandle<()>>,
}

impl AuthHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn authorize_url(&self) -> &str {
        &self.authorize_url
    }

    /// Token that cancels this attempt when triggered, e.g. from a signal handler.
    pub fn cancel_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop listening. A pending [`AuthHandle::wait`] returns [`AuthError::Cancelled`].
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    /// Suspend until the callback resolves the session or the attempt is cancelled.
    ///
    /// There is no timeout: a human completes the browser flow.
    pub async fn wait(mut self) -> Result<AccessToken, AuthError> {
        let Some(mut result_rx) = self.result_rx.take() else {
            return Err(AuthError::Cancelled);
        };

        let outcome = tokio::select! {
            biased;
            r = &mut result_rx => r.unwrap_or(Err(AuthError::Cancelled)),
            _ = self.shutdown.cancelled() => {
                // A resolving callback sends before it cancels.
                result_rx.try_recv().unwrap_or(Err(AuthError::Cancelled))
            }
        };

        self.shutdown.cancel();
        if let Some(server) = self.server.take() {
            if tokio::time::timeout(DRAIN_TIMEOUT, server).await.is_err() {
                warn!("callback listener did not drain in time");
            }
        }

        match &outcome {
            Ok(_) => info!("authorization fulfilled"),
            Err(e) => warn!(err = %e, "authorization failed"),
        }
        outcome
    }
}

impl Drop for AuthHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
