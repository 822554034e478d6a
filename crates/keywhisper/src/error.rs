// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io;
use std::path::PathBuf;

/// Failures of the record files and the distribution run.
///
/// Every variant leaves the on-disk record state consistent with what was
/// actually delivered, so the caller can always resume by running again.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A record file could not be read. Fatal for the whole run.
    #[error("cannot load {}: {}", .path.display(), unavailable_reason(.not_found))]
    FileUnavailable {
        path: PathBuf,
        not_found: bool,
        #[source]
        source: io::Error,
    },

    /// Fewer unconsumed codes than unconsumed recipients.
    #[error("not enough codes for all recipients: have {have}, need {need}")]
    InsufficientSupply { have: usize, need: usize },

    /// The transport rejected a send. Nothing was marked for this pair.
    #[error("delivery to {recipient:?} (line {line}) failed")]
    DeliveryFailed {
        recipient: String,
        line: usize,
        #[source]
        source: anyhow::Error,
    },

    /// A record file could not be rewritten after a successful send.
    #[error("cannot rewrite {}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no record at index {index}")]
    UnknownRecord { index: usize },

    /// `run()` was triggered while a previous run is still delivering.
    #[error("a distribution run is already in progress")]
    AlreadyRunning,
}

impl Error {
    /// Build a [`Error::FileUnavailable`], distinguishing a missing file from other I/O failures.
    pub fn file_unavailable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let not_found = source.kind() == io::ErrorKind::NotFound;
        Self::FileUnavailable { path: path.into(), not_found, source }
    }
}

fn unavailable_reason(not_found: &bool) -> &'static str {
    if *not_found {
        "the file does not appear to exist"
    } else {
        "read failed"
    }
}

/// Ways an authorization attempt can end without a token.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The callback's `state` did not match the minted CSRF token.
    #[error("CSRF token mismatch, the callback cannot be trusted")]
    CsrfMismatch,

    /// The identity provider reported an error instead of a token.
    #[error("authorization denied by provider: {error} ({description})")]
    ProviderDenied { error: String, description: String },

    /// `state` matched and no error was reported, but no token was present.
    #[error("callback carried no access token")]
    MissingToken,

    /// The caller cancelled the attempt before a callback arrived.
    #[error("authorization cancelled")]
    Cancelled,

    #[error("cannot listen on {addr}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid callback URL {url:?}: {reason}")]
    InvalidCallbackUrl { url: String, reason: String },

    #[error("system random source unavailable")]
    Entropy,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
