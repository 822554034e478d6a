// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authorize URL construction and callback address parsing.

use axum::http::Uri;

use crate::error::AuthError;

/// Build the implicit-grant authorize URL.
///
/// Parameter order: client_id, force_verify, redirect_uri, response_type, scope, state.
pub fn build_authorize_url(
    authorize_endpoint: &str,
    client_id: &str,
    redirect_uri: &str,
    scope: &str,
    state: &str,
) -> String {
    format!(
        "{authorize_endpoint}?client_id={client_id}\
         &force_verify=false\
         &redirect_uri={redirect_uri}\
         &response_type=token\
         &scope={scope}\
         &state={state}",
        client_id = urlencoding(client_id),
        redirect_uri = urlencoding(redirect_uri),
        scope = urlencoding(scope),
        state = urlencoding(state),
    )
}

/// The authorize URL with the `state` value elided, for logging.
pub fn redact_state(url: &str) -> String {
    match url.split_once("&state=") {
        Some((head, _)) => format!("{head}&state=..."),
        None => url.to_owned(),
    }
}

/// Resolve the `host:port` the callback listener binds to.
///
/// Only plain `http` callbacks are served; a missing port means 80.
pub fn callback_bind_addr(callback_url: &str) -> Result<String, AuthError> {
    let invalid = |reason: &str| AuthError::InvalidCallbackUrl {
        url: callback_url.to_owned(),
        reason: reason.to_owned(),
    };

    let uri: Uri = callback_url.parse().map_err(|_| invalid("not a valid URL"))?;
    match uri.scheme_str() {
        Some("http") => {}
        Some(other) => return Err(invalid(&format!("unsupported scheme {other:?}"))),
        None => return Err(invalid("missing scheme")),
    }
    let host = uri.host().filter(|h| !h.is_empty()).ok_or_else(|| invalid("missing host"))?;
    let port = uri.port_u16().unwrap_or(80);
    Ok(format!("{host}:{port}"))
}

/// Form-style encoding for URL query parameters (spaces as `+`).
fn urlencoding(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push(char::from(HEX[(b >> 4) as usize]));
                out.push(char::from(HEX[(b & 0xf) as usize]));
            }
        }
    }
    out
}

const HEX: &[u8; 16] = b"0123456789ABCDEF";

#[cfg(test)]
#[path = "url_tests.rs"]
mod tests;
