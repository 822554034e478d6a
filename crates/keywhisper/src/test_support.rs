// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for unit and integration tests.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::chat::{ChannelSender, Whisperer};
use crate::distributor::DistributorConfig;

/// In-memory [`Whisperer`] that records every message it is asked to send.
///
/// With [`RecordingWhisperer::failing_at`], the n-th send (0-based) fails
/// and is not recorded.
#[derive(Default)]
pub struct RecordingWhisperer {
    sent: Mutex<Vec<(String, String)>>,
    attempts: Mutex<usize>,
    fail_at: Option<usize>,
}

impl RecordingWhisperer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(n: usize) -> Self {
        Self { fail_at: Some(n), ..Self::default() }
    }

    /// `(recipient, text)` pairs in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

impl Whisperer for RecordingWhisperer {
    fn whisper<'a>(
        &'a self,
        recipient: &'a str,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let attempt = {
                let mut attempts = self.attempts.lock();
                *attempts += 1;
                *attempts - 1
            };
            if self.fail_at == Some(attempt) {
                anyhow::bail!("transport refused message to {recipient}");
            }
            self.sent.lock().push((recipient.to_owned(), text.to_owned()));
            Ok(())
        })
    }
}

/// In-memory [`ChannelSender`] that records channel posts.
#[derive(Default)]
pub struct RecordingChat {
    said: Mutex<Vec<(String, String)>>,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(channel, text)` pairs in post order.
    pub fn said(&self) -> Vec<(String, String)> {
        self.said.lock().clone()
    }
}

impl ChannelSender for RecordingChat {
    fn say<'a>(
        &'a self,
        channel: &'a str,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.said.lock().push((channel.to_owned(), text.to_owned()));
            Ok(())
        })
    }
}

/// In-memory log sink for asserting on what gets logged.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain-text subscriber at TRACE level writing into this capture.
    /// Install it with `tracing::subscriber::set_default`.
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        let sink = self.clone();
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Record files written into a temporary directory.
pub struct RecordFiles {
    pub dir: tempfile::TempDir,
    pub recipients: PathBuf,
    pub codes: PathBuf,
}

impl RecordFiles {
    pub fn new(recipients: &str, codes: &str) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let recipients_path = dir.path().join("users.txt");
        let codes_path = dir.path().join("keys.txt");
        std::fs::write(&recipients_path, recipients)?;
        std::fs::write(&codes_path, codes)?;
        Ok(Self { dir, recipients: recipients_path, codes: codes_path })
    }

    /// Distributor config over these files with no pacing delay.
    pub fn config(&self, template: &str) -> DistributorConfig {
        DistributorConfig {
            recipients_path: self.recipients.clone(),
            codes_path: self.codes.clone(),
            template: template.to_owned(),
            pace: std::time::Duration::ZERO,
        }
    }

    pub fn read(path: &Path) -> anyhow::Result<String> {
        Ok(std::fs::read_to_string(path)?)
    }
}

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
