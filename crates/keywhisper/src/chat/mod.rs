// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat transport: private-message delivery and operator commands.

pub mod irc;

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

/// Sends a private message to a single recipient.
///
/// Object-safe for use as `Arc<dyn Whisperer>`.
pub trait Whisperer: Send + Sync {
    fn whisper<'a>(
        &'a self,
        recipient: &'a str,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}

/// Posts a line to a joined channel.
pub trait ChannelSender: Send + Sync {
    fn say<'a>(
        &'a self,
        channel: &'a str,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}

/// Whisperer bound after construction.
///
/// The distributor is prepared before the chat connection exists; deliveries
/// fail until a transport is attached.
#[derive(Default)]
pub struct WhisperSlot {
    inner: OnceLock<Arc<dyn Whisperer>>,
}

impl WhisperSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the transport. Returns false if one was already bound.
    pub fn attach(&self, whisperer: Arc<dyn Whisperer>) -> bool {
        self.inner.set(whisperer).is_ok()
    }
}

impl Whisperer for WhisperSlot {
    fn whisper<'a>(
        &'a self,
        recipient: &'a str,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            match self.inner.get() {
                Some(w) => w.whisper(recipient, text).await,
                None => anyhow::bail!("chat is not connected"),
            }
        })
    }
}

/// A chat line addressed to a channel the bot has joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub channel: String,
    pub sender: String,
    pub text: String,
}

/// Operator commands recognised in channel chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    /// `!spgsend`: start the distribution run.
    Send,
    /// `!spgstatus`: post the status report.
    Status,
}

impl ChatCommand {
    /// Case-insensitive prefix match on the message text.
    pub fn parse(text: &str) -> Option<Self> {
        let lower = text.trim_start().to_lowercase();
        if lower.starts_with("!spgsend") {
            Some(Self::Send)
        } else if lower.starts_with("!spgstatus") {
            Some(Self::Status)
        } else {
            None
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
