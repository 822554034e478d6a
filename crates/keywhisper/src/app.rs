// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process bootstrap and chat command dispatch.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::auth::{AuthGateway, BrowserLauncher, ManualBrowser, SystemBrowser};
use crate::chat::irc::IrcClient;
use crate::chat::{ChannelSender, ChatCommand, ChatMessage, WhisperSlot};
use crate::config::{BotConfig, Cli};
use crate::distributor::KeyDistributor;
use crate::error::Error;

/// Printed before anything else happens.
pub const MODIFICATION_WARNING: &str = "\
WARNING: the recipient and code files are modified in place.
Every delivered recipient and used code is prefixed with '#'.
Keep a copy of both files before continuing.";

/// Routes operator commands from chat to the distributor.
///
/// Each command runs on its own task, so `!spgstatus` is answered while a
/// run is still pacing.
pub struct Dispatcher {
    username: String,
    distributor: Arc<KeyDistributor>,
    chat: Arc<dyn ChannelSender>,
}

impl Dispatcher {
    pub fn new(
        username: &str,
        distributor: Arc<KeyDistributor>,
        chat: Arc<dyn ChannelSender>,
    ) -> Self {
        Self { username: username.to_lowercase(), distributor, chat }
    }

    /// Handle one chat message. Returns the task spawned for a command.
    pub fn dispatch(&self, msg: ChatMessage) -> Option<JoinHandle<()>> {
        if msg.sender.eq_ignore_ascii_case(&self.username) {
            return None;
        }
        info!(channel = %msg.channel, sender = %msg.sender, text = %msg.text, "chat");
        let command = ChatCommand::parse(&msg.text)?;
        info!(?command, sender = %msg.sender, "command received");

        let distributor = Arc::clone(&self.distributor);
        let chat = Arc::clone(&self.chat);
        Some(tokio::spawn(async move {
            let reply = match command {
                ChatCommand::Send => match distributor.run().await {
                    Ok(summary) => format!(
                        "Distribution finished, {} code(s) sent. {}",
                        summary.delivered,
                        distributor.status_report()
                    ),
                    Err(Error::AlreadyRunning) => {
                        warn!("distribution already in progress, ignoring trigger");
                        "A distribution run is already in progress.".to_owned()
                    }
                    Err(e) => {
                        error!(err = %e, "distribution run stopped");
                        "Distribution stopped, see the bot log. Send !spgsend again to resume."
                            .to_owned()
                    }
                },
                ChatCommand::Status => distributor.status_report().to_string(),
            };
            if let Err(e) = chat.say(&msg.channel, &reply).await {
                warn!(err = %e, "cannot post to chat");
            }
        }))
    }
}

/// Run the bot until Ctrl-C or until the chat connection closes.
///
/// `config` must already be validated.
pub async fn run(cli: &Cli, config: BotConfig) -> anyhow::Result<()> {
    let slot = Arc::new(WhisperSlot::new());
    let distributor =
        Arc::new(KeyDistributor::prepare(config.distributor_config(cli.pace()), slot.clone())?);
    info!(status = %distributor.status_report(), "distributor ready");

    if !confirm_start(cli.confirm_delay()).await {
        info!("aborted before authorization");
        return Ok(());
    }

    let browser: Box<dyn BrowserLauncher> =
        if cli.no_browser { Box::new(ManualBrowser) } else { Box::new(SystemBrowser) };
    let gateway = AuthGateway::new(config.gateway_config(), browser);
    let handle = gateway.start().await?;
    let cancel = handle.cancel_token();
    let token = tokio::select! {
        r = handle.wait() => r?,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            info!("authorization cancelled");
            return Ok(());
        }
    };

    let (chat, mut incoming) = IrcClient::connect(&config.irc_config(), &token).await?;
    slot.attach(chat.clone());
    let dispatcher = Dispatcher::new(chat.username(), Arc::clone(&distributor), chat.clone());
    eprintln!("Connected. Send !spgsend in chat to start, !spgstatus for progress.");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            msg = incoming.recv() => match msg {
                Some(msg) => {
                    dispatcher.dispatch(msg);
                }
                None => {
                    warn!("chat connection closed, exiting");
                    break;
                }
            },
            _ = &mut ctrl_c => {
                info!("interrupted, shutting down");
                break;
            }
        }
    }

    chat.disconnect();
    info!(status = %distributor.status_report(), "stopped");
    Ok(())
}

/// Give the operator `delay` to abort with Ctrl-C. Returns false if aborted.
async fn confirm_start(delay: Duration) -> bool {
    if delay.is_zero() {
        return true;
    }
    eprintln!("Starting in {:.1}s, press Ctrl-C to abort.", delay.as_secs_f32());
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = tokio::signal::ctrl_c() => false,
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
