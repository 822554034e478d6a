// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Twitch chat over the IRC WebSocket gateway.
//!
//! One task owns the socket: it writes queued lines, answers `PING`, and
//! forwards channel `PRIVMSG`s to the receiver returned by [`IrcClient::connect`].
//! The receiver ends when the connection closes. Every queued line reports
//! back whether it reached the socket; lines still queued when the task stops
//! fail.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::AccessToken;
use crate::chat::{ChannelSender, ChatMessage, Whisperer};

/// Default chat gateway.
pub const TWITCH_CHAT_URL: &str = "wss://irc-ws.chat.twitch.tv:443";

const OUTBOUND_CAPACITY: usize = 64;
const INBOUND_CAPACITY: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A line waiting for the socket, with its write result channel.
struct Outbound {
    line: String,
    written: oneshot::Sender<anyhow::Result<()>>,
}

#[derive(Debug, Clone)]
pub struct IrcConfig {
    pub url: String,
    pub username: String,
    pub channels: Vec<String>,
}

/// A parsed server line, reduced to what the bot reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcLine {
    Ping(String),
    Privmsg(ChatMessage),
    Notice(String),
    Other,
}

/// Parse one IRC line: `[@tags] [:prefix] COMMAND params [:trailing]`.
pub fn parse_line(line: &str) -> IrcLine {
    let mut rest = line.trim_end_matches(['\r', '\n']);
    if rest.starts_with('@') {
        rest = rest.split_once(' ').map(|(_, r)| r).unwrap_or_default();
    }
    let mut prefix = "";
    if let Some(stripped) = rest.strip_prefix(':') {
        let (p, r) = stripped.split_once(' ').unwrap_or((stripped, ""));
        prefix = p;
        rest = r;
    }
    let (command, params) = rest.split_once(' ').unwrap_or((rest, ""));

    match command {
        "PING" => IrcLine::Ping(params.strip_prefix(':').unwrap_or(params).to_owned()),
        "PRIVMSG" => match params.split_once(" :") {
            Some((target, text)) => IrcLine::Privmsg(ChatMessage {
                channel: normalize_channel(target),
                sender: prefix.split('!').next().unwrap_or_default().to_lowercase(),
                text: text.to_owned(),
            }),
            None => IrcLine::Other,
        },
        "NOTICE" => IrcLine::Notice(
            params.split_once(" :").map(|(_, text)| text).unwrap_or(params).to_owned(),
        ),
        _ => IrcLine::Other,
    }
}

/// Channel name without `#`, lowercased.
pub fn normalize_channel(name: &str) -> String {
    name.trim().trim_start_matches('#').to_lowercase()
}

/// Connected chat client.
///
/// Sends resolve once the socket task has written the line. `Ok` means the
/// frame was flushed to the connection, not that the server acted on it.
pub struct IrcClient {
    username: String,
    whisper_channel: String,
    outbound: mpsc::Sender<Outbound>,
    cancel: CancellationToken,
}

impl IrcClient {
    /// Connect, authenticate with `token`, and join every configured channel.
    pub async fn connect(
        config: &IrcConfig,
        token: &AccessToken,
    ) -> anyhow::Result<(Arc<Self>, mpsc::Receiver<ChatMessage>)> {
        let channels: Vec<String> = config.channels.iter().map(|c| normalize_channel(c)).collect();
        let Some(whisper_channel) = channels.first().cloned() else {
            anyhow::bail!("no chat channel to join");
        };
        let username = config.username.trim().to_lowercase();

        let (mut ws, _) = tokio_tungstenite::connect_async(config.url.as_str())
            .await
            .with_context(|| format!("cannot connect to chat at {}", config.url))?;

        let mut login = vec![format!("PASS oauth:{}", token.secret()), format!("NICK {username}")];
        login.extend(channels.iter().map(|c| format!("JOIN #{c}")));
        for line in login {
            ws.send(Message::Text(line.into())).await.context("chat login failed")?;
        }
        info!(url = %config.url, user = %username, ?channels, "connected to chat");

        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel(INBOUND_CAPACITY);
        let cancel = CancellationToken::new();
        tokio::spawn(pump(ws, out_rx, in_tx, cancel.clone()));

        let client = Self { username, whisper_channel, outbound: out_tx, cancel };
        Ok((Arc::new(client), in_rx))
    }

    /// Lowercased login name; messages from it are the bot's own.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Close the connection.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }

    async fn send_line(&self, line: String) -> anyhow::Result<()> {
        let (written, result) = oneshot::channel();
        self.outbound
            .send(Outbound { line, written })
            .await
            .map_err(|_| anyhow::anyhow!("chat connection closed"))?;
        result
            .await
            .map_err(|_| anyhow::anyhow!("chat connection closed before the message was written"))?
    }
}

impl Drop for IrcClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Whisperer for IrcClient {
    fn whisper<'a>(
        &'a self,
        recipient: &'a str,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let line =
                format!("PRIVMSG #{} :/w {recipient} {}", self.whisper_channel, single_line(text));
            self.send_line(line).await
        })
    }
}

impl ChannelSender for IrcClient {
    fn say<'a>(
        &'a self,
        channel: &'a str,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let line = format!("PRIVMSG #{} :{}", normalize_channel(channel), single_line(text));
            self.send_line(line).await
        })
    }
}

/// Line breaks would split a message into separate IRC commands.
fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

async fn pump(
    mut ws: WsStream,
    mut outbound: mpsc::Receiver<Outbound>,
    inbound: mpsc::Sender<ChatMessage>,
    cancel: CancellationToken,
) {
    'pump: loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                if let Err(e) = ws.close(None).await {
                    debug!(err = %e, "chat close failed");
                }
                break;
            }
            next = outbound.recv() => {
                let Some(Outbound { line, written }) = next else { break };
                match ws.send(Message::Text(line.into())).await {
                    Ok(()) => {
                        let _ = written.send(Ok(()));
                    }
                    Err(e) => {
                        warn!(err = %e, "chat send failed");
                        let _ = written.send(Err(anyhow::anyhow!("chat send failed: {e}")));
                        break;
                    }
                }
            }
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    for raw in text.as_str().split("\r\n").filter(|l| !l.is_empty()) {
                        match parse_line(raw) {
                            IrcLine::Ping(payload) => {
                                let pong = Message::Text(format!("PONG :{payload}").into());
                                if let Err(e) = ws.send(pong).await {
                                    warn!(err = %e, "chat pong failed");
                                    break 'pump;
                                }
                            }
                            IrcLine::Privmsg(msg) => {
                                debug!(channel = %msg.channel, sender = %msg.sender, "chat message");
                                if inbound.send(msg).await.is_err() {
                                    debug!("chat message dropped, nobody is listening");
                                }
                            }
                            IrcLine::Notice(text) => warn!(notice = %text, "chat server notice"),
                            IrcLine::Other => debug!(line = raw, "chat"),
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("chat connection closed");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(err = %e, "chat connection error");
                    break;
                }
            }
        }
    }

    // Dropping the queue fails every line still waiting, before the
    // message receiver sees the end of the stream.
    drop(outbound);
    drop(inbound);
}

#[cfg(test)]
#[path = "irc_tests.rs"]
mod tests;
