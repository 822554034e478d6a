// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::auth::{self, GatewayConfig};
use crate::chat::irc::{IrcConfig, TWITCH_CHAT_URL};
use crate::distributor::{DistributorConfig, CODE_PLACEHOLDER, DEFAULT_PACE};

/// Pause between the startup warning and authorization.
pub const DEFAULT_CONFIRM_DELAY: Duration = Duration::from_secs(5);

/// Chat bot that whispers single-use codes to a list of recipients.
#[derive(Debug, Parser)]
#[command(name = "keywhisper", version, about)]
pub struct Cli {
    /// Path to the bot config file (JSON).
    #[arg(long, env = "KEYWHISPER_CONFIG", default_value = "bot-config.json")]
    pub config: PathBuf,

    /// Log format (json or text).
    #[arg(long, env = "KEYWHISPER_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "KEYWHISPER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Delay between deliveries in milliseconds.
    #[arg(long, env = "KEYWHISPER_PACE_MS")]
    pub pace_ms: Option<u64>,

    /// Delay before authorization starts, in milliseconds.
    #[arg(long, env = "KEYWHISPER_CONFIRM_DELAY_MS")]
    pub confirm_delay_ms: Option<u64>,

    /// Print the authorize URL instead of launching a browser.
    #[arg(long, env = "KEYWHISPER_NO_BROWSER")]
    pub no_browser: bool,
}

impl Cli {
    pub fn pace(&self) -> Duration {
        self.pace_ms.map(Duration::from_millis).unwrap_or(DEFAULT_PACE)
    }

    pub fn confirm_delay(&self) -> Duration {
        self.confirm_delay_ms.map(Duration::from_millis).unwrap_or(DEFAULT_CONFIRM_DELAY)
    }
}

/// Bot config file.
///
/// Every field defaults to empty so that [`BotConfig::validate`] can report
/// all missing keys at once instead of failing on the first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BotConfig {
    pub identity: Identity,
    pub channels: Vec<String>,
    pub message: MessageConfig,
    pub connection: ConnectionConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Identity {
    pub username: String,
    pub client_id: String,
    #[serde(rename = "callBackUrl")]
    pub callback_url: String,
    /// Space-separated OAuth scopes.
    pub scopes: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessageConfig {
    pub user_names_file: String,
    pub steam_keys_file: String,
    pub template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub url: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { url: TWITCH_CHAT_URL.to_owned() }
    }
}

impl BotConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read bot config {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("cannot parse bot config {}", path.display()))
    }

    /// Every problem with the config, in a stable order. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let missing = |key: &str| format!("missing \"{key}\"");

        let identity = &self.identity;
        if identity.username.trim().is_empty() {
            errors.push(missing("identity.username"));
        }
        if identity.client_id.trim().is_empty() {
            errors.push(missing("identity.clientId"));
        }
        if identity.scopes.trim().is_empty() {
            errors.push(missing("identity.scopes"));
        }
        if identity.callback_url.trim().is_empty() {
            errors.push(missing("identity.callBackUrl"));
        } else if let Err(e) = auth::url::callback_bind_addr(&identity.callback_url) {
            errors.push(format!("\"identity.callBackUrl\": {e}"));
        }

        if self.channels.is_empty() {
            errors.push("\"channels\" must list at least one channel".to_owned());
        }
        for (i, channel) in self.channels.iter().enumerate() {
            if channel.trim().trim_start_matches('#').is_empty() {
                errors.push(format!("channel at position {} is empty", i + 1));
            }
        }

        if self.message.user_names_file.trim().is_empty() {
            errors.push(format!("{} path", missing("message.userNamesFile")));
        }
        if self.message.steam_keys_file.trim().is_empty() {
            errors.push(format!("{} path", missing("message.steamKeysFile")));
        }
        if self.message.template.is_empty() {
            errors.push(missing("message.template"));
        } else if !self.message.template.contains(CODE_PLACEHOLDER) {
            errors.push(format!("template does not contain the {CODE_PLACEHOLDER} placeholder"));
        }

        let url = self.connection.url.as_str();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            errors.push(format!("\"connection.url\" must be a ws:// or wss:// URL, got {url:?}"));
        }

        errors
    }

    pub fn distributor_config(&self, pace: Duration) -> DistributorConfig {
        DistributorConfig {
            recipients_path: PathBuf::from(&self.message.user_names_file),
            codes_path: PathBuf::from(&self.message.steam_keys_file),
            template: self.message.template.clone(),
            pace,
        }
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            client_id: self.identity.client_id.clone(),
            callback_url: self.identity.callback_url.clone(),
            scopes: self.identity.scopes.clone(),
            authorize_endpoint: auth::TWITCH_AUTHORIZE_URL.to_owned(),
        }
    }

    pub fn irc_config(&self) -> IrcConfig {
        IrcConfig {
            url: self.connection.url.clone(),
            username: self.identity.username.clone(),
            channels: self.channels.clone(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
