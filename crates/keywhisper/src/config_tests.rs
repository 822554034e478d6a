// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const VALID: &str = r#"{
    "identity": {
        "username": "keybot",
        "clientId": "client-123",
        "callBackUrl": "http://localhost:4827",
        "scopes": "chat:read chat:edit whispers:edit"
    },
    "channels": ["somechannel"],
    "message": {
        "userNamesFile": "users.txt",
        "steamKeysFile": "keys.txt",
        "template": "Your code: <STEAM_KEY>"
    }
}"#;

fn parse(json: &str) -> anyhow::Result<BotConfig> {
    Ok(serde_json::from_str(json)?)
}

#[test]
fn valid_config_has_no_errors() -> anyhow::Result<()> {
    let config = parse(VALID)?;
    assert_eq!(config.validate(), Vec::<String>::new());
    assert_eq!(config.identity.callback_url, "http://localhost:4827");
    assert_eq!(config.connection.url, TWITCH_CHAT_URL);
    Ok(())
}

#[test]
fn empty_config_reports_every_problem() -> anyhow::Result<()> {
    let errors = parse("{}")?.validate();
    assert_eq!(errors, vec![
        r#"missing "identity.username""#,
        r#"missing "identity.clientId""#,
        r#"missing "identity.scopes""#,
        r#"missing "identity.callBackUrl""#,
        r#""channels" must list at least one channel"#,
        r#"missing "message.userNamesFile" path"#,
        r#"missing "message.steamKeysFile" path"#,
        r#"missing "message.template""#,
    ]);
    Ok(())
}

#[test]
fn blank_channels_are_reported_by_position() -> anyhow::Result<()> {
    let mut config = parse(VALID)?;
    config.channels = vec!["ok".into(), "  ".into(), "#".into()];
    assert_eq!(config.validate(), vec![
        "channel at position 2 is empty",
        "channel at position 3 is empty",
    ]);
    Ok(())
}

#[yare::parameterized(
    https = { "https://localhost:4827" },
    no_host = { "http:///callback" },
    garbage = { "not a url" },
)]
fn callback_url_must_be_local_http(url: &str) {
    let mut config = parse(VALID).unwrap_or_default();
    config.identity.callback_url = url.to_owned();
    let errors = config.validate();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].starts_with("\"identity.callBackUrl\""), "{errors:?}");
}

#[test]
fn template_needs_placeholder() -> anyhow::Result<()> {
    let mut config = parse(VALID)?;
    config.message.template = "Thanks for playing!".to_owned();
    assert_eq!(config.validate(), vec!["template does not contain the <STEAM_KEY> placeholder"]);
    Ok(())
}

#[test]
fn connection_url_must_be_websocket() -> anyhow::Result<()> {
    let mut config = parse(VALID)?;
    config.connection.url = "irc.chat.twitch.tv:6667".to_owned();
    let errors = config.validate();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("connection.url"));
    Ok(())
}

#[test]
fn derived_component_configs() -> anyhow::Result<()> {
    let config = parse(VALID)?;

    let dist = config.distributor_config(Duration::from_millis(250));
    assert_eq!(dist.recipients_path, PathBuf::from("users.txt"));
    assert_eq!(dist.codes_path, PathBuf::from("keys.txt"));
    assert_eq!(dist.pace, Duration::from_millis(250));

    let gateway = config.gateway_config();
    assert_eq!(gateway.client_id, "client-123");
    assert_eq!(gateway.authorize_endpoint, auth::TWITCH_AUTHORIZE_URL);

    let irc = config.irc_config();
    assert_eq!(irc.username, "keybot");
    assert_eq!(irc.channels, vec!["somechannel"]);
    Ok(())
}

#[test]
fn load_reports_path_on_failure() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let missing = dir.path().join("nope.json");
    crate::assert_err_contains!(BotConfig::load(&missing), "nope.json");

    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, "{ not json")?;
    crate::assert_err_contains!(BotConfig::load(&broken), "cannot parse bot config");

    let good = dir.path().join("bot-config.json");
    std::fs::write(&good, VALID)?;
    assert_eq!(BotConfig::load(&good)?.channels, vec!["somechannel"]);
    Ok(())
}

#[test]
fn cli_defaults_and_overrides() -> anyhow::Result<()> {
    let cli = Cli::try_parse_from(["keywhisper"])?;
    assert_eq!(cli.config, PathBuf::from("bot-config.json"));
    assert_eq!(cli.pace(), DEFAULT_PACE);
    assert_eq!(cli.confirm_delay(), DEFAULT_CONFIRM_DELAY);
    assert!(!cli.no_browser);

    let cli = Cli::try_parse_from([
        "keywhisper",
        "--config",
        "other.json",
        "--pace-ms",
        "1500",
        "--confirm-delay-ms",
        "0",
        "--no-browser",
    ])?;
    assert_eq!(cli.config, PathBuf::from("other.json"));
    assert_eq!(cli.pace(), Duration::from_millis(1500));
    assert_eq!(cli.confirm_delay(), Duration::ZERO);
    assert!(cli.no_browser);
    Ok(())
}
