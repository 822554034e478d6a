// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use keywhisper::app;
use keywhisper::config::{BotConfig, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    eprintln!("{}\n", app::MODIFICATION_WARNING);

    let config = match BotConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(2);
        }
    };
    let problems = config.validate();
    if !problems.is_empty() {
        eprintln!("error: invalid bot config {}:", cli.config.display());
        for problem in &problems {
            eprintln!("  - {problem}");
        }
        std::process::exit(2);
    }

    // The chat gateway is reached over wss; rustls needs a process-wide provider.
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        error!("a TLS crypto provider was already installed");
    }

    if let Err(e) = app::run(&cli, config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(cli: &Cli) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match cli.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}
