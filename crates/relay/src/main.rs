// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tandem-relay: WebSocket relay server for multi-device sync.

use std::net::SocketAddr;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tandem_relay::{server, RelayState};

/// tandem-relay: multi-device sync relay server
#[derive(Parser, Debug)]
#[command(name = "tandem-relay")]
#[command(about = "WebSocket relay server for multi-device sync")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:7890")]
    bind: SocketAddr,

    /// Shared token every handshake must present
    #[arg(short, long)]
    token: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting tandem-relay");
    info!("  Bind address: {}", args.bind);
    info!(
        "  Token check: {}",
        if args.token.is_some() { "enabled" } else { "disabled" }
    );

    let state = RelayState::new(args.token);
    server::run(args.bind, state).await?;

    Ok(())
}
