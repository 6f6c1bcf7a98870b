// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use compute_grid::{config::ServerConfig, server::ComputeServer, version};
use std::env;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    println!("🚀 Starting {}...\n", version::get_version_string());
    println!("📦 BUILD VERSION: {}", version::VERSION);
    println!("🧩 Features: {}", version::FEATURES.join(", "));
    println!("🧮 Task kinds: {}", version::TASK_KINDS.join(", "));
    println!();

    // COMPUTE_CONFIG file (optional), then COMPUTE_* overrides
    let config = ServerConfig::load()?;
    println!("🔧 Bind address: {}", config.bind_addr());
    println!("🔧 Keyring: {:?}", config.keyring);
    match config.session_ttl() {
        Some(ttl) => println!("🔧 Session key TTL: {:?}", ttl),
        None => println!("🔧 Session keys never expire"),
    }

    let server = ComputeServer::from_config(config)?;
    let handle = server.start().await?;
    println!("✅ Compute server ready on {}", handle.local_addr());

    // Wait for shutdown signal
    signal::ctrl_c().await?;

    println!("\n⏹️  Shutting down...");
    handle.shutdown().await;

    println!("👋 Goodbye!");
    Ok(())
}
