// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Compute Grid client
#[derive(Parser, Debug)]
#[command(name = "compute-client")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Authenticate with the intermediary and run tasks on the compute server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a principal key pair and write its keyring
    Keygen(commands::KeygenArgs),

    /// Authenticate and run a task, uploading its artifact if the server lacks it
    Run(commands::RunArgs),

    /// Authenticate and upload an artifact
    Upload(commands::UploadArgs),

    /// Print build version, features and task kinds as JSON
    Version,
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Keygen(args) => commands::keygen(args),
        Commands::Run(args) => commands::run(args).await,
        Commands::Upload(args) => commands::upload(args).await,
        Commands::Version => commands::version(),
    }
}
