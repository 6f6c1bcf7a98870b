// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

use crate::artifacts::{Artifact, FsArtifactStore};
use crate::client::ComputeClient;
use crate::config::ClientConfig;
use crate::crypto::PrivateKey;
use crate::keystore::{Keyring, KeyringPrincipal};
use crate::tasks::{Task, TaskKind};
use crate::version;

/// Connection settings shared by the networked commands
#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Server address (host:port); overrides COMPUTE_SERVER_ADDR
    #[arg(long)]
    pub server: Option<String>,

    /// Keyring file of the local principal; overrides COMPUTE_KEYRING
    #[arg(long)]
    pub keyring: Option<PathBuf>,

    /// Name of the trusted intermediary
    #[arg(long)]
    pub intermediary: Option<String>,
}

/// Arguments for keygen command
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Principal name
    #[arg(long)]
    pub name: String,

    /// Write the keyring here instead of printing it
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Trusted public key as NAME=0xHEX (repeatable)
    #[arg(long, value_parser = parse_trust)]
    pub trust: Vec<(String, String)>,

    /// Leave the private key out of the keyring (load it from COMPUTE_PRIVATE_KEY instead)
    #[arg(long)]
    pub omit_private_key: bool,

    /// Overwrite an existing keyring file
    #[arg(long)]
    pub force: bool,
}

/// Arguments for run command
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Task kind: sequence-generation, perfect-number-search or factorization
    #[arg(long)]
    pub task: TaskKind,

    /// Term count, search limit or number to factor
    #[arg(long)]
    pub value: u64,

    /// Directory holding artifacts to upload on demand
    #[arg(long)]
    pub artifacts: Option<PathBuf>,

    /// Fail instead of uploading a missing implementation
    #[arg(long)]
    pub no_bootstrap: bool,
}

/// Arguments for upload command
#[derive(Args, Debug)]
pub struct UploadArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Artifact name; a task kind name installs that kind
    #[arg(long)]
    pub name: String,

    /// File holding the artifact body
    #[arg(long)]
    pub file: PathBuf,
}

fn parse_trust(s: &str) -> Result<(String, String), String> {
    let (name, key) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=0xHEX, got '{}'", s))?;
    if name.is_empty() || key.is_empty() {
        return Err(format!("expected NAME=0xHEX, got '{}'", s));
    }
    Ok((name.to_string(), key.to_string()))
}

pub fn keygen(args: KeygenArgs) -> Result<()> {
    let private_key = PrivateKey::random();
    let public_key = private_key.public_key();

    let mut public_keys: BTreeMap<String, String> = args.trust.into_iter().collect();
    public_keys.insert(args.name.clone(), public_key.to_hex());

    let keyring = Keyring {
        principal: KeyringPrincipal {
            name: args.name.clone(),
            private_key: (!args.omit_private_key).then(|| private_key.to_hex()),
        },
        public_keys,
    };
    // Fail now on a bad --trust entry rather than at first use
    keyring.clone().into_principal_with(private_key.clone())?;
    let text = keyring.to_toml()?;

    match args.out {
        Some(path) => {
            if path.exists() && !args.force {
                bail!("{:?} already exists; pass --force to overwrite", path);
            }
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, text).with_context(|| format!("Failed to write {:?}", path))?;
            info!("🔑 Keyring for {} written to {:?}", args.name, path);
        }
        None => print!("{}", text),
    }

    println!("Public key for {}: {}", args.name, public_key.to_hex());
    if args.omit_private_key {
        println!("Private key (set COMPUTE_PRIVATE_KEY): {}", private_key.to_hex());
    }
    Ok(())
}

pub async fn run(args: RunArgs) -> Result<()> {
    let config = client_config(&args.connection)?;
    let task = build_task(args.task, args.value)?;
    let artifact_dir = args.artifacts.unwrap_or_else(|| config.artifact_dir.clone());

    let mut client = ComputeClient::from_config(config)?;
    client.authenticate().await?;

    let completed = if args.no_bootstrap {
        client.submit_task(task).await?
    } else {
        let source = FsArtifactStore::new(artifact_dir);
        client.submit_task_with_bootstrap(task, &source).await?
    };

    println!("{}", completed);
    Ok(())
}

pub async fn upload(args: UploadArgs) -> Result<()> {
    let config = client_config(&args.connection)?;
    let artifact = Artifact::from_path(args.name, &args.file).await?;

    let mut client = ComputeClient::from_config(config)?;
    client.authenticate().await?;
    let size = client.upload_artifact(artifact).await?;

    println!("✅ Uploaded {:?} ({} bytes)", args.file, size);
    Ok(())
}

pub fn version() -> Result<()> {
    let info = serde_json::to_string_pretty(&version::get_version_info())
        .context("Failed to render version info")?;
    println!("{}", info);
    Ok(())
}

fn client_config(connection: &ConnectionArgs) -> Result<ClientConfig> {
    let mut config = ClientConfig::load()?;
    if let Some(server) = &connection.server {
        config.server_addr = server.clone();
    }
    if let Some(keyring) = &connection.keyring {
        config.keyring = keyring.clone();
    }
    if let Some(intermediary) = &connection.intermediary {
        config.intermediary = intermediary.clone();
    }
    Ok(config)
}

fn build_task(kind: TaskKind, value: u64) -> Result<Task> {
    let task = match kind {
        TaskKind::SequenceGeneration => {
            let count = u32::try_from(value).map_err(|_| anyhow!("count {} is too large", value))?;
            Task::sequence_generation(count)
        }
        TaskKind::PerfectNumberSearch => Task::perfect_number_search(value),
        TaskKind::Factorization => Task::factorization(value),
    };
    task.validate()?;
    Ok(task)
}
