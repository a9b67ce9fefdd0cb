//! Stevedore CLI - deploy runtime artifacts from the command line
//!
//! Usage: stevedore <COMMAND>
//!
//! Commands:
//!   deploy    Deploy an artifact to the configured target
//!   undeploy  Remove an artifact from the configured target

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use log::error;

use stevedore::{ArtifactKind, Credentials, Deployer, DeploymentConfig, DeploymentTarget};

/// Stevedore - deployment engine for runtime artifacts
#[derive(Parser, Debug)]
#[command(name = "stevedore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deploy an artifact to the configured target
    Deploy {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Remove an artifact from the configured target
    Undeploy {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Path to the packaged artifact
    artifact: PathBuf,

    /// Application or domain name on the target
    #[arg(short, long)]
    name: String,

    /// Deployment target
    #[arg(short, long, value_enum)]
    target: DeploymentTarget,

    /// Kind of artifact being deployed
    #[arg(short = 'k', long, value_enum, default_value = "application")]
    artifact_kind: ArtifactKind,

    /// Base URI of the managed platform (network targets)
    #[arg(long)]
    uri: Option<String>,

    /// Platform username (paired with --password)
    #[arg(long, requires = "password")]
    username: Option<String>,

    /// Platform password (paired with --username)
    #[arg(long, requires = "username")]
    password: Option<String>,

    /// Pre-issued bearer token, instead of username/password
    #[arg(long, conflicts_with_all = ["username", "password"])]
    token: Option<String>,

    /// Environment name within the account
    #[arg(long)]
    environment: Option<String>,

    /// Business group id within the account
    #[arg(long)]
    business_group: Option<String>,

    /// Named server/cluster/fabric target on the platform
    #[arg(long)]
    target_name: Option<String>,

    /// Root directory of the self-managed runtime (standalone)
    #[arg(long)]
    runtime_home: Option<PathBuf>,

    /// Root directories of the cluster member runtimes
    #[arg(long, value_delimiter = ',')]
    cluster_homes: Vec<PathBuf>,

    /// Domain archive the application depends on
    #[arg(long)]
    domain: Option<PathBuf>,

    /// Worker count (CloudHub)
    #[arg(long)]
    workers: Option<u32>,

    /// Region (CloudHub)
    #[arg(long)]
    region: Option<String>,

    /// Property handed to the artifact, as key=value; repeatable
    #[arg(short = 'D', long = "property")]
    properties: Vec<String>,

    /// Deployment timeout in milliseconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Skip the post-deploy verification phase
    #[arg(long)]
    skip_verification: bool,

    /// Treat undeploying an absent artifact as a no-op instead of an error
    #[arg(long)]
    ignore_missing: bool,
}

impl TargetArgs {
    fn into_config(self) -> Result<DeploymentConfig> {
        let mut config = DeploymentConfig::new(
            self.artifact,
            self.name,
            self.target,
            self.artifact_kind,
        );
        config.uri = self.uri;
        config.credentials = credentials_from(self.username, self.password, self.token)?;
        config.environment = self.environment;
        config.business_group = self.business_group;
        config.target_name = self.target_name;
        config.runtime_home = self.runtime_home;
        config.cluster_homes = self.cluster_homes;
        config.domain = self.domain;
        config.workers = self.workers;
        config.region = self.region;
        for property in self.properties {
            match property.split_once('=') {
                Some((key, value)) => {
                    config.properties.insert(key.to_string(), value.to_string());
                }
                None => bail!("property '{}' is not of the form key=value", property),
            }
        }
        if let Some(ms) = self.timeout {
            config.deployment_timeout = Duration::from_millis(ms);
        }
        config.skip_verification = self.skip_verification;
        config.fail_if_not_exists = !self.ignore_missing;
        Ok(config)
    }
}

/// Pair up the credential flags; clap enforces this on parse, but the args
/// can also be built programmatically.
fn credentials_from(
    username: Option<String>,
    password: Option<String>,
    token: Option<String>,
) -> Result<Option<Credentials>> {
    match (username, password, token) {
        (Some(username), Some(password), None) => {
            Ok(Some(Credentials::Basic { username, password }))
        }
        (None, None, Some(token)) => Ok(Some(Credentials::Bearer(token))),
        (None, None, None) => Ok(None),
        _ => bail!("credentials must be either --username with --password, or --token"),
    }
}

fn main() {
    match run() {
        Ok(()) => {}
        Err(err) => {
            error!("fatal: {}", err);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Deploy { target } => {
            let config = target.into_config()?;
            Deployer::from_config(&config)?.deploy()?;
        }
        Commands::Undeploy { target } => {
            let config = target.into_config()?;
            Deployer::from_config(&config)?.undeploy()?;
        }
    }
    Ok(())
}
