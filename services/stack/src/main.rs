//! GitOps Stack Synthesizer
//!
//! Reads stack configuration, looks up the caller identity and EKS cluster,
//! and emits the Pulumi YAML program for the stack.
//!
//! # Usage
//! ```bash
//! # Write the program for the dev stack
//! gitops-stack --stack dev synth --out Pulumi.yaml
//!
//! # Show what would be declared, without AWS credentials
//! gitops-stack --offline --account-id 123456789012 \
//!     --config project:prefix=demo --config aws:region=us-west-2 \
//!     --config kubernetes:namespace=apps plan
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use gitops_stack::config::PULUMI_CONFIG_ENV;
use gitops_stack::program::{render, render_plan};
use gitops_stack::{
    synthesize, AwsCloudLookup, CallerIdentity, CloudLookup, ConfigStore, ProgramMeta,
    StackSettings, StaticCloudLookup,
};

// ============================================================
// CLI Definition
// ============================================================

#[derive(Parser)]
#[command(name = "gitops-stack")]
#[command(about = "GitOps stack synthesizer (S3, SQS, IRSA, Kubernetes)", long_about = None)]
#[command(version)]
struct Cli {
    /// Stack name
    #[arg(long, env = "PULUMI_STACK", default_value = "dev", global = true)]
    stack: String,

    /// Project name written into the program
    #[arg(long, env = "PULUMI_PROJECT", default_value = "gitops-infra", global = true)]
    project: String,

    /// Stack settings file (default: Pulumi.<stack>.yaml)
    #[arg(long, global = true)]
    config_file: Option<PathBuf>,

    /// Config override, `namespace:key=value` (repeatable)
    #[arg(long = "config", value_name = "KEY=VALUE", global = true)]
    config: Vec<String>,

    /// Skip AWS lookups and use the static identity below
    #[arg(long, global = true)]
    offline: bool,

    /// Account ID for offline mode
    #[arg(long, env = "AWS_ACCOUNT_ID", global = true)]
    account_id: Option<String>,

    /// Partition for offline mode
    #[arg(long, default_value = "aws", global = true)]
    partition: String,

    /// OIDC issuer for offline mode; without it account-root trust is used
    #[arg(long, global = true)]
    oidc_issuer: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the Pulumi YAML program
    Synth {
        /// Output path (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// List declared resources in creation order
    Plan,
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

async fn cloud_lookup(cli: &Cli, region: &str) -> Result<Box<dyn CloudLookup>> {
    if !cli.offline {
        return Ok(Box::new(AwsCloudLookup::new(region).await));
    }

    let account_id = cli
        .account_id
        .clone()
        .context("--offline requires --account-id")?;
    let mut lookup = StaticCloudLookup::new(CallerIdentity::new(account_id, cli.partition.clone()));
    if let Some(issuer) = &cli.oidc_issuer {
        lookup = lookup.with_oidc_issuer(issuer.clone());
    }

    info!("Offline mode, skipping AWS lookups");
    Ok(Box::new(lookup))
}

// ============================================================
// Main Entry Point
// ============================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs)?;

    info!(stack = %cli.stack, project = %cli.project, "GitOps stack synthesizer starting");

    let config_file = cli
        .config_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("Pulumi.{}.yaml", cli.stack)));
    let env_json = std::env::var(PULUMI_CONFIG_ENV).ok();

    let store = ConfigStore::load(&config_file, env_json.as_deref(), &cli.config)
        .context("Failed to load stack configuration")?;
    let settings = StackSettings::from_store(&cli.project, &cli.stack, &store)?;

    let lookup = cloud_lookup(&cli, &settings.region).await?;
    let synthesis = synthesize(&settings, lookup.as_ref())
        .await
        .context("Stack synthesis failed")?;

    match cli.command {
        Commands::Synth { out } => {
            let program = render(&synthesis.stack, &ProgramMeta::new(&cli.project))?;
            match out {
                Some(path) => {
                    std::fs::write(&path, program)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!(path = %path.display(), "Program written");
                }
                None => print!("{}", program),
            }
        }

        Commands::Plan => {
            print!("{}", render_plan(&synthesis.stack));
        }
    }

    Ok(())
}
