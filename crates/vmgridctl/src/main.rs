use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod commands;

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info,vmgrid=debug";

#[derive(Parser)]
#[command(
    name = "vmgridctl",
    about = "vmgrid — scale set control plane",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to vmgrid.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Provider call timeout (e.g. 30s, 2m), overrides the config file
    #[arg(long, global = true)]
    timeout: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage scale sets
    Scaleset {
        #[command(subcommand)]
        action: ScalesetAction,
    },
}

#[derive(Subcommand)]
enum ScalesetAction {
    /// Create a scale set from a TOML definition file
    Create {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Show one scale set, or all when no name is given
    Get { name: Option<String> },
    /// Grow a scale set to the given capacity
    Scale { name: String, capacity: u32 },
    /// Delete a scale set and all of its replicas
    Delete { name: String },
    /// Show the live replica VMs of a scale set
    Replicas { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    let ctx = commands::Context::open(cli.config.as_deref(), cli.timeout.as_deref())?;

    match cli.command {
        Commands::Scaleset { action } => match action {
            ScalesetAction::Create { file } => {
                print_json(&commands::scaleset::create(&ctx, &file).await?)
            }
            ScalesetAction::Get { name } => {
                print_json(&commands::scaleset::get(&ctx, name.as_deref())?)
            }
            ScalesetAction::Scale { name, capacity } => {
                print_json(&commands::scaleset::scale(&ctx, &name, capacity).await?)
            }
            ScalesetAction::Delete { name } => {
                commands::scaleset::delete(&ctx, &name).await?;
                println!("✓ Deleted scale set {name}");
                Ok(())
            }
            ScalesetAction::Replicas { name } => {
                print_json(&commands::scaleset::replicas(&ctx, &name).await?)
            }
        },
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_log_filter_parses() {
        let filter: EnvFilter = DEFAULT_LOG_FILTER.parse().unwrap();
        assert_eq!(
            filter.max_level_hint(),
            Some(tracing_subscriber::filter::LevelFilter::DEBUG)
        );
    }

    #[test]
    fn scale_command_parses() {
        let cli = Cli::try_parse_from(["vmgridctl", "--timeout", "5s", "scaleset", "scale", "web", "4"])
            .unwrap();
        assert_eq!(cli.timeout.as_deref(), Some("5s"));
        assert!(matches!(
            cli.command,
            Commands::Scaleset {
                action: ScalesetAction::Scale { ref name, capacity: 4 }
            } if name == "web"
        ));
    }
}
