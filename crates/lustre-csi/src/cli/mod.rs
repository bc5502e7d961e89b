//! CLI command definitions and handlers.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, eyre};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::driver::{
    Driver, DriverOptions, IdentityService, NodeService, PublishVolumeRequest,
    UnpublishVolumeRequest, VolumeStatsRequest,
};
use crate::filesystem::SourceRedirect;
use crate::version::VersionInfo;

/// Lustre CSI node agent
#[derive(Parser)]
#[command(name = "lustre-csi-node")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Node ID reported to the orchestrator
    #[arg(long, global = true, env = "KUBE_NODE_NAME", default_value = "")]
    pub node_id: String,

    /// Name the driver registers under
    #[arg(long, global = true, default_value = crate::driver::DEFAULT_DRIVER_NAME)]
    pub driver_name: String,

    /// Directory for temporary internal mounts
    #[arg(long, global = true, env = "LUSTRE_CSI_WORKING_MOUNT_DIR")]
    pub working_mount_dir: Option<PathBuf>,

    /// Record mounts in memory instead of mounting (testing only)
    #[arg(long, global = true)]
    pub enable_mock_mount: bool,

    /// Mount source to replace
    #[arg(long, global = true, requires_all = ["swap_source_to", "swap_source_to_type"])]
    pub swap_source_from: Option<String>,

    /// Replacement mount source
    #[arg(long, global = true)]
    pub swap_source_to: Option<String>,

    /// Filesystem type of the replacement mount source
    #[arg(long, global = true)]
    pub swap_source_to_type: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Log output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Node agent commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Print driver name, version and platform
    Version,

    /// Print plugin info, node info and node capabilities
    Info,

    /// Publish a volume at a target path
    Publish {
        /// Volume ID
        volume_id: String,

        /// Target path
        target_path: PathBuf,

        /// Volume context entry (repeatable)
        #[arg(short, long = "context", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        context: Vec<(String, String)>,

        /// Publish read-only
        #[arg(long)]
        readonly: bool,

        /// Mount flag (repeatable)
        #[arg(short = 'o', long = "mount-flag")]
        mount_flags: Vec<String>,

        /// Filesystem type (default: lustre)
        #[arg(long, default_value = "")]
        fs_type: String,
    },

    /// Unpublish a volume from a target path
    Unpublish {
        /// Volume ID
        volume_id: String,

        /// Target path
        target_path: PathBuf,
    },

    /// Print usage statistics of a published volume
    Stats {
        /// Volume ID
        volume_id: String,

        /// Path the volume is published at
        volume_path: PathBuf,
    },
}

fn parse_key_value(value: &str) -> Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {value:?}"))
}

impl Cli {
    /// Install the global tracing subscriber. Logs go to stderr.
    ///
    /// # Errors
    ///
    /// Returns an error if a subscriber is already installed.
    pub fn init_tracing(&self) -> Result<()> {
        let directive = if self.debug {
            "lustre_csi=debug"
        } else {
            "lustre_csi=info"
        };
        let filter = EnvFilter::from_default_env().add_directive(directive.parse()?);
        let registry = tracing_subscriber::registry().with(filter);

        match self.log_format {
            LogFormat::Text => registry
                .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
                .try_init()?,
            LogFormat::Json => registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()?,
        }

        Ok(())
    }

    /// Driver options from the global flags.
    #[must_use]
    pub fn driver_options(&self) -> DriverOptions {
        let mut options = DriverOptions::new(self.node_id.clone())
            .with_driver_name(self.driver_name.clone());

        if let Some(dir) = &self.working_mount_dir {
            options = options.with_working_mount_dir(dir.clone());
        }
        if self.enable_mock_mount {
            options = options.with_mock_mount();
        }
        if let (Some(from), Some(to), Some(fs_type)) = (
            &self.swap_source_from,
            &self.swap_source_to,
            &self.swap_source_to_type,
        ) {
            options = options.with_source_redirect(SourceRedirect {
                from: from.clone(),
                to: to.clone(),
                fs_type: fs_type.clone(),
            });
        }

        options
    }

    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        let options = self.driver_options();
        let version = VersionInfo::new(options.driver_name.clone());

        if let Commands::Version = self.command {
            println!("{}", version.to_yaml()?);
            return Ok(());
        }

        tracing::debug!(version = %version.to_yaml()?, "Starting node agent");
        let driver = Driver::new(options);

        match self.command {
            Commands::Version => Ok(()),

            Commands::Info => {
                let plugin = driver
                    .get_plugin_info()
                    .await
                    .map_err(|e| eyre!("Failed to get plugin info: {}", e))?;
                let node = driver
                    .node_get_info()
                    .await
                    .map_err(|e| eyre!("Failed to get node info: {}", e))?;
                let capabilities = driver
                    .node_get_capabilities()
                    .await
                    .map_err(|e| eyre!("Failed to get capabilities: {}", e))?;

                let json = serde_json::to_string_pretty(&serde_json::json!({
                    "plugin": plugin,
                    "node": node,
                    "capabilities": capabilities,
                }))?;
                println!("{}", json);
                Ok(())
            }

            Commands::Publish {
                volume_id,
                target_path,
                context,
                readonly,
                mount_flags,
                fs_type,
            } => {
                let request = PublishVolumeRequest {
                    volume_id: volume_id.clone(),
                    target_path: target_path.clone(),
                    volume_context: Some(context.into_iter().collect()),
                    readonly,
                    mount_flags,
                    fs_type,
                };

                driver
                    .node_publish_volume(request)
                    .await
                    .map_err(|e| eyre!("Failed to publish volume: {}", e))?;

                let json = serde_json::to_string_pretty(&serde_json::json!({
                    "volume_id": volume_id,
                    "target_path": target_path,
                    "published": true,
                }))?;
                println!("{}", json);
                Ok(())
            }

            Commands::Unpublish {
                volume_id,
                target_path,
            } => {
                let request = UnpublishVolumeRequest {
                    volume_id: volume_id.clone(),
                    target_path: target_path.clone(),
                };

                driver
                    .node_unpublish_volume(request)
                    .await
                    .map_err(|e| eyre!("Failed to unpublish volume: {}", e))?;

                let json = serde_json::to_string_pretty(&serde_json::json!({
                    "volume_id": volume_id,
                    "target_path": target_path,
                    "published": false,
                }))?;
                println!("{}", json);
                Ok(())
            }

            Commands::Stats {
                volume_id,
                volume_path,
            } => {
                let stats = driver
                    .node_get_volume_stats(VolumeStatsRequest {
                        volume_id,
                        volume_path,
                    })
                    .await
                    .map_err(|e| eyre!("Failed to get volume stats: {}", e))?;

                println!("{}", serde_json::to_string_pretty(&stats)?);
                Ok(())
            }
        }
    }
}
