//! Lustre CSI node agent entry point.

use clap::Parser;
use color_eyre::eyre::Result;

use lustre_csi::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    cli.init_tracing()?;

    // Execute command
    cli.execute().await
}
