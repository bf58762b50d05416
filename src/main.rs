//! I2C-HID Driver CLI
//!
//! Binds a HID-over-I2C device from userspace and exposes its descriptor,
//! reports, power control and input stream on the command line.

use anyhow::Result;
use clap::Parser;
use i2c_hid_driver::DriverConfig;
use tracing::{debug, info};

// CLI definitions
mod cli;
use cli::{Cli, Commands};

// Command handlers
mod commands;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Load config, then let flags override it
    let config_path = cli.config.clone().unwrap_or_else(DriverConfig::default_path);
    debug!("Loading config from {:?}", config_path);
    let config =
        DriverConfig::load(&config_path)?.with_overrides(cli.bus, cli.address, cli.hid_register);
    if let (Some(bus), Some(address)) = (config.bus, config.address) {
        info!("Target: /dev/i2c-{} address 0x{:02x}", bus, address);
    }

    let sim = cli.simulate;
    match cli.command {
        Commands::Descriptor { json } => commands::query::descriptor(&config, sim, json),
        Commands::ReportDescriptor => commands::query::report_descriptor(&config, sim),
        Commands::GetReport { kind, id, length } => {
            commands::query::get_report(&config, sim, kind.into(), id, length)
        }
        Commands::SetReport { kind, id, data } => {
            commands::control::set_report(&config, sim, kind.into(), id, &data)
        }
        Commands::Power { state } => commands::control::power(&config, sim, state.into()),
        Commands::Reset => commands::control::reset(&config, sim),
        Commands::Monitor { count } => commands::monitor::monitor(&config, sim, count),
    }
}
