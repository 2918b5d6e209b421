//! GlowSense CLI Application
//!
//! Command-line front end for the glowsense-engine library:
//! - Loads the TOML configuration and applies command line overrides
//! - Connects to the telemetry bridge and drives the strip until Ctrl-C
//! - Prints the effective configuration or the signal catalogue

use anyhow::{Context, Result};
use clap::Parser;
use glowsense_engine::{Engine, SignalDatabase};
use std::path::PathBuf;

mod config;
mod device;

use config::AppConfig;
use device::LogDevice;

/// GlowSense - Ambient lighting driven by vehicle telemetry
#[derive(Parser, Debug)]
#[command(name = "glowsense")]
#[command(about = "Drive an LED strip from vehicle telemetry", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Bridge address (host:port), overrides the configuration
    #[arg(short, long, value_name = "ADDR")]
    bridge: Option<String>,

    /// Number of LEDs on the strip, overrides the configuration
    #[arg(long, value_name = "COUNT")]
    led_count: Option<usize>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    dump_config: bool,

    /// Print the signal catalogue (after calibration) and exit
    #[arg(long)]
    list_signals: bool,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("GlowSense v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using engine library v{}", glowsense_engine::VERSION);

    let mut app_config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => AppConfig::default(),
    };
    app_config.apply_overrides(args.bridge.as_deref(), args.led_count);
    app_config.validate()?;

    if args.dump_config {
        let text = toml::to_string_pretty(&app_config).context("Failed to serialize configuration")?;
        println!("{}", text);
        return Ok(());
    }

    if args.list_signals {
        return list_signals(&app_config);
    }

    let led_count = app_config.engine.strip.led_count;
    let device = LogDevice::new(led_count, app_config.display.log_every);
    let engine = Engine::new(app_config.engine, Box::new(device)).context("Failed to initialise engine")?;

    let shutdown = engine.shutdown_handle();
    ctrlc::set_handler(move || {
        log::info!("Shutdown requested");
        shutdown.shutdown();
    })
    .context("Failed to install Ctrl-C handler")?;

    log::info!(
        "Driving {} LEDs from bridge {}",
        led_count,
        engine.config().bridge.address
    );
    engine.run().context("Engine stopped with an error")?;

    Ok(())
}

/// Print every message and signal the engine decodes
fn list_signals(app_config: &AppConfig) -> Result<()> {
    let mut database = SignalDatabase::builtin();
    database
        .apply_calibration(&app_config.engine.calibration)
        .context("Invalid calibration")?;
    database.validate().context("Invalid signal definition")?;

    for message in database.messages() {
        println!("{} (0x{:03X}) on bus {}: {}", message.id, message.id, message.bus, message.name);
        for def in &message.signals {
            let d = &def.descriptor;
            print!(
                "  {:<18} bits {}|{} {:?}{} x{} +{}",
                def.signal.as_str(),
                d.start_bit,
                d.bit_length,
                d.byte_order,
                if d.signed { " signed" } else { "" },
                d.factor,
                d.offset
            );
            match &def.value_table {
                Some(table) => {
                    let labels: Vec<String> = table.iter().map(|(code, label)| format!("{}={}", code, label)).collect();
                    println!("  [{}]", labels.join(", "));
                }
                None => println!(),
            }
        }
    }

    let stats = database.stats();
    println!("\nMessages: {}", stats.num_messages);
    println!("Signals:  {}", stats.num_signals);
    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_args_parse_overrides() {
        let args = Args::parse_from(["glowsense", "--bridge", "127.0.0.1:1338", "--led-count", "90", "-vv"]);
        assert_eq!(args.bridge.as_deref(), Some("127.0.0.1:1338"));
        assert_eq!(args.led_count, Some(90));
        assert_eq!(args.verbose, 2);
        assert!(!args.dump_config);
    }
}
