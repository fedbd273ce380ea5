//! # Release Configuration Validator
//!
//! Command-line tool for validating release orchestrator configuration across
//! environments before a service is started with it.

use clap::{Parser, Subcommand};
use release_core::config::{ConfigManager, ReleaseConfig};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate release orchestrator configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment overlay to apply (development, test, production, ...)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate every configuration section
    All,

    /// Validate one configuration section
    Component {
        /// Section name (engine, client, cache, rate_limiting, batch, logging)
        name: String,
    },

    /// Print the fully merged configuration as JSON
    Structure,
}

type CliResult = anyhow::Result<()>;

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _ = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Some(Commands::All) | None => validate_all_config(&cli),
        Some(Commands::Component { name }) => validate_component(&cli, name),
        Some(Commands::Structure) => show_structure(&cli),
    };

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            process::exit(1);
        }
    }
}

fn load(cli: &Cli) -> anyhow::Result<ReleaseConfig> {
    match ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &cli.environment) {
        Ok(manager) => {
            println!("✅ Configuration loaded and validated");
            Ok(manager.config().clone())
        }
        Err(e) => {
            println!("❌ Failed to load configuration: {e}");
            Err(e.into())
        }
    }
}

fn validate_all_config(cli: &Cli) -> CliResult {
    println!("🔧 Validating Release Orchestrator Configuration");
    println!("Environment: {}", cli.environment);
    if let Some(dir) = &cli.config_dir {
        println!("Config Directory: {}", dir.display());
    }
    println!();

    let config = load(cli)?;
    for section in SECTIONS {
        report_section(&config, section)?;
    }

    println!("\n🎉 All configuration validation checks passed!");
    Ok(())
}

const SECTIONS: [&str; 6] = ["engine", "client", "cache", "rate_limiting", "batch", "logging"];

fn validate_component(cli: &Cli, name: &str) -> CliResult {
    println!("🔧 Validating Component: {name}");
    let config = load(cli)?;
    report_section(&config, &name.to_lowercase().replace('-', "_"))?;
    println!("✅ Component '{name}' validation passed!");
    Ok(())
}

fn report_section(config: &ReleaseConfig, section: &str) -> CliResult {
    match section {
        "engine" => {
            println!("🚀 Engine");
            println!("   setup interval: {}ms", config.engine.setup_interval_ms);
            println!(
                "   default tree: {} waves x {} clusters x {} apps, {}s per app",
                config.engine.default_num_waves,
                config.engine.default_clusters_per_wave,
                config.engine.default_apps_per_bundle,
                config.engine.default_app_deploy_time_secs
            );
        }
        "client" => {
            println!("📡 Client");
            println!(
                "   {} attempts, {}ms timeout, {}ms backoff base",
                config.client.retry_attempts, config.client.query_timeout_ms, config.client.backoff_base_ms
            );
        }
        "cache" => {
            println!("🗄️  Cache");
            println!(
                "   ttl {}s, cleanup every {}s",
                config.cache.default_ttl_seconds, config.cache.cleanup_interval_seconds
            );
        }
        "rate_limiting" => {
            println!("🚦 Rate Limiting");
            if config.rate_limiting.enabled {
                let rl = &config.rate_limiting;
                println!(
                    "   default {}/min burst {}, sensitive {}/min burst {}",
                    rl.default.requests_per_minute,
                    rl.default.burst_size,
                    rl.sensitive.requests_per_minute,
                    rl.sensitive.burst_size
                );
            } else {
                println!("   ℹ️  Rate limiting disabled");
            }
        }
        "batch" => {
            println!("📦 Batch");
            println!(
                "   max concurrent {}, hierarchy max concurrent {}",
                config.batch.max_concurrent, config.batch.hierarchy_max_concurrent
            );
        }
        "logging" => {
            println!("📝 Logging");
            println!("   level {}, format {}", config.logging.level, config.logging.format);
        }
        other => anyhow::bail!("Unknown component: {other}"),
    }
    Ok(())
}

fn show_structure(cli: &Cli) -> CliResult {
    let config = load(cli)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
