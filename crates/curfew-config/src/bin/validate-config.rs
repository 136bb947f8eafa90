//! Config validation CLI tool
//!
//! Validates a curfewd configuration file and reports any errors.

use curfew_config::{ConfigError, CURRENT_CONFIG_VERSION};
use curfew_util::{default_config_path, format_duration};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a curfewd configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            eprintln!("  validate-config config.example.toml");
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match curfew_config::load_config(&config_path) {
        Ok(policy) => {
            let summary = policy.summary();

            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", CURRENT_CONFIG_VERSION);
            match &summary.active_window {
                Some(window) if summary.monitoring_enabled => {
                    println!("  Active window: {}", window);
                    println!(
                        "  Check interval: {}",
                        format_duration(Duration::from_secs(summary.check_interval_seconds))
                    );
                    println!(
                        "  Warnings: {} every {}",
                        summary.max_warnings,
                        format_duration(Duration::from_secs(summary.warning_interval_seconds))
                    );
                    println!("  Shutdown at end: {}", summary.shutdown_at_end);
                }
                Some(window) => println!("  Active window: {} (disabled)", window),
                None => println!("  Active window: not configured"),
            }
            match &summary.scheduled_shutdown {
                Some(time) => println!("  Scheduled shutdown: {}", time),
                None => println!("  Scheduled shutdown: off"),
            }
            println!("  Strict mode: {}", summary.strict_mode);
            println!("  Dry run: {}", summary.dry_run);
            println!(
                "  Rules: {} block keywords, {} allow keywords, {} blocklist, {} whitelist",
                summary.block_keyword_count,
                summary.allow_keyword_count,
                summary.blocklist_count,
                summary.whitelist_count
            );

            if let Some(scheduled) = &policy.scheduled_shutdown
                && scheduled.enabled
                && let Err(e) = scheduled.at()
            {
                println!();
                println!("⚠ {} (the daily shutdown will not be armed)", e);
            }

            if !policy.missing_sections.is_empty() {
                println!();
                println!("Notes:");
                for missing in &policy.missing_sections {
                    println!("  - {}", missing);
                }
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver, CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
