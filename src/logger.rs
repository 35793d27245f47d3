//! Logging setup for the `netkernel` binary.
//!
//! Records carry the module path as target:
//! - `network_design_kernel::loader` logs loads and saves at `info` and repaired legacy values
//!   (negative route capacities) at `warn`.
//! - `network_design_kernel::domain::network::*` logs element changes at `debug`, and node
//!   removals, layer coupling changes and SRG failures at `info`.
//! - `network_design_kernel::domain::network::forwarding` reports traffic lost in closed
//!   forwarding cycles at `debug`.
//!
//! Use `RUST_LOG=debug` to follow every model mutation.

use chrono::Local;
use fern::Dispatch;
use log::LevelFilter;
use std::fs;
use std::path::PathBuf;

use crate::domain::utils::config::LOG_DIR_ENV;

const DEFAULT_LOG_DIR: &str = "logs";
const LOG_FILE: &str = "netkernel.log";

/// Initializes the global logger. Call once, from the binary.
///
/// The level comes from `RUST_LOG` (default `info`), the log directory from
/// `NETWORK_KERNEL_LOG_DIR` (default `logs`). Output goes to stderr and to the log file.
pub fn init() {
    let log_dir = std::env::var(LOG_DIR_ENV).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_DIR));
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create log directory at '{}': {}", log_dir.display(), e);
    }
    let log_file_path = log_dir.join(LOG_FILE);

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let log_level_filter = log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);

    let base_config = Dispatch::new().level(log_level_filter).level_for("serde", LevelFilter::Warn);

    let console_config = Dispatch::new()
        .format(|out, message, record| {
            let colors = fern::colors::ColoredLevelConfig::new()
                .error(fern::colors::Color::Red)
                .warn(fern::colors::Color::Yellow)
                .info(fern::colors::Color::Green)
                .debug(fern::colors::Color::Blue)
                .trace(fern::colors::Color::BrightBlack);

            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .chain(std::io::stderr());

    let mut dispatch = base_config.chain(console_config);
    match fern::log_file(&log_file_path) {
        Ok(file) => {
            let file_config = Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!("[{} {} {}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), record.level(), record.target(), message))
                })
                .chain(file);
            dispatch = dispatch.chain(file_config);
        }
        Err(e) => eprintln!("Failed to open log file '{}': {}", log_file_path.display(), e),
    }

    if let Err(e) = dispatch.apply() {
        eprintln!("Failed to apply logger configuration: {}", e);
        return;
    }

    log::info!("Logger initialized. Logging to console and '{}'.", log_file_path.display());
}
