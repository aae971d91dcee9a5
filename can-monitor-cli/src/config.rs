//! Configuration loading and merging
//!
//! Settings come from an optional TOML file and the command line; command-line
//! values win. The interval is validated after merging so a bad value from
//! either source is reported the same way.

use crate::spinner::SpinnerStyle;
use anyhow::{bail, Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Smallest refresh interval, and the step every interval must be a multiple of
pub const INTERVAL_STEP_MS: u64 = 100;
/// Largest refresh interval
pub const MAX_INTERVAL_MS: u64 = 25_500;
pub const DEFAULT_INTERVAL_MS: u64 = INTERVAL_STEP_MS;

/// Contents of the configuration file (all sections optional)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub bus: BusConfig,
    pub database: DatabaseConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BusConfig {
    pub channel: Option<String>,
    pub fd: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    /// DBC → JSON converter command run on `path` at startup
    pub converter: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub interval_ms: Option<u64>,
    pub bold: bool,
    pub show_signals: bool,
    pub spinner: SpinnerStyle,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            interval_ms: None,
            bold: false,
            show_signals: true,
            spinner: SpinnerStyle::default(),
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub channel: Option<String>,
    pub database: Option<PathBuf>,
    pub converter: Option<String>,
    pub interval_ms: Option<u64>,
    pub bold: bool,
    pub fd: bool,
    pub spinner: Option<SpinnerStyle>,
}

/// Final, validated settings for one session
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub channel: String,
    pub database: PathBuf,
    pub converter: Option<String>,
    pub fd: bool,
    pub interval: Duration,
    pub bold: bool,
    pub show_signals: bool,
    pub spinner: SpinnerStyle,
}

impl AppConfig {
    /// Apply command-line overrides and validate the result
    pub fn merge(self, overrides: Overrides) -> Result<Settings> {
        let Some(channel) = overrides.channel.or(self.bus.channel) else {
            bail!("No CAN channel given (use --channel or [bus] channel)");
        };
        let Some(database) = overrides.database.or(self.database.path) else {
            bail!("No signal database given (use --database or [database] path)");
        };

        let interval_ms = overrides
            .interval_ms
            .or(self.display.interval_ms)
            .unwrap_or(DEFAULT_INTERVAL_MS);

        Ok(Settings {
            channel,
            database,
            converter: overrides.converter.or(self.database.converter),
            fd: overrides.fd || self.bus.fd,
            interval: validate_interval(interval_ms)?,
            bold: overrides.bold || self.display.bold,
            show_signals: self.display.show_signals,
            spinner: overrides.spinner.unwrap_or(self.display.spinner),
        })
    }
}

/// Accept 100..=25500 ms in steps of 100 ms
pub fn validate_interval(ms: u64) -> Result<Duration> {
    if !(INTERVAL_STEP_MS..=MAX_INTERVAL_MS).contains(&ms) || ms % INTERVAL_STEP_MS != 0 {
        bail!(
            "Invalid interval {} ms: must be a multiple of {} between {} and {}",
            ms,
            INTERVAL_STEP_MS,
            INTERVAL_STEP_MS,
            MAX_INTERVAL_MS
        );
    }
    Ok(Duration::from_millis(ms))
}

/// Level for the log file, or `Off` when there is none.
///
/// The dashboard owns stdout and stderr, so nothing is logged to them.
pub fn log_level(verbose: u8, quiet: bool, to_file: bool) -> LevelFilter {
    if !to_file {
        return LevelFilter::Off;
    }
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
