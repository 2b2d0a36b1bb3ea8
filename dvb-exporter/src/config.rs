//! Command line and configuration file handling.
//!
//! Settings come from the command line and an optional TOML file. A command
//! line value wins whenever it differs from its default; otherwise the file
//! value is used, then the default. The merged [`ExporterConfig`] is built
//! once at startup and never changes afterwards.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use log::warn;
use serde::Deserialize;
use thiserror::Error;

use crate::collector::{Strategy, DEFAULT_INTERVAL};
use crate::web;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:9437";
pub const DEFAULT_TELEMETRY_PATH: &str = "/metrics";
pub const DEFAULT_INTERVAL_TEXT: &str = "5s";
pub const DEFAULT_CONFIG_FILE: &str = "dvb-exporter.toml";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_RETENTION_DAYS: u64 = 7;

/// dvb-exporter - Prometheus exporter for DVB adapter signal quality
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address on which to expose metrics and web interface
    #[arg(short, long, default_value = DEFAULT_LISTEN)]
    pub listen: SocketAddr,

    /// Path under which to expose metrics
    #[arg(long, default_value = DEFAULT_TELEMETRY_PATH)]
    pub telemetry_path: String,

    /// Interval of collecting metrics from adapters (e.g. 5s, 500ms, 1m30s)
    #[arg(short, long, default_value = DEFAULT_INTERVAL_TEXT)]
    pub interval: String,

    /// Can be > 1, 65535 will be divided by this number to correct SNR value
    #[arg(long, default_value = "1")]
    pub snr_correction: u32,

    /// Ignore adapters list, example: 7,8,9
    #[arg(long, default_value = "")]
    pub ignore_adapters: String,

    /// Force API v5
    #[arg(long)]
    pub api_v5_force: bool,

    /// Directory holding the adapterN device directories
    #[arg(long, default_value = dvb_frontend::DEFAULT_DVB_ROOT)]
    pub dvb_root: PathBuf,

    /// Configuration file path
    #[arg(short = 'f', long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Directory where log files are stored
    #[arg(long, default_value = DEFAULT_LOG_DIR)]
    pub log_dir: PathBuf,

    /// Number of days to keep log files
    #[arg(long, default_value_t = DEFAULT_LOG_RETENTION_DAYS)]
    pub log_retention_days: u64,
}

/// Configuration file format.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub collector: CollectorSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub listen: Option<String>,
    pub telemetry_path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CollectorSection {
    pub interval: Option<String>,
    pub snr_correction: Option<u32>,
    pub ignore_adapters: Option<Vec<u32>>,
    pub api_v5_force: Option<bool>,
    pub dvb_root: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    pub log_dir: Option<PathBuf>,
    pub retention_days: Option<u64>,
    pub level: Option<String>,
    pub verbose: Option<bool>,
}

/// Configuration errors; all of them stop the process at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid listen address {0:?}")]
    ListenAddress(String),

    #[error("Invalid telemetry path {0:?}: must not be the root path, an API route or contain ':' or '*'")]
    TelemetryPath(String),

    #[error("SNR correction must be at least 1, got {0}")]
    SnrCorrection(u32),

    #[error("Invalid duration {0:?}")]
    Duration(String),
}

/// Logging settings after merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub retention_days: u64,
    pub verbose: bool,
    pub level: Option<String>,
}

/// Immutable exporter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterConfig {
    pub listen: SocketAddr,
    pub telemetry_path: String,
    /// Interval as given; see [`ExporterConfig::collect_interval`].
    pub interval: String,
    pub snr_correction: u32,
    pub ignored_adapters: BTreeSet<u32>,
    /// Ignore list entries that are not adapter numbers; see
    /// [`ExporterConfig::warn_invalid_entries`].
    pub invalid_ignore_entries: Vec<String>,
    pub strategy: Strategy,
    pub dvb_root: PathBuf,
    pub logging: LoggingConfig,
}

impl ExporterConfig {
    /// Merge command line arguments over the configuration file.
    pub fn resolve(args: &Args, file: ConfigFile) -> Result<Self, ConfigError> {
        let listen = if args.listen.to_string() != DEFAULT_LISTEN {
            args.listen
        } else if let Some(listen) = file.server.listen {
            listen
                .parse()
                .map_err(|_| ConfigError::ListenAddress(listen.clone()))?
        } else {
            args.listen
        };

        let telemetry_path = normalize_telemetry_path(pick(
            args.telemetry_path.clone(),
            DEFAULT_TELEMETRY_PATH.to_string(),
            file.server.telemetry_path,
        ))?;

        let interval = pick(
            args.interval.clone(),
            DEFAULT_INTERVAL_TEXT.to_string(),
            file.collector.interval,
        );

        let snr_correction = pick(args.snr_correction, 1, file.collector.snr_correction);
        if snr_correction < 1 {
            return Err(ConfigError::SnrCorrection(snr_correction));
        }

        let (ignored_adapters, invalid_ignore_entries) = if !args.ignore_adapters.trim().is_empty() {
            parse_ignore_list(&args.ignore_adapters)
        } else {
            let listed = file.collector.ignore_adapters.unwrap_or_default();
            (listed.into_iter().collect(), Vec::new())
        };

        let api_v5_force = args.api_v5_force || file.collector.api_v5_force.unwrap_or(false);

        let dvb_root = pick(
            args.dvb_root.clone(),
            PathBuf::from(dvb_frontend::DEFAULT_DVB_ROOT),
            file.collector.dvb_root,
        );

        let logging = LoggingConfig {
            log_dir: pick(
                args.log_dir.clone(),
                PathBuf::from(DEFAULT_LOG_DIR),
                file.logging.log_dir,
            ),
            retention_days: pick(
                args.log_retention_days,
                DEFAULT_LOG_RETENTION_DAYS,
                file.logging.retention_days,
            ),
            verbose: args.verbose || file.logging.verbose.unwrap_or(false),
            level: file.logging.level,
        };

        Ok(Self {
            listen,
            telemetry_path,
            interval,
            snr_correction,
            ignored_adapters,
            invalid_ignore_entries,
            strategy: Strategy::from_v5_force(api_v5_force),
            dvb_root,
            logging,
        })
    }

    /// Log the ignore list entries that were dropped. Resolving runs before
    /// logging is set up, so this is called afterwards.
    pub fn warn_invalid_entries(&self) {
        for item in &self.invalid_ignore_entries {
            warn!("ignoring invalid adapter number {:?} in ignore list", item);
        }
    }

    /// Parsed collection interval. An unusable value is logged and replaced
    /// by the 5 second default.
    pub fn collect_interval(&self) -> Duration {
        match parse_interval(&self.interval) {
            Ok(interval) if !interval.is_zero() => interval,
            Ok(_) => {
                warn!(
                    "collection interval {:?} is zero, using default interval {:?}",
                    self.interval, DEFAULT_INTERVAL
                );
                DEFAULT_INTERVAL
            }
            Err(e) => {
                warn!("failed to parse interval: {}, using default interval {:?}", e, DEFAULT_INTERVAL);
                DEFAULT_INTERVAL
            }
        }
    }
}

/// Command line value when it was changed from its default, else the file
/// value, else the default.
fn pick<T: PartialEq>(arg: T, default: T, file: Option<T>) -> T {
    if arg != default {
        arg
    } else {
        file.unwrap_or(arg)
    }
}

fn normalize_telemetry_path(path: String) -> Result<String, ConfigError> {
    let trimmed = path.trim();
    let normalized = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    };
    let reserved = normalized == "/" || normalized == web::ADAPTERS_PATH;
    if reserved || normalized.contains(|c: char| c == ':' || c == '*') {
        return Err(ConfigError::TelemetryPath(path));
    }
    Ok(normalized)
}

/// Load the configuration file: explicit path > auto-detect > none.
pub fn load_config(explicit: Option<&Path>) -> Result<Option<(PathBuf, ConfigFile)>, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default_path.exists() {
                return Ok(None);
            }
            default_path
        }
    };
    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;
    Ok(Some((path, config)))
}

/// Parse a comma separated adapter list such as `7,8,9`. Returns the adapter
/// numbers and the entries that are not numbers.
pub fn parse_ignore_list(list: &str) -> (BTreeSet<u32>, Vec<String>) {
    let mut adapters = BTreeSet::new();
    let mut invalid = Vec::new();
    for item in list.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        match item.parse() {
            Ok(index) => {
                adapters.insert(index);
            }
            Err(_) => invalid.push(item.to_string()),
        }
    }
    (adapters, invalid)
}

/// Parse a duration such as `5s`, `500ms`, `1m30s` or `1.5h`.
///
/// Units: `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`. Every number needs a unit.
pub fn parse_interval(input: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::Duration(input.to_string());
    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut nanos = 0f64;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_end == 0 {
            return Err(invalid());
        }
        let value: f64 = rest[..number_end].parse().map_err(|_| invalid())?;
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_end..];
        nanos += value * scale;
    }

    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Duration::from_nanos(nanos as u64))
}
