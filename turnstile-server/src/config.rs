//! Server configuration and CLI argument parsing
//!
//! Settings come from four places, highest priority first:
//! 1. CLI arguments
//! 2. Environment variables (with TURNSTILE_ prefix)
//! 3. Configuration file given with `--config` (YAML, TOML or JSON)
//! 4. Default values
//!
//! # Example Usage
//!
//! ```bash
//! # Using CLI arguments
//! turnstile --algorithm token-bucket --capacity 5 --rate 1
//!
//! # Using environment variables
//! export TURNSTILE_ALGORITHM=fixed-window
//! export TURNSTILE_CAPACITY=10
//! export TURNSTILE_RATE=1
//! turnstile
//!
//! # Using a configuration file, overriding one value
//! turnstile --config turnstile.yaml --port 9090
//! ```

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use turnstile::{AdmissionConfig, Algorithm, KeyScope};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_LOG_LEVEL: &str = "info";
const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Main configuration structure for the server
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listener configuration
    pub http: HttpConfig,
    /// Admission controller settings
    pub admission: AdmissionConfig,
    /// Key requests by the first X-Forwarded-For address when present
    pub trust_forwarded_for: bool,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl HttpConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow!("Invalid listen address {}:{}: {}", self.host, self.port, e))
    }
}

/// Contents of a configuration file
///
/// Every field is optional; missing ones fall back to the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub algorithm: Option<Algorithm>,
    pub capacity_or_limit: Option<u64>,
    pub refill_rate_per_sec_or_window_seconds: Option<f64>,
    pub scope: Option<KeyScope>,
    pub reaper_period_secs: Option<u64>,
    pub entry_ttl_secs: Option<u64>,
    pub store_capacity: Option<usize>,
    pub trust_forwarded_for: Option<bool>,
    pub log_level: Option<String>,
}

impl FileConfig {
    /// Load a configuration file, format chosen by its extension
    pub fn load(path: &Path) -> Result<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("Configuration path is not valid UTF-8: {}", path.display()))?;

        config::Config::builder()
            .add_source(config::File::with_name(path_str))
            .build()
            .and_then(|c| c.try_deserialize::<FileConfig>())
            .with_context(|| format!("Failed to load configuration file: {}", path.display()))
    }
}

/// Command-line arguments for the server
///
/// All arguments can also be set via environment variables with the
/// TURNSTILE_ prefix. CLI arguments take precedence over environment
/// variables, which take precedence over the configuration file.
#[derive(Parser, Debug, Default)]
#[command(
    name = "turnstile",
    about = "HTTP admission gateway",
    long_about = "An HTTP admission gateway that rate limits clients by IP address.\n\nEnvironment variables with TURNSTILE_ prefix are supported. CLI arguments take precedence over environment variables, which take precedence over the configuration file."
)]
pub struct Args {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file (yaml, toml or json)",
        env = "TURNSTILE_CONFIG"
    )]
    pub config: Option<std::path::PathBuf>,

    // HTTP
    #[arg(long, value_name = "HOST", help = "HTTP host [default: 127.0.0.1]", env = "TURNSTILE_HOST")]
    pub host: Option<String>,
    #[arg(long, value_name = "PORT", help = "HTTP port [default: 8080]", env = "TURNSTILE_PORT")]
    pub port: Option<u16>,

    // Admission
    #[arg(
        long,
        value_name = "ALGORITHM",
        help = "Algorithm: token-bucket, fixed-window [default: token-bucket]",
        env = "TURNSTILE_ALGORITHM"
    )]
    pub algorithm: Option<Algorithm>,
    #[arg(
        long,
        value_name = "N",
        help = "Bucket capacity or admissions per window [default: 10]",
        env = "TURNSTILE_CAPACITY"
    )]
    pub capacity: Option<u64>,
    #[arg(
        long,
        value_name = "NUMBER",
        help = "Tokens per second or window length in seconds [default: 10]",
        env = "TURNSTILE_RATE"
    )]
    pub rate: Option<f64>,
    #[arg(
        long,
        value_name = "SCOPE",
        help = "Key scope: per-key, global [default: per-key]",
        env = "TURNSTILE_SCOPE"
    )]
    pub scope: Option<KeyScope>,
    #[arg(
        long,
        value_name = "SECS",
        help = "Seconds between reaper sweeps [default: 30]",
        env = "TURNSTILE_REAPER_PERIOD"
    )]
    pub reaper_period: Option<u64>,
    #[arg(
        long,
        value_name = "SECS",
        help = "Idle seconds before a key is evicted [default: 10]",
        env = "TURNSTILE_ENTRY_TTL"
    )]
    pub entry_ttl: Option<u64>,
    #[arg(
        long,
        value_name = "SIZE",
        help = "Initial store capacity [default: 1000, max: 10000000]",
        env = "TURNSTILE_STORE_CAPACITY"
    )]
    pub store_capacity: Option<usize>,
    #[arg(
        long,
        help = "Key requests by the first X-Forwarded-For address",
        env = "TURNSTILE_TRUST_FORWARDED_FOR"
    )]
    pub trust_forwarded_for: Option<bool>,

    // General options
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace [default: info]",
        env = "TURNSTILE_LOG_LEVEL"
    )]
    pub log_level: Option<String>,

    // Utility options
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl Config {
    /// Build configuration from CLI arguments, environment and config file
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or any
    /// setting is invalid.
    pub fn from_env_and_args() -> Result<Self> {
        // Clap resolves CLI arguments over environment variables
        let args = Args::parse();

        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        Self::merge(args, file)
    }

    /// Combine parsed arguments with file settings and defaults
    pub fn merge(args: Args, file: FileConfig) -> Result<Self> {
        let defaults = AdmissionConfig::default();

        let config = Config {
            http: HttpConfig {
                host: args
                    .host
                    .or(file.host)
                    .unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: args.port.or(file.port).unwrap_or(DEFAULT_PORT),
            },
            admission: AdmissionConfig {
                algorithm: args
                    .algorithm
                    .or(file.algorithm)
                    .unwrap_or(defaults.algorithm),
                capacity_or_limit: args
                    .capacity
                    .or(file.capacity_or_limit)
                    .unwrap_or(defaults.capacity_or_limit),
                refill_rate_per_sec_or_window_seconds: args
                    .rate
                    .or(file.refill_rate_per_sec_or_window_seconds)
                    .unwrap_or(defaults.refill_rate_per_sec_or_window_seconds),
                reaper_period_secs: args
                    .reaper_period
                    .or(file.reaper_period_secs)
                    .unwrap_or(defaults.reaper_period_secs),
                entry_ttl_secs: args
                    .entry_ttl
                    .or(file.entry_ttl_secs)
                    .unwrap_or(defaults.entry_ttl_secs),
                scope: args.scope.or(file.scope).unwrap_or(defaults.scope),
                store_capacity: args
                    .store_capacity
                    .or(file.store_capacity)
                    .unwrap_or(defaults.store_capacity),
            },
            trust_forwarded_for: args
                .trust_forwarded_for
                .or(file.trust_forwarded_for)
                .unwrap_or(false),
            log_level: args
                .log_level
                .or(file.log_level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error for an unusable listen address, an unknown log
    /// level, or invalid admission settings.
    fn validate(&self) -> Result<()> {
        self.http.socket_addr()?;

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(anyhow!(
                "Invalid log level: {}. Valid options are: {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            ));
        }

        self.admission
            .validate()
            .map_err(|e| anyhow!("Invalid admission settings: {}", e))?;

        Ok(())
    }

    /// Print all available environment variables and their descriptions
    fn print_env_vars() {
        println!("Turnstile Environment Variables");
        println!("===============================");
        println!();
        println!("All environment variables use the TURNSTILE_ prefix.");
        println!("CLI arguments take precedence over environment variables,");
        println!("which take precedence over the configuration file.");
        println!();

        println!("General Configuration:");
        println!("  TURNSTILE_CONFIG=<file>               Configuration file (yaml, toml or json)");
        println!(
            "  TURNSTILE_LOG_LEVEL=<level>           Log level: error, warn, info, debug, trace [default: info]"
        );
        println!();

        println!("HTTP Configuration:");
        println!("  TURNSTILE_HOST=<host>                 HTTP host [default: 127.0.0.1]");
        println!("  TURNSTILE_PORT=<port>                 HTTP port [default: 8080]");
        println!(
            "  TURNSTILE_TRUST_FORWARDED_FOR=true|false  Key by X-Forwarded-For [default: false]"
        );
        println!();

        println!("Admission Configuration:");
        println!(
            "  TURNSTILE_ALGORITHM=<name>            token-bucket, fixed-window [default: token-bucket]"
        );
        println!(
            "  TURNSTILE_CAPACITY=<n>                Bucket capacity or admissions per window [default: 10]"
        );
        println!(
            "  TURNSTILE_RATE=<number>               Tokens per second or window seconds [default: 10]"
        );
        println!("  TURNSTILE_SCOPE=<scope>               per-key, global [default: per-key]");
        println!(
            "  TURNSTILE_REAPER_PERIOD=<secs>        Seconds between reaper sweeps [default: 30]"
        );
        println!(
            "  TURNSTILE_ENTRY_TTL=<secs>            Idle seconds before eviction [default: 10]"
        );
        println!(
            "  TURNSTILE_STORE_CAPACITY=<size>       Initial store capacity [default: 1000, max: 10000000]"
        );
        println!();

        println!("Examples:");
        println!("  # Five request burst per client, one per second sustained");
        println!("  export TURNSTILE_ALGORITHM=token-bucket");
        println!("  export TURNSTILE_CAPACITY=5");
        println!("  export TURNSTILE_RATE=1");
        println!();
        println!("  # Run server (CLI args override env vars)");
        println!("  turnstile --port 9090");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::merge(Args::default(), FileConfig::default()).unwrap();

        assert_eq!(
            config.http,
            HttpConfig {
                host: "127.0.0.1".to_string(),
                port: 8080
            }
        );
        assert_eq!(config.admission, AdmissionConfig::default());
        assert!(!config.trust_forwarded_for);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_args_override_file() {
        let args = Args {
            port: Some(9090),
            capacity: Some(5),
            ..Args::default()
        };
        let file = FileConfig {
            port: Some(7070),
            host: Some("0.0.0.0".to_string()),
            capacity_or_limit: Some(50),
            algorithm: Some(Algorithm::FixedWindow),
            refill_rate_per_sec_or_window_seconds: Some(1.0),
            ..FileConfig::default()
        };

        let config = Config::merge(args, file).unwrap();
        assert_eq!(config.http.port, 9090);
        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.admission.capacity_or_limit, 5);
        assert_eq!(config.admission.algorithm, Algorithm::FixedWindow);
    }

    #[test]
    fn test_invalid_admission_settings_fail() {
        let args = Args {
            capacity: Some(0),
            ..Args::default()
        };
        let err = Config::merge(args, FileConfig::default()).unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }

    #[test]
    fn test_oversized_store_capacity_fails() {
        let args = Args {
            store_capacity: Some(usize::MAX),
            ..Args::default()
        };
        let err = Config::merge(args, FileConfig::default()).unwrap_err();
        assert!(err.to_string().contains("store capacity"));
    }

    #[test]
    fn test_invalid_log_level_fails() {
        let args = Args {
            log_level: Some("verbose".to_string()),
            ..Args::default()
        };
        assert!(Config::merge(args, FileConfig::default()).is_err());
    }

    #[test]
    fn test_invalid_host_fails() {
        let args = Args {
            host: Some("not a host".to_string()),
            ..Args::default()
        };
        assert!(Config::merge(args, FileConfig::default()).is_err());
    }

    #[test]
    fn test_parse_cli_arguments() {
        let args = Args::try_parse_from([
            "turnstile",
            "--algorithm",
            "fixed-window",
            "--capacity",
            "10",
            "--rate",
            "1",
            "--scope",
            "global",
            "--trust-forwarded-for",
            "true",
        ])
        .unwrap();

        let config = Config::merge(args, FileConfig::default()).unwrap();
        assert_eq!(config.admission.algorithm, Algorithm::FixedWindow);
        assert_eq!(config.admission.scope, KeyScope::Global);
        assert!(config.trust_forwarded_for);
    }

    #[test]
    fn test_unknown_algorithm_is_rejected_by_parser() {
        let result = Args::try_parse_from(["turnstile", "--algorithm", "leaky-bucket"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "host: 0.0.0.0\nport: 4443\nalgorithm: fixed-window\ncapacity_or_limit: 10\nrefill_rate_per_sec_or_window_seconds: 1\nscope: global\nentry_ttl_secs: 20"
        )
        .unwrap();

        let loaded = FileConfig::load(file.path()).unwrap();
        assert_eq!(loaded.port, Some(4443));
        assert_eq!(loaded.algorithm, Some(Algorithm::FixedWindow));
        assert_eq!(loaded.scope, Some(KeyScope::Global));

        let config = Config::merge(Args::default(), loaded).unwrap();
        assert_eq!(config.http.port, 4443);
        assert_eq!(config.admission.entry_ttl_secs, 20);
    }

    #[test]
    fn test_missing_file_fails() {
        assert!(FileConfig::load(Path::new("/nonexistent/turnstile.yaml")).is_err());
    }
}
