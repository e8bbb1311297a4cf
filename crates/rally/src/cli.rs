//! Command-line arguments for `rally-server`.

use std::path::PathBuf;

use clap::Parser;

use crate::{RallyError, ServerConfig};

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV: &str = "RALLY_CONFIG";

/// Flags override the matching config file values.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "rally-server", version, about = "Authoritative paddle match server")]
pub struct Cli {
    /// TOML config file. Without one the built-in defaults are used.
    #[arg(short, long, value_name = "FILE", env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Listener address (e.g. 0.0.0.0:8080).
    #[arg(short, long, value_name = "ADDRESS")]
    pub bind: Option<String>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Emit one JSON object per log line.
    #[arg(long)]
    pub json_logs: bool,
}

impl Cli {
    /// Loads the config file, if any, then applies the flags on top.
    pub fn load_config(&self) -> Result<ServerConfig, RallyError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json_logs {
            config.logging.json_format = true;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_parse() {
        let cli = Cli::try_parse_from([
            "rally-server",
            "-c",
            "rally.toml",
            "--bind",
            "0.0.0.0:9000",
            "-l",
            "debug",
            "--json-logs",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("rally.toml")));
        assert_eq!(cli.bind.as_deref(), Some("0.0.0.0:9000"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(cli.json_logs);
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(Cli::try_parse_from(["rally-server", "--frobnicate"]).is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli {
            bind: Some("0.0.0.0:9000".into()),
            log_level: Some("warn".into()),
            json_logs: true,
            ..Cli::default()
        };

        let config = cli.load_config().unwrap();
        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.logging.level, "warn");
        assert!(config.logging.json_format);
        assert_eq!(config.write_timeout_ms, ServerConfig::default().write_timeout_ms);
    }

    #[test]
    fn test_missing_config_file_is_read_error() {
        let cli = Cli {
            config: Some(PathBuf::from("/definitely/not/here/rally.toml")),
            ..Cli::default()
        };
        assert!(matches!(cli.load_config(), Err(RallyError::ConfigRead { .. })));
    }
}
