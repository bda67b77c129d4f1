//! Command-line, environment and config-file settings for the `relay` binary.
//!
//! Precedence: flags and `RELAY_*` environment variables, then the JSON
//! config file named by `--config`, then built-in defaults.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::Parser;
use relay_core::HttpVersion;
use serde::Deserialize;

#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Relay a text payload as the body of an HTTP POST")]
pub struct Cli {
    /// JSON settings file
    #[arg(long, env = "RELAY_CONFIG")]
    pub config: Option<PathBuf>,
    /// Target host name, also used for TLS SNI
    #[arg(long, env = "RELAY_HOST")]
    pub host: Option<String>,
    /// Target port (default 443 with TLS, 80 without)
    #[arg(long, env = "RELAY_PORT")]
    pub port: Option<String>,
    /// Use TLS
    #[arg(long, env = "RELAY_TLS")]
    pub tls: Option<bool>,
    /// Request target, path plus query
    #[arg(long, env = "RELAY_TARGET")]
    pub target: Option<String>,
    /// Sent as `Authorization: Bearer <key>`
    #[arg(long, env = "RELAY_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    /// 10 for HTTP/1.0, 11 for HTTP/1.1
    #[arg(long, env = "RELAY_HTTP_VERSION")]
    pub http_version: Option<i32>,
    /// Write logs to this file instead of stderr
    #[arg(long, env = "RELAY_LOG_FILE")]
    pub log_file: Option<PathBuf>,
    /// Emit JSON log lines
    #[arg(long)]
    pub json_logs: bool,
    /// Payload text; read from `--body-file` or stdin when absent
    #[arg(long, conflicts_with = "body_file")]
    pub body: Option<String>,
    #[arg(long)]
    pub body_file: Option<PathBuf>,
}

/// Contents of a `--config` file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<String>,
    pub use_tls: Option<bool>,
    pub target: Option<String>,
    pub api_key: Option<String>,
    pub http_version: Option<i32>,
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("unsupported http version {0} (expected 10 or 11)")]
    HttpVersion(i32),
}

/// Fully resolved settings for one relay call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub host: String,
    pub port: String,
    pub use_tls: bool,
    pub target: String,
    pub api_key: String,
    pub http_version: HttpVersion,
    pub log_file: Option<PathBuf>,
    pub json_logs: bool,
}

pub fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl Settings {
    pub fn resolve(cli: &Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let host = cli.host.clone().or(file.host).ok_or(ConfigError::Missing("host"))?;
        let use_tls = cli.tls.or(file.use_tls).unwrap_or(false);
        let port = cli
            .port
            .clone()
            .or(file.port)
            .unwrap_or_else(|| if use_tls { "443" } else { "80" }.to_string());
        let api_key = cli
            .api_key
            .clone()
            .or(file.api_key)
            .ok_or(ConfigError::Missing("api_key"))?;
        let code = cli.http_version.or(file.http_version).unwrap_or(11);
        let http_version = HttpVersion::from_code(code).ok_or(ConfigError::HttpVersion(code))?;

        Ok(Settings {
            host,
            port,
            use_tls,
            target: cli.target.clone().or(file.target).unwrap_or_else(|| "/".to_string()),
            api_key,
            http_version,
            log_file: cli.log_file.clone().or(file.log_file),
            json_logs: cli.json_logs,
        })
    }
}

/// The payload: `--body`, else `--body-file`, else all of stdin.
pub fn read_body(cli: &Cli) -> io::Result<String> {
    if let Some(body) = &cli.body {
        return Ok(body.clone());
    }
    if let Some(path) = &cli.body_file {
        return fs::read_to_string(path);
    }
    let mut body = String::new();
    io::stdin().read_to_string(&mut body)?;
    Ok(body)
}
