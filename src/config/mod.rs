//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "moltchat";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DATABASE_PATH: &str = "data/moltchat.db";
const DEFAULT_ASSETS_DIR: &str = "assets";
const DEFAULT_REMOTE_BASE_URL: &str = "https://www.moltbook.com/api/v1";
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

/// Command-line arguments for the Moltchat binary.
#[derive(Debug, Parser)]
#[command(name = "moltchat", version, about = "Moltchat web client for Moltbook")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MOLTCHAT_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Moltchat HTTP server.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the SQLite database file path.
    #[arg(long = "database-path", value_name = "PATH")]
    pub database_path: Option<PathBuf>,

    /// Override the Moltbook API base URL.
    #[arg(long = "remote-base-url", value_name = "URL")]
    pub remote_base_url: Option<String>,

    /// Override the Moltbook API request timeout.
    #[arg(long = "remote-timeout-seconds", value_name = "SECONDS")]
    pub remote_timeout_seconds: Option<u64>,

    /// Override the static assets directory.
    #[arg(long = "assets-directory", value_name = "PATH")]
    pub assets_directory: Option<PathBuf>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub remote: RemoteSettings,
    pub assets: AssetSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub base_url: url::Url,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AssetSettings {
    pub directory: PathBuf,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("MOLTCHAT").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    remote: RawRemoteSettings,
    assets: RawAssetSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(path) = overrides.database_path.as_ref() {
            self.database.path = Some(path.clone());
        }
        if let Some(url) = overrides.remote_base_url.as_ref() {
            self.remote.base_url = Some(url.clone());
        }
        if let Some(seconds) = overrides.remote_timeout_seconds {
            self.remote.timeout_seconds = Some(seconds);
        }
        if let Some(dir) = overrides.assets_directory.as_ref() {
            self.assets.directory = Some(dir.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            remote,
            assets,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            remote: build_remote_settings(remote)?,
            assets: build_asset_settings(assets)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let candidate = format!("{host}:{port}");
    let addr = candidate
        .parse()
        .map_err(|err| LoadError::invalid("server.addr", format!("invalid `{candidate}`: {err}")))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let path = database
        .path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));
    if path.as_os_str().is_empty() {
        return Err(LoadError::invalid("database.path", "path must not be empty"));
    }

    Ok(DatabaseSettings { path })
}

fn build_remote_settings(remote: RawRemoteSettings) -> Result<RemoteSettings, LoadError> {
    let raw_url = remote
        .base_url
        .unwrap_or_else(|| DEFAULT_REMOTE_BASE_URL.to_string());
    let base_url = url::Url::parse(raw_url.trim_end_matches('/'))
        .map_err(|err| LoadError::invalid("remote.base_url", err.to_string()))?;

    let timeout_seconds = remote
        .timeout_seconds
        .unwrap_or(DEFAULT_REMOTE_TIMEOUT_SECS);
    if timeout_seconds == 0 {
        return Err(LoadError::invalid(
            "remote.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(RemoteSettings {
        base_url,
        timeout: Duration::from_secs(timeout_seconds),
    })
}

fn build_asset_settings(assets: RawAssetSettings) -> Result<AssetSettings, LoadError> {
    let directory = assets
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSETS_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "assets.directory",
            "path must not be empty",
        ));
    }

    Ok(AssetSettings { directory })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRemoteSettings {
    base_url: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAssetSettings {
    directory: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.logging.level = Some("info".to_string());

        let overrides = ServeOverrides {
            server_port: Some(4321),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    }

    #[test]
    fn remote_defaults_to_moltbook() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
        assert_eq!(
            settings.remote.base_url.as_str(),
            "https://www.moltbook.com/api/v1"
        );
        assert_eq!(settings.remote.timeout, Duration::from_secs(10));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut raw = RawSettings::default();
        raw.remote.timeout_seconds = Some(0);
        assert!(matches!(
            Settings::from_raw(raw),
            Err(LoadError::Invalid { key, .. }) if key == "remote.timeout_seconds"
        ));
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        let overrides = ServeOverrides {
            log_json: Some(true),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn default_to_serve_command() {
        let args = CliArgs::parse_from(["moltchat"]);
        let command = args
            .command
            .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
        assert!(matches!(command, Command::Serve(_)));
    }

    #[test]
    fn parse_serve_overrides() {
        let args = CliArgs::parse_from([
            "moltchat",
            "serve",
            "--server-host",
            "0.0.0.0",
            "--database-path",
            "/tmp/moltchat.db",
            "--remote-base-url",
            "http://127.0.0.1:9000/api/v1",
        ]);

        match args.command.expect("serve command") {
            Command::Serve(serve) => {
                assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
                assert_eq!(
                    serve.overrides.database_path.as_deref(),
                    Some(std::path::Path::new("/tmp/moltchat.db"))
                );
                assert_eq!(
                    serve.overrides.remote_base_url.as_deref(),
                    Some("http://127.0.0.1:9000/api/v1")
                );
            }
        }
    }
}
