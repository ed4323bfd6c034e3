use config::{Config, ConfigError, Environment, File};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_PATHS: [&str; 3] = [
    "/etc/restore-agent/agent.toml",
    "~/.config/restore-agent/agent.toml",
    "restore-agent.toml",
];

/// Benign message `psql` prints when replaying a dump onto an initialized cluster.
pub const DEFAULT_IGNORED_ERROR_PATTERN: &str = r#"ERROR:\s*role "postgres" already exists"#;

const ENV_PREFIX: &str = "RESTORE_AGENT";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    pub storage: StorageConfig,
    pub postgresql: PostgresqlConfig,
    pub restore: RestoreConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// "local" or "s3"
    pub provider: String,
    /// Root directory for the local provider
    pub root: Option<PathBuf>,
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostgresqlConfig {
    pub data_dir: PathBuf,
    pub wal_archive_dir: PathBuf,
    /// Service account owning the data directory
    pub owner: String,
    pub stop_command: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RestoreConfig {
    /// Archives are gzip compressed
    pub compressed: bool,
    /// Archives are encrypted with `openssl enc -aes-256-cbc` using this key
    pub encryption_key: Option<String>,
    /// Run extraction as the PostgreSQL owner through `sudo -u`
    pub use_sudo: bool,
    pub psql_command: String,
    pub ignored_error_patterns: Vec<String>,
}

fn expand(path: &str) -> String {
    shellexpand::full(path)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Loads the agent configuration.
///
/// Sources, lowest precedence first: built-in defaults, each existing file of
/// [`CONFIG_PATHS`], `explicit` (which must exist when given), then
/// `RESTORE_AGENT__SECTION__KEY` environment variables.
pub fn load_config(explicit: Option<&Path>) -> Result<AgentConfig, ConfigError> {
    let config_builder = Config::builder()
        .set_default("storage.provider", "local")?
        .set_default("storage.root", "/var/lib/restore-agent/backups")?
        .set_default("postgresql.data_dir", "/var/lib/postgresql/data")?
        .set_default("postgresql.wal_archive_dir", "/mnt/wal_archive")?
        .set_default("postgresql.owner", "postgres")?
        .set_default("postgresql.stop_command", "systemctl stop postgresql")?
        .set_default("restore.compressed", true)?
        .set_default("restore.use_sudo", true)?
        .set_default("restore.psql_command", "psql -U os_admin")?
        .set_default(
            "restore.ignored_error_patterns",
            vec![DEFAULT_IGNORED_ERROR_PATTERN],
        )?;

    let config_builder = CONFIG_PATHS.iter().fold(config_builder, |builder, path| {
        let path = expand(path);
        if Path::new(&path).exists() {
            debug!("Adding configuration file {path}");
            builder.add_source(File::with_name(&path))
        } else {
            builder
        }
    });

    let config_builder = match explicit {
        Some(path) => {
            info!("Using configuration file {}", path.display());
            config_builder.add_source(File::from(path).required(true))
        }
        None => config_builder,
    };

    config_builder
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()
}

/// Renders the configuration as TOML with secrets masked.
pub fn render_config(config: &AgentConfig) -> Result<String, toml::ser::Error> {
    let mut masked = config.clone();
    if masked.storage.secret_key.is_some() {
        masked.storage.secret_key = Some("********".to_string());
    }
    if masked.restore.encryption_key.is_some() {
        masked.restore.encryption_key = Some("********".to_string());
    }
    toml::to_string_pretty(&masked)
}
