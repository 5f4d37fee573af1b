// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates required fields and provides sensible defaults for optional ones
use crate::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub matrix: MatrixConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// File the configuration was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MatrixConfig {
    #[serde(default)]
    pub home_server: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default = "default_device_name")]
    pub device_name: String,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            home_server: String::new(),
            user_id: String::new(),
            password: None,
            access_token: None,
            device_name: default_device_name(),
        }
    }
}

// Custom Debug impl to redact sensitive fields
impl std::fmt::Debug for MatrixConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixConfig")
            .field("home_server", &self.home_server)
            .field("user_id", &self.user_id)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("device_name", &self.device_name)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Leading token marking a message as a command, matched with one trailing space
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Infractions tolerated before the sender is muted
    #[serde(default = "default_threshold")]
    pub threshold: i64,
    /// Senders at or above this power level are exempt
    #[serde(default = "default_moderator_power_level")]
    pub moderator_power_level: i64,
    /// Power level assigned to muted senders; must be negative
    #[serde(default = "default_mute_power_level")]
    pub mute_power_level: i64,
    #[serde(default = "default_redaction_reason")]
    pub redaction_reason: String,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            moderator_power_level: default_moderator_power_level(),
            mute_power_level: default_mute_power_level(),
            redaction_reason: default_redaction_reason(),
        }
    }
}

/// Argument vectors for commands delegated to the operating system.
/// The first element is the program; nothing from the chat ever reaches these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_list_command")]
    pub list: Vec<String>,
    #[serde(default = "default_date_command")]
    pub date: Vec<String>,
    #[serde(default = "default_help_command")]
    pub help: Vec<String>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            list: default_list_command(),
            date: default_date_command(),
            help: default_help_command(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub console_logging: ConsoleLoggingConfig,
    #[serde(default)]
    pub file_logging: FileLoggingConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console_logging: ConsoleLoggingConfig::default(),
            file_logging: FileLoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleLoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ConsoleLoggingConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileLoggingConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Directory for daily rolling log files; defaults to the XDG log dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Address for the Prometheus scrape endpoint, e.g. "127.0.0.1:9464"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<SocketAddr>,
}

fn default_device_name() -> String {
    "warden".to_string()
}

fn default_command_prefix() -> String {
    "!c".to_string()
}

fn default_threshold() -> i64 {
    3
}

fn default_moderator_power_level() -> i64 {
    50
}

fn default_mute_power_level() -> i64 {
    -1
}

fn default_redaction_reason() -> String {
    "not a moderator, please use threads".to_string()
}

fn default_list_command() -> Vec<String> {
    let argv: &[&str] = if cfg!(target_os = "windows") {
        &["cmd", "/C", "dir"]
    } else if cfg!(target_os = "macos") {
        &["ls"]
    } else {
        &["ls", "-al"]
    };
    argv.iter().map(|s| s.to_string()).collect()
}

fn default_date_command() -> Vec<String> {
    let argv: &[&str] = if cfg!(target_os = "windows") {
        &["cmd", "/C", "date", "/T"]
    } else if cfg!(target_os = "macos") {
        &["date"]
    } else {
        &["date", "--utc"]
    };
    argv.iter().map(|s| s.to_string()).collect()
}

fn default_help_command() -> Vec<String> {
    vec!["help.sh".to_string()]
}

fn default_database_path() -> String {
    paths::database_file().to_string_lossy().to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// Paths are left as given when the home directory is unknown
fn expand_tilde(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(base_dirs) = directories::BaseDirs::new() {
            return base_dirs
                .home_dir()
                .join(stripped)
                .to_string_lossy()
                .to_string();
        }
    }
    path.to_string()
}

impl Config {
    /// Find the config file, checking multiple locations in order:
    /// 1. explicit path (from the command line)
    /// 2. WARDEN_CONFIG_PATH env var (if set)
    /// 3. ./config.toml (current directory - for development)
    /// 4. ~/.config/warden/config.toml (XDG config dir)
    fn find_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if !path.exists() {
                anyhow::bail!("Config file '{}' does not exist", path.display());
            }
            return Ok(Some(path.to_path_buf()));
        }

        if let Ok(env_path) = std::env::var("WARDEN_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if !path.exists() {
                anyhow::bail!("WARDEN_CONFIG_PATH '{}' does not exist", env_path);
            }
            return Ok(Some(path));
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Ok(Some(local_config));
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Ok(Some(xdg_config));
        }

        Ok(None)
    }

    /// Load configuration from a TOML file with environment variable overrides.
    /// Matrix credentials are checked separately by [`Config::validate_matrix`]
    /// so offline tooling can run without them.
    ///
    /// Runs before logging is installed, so nothing here logs; the chosen
    /// file is recorded in [`Config::source`] instead.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(config_path) = Self::find_config_file(explicit)? {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            let mut config = Self::from_toml(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?;
            config.source = Some(config_path);
            config
        } else {
            Config::default()
        };

        config.apply_env_overrides()?;
        config.storage.database = expand_tilde(&config.storage.database);
        if let Some(dir) = config.logging.file_logging.directory.take() {
            config.logging.file_logging.directory = Some(expand_tilde(&dir));
        }
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str::<Config>(content)?)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("MATRIX_HOME_SERVER") {
            self.matrix.home_server = val;
        }
        if let Ok(val) = std::env::var("MATRIX_USER_ID") {
            self.matrix.user_id = val;
        }
        if let Ok(val) = std::env::var("MATRIX_PASSWORD") {
            self.matrix.password = Some(val);
        }
        if let Ok(val) = std::env::var("MATRIX_ACCESS_TOKEN") {
            self.matrix.access_token = Some(val);
        }
        if let Ok(val) = std::env::var("MATRIX_DEVICE_NAME") {
            self.matrix.device_name = val;
        }
        if let Ok(val) = std::env::var("WARDEN_COMMAND_PREFIX") {
            self.bot.command_prefix = val;
        }
        if let Ok(val) = std::env::var("WARDEN_DATABASE_PATH") {
            self.storage.database = val;
        }
        if let Ok(val) = std::env::var("WARDEN_MODERATION_THRESHOLD") {
            self.moderation.threshold = val.parse().with_context(|| {
                format!("WARDEN_MODERATION_THRESHOLD must be an integer, got: {}", val)
            })?;
        }
        Ok(())
    }

    /// Checks that apply regardless of whether the bot connects to Matrix
    pub fn validate(&self) -> Result<()> {
        if self.bot.command_prefix.trim().is_empty() {
            anyhow::bail!("bot.command_prefix must not be empty");
        }
        if self.moderation.threshold < 1 {
            anyhow::bail!(
                "moderation.threshold must be at least 1, got {}",
                self.moderation.threshold
            );
        }
        if self.moderation.mute_power_level >= 0 {
            anyhow::bail!(
                "moderation.mute_power_level must be negative, got {}",
                self.moderation.mute_power_level
            );
        }
        for (name, argv) in [
            ("commands.list", &self.commands.list),
            ("commands.date", &self.commands.date),
            ("commands.help", &self.commands.help),
        ] {
            if argv.first().map_or(true, |p| p.trim().is_empty()) {
                anyhow::bail!("{} must name a program", name);
            }
        }
        Ok(())
    }

    /// Checks required before logging in to the homeserver
    pub fn validate_matrix(&self) -> Result<()> {
        let matrix = &self.matrix;
        if matrix.home_server.trim().is_empty() {
            anyhow::bail!(
                "matrix.home_server is required (set in config.toml or MATRIX_HOME_SERVER env var)"
            );
        }
        if matrix.user_id.trim().is_empty() {
            anyhow::bail!(
                "matrix.user_id is required (set in config.toml or MATRIX_USER_ID env var)"
            );
        }
        if !matrix.user_id.starts_with('@') || !matrix.user_id.contains(':') {
            anyhow::bail!("matrix.user_id must be in the form @name:domain");
        }
        if matrix.password.is_none() && matrix.access_token.is_none() {
            anyhow::bail!("Either matrix.password or matrix.access_token is required");
        }
        Ok(())
    }

    /// The prefix as it must appear at the start of a message body
    pub fn command_prefix(&self) -> String {
        format!("{} ", self.bot.command_prefix.trim_end())
    }
}
