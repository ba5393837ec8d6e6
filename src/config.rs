// Configuration module: builds one `Config` value from dotenv files and the
// process environment. `main` constructs it once and hands it to the API
// client and the commands; nothing reads the environment behind their back.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://x8ki-letl-twmt.n7.xano.io/api:N1uLlTBt";
pub const DEFAULT_OUTPUT_FILE: &str = "output/vm_users.json";
pub const TOKEN_ENV_VAR: &str = "DEMO_API_TOKEN";
pub const EMAIL_ENV_VAR: &str = "DEMO_API_EMAIL";
pub const PASSWORD_ENV_VAR: &str = "DEMO_API_PASSWORD";

const VALID_LOG_LEVELS: [&str; 5] = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];

/// Settings shared by every command.
#[derive(Clone)]
pub struct Config {
    pub base_url: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub debug: bool,
    pub log_level: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub output_file: PathBuf,
    /// Number of dotenv files that were found and loaded.
    pub env_files_loaded: usize,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("debug", &self.debug)
            .field("env_files_loaded", &self.env_files_loaded)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load dotenv files, then read the process environment.
    pub fn load() -> Result<Self> {
        let loaded = load_env_files(&env_file_candidates());
        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.env_files_loaded = loaded;
        Ok(config)
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            base_url: non_empty("DEMO_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.into())
                .trim_end_matches('/')
                .to_string(),
            email: non_empty(EMAIL_ENV_VAR),
            password: non_empty(PASSWORD_ENV_VAR),
            token: non_empty(TOKEN_ENV_VAR),
            debug: non_empty("DEMO_API_DEBUG").is_some_and(|v| parse_bool(&v)),
            log_level: non_empty("DEMO_API_LOG_LEVEL")
                .unwrap_or_else(|| "INFO".into())
                .to_uppercase(),
            timeout: Duration::from_secs(parse_or("DEMO_API_TIMEOUT", non_empty("DEMO_API_TIMEOUT"), 5)),
            max_retries: parse_or("DEMO_API_MAX_RETRIES", non_empty("DEMO_API_MAX_RETRIES"), 3),
            output_file: non_empty("DEMO_API_OUTPUT_FILE")
                .unwrap_or_else(|| DEFAULT_OUTPUT_FILE.into())
                .into(),
            env_files_loaded: 0,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http") {
            return Err(Error::Config(format!("invalid base URL: {}", self.base_url)));
        }
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(Error::Config(format!("invalid log level: {}", self.log_level)));
        }
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".into()));
        }
        Ok(())
    }

    pub fn has_credentials(&self) -> bool {
        self.email.is_some() && self.password.is_some()
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Tracing directive matching the configured level.
    pub fn tracing_level(&self) -> &'static str {
        if self.debug {
            return "debug";
        }
        match self.log_level.as_str() {
            "DEBUG" => "debug",
            "WARNING" => "warn",
            "ERROR" | "CRITICAL" => "error",
            _ => "info",
        }
    }

    /// Directory the default output file lives in.
    pub fn output_directory(&self) -> &Path {
        self.output_file.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Key/value view of the configuration with secrets reduced to flags.
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        vec![
            ("base_url", self.base_url.clone()),
            ("debug", self.debug.to_string()),
            ("log_level", self.log_level.clone()),
            ("timeout_secs", self.timeout.as_secs().to_string()),
            ("max_retries", self.max_retries.to_string()),
            ("output_file", self.output_file.display().to_string()),
            ("env_files_loaded", self.env_files_loaded.to_string()),
            ("email_set", self.email.is_some().to_string()),
            ("password_set", self.password.is_some().to_string()),
            ("token_set", self.token.is_some().to_string()),
        ]
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "on" | "yes" | "enabled"
    )
}

fn parse_or<T: std::str::FromStr>(key: &str, value: Option<String>, default: T) -> T {
    match value {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            debug!(key, raw = %raw, "unparsable value, using default");
            default
        }),
        None => default,
    }
}

/// Dotenv files in priority order, highest first.
pub fn env_file_candidates() -> Vec<PathBuf> {
    let mut files = vec![
        PathBuf::from(".env"),
        PathBuf::from(".env.local"),
        PathBuf::from(".env.defaults"),
    ];
    if let Some(dir) = dirs::config_dir() {
        files.push(dir.join("vmfleet").join(".env"));
    }
    files
}

/// Load each existing file without overriding variables that are already
/// set, so earlier files take precedence over later ones.
pub fn load_env_files(files: &[PathBuf]) -> usize {
    files
        .iter()
        .filter(|path| path.is_file())
        .filter(|path| match dotenvy::from_path(path) {
            Ok(()) => {
                debug!(path = %path.display(), "loaded env file");
                true
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping env file");
                false
            }
        })
        .count()
}
