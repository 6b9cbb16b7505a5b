use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variables that override file settings.
const ENV_HOST: &str = "SCRIBE_HOST";
const ENV_PORT: &str = "SCRIBE_PORT";
const ENV_DATABASE: &str = "SCRIBE_DATABASE";
const ENV_STATIC_DIR: &str = "SCRIBE_STATIC_DIR";

/// Top-level configuration, loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub blog: BlogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body; bounds avatar uploads.
    pub max_body_bytes: usize,
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            max_body_bytes: 4 * 1024 * 1024,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Lifetime of a session without "remember me".
    pub session_ttl_secs: u64,
    /// Lifetime of a "remember me" session.
    pub remember_ttl_secs: u64,
    /// PBKDF2 rounds for newly hashed passwords.
    pub password_hash_iterations: u32,
    pub allow_registration: bool,
    /// Mark cookies `Secure` (serve over HTTPS only).
    pub secure_cookies: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 24 * 3600,
            remember_ttl_secs: 365 * 24 * 3600,
            password_hash_iterations: crate::auth::password::DEFAULT_ITERATIONS,
            allow_registration: true,
            secure_cookies: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file. Defaults to `<data dir>/blog.db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    /// Served under `/static`. Defaults to `<data dir>/static`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BlogConfig {
    /// Shown in the navigation bar and page titles.
    pub title: String,
    pub posts_per_page: u32,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            title: "Scribe".into(),
            posts_per_page: crate::posts::DEFAULT_PAGE_SIZE,
        }
    }
}

impl Config {
    /// Load from `path` (or the default location). A missing file yields
    /// defaults. Env overrides are applied and the result validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path()?,
        };

        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let parsed: Self = toml::from_str(&raw)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?;
            tracing::info!(path = %path.display(), "Loaded config");
            parsed
        } else {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SCRIBE_*` overrides. `lookup` is injectable for tests.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(host) = non_empty(ENV_HOST) {
            self.gateway.host = host;
        }
        if let Some(port) = non_empty(ENV_PORT) {
            self.gateway.port = port
                .parse()
                .with_context(|| format!("{ENV_PORT} is not a valid port: {port}"))?;
        }
        if let Some(db) = non_empty(ENV_DATABASE) {
            self.storage.database = Some(PathBuf::from(db));
        }
        if let Some(dir) = non_empty(ENV_STATIC_DIR) {
            self.storage.static_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.blog.posts_per_page == 0 {
            bail!("blog.posts_per_page must be at least 1");
        }
        if self.auth.session_ttl_secs == 0 || self.auth.remember_ttl_secs == 0 {
            bail!("auth session TTLs must be non-zero");
        }
        if self.auth.password_hash_iterations == 0 {
            bail!("auth.password_hash_iterations must be non-zero");
        }
        if self.gateway.max_body_bytes == 0 {
            bail!("gateway.max_body_bytes must be non-zero");
        }
        Ok(())
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.storage.database {
            Some(p) => Ok(p.clone()),
            None => Ok(default_data_dir()?.join("blog.db")),
        }
    }

    pub fn static_dir(&self) -> Result<PathBuf> {
        match &self.storage.static_dir {
            Some(p) => Ok(p.clone()),
            None => Ok(default_data_dir()?.join("static")),
        }
    }

    /// Write this config as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config dir: {}", parent.display()))?;
        }
        let rendered = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, rendered)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "scribe")
        .context("Could not determine a home directory for scribe")
}

/// `<config dir>/config.toml`, e.g. `~/.config/scribe/config.toml`.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

/// Per-user data directory, e.g. `~/.local/share/scribe`.
pub fn default_data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}
