//! Configuration module for docrelay.

use serde::Deserialize;
use std::path::Path;

use crate::{RelayError, Result};

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Environment mode ("development" or "production").
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Externally visible base URL, used to build local download links.
    ///
    /// Empty means "derive from the bound address".
    #[serde(default)]
    pub public_url: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            public_url: String::new(),
        }
    }
}

impl ServerConfig {
    /// Whether error responses may carry internal details.
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

/// Web layer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// CORS allowed origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Upload rate limit per client IP (requests per minute, 0 disables).
    #[serde(default = "default_upload_rate_limit")]
    pub upload_rate_limit: u32,
    /// Take the client IP from `X-Forwarded-For` / `X-Real-IP`.
    ///
    /// Only enable behind a reverse proxy that overwrites these headers.
    #[serde(default)]
    pub trust_proxy: bool,
}

fn default_upload_rate_limit() -> u32 {
    30
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            cors_origins: vec![],
            upload_rate_limit: default_upload_rate_limit(),
            trust_proxy: false,
        }
    }
}

/// File acceptance configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    /// Maximum upload size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
}

fn default_max_upload_size() -> u64 {
    10
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            max_upload_size_mb: default_max_upload_size(),
        }
    }
}

impl FilesConfig {
    /// Maximum upload size in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Upload endpoint behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Owner namespace used when the caller does not send one.
    #[serde(default = "default_owner")]
    pub default_owner: String,
    /// Reject uploads without an owner identifier instead of defaulting.
    #[serde(default)]
    pub require_owner: bool,
    /// Signed link validity for `/upload`, in seconds.
    #[serde(default = "default_link_expiry")]
    pub link_expiry_secs: u64,
    /// Signed link validity for `/upload-word`, in seconds.
    #[serde(default = "default_word_link_expiry")]
    pub word_link_expiry_secs: u64,
}

/// Longest signed link validity accepted in configuration (7 days).
pub const MAX_LINK_EXPIRY_SECS: u64 = 7 * 24 * 3600;

fn default_owner() -> String {
    "default".to_string()
}

fn default_link_expiry() -> u64 {
    3600 // 1 hour
}

fn default_word_link_expiry() -> u64 {
    7 * 24 * 3600 // 7 days
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            default_owner: default_owner(),
            require_owner: false,
            link_expiry_secs: default_link_expiry(),
            word_link_expiry_secs: default_word_link_expiry(),
        }
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    /// Local filesystem with self-served signed links.
    #[default]
    Local,
    /// S3-compatible object storage.
    #[serde(alias = "gcs")]
    S3,
    /// Supabase Storage.
    Supabase,
    /// No backend; uploads answer 503.
    #[serde(alias = "none")]
    Disabled,
}

impl std::str::FromStr for StorageProvider {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(StorageProvider::Local),
            "s3" | "gcs" => Ok(StorageProvider::S3),
            "supabase" => Ok(StorageProvider::Supabase),
            "disabled" | "none" => Ok(StorageProvider::Disabled),
            other => Err(RelayError::Config(format!(
                "unknown storage provider: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StorageProvider::Local => "local",
            StorageProvider::S3 => "s3",
            StorageProvider::Supabase => "supabase",
            StorageProvider::Disabled => "disabled",
        };
        f.write_str(name)
    }
}

/// Local filesystem storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalStorageConfig {
    /// Path to the storage directory.
    #[serde(default = "default_local_path")]
    pub path: String,
    /// Secret used to sign download links. Empty means a random per-process secret.
    #[serde(default)]
    pub signing_secret: String,
}

fn default_local_path() -> String {
    "data/uploads".to_string()
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            path: default_local_path(),
            signing_secret: String::new(),
        }
    }
}

/// S3-compatible storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct S3StorageConfig {
    /// Bucket name.
    #[serde(default)]
    pub bucket: String,
    /// Region.
    #[serde(default = "default_s3_region")]
    pub region: String,
    /// Custom endpoint (MinIO, GCS interoperability, ...).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Project identifier, reported by the health check.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Path to a JSON key file holding `access_key_id` and `secret_access_key`.
    ///
    /// Without one the default AWS credential chain is used.
    #[serde(default)]
    pub key_file: Option<String>,
    /// Use path-style addressing.
    #[serde(default = "default_force_path_style")]
    pub force_path_style: bool,
}

fn default_s3_region() -> String {
    "us-east-1".to_string()
}

fn default_force_path_style() -> bool {
    true
}

impl Default for S3StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: default_s3_region(),
            endpoint: None,
            project_id: None,
            key_file: None,
            force_path_style: default_force_path_style(),
        }
    }
}

/// Supabase Storage configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SupabaseStorageConfig {
    /// Project URL (e.g. `https://xyz.supabase.co`).
    #[serde(default)]
    pub url: String,
    /// Service key.
    #[serde(default)]
    pub key: String,
    /// Bucket name.
    #[serde(default)]
    pub bucket: String,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    /// Selected provider.
    #[serde(default)]
    pub provider: StorageProvider,
    /// Local provider settings.
    #[serde(default)]
    pub local: LocalStorageConfig,
    /// S3 provider settings.
    #[serde(default)]
    pub s3: S3StorageConfig,
    /// Supabase provider settings.
    #[serde(default)]
    pub supabase: SupabaseStorageConfig,
}

impl StorageConfig {
    /// Why the selected provider cannot be used, if it cannot.
    pub fn missing_settings(&self) -> Option<String> {
        match self.provider {
            StorageProvider::Local => None,
            StorageProvider::Disabled => Some("storage provider is disabled".to_string()),
            StorageProvider::S3 if self.s3.bucket.is_empty() => {
                Some("storage.s3.bucket is not set".to_string())
            }
            StorageProvider::S3 => None,
            StorageProvider::Supabase => {
                let s = &self.supabase;
                if s.url.is_empty() || s.key.is_empty() || s.bucket.is_empty() {
                    Some("Supabase credentials not provided".to_string())
                } else {
                    None
                }
            }
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/docrelay.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Web layer configuration.
    #[serde(default)]
    pub web: WebConfig,
    /// File acceptance configuration.
    #[serde(default)]
    pub files: FilesConfig,
    /// Upload endpoint configuration.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(RelayError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RelayError::Validation(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Empty variables are ignored.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("DOCRELAY_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| RelayError::Config(format!("invalid PORT: {port}")))?;
        }
        if let Some(env) = get("DOCRELAY_ENV") {
            self.server.environment = env;
        }
        if let Some(url) = get("DOCRELAY_PUBLIC_URL") {
            self.server.public_url = url;
        }
        if let Some(origins) = get("CORS_ORIGINS") {
            self.web.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(provider) = get("STORAGE_PROVIDER") {
            self.storage.provider = provider.parse()?;
        }
        if let Some(secret) = get("STORAGE_SIGNING_SECRET") {
            self.storage.local.signing_secret = secret;
        }
        if let Some(bucket) = get("STORAGE_BUCKET") {
            self.storage.s3.bucket = bucket;
        }
        if let Some(project) = get("STORAGE_PROJECT_ID") {
            self.storage.s3.project_id = Some(project);
        }
        if let Some(key_file) = get("STORAGE_KEY_FILE") {
            self.storage.s3.key_file = Some(key_file);
        }
        if let Some(url) = get("SUPABASE_URL") {
            self.storage.supabase.url = url;
        }
        if let Some(key) = get("SUPABASE_KEY") {
            self.storage.supabase.key = key;
        }
        if let Some(bucket) = get("SUPABASE_BUCKET") {
            self.storage.supabase.bucket = bucket;
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.files.max_upload_size_mb == 0 {
            return Err(RelayError::Validation(
                "files.max_upload_size_mb must be greater than zero".to_string(),
            ));
        }
        let fits_in_memory = self
            .files
            .max_upload_size_mb
            .checked_mul(1024 * 1024)
            .and_then(|bytes| usize::try_from(bytes).ok())
            .is_some();
        if !fits_in_memory {
            return Err(RelayError::Validation(format!(
                "files.max_upload_size_mb is too large: {}",
                self.files.max_upload_size_mb
            )));
        }
        for (key, secs) in [
            ("upload.link_expiry_secs", self.upload.link_expiry_secs),
            ("upload.word_link_expiry_secs", self.upload.word_link_expiry_secs),
        ] {
            if secs == 0 || secs > MAX_LINK_EXPIRY_SECS {
                return Err(RelayError::Validation(format!(
                    "{key} must be between 1 and {MAX_LINK_EXPIRY_SECS} seconds, got {secs}"
                )));
            }
        }
        if !crate::upload::is_valid_owner_id(&self.upload.default_owner) {
            return Err(RelayError::Validation(format!(
                "upload.default_owner is not a valid owner identifier: {:?}",
                self.upload.default_owner
            )));
        }
        Ok(())
    }
}
