use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub transport: TransportConfig,
    pub storage: StorageConfig,
    pub call: CallConfig,
    pub recording: RecordingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
        }
    }
}

/// Media transport credentials used to mint room join tokens.
///
/// Empty key/secret is a valid startup state: the token endpoint reports
/// a server error until credentials are configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub api_key: String,
    pub api_secret: String,
    pub token_ttl_seconds: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            token_ttl_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// "s3" or "memory"
    pub backend: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub region: Option<String>,
    /// Key prefix inside the bucket (e.g. "recordings/")
    pub base_path: String,
    /// Public URL prefix for serving uploaded artifacts; empty means the
    /// raw object key is stored as the reference.
    pub public_url_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            endpoint: String::new(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            bucket: "paircall-recordings".to_string(),
            region: None,
            base_path: "recordings/".to_string(),
            public_url_prefix: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Fee charged per started minute of call time, in minor currency
    /// units. 0 means calls are free.
    pub fee_per_minute: i64,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self { fee_per_minute: 0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Minimum listing price for a recording artifact, in minor currency
    /// units. Supplied prices below this floor are raised to it.
    pub min_price: i64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self { min_price: 0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    ///
    /// Environment variables use a `PAIRCALL_` prefix with `__` as the
    /// nesting separator (e.g. `PAIRCALL_SERVER__HTTP_PORT=9090`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = path {
            if path.exists() {
                builder = builder.add_source(File::from(path));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("PAIRCALL")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }

    /// Validate the configuration, returning all problems at once.
    ///
    /// Transport credential problems are warnings: the server can start
    /// without them, the token endpoint just refuses to mint.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.http_port == 0 {
            errors.push("server.http_port must be non-zero".to_string());
        }

        match self.storage.backend.as_str() {
            "memory" => {}
            "s3" => {
                if self.storage.bucket.is_empty() {
                    errors.push("storage.bucket is required for the s3 backend".to_string());
                }
                if self.storage.endpoint.is_empty() {
                    errors.push("storage.endpoint is required for the s3 backend".to_string());
                }
            }
            other => {
                errors.push(format!("storage.backend must be \"s3\" or \"memory\", got \"{other}\""));
            }
        }

        if self.call.fee_per_minute < 0 {
            errors.push("call.fee_per_minute must not be negative".to_string());
        }
        if self.recording.min_price < 0 {
            errors.push("recording.min_price must not be negative".to_string());
        }

        if self.transport.api_key.is_empty() != self.transport.api_secret.is_empty() {
            errors.push(
                "transport credentials are incomplete: set both api_key and api_secret".to_string(),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
