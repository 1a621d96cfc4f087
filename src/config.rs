//! Configuration management for the outcome service

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
    pub auth: AuthConfig,
    pub gateway: GatewayConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Artifact bundle locations
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    /// Directory holding `encoders.json`, `scaler.json`, `model.json` and
    /// optionally `schema.json`
    pub bundle_dir: String,
    /// Per-artifact overrides; take precedence over `bundle_dir`
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default)]
    pub encoders_path: Option<String>,
    #[serde(default)]
    pub scaler_path: Option<String>,
    #[serde(default)]
    pub schema_path: Option<String>,
    /// Overrides the version tag otherwise read from or derived from the model
    #[serde(default)]
    pub model_version: Option<String>,
    /// Exit at startup when the bundle fails to load instead of serving 503
    #[serde(default)]
    pub require_on_startup: bool,
}

/// Access control configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Expected value of the `X-API-Key` header
    pub api_key: String,
}

/// Request handling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Deadline for transform + predict, in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    1000
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

/// Metrics configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between logged summaries; 0 disables the reporter
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,
}

fn default_report_interval() -> u64 {
    60
}

/// Resolved artifact file locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub encoders: PathBuf,
    pub scaler: PathBuf,
    pub schema: PathBuf,
    /// Whether the schema path was set explicitly (and so must exist)
    pub schema_required: bool,
}

impl ArtifactsConfig {
    pub fn paths(&self) -> ArtifactPaths {
        let dir = Path::new(&self.bundle_dir);
        let resolve = |explicit: &Option<String>, file: &str| {
            explicit
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(|| dir.join(file))
        };

        ArtifactPaths {
            model: resolve(&self.model_path, "model.json"),
            encoders: resolve(&self.encoders_path, "encoders.json"),
            scaler: resolve(&self.scaler_path, "scaler.json"),
            schema: resolve(&self.schema_path, "schema.json"),
            schema_required: self.schema_path.is_some(),
        }
    }
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl AppConfig {
    /// Load configuration from the default file (if present) and environment
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path.
    ///
    /// Precedence, lowest first: built-in defaults, the file, `OUTCOME__*`
    /// variables, then the bare `MODEL_PATH`, `ENCODERS_PATH`, `SCALER_PATH`,
    /// `SCHEMA_PATH` and `API_KEY` variables.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let defaults = Self::default();
        let config = Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("artifacts.bundle_dir", defaults.artifacts.bundle_dir)?
            .set_default("artifacts.require_on_startup", false)?
            .set_default("auth.api_key", defaults.auth.api_key)?
            .set_default(
                "gateway.request_timeout_ms",
                defaults.gateway.request_timeout_ms as i64,
            )?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?
            .set_default(
                "metrics.report_interval_secs",
                defaults.metrics.report_interval_secs as i64,
            )?
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("OUTCOME")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("artifacts.model_path", std::env::var("MODEL_PATH").ok())?
            .set_override_option(
                "artifacts.encoders_path",
                std::env::var("ENCODERS_PATH").ok(),
            )?
            .set_override_option("artifacts.scaler_path", std::env::var("SCALER_PATH").ok())?
            .set_override_option("artifacts.schema_path", std::env::var("SCHEMA_PATH").ok())?
            .set_override_option("auth.api_key", std::env::var("API_KEY").ok())?
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the service must not run with
    pub fn validate(&self) -> Result<()> {
        if self.auth.api_key.trim().is_empty() {
            bail!("auth.api_key must be set (or API_KEY in the environment)");
        }
        if self.gateway.request_timeout_ms == 0 {
            bail!("gateway.request_timeout_ms must be greater than zero");
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            artifacts: ArtifactsConfig {
                bundle_dir: "artifacts".to_string(),
                model_path: None,
                encoders_path: None,
                scaler_path: None,
                schema_path: None,
                model_version: None,
                require_on_startup: false,
            },
            auth: AuthConfig {
                api_key: String::new(),
            },
            gateway: GatewayConfig {
                request_timeout_ms: default_request_timeout_ms(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
            metrics: MetricsConfig {
                report_interval_secs: default_report_interval(),
            },
        }
    }
}
