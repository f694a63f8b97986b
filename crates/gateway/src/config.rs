use common::{Environment, env_opt, env_or};
use inference::{DetectorConfig, LifecycleConfig};
use std::env;

pub const SERVICE_NAME: &str = "harvest-gateway";

const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub environment: Environment,
    pub addr: String,
    pub max_upload_bytes: usize,
    /// Start loading the model before the first request arrives.
    pub load_on_startup: bool,
    pub otel_endpoint: Option<String>,
    pub detector: DetectorConfig,
    pub lifecycle: LifecycleConfig,
}

impl GatewayConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = Environment::from_env();

        let addr = env::var("GATEWAY_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string());

        let otel_endpoint = env::var("OTEL_ENDPOINT")
            .ok()
            .filter(|endpoint| !endpoint.trim().is_empty());

        let load_on_startup = match env_opt::<String>("LOAD_ON_STARTUP") {
            Some(raw) => parse_flag(&raw)?,
            None => true,
        };

        Ok(Self {
            environment,
            addr,
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            load_on_startup,
            otel_endpoint,
            detector: DetectorConfig::from_env()?,
            lifecycle: LifecycleConfig::from_env(),
        })
    }

    /// Create default configuration for testing
    pub fn test_default() -> Self {
        Self {
            environment: Environment::Development,
            addr: "127.0.0.1:0".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            load_on_startup: false,
            otel_endpoint: None,
            detector: DetectorConfig::test_default(),
            lifecycle: LifecycleConfig::default(),
        }
    }
}

fn parse_flag(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("LOAD_ON_STARTUP should be a boolean, got `{}`", other),
    }
}
