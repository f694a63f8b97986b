use common::{Backoff, env_opt, env_or, env_parse};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda,
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" | "0" => Ok(Device::Cuda),
            other => Err(format!(
                "{} is not a supported device. Use either `cpu` or `cuda`.",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub model_path: PathBuf,
    pub device: Device,
    pub input_size: (u32, u32),
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    /// Raw class names in model output order.
    pub class_names: Vec<String>,
}

impl DetectorConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let model_path = env::var("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("weights/best.onnx"));

        let device = match env::var("MODEL_DEVICE") {
            Ok(raw) => raw.parse().map_err(anyhow::Error::msg)?,
            Err(_) => Device::Cpu,
        };

        let input_size = env_parse("INPUT_SIZE", 640u32)?;

        let class_names = env::var("CLASS_NAMES")
            .ok()
            .map(|raw| parse_class_names(&raw))
            .filter(|names| !names.is_empty())
            .unwrap_or_else(default_class_names);

        let config = Self {
            model_path,
            device,
            input_size: (input_size, input_size),
            confidence_threshold: env_parse("CONFIDENCE_THRESHOLD", 0.40)?,
            iou_threshold: env_parse("IOU_THRESHOLD", 0.45)?,
            max_detections: env_parse("MAX_DETECTIONS", 100)?,
            class_names,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            anyhow::bail!(
                "CONFIDENCE_THRESHOLD should be within 0.0-1.0, got {}",
                self.confidence_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            anyhow::bail!(
                "IOU_THRESHOLD should be within 0.0-1.0, got {}",
                self.iou_threshold
            );
        }
        if self.input_size.0 == 0 || self.input_size.1 == 0 {
            anyhow::bail!("INPUT_SIZE must be positive");
        }
        if self.max_detections == 0 {
            anyhow::bail!("MAX_DETECTIONS must be positive");
        }
        Ok(())
    }

    /// Create default configuration for testing
    pub fn test_default() -> Self {
        Self {
            model_path: PathBuf::from("/models/best.onnx"),
            device: Device::Cpu,
            input_size: (640, 640),
            confidence_threshold: 0.40,
            iou_threshold: 0.45,
            max_detections: 100,
            class_names: default_class_names(),
        }
    }
}

/// How callers wait on and retry the shared detector load.
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleConfig {
    /// `None` waits for an in-flight load indefinitely.
    pub load_wait_timeout: Option<Duration>,
    pub retry: Backoff,
}

impl LifecycleConfig {
    pub fn from_env() -> Self {
        Self {
            load_wait_timeout: env_opt::<u64>("LOAD_WAIT_TIMEOUT_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            retry: Backoff::from_millis(
                env_or("LOAD_RETRY_BASE_MS", 0),
                env_or("LOAD_RETRY_MAX_MS", 30_000),
            ),
        }
    }
}

fn default_class_names() -> Vec<String> {
    ["Primordia", "Muda", "Matang"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn parse_class_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}
