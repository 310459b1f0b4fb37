use crate::{backend::ExecutionProvider, preview::PreviewConfig, processing::expand_alphabet};
use anyhow::Context;
use bus::{BusConfig, validate_topic};
use common::{env_opt, env_or, env_string_or};
use std::{path::PathBuf, time::Duration};

pub use common::Environment;

pub const DEFAULT_DETECTOR_MODEL: &str = "yolo-v9-t-384-license-plate-end2end";
pub const DEFAULT_OCR_MODEL: &str = "global-plates-mobile-vit-v2-model";
pub const DEFAULT_PREVIEW_TITLE: &str = "FastALPR - Live Camera Feed";

/// Which models to run and how to feed them.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_dir: PathBuf,
    pub detector_model: String,
    pub ocr_model: String,
    pub detector_input_size: u32,
    pub detector_confidence: f32,
    pub ocr_img_height: u32,
    pub ocr_img_width: u32,
    pub ocr_channels: u32,
    pub ocr_max_slots: usize,
    /// Character set, ranges allowed (`0-9A-Z_`).
    pub ocr_alphabet: String,
    pub ocr_pad_char: char,
    pub provider: ExecutionProvider,
}

#[derive(Debug, Clone)]
pub struct AlprConfig {
    pub environment: Environment,
    pub otel_endpoint: Option<String>,
    pub bus: BusConfig,
    pub image_topic: String,
    pub plate_topic: String,
    pub queue_depth: usize,
    pub poll_interval_ms: u64,
    pub model: ModelConfig,
    pub preview: PreviewConfig,
}

impl AlprConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Values that fail to parse fall back to their default; values that parse
    /// but make no sense are rejected.
    pub fn from_env() -> anyhow::Result<Self> {
        let provider = env_opt("ORT_PROVIDER")
            .and_then(|s| s.parse().ok())
            .unwrap_or(ExecutionProvider::Cpu);

        let config = Self {
            environment: Environment::from_env(),
            otel_endpoint: env_opt("OTEL_ENDPOINT"),
            bus: BusConfig {
                broker_host: env_string_or("MQTT_BROKER_HOST", "localhost"),
                broker_port: env_or("MQTT_BROKER_PORT", 1883),
                client_id: env_string_or("MQTT_CLIENT_ID", "fast-alpr-node"),
                max_packet_bytes: env_or("MQTT_MAX_PACKET_BYTES", 16 * 1024 * 1024),
                keep_alive: Duration::from_secs(env_or("MQTT_KEEP_ALIVE_SECS", 30)),
            },
            image_topic: env_string_or("IMAGE_TOPIC", "camera/image_raw"),
            plate_topic: env_string_or("PLATE_TOPIC", "license_plate_data"),
            queue_depth: env_or("QUEUE_DEPTH", 10),
            poll_interval_ms: env_or("POLL_INTERVAL_MS", 100),
            model: ModelConfig {
                model_dir: PathBuf::from(env_string_or("MODEL_DIR", "models")),
                detector_model: env_string_or("DETECTOR_MODEL", DEFAULT_DETECTOR_MODEL),
                ocr_model: env_string_or("OCR_MODEL", DEFAULT_OCR_MODEL),
                detector_input_size: env_or("DETECTOR_INPUT_SIZE", 384),
                detector_confidence: env_or("DETECTOR_CONFIDENCE", 0.4),
                ocr_img_height: env_or("OCR_IMG_HEIGHT", 64),
                ocr_img_width: env_or("OCR_IMG_WIDTH", 128),
                ocr_channels: env_or("OCR_CHANNELS", 3),
                ocr_max_slots: env_or("OCR_MAX_SLOTS", 10),
                ocr_alphabet: env_string_or("OCR_ALPHABET", "0-9A-Z_"),
                ocr_pad_char: env_or("OCR_PAD_CHAR", '_'),
                provider,
            },
            preview: PreviewConfig {
                enabled: env_or("PREVIEW_ENABLED", true),
                addr: env_string_or("PREVIEW_ADDR", "127.0.0.1:8090"),
                title: env_string_or("PREVIEW_TITLE", DEFAULT_PREVIEW_TITLE),
                jpeg_quality: env_or("PREVIEW_JPEG_QUALITY", 80),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.queue_depth == 0 {
            anyhow::bail!("QUEUE_DEPTH must be at least 1");
        }
        for (name, topic) in [
            ("IMAGE_TOPIC", &self.image_topic),
            ("PLATE_TOPIC", &self.plate_topic),
        ] {
            validate_topic(topic).with_context(|| format!("{name} is not a usable topic"))?;
        }
        if self.poll_interval_ms == 0 {
            anyhow::bail!("POLL_INTERVAL_MS must be at least 1");
        }

        let model = &self.model;
        if !(0.0..=1.0).contains(&model.detector_confidence) {
            anyhow::bail!(
                "DETECTOR_CONFIDENCE must be within [0, 1], got {}",
                model.detector_confidence
            );
        }
        if model.detector_input_size == 0 || model.ocr_img_height == 0 || model.ocr_img_width == 0
        {
            anyhow::bail!("Model input sizes must be non-zero");
        }
        if !matches!(model.ocr_channels, 1 | 3) {
            anyhow::bail!("OCR_CHANNELS must be 1 or 3, got {}", model.ocr_channels);
        }
        if model.ocr_max_slots == 0 {
            anyhow::bail!("OCR_MAX_SLOTS must be at least 1");
        }
        if !expand_alphabet(&model.ocr_alphabet).contains(&model.ocr_pad_char) {
            anyhow::bail!(
                "OCR_PAD_CHAR {:?} is not part of OCR_ALPHABET {:?}",
                model.ocr_pad_char,
                model.ocr_alphabet
            );
        }

        if !(1..=100).contains(&self.preview.jpeg_quality) {
            anyhow::bail!(
                "PREVIEW_JPEG_QUALITY must be within 1..=100, got {}",
                self.preview.jpeg_quality
            );
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Create default configuration for testing
    pub fn test_default() -> Self {
        Self {
            environment: Environment::Development,
            otel_endpoint: None,
            bus: BusConfig {
                broker_host: "localhost".to_string(),
                broker_port: 1883,
                client_id: "fast-alpr-node".to_string(),
                max_packet_bytes: 16 * 1024 * 1024,
                keep_alive: Duration::from_secs(30),
            },
            image_topic: "camera/image_raw".to_string(),
            plate_topic: "license_plate_data".to_string(),
            queue_depth: 10,
            poll_interval_ms: 10,
            model: ModelConfig {
                model_dir: PathBuf::from("models"),
                detector_model: DEFAULT_DETECTOR_MODEL.to_string(),
                ocr_model: DEFAULT_OCR_MODEL.to_string(),
                detector_input_size: 384,
                detector_confidence: 0.4,
                ocr_img_height: 64,
                ocr_img_width: 128,
                ocr_channels: 3,
                ocr_max_slots: 10,
                ocr_alphabet: "0-9A-Z_".to_string(),
                ocr_pad_char: '_',
                provider: ExecutionProvider::Cpu,
            },
            preview: PreviewConfig {
                enabled: false,
                addr: "127.0.0.1:0".to_string(),
                title: DEFAULT_PREVIEW_TITLE.to_string(),
                jpeg_quality: 80,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: &[&str] = &[
        "ENVIRONMENT",
        "OTEL_ENDPOINT",
        "MQTT_BROKER_HOST",
        "MQTT_BROKER_PORT",
        "IMAGE_TOPIC",
        "PLATE_TOPIC",
        "QUEUE_DEPTH",
        "DETECTOR_CONFIDENCE",
        "OCR_CHANNELS",
        "OCR_PAD_CHAR",
        "ORT_PROVIDER",
        "PREVIEW_ENABLED",
        "PREVIEW_JPEG_QUALITY",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe { env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();

        let config = AlprConfig::from_env().unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert!(config.otel_endpoint.is_none());
        assert_eq!(config.bus.broker_host, "localhost");
        assert_eq!(config.bus.broker_port, 1883);
        assert_eq!(config.image_topic, "camera/image_raw");
        assert_eq!(config.plate_topic, "license_plate_data");
        assert_eq!(config.queue_depth, 10);
        assert_eq!(config.model.detector_model, DEFAULT_DETECTOR_MODEL);
        assert_eq!(config.model.ocr_model, DEFAULT_OCR_MODEL);
        assert_eq!(config.model.detector_input_size, 384);
        assert_eq!(config.model.provider, ExecutionProvider::Cpu);
        assert!(config.preview.enabled);
        assert_eq!(config.preview.title, "FastALPR - Live Camera Feed");
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        unsafe {
            env::set_var("ENVIRONMENT", "production");
            env::set_var("OTEL_ENDPOINT", "http://collector:4317");
            env::set_var("MQTT_BROKER_PORT", "8883");
            env::set_var("IMAGE_TOPIC", "cams/front/image");
            env::set_var("QUEUE_DEPTH", "3");
            env::set_var("ORT_PROVIDER", "cuda");
            env::set_var("PREVIEW_ENABLED", "false");
        }

        let config = AlprConfig::from_env().unwrap();

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.otel_endpoint.as_deref(), Some("http://collector:4317"));
        assert_eq!(config.bus.broker_port, 8883);
        assert_eq!(config.image_topic, "cams/front/image");
        assert_eq!(config.queue_depth, 3);
        assert_eq!(config.model.provider, ExecutionProvider::Cuda);
        assert!(!config.preview.enabled);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_unparsable_values_fall_back() {
        clear_env();
        unsafe {
            env::set_var("MQTT_BROKER_PORT", "not-a-port");
            env::set_var("ORT_PROVIDER", "tpu");
        }

        let config = AlprConfig::from_env().unwrap();

        assert_eq!(config.bus.broker_port, 1883);
        assert_eq!(config.model.provider, ExecutionProvider::Cpu);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_zero_queue_depth_rejected() {
        clear_env();
        unsafe { env::set_var("QUEUE_DEPTH", "0") };

        let err = AlprConfig::from_env().unwrap_err();

        assert!(err.to_string().contains("QUEUE_DEPTH"));
        clear_env();
    }

    #[test]
    fn test_validate_rejects_bad_model_settings() {
        let mut config = AlprConfig::test_default();
        config.model.detector_confidence = 1.5;
        assert!(config.validate().is_err());

        let mut config = AlprConfig::test_default();
        config.model.ocr_channels = 2;
        assert!(config.validate().is_err());

        let mut config = AlprConfig::test_default();
        config.model.ocr_pad_char = '#';
        assert!(config.validate().is_err());

        let mut config = AlprConfig::test_default();
        config.preview.jpeg_quality = 0;
        assert!(config.validate().is_err());

        let mut config = AlprConfig::test_default();
        config.plate_topic = "plates/#".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("PLATE_TOPIC"));

        let mut config = AlprConfig::test_default();
        config.image_topic = String::new();
        assert!(config.validate().is_err());

        assert!(AlprConfig::test_default().validate().is_ok());
    }
}
