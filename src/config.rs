use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SentrycamConfig {
    pub camera: CameraConfig,
    pub detection: DetectionConfig,
    pub api: ApiConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Seconds to wait before reopening the device after open failure
    #[serde(default = "default_open_retry_seconds")]
    pub open_retry_seconds: u64,

    /// Seconds to wait before retrying after a failed frame read
    #[serde(default = "default_read_retry_seconds")]
    pub read_retry_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectionConfig {
    /// Maximum face-distance for a positive identity match
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Mean-luma level below which a frame counts as blacked out
    #[serde(default = "default_darkness_threshold")]
    pub darkness_threshold: f64,

    /// Per-pixel luma delta that counts as change for motion detection
    #[serde(default = "default_motion_delta_threshold")]
    pub motion_delta_threshold: u8,

    /// Fraction of changed pixels that triggers a motion event
    #[serde(default = "default_motion_area_fraction")]
    pub motion_area_fraction: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    /// Base URL shared by the face registry and notification services
    #[serde(default)]
    pub base_url: String,

    /// Bearer token presented to both services
    #[serde(default)]
    pub auth_token: String,

    /// Recipient identity (account email) for registry lookup and alerts
    #[serde(default)]
    pub recipient: String,

    /// Optional geolocation endpoint used to enrich alert bodies
    #[serde(default)]
    pub geolocation_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NotifyConfig {
    /// Minimum spacing between two alerts sharing an event key, in minutes
    #[serde(default = "default_debounce_minutes")]
    pub debounce_minutes: u64,

    /// Delay before a failed send is retried, in minutes
    #[serde(default = "default_retry_minutes")]
    pub retry_minutes: u64,

    /// Timeout for a single outbound send, in seconds
    #[serde(default = "default_send_timeout_seconds")]
    pub send_timeout_seconds: u64,
}

impl NotifyConfig {
    pub fn debounce_interval(&self) -> Duration {
        Duration::from_secs(self.debounce_minutes * 60)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_minutes * 60)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_seconds)
    }
}

impl SentrycamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("sentrycam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            // Start with default values
            .set_default("camera.open_retry_seconds", default_open_retry_seconds())?
            .set_default("camera.read_retry_seconds", default_read_retry_seconds())?
            .set_default(
                "detection.confidence_threshold",
                default_confidence_threshold(),
            )?
            .set_default("detection.darkness_threshold", default_darkness_threshold())?
            .set_default(
                "detection.motion_delta_threshold",
                default_motion_delta_threshold() as i64,
            )?
            .set_default(
                "detection.motion_area_fraction",
                default_motion_area_fraction(),
            )?
            .set_default("api.base_url", "")?
            .set_default("api.auth_token", "")?
            .set_default("api.recipient", "")?
            .set_default("api.geolocation_url", "")?
            .set_default("notify.debounce_minutes", default_debounce_minutes())?
            .set_default("notify.retry_minutes", default_retry_minutes())?
            .set_default(
                "notify.send_timeout_seconds",
                default_send_timeout_seconds(),
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with SENTRYCAM_ prefix
            .add_source(Environment::with_prefix("SENTRYCAM").separator("_"))
            .build()?;

        let config: SentrycamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.is_empty() {
            return Err(ConfigError::Message(
                "api.base_url must be set".to_string(),
            ));
        }

        if self.api.recipient.is_empty() {
            return Err(ConfigError::Message(
                "api.recipient must be set".to_string(),
            ));
        }

        if self.detection.confidence_threshold <= 0.0 {
            return Err(ConfigError::Message(
                "Confidence threshold must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.detection.motion_area_fraction) {
            return Err(ConfigError::Message(
                "Motion area fraction must be between 0 and 1".to_string(),
            ));
        }

        if self.notify.debounce_minutes == 0 {
            return Err(ConfigError::Message(
                "Notification debounce interval must be greater than 0".to_string(),
            ));
        }

        if self.notify.retry_minutes == 0 {
            return Err(ConfigError::Message(
                "Notification retry interval must be greater than 0".to_string(),
            ));
        }

        if self.notify.send_timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "Notification send timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for SentrycamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                open_retry_seconds: default_open_retry_seconds(),
                read_retry_seconds: default_read_retry_seconds(),
            },
            detection: DetectionConfig {
                confidence_threshold: default_confidence_threshold(),
                darkness_threshold: default_darkness_threshold(),
                motion_delta_threshold: default_motion_delta_threshold(),
                motion_area_fraction: default_motion_area_fraction(),
            },
            api: ApiConfig {
                base_url: String::new(),
                auth_token: String::new(),
                recipient: String::new(),
                geolocation_url: String::new(),
            },
            notify: NotifyConfig {
                debounce_minutes: default_debounce_minutes(),
                retry_minutes: default_retry_minutes(),
                send_timeout_seconds: default_send_timeout_seconds(),
            },
        }
    }
}

// Default value functions
fn default_open_retry_seconds() -> u64 {
    3
}
fn default_read_retry_seconds() -> u64 {
    2
}

fn default_confidence_threshold() -> f64 {
    0.6
}
fn default_darkness_threshold() -> f64 {
    10.0
}
fn default_motion_delta_threshold() -> u8 {
    25
}
fn default_motion_area_fraction() -> f64 {
    0.05
}

fn default_debounce_minutes() -> u64 {
    15
}
fn default_retry_minutes() -> u64 {
    5
}
fn default_send_timeout_seconds() -> u64 {
    10
}
