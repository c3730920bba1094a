use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentrycamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("System error: {message}")]
    System { message: String },
}

/// Frame acquisition failures. All of these are recoverable by the
/// detection loop via sleep-and-retry; none terminate the process.
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera device: {details}")]
    DeviceOpen { details: String },

    #[error("Failed to read frame: {details}")]
    FrameRead { details: String },
}

/// Registry fetch failures. The caller degrades to an empty registry
/// rather than propagating these out of startup.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Registry request failed: {details}")]
    Request { details: String },

    #[error("Malformed registry response: {details}")]
    MalformedResponse { details: String },

    #[error("Invalid face encoding for '{name}': {details}")]
    InvalidEncoding { name: String, details: String },
}

/// Notification send failures, classified by where the attempt broke down.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification request failed: {details}")]
    Transport { details: String },

    #[error("Notification service returned status {status}")]
    HttpStatus { status: u16 },

    #[error("Malformed notification response: {details}")]
    MalformedResponse { details: String },

    #[error("Notification service reported failure: {status}")]
    Rejected { status: String },
}

impl SentrycamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SentrycamError>;
