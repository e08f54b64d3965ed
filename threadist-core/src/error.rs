use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Backend unreachable: {reason}")]
    NetworkUnavailable { reason: String },

    #[error("Request failed with status {status}: {detail}")]
    RequestFailed { status: u16, detail: String },

    #[error("Content API error: {0}")]
    ContentApi(#[from] ContentApiError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Interest directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Error, Debug, Clone)]
pub enum ContentApiError {
    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Text too long for speech synthesis: {length} characters, max {max}")]
    TextTooLong { length: usize, max: usize },
}

#[derive(Error, Debug, Clone)]
pub enum AuthError {
    #[error("Authentication failed: {reason}")]
    AuthFailed { reason: String },

    #[error("Session expired")]
    SessionExpired,

    #[error("Email address not confirmed")]
    EmailNotConfirmed,
}

#[derive(Error, Debug, Clone)]
pub enum AudioError {
    #[error("Audio load failed: {reason}")]
    LoadFailed { reason: String },

    #[error("Audio playback failed: {reason}")]
    PlaybackFailed { reason: String },

    #[error("No audio session is loaded")]
    NoActiveSession,
}

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Directory is not connected")]
    NotConnected,

    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Migration failed: {reason}")]
    MigrationFailed { reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Inconsistent interest data: {details}")]
    DataInconsistency { details: String },

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}

impl From<reqwest::Error> for CoreError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            CoreError::ContentApi(ContentApiError::InvalidResponse {
                details: error.to_string(),
            })
        } else if let Some(status) = error.status() {
            CoreError::RequestFailed {
                status: status.as_u16(),
                detail: error.to_string(),
            }
        } else {
            CoreError::NetworkUnavailable {
                reason: error.to_string(),
            }
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(error: sqlx::Error) -> Self {
        CoreError::Directory(DirectoryError::Sql(error))
    }
}
