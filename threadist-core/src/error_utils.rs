use crate::error::*;
use tracing::{error, info, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    /// Whether the user may reasonably try the same action again. The client
    /// never retries on its own.
    fn is_retryable(&self) -> bool;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::ContentApi(e) => {
                error!("Content API error details: {:?}", e);
            }
            CoreError::Auth(e) => {
                error!("Auth error details: {:?}", e);
            }
            CoreError::Audio(e) => {
                error!("Audio error details: {:?}", e);
            }
            CoreError::Directory(e) => {
                error!("Directory error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::NetworkUnavailable { .. } => true,
            CoreError::RequestFailed { status, .. } => *status >= 500 || *status == 429,
            CoreError::Audio(e) => e.is_retryable(),
            CoreError::Directory(e) => e.is_retryable(),
            _ => false,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::NetworkUnavailable { .. } => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::RequestFailed { detail, .. } => format!("Request failed: {}", detail),
            CoreError::ContentApi(e) => e.user_friendly_message(),
            CoreError::Auth(e) => e.user_friendly_message(),
            CoreError::Audio(e) => e.user_friendly_message(),
            CoreError::Directory(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::InvalidInput { message } => format!("Invalid input: {}", message),
            _ => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::NetworkUnavailable { .. } => "NETWORK_UNAVAILABLE".to_string(),
            CoreError::RequestFailed { .. } => "REQUEST_FAILED".to_string(),
            CoreError::ContentApi(_) => "CONTENT_API".to_string(),
            CoreError::Auth(_) => "AUTH".to_string(),
            CoreError::Audio(_) => "AUDIO".to_string(),
            CoreError::Directory(_) => "DIRECTORY".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::InvalidInput { .. } => "INVALID_INPUT".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
        }
    }
}

impl ErrorExt for ContentApiError {
    fn log_error(&self) -> &Self {
        error!("ContentApiError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ContentApiError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ContentApiError::InvalidResponse { .. } => {
                "The server sent an unexpected response. Please try again later.".to_string()
            }
            ContentApiError::TextTooLong { max, .. } => {
                format!("This story is too long to narrate (max {} characters).", max)
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ContentApiError::InvalidResponse { .. } => "CONTENT_INVALID_RESPONSE".to_string(),
            ContentApiError::TextTooLong { .. } => "CONTENT_TEXT_TOO_LONG".to_string(),
        }
    }
}

impl ErrorExt for AuthError {
    fn log_error(&self) -> &Self {
        error!("AuthError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("AuthError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn user_friendly_message(&self) -> String {
        match self {
            AuthError::AuthFailed { reason } => format!("Sign-in failed: {}", reason),
            AuthError::SessionExpired => "Your session has expired. Please sign in again.".to_string(),
            AuthError::EmailNotConfirmed => {
                "Please confirm your email address before continuing.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            AuthError::AuthFailed { .. } => "AUTH_FAILED".to_string(),
            AuthError::SessionExpired => "AUTH_SESSION_EXPIRED".to_string(),
            AuthError::EmailNotConfirmed => "AUTH_EMAIL_NOT_CONFIRMED".to_string(),
        }
    }
}

impl ErrorExt for AudioError {
    fn log_error(&self) -> &Self {
        error!("AudioError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("AudioError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(self, AudioError::LoadFailed { .. })
    }

    fn user_friendly_message(&self) -> String {
        match self {
            AudioError::LoadFailed { .. } => {
                "Could not generate audio for this story. Please try again.".to_string()
            }
            AudioError::PlaybackFailed { .. } => "Audio playback stopped unexpectedly.".to_string(),
            AudioError::NoActiveSession => "Nothing is playing right now.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            AudioError::LoadFailed { .. } => "AUDIO_LOAD_FAILED".to_string(),
            AudioError::PlaybackFailed { .. } => "AUDIO_PLAYBACK_FAILED".to_string(),
            AudioError::NoActiveSession => "AUDIO_NO_SESSION".to_string(),
        }
    }
}

impl ErrorExt for DirectoryError {
    fn log_error(&self) -> &Self {
        error!("DirectoryError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("DirectoryError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            DirectoryError::ConnectionFailed { .. } | DirectoryError::TransactionFailed { .. }
        )
    }

    fn user_friendly_message(&self) -> String {
        match self {
            DirectoryError::ConnectionFailed { .. } | DirectoryError::NotConnected => {
                "Could not reach your saved interests. Please try again.".to_string()
            }
            DirectoryError::TransactionFailed { .. } => {
                "Your interests could not be saved. Your previous choices were kept.".to_string()
            }
            DirectoryError::DataInconsistency { .. } => {
                "Your saved interests look incomplete. Please pick them again.".to_string()
            }
            _ => "Interest data error occurred. Please try again.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            DirectoryError::NotConnected => "DIR_NOT_CONNECTED".to_string(),
            DirectoryError::ConnectionFailed { .. } => "DIR_CONNECTION_FAILED".to_string(),
            DirectoryError::MigrationFailed { .. } => "DIR_MIGRATION_FAILED".to_string(),
            DirectoryError::TransactionFailed { .. } => "DIR_TRANSACTION_FAILED".to_string(),
            DirectoryError::DataInconsistency { .. } => "DIR_DATA_INCONSISTENCY".to_string(),
            DirectoryError::Sql(_) => "DIR_SQL_ERROR".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => {
                "Configuration file not found. Please check the installation.".to_string()
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            _ => "Configuration error occurred. Please check your settings.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::ValidationFailed { .. } => "CONFIG_VALIDATION_FAILED".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

pub struct ErrorReporter {
    report_errors: bool,
    report_warnings: bool,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            report_errors: true,
            report_warnings: true,
        }
    }

    pub fn with_error_reporting(mut self, enabled: bool) -> Self {
        self.report_errors = enabled;
        self
    }

    pub fn with_warning_reporting(mut self, enabled: bool) -> Self {
        self.report_warnings = enabled;
        self
    }

    pub fn report_error(&self, error: &CoreError) {
        if self.report_errors {
            error.log_error();
            info!("Error code: {}", error.error_code());
            info!("User message: {}", error.user_friendly_message());
            if error.is_retryable() {
                info!("Error is transient; the user may try again");
            }
        }
    }

    pub fn report_warning(&self, error: &CoreError) {
        if self.report_warnings {
            error.log_warn();
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}
