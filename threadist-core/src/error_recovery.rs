//! Error recovery policy for the client.
//!
//! Nothing here retries. Every failure is either absorbed into a degraded
//! value (an empty story list, the onboarding route) or handed back to the
//! call site nearest the user action, which turns it into one notice.

use crate::{CoreError, DirectoryError, ErrorExt};
use tracing::warn;

/// How a failed operation is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Continue with a fallback value (usually an empty list) and notify once.
    Degrade,
    /// Send the user to the interests onboarding path.
    Onboard,
    /// Leave state untouched and notify once.
    Notify,
    /// Propagate; the user cannot fix this from inside the app.
    Fail,
}

/// Result of an error recovery attempt
#[derive(Debug)]
pub enum RecoveryResult<T> {
    /// The operation succeeded
    Recovered(T),
    /// The operation failed; the fallback value stands in and the error is kept
    /// so it can be reported
    Degraded(T, CoreError),
    /// The operation failed and the error should be propagated
    Failed(CoreError),
}

impl<T> RecoveryResult<T> {
    pub fn is_recovered(&self) -> bool {
        matches!(self, RecoveryResult::Recovered(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, RecoveryResult::Degraded(..))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RecoveryResult::Failed(_))
    }

    /// Splits into the usable value and the error that should be reported, if
    /// any.
    pub fn into_parts(self) -> Result<(T, Option<CoreError>), CoreError> {
        match self {
            RecoveryResult::Recovered(value) => Ok((value, None)),
            RecoveryResult::Degraded(value, error) => Ok((value, Some(error))),
            RecoveryResult::Failed(error) => Err(error),
        }
    }
}

pub struct ErrorRecovery;

impl ErrorRecovery {
    /// Determine the recovery strategy for an error raised while loading or
    /// displaying content.
    pub fn determine_strategy(error: &CoreError) -> RecoveryStrategy {
        match error {
            CoreError::NetworkUnavailable { .. }
            | CoreError::RequestFailed { .. }
            | CoreError::ContentApi(_)
            | CoreError::Serialization(_) => RecoveryStrategy::Degrade,

            CoreError::Directory(DirectoryError::NotConnected)
            | CoreError::Directory(DirectoryError::ConnectionFailed { .. })
            | CoreError::Directory(DirectoryError::DataInconsistency { .. })
            | CoreError::Directory(DirectoryError::Sql(_)) => RecoveryStrategy::Onboard,
            CoreError::Directory(_) => RecoveryStrategy::Notify,

            CoreError::Auth(_) | CoreError::Audio(_) | CoreError::InvalidInput { .. } => {
                RecoveryStrategy::Notify
            }

            CoreError::Config(_) | CoreError::Io(_) | CoreError::Internal { .. } => {
                RecoveryStrategy::Fail
            }
        }
    }

    /// Apply the recovery policy to a finished operation, substituting
    /// `fallback` when the error is degradable.
    pub fn recover<T>(result: Result<T, CoreError>, fallback: impl FnOnce() -> T) -> RecoveryResult<T> {
        match result {
            Ok(value) => RecoveryResult::Recovered(value),
            Err(error) => match Self::determine_strategy(&error) {
                RecoveryStrategy::Degrade | RecoveryStrategy::Onboard => {
                    warn!(
                        "Degrading after {}: {}",
                        error.error_code(),
                        error.user_friendly_message()
                    );
                    RecoveryResult::Degraded(fallback(), error)
                }
                RecoveryStrategy::Notify | RecoveryStrategy::Fail => RecoveryResult::Failed(error),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AudioError, ConfigError};
    use std::io;

    #[test]
    fn test_network_failures_degrade_to_fallback() {
        let result: Result<Vec<u32>, CoreError> = Err(CoreError::RequestFailed {
            status: 502,
            detail: "bad gateway".to_string(),
        });
        let recovered = ErrorRecovery::recover(result, Vec::new);
        assert!(recovered.is_degraded());

        let (value, error) = recovered.into_parts().unwrap();
        assert!(value.is_empty());
        assert!(matches!(error, Some(CoreError::RequestFailed { status: 502, .. })));
    }

    #[test]
    fn test_success_passes_through() {
        let recovered = ErrorRecovery::recover(Ok(vec![1, 2, 3]), Vec::new);
        assert!(recovered.is_recovered());
        let (value, error) = recovered.into_parts().unwrap();
        assert_eq!(value, vec![1, 2, 3]);
        assert!(error.is_none());
    }

    #[test]
    fn test_determine_strategy() {
        let directory_error = CoreError::Directory(DirectoryError::DataInconsistency {
            details: "orphan selection row".to_string(),
        });
        assert_eq!(
            ErrorRecovery::determine_strategy(&directory_error),
            RecoveryStrategy::Onboard
        );

        let audio_error = CoreError::Audio(AudioError::LoadFailed {
            reason: "synthesis failed".to_string(),
        });
        assert_eq!(
            ErrorRecovery::determine_strategy(&audio_error),
            RecoveryStrategy::Notify
        );

        let config_error = CoreError::Config(ConfigError::ValidationFailed {
            reason: "test".to_string(),
        });
        assert_eq!(
            ErrorRecovery::determine_strategy(&config_error),
            RecoveryStrategy::Fail
        );

        let io_error = CoreError::Io(io::Error::new(io::ErrorKind::Other, "test"));
        let result: Result<(), CoreError> = Err(io_error);
        assert!(ErrorRecovery::recover(result, || ()).is_failed());
    }
}
