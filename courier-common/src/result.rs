use std::{borrow::Cow, fmt};

use serde::{Deserialize, Serialize};

/// Classification tag attached to a failed delivery
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Timeout,
    ConnectionError,
    ServiceUnavailable,
    RateLimited,
    TemporaryFailure,
    ValidationError,
    SimulatedFailure,
    InternalError,
    Panic,
    Other(String),
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Timeout => "TIMEOUT",
            Self::ConnectionError => "CONNECTION_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::RateLimited => "RATE_LIMITED",
            Self::TemporaryFailure => "TEMPORARY_FAILURE",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::SimulatedFailure => "SIMULATED_FAILURE",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Panic => "PANIC",
            Self::Other(code) => code,
        }
    }

    /// Whether waiting and trying again could plausibly change the outcome
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::ConnectionError
                | Self::ServiceUnavailable
                | Self::RateLimited
                | Self::TemporaryFailure
        )
    }
}

impl From<&str> for ErrorCode {
    fn from(value: &str) -> Self {
        match value {
            "TIMEOUT" => Self::Timeout,
            "CONNECTION_ERROR" => Self::ConnectionError,
            "SERVICE_UNAVAILABLE" => Self::ServiceUnavailable,
            "RATE_LIMITED" => Self::RateLimited,
            "TEMPORARY_FAILURE" => Self::TemporaryFailure,
            "VALIDATION_ERROR" => Self::ValidationError,
            "SIMULATED_FAILURE" => Self::SimulatedFailure,
            "INTERNAL_ERROR" => Self::InternalError,
            "PANIC" => Self::Panic,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = Cow::<str>::deserialize(deserializer)?;
        Ok(Self::from(s.as_ref()))
    }
}

/// Outcome of one try at handing a notification to its channel.
///
/// Never persisted; the orchestrator folds it into a delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub success: bool,
    pub error_message: Option<String>,
    pub error_code: Option<ErrorCode>,
}

impl DeliveryResult {
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            success: true,
            error_message: None,
            error_code: None,
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            error_code: None,
        }
    }

    #[must_use]
    pub fn failure_with_code(message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            error_code: Some(code),
        }
    }

    /// Failure for a validation rule the notification broke
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::failure_with_code(message, ErrorCode::ValidationError)
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        !self.success
    }

    #[must_use]
    pub fn has_error_code(&self, code: &ErrorCode) -> bool {
        self.error_code.as_ref() == Some(code)
    }

    /// A failure carrying one of the transient codes
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.is_failure() && self.error_code.as_ref().is_some_and(ErrorCode::is_transient)
    }
}
