//! Error types for the cascade core.
//!
//! Two layers exist. [`ErrorDetail`] is the serializable payload that travels
//! inside replies and completions; it is what a remote service reports and what
//! the API layer finally shows. [`CascadeError`] is the crate-wide Rust error,
//! classified into the four fault families through [`CascadeError::kind`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Well-known error codes carried by [`ErrorDetail`]
pub mod codes {
    pub const OPERATION_FAILURE: &str = "SYS.OPERATION_FAILURE";
    pub const TIMEOUT: &str = "SYS.TIMEOUT";
    pub const INTERNAL: &str = "SYS.INTERNAL";
    pub const MALFORMED_ACTION: &str = "CASCADE.MALFORMED_ACTION";
    pub const CONFIGURATION: &str = "CASCADE.CONFIGURATION";
    pub const TRANSPORT: &str = "MSG.TRANSPORT";
    pub const NO_ROUTE: &str = "MSG.NO_ROUTE";
}

/// Serializable error description attached to failed replies and completions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            details: None,
        }
    }

    /// Generic operational failure, the most common remote error
    pub fn operation_failure(description: impl Into<String>) -> Self {
        Self::new(codes::OPERATION_FAILURE, description)
    }

    pub fn timeout(description: impl Into<String>) -> Self {
        Self::new(codes::TIMEOUT, description)
    }

    pub fn internal(description: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL, description)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn is_timeout(&self) -> bool {
        self.code == codes::TIMEOUT
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.description)?;
        if let Some(details) = &self.details {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorDetail {}

/// Fault family of a [`CascadeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Startup wiring or capability lookup problem; never retried
    ConfigurationFault,
    /// A remote reply reported failure
    RemoteOperationFailure,
    /// A bounded wait expired
    TimeoutFault,
    /// A dispatcher or check handler refused the operation
    VetoFault,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CascadeError {
    #[error("Duplicate capability key '{key}' in {registry} registry")]
    DuplicateCapability { registry: String, key: String },

    #[error("No extension registered in {registry} registry for capability key '{key}'")]
    CapabilityNotFound { registry: String, key: String },

    #[error("Configuration error for {component}: {reason}")]
    Configuration { component: String, reason: String },

    #[error("Malformed cascade action: {reason}")]
    MalformedAction { reason: String },

    #[error("Remote operation failed: {0}")]
    RemoteOperation(ErrorDetail),

    #[error("Timeout error for operation {operation}: {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("Operation vetoed: {reason}")]
    Veto { reason: String },
}

impl CascadeError {
    pub fn configuration(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            component: component.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedAction {
            reason: reason.into(),
        }
    }

    pub fn veto(reason: impl Into<String>) -> Self {
        Self::Veto {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateCapability { .. }
            | Self::CapabilityNotFound { .. }
            | Self::Configuration { .. }
            | Self::MalformedAction { .. } => ErrorKind::ConfigurationFault,
            Self::RemoteOperation(_) => ErrorKind::RemoteOperationFailure,
            Self::Timeout { .. } => ErrorKind::TimeoutFault,
            Self::Veto { .. } => ErrorKind::VetoFault,
        }
    }

    /// Convert into the wire-level detail reported through completions
    pub fn to_error_detail(&self) -> ErrorDetail {
        match self {
            Self::RemoteOperation(detail) => detail.clone(),
            Self::Timeout { .. } => ErrorDetail::timeout(self.to_string()),
            Self::MalformedAction { .. } => {
                ErrorDetail::new(codes::MALFORMED_ACTION, self.to_string())
            }
            Self::DuplicateCapability { .. }
            | Self::CapabilityNotFound { .. }
            | Self::Configuration { .. } => {
                ErrorDetail::new(codes::CONFIGURATION, self.to_string())
            }
            Self::Veto { reason } => ErrorDetail::operation_failure(reason.clone()),
        }
    }
}

impl From<CascadeError> for ErrorDetail {
    fn from(error: CascadeError) -> Self {
        error.to_error_detail()
    }
}

impl From<ErrorDetail> for CascadeError {
    fn from(detail: ErrorDetail) -> Self {
        CascadeError::RemoteOperation(detail)
    }
}

impl From<config::ConfigError> for CascadeError {
    fn from(error: config::ConfigError) -> Self {
        CascadeError::configuration("ConfigManager", error.to_string())
    }
}

pub type CascadeResult<T> = Result<T, CascadeError>;
