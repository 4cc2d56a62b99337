//! Error types for registration requests and reconciliation.
//!
//! Validation errors are raised while a [`RegistrationRequest`] is built and
//! never reach the provider. Provider errors are raised while reconciling and
//! carry the failed command line, its exit code and the captured stderr.
//!
//! [`RegistrationRequest`]: crate::RegistrationRequest

use std::fmt;
use thiserror::Error;

/// A single rule violation found while validating declared attributes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Value is not a plain hostname
    #[error("{attribute}: invalid hostname '{value}'")]
    InvalidHostname {
        /// Attribute that carried the value
        attribute: String,
        /// Rejected value
        value: String,
    },

    /// Value is not one of the accepted boolean literals
    #[error("{attribute}: expected true/false or yes/no, got '{value}'")]
    InvalidBoolean {
        /// Attribute that carried the value
        attribute: String,
        /// Rejected value
        value: String,
    },

    /// Value is not an absolute http(s) URL with a host
    #[error("{attribute}: invalid URL '{value}': {reason}")]
    InvalidUrl {
        /// Attribute that carried the value
        attribute: String,
        /// Rejected value
        value: String,
        /// Why the URL was rejected
        reason: String,
    },

    /// Value is malformed for its attribute
    #[error("{attribute}: invalid value '{value}': {reason}")]
    InvalidValue {
        /// Attribute that carried the value
        attribute: String,
        /// Rejected value
        value: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Two attributes that cannot be combined were both set
    #[error("{first} and {second} are mutually exclusive")]
    ConflictingParameters {
        /// First attribute of the conflicting pair
        first: String,
        /// Second attribute of the conflicting pair
        second: String,
    },

    /// An attribute was set without the attribute it depends on
    #[error("{present} requires {missing} to be set")]
    MissingRequiredPair {
        /// Attribute that was set
        present: String,
        /// Attribute that is missing
        missing: String,
    },

    /// Attribute name is not part of the schema
    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),

    /// The namevar was not declared
    #[error("missing required attribute '{0}'")]
    MissingNamevar(String),
}

/// All violations found while constructing one resource.
///
/// Construction either yields a fully validated request or this error;
/// there is no partially built resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ResourceError {
    /// Namevar of the resource, or a placeholder when it is missing
    pub resource: String,
    /// Every violation found, in schema order
    pub errors: Vec<ValidationError>,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rhsm_register[{}]: ", self.resource)?;
        let messages: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "{}", messages.join("; "))
    }
}

/// Which provider phase failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Reading the current registration status
    StatusQuery,
    /// Registering (including config and pool attach steps)
    Registration,
    /// Unregistering
    Unregistration,
}

impl ProviderErrorKind {
    /// Get a user-friendly description of this phase.
    pub fn description(&self) -> &'static str {
        match self {
            Self::StatusQuery => "Could not read registration status",
            Self::Registration => "Registration failed",
            Self::Unregistration => "Unregistration failed",
        }
    }
}

/// Errors raised while reconciling a validated request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Status query failed or returned output that could not be interpreted
    #[error("status query failed: `{command}` {}: {stderr}", describe_exit(.exit_code))]
    StatusQueryFailed {
        /// Command line that was run (secrets redacted)
        command: String,
        /// Exit code, `None` when the process did not exit normally
        exit_code: Option<i32>,
        /// Captured stderr, or a description of the failure
        stderr: String,
    },

    /// Register, config or attach command failed
    #[error("registration failed: `{command}` {}: {stderr}", describe_exit(.exit_code))]
    RegistrationFailed {
        /// Command line that was run (secrets redacted)
        command: String,
        /// Exit code, `None` when the process did not exit normally
        exit_code: Option<i32>,
        /// Captured stderr, or a description of the failure
        stderr: String,
    },

    /// Unregister command failed
    #[error("unregistration failed: `{command}` {}: {stderr}", describe_exit(.exit_code))]
    UnregistrationFailed {
        /// Command line that was run (secrets redacted)
        command: String,
        /// Exit code, `None` when the process did not exit normally
        exit_code: Option<i32>,
        /// Captured stderr, or a description of the failure
        stderr: String,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with {code}"),
        None => "did not exit".to_string(),
    }
}

impl ProviderError {
    /// Build an error of the given kind.
    pub fn new(
        kind: ProviderErrorKind,
        command: impl Into<String>,
        exit_code: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        let command = command.into();
        let stderr = stderr.into().trim().to_string();
        match kind {
            ProviderErrorKind::StatusQuery => Self::StatusQueryFailed {
                command,
                exit_code,
                stderr,
            },
            ProviderErrorKind::Registration => Self::RegistrationFailed {
                command,
                exit_code,
                stderr,
            },
            ProviderErrorKind::Unregistration => Self::UnregistrationFailed {
                command,
                exit_code,
                stderr,
            },
        }
    }

    /// Phase the error belongs to.
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::StatusQueryFailed { .. } => ProviderErrorKind::StatusQuery,
            Self::RegistrationFailed { .. } => ProviderErrorKind::Registration,
            Self::UnregistrationFailed { .. } => ProviderErrorKind::Unregistration,
        }
    }

    /// Exit code of the failed command.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::StatusQueryFailed { exit_code, .. }
            | Self::RegistrationFailed { exit_code, .. }
            | Self::UnregistrationFailed { exit_code, .. } => *exit_code,
        }
    }

    /// Diagnostic text reported by the external tool.
    pub fn stderr(&self) -> &str {
        match self {
            Self::StatusQueryFailed { stderr, .. }
            | Self::RegistrationFailed { stderr, .. }
            | Self::UnregistrationFailed { stderr, .. } => stderr,
        }
    }

    /// Command line that failed.
    pub fn command(&self) -> &str {
        match self {
            Self::StatusQueryFailed { command, .. }
            | Self::RegistrationFailed { command, .. }
            | Self::UnregistrationFailed { command, .. } => command,
        }
    }
}

/// Any error produced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Resource construction failed
    #[error(transparent)]
    Validation(#[from] ResourceError),

    /// Reconciliation failed
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Provider settings are unusable (e.g. a bad output pattern)
    #[error("invalid provider settings: {0}")]
    Settings(String),
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
