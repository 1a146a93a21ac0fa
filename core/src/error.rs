//! Error types that escape an action's `call`.

use crate::exception::Exception;
use thiserror::Error;

/// Programmer errors raised at the point of misuse.
///
/// These never go through the exception policy: a misconfigured action
/// fails the call immediately.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A numeric status that is not in the status table.
    #[error("unknown HTTP status code: {0}")]
    UnknownStatus(u16),

    /// A symbolic status name that does not map to any code.
    #[error("unknown HTTP status name: {0:?}")]
    UnknownStatusName(String),

    /// A format symbol with no registered MIME type.
    #[error("unknown format: {0:?}")]
    UnknownFormat(String),

    /// Session or flash accessed while session support is disabled.
    #[error(
        "session support is disabled; enable sessions in AppConfig to use the session or flash"
    )]
    SessionDisabled,

    /// A recovery name that is neither a registered handler nor a status.
    #[error("unknown exception recovery: {0:?}")]
    UnknownRecovery(String),

    /// A redirect helper called with a status that is not a redirection.
    #[error("not a redirect status: {0}")]
    NotARedirect(u16),
}

/// Failure of an action's `call`.
///
/// Halts and policy-recovered exceptions never surface here; they always
/// produce a response.
#[derive(Debug, Error)]
pub enum ActionError {
    /// A raised exception that matched nothing in the exception policy.
    #[error("unhandled exception: {0}")]
    Unhandled(#[source] Exception),

    /// Configuration misuse detected while handling the request.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ActionError {
    /// The unhandled exception, if this is one.
    #[must_use]
    pub const fn exception(&self) -> Option<&Exception> {
        match self {
            Self::Unhandled(exception) => Some(exception),
            Self::Config(_) => None,
        }
    }
}
