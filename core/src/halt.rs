//! Halting and the pipeline's control value.
//!
//! Every stage of an action (callbacks, handler, recovery handlers) returns
//! an [`Outcome`]. `Ok(())` continues the pipeline. `Err(Flow::Halt(..))`
//! stops it and jumps straight to finalization with the halted status.
//! `Err(Flow::Raise(..))` hands the exception to the exception policy.
//!
//! ```
//! use composable_action_core::halt::{halt, Outcome};
//!
//! fn authenticate(user_id: Option<u64>) -> Outcome {
//!     if user_id.is_none() {
//!         return halt(401);
//!     }
//!     Ok(())
//! }
//!
//! assert!(authenticate(None).is_err());
//! assert!(authenticate(Some(23)).is_ok());
//! ```

use crate::error::ConfigError;
use crate::exception::Exception;

/// Status and optional body carried by a halt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Halt {
    status: u16,
    body: Option<String>,
}

impl Halt {
    /// Halt with the status table's message as body.
    #[must_use]
    pub const fn new(status: u16) -> Self {
        Self { status, body: None }
    }

    /// Halt with an explicit body.
    #[must_use]
    pub fn with_body(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: Some(body.into()),
        }
    }

    /// Halted status.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Explicit body, if one was given.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

/// Non-local exit out of a pipeline stage.
#[derive(Debug)]
pub enum Flow {
    /// Intentional stop; always becomes a response.
    Halt(Halt),
    /// A raised exception, resolved through the exception policy.
    Raise(Exception),
    /// Configuration misuse; escapes `call` without policy lookup.
    Misconfigured(ConfigError),
}

/// Result of running a pipeline stage.
pub type Outcome = Result<(), Flow>;

/// Stop the pipeline with `status`. The body defaults to the status message.
///
/// # Errors
///
/// Always returns `Err`, so it can be used with `return` or `?`.
pub const fn halt(status: u16) -> Outcome {
    Err(Flow::Halt(Halt::new(status)))
}

/// Stop the pipeline with `status` and an explicit body.
///
/// # Errors
///
/// Always returns `Err`.
pub fn halt_with(status: u16, body: impl Into<String>) -> Outcome {
    Err(Flow::Halt(Halt::with_body(status, body)))
}

/// Raise an exception into the pipeline.
///
/// # Errors
///
/// Always returns `Err`.
pub fn raise(exception: Exception) -> Outcome {
    Err(Flow::Raise(exception))
}

impl From<Halt> for Flow {
    fn from(halt: Halt) -> Self {
        Self::Halt(halt)
    }
}

/// Any error propagated with `?` becomes a raised exception, except
/// [`Exception`] and [`ConfigError`] which keep their identity.
impl<E> From<E> for Flow
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        let err = anyhow::Error::new(err);
        match err.downcast::<Exception>() {
            Ok(exception) => Self::Raise(exception),
            Err(err) => match err.downcast::<ConfigError>() {
                Ok(config) => Self::Misconfigured(config),
                Err(err) => Self::Raise(Exception::from_error(err)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::{ErrorKind, ERROR};

    static PARSE: ErrorKind = ErrorKind::child("ParseError", &ERROR);

    #[test]
    fn test_halt_without_body() {
        let Err(Flow::Halt(halted)) = halt(401) else {
            unreachable!("halt always returns a halt flow");
        };
        assert_eq!(halted.status(), 401);
        assert_eq!(halted.body(), None);
    }

    #[test]
    fn test_halt_with_body() {
        let Err(Flow::Halt(halted)) = halt_with(422, "invalid") else {
            unreachable!("halt_with always returns a halt flow");
        };
        assert_eq!(halted, Halt::with_body(422, "invalid"));
    }

    #[test]
    fn test_question_mark_keeps_exception_kind() {
        fn stage() -> Outcome {
            Err::<(), _>(Exception::new(&PARSE, "bad input"))?;
            Ok(())
        }
        match stage() {
            Err(Flow::Raise(exception)) => assert!(exception.is_a(&PARSE)),
            other => unreachable!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_question_mark_keeps_config_error() {
        fn stage() -> Outcome {
            Err::<(), _>(ConfigError::SessionDisabled)?;
            Ok(())
        }
        assert!(matches!(
            stage(),
            Err(Flow::Misconfigured(ConfigError::SessionDisabled))
        ));
    }

    #[test]
    fn test_question_mark_wraps_foreign_errors() {
        fn stage() -> Outcome {
            "abc".parse::<u32>()?;
            Ok(())
        }
        match stage() {
            Err(Flow::Raise(exception)) => {
                assert_eq!(exception.kind(), &ERROR);
                assert!(exception.message().contains("invalid digit"));
            }
            other => unreachable!("unexpected outcome: {other:?}"),
        }
    }
}
