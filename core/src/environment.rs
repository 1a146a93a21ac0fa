//! Injected dependencies.
//!
//! All outside-world collaborators of the lifecycle (time, error
//! reporting) are abstracted behind traits and supplied through
//! [`AppConfig`](crate::config::AppConfig), so tests can swap in fixed or
//! recording implementations.

use crate::exception::Exception;
use chrono::{DateTime, Utc};

/// Clock trait - abstracts time operations for testability
///
/// Used to derive cookie `Expires` from `Max-Age` and cache `Expires` headers.
///
/// # Examples
///
/// ```
/// use composable_action_core::environment::{Clock, SystemClock};
///
/// let now = SystemClock.now();
/// assert!(now.timestamp() > 0);
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Where an unhandled exception happened.
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    /// Action type name.
    pub action: &'static str,
    /// Request identifier.
    pub request_id: &'a str,
    /// HTTP method of the request.
    pub method: &'a http::Method,
}

/// Error-reporting side channel.
///
/// Receives every exception that escapes an action's `call`, before it is
/// returned to the caller.
pub trait ErrorReporter: Send + Sync {
    /// Record an exception.
    fn report(&self, exception: &Exception, context: ReportContext<'_>);
}

/// Reports exceptions as `tracing` error events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, exception: &Exception, context: ReportContext<'_>) {
        if let Some(source) = std::error::Error::source(exception) {
            tracing::error!(
                action = context.action,
                request_id = context.request_id,
                method = %context.method,
                kind = exception.kind().name(),
                error = %exception,
                source = %source,
                "Unhandled exception"
            );
        } else {
            tracing::error!(
                action = context.action,
                request_id = context.request_id,
                method = %context.method,
                kind = exception.kind().name(),
                error = %exception,
                "Unhandled exception"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::ERROR;

    #[test]
    fn test_system_clock_advances() {
        let first = SystemClock.now();
        let second = SystemClock.now();
        assert!(second >= first);
    }

    #[test]
    fn test_tracing_reporter_does_not_panic_without_subscriber() {
        let exception = Exception::new(&ERROR, "boom").with_source(anyhow::anyhow!("cause"));
        TracingReporter.report(
            &exception,
            ReportContext {
                action: "Show",
                request_id: "abc",
                method: &http::Method::GET,
            },
        );
    }
}
