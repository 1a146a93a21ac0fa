//! # Composable Action Testing
//!
//! Testing utilities and helpers for Composable Action.
//!
//! This crate provides:
//! - Mock implementations of the injected collaborators (clock, reporter)
//! - Envelope builders for common requests
//! - Property-based testing strategies for `Accept` headers
//! - [`ActionTest`], a Given-When-Then harness for endpoints
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use composable_action_core::prelude::*;
//! use composable_action_testing::{helpers, ActionTest};
//!
//! struct Hello;
//!
//! impl Action for Hello {
//!     fn handle(&self, _request: &Request, response: &mut Response) -> Outcome {
//!         response.set_body("Hello");
//!         Ok(())
//!     }
//! }
//!
//! let config = ActionConfig::builder(Arc::new(AppConfig::default())).build()?;
//!
//! ActionTest::new(Endpoint::new(Hello, config))
//!     .when_request(helpers::get())
//!     .then_status(200)
//!     .then_body("Hello")
//!     .run();
//! # Ok::<(), ConfigError>(())
//! ```


pub use action_test::{ActionTest, assertions};

/// Mock implementations of injected collaborators.
pub mod mocks {
    use chrono::{DateTime, Utc};
    use composable_action_core::environment::{Clock, ErrorReporter, ReportContext};
    use composable_action_core::exception::Exception;
    use std::sync::{Arc, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use composable_action_testing::mocks::FixedClock;
    /// use composable_action_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// One exception seen by [`RecordingReporter`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Report {
        /// Action type name.
        pub action: String,
        /// Exception kind name.
        pub kind: String,
        /// Exception message.
        pub message: String,
        /// Request identifier.
        pub request_id: String,
    }

    /// Error reporter that keeps every report in memory.
    ///
    /// Clones share the same log, so a test can keep one handle and pass
    /// another to the configuration.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingReporter {
        reports: Arc<RwLock<Vec<Report>>>,
    }

    impl RecordingReporter {
        /// Empty reporter.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Reports so far, oldest first.
        #[must_use]
        pub fn reports(&self) -> Vec<Report> {
            self.reports
                .read()
                .map(|reports| reports.clone())
                .unwrap_or_default()
        }

        /// Number of reports so far.
        #[must_use]
        pub fn len(&self) -> usize {
            self.reports.read().map(|reports| reports.len()).unwrap_or(0)
        }

        /// Whether nothing was reported.
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    impl ErrorReporter for RecordingReporter {
        fn report(&self, exception: &Exception, context: ReportContext<'_>) {
            if let Ok(mut reports) = self.reports.write() {
                reports.push(Report {
                    action: context.action.to_string(),
                    kind: exception.kind().name().to_string(),
                    message: exception.message().to_string(),
                    request_id: context.request_id.to_string(),
                });
            }
        }
    }
}

/// Envelope builders and test setup.
pub mod helpers {
    use composable_action_core::request::Envelope;
    use composable_action_core::session::Session;
    use http::header::{ACCEPT, CONTENT_TYPE, COOKIE};
    use http::{HeaderValue, Method};

    /// `GET` with no headers.
    #[must_use]
    pub fn get() -> Envelope {
        Envelope::new(Method::GET)
    }

    /// `HEAD` with no headers.
    #[must_use]
    pub fn head() -> Envelope {
        Envelope::new(Method::HEAD)
    }

    /// `POST` with a form-encoded body.
    #[must_use]
    pub fn post_form(body: &str) -> Envelope {
        Envelope::new(Method::POST)
            .with_header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            )
            .with_body(body.to_string())
    }

    /// `POST` with a JSON body.
    #[must_use]
    pub fn post_json(body: &serde_json::Value) -> Envelope {
        Envelope::new(Method::POST)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body.to_string())
    }

    /// Add an `Accept` header. Invalid values are ignored.
    #[must_use]
    pub fn accepting(envelope: Envelope, accept: &str) -> Envelope {
        match HeaderValue::from_str(accept) {
            Ok(value) => envelope.with_header(ACCEPT, value),
            Err(_) => envelope,
        }
    }

    /// Add a `Cookie` header. Invalid values are ignored.
    #[must_use]
    pub fn with_cookies(envelope: Envelope, cookies: &str) -> Envelope {
        match HeaderValue::from_str(cookies) {
            Ok(value) => envelope.with_header(COOKIE, value),
            Err(_) => envelope,
        }
    }

    /// Attach a session built from key/value pairs.
    #[must_use]
    pub fn with_session<I, K, V>(envelope: Envelope, entries: I) -> Envelope
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<serde_json::Value>,
    {
        envelope.with_session(entries.into_iter().collect::<Session>())
    }

    /// Install a test tracing subscriber honoring `RUST_LOG`.
    ///
    /// Safe to call from every test; only the first call installs.
    pub fn init_tracing() {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "composable_action_core=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;

    /// Concrete media types commonly negotiated.
    pub const MEDIA_TYPES: [&str; 8] = [
        "text/html",
        "application/json",
        "application/xml",
        "text/plain",
        "text/csv",
        "application/xhtml+xml",
        "image/png",
        "application/pdf",
    ];

    /// A media range: concrete, `type/*` or `*/*`.
    pub fn media_range() -> impl Strategy<Value = String> {
        prop_oneof![
            4 => proptest::sample::select(MEDIA_TYPES.to_vec()).prop_map(str::to_string),
            1 => proptest::sample::select(vec!["text/*", "application/*", "image/*"])
                .prop_map(str::to_string),
            1 => Just("*/*".to_string()),
        ]
    }

    /// A quality parameter with up to three decimals, or none.
    pub fn quality() -> impl Strategy<Value = Option<String>> {
        proptest::option::of((0u16..=1000).prop_map(|q| format!("{}", f32::from(q) / 1000.0)))
    }

    /// A full `Accept` header of one to six weighted ranges.
    pub fn accept_header() -> impl Strategy<Value = String> {
        proptest::collection::vec((media_range(), quality()), 1..=6).prop_map(|entries| {
            entries
                .into_iter()
                .map(|(range, q)| match q {
                    Some(q) => format!("{range};q={q}"),
                    None => range,
                })
                .collect::<Vec<_>>()
                .join(", ")
        })
    }

    /// A non-empty, duplicate-free candidate list drawn from [`MEDIA_TYPES`].
    pub fn candidates() -> impl Strategy<Value = Vec<String>> {
        proptest::sample::subsequence(MEDIA_TYPES.to_vec(), 1..=MEDIA_TYPES.len())
            .prop_shuffle()
            .prop_map(|types| types.into_iter().map(str::to_string).collect())
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, RecordingReporter, test_clock};

#[cfg(test)]
mod tests {
    use super::*;
    use composable_action_core::environment::{Clock, ErrorReporter, ReportContext};
    use composable_action_core::exception::{Exception, ERROR};

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn test_recording_reporter_shares_log_across_clones() {
        let reporter = RecordingReporter::new();
        let handle = reporter.clone();
        reporter.report(
            &Exception::new(&ERROR, "boom"),
            ReportContext {
                action: "Show",
                request_id: "abc",
                method: &http::Method::GET,
            },
        );
        assert_eq!(handle.len(), 1);
        assert_eq!(handle.reports()[0].message, "boom");
        assert_eq!(handle.reports()[0].kind, "Error");
    }
}
