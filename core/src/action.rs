//! The request lifecycle.
//!
//! ```text
//!  Constructing ─► BeforeCallbacks ─► Handling ─► AfterCallbacks ─► Finalizing ─► Done
//!                        │                │              │              ▲
//!                        ├── halt ────────┴──────────────┴──► Halted ───┤
//!                        └── raise ───────┴──────────────┴──► Recovering┘
//!                                                                 │
//!                                                   unmatched ────┴──► Err(Unhandled)
//! ```
//!
//! A halt in any middle stage skips every later stage except finalization.
//! A raised exception is matched against the exception policy; a match
//! produces a response (by status or by recovery handler), no match is
//! reported and escapes [`Endpoint::call`]. Redirects are halts and follow
//! the same rule.

use crate::config::ActionConfig;
use crate::cookies::CookieJar;
use crate::environment::ReportContext;
use crate::error::{ActionError, ConfigError};
use crate::exception::Exception;
use crate::format::{self, FormatHints};
use crate::halt::{Flow, Halt, Outcome};
use crate::policy::Recovery;
use crate::request::{Envelope, Request};
use crate::response::{Finalized, Response};
use crate::status;
use std::fmt;
use std::sync::Arc;

/// Request handler logic of one endpoint.
///
/// Implementations hold no per-request state: the same value serves every
/// request, concurrently. Per-request state lives in [`Request`] and
/// [`Response`].
pub trait Action: Send + Sync + 'static {
    /// Handle the request, writing into `response`.
    ///
    /// # Errors
    ///
    /// Return a halt to stop with a status, or raise an exception for the
    /// exception policy to handle.
    fn handle(&self, request: &Request, response: &mut Response) -> Outcome;
}

/// Lifecycle stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Building request and response.
    Constructing,
    /// Running before-callbacks.
    BeforeCallbacks,
    /// Running the handler.
    Handling,
    /// Running after-callbacks.
    AfterCallbacks,
    /// Matching a raised exception against the policy.
    Recovering,
    /// A halt stopped the pipeline.
    Halted,
    /// Assembling the wire response.
    Finalizing,
    /// Response returned.
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Constructing => "constructing",
            Self::BeforeCallbacks => "before_callbacks",
            Self::Handling => "handling",
            Self::AfterCallbacks => "after_callbacks",
            Self::Recovering => "recovering",
            Self::Halted => "halted",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

fn enter(stage: Stage) {
    tracing::trace!(%stage, "Entering stage");
}

/// An action bound to its configuration; the unit a router mounts.
pub struct Endpoint<A> {
    action: A,
    config: Arc<ActionConfig<A>>,
}

impl<A: Action> Endpoint<A> {
    /// Bind `action` to `config`.
    #[must_use]
    pub fn new(action: A, config: ActionConfig<A>) -> Self {
        Self::with_shared_config(action, Arc::new(config))
    }

    /// Bind `action` to a configuration shared with other endpoints.
    #[must_use]
    pub const fn with_shared_config(action: A, config: Arc<ActionConfig<A>>) -> Self {
        Self { action, config }
    }

    /// The action.
    #[must_use]
    pub const fn action(&self) -> &A {
        &self.action
    }

    /// The action's configuration.
    #[must_use]
    pub const fn config(&self) -> &Arc<ActionConfig<A>> {
        &self.config
    }

    /// Short type name of the action, used in logs and reports.
    ///
    /// Generic arguments are dropped: `Show<catalog::Book>` is `Show`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        short_type_name(std::any::type_name::<A>())
    }

    /// Run one request through the lifecycle.
    ///
    /// # Errors
    ///
    /// - [`ActionError::Unhandled`] when a raised exception matches no
    ///   policy entry (or exception handling is disabled). The exception is
    ///   reported before it is returned.
    /// - [`ActionError::Config`] on configuration misuse: an unknown status
    ///   or format, session access without session support, or a recovery
    ///   name that resolves to nothing.
    pub fn call(&self, envelope: Envelope) -> Result<Finalized, ActionError> {
        enter(Stage::Constructing);
        let (request, session) = Request::from_envelope(envelope);
        let span = tracing::info_span!(
            "action",
            action = self.name(),
            request_id = request.id(),
            method = %request.method(),
        );
        let _entered = span.enter();

        let mut response = self.build_response(&request, session)?;

        let halted = match self.run_pipeline(&request, &mut response) {
            Ok(()) => None,
            Err(Flow::Halt(halt)) => Some(halt),
            Err(Flow::Misconfigured(error)) => return Err(error.into()),
            Err(Flow::Raise(exception)) => self.recover(&request, &mut response, exception)?,
        };

        if let Some(halt) = halted {
            enter(Stage::Halted);
            tracing::debug!(status = halt.status(), "Pipeline halted");
            response.apply_halt(&halt)?;
        }

        enter(Stage::Finalizing);
        let finalized = response.finalize(&request)?;
        enter(Stage::Done);
        tracing::debug!(status = finalized.status(), "Action completed");
        Ok(finalized)
    }

    fn build_response(
        &self,
        request: &Request,
        session: Option<crate::session::Session>,
    ) -> Result<Response, ConfigError> {
        let app = self.config.app();

        let mut cookies = CookieJar::new(
            request.cookie().map(ToString::to_string),
            app.cookies.clone(),
        );
        let session = match &app.sessions {
            Some(sessions) => {
                cookies = cookies.with_session_key(sessions.key.clone());
                Some(session.unwrap_or_default())
            }
            None => None,
        };

        let resolved = format::resolve(
            &app.formats,
            FormatHints {
                explicit: self.config.format(),
                extension: request.path_extension(),
                accept: request.accept(),
                accepted: self.config.accepted_formats(),
                default_response: app.default_response_format.as_deref(),
                default_request: app.default_request_format.as_deref(),
            },
        )?;

        let mut response = Response::new(Arc::clone(app), cookies, session);
        response.set_resolved_format(resolved.format, resolved.mime);
        Ok(response)
    }

    fn run_pipeline(&self, request: &Request, response: &mut Response) -> Outcome {
        enter(Stage::BeforeCallbacks);
        self.config
            .before_callbacks()
            .run(&self.action, request, response)?;

        enter(Stage::Handling);
        self.action.handle(request, response)?;

        enter(Stage::AfterCallbacks);
        self.config
            .after_callbacks()
            .run(&self.action, request, response)
    }

    /// Turn a raised exception into a halt, a recovered response, or an
    /// escaping error.
    fn recover(
        &self,
        request: &Request,
        response: &mut Response,
        exception: Exception,
    ) -> Result<Option<Halt>, ActionError> {
        enter(Stage::Recovering);
        if !self.config.app().handle_exceptions {
            return Err(self.unhandled(request, exception));
        }

        let Some(recovery) = self.config.policy().resolve(&exception) else {
            return Err(self.unhandled(request, exception));
        };
        tracing::debug!(
            kind = exception.kind().name(),
            recovery = ?recovery,
            "Recovering from exception"
        );

        let name = match recovery {
            Recovery::Status(code) => return Ok(Some(Halt::new(*code))),
            Recovery::Handler(name) => name,
        };

        let Some(handler) = self.config.recovery(name) else {
            return Ok(Some(Halt::new(status_for_recovery(name)?)));
        };

        match handler(&self.action, request, response, &exception) {
            Ok(()) => Ok(None),
            Err(Flow::Halt(halt)) => Ok(Some(halt)),
            Err(Flow::Misconfigured(error)) => Err(error.into()),
            Err(Flow::Raise(raised)) => Err(self.unhandled(request, raised)),
        }
    }

    fn unhandled(&self, request: &Request, exception: Exception) -> ActionError {
        self.config.app().reporter.report(
            &exception,
            ReportContext {
                action: self.name(),
                request_id: request.id(),
                method: request.method(),
            },
        );
        ActionError::Unhandled(exception)
    }
}

impl<A> fmt::Debug for Endpoint<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("action", &std::any::type_name::<A>())
            .field("config", &self.config)
            .finish()
    }
}

fn short_type_name(full: &str) -> &str {
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::").next().unwrap_or(path)
}

/// A recovery name with no registered handler, read as a status.
fn status_for_recovery(name: &str) -> Result<u16, ConfigError> {
    if let Ok(code) = name.parse::<u16>() {
        return Ok(code);
    }
    status::code_for(name).map_err(|_| ConfigError::UnknownRecovery(name.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::exception::{ErrorKind, ERROR};
    use crate::halt::{halt, raise};
    use http::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED, SET_COOKIE};
    use http::{HeaderValue, Method};
    use serde_json::json;
    use std::sync::Mutex;

    static STANDARD: ErrorKind = ErrorKind::child("StandardError", &ERROR);
    static RECORD_NOT_FOUND: ErrorKind = ErrorKind::child("RecordNotFound", &STANDARD);

    #[derive(Default)]
    struct Recorder {
        handled: Mutex<bool>,
        after: Mutex<bool>,
    }

    impl Recorder {
        fn mark_after(&self) -> Outcome {
            *self.after.lock().unwrap() = true;
            Ok(())
        }

        fn deny(&self) -> Outcome {
            halt(401)
        }

        fn handled(&self) -> bool {
            *self.handled.lock().unwrap()
        }

        fn ran_after(&self) -> bool {
            *self.after.lock().unwrap()
        }
    }

    impl Action for Recorder {
        fn handle(&self, request: &Request, response: &mut Response) -> Outcome {
            *self.handled.lock().unwrap() = true;
            match request.params().get_str("mode") {
                Some("missing") => raise(Exception::new(&RECORD_NOT_FOUND, "no book")),
                Some("boom") => raise(Exception::new(&STANDARD, "boom")),
                Some("raw") => Err(std::io::Error::other("disk on fire").into()),
                Some("no_content") => {
                    response.set_status(204);
                    response.set_body("ignored");
                    response.set_header(LAST_MODIFIED, "Mon, 01 Jan 2024 12:00:00 GMT")?;
                    response.set_header(CONTENT_LENGTH, "7")?;
                    Ok(())
                }
                Some("cookie") => {
                    response.cookies().set("theme", "dark");
                    response.set_status(304);
                    Ok(())
                }
                Some("teapot") => halt(999),
                _ => {
                    response.set_body("Hello");
                    Ok(())
                }
            }
        }
    }

    fn endpoint(app: AppConfig) -> Endpoint<Recorder> {
        let config = ActionConfig::builder(Arc::new(app))
            .after_method("mark_after", Recorder::mark_after)
            .handle_exception(&STANDARD, 500)
            .handle_exception(&RECORD_NOT_FOUND, 404)
            .build()
            .expect("config should build");
        Endpoint::new(Recorder::default(), config)
    }

    fn get(mode: &str) -> Envelope {
        Envelope::new(Method::GET).with_query(format!("mode={mode}"))
    }

    #[test]
    fn test_happy_path() {
        let endpoint = endpoint(AppConfig::default());
        let finalized = endpoint.call(Envelope::new(Method::GET)).expect("call succeeds");
        assert_eq!(finalized.status(), 200);
        assert_eq!(finalized.body_string(), "Hello");
        assert_eq!(
            finalized.header(CONTENT_TYPE),
            Some("application/octet-stream; charset=utf-8")
        );
        assert!(endpoint.action().ran_after());
        assert_eq!(finalized.exposure("params"), Some(&json!({})));
        assert_eq!(finalized.exposure("format"), Some(&json!(null)));
    }

    #[test]
    fn test_negotiated_content_type() {
        let endpoint = endpoint(AppConfig::default());
        let finalized = endpoint
            .call(
                Envelope::new(Method::GET)
                    .with_header(ACCEPT, HeaderValue::from_static("application/json")),
            )
            .expect("call succeeds");
        assert_eq!(finalized.header(CONTENT_TYPE), Some("application/json; charset=utf-8"));
        assert_eq!(finalized.exposure("format"), Some(&json!("json")));
    }

    #[test]
    fn test_before_halt_skips_handler_and_after() {
        let app = Arc::new(AppConfig::default());
        let config = ActionConfig::builder(app)
            .before_method("deny", Recorder::deny)
            .after_method("mark_after", Recorder::mark_after)
            .build()
            .expect("config should build");
        let endpoint = Endpoint::new(Recorder::default(), config);
        let finalized = endpoint.call(Envelope::new(Method::GET)).expect("call succeeds");
        assert_eq!(finalized.status(), 401);
        assert_eq!(finalized.body_string(), "Unauthorized");
        assert!(!endpoint.action().handled());
        assert!(!endpoint.action().ran_after());
    }

    #[test]
    fn test_most_specific_policy_entry() {
        let endpoint = endpoint(AppConfig::default());
        let missing = endpoint.call(get("missing")).expect("recovered");
        assert_eq!(missing.status(), 404);
        assert_eq!(missing.body_string(), "Not Found");
        assert!(!endpoint.action().ran_after());

        let boom = endpoint.call(get("boom")).expect("recovered");
        assert_eq!(boom.status(), 500);
        assert_eq!(boom.body_string(), "Internal Server Error");
    }

    #[test]
    fn test_unmatched_exception_escapes() {
        let endpoint = endpoint(AppConfig::default());
        let err = endpoint.call(get("raw")).expect_err("escapes");
        let exception = err.exception().expect("unhandled exception");
        assert!(exception.is_a(&ERROR));
        assert!(!exception.is_a(&STANDARD));
        assert_eq!(exception.message(), "disk on fire");
    }

    #[test]
    fn test_disabled_exception_handling_escapes_matched_exceptions() {
        let endpoint = endpoint(AppConfig::default().with_handle_exceptions(false));
        let err = endpoint.call(get("missing")).expect_err("escapes");
        assert!(err.exception().is_some_and(|e| e.is_a(&RECORD_NOT_FOUND)));
    }

    #[test]
    fn test_no_content_strips_body_and_non_entity_headers() {
        let endpoint = endpoint(AppConfig::default());
        let finalized = endpoint.call(get("no_content")).expect("call succeeds");
        assert_eq!(finalized.status(), 204);
        assert!(finalized.body().is_empty());
        assert!(finalized.header(CONTENT_TYPE).is_none());
        assert!(finalized.header(CONTENT_LENGTH).is_none());
        assert_eq!(finalized.header(LAST_MODIFIED), Some("Mon, 01 Jan 2024 12:00:00 GMT"));
    }

    #[test]
    fn test_head_strips_body() {
        let endpoint = endpoint(AppConfig::default());
        let finalized = endpoint.call(Envelope::new(Method::HEAD)).expect("call succeeds");
        assert_eq!(finalized.status(), 200);
        assert!(finalized.body().is_empty());
    }

    #[test]
    fn test_cookies_survive_bodiless_responses() {
        let endpoint = endpoint(AppConfig::default());
        let finalized = endpoint.call(get("cookie")).expect("call succeeds");
        assert_eq!(finalized.status(), 304);
        assert_eq!(finalized.header(SET_COOKIE), Some("theme=dark"));
    }

    #[test]
    fn test_unknown_halt_status_is_a_config_error() {
        let endpoint = endpoint(AppConfig::default());
        let err = endpoint.call(get("teapot")).expect_err("misconfigured");
        assert!(matches!(err, ActionError::Config(ConfigError::UnknownStatus(999))));
    }

    #[test]
    fn test_session_disabled_yields_no_session() {
        let endpoint = endpoint(AppConfig::default());
        let finalized = endpoint.call(Envelope::new(Method::GET)).expect("call succeeds");
        assert!(finalized.session().is_none());
    }

    #[test]
    fn test_status_for_recovery() {
        assert_eq!(status_for_recovery("404"), Ok(404));
        assert_eq!(status_for_recovery("not_found"), Ok(404));
        assert_eq!(
            status_for_recovery("handle_missing"),
            Err(ConfigError::UnknownRecovery("handle_missing".to_string()))
        );
    }

    struct Wrapper<T>(std::marker::PhantomData<T>);

    impl<T: Send + Sync + 'static> Action for Wrapper<T> {
        fn handle(&self, _request: &Request, _response: &mut Response) -> Outcome {
            Ok(())
        }
    }

    #[test]
    fn test_name_drops_generic_arguments() {
        let config = ActionConfig::builder(Arc::new(AppConfig::default()))
            .build()
            .expect("config should build");
        let wrapper = Endpoint::new(Wrapper::<Vec<String>>(std::marker::PhantomData), config);
        assert_eq!(wrapper.name(), "Wrapper");
        assert_eq!(endpoint(AppConfig::default()).name(), "Recorder");
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("app::books::Show"), "Show");
        assert_eq!(short_type_name("app::Show<catalog::Book>"), "Show");
        assert_eq!(short_type_name("Show"), "Show");
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::BeforeCallbacks.to_string(), "before_callbacks");
        assert_eq!(Stage::Done.to_string(), "done");
    }
}
