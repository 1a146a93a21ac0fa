//! Application and per-action configuration.
//!
//! Configuration is built once at startup and shared read-only through
//! `Arc`. [`AppConfig`] holds what every action shares; [`ActionConfig`]
//! holds one action type's callbacks, accepted formats and exception
//! handling, layered over the application's.

use crate::callbacks::{Callback, CallbackChain, IntoMethod};
use crate::cookies::CookieOptions;
use crate::environment::{Clock, ErrorReporter, SystemClock, TracingReporter};
use crate::error::ConfigError;
use crate::exception::{ErrorKind, Exception};
use crate::format::FormatRegistry;
use crate::halt::{halt, Outcome};
use crate::negotiation;
use crate::policy::{ExceptionPolicy, Recovery};
use crate::request::Request;
use crate::response::Response;
use crate::session::SessionConfig;
use http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Name of the callback installed by [`ActionConfigBuilder::accept`].
pub const ACCEPT_FILTER: &str = "enforce_accepted_formats";

/// Application-wide configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// Format symbol to MIME type registry.
    pub formats: FormatRegistry,

    /// Format assumed for requests that do not state one.
    pub default_request_format: Option<String>,

    /// Format used when negotiation yields nothing.
    pub default_response_format: Option<String>,

    /// Charset appended to `Content-Type`.
    ///
    /// Default: `utf-8`
    pub default_charset: String,

    /// Headers added to every response before the action runs.
    pub default_headers: HeaderMap,

    /// Cookie options merged under per-cookie options.
    pub cookies: CookieOptions,

    /// Session support; `None` disables session and flash.
    pub sessions: Option<SessionConfig>,

    /// Whether the exception policy is consulted at all.
    ///
    /// When `false` every raised exception escapes `call` after being
    /// reported. Default: `true`
    pub handle_exceptions: bool,

    /// Application-level exception policy.
    pub exceptions: ExceptionPolicy,

    /// Receives exceptions that escape `call`.
    pub reporter: Arc<dyn ErrorReporter>,

    /// Time source for `Expires` values.
    pub clock: Arc<dyn Clock>,
}

impl AppConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom format.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>, mime: impl Into<String>) -> Self {
        self.formats.register(format, mime);
        self
    }

    /// Set the default request format.
    #[must_use]
    pub fn with_default_request_format(mut self, format: impl Into<String>) -> Self {
        self.default_request_format = Some(format.into());
        self
    }

    /// Set the default response format.
    #[must_use]
    pub fn with_default_response_format(mut self, format: impl Into<String>) -> Self {
        self.default_response_format = Some(format.into());
        self
    }

    /// Set the default charset.
    #[must_use]
    pub fn with_default_charset(mut self, charset: impl Into<String>) -> Self {
        self.default_charset = charset.into();
        self
    }

    /// Add a default response header.
    #[must_use]
    pub fn with_default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    /// Set default cookie options.
    #[must_use]
    pub fn with_cookies(mut self, cookies: CookieOptions) -> Self {
        self.cookies = cookies;
        self
    }

    /// Enable session support.
    #[must_use]
    pub fn with_sessions(mut self, sessions: SessionConfig) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Toggle exception handling.
    #[must_use]
    pub const fn with_handle_exceptions(mut self, handle: bool) -> Self {
        self.handle_exceptions = handle;
        self
    }

    /// Add an application-level exception mapping.
    #[must_use]
    pub fn handle_exception(mut self, kind: &'static ErrorKind, recovery: impl Into<Recovery>) -> Self {
        self.exceptions.register(kind, recovery);
        self
    }

    /// Set the error reporter.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Set the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            formats: FormatRegistry::new(),
            default_request_format: None,
            default_response_format: None,
            default_charset: "utf-8".to_string(),
            default_headers: HeaderMap::new(),
            cookies: CookieOptions::new(),
            sessions: None,
            handle_exceptions: true,
            exceptions: ExceptionPolicy::new(),
            reporter: Arc::new(TracingReporter),
            clock: Arc::new(SystemClock),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("formats", &self.formats)
            .field("default_request_format", &self.default_request_format)
            .field("default_response_format", &self.default_response_format)
            .field("default_charset", &self.default_charset)
            .field("default_headers", &self.default_headers)
            .field("cookies", &self.cookies)
            .field("sessions", &self.sessions)
            .field("handle_exceptions", &self.handle_exceptions)
            .field("exceptions", &self.exceptions)
            .finish_non_exhaustive()
    }
}

/// Recovery handler invoked with the exception that matched its policy entry.
pub type RecoveryHandler<A> =
    Arc<dyn Fn(&A, &Request, &mut Response, &Exception) -> Outcome + Send + Sync>;

/// Configuration of one action type.
///
/// Immutable once built. Use [`ActionConfig::extend`] to derive the
/// configuration of a more specific action without touching this one.
pub struct ActionConfig<A> {
    app: Arc<AppConfig>,
    accepted: Vec<String>,
    before: CallbackChain<A>,
    after: CallbackChain<A>,
    local_policy: ExceptionPolicy,
    policy: ExceptionPolicy,
    recoveries: HashMap<String, RecoveryHandler<A>>,
    format: Option<String>,
}

impl<A: 'static> ActionConfig<A> {
    /// Start building a configuration on top of `app`.
    #[must_use]
    pub fn builder(app: Arc<AppConfig>) -> ActionConfigBuilder<A> {
        ActionConfigBuilder {
            app,
            accepted: Vec::new(),
            before: CallbackChain::new(),
            after: CallbackChain::new(),
            local_policy: ExceptionPolicy::new(),
            recoveries: HashMap::new(),
            format: None,
        }
    }

    /// Builder seeded with a copy of this configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use composable_action_core::callbacks::Callback;
    /// use composable_action_core::config::{ActionConfig, AppConfig};
    /// use composable_action_core::halt::Outcome;
    ///
    /// struct Books;
    /// impl Books {
    ///     fn authenticate(&self) -> Outcome { Ok(()) }
    ///     fn audit(&self) -> Outcome { Ok(()) }
    /// }
    ///
    /// let parent = ActionConfig::<Books>::builder(Arc::new(AppConfig::default()))
    ///     .before(Callback::method("authenticate", Books::authenticate))
    ///     .build()?;
    /// let child = parent
    ///     .extend()
    ///     .before(Callback::method("audit", Books::audit))
    ///     .build()?;
    ///
    /// assert_eq!(parent.before_callbacks().len(), 1);
    /// assert_eq!(child.before_callbacks().len(), 2);
    /// # Ok::<(), composable_action_core::error::ConfigError>(())
    /// ```
    #[must_use]
    pub fn extend(&self) -> ActionConfigBuilder<A> {
        ActionConfigBuilder {
            app: Arc::clone(&self.app),
            accepted: self.accepted.clone(),
            before: self.before.clone(),
            after: self.after.clone(),
            local_policy: self.local_policy.clone(),
            recoveries: self.recoveries.clone(),
            format: self.format.clone(),
        }
    }
}

impl<A> ActionConfig<A> {
    /// Application configuration.
    #[must_use]
    pub const fn app(&self) -> &Arc<AppConfig> {
        &self.app
    }

    /// Accepted format symbols, empty when unrestricted.
    #[must_use]
    pub fn accepted_formats(&self) -> &[String] {
        &self.accepted
    }

    /// Before-callbacks.
    #[must_use]
    pub const fn before_callbacks(&self) -> &CallbackChain<A> {
        &self.before
    }

    /// After-callbacks.
    #[must_use]
    pub const fn after_callbacks(&self) -> &CallbackChain<A> {
        &self.after
    }

    /// Application policy with this action's entries laid over it.
    #[must_use]
    pub const fn policy(&self) -> &ExceptionPolicy {
        &self.policy
    }

    /// Recovery handler registered under `name`.
    #[must_use]
    pub fn recovery(&self, name: &str) -> Option<&RecoveryHandler<A>> {
        self.recoveries.get(name)
    }

    /// Explicit response format, overriding negotiation.
    #[must_use]
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }
}

impl<A> fmt::Debug for ActionConfig<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionConfig")
            .field("accepted", &self.accepted)
            .field("before", &self.before)
            .field("after", &self.after)
            .field("policy", &self.policy)
            .field("recoveries", &self.recoveries.keys().collect::<Vec<_>>())
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ActionConfig`].
pub struct ActionConfigBuilder<A> {
    app: Arc<AppConfig>,
    accepted: Vec<String>,
    before: CallbackChain<A>,
    after: CallbackChain<A>,
    local_policy: ExceptionPolicy,
    recoveries: HashMap<String, RecoveryHandler<A>>,
    format: Option<String>,
}

impl<A: 'static> ActionConfigBuilder<A> {
    /// Restrict the action to these format symbols.
    ///
    /// Installs a before-callback at the front of the chain that halts
    /// with 406 when the `Accept` header allows none of them, and with 415
    /// when the request body's `Content-Type` is not one of them.
    #[must_use]
    pub fn accept<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted = formats.into_iter().map(Into::into).collect();
        self
    }

    /// Append a before-callback.
    #[must_use]
    pub fn before(mut self, callback: Callback<A>) -> Self {
        self.before.append(callback);
        self
    }

    /// Prepend a before-callback.
    #[must_use]
    pub fn prepend_before(mut self, callback: Callback<A>) -> Self {
        self.before.prepend(callback);
        self
    }

    /// Append an after-callback.
    #[must_use]
    pub fn after(mut self, callback: Callback<A>) -> Self {
        self.after.append(callback);
        self
    }

    /// Prepend an after-callback.
    #[must_use]
    pub fn prepend_after(mut self, callback: Callback<A>) -> Self {
        self.after.prepend(callback);
        self
    }

    /// Map an exception kind to a status or a recovery handler name.
    #[must_use]
    pub fn handle_exception(mut self, kind: &'static ErrorKind, recovery: impl Into<Recovery>) -> Self {
        self.local_policy.register(kind, recovery);
        self
    }

    /// Register a recovery handler under `name`.
    #[must_use]
    pub fn recover_with<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&A, &Request, &mut Response, &Exception) -> Outcome + Send + Sync + 'static,
    {
        self.recoveries.insert(name.into(), Arc::new(handler));
        self
    }

    /// Always respond with `format`, skipping negotiation.
    #[must_use]
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Register a named action method as a before-callback.
    #[must_use]
    pub fn before_method<M>(self, name: impl Into<String>, method: impl IntoMethod<A, M>) -> Self {
        self.before(Callback::method(name, method))
    }

    /// Register a named action method as an after-callback.
    #[must_use]
    pub fn after_method<M>(self, name: impl Into<String>, method: impl IntoMethod<A, M>) -> Self {
        self.after(Callback::method(name, method))
    }

    /// Validate and freeze the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownFormat`] when an accepted or explicit
    /// format symbol is not registered.
    pub fn build(mut self) -> Result<ActionConfig<A>, ConfigError> {
        if let Some(format) = &self.format {
            self.app.formats.mime_for(format)?;
        }
        // an extended config carries its parent's filter
        self.before.remove(ACCEPT_FILTER);
        if !self.accepted.is_empty() {
            let mimes = self
                .accepted
                .iter()
                .map(|format| self.app.formats.mime_for(format).map(ToString::to_string))
                .collect::<Result<Vec<_>, _>>()?;
            self.before.prepend(accept_filter(mimes));
        }

        let policy = self.app.exceptions.merged(&self.local_policy);
        Ok(ActionConfig {
            app: self.app,
            accepted: self.accepted,
            before: self.before,
            after: self.after,
            local_policy: self.local_policy,
            policy,
            recoveries: self.recoveries,
            format: self.format,
        })
    }
}

fn accept_filter<A: 'static>(mimes: Vec<String>) -> Callback<A> {
    Callback::inline(move |request: &Request, _: &mut Response| {
        let accept = request.accept();
        if !mimes.iter().any(|mime| negotiation::accepts(accept, mime)) {
            tracing::debug!(accept, "No accepted format is acceptable to the client");
            return halt(406);
        }
        if let Some(content_type) = request.content_type() {
            let essence = content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            if !mimes.iter().any(|mime| *mime == essence) {
                tracing::debug!(content_type, "Request content type is not accepted");
                return halt(415);
            }
        }
        Ok(())
    })
    .named(ACCEPT_FILTER)
}
