//! # Composable Action Core
//!
//! Per-endpoint request handling: an *action* receives one HTTP request and
//! produces one HTTP response, with cross-cutting concerns (content
//! negotiation, cookies, sessions, flash, caching headers, exception to
//! status mapping, callback chains) layered around it as explicit pipeline
//! stages.
//!
//! ## Core Concepts
//!
//! - **Action**: handler logic, shared by every request ([`action::Action`])
//! - **Endpoint**: an action bound to its immutable configuration; its
//!   [`call`](action::Endpoint::call) runs the lifecycle
//! - **Outcome**: what every stage returns; `Ok` continues, a [`halt::Flow`]
//!   halts or raises
//! - **Configuration**: [`config::AppConfig`] shared by all actions,
//!   [`config::ActionConfig`] per action type
//!
//! ## Architecture Principles
//!
//! - Configuration is built once and read-only at request time
//! - Per-request state (request, response, cookies, flash) is allocated per call
//! - Halts and raised exceptions are values, not unwinding
//! - Outside-world collaborators (time, error reporting) are injected
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use composable_action_core::prelude::*;
//!
//! struct Show;
//!
//! impl Show {
//!     fn authenticate(&self, request: &Request, _res: &mut Response) -> Outcome {
//!         match request.params().get_str("token") {
//!             Some("secret") => Ok(()),
//!             _ => halt(401),
//!         }
//!     }
//! }
//!
//! impl Action for Show {
//!     fn handle(&self, _request: &Request, response: &mut Response) -> Outcome {
//!         response.set_body("Hello");
//!         Ok(())
//!     }
//! }
//!
//! let config = ActionConfig::builder(Arc::new(AppConfig::default()))
//!     .before_method("authenticate", Show::authenticate)
//!     .build()?;
//! let endpoint = Endpoint::new(Show, config);
//!
//! let denied = endpoint.call(Envelope::new(http::Method::GET))?;
//! assert_eq!(denied.status(), 401);
//! assert_eq!(denied.body_string(), "Unauthorized");
//!
//! let allowed = endpoint.call(Envelope::new(http::Method::GET).with_query("token=secret"))?;
//! assert_eq!(allowed.status(), 200);
//! assert_eq!(allowed.body_string(), "Hello");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod action;
pub mod cache;
pub mod callbacks;
pub mod config;
pub mod cookies;
pub mod environment;
pub mod error;
pub mod exception;
pub mod flash;
pub mod format;
pub mod halt;
pub mod negotiation;
pub mod policy;
pub mod request;
pub mod response;
pub mod session;
pub mod status;

/// Commonly used types.
pub mod prelude {
    pub use crate::action::{Action, Endpoint};
    pub use crate::cache::CacheDirective;
    pub use crate::callbacks::{Callback, CallbackChain};
    pub use crate::config::{ActionConfig, ActionConfigBuilder, AppConfig};
    pub use crate::cookies::{Cookie, CookieOptions, SameSite};
    pub use crate::error::{ActionError, ConfigError};
    pub use crate::exception::{ErrorKind, Exception, ERROR};
    pub use crate::halt::{halt, halt_with, raise, Flow, Halt, Outcome};
    pub use crate::policy::{ExceptionPolicy, Recovery};
    pub use crate::request::{Envelope, Params, Request};
    pub use crate::response::{Finalized, Response};
    pub use crate::session::{Session, SessionConfig};
}

pub use chrono::{DateTime, Utc};
