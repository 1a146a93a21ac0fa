//! Axum integration for Composable Action.
//!
//! Actions run synchronously and never see the transport. This crate is the
//! thin imperative shell around them:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Imperative Shell (Axum)         │  ← body buffering, route params
//! │  - request id layer                     │  ← sessions via extensions
//! │  - dispatch / into_handler              │  ← metrics, error mapping
//! ├─────────────────────────────────────────┤
//! │         Action pipeline (core)          │
//! │  - callbacks, halts, exception policy   │  ← no I/O
//! │  - negotiation, cookies, flash          │  ← testable in memory
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives at the handler built by [`into_handler`]
//! 2. **Buffer** the body and collect query, headers and route params
//! 3. **Call** the endpoint with the resulting envelope
//! 4. **Map** the finalized response (or [`AppError`]) back to HTTP
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use composable_action_web::{into_handler, request_id_layer};
//!
//! let app = Router::new()
//!     .route("/books/:id", get(into_handler(show_book)))
//!     .layer(request_id_layer());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod adapter;
pub mod error;
pub mod middleware;

// Re-export key types for convenience
pub use adapter::{DEFAULT_BODY_LIMIT, dispatch, into_handler};
pub use error::AppError;
pub use middleware::{RequestId, RequestIdExt, request_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
