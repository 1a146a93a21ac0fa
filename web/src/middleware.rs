//! Request id middleware.
//!
//! Every request leaving this layer carries an `X-Request-Id` header, either
//! the one the client (or an upstream proxy) sent or a freshly generated one.
//! The action sees the same value through `Request::id`, and the response
//! echoes it back.
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

use axum::{extract::Request, http::HeaderValue, response::Response};
use composable_action_core::request::REQUEST_ID_HEADER;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// Longest inbound id that is trusted; longer values are replaced.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Request id stored in request extensions by [`RequestIdLayer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Create a layer that assigns a request id to every request.
#[must_use]
pub const fn request_id_layer() -> RequestIdLayer {
    RequestIdLayer
}

/// Layer for request id tracking.
#[derive(Clone, Debug)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdMiddleware { inner }
    }
}

/// Middleware service for request id tracking.
#[derive(Clone, Debug)]
pub struct RequestIdMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for RequestIdMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let (request_id, header_value) = match inbound_id(req.headers().get(REQUEST_ID_HEADER)) {
            Some(value) => value,
            None => {
                let generated = Uuid::new_v4().simple().to_string();
                // a simple uuid is always a valid header value
                let value = HeaderValue::from_str(&generated).unwrap_or(HeaderValue::from_static("-"));
                (generated, value)
            }
        };

        req.headers_mut().insert(REQUEST_ID_HEADER, header_value.clone());
        req.extensions_mut().insert(RequestId(request_id.clone()));

        let span = tracing::info_span!(
            "http_request",
            request_id = %request_id,
            method = %req.method(),
            uri = %req.uri(),
        );

        let fut = self.inner.call(req);

        Box::pin(async move {
            let mut response = fut.instrument(span).await?;
            response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
            Ok(response)
        })
    }
}

fn inbound_id(value: Option<&HeaderValue>) -> Option<(String, HeaderValue)> {
    let value = value?;
    let id = value.to_str().ok()?.trim();
    if id.is_empty() || id.len() > MAX_REQUEST_ID_LEN {
        return None;
    }
    Some((id.to_string(), value.clone()))
}

/// Extension trait for reading the request id from request extensions.
pub trait RequestIdExt {
    /// The request id, or `None` when [`request_id_layer`] is not installed.
    fn request_id(&self) -> Option<&str>;
}

impl RequestIdExt for Request {
    fn request_id(&self) -> Option<&str> {
        self.extensions()
            .get::<RequestId>()
            .map(|id| id.0.as_str())
    }
}
