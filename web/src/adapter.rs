//! Mounting endpoints as Axum handlers.
//!
//! The adapter is the only place where the synchronous action pipeline meets
//! the async transport: it buffers the body, builds an
//! [`Envelope`](composable_action_core::request::Envelope), runs the endpoint
//! and turns the finalized response back into an `axum` response.
//!
//! Sessions travel through extensions. A session middleware that loads a
//! [`Session`] into the request extensions gets the outgoing session back in
//! the response extensions, flash already rotated.

use crate::error::AppError;
use axum::{
    body::Body,
    extract::{FromRequestParts, RawPathParams, Request},
    http::StatusCode,
    response::Response,
};
use composable_action_core::action::{Action, Endpoint};
use composable_action_core::request::Envelope;
use composable_action_core::response::Finalized;
use composable_action_core::session::Session;
use http_body_util::LengthLimitError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Largest request body buffered before the action runs.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Boxed future returned by handlers built with [`into_handler`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response, AppError>> + Send>>;

/// Run `endpoint` for one HTTP request.
///
/// # Errors
///
/// Returns an [`AppError`] when the body cannot be read (400, or 413 past
/// [`DEFAULT_BODY_LIMIT`]) or when the action fails with an unhandled
/// exception or a configuration error (500).
pub async fn dispatch<A: Action>(
    endpoint: &Endpoint<A>,
    request: Request,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();

    let bytes = axum::body::to_bytes(body, DEFAULT_BODY_LIMIT)
        .await
        .map_err(|error| {
            tracing::warn!(error = %error, "Failed to read request body");
            if exceeded_limit(&error) {
                AppError::payload_too_large(DEFAULT_BODY_LIMIT)
            } else {
                AppError::bad_request("Request body could not be read")
            }
        })?;

    let mut envelope = Envelope::new(parts.method.clone())
        .with_headers(parts.headers.clone())
        .with_body(bytes);
    if let Some(query) = parts.uri.query() {
        envelope = envelope.with_query(query);
    }
    if let Some(extension) = path_extension(parts.uri.path()) {
        envelope = envelope.with_path_extension(extension);
    }
    if let Ok(params) = RawPathParams::from_request_parts(&mut parts, &()).await {
        for (name, value) in &params {
            envelope = envelope.with_route_param(name, value);
        }
    }
    if let Some(session) = parts.extensions.remove::<Session>() {
        envelope = envelope.with_session(session);
    }

    match endpoint.call(envelope) {
        Ok(finalized) => {
            let response = into_response(finalized)?;
            metrics::counter!("action.requests", "status_class" => status_class(response.status()))
                .increment(1);
            Ok(response)
        }
        Err(error) => {
            if error.exception().is_some() {
                metrics::counter!("action.unhandled").increment(1);
            }
            metrics::counter!("action.requests", "status_class" => "5xx").increment(1);
            Err(error.into())
        }
    }
}

/// Wrap an endpoint as an Axum handler.
///
/// ```ignore
/// let app = Router::new().route("/books/:id", get(into_handler(endpoint)));
/// ```
pub fn into_handler<A: Action>(
    endpoint: Endpoint<A>,
) -> impl Fn(Request) -> HandlerFuture + Clone + Send + Sync + 'static {
    let endpoint = Arc::new(endpoint);
    move |request| -> HandlerFuture {
        let endpoint = Arc::clone(&endpoint);
        Box::pin(async move { dispatch(&endpoint, request).await })
    }
}

fn into_response(finalized: Finalized) -> Result<Response, AppError> {
    let (status, headers, body, session) = finalized.into_parts();
    let status = StatusCode::from_u16(status)
        .map_err(|_| AppError::internal(format!("Action produced invalid status {status}")))?;

    let mut response = Response::new(Body::from(body.concat()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    if let Some(session) = session {
        response.extensions_mut().insert(session);
    }
    Ok(response)
}

// `to_bytes` boxes the limit error inside `axum::Error`.
fn exceeded_limit(error: &axum::Error) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(err) = current {
        if err.is::<LengthLimitError>() {
            return true;
        }
        current = err.source();
    }
    false
}

/// Extension of the last path segment, e.g. `json` for `/books/1.json`.
fn path_extension(path: &str) -> Option<&str> {
    let segment = path.rsplit('/').next()?;
    let (stem, extension) = segment.rsplit_once('.')?;
    let valid = !stem.is_empty()
        && !extension.is_empty()
        && extension.bytes().all(|b| b.is_ascii_alphanumeric());
    valid.then_some(extension)
}

const fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() / 100 {
        1 => "1xx",
        2 => "2xx",
        3 => "3xx",
        4 => "4xx",
        _ => "5xx",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use axum::{Router, http, routing::get};
    use composable_action_core::prelude::{
        ActionConfig, AppConfig, ERROR, Exception, Outcome, SessionConfig, halt, raise,
    };
    use composable_action_core::{request, response};
    use tower::ServiceExt;

    struct Show;

    impl Action for Show {
        fn handle(&self, request: &request::Request, response: &mut response::Response) -> Outcome {
            match request.params().get_str("id") {
                Some("0") => return halt(404),
                Some("boom") => return raise(Exception::new(&ERROR, "kaboom")),
                _ => {}
            }
            if response.has_session() {
                let visits = response
                    .session()?
                    .get("visits")
                    .and_then(serde_json::Value::as_u64)
                    .unwrap_or(0);
                response.session()?.insert("visits", visits + 1);
            }
            let id = request.params().get_str("id").unwrap_or("-").to_string();
            let format = response.format().unwrap_or("none").to_string();
            response.set_body(format!("{id}:{format}"));
            Ok(())
        }
    }

    fn endpoint(app: AppConfig) -> Endpoint<Show> {
        Endpoint::new(Show, ActionConfig::builder(Arc::new(app)).build().unwrap())
    }

    fn router(app: AppConfig) -> Router {
        Router::new().route("/books/:id", get(into_handler(endpoint(app))))
    }

    fn get_request(uri: &str) -> http::Request<Body> {
        http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_route_params_and_negotiated_format() {
        let request = http::Request::builder()
            .uri("/books/7")
            .header(http::header::ACCEPT, "application/json")
            .body(Body::empty())
            .unwrap();

        let response = router(AppConfig::default()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "application/json; charset=utf-8"
        );
        assert_eq!(body_text(response).await, "7:json");
    }

    #[tokio::test]
    async fn test_path_extension_selects_format() {
        let response = router(AppConfig::default())
            .oneshot(get_request("/books/7.xml"))
            .await
            .unwrap();

        assert_eq!(body_text(response).await, "7.xml:xml");
    }

    #[tokio::test]
    async fn test_halt_becomes_plain_response() {
        let response = router(AppConfig::default())
            .oneshot(get_request("/books/0"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "Not Found");
    }

    #[tokio::test]
    async fn test_unhandled_exception_becomes_json_500() {
        let response = router(AppConfig::default().with_reporter(Arc::new(
            composable_action_testing::RecordingReporter::new(),
        )))
        .oneshot(get_request("/books/boom"))
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["code"], "UNHANDLED_EXCEPTION");
        assert_eq!(body["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn test_session_round_trips_through_extensions() {
        let app = AppConfig::default().with_sessions(SessionConfig::default());
        let mut request = http::Request::builder()
            .uri("/books/7?id=3")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert([("visits", 2)].into_iter().collect::<Session>());

        let response = dispatch(&endpoint(app), request).await.unwrap();

        let session = response.extensions().get::<Session>().unwrap();
        assert_eq!(session.get("visits"), Some(&serde_json::json!(3)));
        // without a router there are no route params; the query supplies id
        assert_eq!(body_text(response).await, "3:none");
    }

    #[tokio::test]
    async fn test_form_body_is_parsed_into_params() {
        let request = http::Request::builder()
            .method(http::Method::POST)
            .uri("/books/new")
            .header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("id=9"))
            .unwrap();

        let response = dispatch(&endpoint(AppConfig::default()), request)
            .await
            .unwrap();

        assert_eq!(body_text(response).await, "9:none");
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let request = http::Request::builder()
            .method(http::Method::POST)
            .uri("/books/new")
            .body(Body::from(vec![b'a'; DEFAULT_BODY_LIMIT + 1]))
            .unwrap();

        let error = dispatch(&endpoint(AppConfig::default()), request)
            .await
            .unwrap_err();

        assert_eq!(error.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_exceeded_limit_matches_only_the_limit_error() {
        let error = axum::body::to_bytes(Body::from("too long"), 4)
            .await
            .unwrap_err();
        assert!(exceeded_limit(&error));

        let other = axum::Error::new(std::io::Error::other("length limit exceeded"));
        assert!(!exceeded_limit(&other));
    }

    #[test]
    fn test_path_extension() {
        assert_eq!(path_extension("/books/1.json"), Some("json"));
        assert_eq!(path_extension("/books.v2/1"), None);
        assert_eq!(path_extension("/books/.hidden"), None);
        assert_eq!(path_extension("/books/1."), None);
        assert_eq!(path_extension("/"), None);
    }

    #[test]
    fn test_status_class() {
        assert_eq!(status_class(StatusCode::OK), "2xx");
        assert_eq!(status_class(StatusCode::NOT_MODIFIED), "3xx");
        assert_eq!(status_class(StatusCode::NOT_ACCEPTABLE), "4xx");
        assert_eq!(status_class(StatusCode::BAD_GATEWAY), "5xx");
    }
}
