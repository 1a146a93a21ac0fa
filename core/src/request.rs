//! Inbound envelope and the read-only request view.

use crate::session::Session;
use bytes::Bytes;
use http::header::{HeaderName, ACCEPT, CONTENT_TYPE, COOKIE};
use http::{HeaderMap, HeaderValue, Method};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::cell::OnceCell;
use std::collections::HashMap;
use uuid::Uuid;

/// Header carrying an upstream request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// What the transport hands to an action: method, headers, raw body,
/// router params and (when session middleware runs) the session.
#[derive(Debug, Clone)]
pub struct Envelope {
    method: Method,
    headers: HeaderMap,
    query: Option<String>,
    body: Bytes,
    route_params: HashMap<String, String>,
    path_extension: Option<String>,
    session: Option<Session>,
}

impl Envelope {
    /// Envelope for `method` with no headers and an empty body.
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: HeaderMap::new(),
            query: None,
            body: Bytes::new(),
            route_params: HashMap::new(),
            path_extension: None,
            session: None,
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Replace all headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the raw query string (without `?`).
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Set the raw body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a router param.
    #[must_use]
    pub fn with_route_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.route_params.insert(name.into(), value.into());
        self
    }

    /// Path extension hint supplied by the router (`"json"` for `/books.json`).
    #[must_use]
    pub fn with_path_extension(mut self, extension: impl Into<String>) -> Self {
        self.path_extension = Some(extension.into());
        self
    }

    /// Session loaded by the session middleware.
    #[must_use]
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Request method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// Merged request parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Map<String, Value>);

impl Params {
    /// Read a parameter.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Read a string parameter.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Whether no parameters were supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over parameters.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Parameters as a JSON object.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    fn merge_pairs<'a>(&mut self, pairs: impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>) {
        for (key, value) in pairs {
            self.0.insert(key.into_owned(), Value::String(value.into_owned()));
        }
    }
}

/// Read-only view of the inbound request for one call.
#[derive(Debug)]
pub struct Request {
    method: Method,
    headers: HeaderMap,
    params: Params,
    body: Bytes,
    path_extension: Option<String>,
    accept: Option<String>,
    cookie: Option<String>,
    id: OnceCell<String>,
}

impl Request {
    /// Build the request view, returning the session separately.
    ///
    /// Parameters merge the query string, then the parsed body, then the
    /// router params; later sources win.
    #[must_use]
    pub fn from_envelope(envelope: Envelope) -> (Self, Option<Session>) {
        let Envelope {
            method,
            headers,
            query,
            body,
            route_params,
            path_extension,
            session,
        } = envelope;

        let mut params = Params::default();
        if let Some(query) = &query {
            params.merge_pairs(form_urlencoded::parse(query.as_bytes()));
        }
        parse_body(&headers, &body, &mut params);
        for (key, value) in route_params {
            params.0.insert(key, Value::String(value));
        }

        let id = OnceCell::new();
        if let Some(upstream) = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
        {
            let _ = id.set(upstream.to_string());
        }

        let accept = join_fields(&headers, &ACCEPT, ", ");
        let cookie = join_fields(&headers, &COOKIE, "; ");
        let request = Self {
            method,
            headers,
            params,
            body,
            path_extension,
            accept,
            cookie,
            id,
        };
        (request, session)
    }

    /// Request method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Whether this is a `HEAD` request.
    #[must_use]
    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }

    /// Request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A header as a string, if present and valid.
    #[must_use]
    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// `Accept` header, with repeated fields combined into one list.
    #[must_use]
    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    /// `Cookie` header, with repeated fields (as sent over HTTP/2) joined
    /// into one pair list.
    #[must_use]
    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    /// Raw `Content-Type` header.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE)
    }

    /// Merged parameters.
    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    /// Raw body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Path extension supplied by the router.
    #[must_use]
    pub fn path_extension(&self) -> Option<&str> {
        self.path_extension.as_deref()
    }

    /// Unique request identifier, generated on first use unless supplied
    /// upstream via `X-Request-Id`.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.get_or_init(|| Uuid::new_v4().simple().to_string())
    }
}

/// All valid values of a repeatable header, joined by `separator`.
fn join_fields(headers: &HeaderMap, name: &HeaderName, separator: &str) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();
    (!values.is_empty()).then(|| values.join(separator))
}

fn parse_body(headers: &HeaderMap, body: &Bytes, params: &mut Params) {
    if body.is_empty() {
        return;
    }
    let Some(content_type) = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<mime::Mime>().ok())
    else {
        return;
    };

    let is_json = content_type.subtype() == mime::JSON || content_type.suffix() == Some(mime::JSON);
    if content_type.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str() {
        params.merge_pairs(form_urlencoded::parse(body));
    } else if content_type.type_() == mime::APPLICATION && is_json {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => params.0.extend(map),
            Ok(_) => {
                tracing::warn!("JSON request body is not an object; ignoring for params");
            }
            Err(error) => {
                tracing::warn!(%error, "Malformed JSON request body; ignoring for params");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope() -> Envelope {
        Envelope::new(Method::POST)
    }

    #[test]
    fn test_query_params() {
        let (request, _) = Request::from_envelope(envelope().with_query("q=rust&page=2"));
        assert_eq!(request.params().get_str("q"), Some("rust"));
        assert_eq!(request.params().get_str("page"), Some("2"));
    }

    #[test]
    fn test_form_body_params() {
        let (request, _) = Request::from_envelope(
            envelope()
                .with_header(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                )
                .with_body("title=Hello+World"),
        );
        assert_eq!(request.params().get_str("title"), Some("Hello World"));
    }

    #[test]
    fn test_json_body_params() {
        let (request, _) = Request::from_envelope(
            envelope()
                .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .with_body(r#"{"book":{"title":"Dune"},"count":3}"#),
        );
        assert_eq!(request.params().get("book"), Some(&json!({"title": "Dune"})));
        assert_eq!(request.params().get("count"), Some(&json!(3)));
    }

    #[test]
    fn test_vendor_json_suffix_is_parsed() {
        let (request, _) = Request::from_envelope(
            envelope()
                .with_header(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/vnd.api+json"),
                )
                .with_body(r#"{"id":"1"}"#),
        );
        assert_eq!(request.params().get_str("id"), Some("1"));
    }

    #[test]
    fn test_malformed_json_is_ignored() {
        let (request, _) = Request::from_envelope(
            envelope()
                .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .with_body("{not json"),
        );
        assert!(request.params().is_empty());
        assert_eq!(request.body(), b"{not json");
    }

    #[test]
    fn test_route_params_win() {
        let (request, _) = Request::from_envelope(
            envelope()
                .with_query("id=from-query")
                .with_route_param("id", "from-route"),
        );
        assert_eq!(request.params().get_str("id"), Some("from-route"));
    }

    #[test]
    fn test_repeated_accept_fields_are_combined() {
        let (request, _) = Request::from_envelope(
            envelope()
                .with_header(ACCEPT, HeaderValue::from_static("text/html"))
                .with_header(ACCEPT, HeaderValue::from_static("application/json;q=0.8")),
        );
        assert_eq!(request.accept(), Some("text/html, application/json;q=0.8"));
    }

    #[test]
    fn test_split_cookie_fields_are_joined() {
        let (request, _) = Request::from_envelope(
            envelope()
                .with_header(COOKIE, HeaderValue::from_static("a=1"))
                .with_header(COOKIE, HeaderValue::from_static("b=2; c=3")),
        );
        assert_eq!(request.cookie(), Some("a=1; b=2; c=3"));
    }

    #[test]
    fn test_missing_list_headers() {
        let (request, _) = Request::from_envelope(envelope());
        assert!(request.accept().is_none());
        assert!(request.cookie().is_none());
    }

    #[test]
    fn test_request_id_is_memoized() {
        let (request, _) = Request::from_envelope(envelope());
        let id = request.id().to_string();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(request.id(), id);
    }

    #[test]
    fn test_request_id_from_upstream_header() {
        let (request, _) = Request::from_envelope(
            envelope().with_header(
                HeaderName::from_static(REQUEST_ID_HEADER),
                HeaderValue::from_static("upstream-id"),
            ),
        );
        assert_eq!(request.id(), "upstream-id");
    }

    #[test]
    fn test_session_is_split_off() {
        let mut session = Session::new();
        session.insert("user_id", 23);
        let (_, session) = Request::from_envelope(envelope().with_session(session));
        assert_eq!(session.and_then(|s| s.get("user_id").cloned()), Some(json!(23)));
    }

    #[test]
    fn test_head_detection() {
        let (request, _) = Request::from_envelope(Envelope::new(Method::HEAD));
        assert!(request.is_head());
    }
}
