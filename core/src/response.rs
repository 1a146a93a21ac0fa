//! Mutable response container for one call.

use crate::config::AppConfig;
use crate::cookies::CookieJar;
use crate::error::ConfigError;
use crate::flash::Flash;
use crate::halt::{halt, Halt, Outcome};
use crate::request::Request;
use crate::session::Session;
use crate::status;
use bytes::{Bytes, BytesMut};
use http::header::{InvalidHeaderValue, IntoHeaderName, CONTENT_TYPE, LOCATION, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Headers kept on responses that carry no body.
pub const ENTITY_HEADERS: [&str; 8] = [
    "allow",
    "content-encoding",
    "content-language",
    "content-location",
    "content-md5",
    "content-range",
    "expires",
    "last-modified",
];

/// Session and flash, present only when session support is enabled.
#[derive(Debug)]
struct SessionState {
    session: Session,
    flash: Flash,
}

/// The response under construction.
///
/// Body and header suppression for no-body statuses and `HEAD` requests is
/// applied at finalization, not on assignment.
#[derive(Debug)]
pub struct Response {
    status: u16,
    headers: HeaderMap,
    body: Vec<Bytes>,
    exposures: BTreeMap<String, Value>,
    format: Option<String>,
    content_type: String,
    charset: String,
    cookies: CookieJar,
    session: Option<SessionState>,
    config: Arc<AppConfig>,
}

impl Response {
    /// Response with status 200, the configured default headers and charset.
    ///
    /// `session` is `Some` only when session support is enabled.
    #[must_use]
    pub fn new(config: Arc<AppConfig>, cookies: CookieJar, session: Option<Session>) -> Self {
        let session = session.map(|session| SessionState {
            flash: Flash::from_session(&session),
            session,
        });
        Self {
            status: 200,
            headers: config.default_headers.clone(),
            body: Vec::new(),
            exposures: BTreeMap::new(),
            format: None,
            content_type: crate::format::FALLBACK_MIME.to_string(),
            charset: config.default_charset.clone(),
            cookies,
            session,
            config,
        }
    }

    /// Status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Set the status code.
    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable response headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Set a header from a string value.
    ///
    /// # Errors
    ///
    /// Returns an error when `value` is not a valid header value.
    pub fn set_header(&mut self, name: impl IntoHeaderName, value: &str) -> Result<(), InvalidHeaderValue> {
        self.headers.insert(name, HeaderValue::from_str(value)?);
        Ok(())
    }

    /// Body chunks.
    #[must_use]
    pub fn body(&self) -> &[Bytes] {
        &self.body
    }

    /// Replace the body with a single chunk.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = vec![body.into()];
    }

    /// Append a chunk to the body.
    pub fn write(&mut self, chunk: impl Into<Bytes>) {
        self.body.push(chunk.into());
    }

    /// Drop the body.
    pub fn clear_body(&mut self) {
        self.body.clear();
    }

    /// The body as one contiguous buffer.
    #[must_use]
    pub fn body_bytes(&self) -> Bytes {
        match self.body.as_slice() {
            [] => Bytes::new(),
            [single] => single.clone(),
            chunks => {
                let mut buf = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
                for chunk in chunks {
                    buf.extend_from_slice(chunk);
                }
                buf.freeze()
            }
        }
    }

    /// Attach a value for introspection; never sent over the wire.
    pub fn expose(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.exposures.insert(key.into(), value.into());
    }

    /// A previously exposed value.
    #[must_use]
    pub fn exposure(&self, key: &str) -> Option<&Value> {
        self.exposures.get(key)
    }

    /// Every exposed value.
    #[must_use]
    pub const fn exposures(&self) -> &BTreeMap<String, Value> {
        &self.exposures
    }

    /// Resolved format symbol.
    #[must_use]
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// Switch the response to a format symbol, updating the content type.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownFormat`] for unregistered symbols.
    pub fn set_format(&mut self, format: &str) -> Result<(), ConfigError> {
        let mime = self.config.formats.mime_for(format)?.to_string();
        self.format = Some(format.to_string());
        self.content_type = mime;
        Ok(())
    }

    /// Content type without charset.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Set the content type; the format follows when the type is registered.
    pub fn set_content_type(&mut self, mime: impl Into<String>) {
        self.content_type = mime.into();
        self.format = self
            .config
            .formats
            .format_for(&self.content_type)
            .map(ToString::to_string);
    }

    /// Charset appended to `Content-Type`.
    #[must_use]
    pub fn charset(&self) -> &str {
        &self.charset
    }

    /// Set the charset.
    pub fn set_charset(&mut self, charset: impl Into<String>) {
        self.charset = charset.into();
    }

    /// Cookie jar for this request.
    pub fn cookies(&mut self) -> &mut CookieJar {
        &mut self.cookies
    }

    /// Read-only cookie jar.
    #[must_use]
    pub const fn cookie_jar(&self) -> &CookieJar {
        &self.cookies
    }

    /// Session for this request.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SessionDisabled`] without session support.
    pub fn session(&mut self) -> Result<&mut Session, ConfigError> {
        self.session
            .as_mut()
            .map(|state| &mut state.session)
            .ok_or(ConfigError::SessionDisabled)
    }

    /// Flash for this request.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SessionDisabled`] without session support.
    pub fn flash(&mut self) -> Result<&mut Flash, ConfigError> {
        self.session
            .as_mut()
            .map(|state| &mut state.flash)
            .ok_or(ConfigError::SessionDisabled)
    }

    /// Whether session support is active for this call.
    #[must_use]
    pub const fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Redirect with `302 Found`.
    ///
    /// # Errors
    ///
    /// Always returns `Err`: a redirect halts the pipeline.
    pub fn redirect_to(&mut self, location: &str) -> Outcome {
        self.redirect_with(location, 302)
    }

    /// Set `Location` and halt with `status`.
    ///
    /// # Errors
    ///
    /// Always returns `Err`: a halt, a raised error for an invalid location,
    /// or [`ConfigError::NotARedirect`] when `status` is not 301, 302, 303,
    /// 307 or 308.
    pub fn redirect_with(&mut self, location: &str, status: u16) -> Outcome {
        if !status::is_redirect(status) {
            return Err(ConfigError::NotARedirect(status).into());
        }
        self.set_header(LOCATION, location)?;
        self.status = status;
        halt(status)
    }

    pub(crate) const fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    pub(crate) fn set_resolved_format(&mut self, format: Option<String>, mime: String) {
        self.format = format;
        self.content_type = mime;
    }

    /// Apply a halt: its status, and its body or the status message.
    pub(crate) fn apply_halt(&mut self, halt: &Halt) -> Result<(), ConfigError> {
        let body = match halt.body() {
            Some(body) => body.to_string(),
            None => status::message_for(halt.status())?.to_string(),
        };
        self.status = halt.status();
        self.set_body(body);
        Ok(())
    }

    /// Assemble the wire response.
    ///
    /// Order matters: `Content-Type` is assigned first, then bodiless
    /// responses are stripped down to entity headers, then cookies are
    /// appended so they survive stripping, then the flash is rotated into
    /// the outgoing session.
    pub(crate) fn finalize(mut self, request: &Request) -> Result<Finalized, ConfigError> {
        if !status::is_known(self.status) {
            return Err(ConfigError::UnknownStatus(self.status));
        }
        let bodiless = status::forbids_body(self.status) || request.is_head();

        if !bodiless && !self.headers.contains_key(CONTENT_TYPE) {
            let value = if self.charset.is_empty() {
                self.content_type.clone()
            } else {
                format!("{}; charset={}", self.content_type, self.charset)
            };
            match HeaderValue::from_str(&value) {
                Ok(value) => {
                    self.headers.insert(CONTENT_TYPE, value);
                }
                Err(error) => tracing::warn!(%error, value, "Invalid Content-Type; not set"),
            }
        }

        if bodiless {
            self.body.clear();
            let doomed: Vec<HeaderName> = self
                .headers
                .keys()
                .filter(|name| !ENTITY_HEADERS.contains(&name.as_str()))
                .cloned()
                .collect();
            for name in doomed {
                self.headers.remove(name);
            }
        }

        for cookie in self.cookies.set_cookie_headers(self.config.clock.as_ref()) {
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    self.headers.append(SET_COOKIE, value);
                }
                Err(error) => tracing::warn!(%error, "Invalid Set-Cookie value; dropped"),
            }
        }

        let session = self.session.take().map(|mut state| {
            state.flash.sweep();
            state.flash.write_to(&mut state.session);
            state.session
        });

        self.exposures
            .insert("params".to_string(), request.params().to_value());
        self.exposures.insert(
            "format".to_string(),
            self.format.clone().map_or(Value::Null, Value::String),
        );

        Ok(Finalized {
            status: self.status,
            headers: self.headers,
            body: self.body,
            exposures: self.exposures,
            session,
        })
    }
}

/// The finalized `(status, headers, body)` triple plus what the
/// surrounding transport needs: exposures and the outgoing session.
#[derive(Debug, Clone)]
pub struct Finalized {
    status: u16,
    headers: HeaderMap,
    body: Vec<Bytes>,
    exposures: BTreeMap<String, Value>,
    session: Option<Session>,
}

impl Finalized {
    /// Status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A header as a string, if present and valid.
    #[must_use]
    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body chunks.
    #[must_use]
    pub fn body(&self) -> &[Bytes] {
        &self.body
    }

    /// Body as UTF-8 text, lossily decoded.
    #[must_use]
    pub fn body_string(&self) -> String {
        self.body
            .iter()
            .map(|chunk| String::from_utf8_lossy(chunk))
            .collect()
    }

    /// Introspection values, including `params` and `format`.
    #[must_use]
    pub const fn exposures(&self) -> &BTreeMap<String, Value> {
        &self.exposures
    }

    /// One introspection value.
    #[must_use]
    pub fn exposure(&self, key: &str) -> Option<&Value> {
        self.exposures.get(key)
    }

    /// Outgoing session, when session support is enabled.
    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Split into the wire triple and the outgoing session.
    #[must_use]
    pub fn into_parts(self) -> (u16, HeaderMap, Vec<Bytes>, Option<Session>) {
        (self.status, self.headers, self.body, self.session)
    }
}
