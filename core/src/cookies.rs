//! Per-request cookie jar with dirty tracking.
//!
//! The jar is hydrated from the inbound `Cookie` header on first read.
//! Only cookies written with [`CookieJar::set`] or [`CookieJar::remove`]
//! during the request are turned into `Set-Cookie` headers; reading never
//! marks a cookie dirty. The session cookie is owned by the session
//! middleware and never emitted by the jar.

use crate::environment::Clock;
use chrono::{DateTime, Duration, Utc};
use percent_encoding::percent_decode_str;
use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt::Write as _;

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    /// `SameSite=Strict`
    Strict,
    /// `SameSite=Lax`
    Lax,
    /// `SameSite=None`
    None,
}

impl SameSite {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// Cookie attributes.
///
/// Every field is optional so that per-call options can be layered over
/// the application defaults with [`CookieOptions::merged_over`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    /// `Domain` attribute.
    pub domain: Option<String>,
    /// `Path` attribute.
    pub path: Option<String>,
    /// `Max-Age` in seconds.
    pub max_age: Option<i64>,
    /// `Expires` attribute.
    pub expires: Option<DateTime<Utc>>,
    /// `Secure` flag.
    pub secure: Option<bool>,
    /// `HttpOnly` flag.
    pub http_only: Option<bool>,
    /// `SameSite` attribute.
    pub same_site: Option<SameSite>,
}

impl CookieOptions {
    /// Options with every attribute unset.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            domain: None,
            path: None,
            max_age: None,
            expires: None,
            secure: None,
            http_only: None,
            same_site: None,
        }
    }

    /// Set `Domain`.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set `Path`.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set `Max-Age` in seconds.
    #[must_use]
    pub const fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Set `Expires`.
    #[must_use]
    pub const fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Set the `Secure` flag.
    #[must_use]
    pub const fn with_secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    /// Set the `HttpOnly` flag.
    #[must_use]
    pub const fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = Some(http_only);
        self
    }

    /// Set `SameSite`.
    #[must_use]
    pub const fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Fill every unset attribute from `defaults`.
    #[must_use]
    pub fn merged_over(self, defaults: &Self) -> Self {
        Self {
            domain: self.domain.or_else(|| defaults.domain.clone()),
            path: self.path.or_else(|| defaults.path.clone()),
            max_age: self.max_age.or(defaults.max_age),
            expires: self.expires.or(defaults.expires),
            secure: self.secure.or(defaults.secure),
            http_only: self.http_only.or(defaults.http_only),
            same_site: self.same_site.or(defaults.same_site),
        }
    }
}

/// A cookie value plus its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    value: String,
    options: CookieOptions,
}

impl Cookie {
    /// Cookie with default attributes.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            options: CookieOptions::new(),
        }
    }

    /// Replace the attributes.
    #[must_use]
    pub fn with_options(mut self, options: CookieOptions) -> Self {
        self.options = options;
        self
    }

    /// The cookie value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The cookie attributes.
    #[must_use]
    pub const fn options(&self) -> &CookieOptions {
        &self.options
    }
}

impl From<&str> for Cookie {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Cookie {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Per-request cookie store.
#[derive(Debug, Default)]
pub struct CookieJar {
    header: Option<String>,
    incoming: OnceCell<HashMap<String, String>>,
    // Write order is emission order. `None` marks a removal.
    changes: Vec<(String, Option<Cookie>)>,
    defaults: CookieOptions,
    session_key: Option<String>,
}

impl CookieJar {
    /// Jar over a raw inbound `Cookie` header.
    #[must_use]
    pub fn new(header: Option<String>, defaults: CookieOptions) -> Self {
        Self {
            header,
            incoming: OnceCell::new(),
            changes: Vec::new(),
            defaults,
            session_key: None,
        }
    }

    /// Exclude the session middleware's cookie from emission.
    #[must_use]
    pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
        self.session_key = Some(key.into());
        self
    }

    /// Current value of a cookie: this request's write if any, otherwise the
    /// inbound value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        if let Some((_, change)) = self.changes.iter().find(|(n, _)| n == name) {
            return change.as_ref().map(Cookie::value);
        }
        self.incoming().get(name).map(String::as_str)
    }

    /// Write a cookie. Per-call attributes override the jar defaults.
    pub fn set(&mut self, name: impl Into<String>, cookie: impl Into<Cookie>) {
        self.record(name.into(), Some(cookie.into()));
    }

    /// Remove a cookie from the client.
    pub fn remove(&mut self, name: impl Into<String>) {
        self.record(name.into(), None);
    }

    /// Names written during this request, in write order.
    pub fn dirty(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(|(name, _)| name.as_str())
    }

    /// Every inbound cookie.
    #[must_use]
    pub fn incoming(&self) -> &HashMap<String, String> {
        self.incoming
            .get_or_init(|| parse_cookie_header(self.header.as_deref().unwrap_or_default()))
    }

    /// `Set-Cookie` header values for the dirty cookies.
    #[must_use]
    pub fn set_cookie_headers(&self, clock: &dyn Clock) -> Vec<String> {
        self.changes
            .iter()
            .filter(|(name, _)| self.session_key.as_deref() != Some(name.as_str()))
            .map(|(name, change)| match change {
                Some(cookie) => {
                    let options = cookie.options.clone().merged_over(&self.defaults);
                    serialize(name, &cookie.value, &options, clock)
                }
                None => serialize_removal(name, &self.defaults),
            })
            .collect()
    }

    fn record(&mut self, name: String, change: Option<Cookie>) {
        if let Some(slot) = self.changes.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = change;
        } else {
            self.changes.push((name, change));
        }
    }
}

/// Parse a `Cookie` request header. The first occurrence of a name wins.
#[must_use]
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for pair in header.split(';') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = decode(name.trim());
        if name.is_empty() {
            continue;
        }
        cookies.entry(name).or_insert_with(|| decode(value.trim()));
    }
    cookies
}

fn decode(raw: &str) -> String {
    percent_decode_str(&raw.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

fn encode(raw: &str) -> String {
    form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

pub(crate) fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn serialize(name: &str, value: &str, options: &CookieOptions, clock: &dyn Clock) -> String {
    let mut header = format!("{}={}", encode(name), encode(value));
    if let Some(domain) = &options.domain {
        let _ = write!(header, "; domain={domain}");
    }
    if let Some(path) = &options.path {
        let _ = write!(header, "; path={path}");
    }
    if let Some(max_age) = options.max_age {
        let _ = write!(header, "; max-age={max_age}");
    }
    let expires = options
        .expires
        .or_else(|| options.max_age.map(|secs| clock.now() + Duration::seconds(secs)));
    if let Some(expires) = expires {
        let _ = write!(header, "; expires={}", http_date(expires));
    }
    if options.secure == Some(true) {
        header.push_str("; secure");
    }
    if options.http_only == Some(true) {
        header.push_str("; HttpOnly");
    }
    if let Some(same_site) = options.same_site {
        let _ = write!(header, "; SameSite={}", same_site.as_str());
    }
    header
}

fn serialize_removal(name: &str, defaults: &CookieOptions) -> String {
    let mut header = format!("{}=", encode(name));
    if let Some(domain) = &defaults.domain {
        let _ = write!(header, "; domain={domain}");
    }
    if let Some(path) = &defaults.path {
        let _ = write!(header, "; path={path}");
    }
    header.push_str("; max-age=0; expires=Thu, 01 Jan 1970 00:00:00 GMT");
    header
}
