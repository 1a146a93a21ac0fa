//! HTTP caching helpers: `Cache-Control`, `Expires` and conditional GET.

use crate::cookies::http_date;
use crate::halt::{halt, Outcome};
use crate::request::Request;
use crate::response::Response;
use chrono::{DateTime, Duration, Utc};
use http::header::{CACHE_CONTROL, ETAG, EXPIRES, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use std::fmt;

/// One `Cache-Control` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDirective {
    /// `public`
    Public,
    /// `private`
    Private,
    /// `no-cache`
    NoCache,
    /// `no-store`
    NoStore,
    /// `must-revalidate`
    MustRevalidate,
    /// `proxy-revalidate`
    ProxyRevalidate,
    /// `no-transform`
    NoTransform,
    /// `immutable`
    Immutable,
    /// `max-age=N`
    MaxAge(u64),
    /// `s-maxage=N`
    SMaxAge(u64),
    /// `stale-while-revalidate=N`
    StaleWhileRevalidate(u64),
}

impl fmt::Display for CacheDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Private => f.write_str("private"),
            Self::NoCache => f.write_str("no-cache"),
            Self::NoStore => f.write_str("no-store"),
            Self::MustRevalidate => f.write_str("must-revalidate"),
            Self::ProxyRevalidate => f.write_str("proxy-revalidate"),
            Self::NoTransform => f.write_str("no-transform"),
            Self::Immutable => f.write_str("immutable"),
            Self::MaxAge(seconds) => write!(f, "max-age={seconds}"),
            Self::SMaxAge(seconds) => write!(f, "s-maxage={seconds}"),
            Self::StaleWhileRevalidate(seconds) => write!(f, "stale-while-revalidate={seconds}"),
        }
    }
}

fn render(directives: &[CacheDirective]) -> String {
    directives
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Response {
    /// Set `Cache-Control` from `directives`.
    pub fn cache_control(&mut self, directives: &[CacheDirective]) {
        if directives.is_empty() {
            self.headers_mut().remove(CACHE_CONTROL);
            return;
        }
        // Directive rendering only produces visible ASCII.
        if let Ok(value) = render(directives).parse() {
            self.headers_mut().insert(CACHE_CONTROL, value);
        }
    }

    /// Expire the response `seconds` from now: sets `Expires` and a
    /// matching `max-age` alongside `directives`.
    pub fn expires(&mut self, seconds: u64, directives: &[CacheDirective]) {
        let now = self.config().clock.now();
        let offset = i64::try_from(seconds).unwrap_or(i64::MAX);
        let at = now
            .checked_add_signed(Duration::seconds(offset))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if let Ok(value) = http_date(at).parse() {
            self.headers_mut().insert(EXPIRES, value);
        }

        let mut all: Vec<CacheDirective> = directives
            .iter()
            .copied()
            .filter(|d| !matches!(d, CacheDirective::MaxAge(_)))
            .collect();
        all.push(CacheDirective::MaxAge(seconds));
        self.cache_control(&all);
    }

    /// Conditional GET.
    ///
    /// Sets `ETag` and `Last-Modified` from the given validators, then halts
    /// with `304 Not Modified` when the request's `If-None-Match` or
    /// `If-Modified-Since` shows the client copy is still fresh.
    /// `If-None-Match` takes precedence when both are present.
    ///
    /// # Errors
    ///
    /// Returns a 304 halt when the client copy is fresh, or a raised error
    /// when `etag` is not a valid header value.
    pub fn fresh_when(
        &mut self,
        request: &Request,
        etag: Option<&str>,
        last_modified: Option<DateTime<Utc>>,
    ) -> Outcome {
        let quoted = etag.map(|tag| format!("\"{tag}\""));
        if let Some(quoted) = &quoted {
            self.set_header(ETAG, quoted)?;
        }
        if let Some(modified) = last_modified {
            self.set_header(LAST_MODIFIED, &http_date(modified))?;
        }

        let fresh = match (request.header(IF_NONE_MATCH), &quoted) {
            (Some(candidates), Some(quoted)) => etag_matches(candidates, quoted),
            (Some(_), None) => false,
            (None, _) => match (request.header(IF_MODIFIED_SINCE), last_modified) {
                (Some(since), Some(modified)) => not_modified_since(since, modified),
                _ => false,
            },
        };

        if fresh {
            tracing::debug!("Client cache is fresh; halting with 304");
            return halt(304);
        }
        Ok(())
    }
}

fn etag_matches(if_none_match: &str, quoted: &str) -> bool {
    if_none_match.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == quoted
    })
}

fn not_modified_since(since: &str, modified: DateTime<Utc>) -> bool {
    DateTime::parse_from_rfc2822(since)
        .is_ok_and(|since| modified.timestamp() <= since.timestamp())
}
