//! Format symbols, MIME types, and format resolution.
//!
//! A *format* is a short symbol such as `json` mapped to a MIME type such
//! as `application/json`. The [`FormatRegistry`] holds the built-in table
//! plus any application registrations, which take precedence.
//!
//! [`resolve`] decides the response format for a request with a single
//! precedence:
//!
//! 1. explicit override configured on the action
//! 2. path-extension hint supplied by the router
//! 3. `Accept` header negotiation
//! 4. configured default response format, then default request format
//! 5. first accepted format of the action
//! 6. `application/octet-stream`

use crate::error::ConfigError;
use crate::negotiation;

/// MIME type used when nothing else applies.
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Built-in format table in declaration order.
const BUILTIN: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("xhtml", "application/xhtml+xml"),
    ("txt", "text/plain"),
    ("csv", "text/csv"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("jsonapi", "application/vnd.api+json"),
    ("atom", "application/atom+xml"),
    ("rss", "application/rss+xml"),
    ("ics", "text/calendar"),
    ("md", "text/markdown"),
    ("yaml", "application/yaml"),
    ("form", "application/x-www-form-urlencoded"),
    ("multipart", "multipart/form-data"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("wasm", "application/wasm"),
    ("bin", FALLBACK_MIME),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("ico", "image/vnd.microsoft.icon"),
    ("avif", "image/avif"),
    ("mp3", "audio/mpeg"),
    ("ogg", "audio/ogg"),
    ("wav", "audio/wav"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("otf", "font/otf"),
    ("eot", "application/vnd.ms-fontobject"),
    ("xls", "application/vnd.ms-excel"),
    ("xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
    ("doc", "application/msword"),
    ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
    ("event_stream", "text/event-stream"),
];

/// Bidirectional format symbol / MIME type table.
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    custom: Vec<(String, String)>,
}

impl FormatRegistry {
    /// Registry with only the built-in table.
    #[must_use]
    pub const fn new() -> Self {
        Self { custom: Vec::new() }
    }

    /// Register `format` for `mime`, shadowing any built-in mapping.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>, mime: impl Into<String>) -> Self {
        self.register(format, mime);
        self
    }

    /// Register `format` for `mime` in place.
    pub fn register(&mut self, format: impl Into<String>, mime: impl Into<String>) {
        let format = format.into();
        let mime = mime.into();
        self.custom.retain(|(f, m)| *f != format && *m != mime);
        self.custom.push((format, mime));
    }

    /// MIME type for a format symbol.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownFormat`] for unregistered symbols.
    pub fn mime_for(&self, format: &str) -> Result<&str, ConfigError> {
        self.lookup_mime(format)
            .ok_or_else(|| ConfigError::UnknownFormat(format.to_string()))
    }

    /// Format symbol for a MIME type. Parameters such as `charset` are ignored.
    #[must_use]
    pub fn format_for(&self, mime: &str) -> Option<&str> {
        let essence = essence(mime);
        self.custom
            .iter()
            .rev()
            .find(|(_, m)| m.eq_ignore_ascii_case(essence))
            .map(|(f, _)| f.as_str())
            .or_else(|| {
                BUILTIN
                    .iter()
                    .find(|(_, m)| m.eq_ignore_ascii_case(essence))
                    .map(|(f, _)| *f)
            })
    }

    /// Every known MIME type: registrations first, then the built-in table.
    #[must_use]
    pub fn mime_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.custom.iter().rev().map(|(_, m)| m.as_str()).collect();
        for &(_, mime) in BUILTIN {
            if !types.contains(&mime) {
                types.push(mime);
            }
        }
        types
    }

    fn lookup_mime(&self, format: &str) -> Option<&str> {
        self.custom
            .iter()
            .rev()
            .find(|(f, _)| f == format)
            .map(|(_, m)| m.as_str())
            .or_else(|| {
                BUILTIN
                    .iter()
                    .find(|(f, _)| *f == format)
                    .map(|(_, m)| *m)
            })
    }
}

fn essence(mime: &str) -> &str {
    mime.split(';').next().unwrap_or(mime).trim()
}

/// Inputs to format resolution for one request.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatHints<'a> {
    /// Format forced by the action's configuration.
    pub explicit: Option<&'a str>,
    /// Extension taken from the request path by the router (`"json"`).
    pub extension: Option<&'a str>,
    /// Raw `Accept` header.
    pub accept: Option<&'a str>,
    /// Formats the action restricts itself to.
    pub accepted: &'a [String],
    /// Configured default response format.
    pub default_response: Option<&'a str>,
    /// Configured default request format.
    pub default_request: Option<&'a str>,
}

/// Result of format resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFormat {
    /// Format symbol, when the MIME type has one.
    pub format: Option<String>,
    /// MIME type to use for `Content-Type`.
    pub mime: String,
}

impl ResolvedFormat {
    fn from_mime(registry: &FormatRegistry, mime: &str) -> Self {
        Self {
            format: registry.format_for(mime).map(ToString::to_string),
            mime: mime.to_string(),
        }
    }
}

/// Resolve the response format for a request.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownFormat`] when an explicit, default, or
/// accepted format symbol is not registered. Unknown path extensions are
/// ignored.
pub fn resolve(registry: &FormatRegistry, hints: FormatHints<'_>) -> Result<ResolvedFormat, ConfigError> {
    if let Some(format) = hints.explicit {
        let mime = registry.mime_for(format)?;
        return Ok(ResolvedFormat::from_mime(registry, mime));
    }

    if let Some(mime) = hints.extension.and_then(|ext| registry.lookup_mime(ext)) {
        return Ok(ResolvedFormat::from_mime(registry, mime));
    }

    let accepted = hints
        .accepted
        .iter()
        .map(|format| registry.mime_for(format))
        .collect::<Result<Vec<_>, _>>()?;

    if !negotiation::accepts_anything(hints.accept) {
        let known = registry.mime_types();
        let negotiated = if accepted.is_empty() {
            negotiation::best_match(hints.accept, &known)
        } else {
            negotiation::best_match(hints.accept, &accepted)
        };
        if let Some(mime) = negotiated {
            return Ok(ResolvedFormat::from_mime(registry, mime));
        }
    }

    if let Some(default) = hints.default_response.or(hints.default_request) {
        let mime = registry.mime_for(default)?;
        return Ok(ResolvedFormat::from_mime(registry, mime));
    }

    if let Some(mime) = accepted.first() {
        return Ok(ResolvedFormat::from_mime(registry, mime));
    }

    Ok(ResolvedFormat {
        format: None,
        mime: FALLBACK_MIME.to_string(),
    })
}
