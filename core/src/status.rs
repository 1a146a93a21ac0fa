//! HTTP status table.
//!
//! Static mapping of numeric status codes to reason phrases, plus the
//! symbolic aliases (`"not_found"`, `"unprocessable_entity"`, ...) derived
//! from those phrases.
//!
//! Codes outside the table are rejected with [`ConfigError::UnknownStatus`]
//! rather than silently mapped to a generic phrase.

use crate::error::ConfigError;

/// Every status code the framework knows about, ordered by code.
const STATUSES: &[(u16, &str)] = &[
    (100, "Continue"),
    (101, "Switching Protocols"),
    (102, "Processing"),
    (103, "Early Hints"),
    (200, "OK"),
    (201, "Created"),
    (202, "Accepted"),
    (203, "Non-Authoritative Information"),
    (204, "No Content"),
    (205, "Reset Content"),
    (206, "Partial Content"),
    (207, "Multi-Status"),
    (208, "Already Reported"),
    (226, "IM Used"),
    (300, "Multiple Choices"),
    (301, "Moved Permanently"),
    (302, "Found"),
    (303, "See Other"),
    (304, "Not Modified"),
    (305, "Use Proxy"),
    (307, "Temporary Redirect"),
    (308, "Permanent Redirect"),
    (400, "Bad Request"),
    (401, "Unauthorized"),
    (402, "Payment Required"),
    (403, "Forbidden"),
    (404, "Not Found"),
    (405, "Method Not Allowed"),
    (406, "Not Acceptable"),
    (407, "Proxy Authentication Required"),
    (408, "Request Timeout"),
    (409, "Conflict"),
    (410, "Gone"),
    (411, "Length Required"),
    (412, "Precondition Failed"),
    (413, "Payload Too Large"),
    (414, "URI Too Long"),
    (415, "Unsupported Media Type"),
    (416, "Range Not Satisfiable"),
    (417, "Expectation Failed"),
    (418, "I'm a teapot"),
    (421, "Misdirected Request"),
    (422, "Unprocessable Entity"),
    (423, "Locked"),
    (424, "Failed Dependency"),
    (425, "Too Early"),
    (426, "Upgrade Required"),
    (428, "Precondition Required"),
    (429, "Too Many Requests"),
    (431, "Request Header Fields Too Large"),
    (451, "Unavailable For Legal Reasons"),
    (500, "Internal Server Error"),
    (501, "Not Implemented"),
    (502, "Bad Gateway"),
    (503, "Service Unavailable"),
    (504, "Gateway Timeout"),
    (505, "HTTP Version Not Supported"),
    (506, "Variant Also Negotiates"),
    (507, "Insufficient Storage"),
    (508, "Loop Detected"),
    (509, "Bandwidth Limit Exceeded"),
    (510, "Not Extended"),
    (511, "Network Authentication Required"),
];

/// Returns the reason phrase for `code`.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownStatus`] when `code` is not in the table.
///
/// # Examples
///
/// ```
/// use composable_action_core::status;
///
/// assert_eq!(status::message_for(401).ok(), Some("Unauthorized"));
/// assert!(status::message_for(999).is_err());
/// ```
pub fn message_for(code: u16) -> Result<&'static str, ConfigError> {
    STATUSES
        .binary_search_by_key(&code, |(c, _)| *c)
        .map(|idx| STATUSES[idx].1)
        .map_err(|_| ConfigError::UnknownStatus(code))
}

/// Returns the numeric code for a symbolic status name such as `"not_found"`.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownStatusName`] when no reason phrase
/// symbolizes to `name`.
pub fn code_for(name: &str) -> Result<u16, ConfigError> {
    STATUSES
        .iter()
        .find(|(_, message)| symbolize(message) == name)
        .map(|(code, _)| *code)
        .ok_or_else(|| ConfigError::UnknownStatusName(name.to_string()))
}

/// Whether `code` is present in the table.
#[must_use]
pub fn is_known(code: u16) -> bool {
    message_for(code).is_ok()
}

/// Whether a response with this status must not carry a body.
///
/// Covers the informational class and 204, 205 and 304.
#[must_use]
pub const fn forbids_body(code: u16) -> bool {
    matches!(code, 100..=199 | 204 | 205 | 304)
}

/// Whether `code` is a redirection status that uses `Location`.
#[must_use]
pub const fn is_redirect(code: u16) -> bool {
    matches!(code, 301 | 302 | 303 | 307 | 308)
}

// "Non-Authoritative Information" -> "non_authoritative_information"
fn symbolize(message: &str) -> String {
    message
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
