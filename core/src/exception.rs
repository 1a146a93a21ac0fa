//! Raised exceptions and their kind hierarchy.
//!
//! Exception kinds form a single-inheritance tree. A kind is declared as a
//! `static` that optionally names its parent:
//!
//! ```
//! use composable_action_core::exception::{ErrorKind, Exception, ERROR};
//!
//! static RECORD_NOT_FOUND: ErrorKind = ErrorKind::child("RecordNotFound", &ERROR);
//! static MISSING_USER: ErrorKind = ErrorKind::child("MissingUser", &RECORD_NOT_FOUND);
//!
//! let exception = Exception::new(&MISSING_USER, "user 23 not found");
//! assert!(exception.is_a(&RECORD_NOT_FOUND));
//! assert!(exception.is_a(&ERROR));
//! ```
//!
//! Kinds compare by identity, not by name: declare them as `static`, never
//! `const`, so every use refers to the same node.

use std::fmt;

/// A node in the exception kind hierarchy.
#[derive(Debug)]
pub struct ErrorKind {
    name: &'static str,
    parent: Option<&'static ErrorKind>,
}

/// Root of the hierarchy. Errors raised with `?` that are not already an
/// [`Exception`] land under this kind.
pub static ERROR: ErrorKind = ErrorKind::root("Error");

impl ErrorKind {
    /// Declare a kind with no parent.
    #[must_use]
    pub const fn root(name: &'static str) -> Self {
        Self { name, parent: None }
    }

    /// Declare a kind that is-a `parent`.
    #[must_use]
    pub const fn child(name: &'static str, parent: &'static Self) -> Self {
        Self {
            name,
            parent: Some(parent),
        }
    }

    /// The kind's name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The kind's direct parent.
    #[must_use]
    pub const fn parent(&self) -> Option<&'static Self> {
        self.parent
    }

    /// Whether this kind equals `other` or descends from it.
    #[must_use]
    pub fn is_a(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        let mut current = self.parent;
        while let Some(kind) = current {
            if std::ptr::eq(kind, other) {
                return true;
            }
            current = kind.parent;
        }
        false
    }

    /// Number of ancestors. Deeper kinds are more specific.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent;
        while let Some(kind) = current {
            depth += 1;
            current = kind.parent;
        }
        depth
    }
}

/// Identity: two kinds with the same name and parent are still distinct.
impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for ErrorKind {}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// An exception raised inside the request pipeline.
#[derive(Debug)]
pub struct Exception {
    kind: &'static ErrorKind,
    message: String,
    source: Option<anyhow::Error>,
}

impl Exception {
    /// Create a new exception of `kind`.
    #[must_use]
    pub fn new(kind: &'static ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Wrap an arbitrary error under the root kind.
    #[must_use]
    pub fn from_error(err: anyhow::Error) -> Self {
        Self {
            kind: &ERROR,
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// The exception's kind.
    #[must_use]
    pub const fn kind(&self) -> &'static ErrorKind {
        self.kind
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the exception is an instance of `kind` or one of its subkinds.
    #[must_use]
    pub fn is_a(&self, kind: &ErrorKind) -> bool {
        self.kind.is_a(kind)
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Exception {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static STANDARD: ErrorKind = ErrorKind::child("StandardError", &ERROR);
    static SPECIFIC: ErrorKind = ErrorKind::child("SpecificError", &STANDARD);
    static SIBLING: ErrorKind = ErrorKind::child("SiblingError", &STANDARD);

    #[test]
    fn test_is_a_walks_ancestors() {
        assert!(SPECIFIC.is_a(&SPECIFIC));
        assert!(SPECIFIC.is_a(&STANDARD));
        assert!(SPECIFIC.is_a(&ERROR));
        assert!(!STANDARD.is_a(&SPECIFIC));
        assert!(!SIBLING.is_a(&SPECIFIC));
    }

    mod billing {
        use super::*;
        pub static NOT_FOUND: ErrorKind = ErrorKind::child("NotFound", &STANDARD);
    }

    mod catalog {
        use super::*;
        pub static NOT_FOUND: ErrorKind = ErrorKind::child("NotFound", &STANDARD);
    }

    #[test]
    fn test_same_named_kinds_are_distinct() {
        assert!(!catalog::NOT_FOUND.is_a(&billing::NOT_FOUND));
        assert!(catalog::NOT_FOUND.is_a(&STANDARD));
        assert_ne!(&catalog::NOT_FOUND, &billing::NOT_FOUND);
        assert_eq!(&catalog::NOT_FOUND, &catalog::NOT_FOUND);
    }

    #[test]
    fn test_depth() {
        assert_eq!(ERROR.depth(), 0);
        assert_eq!(STANDARD.depth(), 1);
        assert_eq!(SPECIFIC.depth(), 2);
    }

    #[test]
    fn test_exception_display_and_source() {
        let exception = Exception::new(&SPECIFIC, "went wrong")
            .with_source(anyhow::anyhow!("disk full"));
        assert_eq!(exception.to_string(), "SpecificError: went wrong");
        let source = std::error::Error::source(&exception).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_from_error_uses_root_kind() {
        let exception = Exception::from_error(anyhow::anyhow!("plain failure"));
        assert_eq!(exception.kind(), &ERROR);
        assert_eq!(exception.message(), "plain failure");
    }
}
