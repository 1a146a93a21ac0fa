//! Exception policy: which raised exceptions become which responses.
//!
//! A policy maps exception kinds to a [`Recovery`]. When several entries
//! match a raised exception, the entry for the most specific kind (the
//! deepest in the hierarchy) wins; equal kinds resolve to the first entry.
//!
//! Policies exist at two levels. The application-wide table lives in
//! [`AppConfig`](crate::config::AppConfig); each action may add its own
//! table, and [`ExceptionPolicy::merged`] lays the action's entries over
//! the application's.

use crate::exception::{ErrorKind, Exception};

/// What to do with a matched exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// Halt with this status.
    Status(u16),
    /// Invoke the recovery handler registered under this name on the
    /// action. A name with no registered handler is read as a status,
    /// numeric (`"404"`) or symbolic (`"not_found"`).
    Handler(String),
}

impl From<u16> for Recovery {
    fn from(status: u16) -> Self {
        Self::Status(status)
    }
}

impl From<&str> for Recovery {
    fn from(name: &str) -> Self {
        Self::Handler(name.to_string())
    }
}

impl From<String> for Recovery {
    fn from(name: String) -> Self {
        Self::Handler(name)
    }
}

/// Ordered table of exception kind to recovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionPolicy {
    entries: Vec<(&'static ErrorKind, Recovery)>,
}

impl ExceptionPolicy {
    /// Empty policy.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a recovery for `kind` and its subkinds.
    ///
    /// # Examples
    ///
    /// ```
    /// use composable_action_core::exception::{ErrorKind, Exception, ERROR};
    /// use composable_action_core::policy::{ExceptionPolicy, Recovery};
    ///
    /// static NOT_FOUND: ErrorKind = ErrorKind::child("NotFound", &ERROR);
    ///
    /// let policy = ExceptionPolicy::new()
    ///     .handle(&ERROR, 500)
    ///     .handle(&NOT_FOUND, 404);
    ///
    /// let raised = Exception::new(&NOT_FOUND, "no such book");
    /// assert_eq!(policy.resolve(&raised), Some(&Recovery::Status(404)));
    /// ```
    #[must_use]
    pub fn handle(mut self, kind: &'static ErrorKind, recovery: impl Into<Recovery>) -> Self {
        self.register(kind, recovery);
        self
    }

    /// Register in place. Re-registering a kind replaces its recovery but
    /// keeps its position.
    pub fn register(&mut self, kind: &'static ErrorKind, recovery: impl Into<Recovery>) {
        let recovery = recovery.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| std::ptr::eq(*k, kind)) {
            entry.1 = recovery;
        } else {
            self.entries.push((kind, recovery));
        }
    }

    /// This policy with `local` laid over it; `local` wins on equal kinds.
    #[must_use]
    pub fn merged(&self, local: &Self) -> Self {
        let mut merged = self.clone();
        for (kind, recovery) in &local.entries {
            merged.register(kind, recovery.clone());
        }
        merged
    }

    /// The recovery for `exception`, if any entry matches.
    #[must_use]
    pub fn resolve(&self, exception: &Exception) -> Option<&Recovery> {
        let mut best: Option<(usize, &Recovery)> = None;
        for (kind, recovery) in &self.entries {
            if !exception.is_a(kind) {
                continue;
            }
            let depth = kind.depth();
            if best.is_none_or(|(d, _)| depth > d) {
                best = Some((depth, recovery));
            }
        }
        best.map(|(_, recovery)| recovery)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the policy has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static ErrorKind, &Recovery)> {
        self.entries.iter().map(|(kind, recovery)| (*kind, recovery))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::ERROR;

    static STANDARD: ErrorKind = ErrorKind::child("StandardError", &ERROR);
    static SPECIFIC: ErrorKind = ErrorKind::child("SpecificError", &STANDARD);
    static DEEPER: ErrorKind = ErrorKind::child("DeeperError", &SPECIFIC);
    static UNRELATED: ErrorKind = ErrorKind::root("Unrelated");

    mod billing {
        use super::*;
        pub static NOT_FOUND: ErrorKind = ErrorKind::child("NotFound", &STANDARD);
    }

    mod catalog {
        use super::*;
        pub static NOT_FOUND: ErrorKind = ErrorKind::child("NotFound", &STANDARD);
    }

    #[test]
    fn test_same_named_kind_from_elsewhere_does_not_match() {
        let policy = ExceptionPolicy::new().handle(&billing::NOT_FOUND, 404);
        let exception = Exception::new(&catalog::NOT_FOUND, "book 42");
        assert_eq!(policy.resolve(&exception), None);

        let policy = policy.handle(&catalog::NOT_FOUND, 410);
        assert_eq!(policy.len(), 2);
        assert_eq!(policy.resolve(&exception), Some(&Recovery::Status(410)));
    }

    #[test]
    fn test_most_specific_entry_wins() {
        let policy = ExceptionPolicy::new()
            .handle(&STANDARD, 500)
            .handle(&SPECIFIC, 404);
        let raised = Exception::new(&SPECIFIC, "missing");
        assert_eq!(policy.resolve(&raised), Some(&Recovery::Status(404)));
    }

    #[test]
    fn test_declaration_order_does_not_affect_specificity() {
        let policy = ExceptionPolicy::new()
            .handle(&SPECIFIC, 404)
            .handle(&STANDARD, 500);
        let raised = Exception::new(&DEEPER, "missing");
        assert_eq!(policy.resolve(&raised), Some(&Recovery::Status(404)));
    }

    #[test]
    fn test_parent_entry_matches_subkind() {
        let policy = ExceptionPolicy::new().handle(&STANDARD, 500);
        let raised = Exception::new(&DEEPER, "boom");
        assert_eq!(policy.resolve(&raised), Some(&Recovery::Status(500)));
    }

    #[test]
    fn test_no_match() {
        let policy = ExceptionPolicy::new().handle(&STANDARD, 500);
        assert_eq!(policy.resolve(&Exception::new(&UNRELATED, "x")), None);
        assert_eq!(policy.resolve(&Exception::new(&ERROR, "x")), None);
    }

    #[test]
    fn test_reregistering_replaces() {
        let policy = ExceptionPolicy::new()
            .handle(&STANDARD, 500)
            .handle(&STANDARD, "handle_standard");
        assert_eq!(policy.len(), 1);
        assert_eq!(
            policy.resolve(&Exception::new(&STANDARD, "x")),
            Some(&Recovery::Handler("handle_standard".to_string()))
        );
    }

    #[test]
    fn test_local_overrides_global() {
        let global = ExceptionPolicy::new()
            .handle(&ERROR, 500)
            .handle(&STANDARD, 422);
        let local = ExceptionPolicy::new().handle(&STANDARD, 400);
        let merged = global.merged(&local);
        assert_eq!(merged.len(), 2);
        assert_eq!(
            merged.resolve(&Exception::new(&SPECIFIC, "x")),
            Some(&Recovery::Status(400))
        );
        assert_eq!(global.resolve(&Exception::new(&SPECIFIC, "x")), Some(&Recovery::Status(422)));
    }
}
