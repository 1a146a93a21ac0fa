//! Flash messages: a session-backed current/next double buffer.
//!
//! ```text
//!   request A            request B            request C
//!   flash.set(k, v) ───► flash.get(k) == v ──► flash.get(k) == None
//!        (next)             (current)
//! ```
//!
//! `set` writes to *next*, `get` reads *current*. At the end of every
//! request [`Flash::sweep`] replaces current with next, and the result is
//! stored in the session under [`FLASH_SESSION_KEY`] for the following
//! request.

use crate::session::Session;
use serde_json::{Map, Value};

/// Session key holding the flash between requests.
pub const FLASH_SESSION_KEY: &str = "_flash";

/// Flash store for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flash {
    current: Map<String, Value>,
    next: Map<String, Value>,
}

impl Flash {
    /// Empty flash.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the messages left by the previous request.
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        let current = match session.get(FLASH_SESSION_KEY) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        Self {
            current,
            next: Map::new(),
        }
    }

    /// Read a message set by the previous request (or via [`Flash::now`]).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.current.get(key)
    }

    /// Set a message for the next request.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.next.insert(key.into(), value.into());
    }

    /// Messages visible in this request only.
    pub fn now(&mut self) -> &mut Map<String, Value> {
        &mut self.current
    }

    /// Messages queued for the next request.
    #[must_use]
    pub const fn next(&self) -> &Map<String, Value> {
        &self.next
    }

    /// Carry current messages over to the next request. `None` keeps all.
    pub fn keep(&mut self, key: Option<&str>) {
        match key {
            Some(key) => {
                if let Some(value) = self.current.get(key) {
                    self.next.insert(key.to_string(), value.clone());
                }
            }
            None => {
                for (key, value) in &self.current {
                    self.next.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// Drop queued messages. `None` drops all.
    pub fn discard(&mut self, key: Option<&str>) {
        match key {
            Some(key) => {
                self.next.remove(key);
            }
            None => self.next.clear(),
        }
    }

    /// Rotate: next becomes current, next is cleared.
    pub fn sweep(&mut self) {
        self.current = std::mem::take(&mut self.next);
    }

    /// Whether there are no current messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Iterate over current messages.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.current.iter()
    }

    /// Store the current messages into the session for the next request.
    pub fn write_to(&self, session: &mut Session) {
        if self.current.is_empty() {
            session.remove(FLASH_SESSION_KEY);
        } else {
            session.insert(FLASH_SESSION_KEY, Value::Object(self.current.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // One request: load from session, run `body`, sweep, persist.
    fn request(session: &mut Session, body: impl FnOnce(&mut Flash)) -> Flash {
        let mut flash = Flash::from_session(session);
        body(&mut flash);
        let seen = flash.clone();
        flash.sweep();
        flash.write_to(session);
        seen
    }

    #[test]
    fn test_set_is_visible_on_next_request_only() {
        let mut session = Session::new();

        let a = request(&mut session, |flash| flash.set("notice", "hi"));
        assert_eq!(a.get("notice"), None);

        let b = request(&mut session, |_| {});
        assert_eq!(b.get("notice"), Some(&json!("hi")));

        let c = request(&mut session, |_| {});
        assert_eq!(c.get("notice"), None);
        assert!(!session.contains_key(FLASH_SESSION_KEY));
    }

    #[test]
    fn test_now_is_visible_immediately_and_not_persisted() {
        let mut session = Session::new();
        let a = request(&mut session, |flash| {
            flash.now().insert("alert".to_string(), json!("now"));
        });
        assert_eq!(a.get("alert"), Some(&json!("now")));
        let b = request(&mut session, |_| {});
        assert!(b.is_empty());
    }

    #[test]
    fn test_keep_single_key() {
        let mut session = Session::new();
        request(&mut session, |flash| {
            flash.set("a", 1);
            flash.set("b", 2);
        });
        request(&mut session, |flash| flash.keep(Some("a")));
        let c = request(&mut session, |_| {});
        assert_eq!(c.get("a"), Some(&json!(1)));
        assert_eq!(c.get("b"), None);
    }

    #[test]
    fn test_keep_all() {
        let mut session = Session::new();
        request(&mut session, |flash| {
            flash.set("a", 1);
            flash.set("b", 2);
        });
        request(&mut session, |flash| flash.keep(None));
        let c = request(&mut session, |_| {});
        assert_eq!(c.iter().count(), 2);
    }

    #[test]
    fn test_discard() {
        let mut flash = Flash::new();
        flash.set("a", 1);
        flash.set("b", 2);
        flash.discard(Some("a"));
        assert_eq!(flash.next().len(), 1);
        flash.discard(None);
        assert!(flash.next().is_empty());
    }

    #[test]
    fn test_ignores_malformed_session_entry() {
        let mut session = Session::new();
        session.insert(FLASH_SESSION_KEY, "not a map");
        assert!(Flash::from_session(&session).is_empty());
    }
}
