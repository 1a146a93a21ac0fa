//! Before/after callback chains.
//!
//! A chain is built once per action type and shared read-only by every
//! request. Entries are either *named methods* of the action or *inline*
//! closures; either kind may carry a `when` guard that skips it for
//! requests it does not apply to.
//!
//! ```
//! use composable_action_core::callbacks::{Callback, CallbackChain};
//! use composable_action_core::halt::{halt, Outcome};
//! use composable_action_core::request::Request;
//! use composable_action_core::response::Response;
//!
//! struct Show;
//!
//! impl Show {
//!     fn authenticate(&self, request: &Request, _res: &mut Response) -> Outcome {
//!         if request.params().get("token").is_none() {
//!             return halt(401);
//!         }
//!         Ok(())
//!     }
//!
//!     fn log(&self) -> Outcome {
//!         Ok(())
//!     }
//! }
//!
//! let mut chain = CallbackChain::<Show>::new();
//! chain.append(Callback::method("authenticate", Show::authenticate));
//! chain.append(Callback::method("log", Show::log));
//! chain.prepend(Callback::inline(|_req, res| {
//!     res.expose("seen", true);
//!     Ok(())
//! }));
//! assert_eq!(chain.len(), 3);
//! ```

use crate::halt::Outcome;
use crate::request::Request;
use crate::response::Response;
use std::fmt;
use std::sync::Arc;

type Invoke<A> = dyn Fn(&A, &Request, &mut Response) -> Outcome + Send + Sync;
type Guard = dyn Fn(&Request) -> bool + Send + Sync;

/// Marker for methods taking only the action.
#[derive(Debug)]
pub struct Bare;

/// Marker for methods taking the action, request and response.
#[derive(Debug)]
pub struct WithContext;

/// Action methods usable as callbacks.
///
/// Implemented for `fn(&A) -> Outcome` and
/// `fn(&A, &Request, &mut Response) -> Outcome` shaped functions, so a
/// method can be registered by path regardless of which form it takes.
pub trait IntoMethod<A, Marker>: Send + Sync + 'static {
    /// Erase into the full callback signature.
    fn into_invoke(self) -> Arc<Invoke<A>>;
}

impl<A: 'static, F> IntoMethod<A, Bare> for F
where
    F: Fn(&A) -> Outcome + Send + Sync + 'static,
{
    fn into_invoke(self) -> Arc<Invoke<A>> {
        Arc::new(move |action: &A, _: &Request, _: &mut Response| self(action))
    }
}

impl<A: 'static, F> IntoMethod<A, WithContext> for F
where
    F: Fn(&A, &Request, &mut Response) -> Outcome + Send + Sync + 'static,
{
    fn into_invoke(self) -> Arc<Invoke<A>> {
        Arc::new(self)
    }
}

/// One chain entry.
pub struct Callback<A> {
    name: Option<String>,
    invoke: Arc<Invoke<A>>,
    guard: Option<Arc<Guard>>,
}

impl<A: 'static> Callback<A> {
    /// Named action method. Names are unique within a chain.
    pub fn method<M>(name: impl Into<String>, method: impl IntoMethod<A, M>) -> Self {
        Self {
            name: Some(name.into()),
            invoke: method.into_invoke(),
            guard: None,
        }
    }

    /// Anonymous closure over the request and response.
    pub fn inline<F>(f: F) -> Self
    where
        F: Fn(&Request, &mut Response) -> Outcome + Send + Sync + 'static,
    {
        Self {
            name: None,
            invoke: Arc::new(move |_: &A, request: &Request, response: &mut Response| {
                f(request, response)
            }),
            guard: None,
        }
    }
}

impl<A> Callback<A> {
    /// Give the callback a name, making it unique within a chain.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Only run when `guard` holds for the request.
    #[must_use]
    pub fn when<G>(mut self, guard: G) -> Self
    where
        G: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Arc::new(guard));
        self
    }

    /// Registration name, `None` for inline callbacks.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Run the callback unless its guard rejects the request.
    ///
    /// # Errors
    ///
    /// Propagates the callback's halt or raised exception.
    pub fn run(&self, action: &A, request: &Request, response: &mut Response) -> Outcome {
        if let Some(guard) = &self.guard {
            if !guard(request) {
                tracing::trace!(callback = self.label(), "Callback skipped by guard");
                return Ok(());
            }
        }
        (self.invoke)(action, request, response)
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<inline>")
    }
}

impl<A> Clone for Callback<A> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            invoke: Arc::clone(&self.invoke),
            guard: self.guard.clone(),
        }
    }
}

impl<A> fmt::Debug for Callback<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("name", &self.label())
            .field("conditional", &self.guard.is_some())
            .finish()
    }
}

/// Ordered callbacks for one stage.
pub struct CallbackChain<A> {
    entries: Vec<Callback<A>>,
}

impl<A> CallbackChain<A> {
    /// Empty chain.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add to the end. A named callback already in the chain keeps its
    /// position and takes the new definition.
    pub fn append(&mut self, callback: Callback<A>) {
        if let Some(existing) = self.position(&callback) {
            self.entries[existing] = callback;
        } else {
            self.entries.push(callback);
        }
    }

    /// Add to the front. A named callback already in the chain moves there.
    pub fn prepend(&mut self, callback: Callback<A>) {
        if let Some(existing) = self.position(&callback) {
            self.entries.remove(existing);
        }
        self.entries.insert(0, callback);
    }

    /// Remove the named callback, returning whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|callback| callback.name() != Some(name));
        self.entries.len() != before
    }

    /// Run every entry in order, stopping at the first halt or exception.
    ///
    /// # Errors
    ///
    /// Propagates the first entry's halt or raised exception.
    pub fn run(&self, action: &A, request: &Request, response: &mut Response) -> Outcome {
        for callback in &self.entries {
            tracing::trace!(callback = callback.label(), "Running callback");
            callback.run(action, request, response)?;
        }
        Ok(())
    }

    /// Registered names in order, skipping inline entries.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(Callback::name)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, callback: &Callback<A>) -> Option<usize> {
        let name = callback.name()?;
        self.entries.iter().position(|entry| entry.name() == Some(name))
    }
}

impl<A> Default for CallbackChain<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for CallbackChain<A> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<A> fmt::Debug for CallbackChain<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.entries).finish()
    }
}
