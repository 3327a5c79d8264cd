//! Resolver hooks: the interception surface of the resolution engine.
//!
//! Hooks observe one resolve call from `begin` to `end` and may shrink the
//! candidate sets the engine works with. They can veto resources, matches
//! and singleton collisions, but they can never add candidates: every
//! collection handed to a hook is a [`Shrinkable`] remove-only view.

mod resolver_hook;
mod session;

use thiserror::Error;

pub use resolver_hook::{HookContext, ResolverHook, ResolverHookSource};
pub(crate) use session::HookSession;

// ---------------------------------------------------------------------------
// HookError
// ---------------------------------------------------------------------------

/// A failure signalled by a resolver hook.
///
/// Any hook method other than `end` may fail; the failure aborts the resolve
/// after every started hook has been unwound.
#[derive(Debug, Clone, Error)]
#[error("resolver hook '{hook}' failed: {message}")]
pub struct HookError {
    /// Name of the failing hook.
    pub hook: String,
    /// What went wrong, in the hook's words.
    pub message: String,
}

impl HookError {
    pub fn new(hook: impl Into<String>, message: impl Into<String>) -> HookError {
        HookError {
            hook: hook.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Shrinkable
// ---------------------------------------------------------------------------

/// Remove-only view of a candidate collection.
///
/// Hooks inspect and shrink these; insertion is deliberately impossible.
/// Order is preserved, so a hook that removes nothing leaves the engine's
/// preference order untouched.
#[derive(Debug)]
pub struct Shrinkable<'a, T> {
    items: &'a mut Vec<T>,
}

impl<'a, T> Shrinkable<'a, T> {
    pub(crate) fn new(items: &'a mut Vec<T>) -> Shrinkable<'a, T> {
        Shrinkable { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Remove and return the element at `index`, shifting the rest.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    /// Keep only the elements `keep` accepts.
    pub fn retain(&mut self, keep: impl FnMut(&T) -> bool) {
        self.items.retain(keep);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
