use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::bus::{BusInner, Handler};

/// One or more change types a handler listens to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeTypes(pub(crate) Vec<String>);

impl ChangeTypes {
    fn normalized(mut types: Vec<String>) -> Self {
        types.sort();
        types.dedup();
        Self(types)
    }
}

impl From<&str> for ChangeTypes {
    fn from(t: &str) -> Self {
        Self(vec![t.to_owned()])
    }
}

impl From<String> for ChangeTypes {
    fn from(t: String) -> Self {
        Self(vec![t])
    }
}

impl From<Vec<String>> for ChangeTypes {
    fn from(types: Vec<String>) -> Self {
        Self::normalized(types)
    }
}

impl From<&[&str]> for ChangeTypes {
    fn from(types: &[&str]) -> Self {
        Self::normalized(types.iter().map(|t| (*t).to_owned()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ChangeTypes {
    fn from(types: [&str; N]) -> Self {
        Self::normalized(types.iter().map(|t| (*t).to_owned()).collect())
    }
}

/// A registered handler.
pub(crate) struct Entry {
    pub(crate) id: u64,
    pub(crate) active: AtomicBool,
    pub(crate) handler: Handler,
}

impl Entry {
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Handle returned by [`EventBus::subscribe`](crate::EventBus::subscribe) and
/// [`EventBus::subscribe_all`](crate::EventBus::subscribe_all).
///
/// Dropping the handle does *not* unsubscribe; call [`Subscription::unsubscribe`].
/// Unsubscribing is idempotent and may happen from inside a handler. It is
/// safe to call concurrently with an emit on another thread: that emit skips
/// the handler if it has not reached it yet, but one that already passed the
/// activity check may still deliver a single call. Every emit that starts
/// after `unsubscribe` returns skips the handler.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    pub(crate) entry: Arc<Entry>,
    pub(crate) types: Option<ChangeTypes>,
    pub(crate) bus: Weak<BusInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.entry.id
    }

    pub fn is_active(&self) -> bool {
        self.entry.is_active()
    }

    /// Remove the handler from the bus. Returns `true` on the first call only.
    pub fn unsubscribe(&self) -> bool {
        if !self.entry.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.entry.id, self.types.as_ref());
        }
        tracing::debug!(subscription = self.entry.id, "unsubscribed from event bus");
        true
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.entry.id)
            .field("types", &self.types)
            .field("active", &self.is_active())
            .finish()
    }
}
