//! # tidemark-bus
//!
//! In-process publish/subscribe distribution of [`ChangeEvent`]s with a
//! bounded, newest-first history.
//!
//! The bus is an ordinary value. The host constructs one per process (usually
//! behind an `Arc`) and hands it to every producer and feed; nothing here is
//! global. Dispatch is synchronous: [`EventBus::emit`] returns after every
//! matching handler has run.

mod bus;
mod subscription;

pub use bus::{EventBus, Handler};
pub use subscription::{ChangeTypes, Subscription};
pub use tidemark_core::ChangeEvent;
