//! Compile-time-typed mailbox registry ("the aggregator").
//!
//! Each module hand-assembles its own aggregator struct -- one named field
//! per mailbox, mirroring how a hardware task table is normally laid out by
//! hand rather than generated from a template. This crate supplies the two
//! building blocks that make that hand-assembly sound:
//!
//! - [`mailbox::Mailbox`], the concrete bounded queue.
//! - [`QueueHandle`], a write-once (registered exactly once, checked at
//!   runtime) reference cell around a `&'static Mailbox`.
//!
//! "Tag-based" dispatch falls out for free: a field access like
//! `tasks.heater.try_send(msg)` *is* the compile-time route, resolved by
//! the same mechanism Rust resolves any other field. "Unique message type"
//! dispatch is modeled per module with a small `From`-based routed enum
//! (two conflicting `From<SamePayload>` impls are a compile error, which is
//! exactly the "ambiguous send is ill-formed" contract). Runtime
//! address-based dispatch is modeled per module as an exhaustive `match`
//! over the address and the routed enum, which the compiler checks for
//! completeness.
//!
//! See `DESIGN.md` for where each module's aggregator lives and how this
//! tradeoff is exercised.

pub mod mailbox;

pub use mailbox::Mailbox;

use std::sync::OnceLock;
use std::time::Duration;

/// A single slot in a hand-assembled aggregator: a reference to a
/// `'static` mailbox that can be registered exactly once.
///
/// Handles are non-owning and carry program lifetime, matching the
/// "constructed once at boot, never relocated" contract every kernel
/// object follows. Re-registering an already-registered handle is
/// rejected, surfacing boot-ordering bugs as a `false` return rather than
/// silently clobbering the previous registration.
pub struct QueueHandle<M, const N: usize> {
    mailbox: OnceLock<&'static Mailbox<M, N>>,
}

impl<M, const N: usize> QueueHandle<M, N> {
    pub const fn new() -> Self {
        Self {
            mailbox: OnceLock::new(),
        }
    }

    /// Registers `mailbox` as this handle's target. Returns `false` (and
    /// leaves the existing registration untouched) if already registered.
    pub fn register(&self, mailbox: &'static Mailbox<M, N>) -> bool {
        self.mailbox.set(mailbox).is_ok()
    }

    pub fn is_registered(&self) -> bool {
        self.mailbox.get().is_some()
    }

    /// Routes `msg` to the registered mailbox. Returns `false` if nothing
    /// has been registered yet, or if the mailbox itself is full.
    pub fn try_send(&self, msg: M) -> bool {
        match self.mailbox.get() {
            Some(mailbox) => mailbox.try_send(msg),
            None => false,
        }
    }

    pub fn try_send_timeout(&self, msg: M, timeout: Duration) -> bool {
        match self.mailbox.get() {
            Some(mailbox) => mailbox.try_send_timeout(msg, timeout),
            None => false,
        }
    }

    pub fn has_message(&self) -> bool {
        match self.mailbox.get() {
            Some(mailbox) => mailbox.has_message(),
            None => false,
        }
    }
}

impl<M, const N: usize> Default for QueueHandle<M, N> {
    fn default() -> Self {
        Self::new()
    }
}
