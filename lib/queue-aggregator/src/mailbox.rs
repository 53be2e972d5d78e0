//! The one concrete `MessageQueue` implementation the kernel ships: a
//! bounded, blocking-capable FIFO backed by a `Mutex` + `Condvar` pair. It
//! plays the role the original's FreeRTOS queue and test-harness deque both
//! play, unified into a single type usable from the host test harness and
//! from any standalone/simulated binary alike. A register-poking
//! FreeRTOS-backed queue implementing the same operations would be an
//! external collaborator; the kernel itself only ever talks to this
//! contract (`try_send`, `try_send_timeout`, `recv`, `try_recv_timeout`,
//! `has_message`).

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A bounded FIFO of up to `N` messages of type `M`.
///
/// Every mailbox used by a running module is declared as a `'static` value
/// and never moved or destroyed for the life of the program -- the
/// aggregator that routes to it only ever holds a `&'static` reference.
pub struct Mailbox<M, const N: usize> {
    queue: Mutex<VecDeque<M>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<M, const N: usize> Mailbox<M, N> {
    pub const fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Enqueues `msg` without blocking. Returns `false` (and drops nothing
    /// -- `msg` is simply handed back to the caller via the bool, the value
    /// itself is only consumed on success) if the mailbox is full.
    pub fn try_send(&self, msg: M) -> bool {
        let mut queue = self.queue.lock().unwrap();
        if queue.len() >= N {
            return false;
        }
        queue.push_back(msg);
        drop(queue);
        self.not_empty.notify_one();
        true
    }

    /// Enqueues `msg`, blocking for up to `timeout` for room to free up.
    pub fn try_send_timeout(&self, msg: M, timeout: Duration) -> bool {
        let mut queue = self.queue.lock().unwrap();
        let deadline = Instant::now() + timeout;
        while queue.len() >= N {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            let (guard, result) = self.not_full.wait_timeout(queue, remaining).unwrap();
            queue = guard;
            if result.timed_out() && queue.len() >= N {
                return false;
            }
        }
        queue.push_back(msg);
        drop(queue);
        self.not_empty.notify_one();
        true
    }

    /// Blocks until a message is available and returns it.
    pub fn recv(&self) -> M {
        let mut queue = self.queue.lock().unwrap();
        while queue.is_empty() {
            queue = self.not_empty.wait(queue).unwrap();
        }
        let msg = queue.pop_front().expect("queue was just checked non-empty");
        drop(queue);
        self.not_full.notify_one();
        msg
    }

    /// Blocks for up to `timeout` waiting for a message; `None` on timeout.
    /// Tasks that need to run a periodic controller loop use this and treat
    /// a `None` as their own self-addressed "wake up and do nothing" tick.
    pub fn try_recv_timeout(&self, timeout: Duration) -> Option<M> {
        let mut queue = self.queue.lock().unwrap();
        let deadline = Instant::now() + timeout;
        while queue.is_empty() {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (guard, result) = self.not_empty.wait_timeout(queue, remaining).unwrap();
            queue = guard;
            if result.timed_out() && queue.is_empty() {
                return None;
            }
        }
        let msg = queue.pop_front();
        drop(queue);
        self.not_full.notify_one();
        msg
    }

    /// Non-blocking peek at whether anything is waiting.
    pub fn has_message(&self) -> bool {
        !self.queue.lock().unwrap().is_empty()
    }
}

impl<M, const N: usize> Default for Mailbox<M, N> {
    fn default() -> Self {
        Self::new()
    }
}
