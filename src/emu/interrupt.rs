//! Cross-thread interrupt delivery into the core.
//!
//! A single slot holds the keycode of the next interrupt. Any thread can fill it through an
//! [`InterruptGate`]; only the debugger that owns the core drains it through the matching
//! [`InterruptLatch`]. A new request that arrives before the previous one was consumed replaces it.

use std::sync::Arc;

use tokio::sync::watch::{channel, Receiver, Sender};

/// The producer side. Cheap to clone and safe to share between threads.
#[derive(Debug, Clone)]
pub struct InterruptGate {
    slot: Arc<Sender<u8>>,
}

/// The consumer side, owned by the thread that steps the core.
///
/// Holds its own handle on the sender, so a request scheduled just before the last gate is
/// dropped is still delivered.
#[derive(Debug)]
pub struct InterruptLatch {
    slot: Receiver<u8>,
    _keepalive: Arc<Sender<u8>>,
}

impl InterruptGate {
    /// Creates an empty slot, returning both of its ends.
    pub fn new() -> (Self, InterruptLatch) {
        let (tx, rx) = channel(0u8);
        let tx = Arc::new(tx);
        (
            Self { slot: tx.clone() },
            InterruptLatch {
                slot: rx,
                _keepalive: tx,
            },
        )
    }

    /// Schedules an interrupt carrying `keycode` for the next step of the core.
    ///
    /// Never blocks on the core. Overwrites any request that has not been consumed yet.
    pub fn schedule(&self, keycode: u8) {
        let previous = self.slot.send_replace(keycode);
        log::trace!("interrupt scheduled (keycode {:#04x}, replaced {:#04x})", keycode, previous);
    }
}

impl InterruptLatch {
    /// Returns `true` if a request is waiting to be taken.
    pub fn is_pending(&self) -> bool {
        self.slot.has_changed().unwrap_or(false)
    }

    /// Takes the pending request, if any. Each request is returned at most once.
    pub fn take(&mut self) -> Option<u8> {
        if self.is_pending() {
            Some(*self.slot.borrow_and_update())
        } else {
            None
        }
    }
}
