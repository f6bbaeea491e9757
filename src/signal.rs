use core::cell::Cell;
use critical_section::Mutex;
use void::Void;

/// Why the receive task was woken.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Wake {
    /// Frames (or free-buffer pressure) are waiting in the receive ring.
    Receive,
    /// The DMA engine hit a fatal bus error of the given kind.
    Fatal(u8),
}

/// Single-slot wake-up from interrupt context to the receive task.
///
/// Any number of notifications before the task gets to run collapse into one
/// wake; the task always drains the ring until it is empty, so nothing is lost.
/// A fatal error stays latched until [`clear`](Self::clear) is called as part of
/// restarting the DMA engine.
pub struct Signal {
    pending: Mutex<Cell<bool>>,
    fatal: Mutex<Cell<Option<u8>>>,
}

impl Signal {
    pub const fn new() -> Self {
        Signal {
            pending: Mutex::new(Cell::new(false)),
            fatal: Mutex::new(Cell::new(None)),
        }
    }

    /// Wake the receive task. Safe to call from interrupt context.
    pub fn notify(&self) {
        critical_section::with(|cs| self.pending.borrow(cs).set(true));
    }

    /// Latch a fatal bus error and wake the receive task so it notices.
    pub fn raise_fatal(&self, kind: u8) {
        critical_section::with(|cs| {
            self.fatal.borrow(cs).set(Some(kind));
            self.pending.borrow(cs).set(true);
        });
    }

    pub fn is_pending(&self) -> bool {
        critical_section::with(|cs| self.pending.borrow(cs).get())
    }

    pub fn fatal(&self) -> Option<u8> {
        critical_section::with(|cs| self.fatal.borrow(cs).get())
    }

    /// Take the pending wake, if there is one. A latched fatal error is reported
    /// on every call.
    pub fn poll(&self) -> nb::Result<Wake, Void> {
        critical_section::with(|cs| {
            let pending = self.pending.borrow(cs).replace(false);
            if let Some(kind) = self.fatal.borrow(cs).get() {
                return Ok(Wake::Fatal(kind));
            }

            if pending {
                Ok(Wake::Receive)
            } else {
                Err(nb::Error::WouldBlock)
            }
        })
    }

    /// Forget any pending wake and the fatal latch.
    pub fn clear(&self) {
        critical_section::with(|cs| {
            self.pending.borrow(cs).set(false);
            self.fatal.borrow(cs).set(None);
        });
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}
