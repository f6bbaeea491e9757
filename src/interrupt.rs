use crate::registers::{status, Registers, Status};
use crate::signal::Signal;
use core::cell::Cell;
use critical_section::Mutex;

/// Short, non-blocking reactions to DMA interrupt conditions.
///
/// Every method runs in interrupt context and must not copy frames or wait on
/// anything. Unimplemented hooks do nothing.
pub trait InterruptHooks {
    fn on_tx_complete(&self) {}
    fn on_tx_buffer_unavailable(&self) {}
    fn on_rx_complete(&self) {}
    fn on_rx_early(&self) {}
    fn on_rx_buffer_unavailable(&self) {}
    fn on_fatal_error(&self, _kind: u8) {}
}

// Conditions with a hook of their own.
const HANDLED: u32 = status::TX_COMPLETE
    | status::TX_BUFFER_UNAVAILABLE
    | status::RX_COMPLETE
    | status::RX_EARLY
    | status::RX_BUFFER_UNAVAILABLE
    | status::FATAL_BUS_ERROR;

const SUMMARY: u32 = status::NORMAL_SUMMARY | status::ABNORMAL_SUMMARY;

/// Demultiplexes the DMA status word into [`InterruptHooks`] calls.
///
/// Call [`on_interrupt`](Self::on_interrupt) from the MAC interrupt handler. The
/// bridge can live in a `static`: it only holds the hooks and an event counter.
pub struct InterruptBridge<H> {
    hooks: H,
    unclassified: Mutex<Cell<u32>>,
}

impl<H: InterruptHooks> InterruptBridge<H> {
    pub const fn new(hooks: H) -> Self {
        InterruptBridge {
            hooks,
            unclassified: Mutex::new(Cell::new(0)),
        }
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Number of asserted status bits that had no hook.
    pub fn unclassified_events(&self) -> u32 {
        critical_section::with(|cs| self.unclassified.borrow(cs).get())
    }

    /// Read the status register once, run the hook of every asserted condition
    /// and clear exactly the bits that were seen.
    pub fn on_interrupt<R: Registers>(&self, regs: &R) -> Status {
        let word = Status::new(regs.read_status());

        macro_rules! dispatch {
            ($asserted:ident, $bit:expr, $hook:ident) => {
                if word.$asserted() {
                    self.hooks.$hook();
                    regs.clear_status($bit);
                }
            };
        }

        dispatch!(tx_complete, status::TX_COMPLETE, on_tx_complete);
        dispatch!(tx_buffer_unavailable, status::TX_BUFFER_UNAVAILABLE, on_tx_buffer_unavailable);
        dispatch!(rx_complete, status::RX_COMPLETE, on_rx_complete);
        dispatch!(rx_early, status::RX_EARLY, on_rx_early);
        dispatch!(rx_buffer_unavailable, status::RX_BUFFER_UNAVAILABLE, on_rx_buffer_unavailable);

        if word.fatal_bus_error() {
            let kind = word.bus_error_kind();
            error!("DMA fatal bus error, kind {}", kind);
            self.hooks.on_fatal_error(kind);
            regs.clear_status(status::FATAL_BUS_ERROR);
        }

        // Still cleared when nobody handles them, otherwise the line stays
        // asserted and the handler is re-entered forever.
        let unclassified = word.pending() & !(HANDLED | SUMMARY);
        if unclassified != 0 {
            warn!("unhandled DMA status bits {=u32:#x}", unclassified);
            critical_section::with(|cs| {
                let counter = self.unclassified.borrow(cs);
                counter.set(counter.get().wrapping_add(unclassified.count_ones()));
            });
            regs.clear_status(unclassified);
        }

        let summary = word.pending() & SUMMARY;
        if summary != 0 {
            regs.clear_status(summary);
        }

        word
    }
}

/// Hooks that wake the receive task.
///
/// Receive-complete and receive-buffer-unavailable both mean "look at the ring
/// again", so they resolve to the same notification. A fatal bus error is
/// latched in the signal for the driver to act on.
pub struct WakeConsumer<'s> {
    signal: &'s Signal,
}

impl<'s> WakeConsumer<'s> {
    pub const fn new(signal: &'s Signal) -> Self {
        WakeConsumer { signal }
    }
}

impl<'s> InterruptHooks for WakeConsumer<'s> {
    fn on_rx_complete(&self) {
        self.signal.notify();
    }

    fn on_rx_buffer_unavailable(&self) {
        trace!("receive ring full");
        self.signal.notify();
    }

    fn on_fatal_error(&self, kind: u8) {
        self.signal.raise_fatal(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimRegisters;
    use crate::Wake;

    #[derive(Default)]
    struct Recorder {
        tx_complete: Cell<u32>,
        tx_unavailable: Cell<u32>,
        rx_complete: Cell<u32>,
        rx_early: Cell<u32>,
        rx_unavailable: Cell<u32>,
        fatal: Cell<Option<u8>>,
    }

    impl InterruptHooks for Recorder {
        fn on_tx_complete(&self) {
            self.tx_complete.set(self.tx_complete.get() + 1);
        }

        fn on_tx_buffer_unavailable(&self) {
            self.tx_unavailable.set(self.tx_unavailable.get() + 1);
        }

        fn on_rx_complete(&self) {
            self.rx_complete.set(self.rx_complete.get() + 1);
        }

        fn on_rx_early(&self) {
            self.rx_early.set(self.rx_early.get() + 1);
        }

        fn on_rx_buffer_unavailable(&self) {
            self.rx_unavailable.set(self.rx_unavailable.get() + 1);
        }

        fn on_fatal_error(&self, kind: u8) {
            self.fatal.set(Some(kind));
        }
    }

    #[test]
    fn every_asserted_condition_runs_its_hook_once() {
        let regs = SimRegisters::new();
        regs.raise(
            status::TX_COMPLETE
                | status::TX_BUFFER_UNAVAILABLE
                | status::RX_COMPLETE
                | status::RX_EARLY
                | status::RX_BUFFER_UNAVAILABLE
                | status::NORMAL_SUMMARY
                | status::ABNORMAL_SUMMARY,
        );

        let bridge = InterruptBridge::new(Recorder::default());
        bridge.on_interrupt(&regs);

        let hooks = bridge.hooks();
        assert_eq!(hooks.tx_complete.get(), 1);
        assert_eq!(hooks.tx_unavailable.get(), 1);
        assert_eq!(hooks.rx_complete.get(), 1);
        assert_eq!(hooks.rx_early.get(), 1);
        assert_eq!(hooks.rx_unavailable.get(), 1);
        assert_eq!(hooks.fatal.get(), None);
        assert_eq!(regs.read_status() & status::ALL, 0);
        assert_eq!(bridge.unclassified_events(), 0);
    }

    #[test]
    fn clears_only_the_bits_it_saw() {
        let regs = SimRegisters::new();
        regs.raise(status::RX_COMPLETE);

        let bridge = InterruptBridge::new(Recorder::default());
        bridge.on_interrupt(&regs);

        assert_eq!(regs.cleared(), [status::RX_COMPLETE]);
    }

    #[test]
    fn unclassified_bits_are_counted_and_cleared() {
        let regs = SimRegisters::new();
        regs.raise(status::RX_OVERFLOW | status::TX_UNDERFLOW | status::ABNORMAL_SUMMARY);

        let bridge = InterruptBridge::new(Recorder::default());
        bridge.on_interrupt(&regs);

        assert_eq!(bridge.unclassified_events(), 2);
        assert_eq!(regs.read_status() & status::ALL, 0);
    }

    #[test]
    fn fatal_bus_error_reports_its_kind() {
        let regs = SimRegisters::new();
        regs.raise(status::FATAL_BUS_ERROR | (0b110 << 23));

        let bridge = InterruptBridge::new(Recorder::default());
        bridge.on_interrupt(&regs);

        assert_eq!(bridge.hooks().fatal.get(), Some(0b110));
        assert_eq!(regs.read_status() & status::FATAL_BUS_ERROR, 0);
    }

    #[test]
    fn receive_conditions_wake_the_consumer() {
        let signal = Signal::new();
        let bridge = InterruptBridge::new(WakeConsumer::new(&signal));
        let regs = SimRegisters::new();

        regs.raise(status::RX_BUFFER_UNAVAILABLE);
        bridge.on_interrupt(&regs);
        assert_eq!(signal.poll(), Ok(Wake::Receive));

        regs.raise(status::RX_COMPLETE);
        bridge.on_interrupt(&regs);
        regs.raise(status::RX_COMPLETE);
        bridge.on_interrupt(&regs);
        assert_eq!(signal.poll(), Ok(Wake::Receive));
        assert_eq!(signal.poll(), Err(nb::Error::WouldBlock));

        regs.raise(status::TX_COMPLETE);
        bridge.on_interrupt(&regs);
        assert_eq!(signal.poll(), Err(nb::Error::WouldBlock));
    }

    #[test]
    fn fatal_error_is_latched_in_the_signal() {
        let signal = Signal::new();
        let bridge = InterruptBridge::new(WakeConsumer::new(&signal));
        let regs = SimRegisters::new();

        regs.raise(status::FATAL_BUS_ERROR);
        bridge.on_interrupt(&regs);
        assert_eq!(signal.poll(), Ok(Wake::Fatal(0)));
        assert_eq!(signal.fatal(), Some(0));
    }
}
