//! DMA register context
//!
//! Every ring operation takes the registers as an explicit argument instead of
//! reaching for a global peripheral handle. [`Mmio`] talks to real hardware;
//! tests substitute a simulated backend.

use core::ptr;
use paste::paste;

/// The part of the MAC's DMA register block the descriptor rings need.
pub trait Registers {
    /// Raw value of the DMA status register.
    fn read_status(&self) -> u32;

    /// Clear the given status bits (they are write-1-to-clear).
    fn clear_status(&self, bits: u32);

    /// Doorbell: tell the transmit DMA to re-read the current descriptor.
    fn transmit_poll_demand(&self);

    /// Doorbell: tell the receive DMA that descriptors were handed back.
    fn receive_poll_demand(&self);

    fn set_transmit_descriptor_list(&self, address: u32);
    fn set_receive_descriptor_list(&self, address: u32);
    fn set_interrupt_enable(&self, mask: u32);

    fn enable_transmit(&self);
    fn disable_transmit(&self);
    fn enable_receive(&self);
    fn disable_receive(&self);

    /// Reset the DMA engine and wait for the hardware to finish. Every DMA
    /// register, descriptor lists and interrupt mask included, returns to its
    /// reset value. The only way out of a fatal bus error.
    fn software_reset(&self);
}

/// Make descriptor and buffer writes visible to the DMA engine before the next
/// ownership flip or doorbell.
#[inline(always)]
pub(crate) fn barrier() {
    #[cfg(all(target_arch = "arm", target_os = "none"))]
    cortex_m::asm::dsb();

    #[cfg(not(all(target_arch = "arm", target_os = "none")))]
    core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
}

/// Decoded DMA status register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(u32);

macro_rules! define_status_bits {
    (
        $($name:ident = $bit:expr,)+
    ) => {
        paste! {
            /// DMA status register bits.
            pub mod status {
                $(
                    pub const [<$name:upper>]: u32 = 1 << $bit;
                )+

                /// Every write-1-to-clear condition bit.
                pub const ALL: u32 = 0 $(| [<$name:upper>])+;
            }

            impl Status {
                $(
                    pub fn $name(&self) -> bool {
                        self.0 & status::[<$name:upper>] != 0
                    }
                )+
            }
        }
    };
}

define_status_bits! {
    tx_complete = 0,
    tx_stopped = 1,
    tx_buffer_unavailable = 2,
    tx_jabber_timeout = 3,
    rx_overflow = 4,
    tx_underflow = 5,
    rx_complete = 6,
    rx_buffer_unavailable = 7,
    rx_stopped = 8,
    rx_watchdog_timeout = 9,
    tx_early = 10,
    fatal_bus_error = 13,
    rx_early = 14,
    abnormal_summary = 15,
    normal_summary = 16,
}

const BUS_ERROR_SHIFT: u32 = 23;
const BUS_ERROR_MASK: u32 = 0x7;

impl Status {
    pub const fn new(bits: u32) -> Self {
        Status(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Asserted condition bits, without the read-only process state fields.
    pub fn pending(&self) -> u32 {
        self.0 & status::ALL
    }

    /// Kind of bus access that failed, valid while `fatal_bus_error` is set.
    pub fn bus_error_kind(&self) -> u8 {
        ((self.0 >> BUS_ERROR_SHIFT) & BUS_ERROR_MASK) as u8
    }
}

// Register offsets from the DMA block base
const BUS_MODE: usize = 0x00;
const TRANSMIT_POLL_DEMAND: usize = 0x04;
const RECEIVE_POLL_DEMAND: usize = 0x08;
const RECEIVE_DESCRIPTOR_LIST: usize = 0x0C;
const TRANSMIT_DESCRIPTOR_LIST: usize = 0x10;
const STATUS: usize = 0x14;
const OPERATION_MODE: usize = 0x18;
const INTERRUPT_ENABLE: usize = 0x1C;

// Operation mode bits
const START_RECEIVE: u32 = 1 << 1;
const START_TRANSMIT: u32 = 1 << 13;

// Bus mode bits
const SOFTWARE_RESET: u32 = 1 << 0;

/// Memory-mapped DMA register block.
pub struct Mmio {
    base: usize,
}

// Each access is a single aligned volatile word access; the hardware takes care
// of concurrent readers and writers.
unsafe impl Sync for Mmio {}

impl Mmio {
    /// # Safety
    ///
    /// `base` must be the address of the MAC's DMA register block, and nothing
    /// else may drive the rings this block is pointed at.
    pub const unsafe fn new(base: usize) -> Self {
        Mmio { base }
    }

    fn read(&self, offset: usize) -> u32 {
        unsafe { ptr::read_volatile((self.base + offset) as *const u32) }
    }

    fn write(&self, offset: usize, value: u32) {
        unsafe { ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }

    fn modify<F: FnOnce(u32) -> u32>(&self, offset: usize, f: F) {
        self.write(offset, f(self.read(offset)));
    }
}

impl Registers for Mmio {
    fn read_status(&self) -> u32 {
        self.read(STATUS)
    }

    fn clear_status(&self, bits: u32) {
        self.write(STATUS, bits & status::ALL);
    }

    fn transmit_poll_demand(&self) {
        // Any value works, the write itself is the demand.
        self.write(TRANSMIT_POLL_DEMAND, 0);
    }

    fn receive_poll_demand(&self) {
        self.write(RECEIVE_POLL_DEMAND, 0);
    }

    fn set_transmit_descriptor_list(&self, address: u32) {
        self.write(TRANSMIT_DESCRIPTOR_LIST, address);
    }

    fn set_receive_descriptor_list(&self, address: u32) {
        self.write(RECEIVE_DESCRIPTOR_LIST, address);
    }

    fn set_interrupt_enable(&self, mask: u32) {
        self.write(INTERRUPT_ENABLE, mask);
    }

    fn enable_transmit(&self) {
        self.modify(OPERATION_MODE, |v| v | START_TRANSMIT);
    }

    fn disable_transmit(&self) {
        self.modify(OPERATION_MODE, |v| v & !START_TRANSMIT);
    }

    fn enable_receive(&self) {
        self.modify(OPERATION_MODE, |v| v | START_RECEIVE);
    }

    fn disable_receive(&self) {
        self.modify(OPERATION_MODE, |v| v & !START_RECEIVE);
    }

    fn software_reset(&self) {
        self.modify(BUS_MODE, |v| v | SOFTWARE_RESET);
        // Self-clearing once the DMA has stopped and every register is reset.
        while self.read(BUS_MODE) & SOFTWARE_RESET != 0 {}
    }
}
