/// Volatile access to the DesignWare descriptor words (TDES0-3, RDES0-3).
///
/// The DMA engine writes status back into these words behind the compiler's
/// back: it clears OWN when it hands a descriptor over, and on receive it fills
/// in the frame length, the first/last segment flags and the error summary. A
/// plain load could be hoisted out of the polling loops in the rings or served
/// from a stale register, so every descriptor word is read and written through
/// here. `RxDescriptor::modify` rewrites RDES0 with `modify_volatile`; the
/// transmit side commits its two words separately so OWN lands last.
pub trait VolatileReadWrite {
    fn read_volatile(&self) -> u32;
    fn write_volatile(&mut self, new_value: u32);

    fn modify_volatile<F: FnOnce(u32) -> u32>(&mut self, f: F) {
        let value = self.read_volatile();
        self.write_volatile(f(value));
    }
}

impl VolatileReadWrite for u32 {
    fn read_volatile(&self) -> u32 {
        unsafe { core::ptr::read_volatile(self) }
    }

    fn write_volatile(&mut self, new_value: u32) {
        unsafe {
            core::ptr::write_volatile(self, new_value);
        }
    }
}
