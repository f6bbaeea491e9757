use super::{DescriptorEntry, Owner, VolatileReadWrite};

enum Word0BitNumbers {
    ErrorSummary = 15,
    SecondAddressChained = 20,
    EndOfRing = 21,
    FirstSegment = 28,
    LastSegment = 29,
    InterruptOnComplete = 30,
    Own = 31,
}

const BUFFER1_SIZE_MASK: u32 = 0x0000_1FFF;

#[repr(C, align(4))]
#[derive(Clone, Copy, Default)]
pub struct TxDescriptor {
    // NOTE: Only read or write these fields using volatile operations
    word0: u32, // control and status
    word1: u32, // buffer sizes
    word2: u32, // buffer 1 address
    word3: u32, // next descriptor address
}

impl TxDescriptor {
    pub const fn const_default() -> Self {
        TxDescriptor {
            word0: 0,
            word1: 0,
            word2: 0,
            word3: 0,
        }
    }

    pub fn read(&self) -> TxDescriptorReader {
        TxDescriptorReader(
            self.word0.read_volatile(),
            self.word1.read_volatile(),
            self.word2.read_volatile(),
            self.word3.read_volatile(),
        )
    }

    pub fn modify<F: FnOnce(TxDescriptorWriter) -> TxDescriptorWriter>(&mut self, f: F) {
        let w = TxDescriptorWriter(self.word0.read_volatile(), self.word1.read_volatile());
        let result = f(w);

        // Word 0 holds the OWN bit, so it is committed after the size.
        self.word1.write_volatile(result.1);
        self.word0.write_volatile(result.0);
    }
}

impl DescriptorEntry for TxDescriptor {
    const EMPTY: Self = TxDescriptor::const_default();
    const INITIAL_OWNER: Owner = Owner::Cpu;

    fn initialize(&mut self, buffer: *const u8, _buffer_size: usize, next: *const Self, end_of_ring: bool) {
        self.word2.write_volatile(buffer as usize as u32);
        self.word3.write_volatile(next as usize as u32);
        self.word1.write_volatile(0);

        // The ring is chained through word 3; end-of-ring on the last entry makes
        // the DMA engine wrap even when it ignores the chain pointer.
        let mut word0 = 1 << Word0BitNumbers::SecondAddressChained as u32;
        if end_of_ring {
            word0 |= 1 << Word0BitNumbers::EndOfRing as u32;
        }
        self.word0.write_volatile(word0);
    }

    fn owner(&self) -> Owner {
        self.read().owner()
    }

    fn set_owner(&mut self, owner: Owner) {
        self.modify(|w| w.set_owner(owner))
    }
}

pub struct TxDescriptorReader(u32, u32, u32, u32);
impl TxDescriptorReader {
    pub fn owner(&self) -> Owner {
        if self.0 & (1 << Word0BitNumbers::Own as u32) != 0 {
            Owner::Dma
        } else {
            Owner::Cpu
        }
    }

    pub fn is_first_segment(&self) -> bool {
        self.0 & (1 << Word0BitNumbers::FirstSegment as u32) != 0
    }

    pub fn is_last_segment(&self) -> bool {
        self.0 & (1 << Word0BitNumbers::LastSegment as u32) != 0
    }

    pub fn interrupt_on_complete(&self) -> bool {
        self.0 & (1 << Word0BitNumbers::InterruptOnComplete as u32) != 0
    }

    pub fn is_end_of_ring(&self) -> bool {
        self.0 & (1 << Word0BitNumbers::EndOfRing as u32) != 0
    }

    /// Set by the DMA engine when the frame this descriptor belonged to failed.
    pub fn has_error(&self) -> bool {
        self.0 & (1 << Word0BitNumbers::ErrorSummary as u32) != 0
    }

    pub fn payload_len(&self) -> usize {
        (self.1 & BUFFER1_SIZE_MASK) as usize
    }

    pub fn buffer_address(&self) -> u32 {
        self.2
    }

    pub fn next_address(&self) -> u32 {
        self.3
    }
}

pub struct TxDescriptorWriter(u32, u32);
impl TxDescriptorWriter {
    pub fn set_owner(self, owner: Owner) -> Self {
        let own = 1 << Word0BitNumbers::Own as u32;
        match owner {
            Owner::Dma => TxDescriptorWriter(self.0 | own, self.1),
            Owner::Cpu => TxDescriptorWriter(self.0 & !own, self.1),
        }
    }

    /// Mark the segment position of this buffer within its frame. The
    /// interrupt-on-complete request follows the last segment.
    pub fn set_segment(self, first: bool, last: bool) -> Self {
        let first_bit = 1 << Word0BitNumbers::FirstSegment as u32;
        let last_bits = (1 << Word0BitNumbers::LastSegment as u32)
            | (1 << Word0BitNumbers::InterruptOnComplete as u32);

        let mut word0 = self.0 & !(first_bit | last_bits);
        if first {
            word0 |= first_bit;
        }
        if last {
            word0 |= last_bits;
        }
        TxDescriptorWriter(word0, self.1)
    }

    pub fn clear_error(self) -> Self {
        TxDescriptorWriter(self.0 & !(1 << Word0BitNumbers::ErrorSummary as u32), self.1)
    }

    pub fn set_payload_len(self, byte_length: usize) -> Self {
        TxDescriptorWriter(
            self.0,
            (self.1 & !BUFFER1_SIZE_MASK) | (byte_length as u32 & BUFFER1_SIZE_MASK),
        )
    }

    #[cfg(test)]
    pub(crate) fn set_error(self) -> Self {
        TxDescriptorWriter(self.0 | (1 << Word0BitNumbers::ErrorSummary as u32), self.1)
    }
}
