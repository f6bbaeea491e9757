use super::{DescriptorEntry, Owner, VolatileReadWrite};

enum Word0BitNumbers {
    LastDescriptor = 8,
    FirstDescriptor = 9,
    ErrorSummary = 15,
    FrameLength = 16,
    Own = 31,
}

enum Word1BitNumbers {
    SecondAddressChained = 14,
    EndOfRing = 15,
}

const FRAME_LENGTH_MASK: u32 = 0x3FFF;
const BUFFER1_SIZE_MASK: u32 = 0x0000_1FFF;

#[repr(C, align(4))]
#[derive(Clone, Copy, Default)]
pub struct RxDescriptor {
    // NOTE: Only read or write these fields using volatile operations
    word0: u32, // status, written back by the DMA engine
    word1: u32, // control and buffer size
    word2: u32, // buffer 1 address
    word3: u32, // next descriptor address
}

impl RxDescriptor {
    pub const fn const_default() -> Self {
        RxDescriptor {
            word0: 0,
            word1: 0,
            word2: 0,
            word3: 0,
        }
    }

    pub fn read(&self) -> RxDescriptorReader {
        RxDescriptorReader(
            self.word0.read_volatile(),
            self.word1.read_volatile(),
            self.word2.read_volatile(),
            self.word3.read_volatile(),
        )
    }

    pub fn modify<F: FnOnce(RxDescriptorWriter) -> RxDescriptorWriter>(&mut self, f: F) {
        // Only the status word is ever rewritten after initialization.
        self.word0.modify_volatile(|word0| f(RxDescriptorWriter(word0)).0);
    }
}

impl DescriptorEntry for RxDescriptor {
    const EMPTY: Self = RxDescriptor::const_default();
    const INITIAL_OWNER: Owner = Owner::Dma;

    fn initialize(&mut self, buffer: *const u8, buffer_size: usize, next: *const Self, end_of_ring: bool) {
        let mut word1 = (1 << Word1BitNumbers::SecondAddressChained as u32)
            | (buffer_size as u32 & BUFFER1_SIZE_MASK);
        if end_of_ring {
            word1 |= 1 << Word1BitNumbers::EndOfRing as u32;
        }

        self.word1.write_volatile(word1);
        self.word2.write_volatile(buffer as usize as u32);
        self.word3.write_volatile(next as usize as u32);

        // Empty and ready to receive.
        self.modify(|w| w.release());
    }

    fn owner(&self) -> Owner {
        self.read().owner()
    }

    fn set_owner(&mut self, owner: Owner) {
        match owner {
            Owner::Dma => self.modify(|w| w.release()),
            Owner::Cpu => self.modify(|w| w.clear_owned()),
        }
    }
}

pub struct RxDescriptorReader(u32, u32, u32, u32);
impl RxDescriptorReader {
    pub fn owner(&self) -> Owner {
        if self.0 & (1 << Word0BitNumbers::Own as u32) != 0 {
            Owner::Dma
        } else {
            Owner::Cpu
        }
    }

    pub fn is_first_segment(&self) -> bool {
        self.0 & (1 << Word0BitNumbers::FirstDescriptor as u32) != 0
    }

    pub fn is_last_segment(&self) -> bool {
        self.0 & (1 << Word0BitNumbers::LastDescriptor as u32) != 0
    }

    pub fn has_error(&self) -> bool {
        self.0 & (1 << Word0BitNumbers::ErrorSummary as u32) != 0
    }

    /// Length of the whole frame, CRC included. Only valid on the last segment.
    pub fn frame_length(&self) -> usize {
        ((self.0 >> Word0BitNumbers::FrameLength as u32) & FRAME_LENGTH_MASK) as usize
    }

    pub fn buffer_size(&self) -> usize {
        (self.1 & BUFFER1_SIZE_MASK) as usize
    }

    pub fn is_end_of_ring(&self) -> bool {
        self.1 & (1 << Word1BitNumbers::EndOfRing as u32) != 0
    }

    pub fn buffer_address(&self) -> u32 {
        self.2
    }

    pub fn next_address(&self) -> u32 {
        self.3
    }
}

pub struct RxDescriptorWriter(u32);
impl RxDescriptorWriter {
    /// Drop the previous status and give the descriptor to the DMA engine.
    pub fn release(self) -> Self {
        RxDescriptorWriter(1 << Word0BitNumbers::Own as u32)
    }

    pub fn clear_owned(self) -> Self {
        RxDescriptorWriter(self.0 & !(1 << Word0BitNumbers::Own as u32))
    }

    /// Status write-back as performed by the DMA engine after filling a buffer.
    #[cfg(test)]
    pub(crate) fn complete(self, first: bool, last: bool, frame_length: usize, error: bool) -> Self {
        let mut word0 = 0;
        if first {
            word0 |= 1 << Word0BitNumbers::FirstDescriptor as u32;
        }
        if last {
            word0 |= 1 << Word0BitNumbers::LastDescriptor as u32;
            word0 |= (frame_length as u32 & FRAME_LENGTH_MASK) << Word0BitNumbers::FrameLength as u32;
        }
        if error {
            word0 |= 1 << Word0BitNumbers::ErrorSummary as u32;
        }
        RxDescriptorWriter(word0)
    }
}
