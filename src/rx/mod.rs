use super::descriptor_table::{DescriptorEntry, DescriptorTable, Owner};
use super::volatile_read_write::VolatileReadWrite;

mod descriptor;
pub use descriptor::RxDescriptor;

mod receiver;
pub use receiver::{Received, Receiver, RxStats};

/// Receive ring storage: `COUNT` descriptors with `BUFFER_SIZE` byte buffers.
pub type RxDescriptorTable<const COUNT: usize, const BUFFER_SIZE: usize> =
    DescriptorTable<RxDescriptor, COUNT, BUFFER_SIZE>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxError {
    /// The destination buffer is smaller than the frame, which needs the given
    /// number of bytes. Nothing was consumed; retry with a larger buffer.
    NeedsLargerBuffer(usize),
    /// Every descriptor in the ring is CPU-owned but none ends a frame.
    IncompleteFrameStuck,
    /// The MAC flagged the frame as bad. Its descriptors were returned to the
    /// DMA engine.
    FrameDropped,
    /// The frame can never fit the consumer's buffer.
    FrameTooLarge(usize),
    /// The DMA engine reported a fatal bus error; the rings must be reset.
    FatalBusError,
}
