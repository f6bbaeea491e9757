use super::descriptor_table::{DescriptorEntry, DescriptorTable, Owner};
use super::volatile_read_write::VolatileReadWrite;

mod descriptor;
pub use descriptor::TxDescriptor;

mod transmitter;
pub use transmitter::Transmitter;

/// Transmit ring storage: `COUNT` descriptors with `BUFFER_SIZE` byte buffers.
pub type TxDescriptorTable<const COUNT: usize, const BUFFER_SIZE: usize> =
    DescriptorTable<TxDescriptor, COUNT, BUFFER_SIZE>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxError {
    /// Not enough CPU-owned descriptors for the frame. Retry after the DMA engine
    /// has completed some transmissions.
    ResourceExhausted,
    /// Zero-length frame, or a length larger than the supplied sources.
    InvalidLength,
    /// The frame needs more descriptors than the ring has.
    FrameTooLong(usize),
    /// The DMA engine reported a fatal bus error; the rings must be reset.
    FatalBusError,
}
