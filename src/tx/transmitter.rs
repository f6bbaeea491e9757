use super::{Owner, TxDescriptorTable, TxError};
use crate::registers::{barrier, Registers};

/// Copies frames into the transmit ring and hands them to the DMA engine.
///
/// `transmit` is not reentrant: the write cursor is plain state. Callers that
/// send from more than one context must serialize them, e.g. with a
/// `critical_section::Mutex` around the transmitter.
pub struct Transmitter<'tx, const COUNT: usize, const BUFFER_SIZE: usize> {
    descriptors: &'tx mut TxDescriptorTable<COUNT, BUFFER_SIZE>,
    frames_sent: u32,
    completion_errors: u32,
}

impl<'tx, const COUNT: usize, const BUFFER_SIZE: usize> Transmitter<'tx, COUNT, BUFFER_SIZE> {
    pub fn new<R: Registers>(
        descriptors: &'tx mut TxDescriptorTable<COUNT, BUFFER_SIZE>,
        regs: &R,
    ) -> Self {
        let mut tx = Transmitter {
            descriptors,
            frames_sent: 0,
            completion_errors: 0,
        };
        tx.reset(regs);
        tx
    }

    /// Rebuild the ring from scratch: every descriptor back to the CPU, cursor
    /// at the start, descriptor list reprogrammed. Only call this while the
    /// transmit DMA is stopped.
    pub fn reset<R: Registers>(&mut self, regs: &R) {
        self.descriptors.initialize();
        regs.set_transmit_descriptor_list(self.descriptors.base_address());
    }

    pub fn write_cursor(&self) -> usize {
        self.descriptors.cursor()
    }

    pub fn descriptors(&self) -> &TxDescriptorTable<COUNT, BUFFER_SIZE> {
        self.descriptors
    }

    #[cfg(test)]
    pub(crate) fn descriptors_mut(&mut self) -> &mut TxDescriptorTable<COUNT, BUFFER_SIZE> {
        self.descriptors
    }

    pub fn frames_sent(&self) -> u32 {
        self.frames_sent
    }

    /// Descriptors that came back from the DMA engine with an error flag.
    pub fn completion_errors(&self) -> u32 {
        self.completion_errors
    }

    /// Number of CPU-owned descriptors available from the write cursor on.
    pub fn free_descriptors(&self) -> usize {
        (0..COUNT)
            .take_while(|&offset| {
                self.descriptors.owner(self.descriptors.index_from_cursor(offset)) == Owner::Cpu
            })
            .count()
    }

    pub fn can_transmit(&self, length: usize) -> bool {
        length > 0 && segments_for(length, BUFFER_SIZE) <= self.free_descriptors()
    }

    pub fn transmit_frame<R: Registers>(&mut self, regs: &R, frame: &[u8]) -> Result<(), TxError> {
        self.transmit(regs, &[frame], frame.len())
    }

    /// Transmit the first `total_length` bytes of the concatenation of `sources`.
    ///
    /// The frame is split into `BUFFER_SIZE` chunks, one descriptor each. Either
    /// every descriptor the frame needs is free and the whole frame is queued,
    /// or nothing is touched and `ResourceExhausted` is returned.
    pub fn transmit<R: Registers>(
        &mut self,
        regs: &R,
        sources: &[&[u8]],
        total_length: usize,
    ) -> Result<(), TxError> {
        let available: usize = sources.iter().map(|s| s.len()).sum();
        if total_length == 0 || total_length > available {
            return Err(TxError::InvalidLength);
        }

        let segment_count = segments_for(total_length, BUFFER_SIZE);
        if segment_count > COUNT {
            return Err(TxError::FrameTooLong(total_length));
        }

        if self.free_descriptors() < segment_count {
            trace!("tx: {} segments needed, ring full", segment_count);
            return Err(TxError::ResourceExhausted);
        }

        // Fill every segment while the CPU still owns all of them.
        let mut gather = Gather::new(sources);
        let mut remaining = total_length;
        for offset in 0..segment_count {
            let index = self.descriptors.index_from_cursor(offset);
            let (descriptor, buffer) = self.descriptors.descriptor_pair_mut(index);

            if descriptor.read().has_error() {
                self.completion_errors = self.completion_errors.wrapping_add(1);
            }

            let length = remaining.min(BUFFER_SIZE);
            gather.copy_to(&mut buffer[..length]);
            remaining -= length;

            descriptor.modify(|w| {
                w.clear_error()
                    .set_segment(offset == 0, offset == segment_count - 1)
                    .set_payload_len(length)
            });
        }

        // Payloads must be in memory before any OWN bit flips. The first segment
        // goes last so the DMA engine, which polls from it, never starts on a
        // half-released chain.
        barrier();
        for offset in (1..segment_count).rev() {
            let index = self.descriptors.index_from_cursor(offset);
            self.descriptors.descriptor_mut(index).modify(|w| w.set_owner(Owner::Dma));
        }
        barrier();
        let first = self.descriptors.cursor();
        self.descriptors.descriptor_mut(first).modify(|w| w.set_owner(Owner::Dma));

        self.descriptors.advance_by(segment_count);
        self.frames_sent = self.frames_sent.wrapping_add(1);

        barrier();
        regs.transmit_poll_demand();

        trace!("tx: {} bytes in {} segments", total_length, segment_count);
        Ok(())
    }

    /// Give the table back, e.g. to hand it to a new transmitter after teardown.
    pub fn free(self) -> &'tx mut TxDescriptorTable<COUNT, BUFFER_SIZE> {
        self.descriptors
    }
}

pub(crate) const fn segments_for(length: usize, buffer_size: usize) -> usize {
    (length + buffer_size - 1) / buffer_size
}

/// Reads a sequence of source slices as if they were one contiguous buffer.
struct Gather<'a, 'b> {
    sources: &'a [&'b [u8]],
    source: usize,
    offset: usize,
}

impl<'a, 'b> Gather<'a, 'b> {
    fn new(sources: &'a [&'b [u8]]) -> Self {
        Gather {
            sources,
            source: 0,
            offset: 0,
        }
    }

    fn copy_to(&mut self, out: &mut [u8]) {
        let mut written = 0;
        while written < out.len() {
            let Some(source) = self.sources.get(self.source) else {
                return;
            };

            let pending = &source[self.offset..];
            if pending.is_empty() {
                self.source += 1;
                self.offset = 0;
                continue;
            }

            let length = pending.len().min(out.len() - written);
            out[written..written + length].copy_from_slice(&pending[..length]);
            written += length;
            self.offset += length;
        }
    }
}
