use super::{Owner, RxDescriptorTable, RxError};
use crate::descriptor_table::DescriptorEntry;
use crate::registers::{barrier, Registers};

/// A frame copied out of the receive ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Received {
    /// Bytes written to the destination buffer.
    pub length: usize,
    /// Complete frames still waiting in the ring behind this one.
    pub frames_remaining: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxStats {
    pub frames: u32,
    pub errored: u32,
    pub flushed: u32,
    pub stuck: u32,
}

struct Frame {
    segments: usize,
    length: usize,
    errored: bool,
}

enum Scan {
    Complete(Frame),
    // The DMA engine still owns a descriptor of the frame.
    Pending,
    // Ran out of ring before finding a last segment.
    Unterminated,
}

/// Reassembles frames from the receive ring.
pub struct Receiver<'rx, const COUNT: usize, const BUFFER_SIZE: usize> {
    descriptors: &'rx mut RxDescriptorTable<COUNT, BUFFER_SIZE>,
    crc_length: usize,
    stats: RxStats,
}

impl<'rx, const COUNT: usize, const BUFFER_SIZE: usize> Receiver<'rx, COUNT, BUFFER_SIZE> {
    /// `crc_length` is the number of FCS bytes the MAC leaves at the end of every
    /// frame; they are never copied out.
    pub fn new<R: Registers>(
        descriptors: &'rx mut RxDescriptorTable<COUNT, BUFFER_SIZE>,
        regs: &R,
        crc_length: usize,
    ) -> Self {
        let mut rx = Receiver {
            descriptors,
            crc_length,
            stats: RxStats::default(),
        };
        rx.reset(regs);
        rx
    }

    /// Give every descriptor back to the DMA engine and start over at index 0.
    /// Only call this while the receive DMA is stopped.
    pub fn reset<R: Registers>(&mut self, regs: &R) {
        self.descriptors.initialize();
        regs.set_receive_descriptor_list(self.descriptors.base_address());
    }

    pub fn read_cursor(&self) -> usize {
        self.descriptors.cursor()
    }

    pub fn descriptors(&self) -> &RxDescriptorTable<COUNT, BUFFER_SIZE> {
        self.descriptors
    }

    #[cfg(test)]
    pub(crate) fn descriptors_mut(&mut self) -> &mut RxDescriptorTable<COUNT, BUFFER_SIZE> {
        self.descriptors
    }

    pub fn stats(&self) -> RxStats {
        self.stats
    }

    /// Length of the complete frame at the read cursor. Nothing is consumed.
    ///
    /// A frame the MAC flagged as bad reports `FrameDropped`; it stays in the ring
    /// until [`receive`](Self::receive) or [`flush_frame`](Self::flush_frame)
    /// discards it.
    pub fn peek_frame_length(&self) -> nb::Result<usize, RxError> {
        match self.scan(0) {
            Scan::Complete(frame) if frame.errored => Err(nb::Error::Other(RxError::FrameDropped)),
            Scan::Complete(frame) => Ok(frame.length),
            Scan::Pending => Err(nb::Error::WouldBlock),
            Scan::Unterminated => Err(nb::Error::Other(RxError::IncompleteFrameStuck)),
        }
    }

    /// Number of complete frames sitting in the ring.
    pub fn frames_pending(&self) -> usize {
        self.count_frames(0)
    }

    /// Copy the frame at the read cursor into `dest` and give its descriptors
    /// back to the DMA engine.
    ///
    /// `WouldBlock` means no complete frame is available. If `dest` is too short
    /// the call fails with `NeedsLargerBuffer` and the ring is left exactly as it
    /// was, so it can be retried with a bigger buffer.
    pub fn receive<R: Registers>(
        &mut self,
        regs: &R,
        dest: &mut [u8],
    ) -> nb::Result<Received, RxError> {
        let frame = self.head_frame()?;

        if frame.errored {
            self.stats.errored = self.stats.errored.wrapping_add(1);
            debug!("rx: dropping bad frame ({} segments)", frame.segments);
            self.release(regs, frame.segments);
            return Err(nb::Error::Other(RxError::FrameDropped));
        }

        if dest.len() < frame.length {
            return Err(nb::Error::Other(RxError::NeedsLargerBuffer(frame.length)));
        }

        let mut copied = 0;
        for offset in 0..frame.segments {
            let index = self.descriptors.index_from_cursor(offset);
            let length = (frame.length - copied).min(BUFFER_SIZE);
            dest[copied..copied + length].copy_from_slice(&self.descriptors.buffer(index)[..length]);
            copied += length;
        }

        let frames_remaining = self.count_frames(frame.segments);
        self.release(regs, frame.segments);
        self.stats.frames = self.stats.frames.wrapping_add(1);

        trace!("rx: {} bytes, {} more ready", frame.length, frames_remaining);
        Ok(Received {
            length: frame.length,
            frames_remaining,
        })
    }

    /// Discard the frame at the read cursor without copying it. Returns its length.
    pub fn flush_frame<R: Registers>(&mut self, regs: &R) -> nb::Result<usize, RxError> {
        let frame = self.head_frame()?;

        if frame.errored {
            self.stats.errored = self.stats.errored.wrapping_add(1);
        } else {
            self.stats.flushed = self.stats.flushed.wrapping_add(1);
        }
        self.release(regs, frame.segments);
        Ok(frame.length)
    }

    fn head_frame(&mut self) -> nb::Result<Frame, RxError> {
        match self.scan(0) {
            Scan::Complete(frame) => Ok(frame),
            Scan::Pending => Err(nb::Error::WouldBlock),
            Scan::Unterminated => {
                self.stats.stuck = self.stats.stuck.wrapping_add(1);
                warn!("rx: ring full of segments without a last descriptor");
                Err(nb::Error::Other(RxError::IncompleteFrameStuck))
            }
        }
    }

    /// Walk from `start` entries after the read cursor to the end of the next
    /// frame, without going around the ring more than once.
    fn scan(&self, start: usize) -> Scan {
        for offset in start..COUNT {
            let descriptor = self.descriptors.descriptor(self.descriptors.index_from_cursor(offset)).read();
            if descriptor.owner() == Owner::Dma {
                return Scan::Pending;
            }

            if descriptor.is_last_segment() {
                let segments = offset - start + 1;
                let frame_length = descriptor.frame_length();
                let length = frame_length.saturating_sub(self.crc_length);
                let errored = descriptor.has_error()
                    || length == 0
                    || frame_length > segments * BUFFER_SIZE;

                return Scan::Complete(Frame {
                    segments,
                    length,
                    errored,
                });
            }
        }

        Scan::Unterminated
    }

    fn count_frames(&self, mut start: usize) -> usize {
        let mut frames = 0;
        while let Scan::Complete(frame) = self.scan(start) {
            frames += 1;
            start += frame.segments;
        }
        frames
    }

    fn release<R: Registers>(&mut self, regs: &R, segments: usize) {
        // Finish reading the buffers before the DMA engine may refill them.
        barrier();
        for _ in 0..segments {
            let index = self.descriptors.cursor();
            self.descriptors.descriptor_mut(index).set_owner(Owner::Dma);
            self.descriptors.advance();
        }

        barrier();
        regs.receive_poll_demand();
    }

    pub fn free(self) -> &'rx mut RxDescriptorTable<COUNT, BUFFER_SIZE> {
        self.descriptors
    }
}
