//! Receive consumer loop
//!
//! The interrupt bridge only sets a flag; all frame copying happens here, in the
//! one task that owns the [`Receiver`]. After every wake the task drains the
//! ring until the receiver reports no more complete frames, so coalesced wakes
//! never strand a frame.

use crate::builder::Config;
use crate::registers::Registers;
use crate::rx::{Received, Receiver, RxError};
use crate::signal::{Signal, Wake};
use embedded_hal::timer::CountDown;
use fugit::MillisDurationU32;
use heapless::Vec;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReceiveStats {
    pub delivered: u32,
    pub dropped: u32,
    /// Frames larger than the task's buffer can ever hold.
    pub oversized: u32,
    pub retries: u32,
    /// Frames given up on because the resize limit ran out.
    pub retry_exhausted: u32,
}

pub struct ReceiveTask<'s, const FRAME_CAPACITY: usize> {
    signal: &'s Signal,
    buffer: Vec<u8, FRAME_CAPACITY>,
    max_retries: u8,
    stats: ReceiveStats,
}

impl<'s, const FRAME_CAPACITY: usize> ReceiveTask<'s, FRAME_CAPACITY> {
    pub fn new(signal: &'s Signal, config: &Config) -> Self {
        ReceiveTask {
            signal,
            buffer: Vec::new(),
            max_retries: config.max_rx_retries,
            stats: ReceiveStats::default(),
        }
    }

    pub fn stats(&self) -> ReceiveStats {
        self.stats
    }

    /// Drain the ring if the task has been woken, handing every frame to
    /// `deliver`. Returns the number of frames delivered.
    ///
    /// `WouldBlock` means there was no wake to act on. A fatal bus error is
    /// reported on every call until the controller is restarted.
    pub fn poll<R, F, const COUNT: usize, const BUFFER_SIZE: usize>(
        &mut self,
        receiver: &mut Receiver<'_, COUNT, BUFFER_SIZE>,
        regs: &R,
        deliver: &mut F,
    ) -> nb::Result<usize, RxError>
    where
        R: Registers,
        F: FnMut(&[u8]),
    {
        match self.signal.poll() {
            Ok(Wake::Receive) => self.drain(receiver, regs, deliver).map_err(nb::Error::Other),
            Ok(Wake::Fatal(kind)) => {
                error!("rx task: fatal bus error {}, ring needs a restart", kind);
                Err(nb::Error::Other(RxError::FatalBusError))
            }
            Err(nb::Error::WouldBlock) => Err(nb::Error::WouldBlock),
            Err(nb::Error::Other(never)) => void::unreachable(never),
        }
    }

    /// Block until woken, then drain the ring.
    pub fn run<R, F, const COUNT: usize, const BUFFER_SIZE: usize>(
        &mut self,
        receiver: &mut Receiver<'_, COUNT, BUFFER_SIZE>,
        regs: &R,
        deliver: &mut F,
    ) -> Result<usize, RxError>
    where
        R: Registers,
        F: FnMut(&[u8]),
    {
        nb::block!(self.poll(receiver, regs, deliver))
    }

    /// Wait up to `timeout` for a wake without consuming it. Returns whether one
    /// arrived.
    pub fn wait_timeout<T>(&self, timer: &mut T, timeout: MillisDurationU32) -> bool
    where
        T: CountDown<Time = MillisDurationU32>,
    {
        timer.start(timeout);
        loop {
            if self.signal.is_pending() {
                return true;
            }
            if timer.wait().is_ok() {
                return self.signal.is_pending();
            }
        }
    }

    /// Receive frames until the receiver says none are left.
    pub fn drain<R, F, const COUNT: usize, const BUFFER_SIZE: usize>(
        &mut self,
        receiver: &mut Receiver<'_, COUNT, BUFFER_SIZE>,
        regs: &R,
        deliver: &mut F,
    ) -> Result<usize, RxError>
    where
        R: Registers,
        F: FnMut(&[u8]),
    {
        let mut delivered = 0;
        loop {
            match self.receive_frame(receiver, regs)? {
                Some(received) => {
                    deliver(&self.buffer[..received.length]);
                    delivered += 1;
                    self.stats.delivered = self.stats.delivered.wrapping_add(1);

                    if received.frames_remaining == 0 {
                        return Ok(delivered);
                    }
                }
                None if receiver.frames_pending() == 0 => return Ok(delivered),
                None => {}
            }
        }
    }

    /// Copy the head frame into the task's buffer, growing it on demand.
    /// `None` means nothing was delivered: the ring was empty or the head frame
    /// was discarded.
    fn receive_frame<R: Registers, const COUNT: usize, const BUFFER_SIZE: usize>(
        &mut self,
        receiver: &mut Receiver<'_, COUNT, BUFFER_SIZE>,
        regs: &R,
    ) -> Result<Option<Received>, RxError> {
        // Single-descriptor frames fit on the first try.
        let mut length = BUFFER_SIZE.min(FRAME_CAPACITY);
        let mut retries = 0;

        loop {
            self.buffer.clear();
            // Can't fail, `length` never exceeds the capacity.
            let _ = self.buffer.resize(length, 0);

            match receiver.receive(regs, &mut self.buffer) {
                Ok(received) => return Ok(Some(received)),
                Err(nb::Error::WouldBlock) => return Ok(None),
                Err(nb::Error::Other(RxError::FrameDropped)) => {
                    self.stats.dropped = self.stats.dropped.wrapping_add(1);
                    return Ok(None);
                }
                Err(nb::Error::Other(RxError::NeedsLargerBuffer(required))) => {
                    if required > FRAME_CAPACITY {
                        warn!("rx task: flushing {} byte frame", required);
                        self.stats.oversized = self.stats.oversized.wrapping_add(1);
                        self.discard(receiver, regs)?;
                        return Ok(None);
                    }

                    if retries == self.max_retries {
                        self.stats.retry_exhausted = self.stats.retry_exhausted.wrapping_add(1);
                        self.discard(receiver, regs)?;
                        // Whatever is behind this frame still needs a pass.
                        self.signal.notify();
                        return Err(RxError::FrameTooLarge(required));
                    }

                    retries += 1;
                    self.stats.retries = self.stats.retries.wrapping_add(1);
                    length = required;
                }
                Err(nb::Error::Other(error)) => return Err(error),
            }
        }
    }

    fn discard<R: Registers, const COUNT: usize, const BUFFER_SIZE: usize>(
        &mut self,
        receiver: &mut Receiver<'_, COUNT, BUFFER_SIZE>,
        regs: &R,
    ) -> Result<(), RxError> {
        match receiver.flush_frame(regs) {
            Ok(_) | Err(nb::Error::WouldBlock) => Ok(()),
            Err(nb::Error::Other(error)) => Err(error),
        }
    }
}
