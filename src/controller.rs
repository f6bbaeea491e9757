use crate::builder::Config;
use crate::consumer::ReceiveTask;
use crate::registers::{status, Registers};
use crate::rx::{Received, Receiver, RxDescriptorTable, RxError};
use crate::signal::Signal;
use crate::tx::{Transmitter, TxDescriptorTable, TxError};

/// Owns both descriptor rings of one MAC and drives its DMA engine.
///
/// Built by [`Builder::freeze`](crate::Builder::freeze). The register block and
/// the signal are borrowed, so the interrupt handler can keep using them through
/// an [`InterruptBridge`](crate::InterruptBridge).
pub struct Controller<'a, R: Registers, const TX_COUNT: usize, const RX_COUNT: usize, const BUFFER_SIZE: usize> {
    regs: &'a R,
    signal: &'a Signal,
    config: Config,
    tx: Transmitter<'a, TX_COUNT, BUFFER_SIZE>,
    rx: Receiver<'a, RX_COUNT, BUFFER_SIZE>,
}

impl<'a, R: Registers, const TX_COUNT: usize, const RX_COUNT: usize, const BUFFER_SIZE: usize>
    Controller<'a, R, TX_COUNT, RX_COUNT, BUFFER_SIZE>
{
    pub(crate) fn new(
        regs: &'a R,
        tx_table: &'a mut TxDescriptorTable<TX_COUNT, BUFFER_SIZE>,
        rx_table: &'a mut RxDescriptorTable<RX_COUNT, BUFFER_SIZE>,
        signal: &'a Signal,
        config: Config,
    ) -> Self {
        // Nothing may be running while the descriptor lists are reprogrammed.
        regs.disable_transmit();
        regs.disable_receive();
        regs.software_reset();
        regs.clear_status(status::ALL);
        signal.clear();

        let tx = Transmitter::new(tx_table, regs);
        let rx = Receiver::new(rx_table, regs, config.crc_length);

        let mut controller = Controller {
            regs,
            signal,
            config,
            tx,
            rx,
        };
        controller.start();
        controller
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registers(&self) -> &'a R {
        self.regs
    }

    pub fn transmitter(&self) -> &Transmitter<'a, TX_COUNT, BUFFER_SIZE> {
        &self.tx
    }

    pub fn receiver(&self) -> &Receiver<'a, RX_COUNT, BUFFER_SIZE> {
        &self.rx
    }

    /// Kind of the latched fatal bus error, if there is one.
    pub fn fatal_error(&self) -> Option<u8> {
        self.signal.fatal()
    }

    /// Enable interrupts and both DMA directions.
    pub fn start(&mut self) {
        self.regs.set_interrupt_enable(self.config.interrupt_mask);
        self.regs.enable_receive();
        self.regs.enable_transmit();
        self.regs.receive_poll_demand();
        debug!("dma started, {} tx / {} rx descriptors", TX_COUNT, RX_COUNT);
    }

    /// Stop both DMA directions and mask every interrupt. Frames in the rings
    /// stay where they are.
    pub fn stop(&mut self) {
        self.regs.disable_transmit();
        self.regs.disable_receive();
        self.regs.set_interrupt_enable(0);
    }

    /// Recover from a fatal bus error or a stuck receive ring: stop, reset the
    /// DMA engine, forget any pending wake and the fatal latch, rebuild both
    /// rings, start again.
    ///
    /// The software reset only returns once both DMA processes are idle, so the
    /// descriptors are never rewritten under a running engine. Everything still
    /// queued in either ring is lost.
    pub fn restart(&mut self) {
        warn!("restarting dma");
        self.stop();
        self.regs.software_reset();
        self.signal.clear();
        self.regs.clear_status(status::ALL);
        self.tx.reset(self.regs);
        self.rx.reset(self.regs);
        // Also brings back the interrupt mask the reset cleared.
        self.start();
    }

    pub fn transmit(&mut self, sources: &[&[u8]], total_length: usize) -> Result<(), TxError> {
        if self.signal.fatal().is_some() {
            return Err(TxError::FatalBusError);
        }
        self.tx.transmit(self.regs, sources, total_length)
    }

    pub fn transmit_frame(&mut self, frame: &[u8]) -> Result<(), TxError> {
        self.transmit(&[frame], frame.len())
    }

    pub fn receive(&mut self, dest: &mut [u8]) -> nb::Result<Received, RxError> {
        if self.signal.fatal().is_some() {
            return Err(nb::Error::Other(RxError::FatalBusError));
        }
        self.rx.receive(self.regs, dest)
    }

    pub fn peek_frame_length(&self) -> nb::Result<usize, RxError> {
        self.rx.peek_frame_length()
    }

    pub fn flush_frame(&mut self) -> nb::Result<usize, RxError> {
        self.rx.flush_frame(self.regs)
    }

    /// Let `task` drain the receive ring if it has been woken.
    pub fn poll_receive<F, const FRAME_CAPACITY: usize>(
        &mut self,
        task: &mut ReceiveTask<'_, FRAME_CAPACITY>,
        deliver: &mut F,
    ) -> nb::Result<usize, RxError>
    where
        F: FnMut(&[u8]),
    {
        task.poll(&mut self.rx, self.regs, deliver)
    }

    /// Stop the DMA engine and give back the descriptor tables.
    pub fn free(
        mut self,
    ) -> (
        &'a mut TxDescriptorTable<TX_COUNT, BUFFER_SIZE>,
        &'a mut RxDescriptorTable<RX_COUNT, BUFFER_SIZE>,
    ) {
        self.stop();
        (self.tx.free(), self.rx.free())
    }
}
