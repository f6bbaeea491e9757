//! Simulated register block and DMA engine for host tests.

use crate::registers::{status, Registers};
use crate::rx::RxDescriptorTable;
use crate::tx::TxDescriptorTable;
use crate::{DescriptorEntry, Owner};
use core::cell::{Cell, RefCell};
use std::vec::Vec;

#[derive(Default)]
pub(crate) struct SimRegisters {
    status: Cell<u32>,
    clears: RefCell<Vec<u32>>,
    transmit_polls: Cell<u32>,
    receive_polls: Cell<u32>,
    transmit_list: Cell<u32>,
    receive_list: Cell<u32>,
    interrupt_mask: Cell<u32>,
    transmit_enabled: Cell<bool>,
    receive_enabled: Cell<bool>,
    software_resets: Cell<u32>,
}

impl SimRegisters {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Assert status bits as the hardware would.
    pub(crate) fn raise(&self, bits: u32) {
        self.status.set(self.status.get() | bits);
    }

    /// Every value written to the status register, in order.
    pub(crate) fn cleared(&self) -> Vec<u32> {
        self.clears.borrow().clone()
    }

    pub(crate) fn transmit_polls(&self) -> u32 {
        self.transmit_polls.get()
    }

    pub(crate) fn receive_polls(&self) -> u32 {
        self.receive_polls.get()
    }

    pub(crate) fn transmit_list(&self) -> u32 {
        self.transmit_list.get()
    }

    pub(crate) fn receive_list(&self) -> u32 {
        self.receive_list.get()
    }

    pub(crate) fn interrupt_mask(&self) -> u32 {
        self.interrupt_mask.get()
    }

    pub(crate) fn transmit_enabled(&self) -> bool {
        self.transmit_enabled.get()
    }

    pub(crate) fn receive_enabled(&self) -> bool {
        self.receive_enabled.get()
    }

    pub(crate) fn software_resets(&self) -> u32 {
        self.software_resets.get()
    }
}

impl Registers for SimRegisters {
    fn read_status(&self) -> u32 {
        self.status.get()
    }

    fn clear_status(&self, bits: u32) {
        self.clears.borrow_mut().push(bits);
        let cleared = bits & status::ALL;
        let mut word = self.status.get() & !cleared;
        if cleared & status::FATAL_BUS_ERROR != 0 {
            // The error kind field goes away with the condition.
            word &= !(0x7 << 23);
        }
        self.status.set(word);
    }

    fn transmit_poll_demand(&self) {
        self.transmit_polls.set(self.transmit_polls.get() + 1);
    }

    fn receive_poll_demand(&self) {
        self.receive_polls.set(self.receive_polls.get() + 1);
    }

    fn set_transmit_descriptor_list(&self, address: u32) {
        self.transmit_list.set(address);
    }

    fn set_receive_descriptor_list(&self, address: u32) {
        self.receive_list.set(address);
    }

    fn set_interrupt_enable(&self, mask: u32) {
        self.interrupt_mask.set(mask);
    }

    fn enable_transmit(&self) {
        self.transmit_enabled.set(true);
    }

    fn disable_transmit(&self) {
        self.transmit_enabled.set(false);
    }

    fn enable_receive(&self) {
        self.receive_enabled.set(true);
    }

    fn disable_receive(&self) {
        self.receive_enabled.set(false);
    }

    fn software_reset(&self) {
        self.software_resets.set(self.software_resets.get() + 1);
        self.status.set(0);
        self.transmit_list.set(0);
        self.receive_list.set(0);
        self.interrupt_mask.set(0);
        self.transmit_enabled.set(false);
        self.receive_enabled.set(false);
    }
}

/// The hardware side of both rings. Tracks its own position in each ring, the
/// way the DMA engine follows its current-descriptor pointers.
pub(crate) struct SimDma {
    tx_index: usize,
    rx_index: usize,
    crc_length: usize,
}

impl SimDma {
    /// `crc_length` bytes of FCS are appended to every received frame.
    pub(crate) fn new(crc_length: usize) -> Self {
        SimDma {
            tx_index: 0,
            rx_index: 0,
            crc_length,
        }
    }

    /// Send every queued frame, returning their contents.
    pub(crate) fn transmit<const N: usize, const B: usize>(
        &mut self,
        table: &mut TxDescriptorTable<N, B>,
        regs: &SimRegisters,
    ) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        let mut frame = Vec::new();

        while table.owner(self.tx_index) == Owner::Dma {
            let index = self.tx_index;
            let descriptor = table.descriptor(index).read();
            let length = descriptor.payload_len();
            frame.extend_from_slice(&table.buffer(index)[..length]);
            if descriptor.is_last_segment() {
                frames.push(core::mem::take(&mut frame));
            }

            table.descriptor_mut(index).set_owner(Owner::Cpu);
            self.tx_index = crate::next_index(index, N);
        }

        if !frames.is_empty() {
            regs.raise(status::TX_COMPLETE | status::NORMAL_SUMMARY);
        }
        frames
    }

    /// Finish a single descriptor, handing it back to the CPU.
    pub(crate) fn complete_one<const N: usize, const B: usize>(
        &mut self,
        table: &mut TxDescriptorTable<N, B>,
        regs: &SimRegisters,
    ) {
        if table.owner(self.tx_index) == Owner::Dma {
            table.descriptor_mut(self.tx_index).set_owner(Owner::Cpu);
            self.tx_index = crate::next_index(self.tx_index, N);
            regs.raise(status::TX_COMPLETE | status::NORMAL_SUMMARY);
        }
    }

    /// Finish every queued descriptor with the error summary bit set.
    pub(crate) fn fail_all<const N: usize, const B: usize>(
        &mut self,
        table: &mut TxDescriptorTable<N, B>,
        regs: &SimRegisters,
    ) {
        while table.owner(self.tx_index) == Owner::Dma {
            table
                .descriptor_mut(self.tx_index)
                .modify(|w| w.set_error().set_owner(Owner::Cpu));
            self.tx_index = crate::next_index(self.tx_index, N);
        }
        regs.raise(status::TX_COMPLETE | status::NORMAL_SUMMARY);
    }

    /// Write `frame` plus CRC into the receive ring. Returns false, raising
    /// receive-buffer-unavailable, if the frame doesn't fit in the descriptors the
    /// DMA engine owns.
    pub(crate) fn receive<const N: usize, const B: usize>(
        &mut self,
        table: &mut RxDescriptorTable<N, B>,
        regs: &SimRegisters,
        frame: &[u8],
    ) -> bool {
        self.write_frame(table, regs, frame, false)
    }

    pub(crate) fn receive_errored<const N: usize, const B: usize>(
        &mut self,
        table: &mut RxDescriptorTable<N, B>,
        regs: &SimRegisters,
        frame: &[u8],
    ) -> bool {
        self.write_frame(table, regs, frame, true)
    }

    /// Fill `segments` descriptors of a frame that never ends.
    pub(crate) fn receive_partial<const N: usize, const B: usize>(
        &mut self,
        table: &mut RxDescriptorTable<N, B>,
        segments: usize,
    ) {
        for i in 0..segments {
            let index = self.rx_index;
            let (descriptor, buffer) = table.descriptor_pair_mut(index);
            buffer.fill(0x55);
            descriptor.modify(|w| w.complete(i == 0, false, 0, false));
            self.rx_index = crate::next_index(index, N);
        }
    }

    fn write_frame<const N: usize, const B: usize>(
        &mut self,
        table: &mut RxDescriptorTable<N, B>,
        regs: &SimRegisters,
        frame: &[u8],
        error: bool,
    ) -> bool {
        let mut wire = frame.to_vec();
        wire.extend((0..self.crc_length).map(|i| 0xC0 | i as u8));

        let segments = (wire.len() + B - 1) / B;
        let available = (0..N)
            .take_while(|&offset| table.owner((self.rx_index + offset) % N) == Owner::Dma)
            .count();
        if segments > available {
            regs.raise(status::RX_BUFFER_UNAVAILABLE | status::ABNORMAL_SUMMARY);
            return false;
        }

        for (i, chunk) in wire.chunks(B).enumerate() {
            let index = self.rx_index;
            let (descriptor, buffer) = table.descriptor_pair_mut(index);
            buffer[..chunk.len()].copy_from_slice(chunk);

            let last = i == segments - 1;
            descriptor.modify(|w| w.complete(i == 0, last, wire.len(), error && last));
            self.rx_index = crate::next_index(index, N);
        }

        regs.raise(status::RX_COMPLETE | status::NORMAL_SUMMARY);
        true
    }
}
