use crate::registers::{status, Registers};
use crate::rx::RxDescriptorTable;
use crate::signal::Signal;
use crate::tx::TxDescriptorTable;
use crate::{Controller, CRC_LENGTH};

const DEFAULT_INTERRUPT_MASK: u32 = status::NORMAL_SUMMARY
    | status::ABNORMAL_SUMMARY
    | status::TX_COMPLETE
    | status::RX_COMPLETE
    | status::RX_BUFFER_UNAVAILABLE
    | status::FATAL_BUS_ERROR;

const DEFAULT_MAX_RX_RETRIES: u8 = 2;

/// Settings shared by the controller and the receive task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// FCS bytes the MAC leaves at the end of each received frame.
    pub crc_length: usize,
    /// Value programmed into the DMA interrupt enable register.
    pub interrupt_mask: u32,
    /// How many times the receive task resizes its buffer for one frame.
    pub max_rx_retries: u8,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            crc_length: CRC_LENGTH,
            interrupt_mask: DEFAULT_INTERRUPT_MASK,
            max_rx_retries: DEFAULT_MAX_RX_RETRIES,
        }
    }
}

pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new() -> Self {
        Builder {
            config: Config::default(),
        }
    }

    /// The MAC is set up to strip the FCS itself.
    pub fn strip_crc(mut self) -> Self {
        self.config.crc_length = 0;
        self
    }

    pub fn set_crc_length(mut self, crc_length: usize) -> Self {
        self.config.crc_length = crc_length;
        self
    }

    pub fn crc_length(&self) -> usize {
        self.config.crc_length
    }

    pub fn set_interrupt_mask(mut self, mask: u32) -> Self {
        self.config.interrupt_mask = mask;
        self
    }

    /// Also interrupt when the first buffer of a frame has been filled.
    pub fn enable_early_receive(mut self) -> Self {
        self.config.interrupt_mask |= status::RX_EARLY;
        self
    }

    pub fn interrupt_mask(&self) -> u32 {
        self.config.interrupt_mask
    }

    pub fn set_max_rx_retries(mut self, retries: u8) -> Self {
        self.config.max_rx_retries = retries;
        self
    }

    pub fn max_rx_retries(&self) -> u8 {
        self.config.max_rx_retries
    }

    pub fn build(self) -> Config {
        self.config
    }

    /// Initialize both rings on the given tables and start the DMA engine.
    pub fn freeze<'a, R: Registers, const TX_COUNT: usize, const RX_COUNT: usize, const BUFFER_SIZE: usize>(
        self,
        regs: &'a R,
        tx_table: &'a mut TxDescriptorTable<TX_COUNT, BUFFER_SIZE>,
        rx_table: &'a mut RxDescriptorTable<RX_COUNT, BUFFER_SIZE>,
        signal: &'a Signal,
    ) -> Controller<'a, R, TX_COUNT, RX_COUNT, BUFFER_SIZE> {
        Controller::new(regs, tx_table, rx_table, signal, self.config)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
