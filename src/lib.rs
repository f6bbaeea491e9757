//! Descriptor-ring DMA frame engine for DesignWare-style Ethernet MACs
//!
//! This crate moves Ethernet frames between host memory and the MAC's DMA
//! engine (the Synopsys block found in the ESP32 EMAC, STM32 ETH and TM4C EMAC
//! peripherals). It covers the part of a MAC driver that is not plain
//! register-setting:
//!
//! - [`Transmitter`] splits a frame, given as one or more source buffers, across
//!   consecutive fixed-size transmit descriptors.
//! - [`Receiver`] reassembles a frame that the hardware spread across several
//!   receive descriptors.
//! - [`InterruptBridge`] turns the DMA status word into short hook calls and wakes
//!   the receive task through a single-slot [`Signal`].
//! - [`ReceiveTask`] drains the receive ring after a wake and hands frames to the
//!   upper layer.
//!
//! The only synchronization between the CPU and the DMA engine is the OWN bit in
//! each descriptor: whoever owns a descriptor is the only party that may touch it
//! or its buffer.
//!
//! # Usage
//!
//! Descriptor tables must not move once the ring is initialized, since the
//! hardware chain holds their addresses. Place them in a `static` (their
//! constructors are `const fn`) and hand `&'static mut` references to the
//! [`Builder`].
//!
//! PHY management, clock and pin setup, and the MAC configuration registers are
//! outside of this crate.

#![no_std]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

mod builder;
mod consumer;
mod controller;
mod descriptor_table;
mod interrupt;
mod registers;
mod rx;
mod signal;
mod tx;
mod volatile_read_write;

#[cfg(test)]
mod sim;

pub use builder::{Builder, Config};
pub use consumer::{ReceiveStats, ReceiveTask};
pub use controller::Controller;
pub use descriptor_table::{next_index, DescriptorEntry, DescriptorTable, Owner};
pub use interrupt::{InterruptBridge, InterruptHooks, WakeConsumer};
pub use registers::{status, Mmio, Registers, Status};
pub use rx::{Received, Receiver, RxDescriptor, RxDescriptorTable, RxError, RxStats};
pub use signal::{Signal, Wake};
pub use tx::{Transmitter, TxDescriptor, TxDescriptorTable, TxError};

/// Bytes of frame check sequence the MAC appends to every received frame unless
/// it is configured to strip them.
pub const CRC_LENGTH: usize = 4;

/// Largest buffer a single descriptor can describe (13 bit size field). The
/// largest size that also meets [`BUFFER_ALIGNMENT`] is 0x1FFC.
pub const MAX_BUFFER_SIZE: usize = 0x1FFF;

/// Descriptor buffer sizes must be a multiple of the 32 bit bus width.
pub const BUFFER_ALIGNMENT: usize = 4;
