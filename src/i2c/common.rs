// Licensed under the Apache-2.0 license

//! Common types and constants for the two-wire bus engines.
//!
//! This module provides shared definitions for error handling, controller
//! configuration, status codes and protocol utilities used by both the
//! interrupt-driven slave and the polling master.

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use fugit::HertzU32;

/// Reserved general-call address. Every slave answers it.
pub const GENERAL_CALL_ADDRESS: u8 = 0x00;

/// Highest valid 7-bit address.
pub const MAX_ADDRESS: u8 = 0x7f;

/// Data direction carried in the low bit of the address byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    /// Master writes to slave.
    Write = 0,
    /// Master reads from slave.
    Read = 1,
}

impl Direction {
    #[must_use]
    pub const fn from_address_byte(byte: u8) -> Self {
        if byte & 1 == 0 {
            Self::Write
        } else {
            Self::Read
        }
    }
}

/// Build the on-wire address byte: `address << 1 | R/W`.
#[must_use]
pub const fn address_byte(address: u8, direction: Direction) -> u8 {
    ((address << 1) & 0xfe) | direction as u8
}

/// States of the slave protocol machine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SlaveState {
    WaitForStart,
    WaitForAddress,
    WaitForData,
    SendData,
    SendAck,
    WaitAck,
    RequestAck,
}

/// Outcome of the clock-stretch wait that follows a detected start condition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StartSettle {
    /// SCL went low while SDA stayed low: a transaction is beginning.
    Transaction,
    /// SDA returned high first: the "start" was a stop condition.
    Stop,
}

/// Status codes reported by the master controller's status register.
///
/// The prescaler bits are masked off by the hardware implementation; only
/// the five status bits are carried here.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TwiStatus(pub u8);

impl TwiStatus {
    pub const START: Self = Self(0x08);
    pub const REP_START: Self = Self(0x10);
    pub const MT_SLA_ACK: Self = Self(0x18);
    pub const MT_SLA_NACK: Self = Self(0x20);
    pub const MT_DATA_ACK: Self = Self(0x28);
    pub const MT_DATA_NACK: Self = Self(0x30);
    pub const ARB_LOST: Self = Self(0x38);
    pub const MR_SLA_ACK: Self = Self(0x40);
    pub const MR_SLA_NACK: Self = Self(0x48);
    pub const MR_DATA_ACK: Self = Self(0x50);
    pub const MR_DATA_NACK: Self = Self(0x58);
    pub const NO_INFO: Self = Self(0xf8);
    pub const BUS_ERROR: Self = Self(0x00);

    #[must_use]
    pub const fn from_register(raw: u8) -> Self {
        Self(raw & 0xf8)
    }

    #[must_use]
    pub const fn is_start(self) -> bool {
        self.0 == Self::START.0 || self.0 == Self::REP_START.0
    }
}

/// Control actions the master issues on its controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TwiControl {
    /// Generate a (repeated) start condition.
    Start,
    /// Shift out the byte loaded in the data register.
    Transmit,
    /// Shift in a byte and answer with ACK (more bytes wanted).
    ReceiveAck,
    /// Shift in a byte and answer with NACK (last byte).
    ReceiveNack,
    /// Generate a stop condition. Completes without raising the done flag.
    Stop,
}

/// Master transfer failure. The discriminants are the numeric result codes
/// shown to console users; `0` is success.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferError {
    /// The controller did not report a start condition.
    StartNotSent = 1,
    /// No slave acknowledged the address byte.
    AddressNack = 2,
    /// A data byte was not acknowledged (or not delivered with the expected status).
    DataNack = 3,
    /// Address does not fit in seven bits. Rejected before the bus is touched.
    InvalidAddress = 4,
}

impl TransferError {
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Numeric result code of a transfer: `0` on success, the error's code otherwise.
#[must_use]
pub fn transfer_code(result: &Result<(), TransferError>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => e.code(),
    }
}

impl embedded_hal::i2c::Error for TransferError {
    fn kind(&self) -> ErrorKind {
        match self {
            TransferError::StartNotSent => ErrorKind::Bus,
            TransferError::AddressNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            TransferError::DataNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            TransferError::InvalidAddress => ErrorKind::Other,
        }
    }
}

/// Rejected slave address assignment.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddressError {
    /// `0x00` is the general-call address and cannot be owned.
    GeneralCall,
    /// Address does not fit in seven bits.
    OutOfRange(u8),
}

/// Validate an own-address for a slave node (`1..=127`).
///
/// # Errors
///
/// Returns `AddressError` for the general-call address or values above `0x7f`.
pub const fn validate_own_address(address: u8) -> Result<u8, AddressError> {
    if address == GENERAL_CALL_ADDRESS {
        Err(AddressError::GeneralCall)
    } else if address > MAX_ADDRESS {
        Err(AddressError::OutOfRange(address))
    } else {
        Ok(address)
    }
}

/// Bit-rate prescaler selected by the two low bits of the status register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Prescaler {
    Div1 = 0,
    Div4 = 1,
    Div16 = 2,
    Div64 = 3,
}

impl Prescaler {
    #[must_use]
    pub const fn divisor(self) -> u32 {
        match self {
            Prescaler::Div1 => 1,
            Prescaler::Div4 => 4,
            Prescaler::Div16 => 16,
            Prescaler::Div64 => 64,
        }
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

pub struct MasterConfig {
    pub bit_rate: u8,
    pub prescaler: Prescaler,
    pub pull_ups: bool,
}

impl MasterConfig {
    /// Resulting SCL frequency: `cpu / (16 + 2 * bit_rate * prescaler)`.
    #[must_use]
    pub fn scl_frequency(&self, cpu_clock: HertzU32) -> HertzU32 {
        let divider = 16 + 2 * u32::from(self.bit_rate) * self.prescaler.divisor();
        HertzU32::from_raw(cpu_clock.raw() / divider)
    }
}

pub struct MasterConfigBuilder {
    bit_rate: u8,
    prescaler: Prescaler,
    pull_ups: bool,
}

impl Default for MasterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MasterConfigBuilder {
    /// Slowest clock the controller supports, with internal pull-ups on.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bit_rate: 255,
            prescaler: Prescaler::Div64,
            pull_ups: true,
        }
    }
    #[must_use]
    pub fn bit_rate(mut self, bit_rate: u8) -> Self {
        self.bit_rate = bit_rate;
        self
    }
    #[must_use]
    pub fn prescaler(mut self, prescaler: Prescaler) -> Self {
        self.prescaler = prescaler;
        self
    }
    #[must_use]
    pub fn pull_ups(mut self, enabled: bool) -> Self {
        self.pull_ups = enabled;
        self
    }
    #[must_use]
    pub fn build(self) -> MasterConfig {
        MasterConfig {
            bit_rate: self.bit_rate,
            prescaler: self.prescaler,
            pull_ups: self.pull_ups,
        }
    }
}
