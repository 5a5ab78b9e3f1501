// Licensed under the Apache-2.0 license

//! Polling two-wire master on a dedicated controller.
//!
//! Each call runs a complete transaction and busy-waits on the controller's
//! completion flag after every phase. There is no timeout: a bus without
//! pull-ups or a wedged slave hangs the caller. A stop condition is issued on
//! every exit path, including failures, so the bus is left released.
//!
//! The engine also implements [`embedded_hal::i2c::I2c`] so off-the-shelf
//! device drivers can run on the bridge node.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{
    address_byte, Direction, MasterConfig, TransferError, TwiControl, TwiStatus, MAX_ADDRESS,
};
use crate::i2c::traits::TwiHardware;
use embedded_hal::i2c::{Operation, SevenBitAddress};

pub struct MasterEngine<H: TwiHardware, L: Logger = NoOpLogger> {
    pub hardware: H,
    pub config: MasterConfig,
    pub logger: L,
}

impl<H: TwiHardware, L: Logger> MasterEngine<H, L> {
    pub fn new(mut hardware: H, config: MasterConfig, logger: L) -> Self {
        hardware.init(&config);
        Self {
            hardware,
            config,
            logger,
        }
    }

    /// Write `bytes` to the slave at `address`.
    ///
    /// # Errors
    ///
    /// - `InvalidAddress` if `address` is above `0x7f`; nothing goes on the bus
    /// - `StartNotSent` if the controller did not report a start condition
    /// - `AddressNack` if no slave acknowledged the address
    /// - `DataNack` on the first unacknowledged byte; remaining bytes are not sent
    pub fn transmit(&mut self, address: u8, bytes: &[u8]) -> Result<(), TransferError> {
        check_address(address)?;
        let result = self
            .begin(address, Direction::Write, false)
            .and_then(|()| self.write_bytes(bytes));
        self.stop();
        result
    }

    /// Fill `buffer` from the slave at `address`, ACKing every byte except
    /// the last.
    ///
    /// The status after the final (NACKed) byte is not checked.
    ///
    /// # Errors
    ///
    /// - `InvalidAddress` if `address` is above `0x7f`; nothing goes on the bus
    /// - `StartNotSent` if the controller did not report a start condition
    /// - `AddressNack` if no slave acknowledged the address
    /// - `DataNack` if a non-final byte did not arrive with an ACK status
    pub fn receive(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), TransferError> {
        check_address(address)?;
        let result = self
            .begin(address, Direction::Read, false)
            .and_then(|()| self.read_bytes(buffer, true));
        self.stop();
        result
    }

    fn run(&mut self, control: TwiControl) -> TwiStatus {
        self.hardware.issue(control);
        while !self.hardware.is_complete() {
            core::hint::spin_loop();
        }
        self.hardware.status()
    }

    /// Start (or repeated start) followed by the address phase.
    fn begin(
        &mut self,
        address: u8,
        direction: Direction,
        repeated: bool,
    ) -> Result<(), TransferError> {
        self.logger.debug("Sending Start..");
        let status = self.run(TwiControl::Start);
        let started = if repeated {
            status.is_start()
        } else {
            status == TwiStatus::START
        };
        if !started {
            self.logger.error("start condition not sent");
            return Err(TransferError::StartNotSent);
        }

        self.logger.debug("Sending Address..");
        self.hardware.write_data(address_byte(address, direction));
        let expected = match direction {
            Direction::Write => TwiStatus::MT_SLA_ACK,
            Direction::Read => TwiStatus::MR_SLA_ACK,
        };
        if self.run(TwiControl::Transmit) != expected {
            self.logger.error("address not acknowledged");
            return Err(TransferError::AddressNack);
        }
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransferError> {
        self.logger.debug("Sending Data..");
        for &byte in bytes {
            self.hardware.write_data(byte);
            if self.run(TwiControl::Transmit) != TwiStatus::MT_DATA_ACK {
                self.logger.error("data byte not acknowledged");
                return Err(TransferError::DataNack);
            }
        }
        Ok(())
    }

    /// Receive into `buffer`. With `nack_last` the final byte is answered
    /// with NACK to end the read; otherwise every byte is ACKed because more
    /// reads follow without a new address phase.
    fn read_bytes(&mut self, buffer: &mut [u8], nack_last: bool) -> Result<(), TransferError> {
        self.logger.debug("Getting Data..");
        let len = buffer.len();
        for (i, slot) in buffer.iter_mut().enumerate() {
            let control = if nack_last && i + 1 == len {
                TwiControl::ReceiveNack
            } else {
                TwiControl::ReceiveAck
            };
            let status = self.run(control);
            if control == TwiControl::ReceiveAck && status != TwiStatus::MR_DATA_ACK {
                self.logger.error("data byte not delivered");
                return Err(TransferError::DataNack);
            }
            *slot = self.hardware.read_data();
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.logger.debug("Sending Stop..");
        self.hardware.write_data(0);
        self.hardware.issue(TwiControl::Stop);
    }

    fn run_operations(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), TransferError> {
        let mut previous: Option<Direction> = None;

        for i in 0..operations.len() {
            let next_is_read = matches!(operations.get(i + 1), Some(Operation::Read(_)));
            let Some(operation) = operations.get_mut(i) else {
                break;
            };

            match operation {
                Operation::Read(buffer) => {
                    if previous != Some(Direction::Read) {
                        self.begin(address, Direction::Read, previous.is_some())?;
                    }
                    self.read_bytes(buffer, !next_is_read)?;
                    previous = Some(Direction::Read);
                }
                Operation::Write(bytes) => {
                    if previous != Some(Direction::Write) {
                        self.begin(address, Direction::Write, previous.is_some())?;
                    }
                    self.write_bytes(bytes)?;
                    previous = Some(Direction::Write);
                }
            }
        }
        Ok(())
    }
}

/// Shifting a wider value into the address byte would turn it into a
/// different address, possibly the general call.
fn check_address(address: u8) -> Result<(), TransferError> {
    if address > MAX_ADDRESS {
        Err(TransferError::InvalidAddress)
    } else {
        Ok(())
    }
}

impl<H: TwiHardware, L: Logger> embedded_hal::i2c::ErrorType for MasterEngine<H, L> {
    type Error = TransferError;
}

impl<H: TwiHardware, L: Logger> embedded_hal::i2c::I2c for MasterEngine<H, L> {
    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.receive(addr, buffer)
    }

    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        self.transmit(addr, bytes)
    }

    fn transaction(
        &mut self,
        addr: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        check_address(addr)?;
        if operations.is_empty() {
            return Ok(());
        }
        let result = self.run_operations(addr, operations);
        self.stop();
        result
    }
}
