// Licensed under the Apache-2.0 license

//! Interrupt-driven two-wire slave built on a generic shift-register peripheral.
//!
//! There is no dedicated bus silicon on the sensor nodes: the protocol is
//! rebuilt from two hardware events, "start condition detected" and "shift
//! counter overflowed". The platform's interrupt vectors forward those events
//! to [`SlaveEngine::on_start_condition`] and [`SlaveEngine::on_shift_complete`].
//!
//! Received bytes and pending responses live in [`SlaveQueues`], a pair of
//! lock-free rings shared with the foreground command loop, which reaches
//! them through a [`SlaveHandle`]:
//!
//! | ring | producer              | consumer              |
//! |------|-----------------------|-----------------------|
//! | `rx` | interrupt (engine)    | foreground            |
//! | `tx` | foreground            | interrupt (engine)    |
//!
//! A full `rx` ring is reported to the master as a NACK. An empty `tx` ring
//! during a read releases the bus; the master sees the missing ACK.

use crate::i2c::common::{
    validate_own_address, AddressError, SlaveState, StartSettle, GENERAL_CALL_ADDRESS,
};
use crate::i2c::traits::{EventWait, ShiftRegisterBus};
use crate::ring_buffer::RingBuffer;

/// Default ring size. One slot is reserved, so 15 bytes fit.
pub const DEFAULT_QUEUE_SLOTS: usize = 16;

const BYTE_BITS: u8 = 8;
const ACK_BITS: u8 = 1;

/// Byte queues shared between the slave interrupt handler and the foreground.
///
/// Designed to live in a `static` so both contexts can reach it without a lock.
pub struct SlaveQueues<const N: usize = DEFAULT_QUEUE_SLOTS> {
    rx: RingBuffer<u8, N>,
    tx: RingBuffer<u8, N>,
}

impl<const N: usize> Default for SlaveQueues<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SlaveQueues<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rx: RingBuffer::new(),
            tx: RingBuffer::new(),
        }
    }

    /// Queue a response byte for the next master read. `false` when full.
    pub fn send_char(&self, byte: u8) -> bool {
        self.tx.push(byte)
    }

    #[must_use]
    pub fn char_available(&self) -> bool {
        self.rx.has_data()
    }

    /// Oldest received byte, or `0` once drained.
    pub fn receive_char(&self) -> u8 {
        self.rx.pop().unwrap_or(0)
    }

    #[must_use]
    pub fn pending_tx(&self) -> usize {
        self.tx.len()
    }
}

/// Foreground side of a slave node: the byte stream plus the CPU idle.
///
/// Never touches the peripheral, so it can run while the interrupt handler
/// owns the [`SlaveEngine`].
pub struct SlaveHandle<'q, W: EventWait, const N: usize = DEFAULT_QUEUE_SLOTS> {
    queues: &'q SlaveQueues<N>,
    waiter: W,
}

impl<'q, W: EventWait, const N: usize> SlaveHandle<'q, W, N> {
    pub fn new(queues: &'q SlaveQueues<N>, waiter: W) -> Self {
        Self { queues, waiter }
    }

    /// Queue a response byte for the next master read. `false` when full.
    pub fn send_char(&self, byte: u8) -> bool {
        self.queues.send_char(byte)
    }

    #[must_use]
    pub fn char_available(&self) -> bool {
        self.queues.char_available()
    }

    /// Oldest received byte, or `0` once drained.
    pub fn receive_char(&self) -> u8 {
        self.queues.receive_char()
    }

    /// Idle the CPU until the next bus event.
    ///
    /// Callers check [`char_available`](Self::char_available) first; sleeping
    /// with received data pending is a caller error.
    pub fn sleep(&mut self) {
        self.waiter.wait_for_event();
    }
}

/// Interrupt side of a slave node.
pub struct SlaveEngine<'q, H: ShiftRegisterBus, const N: usize = DEFAULT_QUEUE_SLOTS> {
    hal: H,
    queues: &'q SlaveQueues<N>,
    state: SlaveState,
    own_address: u8,
}

impl<'q, H: ShiftRegisterBus, const N: usize> SlaveEngine<'q, H, N> {
    /// Create an engine listening on `address`.
    ///
    /// # Errors
    ///
    /// Returns `AddressError` if `address` is `0` or above `0x7f`.
    pub fn new(hal: H, queues: &'q SlaveQueues<N>, address: u8) -> Result<Self, AddressError> {
        let mut engine = Self {
            hal,
            queues,
            state: SlaveState::WaitForStart,
            own_address: validate_own_address(address)?,
        };
        engine.initialize(address)?;
        Ok(engine)
    }

    /// (Re)configure the peripheral and restart the protocol machine at
    /// `WaitForStart`. Queued bytes are kept.
    ///
    /// # Errors
    ///
    /// Returns `AddressError` if `address` is `0` or above `0x7f`.
    pub fn initialize(&mut self, address: u8) -> Result<(), AddressError> {
        self.own_address = validate_own_address(address)?;
        self.hal.init();
        self.release_bus();
        Ok(())
    }

    /// Change the own address. The transaction in flight, if any, completes
    /// normally; the new address is matched from the next address phase.
    ///
    /// # Errors
    ///
    /// Returns `AddressError` if `address` is `0` or above `0x7f`.
    pub fn set_address(&mut self, address: u8) -> Result<(), AddressError> {
        self.own_address = validate_own_address(address)?;
        Ok(())
    }

    #[must_use]
    pub fn address(&self) -> u8 {
        self.own_address
    }

    #[must_use]
    pub fn state(&self) -> SlaveState {
        self.state
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    /// Direct peripheral access. Changing its registers mid-transaction
    /// desynchronizes the protocol machine.
    pub fn hal_mut(&mut self) -> &mut H {
        &mut self.hal
    }

    /// Start-condition event handler.
    pub fn on_start_condition(&mut self) {
        self.state = SlaveState::WaitForAddress;
        self.hal.set_line_driven(false);

        match self.hal.settle_start() {
            StartSettle::Transaction => self.hal.listen_for_shift(),
            StartSettle::Stop => {
                self.hal.listen_for_start();
                self.state = SlaveState::WaitForStart;
            }
        }

        self.hal.clear_flags();
        self.hal.arm_shift(BYTE_BITS);
    }

    /// Shift-counter overflow event handler.
    pub fn on_shift_complete(&mut self) {
        let byte = self.hal.read_shift_register();

        match self.state {
            SlaveState::WaitForAddress => {
                if self.is_addressed(byte) {
                    self.state = if byte & 1 == 1 {
                        SlaveState::SendData
                    } else {
                        SlaveState::SendAck
                    };
                    self.prepare_ack();
                } else {
                    self.release_bus();
                }
            }
            SlaveState::SendAck => {
                self.state = SlaveState::WaitForData;
                self.hal.set_line_driven(false);
                self.hal.arm_shift(BYTE_BITS);
            }
            SlaveState::WaitForData => {
                self.state = SlaveState::SendAck;
                if self.queues.rx.push(byte) {
                    self.prepare_ack();
                } else {
                    self.prepare_nack();
                }
            }
            SlaveState::WaitAck => {
                if byte != 0 {
                    // NACK: master wants no more data.
                    self.release_bus();
                } else {
                    self.send_next_byte();
                }
            }
            SlaveState::SendData => self.send_next_byte(),
            SlaveState::RequestAck => {
                self.state = SlaveState::WaitAck;
                self.hal.write_shift_register(0);
                self.hal.set_line_driven(false);
                self.hal.arm_shift(ACK_BITS);
            }
            SlaveState::WaitForStart => self.release_bus(),
        }
    }

    fn is_addressed(&self, byte: u8) -> bool {
        byte == GENERAL_CALL_ADDRESS || byte >> 1 == self.own_address
    }

    /// Shared by `SendData` and an acknowledged `WaitAck`: put the next
    /// queued byte on the wire, or let go of the bus when there is none.
    fn send_next_byte(&mut self) {
        match self.queues.tx.pop() {
            Some(byte) => {
                self.hal.write_shift_register(byte);
                self.hal.set_line_driven(true);
                self.hal.arm_shift(BYTE_BITS);
                self.state = SlaveState::RequestAck;
            }
            None => self.release_bus(),
        }
    }

    fn prepare_ack(&mut self) {
        self.hal.write_shift_register(0);
        self.hal.set_line_driven(true);
        self.hal.arm_shift(ACK_BITS);
    }

    fn prepare_nack(&mut self) {
        self.hal.set_line_driven(false);
        self.hal.arm_shift(ACK_BITS);
    }

    fn release_bus(&mut self) {
        self.hal.set_line_driven(false);
        self.hal.listen_for_start();
        self.hal.arm_shift(BYTE_BITS);
        self.state = SlaveState::WaitForStart;
    }
}
