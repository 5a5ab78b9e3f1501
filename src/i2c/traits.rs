// Licensed under the Apache-2.0 license

//! # Two-Wire Hardware Abstraction Traits
//!
//! The bus engines never touch registers. Each role depends on one narrow
//! trait describing the primitive its silicon offers:
//!
//! ```text
//! ShiftRegisterBus (slave role, interrupt side)
//!     generic serializer: start detector, 4-bit edge counter, open-drain SDA
//! EventWait (slave role, foreground side)
//!     CPU idle until the next interrupt
//! TwiHardware (master role)
//!     dedicated two-wire controller: control register, data register,
//!     completion flag and status code
//! ```
//!
//! Porting to another chip means implementing one of these traits; the
//! protocol logic in [`crate::i2c::slave`] and [`crate::i2c::master`] stays
//! untouched. Unit tests substitute scripted implementations.

use crate::i2c::common::{MasterConfig, StartSettle, TwiControl, TwiStatus};

/// Register-level actions of a generic shift-register peripheral running in
/// two-wire mode.
///
/// The peripheral raises two events which the platform routes to
/// [`SlaveEngine::on_start_condition`] and [`SlaveEngine::on_shift_complete`].
/// Everything here is called from interrupt context and must not block,
/// except [`settle_start`](Self::settle_start) which performs the short
/// clock-stretch wait the protocol requires.
///
/// [`SlaveEngine::on_start_condition`]: crate::i2c::slave::SlaveEngine::on_start_condition
/// [`SlaveEngine::on_shift_complete`]: crate::i2c::slave::SlaveEngine::on_shift_complete
pub trait ShiftRegisterBus {
    /// Configure pins and the peripheral for two-wire mode: SCL and SDA
    /// released high, SCL driven by the peripheral, all event flags cleared.
    fn init(&mut self);

    /// Load the edge counter so a shift-complete event fires after `bits` bits.
    fn arm_shift(&mut self, bits: u8);

    /// Drive SDA from the shift register (`true`) or release it (`false`).
    fn set_line_driven(&mut self, driven: bool);

    fn read_shift_register(&self) -> u8;

    fn write_shift_register(&mut self, byte: u8);

    /// Enable only the start-condition event; shift completions are ignored
    /// until the next start.
    fn listen_for_start(&mut self);

    /// Enable start-condition and shift-complete events, holding SCL low on
    /// counter overflow until the engine has reacted.
    fn listen_for_shift(&mut self);

    /// Busy-wait after a start condition until SCL falls (a transaction
    /// begins) or SDA rises (it was a stop).
    fn settle_start(&mut self) -> StartSettle;

    /// Clear start, overflow and stop flags and reset the edge counter.
    fn clear_flags(&mut self);
}

/// Idle primitive for the foreground loop of a slave node.
///
/// Kept apart from [`ShiftRegisterBus`] because the interrupt handler owns the
/// peripheral while the foreground sleeps. Implementations must idle with
/// interrupts enabled, otherwise the bus event that should wake the CPU never
/// runs.
pub trait EventWait {
    /// Halt the CPU until the next interrupt has been serviced.
    fn wait_for_event(&mut self);
}

/// Blocking two-wire master controller with a status register handshake.
///
/// Every action except [`TwiControl::Stop`] ends with the completion flag
/// raised and a status code describing what happened on the bus.
pub trait TwiHardware {
    /// Program bit rate, prescaler and pin pull-ups, then enable the controller.
    fn init(&mut self, config: &MasterConfig);

    /// Clear the status register's stale state and issue `control`.
    fn issue(&mut self, control: TwiControl);

    fn write_data(&mut self, byte: u8);

    fn read_data(&self) -> u8;

    /// Completion flag of the last issued action.
    fn is_complete(&self) -> bool;

    fn status(&self) -> TwiStatus;
}
