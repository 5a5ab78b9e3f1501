// Licensed under the Apache-2.0 license

//! Master/slave loopback self test.
//!
//! A [`MasterEngine`] talks through [`LoopbackTwi`], a software controller
//! that clocks every bit phase into a [`SlaveEngine`] the way the slave's
//! shift-register peripheral would see it. This exercises both ends of the
//! wire protocol together without bus hardware. Results are reported over
//! the console.

use embedded_io::Write;

use crate::common::NoOpLogger;
use crate::i2c::common::{
    address_byte, Direction, MasterConfig, MasterConfigBuilder, StartSettle, TransferError,
    TwiControl, TwiStatus,
};
use crate::i2c::master::MasterEngine;
use crate::i2c::slave::{SlaveEngine, SlaveHandle, SlaveQueues};
use crate::i2c::traits::{EventWait, ShiftRegisterBus, TwiHardware};

const NODE_ADDRESS: u8 = 0x05;

/// Shift-register peripheral whose pins are driven by the loopback master.
#[derive(Default)]
pub struct SimulatedUsi {
    shift_register: u8,
    line_driven: bool,
    shift_enabled: bool,
}

impl SimulatedUsi {
    /// Level the slave puts on SDA for the next bit: the shift register's MSB
    /// when driving, otherwise the pull-up.
    fn sda_high(&self) -> bool {
        !self.line_driven || self.shift_register & 0x80 != 0
    }
}

impl ShiftRegisterBus for SimulatedUsi {
    fn init(&mut self) {
        self.line_driven = false;
        self.shift_enabled = false;
    }
    fn arm_shift(&mut self, _bits: u8) {}
    fn set_line_driven(&mut self, driven: bool) {
        self.line_driven = driven;
    }
    fn read_shift_register(&self) -> u8 {
        self.shift_register
    }
    fn write_shift_register(&mut self, byte: u8) {
        self.shift_register = byte;
    }
    fn listen_for_start(&mut self) {
        self.shift_enabled = false;
    }
    fn listen_for_shift(&mut self) {
        self.shift_enabled = true;
    }
    fn settle_start(&mut self) -> StartSettle {
        StartSettle::Transaction
    }
    fn clear_flags(&mut self) {}
}

/// The loopback runs every bus event synchronously, so there is nothing to
/// wait for.
struct BusyWait;

impl EventWait for BusyWait {
    fn wait_for_event(&mut self) {}
}

/// Master controller wired straight to one slave node.
pub struct LoopbackTwi<'q> {
    node: SlaveEngine<'q, SimulatedUsi>,
    data: u8,
    status: TwiStatus,
    in_transaction: bool,
    address_phase: bool,
    direction: Direction,
}

impl<'q> LoopbackTwi<'q> {
    pub fn new(node: SlaveEngine<'q, SimulatedUsi>) -> Self {
        Self {
            node,
            data: 0,
            status: TwiStatus::NO_INFO,
            in_transaction: false,
            address_phase: false,
            direction: Direction::Write,
        }
    }

    /// Deliver one shift-complete event if the node is listening for it.
    fn clock(&mut self, bits_on_wire: u8) {
        if self.node_listening() {
            // Whatever the slave drove is what it reads back; released lines
            // read what the master put on the wire.
            let usi = self.usi_mut();
            if !usi.line_driven {
                usi.shift_register = bits_on_wire;
            }
            self.node.on_shift_complete();
        }
    }

    fn node_listening(&mut self) -> bool {
        self.usi_mut().shift_enabled
    }

    fn usi_mut(&mut self) -> &mut SimulatedUsi {
        self.node.hal_mut()
    }

    fn slave_acked(&mut self) -> bool {
        let usi = self.usi_mut();
        usi.shift_enabled && !usi.sda_high()
    }

    fn transmit_byte(&mut self) {
        let byte = self.data;
        self.clock(byte);
        let acked = self.slave_acked();
        // ACK bit clocked.
        self.clock(u8::from(!acked));

        self.status = match (self.address_phase, self.direction, acked) {
            (true, Direction::Write, true) => TwiStatus::MT_SLA_ACK,
            (true, Direction::Write, false) => TwiStatus::MT_SLA_NACK,
            (true, Direction::Read, true) => TwiStatus::MR_SLA_ACK,
            (true, Direction::Read, false) => TwiStatus::MR_SLA_NACK,
            (false, _, true) => TwiStatus::MT_DATA_ACK,
            (false, _, false) => TwiStatus::MT_DATA_NACK,
        };
        self.address_phase = false;
    }

    fn receive_byte(&mut self, ack: bool) {
        let usi = self.usi_mut();
        let driving = usi.shift_enabled && usi.line_driven;
        self.data = if driving { usi.shift_register } else { 0xff };
        self.clock(self.data);
        self.clock(u8::from(!ack));
        self.status = if ack {
            TwiStatus::MR_DATA_ACK
        } else {
            TwiStatus::MR_DATA_NACK
        };
    }
}

impl TwiHardware for LoopbackTwi<'_> {
    fn init(&mut self, _config: &MasterConfig) {}

    fn issue(&mut self, control: TwiControl) {
        match control {
            TwiControl::Start => {
                self.node.on_start_condition();
                self.status = if self.in_transaction {
                    TwiStatus::REP_START
                } else {
                    TwiStatus::START
                };
                self.in_transaction = true;
                self.address_phase = true;
            }
            TwiControl::Transmit => {
                if self.address_phase {
                    self.direction = Direction::from_address_byte(self.data);
                }
                self.transmit_byte();
            }
            TwiControl::ReceiveAck => self.receive_byte(true),
            TwiControl::ReceiveNack => self.receive_byte(false),
            TwiControl::Stop => self.in_transaction = false,
        }
    }

    fn write_data(&mut self, byte: u8) {
        self.data = byte;
    }

    fn read_data(&self) -> u8 {
        self.data
    }

    fn is_complete(&self) -> bool {
        true
    }

    fn status(&self) -> TwiStatus {
        self.status
    }
}

fn master<'q>(
    queues: &'q SlaveQueues,
    address: u8,
) -> Option<MasterEngine<LoopbackTwi<'q>, NoOpLogger>> {
    let node = SlaveEngine::new(SimulatedUsi::default(), queues, address).ok()?;
    Some(MasterEngine::new(
        LoopbackTwi::new(node),
        MasterConfigBuilder::new().build(),
        NoOpLogger,
    ))
}

fn test_write_reaches_node() -> bool {
    let queues = SlaveQueues::new();
    let Some(mut master) = master(&queues, NODE_ADDRESS) else {
        return false;
    };
    if master.transmit(NODE_ADDRESS, &[0x01, 0x02, 0x03]).is_err() {
        return false;
    }
    let node = SlaveHandle::new(&queues, BusyWait);
    [0x01, 0x02, 0x03]
        .iter()
        .all(|&expected| node.char_available() && node.receive_char() == expected)
        && !node.char_available()
}

fn test_read_drains_node() -> bool {
    let queues = SlaveQueues::new();
    let Some(mut master) = master(&queues, NODE_ADDRESS) else {
        return false;
    };
    for byte in [0xc0, 0xff, 0xee] {
        queues.send_char(byte);
    }
    let mut buffer = [0u8; 3];
    master.receive(NODE_ADDRESS, &mut buffer).is_ok()
        && buffer == [0xc0, 0xff, 0xee]
        && queues.pending_tx() == 0
}

fn test_unaddressed_node_stays_silent() -> bool {
    let queues = SlaveQueues::new();
    let Some(mut master) = master(&queues, NODE_ADDRESS) else {
        return false;
    };
    let write = master.transmit(NODE_ADDRESS + 1, &[0xaa]);
    let read = master.receive(NODE_ADDRESS + 1, &mut [0u8; 1]);
    write == Err(TransferError::AddressNack)
        && read == Err(TransferError::AddressNack)
        && !queues.char_available()
}

fn test_general_call_is_received() -> bool {
    let queues = SlaveQueues::new();
    let Some(mut master) = master(&queues, NODE_ADDRESS) else {
        return false;
    };
    master.transmit(0x00, &[0x5a]).is_ok() && queues.receive_char() == 0x5a
}

fn test_full_node_nacks() -> bool {
    let queues = SlaveQueues::new();
    let Some(mut master) = master(&queues, NODE_ADDRESS) else {
        return false;
    };
    let mut payload = [0u8; 20];
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte = u8::try_from(i).unwrap_or(0);
    }
    let result = master.transmit(NODE_ADDRESS, &payload);

    let mut stored = 0usize;
    let mut in_order = true;
    while queues.char_available() {
        in_order &= usize::from(queues.receive_char()) == stored;
        stored += 1;
    }
    result == Err(TransferError::DataNack) && stored == 15 && in_order
}

fn test_address_byte_on_wire() -> bool {
    address_byte(NODE_ADDRESS, Direction::Read) == 0x0b
        && address_byte(NODE_ADDRESS, Direction::Write) == 0x0a
}

/// Run every loopback case, printing one line per case. Returns `true` if
/// all passed.
pub fn run_loopback_tests<W: Write>(console: &mut W) -> bool {
    let cases: [(&str, fn() -> bool); 6] = [
        ("address byte layout", test_address_byte_on_wire),
        ("write reaches node", test_write_reaches_node),
        ("read drains node", test_read_drains_node),
        ("unaddressed node stays silent", test_unaddressed_node_stays_silent),
        ("general call is received", test_general_call_is_received),
        ("full node NACKs", test_full_node_nacks),
    ];

    let _ = console.write_all(b"\r\n=== Bus Loopback Tests ===\r\n");
    let mut all_passed = true;
    for (name, case) in cases {
        let passed = case();
        all_passed &= passed;
        let _ = console.write_all(name.as_bytes());
        let _ = console.write_all(if passed { b"... PASSED\r\n" } else { b"... FAILED\r\n" });
    }
    all_passed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::testing::MemoryConsole;

    #[test]
    fn test_loopback_suite_passes() {
        let mut console = MemoryConsole::default();
        let passed = run_loopback_tests(&mut console);
        let text = console.text();
        assert!(passed, "{text}");
        assert_eq!(text.matches("PASSED").count(), 6);
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let queues = SlaveQueues::new();
        let mut master = master(&queues, NODE_ADDRESS).unwrap();

        master.transmit(NODE_ADDRESS, &[0x10, 0x20]).unwrap();
        // Node echoes what it received, inverted.
        while queues.char_available() {
            assert!(queues.send_char(!queues.receive_char()));
        }

        let mut reply = [0u8; 2];
        master.receive(NODE_ADDRESS, &mut reply).unwrap();
        assert_eq!(reply, [0xef, 0xdf]);
    }
}
