// Licensed under the Apache-2.0 license

//! Serial console to two-wire bridge.
//!
//! The bridge node reads one command per line from its console and runs it
//! as a master transaction against the sensor nodes:
//!
//! ```text
//! r <hex address> <length>              read <length> bytes, print them in hex
//! c <hex address> <id> <tag> <param>    frame and send a telemetry command
//! ```
//!
//! Every executed command ends with `Result: <code>` where the code is the
//! master's numeric result (`0` success, `1` no start, `2` address NACK,
//! `3` data NACK). Lines are terminated by carriage return.
//!
//! The bridge owns the console, so the master's phase log cannot write to it
//! directly. Give the master a [`LogBuffer`](crate::common::LogBuffer) and the
//! bridge prints the buffered lines after every transfer, ahead of its result.

use core::fmt::Write as _;

use embedded_io::{Read, Write};
use heapless::{String, Vec};
use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::common::Logger;
use crate::i2c::common::{transfer_code, MAX_ADDRESS};
use crate::i2c::master::MasterEngine;
use crate::i2c::traits::TwiHardware;

/// Longest accepted command line, and longest read or frame.
pub const LINE_CAPACITY: usize = 32;
pub const FRAME_CAPACITY: usize = 32;

pub const BANNER: &str = "RS232 - TWI Bridge\n";

/// Command addressed to a sensor node. Little-endian on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct TelemetryCommand {
    pub id: u8,
    pub tag: u8,
    pub parameter: U16,
}

impl TelemetryCommand {
    #[must_use]
    pub fn new(id: u8, tag: u8, parameter: u16) -> Self {
        Self {
            id,
            tag,
            parameter: U16::new(parameter),
        }
    }

    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        Self::read_from_bytes(bytes).ok()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameOverflow;

/// Wraps a payload into the frame that goes on the bus. The framing layer
/// lives outside this crate; nodes without one use [`RawFrames`].
pub trait FrameEncoder {
    /// # Errors
    ///
    /// Returns `FrameOverflow` if the framed payload does not fit.
    fn encode(
        &mut self,
        payload: &[u8],
        frame: &mut Vec<u8, FRAME_CAPACITY>,
    ) -> Result<(), FrameOverflow>;
}

/// Sends the payload unframed.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawFrames;

impl FrameEncoder for RawFrames {
    fn encode(
        &mut self,
        payload: &[u8],
        frame: &mut Vec<u8, FRAME_CAPACITY>,
    ) -> Result<(), FrameOverflow> {
        frame.extend_from_slice(payload).map_err(|()| FrameOverflow)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Read { address: u8, length: usize },
    Telemetry { address: u8, command: TelemetryCommand },
    /// Unknown or reserved command letter; nothing happens.
    Ignored,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    MissingParameters,
    InvalidAddress,
    InvalidParameter,
    LengthTooLong,
}

impl ParseError {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            ParseError::MissingParameters => "Not enough parameters for command.\n",
            ParseError::InvalidAddress => "Invalid address.\n",
            ParseError::InvalidParameter => "Invalid parameter.\n",
            ParseError::LengthTooLong => "Length too long.\n",
        }
    }
}

fn parse_address(token: &str) -> Result<u8, ParseError> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    match u8::from_str_radix(digits, 16) {
        Ok(address) if address <= MAX_ADDRESS => Ok(address),
        _ => Err(ParseError::InvalidAddress),
    }
}

fn parse_number<T: core::str::FromStr>(token: &str) -> Result<T, ParseError> {
    token.parse().map_err(|_| ParseError::InvalidParameter)
}

/// Parse one console line.
///
/// # Errors
///
/// Returns a `ParseError` describing the first problem found.
pub fn parse_command(line: &str) -> Result<Command, ParseError> {
    let line = line.trim_start();
    let mut chars = line.chars();
    let Some(letter) = chars.next() else {
        return Ok(Command::Ignored);
    };
    let mut params = chars.as_str().split_whitespace();

    match letter {
        'r' => {
            let (Some(address), Some(length)) = (params.next(), params.next()) else {
                return Err(ParseError::MissingParameters);
            };
            let address = parse_address(address)?;
            let length: usize = parse_number(length)?;
            if length > LINE_CAPACITY {
                return Err(ParseError::LengthTooLong);
            }
            Ok(Command::Read { address, length })
        }
        'c' => {
            let (Some(address), Some(id), Some(tag), Some(parameter)) =
                (params.next(), params.next(), params.next(), params.next())
            else {
                return Err(ParseError::MissingParameters);
            };
            Ok(Command::Telemetry {
                address: parse_address(address)?,
                command: TelemetryCommand::new(
                    parse_number(id)?,
                    parse_number(tag)?,
                    parse_number(parameter)?,
                ),
            })
        }
        _ => Ok(Command::Ignored),
    }
}

/// Result of reading one console line.
#[derive(Debug, PartialEq, Eq)]
pub enum Line {
    Complete(String<LINE_CAPACITY>),
    TooLong,
    /// Console reached end of input.
    Closed,
}

pub struct Bridge<C, H, F, L>
where
    C: Read + Write,
    H: TwiHardware,
    F: FrameEncoder,
    L: Logger,
{
    console: C,
    master: MasterEngine<H, L>,
    framer: F,
}

impl<C, H, F, L> Bridge<C, H, F, L>
where
    C: Read + Write,
    H: TwiHardware,
    F: FrameEncoder,
    L: Logger,
{
    pub fn new(console: C, master: MasterEngine<H, L>, framer: F) -> Self {
        Self {
            console,
            master,
            framer,
        }
    }

    pub fn into_parts(self) -> (C, MasterEngine<H, L>, F) {
        (self.console, self.master, self.framer)
    }

    /// Print the banner, then serve commands until the console closes.
    ///
    /// # Errors
    ///
    /// Propagates console I/O errors.
    pub fn run(&mut self) -> Result<(), C::Error> {
        self.print(BANNER)?;
        while self.poll()? {}
        Ok(())
    }

    /// Read and execute one command. Returns `false` once the console closed.
    ///
    /// # Errors
    ///
    /// Propagates console I/O errors.
    pub fn poll(&mut self) -> Result<bool, C::Error> {
        match self.read_line()? {
            Line::Complete(line) => {
                self.execute(&line)?;
                Ok(true)
            }
            Line::TooLong => {
                self.print("Command too long!\n")?;
                Ok(true)
            }
            Line::Closed => Ok(false),
        }
    }

    /// Collect one line, echoing accepted characters. NUL bytes are skipped;
    /// characters past the capacity are dropped and the line reported too long.
    ///
    /// # Errors
    ///
    /// Propagates console I/O errors.
    pub fn read_line(&mut self) -> Result<Line, C::Error> {
        self.print("\n>> ")?;

        let mut bytes: Vec<u8, LINE_CAPACITY> = Vec::new();
        let mut overflow = false;
        loop {
            let mut byte = [0u8; 1];
            if self.console.read(&mut byte)? == 0 {
                return Ok(Line::Closed);
            }
            match byte {
                [b'\r'] => break,
                [0] => {}
                [b] => {
                    if bytes.push(b).is_ok() {
                        self.console.write_all(&[b])?;
                    } else {
                        overflow = true;
                    }
                }
            }
        }
        self.print("\n")?;

        if overflow || bytes.is_full() {
            return Ok(Line::TooLong);
        }
        // Non-UTF-8 input cannot form a command; treat it as empty.
        let text = String::from_utf8(bytes).unwrap_or_default();
        Ok(Line::Complete(text))
    }

    /// Parse and run one command line.
    ///
    /// # Errors
    ///
    /// Propagates console I/O errors.
    pub fn execute(&mut self, line: &str) -> Result<(), C::Error> {
        match parse_command(line) {
            Ok(Command::Read { address, length }) => self.read_from_node(address, length),
            Ok(Command::Telemetry { address, command }) => self.send_telemetry(address, command),
            Ok(Command::Ignored) => Ok(()),
            Err(e) => self.print(e.message()),
        }
    }

    fn read_from_node(&mut self, address: u8, length: usize) -> Result<(), C::Error> {
        let mut buffer = [0u8; LINE_CAPACITY];
        let received = buffer.get_mut(..length).unwrap_or_default();
        let result = self.master.receive(address, received);
        self.flush_log()?;

        if result.is_ok() {
            for &byte in received.iter() {
                self.print_hex(byte)?;
            }
        }
        self.print_result(transfer_code(&result))
    }

    fn send_telemetry(&mut self, address: u8, command: TelemetryCommand) -> Result<(), C::Error> {
        let mut frame: Vec<u8, FRAME_CAPACITY> = Vec::new();
        if self.framer.encode(command.as_bytes(), &mut frame).is_err() {
            return self.print("Frame too long.\n");
        }

        let result = self.master.transmit(address, &frame);
        self.flush_log()?;
        for &byte in frame.iter() {
            self.print_hex(byte)?;
        }
        self.print_result(transfer_code(&result))
    }

    fn print_hex(&mut self, byte: u8) -> Result<(), C::Error> {
        const HEX: &[u8; 16] = b"0123456789ABCDEF";
        let high = HEX.get(usize::from(byte >> 4)).copied().unwrap_or(b'?');
        let low = HEX.get(usize::from(byte & 0x0f)).copied().unwrap_or(b'?');
        self.console.write_all(&[high, low, b' '])
    }

    fn print_result(&mut self, code: u8) -> Result<(), C::Error> {
        let mut text: String<24> = String::new();
        // Cannot overflow: the longest message is 13 bytes.
        let _ = write!(text, "\nResult: {code}\n");
        self.print(&text)
    }

    /// Copy whatever the master logged during the last transfer to the
    /// console.
    fn flush_log(&mut self) -> Result<(), C::Error> {
        write_terminal(&mut self.console, self.master.logger.buffered())?;
        self.master.logger.clear_buffered();
        Ok(())
    }

    fn print(&mut self, text: &str) -> Result<(), C::Error> {
        write_terminal(&mut self.console, text.as_bytes())
    }
}

/// Write `bytes`, expanding `\n` to `\r\n` for terminal emulators.
fn write_terminal<W: Write>(console: &mut W, bytes: &[u8]) -> Result<(), W::Error> {
    for &byte in bytes {
        if byte == b'\n' {
            console.write_all(b"\r")?;
        }
        console.write_all(&[byte])?;
    }
    Ok(())
}
