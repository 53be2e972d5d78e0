//! Shared error vocabulary and reply-line formatting for every module.
//!
//! Modeled on this tree's own driver-API crates (e.g.
//! `drv-i2c-api::ResponseCode`): a plain `#[repr(u32)]` enum with
//! doc-commented variants and `FromPrimitive` via `num-derive`, no
//! `thiserror`/`anyhow` for a wire-facing error enum -- this one gets
//! formatted straight into `ERRxxx:description` reply lines.

#![no_std]

pub mod line_writer;
pub mod serial_number;

use num_derive::FromPrimitive;

pub use line_writer::LineWriter;
pub use serial_number::SerialNumberStore;

/// Every fault a host-comms task can surface, either as the `with_error`
/// field closing an acknowledged request or as an unsolicited `ERR...`
/// line. The 00x family covers dispatch failures common to every module;
/// higher families are reserved per subsystem (3xx persistence, 4xx
/// thermal, 5xx motor).
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum ErrorCode {
    /// A reply would not fit in the caller's transmit buffer; truncated.
    UsbTxOverrun = 1,
    /// The ack cache for the owning task is full; the gcode was never
    /// dispatched.
    GcodeCacheFull = 2,
    /// The parser ran out of recognizers for a non-whitespace line.
    UnhandledGcode = 3,
    /// The worker task's mailbox was full; the ack-cache slot reserved for
    /// it has been rolled back.
    InternalQueueFull = 4,
    /// An `AcknowledgePrevious` arrived with an id not present in any ack
    /// cache (stale, fabricated, or already reaped).
    BadMessageAcknowledgement = 5,
    /// EEPROM access failed while persisting the serial number.
    SerialNumberHal = 302,
    /// The thermal plate is mid-operation and cannot accept a new command.
    ThermalPlateBusy = 401,
    /// A peltier element reported a drive fault.
    PeltierError = 402,
    /// The heatsink fan stalled or failed to spin up.
    HeatsinkFan = 403,
    /// The lid heater is mid-operation and cannot accept a new command.
    LidBusy = 404,
    /// A heater element reported a fault.
    HeaterError = 405,
    /// A thermistor read below its valid range.
    ThermistorOutOfRangeLow = 406,
    /// A thermistor read above its valid range.
    ThermistorOutOfRangeHigh = 407,
    /// The lid motor is mid-operation and cannot accept a new command.
    LidMotorBusy = 501,
    /// A long-running motor operation exceeded its check-cycle budget.
    MotorTimeout = 502,
    /// A motor driver reported a stall or fault condition.
    MotorStallError = 503,
    /// The lid is closed and the requested motion cannot proceed.
    LidClosed = 507,
}

impl ErrorCode {
    pub const fn code(self) -> u32 {
        self as u32
    }

    pub const fn description(self) -> &'static str {
        match self {
            ErrorCode::UsbTxOverrun => "tx buffer overrun",
            ErrorCode::GcodeCacheFull => "gcode cache full",
            ErrorCode::UnhandledGcode => "unhandled gcode",
            ErrorCode::InternalQueueFull => "internal queue full",
            ErrorCode::BadMessageAcknowledgement => "bad ack id",
            ErrorCode::SerialNumberHal => "serial number HAL failure",
            ErrorCode::ThermalPlateBusy => "thermal plate busy",
            ErrorCode::PeltierError => "peltier error",
            ErrorCode::HeatsinkFan => "heatsink fan error",
            ErrorCode::LidBusy => "lid busy",
            ErrorCode::HeaterError => "heater error",
            ErrorCode::ThermistorOutOfRangeLow => "thermistor out of range low",
            ErrorCode::ThermistorOutOfRangeHigh => "thermistor out of range high",
            ErrorCode::LidMotorBusy => "lid motor busy",
            ErrorCode::MotorTimeout => "motor timeout",
            ErrorCode::MotorStallError => "motor stall",
            ErrorCode::LidClosed => "lid closed",
        }
    }

    /// Formats `ERR<code>:<description>\n` into `buf`, truncating (never
    /// panicking, never writing past `buf.len()`) if it doesn't fit.
    /// Returns the number of bytes written.
    pub fn write_line(self, buf: &mut [u8]) -> usize {
        use core::fmt::Write as _;
        let mut writer = LineWriter::new(buf);
        let _ = write!(writer, "ERR{:03}:{}\n", self.code(), self.description());
        writer.written()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_line_formats_code_and_description() {
        let mut buf = [0u8; 64];
        let len = ErrorCode::UnhandledGcode.write_line(&mut buf);
        assert_eq!(&buf[..len], b"ERR003:unhandled gcode\n");
    }

    #[test]
    fn write_line_truncates_to_buffer_length() {
        let mut buf = [0u8; 10];
        let len = ErrorCode::UsbTxOverrun.write_line(&mut buf);
        assert_eq!(len, 10);
        assert_eq!(&buf[..len], b"ERR001:tx ");
    }

    #[test]
    fn from_primitive_round_trips() {
        use num_traits::FromPrimitive;
        assert_eq!(ErrorCode::from_u32(401), Some(ErrorCode::ThermalPlateBusy));
        assert_eq!(ErrorCode::from_u32(9999), None);
    }
}
