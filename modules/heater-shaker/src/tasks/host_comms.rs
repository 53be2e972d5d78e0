//! Host-comms task: the stateful reply formatter.
//!
//! Owns the one ack cache this module needs (every dispatched gcode goes
//! through it, whatever task ends up handling it), runs the parser, and
//! writes ASCII reply lines into a caller-provided transmit buffer. This is
//! the Rust shape of `host_comms_task.hpp` plus its reply-formatting
//! contract.

use core::fmt::Write as _;

use ack_cache::AckCache;
use gcode::GroupResult;
use module_errors::{ErrorCode, LineWriter};
use ringbuf::{ringbuf, ringbuf_entry};

use crate::aggregator::{RoutedMessage, Tasks};
use crate::gcode::{DeactivateAll, EnterBootloader, HeaterShakerGcode};
use crate::messages::{
    AcknowledgePrevious, AsyncError, DeviceInfoResponse, ForceUsbDisconnect, GetRpmResponse,
    GetTemperatureResponse, HeaterMessage, HostCommsMessage, IncomingBytes, MotorMessage,
    SystemMessage,
};

/// How many dispatched gcodes this module tracks while awaiting a response.
/// Small and fixed: a fixed-size array is mandatory on this target.
pub const ACK_CACHE_CAPACITY: usize = 8;

/// Upper bound on any single formatted reply line. Matches the original's
/// `messages::RESPONSE_LENGTH`.
const RESPONSE_SCRATCH_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Trace {
    Dispatched(&'static str),
    CacheFull,
    QueueFull,
    UnhandledGcode,
    BadAck,
    TxOverrun,
    None,
}
ringbuf!(TRACE, Trace, 16, Trace::None);

pub struct HostCommsTask {
    ack_cache: AckCache<HeaterShakerGcode, ACK_CACHE_CAPACITY>,
    may_connect: bool,
}

impl HostCommsTask {
    pub const fn new() -> Self {
        Self {
            ack_cache: AckCache::new(),
            may_connect: true,
        }
    }

    pub fn may_connect(&self) -> bool {
        self.may_connect
    }

    /// Blocks on `mailbox` for the next message and handles it, writing any
    /// reply into `tx`. Returns the number of bytes written.
    pub fn run_once(
        &mut self,
        mailbox: &queue_aggregator::Mailbox<HostCommsMessage, { crate::aggregator::MAILBOX_DEPTH }>,
        tasks: &Tasks,
        tx: &mut [u8],
    ) -> usize {
        let message = mailbox.recv();
        self.handle_message(message, tasks, tx)
    }

    /// Handles one message directly, without needing a live thread per
    /// task; an end-to-end test can drive this synchronously.
    pub fn handle_message(&mut self, message: HostCommsMessage, tasks: &Tasks, tx: &mut [u8]) -> usize {
        match message {
            HostCommsMessage::IncomingBytes(incoming) => self.handle_incoming(&incoming, tasks, tx),
            HostCommsMessage::AcknowledgePrevious(ack) => self.handle_ack(ack, tx),
            HostCommsMessage::GetTemperatureResponse(r) => self.handle_get_temperature(r, tx),
            HostCommsMessage::GetRpmResponse(r) => self.handle_get_rpm(r, tx),
            HostCommsMessage::DeviceInfoResponse(r) => self.handle_device_info(r, tx),
            HostCommsMessage::AsyncError(AsyncError { code }) => {
                let mut written = 0;
                emit(tx, &mut written, |buf| code.write_line(buf));
                written
            }
            HostCommsMessage::ForceUsbDisconnect(msg) => self.handle_force_disconnect(msg, tasks),
        }
    }

    fn handle_incoming(&mut self, incoming: &IncomingBytes, tasks: &Tasks, tx: &mut [u8]) -> usize {
        let bytes = incoming.buffer.as_slice();
        if !bytes.contains(&b'\n') && !bytes.contains(&b'\r') {
            return 0;
        }

        let mut input = bytes;
        let mut written = 0usize;
        loop {
            let (result, rest) = HeaterShakerGcode::parse_available(input);
            input = rest;
            match result {
                GroupResult::None => break,
                GroupResult::Error(_) => {
                    ringbuf_entry!(TRACE, Trace::UnhandledGcode);
                    emit(tx, &mut written, |buf| ErrorCode::UnhandledGcode.write_line(buf));
                    break;
                }
                GroupResult::Gcode(cmd) => {
                    if let Err(code) = self.dispatch(cmd, tasks) {
                        if !emit(tx, &mut written, |buf| code.write_line(buf)) {
                            break;
                        }
                    }
                }
            }
            if input.is_empty() {
                break;
            }
        }
        written
    }

    fn dispatch(&mut self, cmd: HeaterShakerGcode, tasks: &Tasks) -> Result<(), ErrorCode> {
        match cmd {
            HeaterShakerGcode::SetRpm(set) => {
                let id = self.ack_cache.add(cmd);
                if id == 0 {
                    ringbuf_entry!(TRACE, Trace::CacheFull);
                    return Err(ErrorCode::GcodeCacheFull);
                }
                if !tasks.motor.try_send(MotorMessage::SetRpm { id, rpm: set.rpm }) {
                    self.ack_cache.remove_if_present(id);
                    ringbuf_entry!(TRACE, Trace::QueueFull);
                    return Err(ErrorCode::InternalQueueFull);
                }
                ringbuf_entry!(TRACE, Trace::Dispatched("M3"));
                Ok(())
            }
            HeaterShakerGcode::GetRpm(_) => {
                let id = self.ack_cache.add(cmd);
                if id == 0 {
                    return Err(ErrorCode::GcodeCacheFull);
                }
                if !tasks.motor.try_send(MotorMessage::GetRpm { id }) {
                    self.ack_cache.remove_if_present(id);
                    return Err(ErrorCode::InternalQueueFull);
                }
                Ok(())
            }
            HeaterShakerGcode::SetTemperature(set) => {
                let id = self.ack_cache.add(cmd);
                if id == 0 {
                    return Err(ErrorCode::GcodeCacheFull);
                }
                if !tasks.heater.try_send(HeaterMessage::SetTemperature {
                    id,
                    target: set.temperature,
                    hold_seconds: set.hold_seconds,
                }) {
                    self.ack_cache.remove_if_present(id);
                    return Err(ErrorCode::InternalQueueFull);
                }
                Ok(())
            }
            HeaterShakerGcode::GetTemperature(_) => {
                let id = self.ack_cache.add(cmd);
                if id == 0 {
                    return Err(ErrorCode::GcodeCacheFull);
                }
                if !tasks.heater.try_send(HeaterMessage::GetTemperature { id }) {
                    self.ack_cache.remove_if_present(id);
                    return Err(ErrorCode::InternalQueueFull);
                }
                Ok(())
            }
            HeaterShakerGcode::DeactivateAll(DeactivateAll) => {
                let id = self.ack_cache.add(cmd);
                if id == 0 {
                    return Err(ErrorCode::GcodeCacheFull);
                }
                if !tasks.motor.try_send(MotorMessage::Deactivate { id }) {
                    self.ack_cache.remove_if_present(id);
                    return Err(ErrorCode::InternalQueueFull);
                }
                // The heater side of a combined deactivate doesn't hold up
                // the single ack; it's fired with id 0 ("no one is waiting").
                let _ = tasks.heater.try_send(HeaterMessage::Deactivate { id: 0 });
                Ok(())
            }
            HeaterShakerGcode::DeviceInfo(_) => {
                let id = self.ack_cache.add(cmd);
                if id == 0 {
                    return Err(ErrorCode::GcodeCacheFull);
                }
                if !tasks.system.try_send(SystemMessage::GetDeviceInfo { id }) {
                    self.ack_cache.remove_if_present(id);
                    return Err(ErrorCode::InternalQueueFull);
                }
                Ok(())
            }
            HeaterShakerGcode::SetSerialNumber(set) => {
                let id = self.ack_cache.add(cmd);
                if id == 0 {
                    return Err(ErrorCode::GcodeCacheFull);
                }
                if !tasks.system.try_send(SystemMessage::SetSerialNumber {
                    id,
                    serial: set.serial,
                }) {
                    self.ack_cache.remove_if_present(id);
                    return Err(ErrorCode::InternalQueueFull);
                }
                Ok(())
            }
            HeaterShakerGcode::EnterBootloader(EnterBootloader) => {
                let id = self.ack_cache.add(cmd);
                if id == 0 {
                    return Err(ErrorCode::GcodeCacheFull);
                }
                if !tasks.system.try_send(SystemMessage::EnterBootloader { id }) {
                    self.ack_cache.remove_if_present(id);
                    return Err(ErrorCode::InternalQueueFull);
                }
                Ok(())
            }
        }
    }

    fn handle_ack(&mut self, ack: AcknowledgePrevious, tx: &mut [u8]) -> usize {
        let mut written = 0;
        match self.ack_cache.remove_if_present(ack.responding_to_id) {
            None => {
                ringbuf_entry!(TRACE, Trace::BadAck);
                emit(tx, &mut written, |buf| {
                    ErrorCode::BadMessageAcknowledgement.write_line(buf)
                });
            }
            Some(cmd) => {
                emit(tx, &mut written, |buf| {
                    if let Some(code) = ack.with_error {
                        code.write_line(buf)
                    } else {
                        write_simple_ack(buf, cmd)
                    }
                });
            }
        }
        written
    }

    fn handle_get_temperature(&mut self, r: GetTemperatureResponse, tx: &mut [u8]) -> usize {
        let mut written = 0;
        match self.ack_cache.remove_if_present(r.responding_to_id) {
            Some(HeaterShakerGcode::GetTemperature(_)) => {
                emit(tx, &mut written, |buf| {
                    let mut w = LineWriter::new(buf);
                    let _ = write!(
                        w,
                        "M105 T:{:.2} C:{:.2} H:{:.2} Total_H:{:.2} At_target?:{} OK\n",
                        r.set,
                        r.current,
                        r.remaining_seconds,
                        r.total_seconds,
                        u8::from(r.at_target)
                    );
                    w.written()
                });
            }
            _ => {
                emit(tx, &mut written, |buf| {
                    ErrorCode::BadMessageAcknowledgement.write_line(buf)
                });
            }
        }
        written
    }

    fn handle_get_rpm(&mut self, r: GetRpmResponse, tx: &mut [u8]) -> usize {
        let mut written = 0;
        match self.ack_cache.remove_if_present(r.responding_to_id) {
            Some(HeaterShakerGcode::GetRpm(_)) => {
                emit(tx, &mut written, |buf| {
                    let mut w = LineWriter::new(buf);
                    let _ = write!(w, "M123 C:{} S:{} OK\n", r.current, r.set);
                    w.written()
                });
            }
            _ => {
                emit(tx, &mut written, |buf| {
                    ErrorCode::BadMessageAcknowledgement.write_line(buf)
                });
            }
        }
        written
    }

    fn handle_device_info(&mut self, r: DeviceInfoResponse, tx: &mut [u8]) -> usize {
        let mut written = 0;
        match self.ack_cache.remove_if_present(r.responding_to_id) {
            Some(HeaterShakerGcode::DeviceInfo(_)) => {
                emit(tx, &mut written, |buf| {
                    let mut w = LineWriter::new(buf);
                    let serial = core::str::from_utf8(&r.serial_number).unwrap_or("?");
                    let _ = write!(
                        w,
                        "M115 FW:{} HW:{} SerialNo:{} OK\n",
                        r.firmware_version, r.hardware_version, serial
                    );
                    w.written()
                });
            }
            _ => {
                emit(tx, &mut written, |buf| {
                    ErrorCode::BadMessageAcknowledgement.write_line(buf)
                });
            }
        }
        written
    }

    fn handle_force_disconnect(&mut self, msg: ForceUsbDisconnect, tasks: &Tasks) -> usize {
        self.may_connect = false;
        let routed: RoutedMessage = SystemMessage::PrepAckReceived { with_error: None }.into();
        tasks.send_to_address(routed, msg.return_address);
        let _ = msg.responding_to_id;
        0
    }
}

impl Default for HostCommsTask {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats `cmd`'s plain `<PREFIX> OK\n` acknowledgement. Only reached for
/// gcodes that close with a bare ack rather than a typed response.
fn write_simple_ack(buf: &mut [u8], cmd: HeaterShakerGcode) -> usize {
    let prefix = match cmd {
        HeaterShakerGcode::SetRpm(_) => "M3",
        HeaterShakerGcode::SetTemperature(_) => "M104",
        HeaterShakerGcode::DeactivateAll(_) => "M18",
        HeaterShakerGcode::SetSerialNumber(_) => "M996",
        HeaterShakerGcode::EnterBootloader(_) => "dfu",
        // These close with a typed response instead; reaching here would be
        // a cache/response type mismatch, formatted as a bad-ack instead.
        HeaterShakerGcode::GetRpm(_)
        | HeaterShakerGcode::GetTemperature(_)
        | HeaterShakerGcode::DeviceInfo(_) => {
            return ErrorCode::BadMessageAcknowledgement.write_line(buf)
        }
    };
    let mut w = LineWriter::new(buf);
    let _ = write!(w, "{} OK\n", prefix);
    w.written()
}

/// Formats `format` into a bounded scratch buffer, then copies it into
/// `tx[*written..]` if it fits; otherwise writes a (self-truncating)
/// `USB_TX_OVERRUN` line into whatever tx space remains and returns `false`
/// to tell the caller to stop processing further gcodes on this line.
fn emit(tx: &mut [u8], written: &mut usize, format: impl FnOnce(&mut [u8]) -> usize) -> bool {
    let mut scratch = [0u8; RESPONSE_SCRATCH_LEN];
    let len = format(&mut scratch);
    let remaining = tx.len().saturating_sub(*written);
    if len <= remaining {
        tx[*written..*written + len].copy_from_slice(&scratch[..len]);
        *written += len;
        true
    } else {
        ringbuf_entry!(TRACE, Trace::TxOverrun);
        let tail = &mut tx[*written..];
        let n = ErrorCode::UsbTxOverrun.write_line(tail);
        *written += n;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::IncomingBytes;
    use queue_aggregator::Mailbox;

    fn new_tasks() -> &'static Tasks {
        let tasks: &'static Tasks = Box::leak(Box::new(Tasks::new()));
        let host_comms: &'static Mailbox<HostCommsMessage, { crate::aggregator::MAILBOX_DEPTH }> =
            Box::leak(Box::new(Mailbox::new()));
        let heater: &'static Mailbox<HeaterMessage, { crate::aggregator::MAILBOX_DEPTH }> =
            Box::leak(Box::new(Mailbox::new()));
        let motor: &'static Mailbox<MotorMessage, { crate::aggregator::MAILBOX_DEPTH }> =
            Box::leak(Box::new(Mailbox::new()));
        let system: &'static Mailbox<SystemMessage, { crate::aggregator::MAILBOX_DEPTH }> =
            Box::leak(Box::new(Mailbox::new()));
        tasks.host_comms.register(host_comms);
        tasks.heater.register(heater);
        tasks.motor.register(motor);
        tasks.system.register(system);
        tasks
    }

    #[test]
    fn empty_line_leaves_tx_untouched() {
        let tasks = new_tasks();
        let mut task = HostCommsTask::new();
        let mut tx = [b'c'; 16];
        let written = task.handle_message(
            HostCommsMessage::IncomingBytes(IncomingBytes::from_slice(b"\n")),
            tasks,
            &mut tx,
        );
        assert_eq!(written, 0);
        assert_eq!(tx, [b'c'; 16]);
    }

    #[test]
    fn malformed_gcode_writes_unhandled_error() {
        let tasks = new_tasks();
        let mut task = HostCommsTask::new();
        let mut tx = [0u8; 64];
        let written = task.handle_message(
            HostCommsMessage::IncomingBytes(IncomingBytes::from_slice(b"aosjhdakljshd\n")),
            tasks,
            &mut tx,
        );
        assert_eq!(&tx[..written], b"ERR003:unhandled gcode\n");
    }

    #[test]
    fn set_rpm_round_trip() {
        let tasks = new_tasks();
        let mut task = HostCommsTask::new();
        let mut tx = [0u8; 64];
        let written = task.handle_message(
            HostCommsMessage::IncomingBytes(IncomingBytes::from_slice(b"M3 S3000\n")),
            tasks,
            &mut tx,
        );
        assert_eq!(written, 0);
        assert!(tasks.motor.has_message());

        let mut tx2 = [0u8; 16];
        let written2 = task.handle_message(
            HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious::ok(1)),
            tasks,
            &mut tx2,
        );
        assert_eq!(&tx2[..written2], b"M3 OK\n");
    }

    #[test]
    fn bad_ack_id_is_reported() {
        let tasks = new_tasks();
        let mut task = HostCommsTask::new();
        let mut tx = [0u8; 32];
        let written = task.handle_message(
            HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious::ok(99)),
            tasks,
            &mut tx,
        );
        assert!(tx[..written].starts_with(b"ERR005"));
    }

    #[test]
    fn get_temperature_round_trip() {
        let tasks = new_tasks();
        let mut task = HostCommsTask::new();
        let mut tx = [0u8; 64];
        task.handle_message(
            HostCommsMessage::IncomingBytes(IncomingBytes::from_slice(b"M105\n")),
            tasks,
            &mut tx,
        );
        assert!(tasks.heater.has_message());

        let mut tx2 = [0u8; 64];
        let written = task.handle_message(
            HostCommsMessage::GetTemperatureResponse(GetTemperatureResponse {
                responding_to_id: 1,
                current: 30.0,
                set: 35.0,
                remaining_seconds: 10.0,
                total_seconds: 15.0,
                at_target: true,
            }),
            tasks,
            &mut tx2,
        );
        assert_eq!(
            &tx2[..written],
            b"M105 T:35.00 C:30.00 H:10.00 Total_H:15.00 At_target?:1 OK\n"
        );
    }

    #[test]
    fn tx_overflow_writes_truncated_overrun_error() {
        let tasks = new_tasks();
        let mut task = HostCommsTask::new();
        let mut tx = [0u8; 64];
        task.handle_message(
            HostCommsMessage::IncomingBytes(IncomingBytes::from_slice(b"M105\n")),
            tasks,
            &mut tx,
        );

        let mut tiny = [0u8; 10];
        let written = task.handle_message(
            HostCommsMessage::GetTemperatureResponse(GetTemperatureResponse {
                responding_to_id: 1,
                current: 30.0,
                set: 35.0,
                remaining_seconds: 10.0,
                total_seconds: 15.0,
                at_target: true,
            }),
            tasks,
            &mut tiny,
        );
        assert_eq!(written, 10);
        assert_eq!(&tiny[..written], b"ERR001:tx ");
    }

    #[test]
    fn cache_full_reports_without_mutating_any_slot() {
        let tasks = new_tasks();
        let mut task = HostCommsTask::new();
        for _ in 0..ACK_CACHE_CAPACITY {
            let mut tx = [0u8; 16];
            task.handle_message(
                HostCommsMessage::IncomingBytes(IncomingBytes::from_slice(b"M123\n")),
                tasks,
                &mut tx,
            );
        }
        let mut tx = [0u8; 32];
        let written = task.handle_message(
            HostCommsMessage::IncomingBytes(IncomingBytes::from_slice(b"M123\n")),
            tasks,
            &mut tx,
        );
        assert!(tx[..written].starts_with(b"ERR002"));
    }
}
