//! Host-comms task: the stateful reply formatter.
//!
//! Owns the one ack cache this module needs (every dispatched gcode goes
//! through it, whatever task ends up handling it), runs the parser, and
//! writes ASCII reply lines into a caller-provided transmit buffer.

use core::fmt::Write as _;

use ack_cache::AckCache;
use gcode::GroupResult;
use module_errors::{ErrorCode, LineWriter};
use ringbuf::{ringbuf, ringbuf_entry};

use crate::aggregator::{RoutedMessage, Tasks};
use crate::gcode::FlexStackerGcode;
use crate::messages::{
    AcknowledgePrevious, AsyncError, DeviceInfoResponse, ForceUsbDisconnect, HostCommsMessage,
    IncomingBytes, MotorMessage, SystemMessage,
};

pub const ACK_CACHE_CAPACITY: usize = 8;
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
    ack_cache: AckCache<FlexStackerGcode, ACK_CACHE_CAPACITY>,
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

    pub fn run_once(
        &mut self,
        mailbox: &queue_aggregator::Mailbox<HostCommsMessage, { crate::aggregator::MAILBOX_DEPTH }>,
        tasks: &Tasks,
        tx: &mut [u8],
    ) -> usize {
        let message = mailbox.recv();
        self.handle_message(message, tasks, tx)
    }

    pub fn handle_message(&mut self, message: HostCommsMessage, tasks: &Tasks, tx: &mut [u8]) -> usize {
        match message {
            HostCommsMessage::IncomingBytes(incoming) => self.handle_incoming(&incoming, tasks, tx),
            HostCommsMessage::AcknowledgePrevious(ack) => self.handle_ack(ack, tx),
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
            let (result, rest) = FlexStackerGcode::parse_available(input);
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

    fn dispatch(&mut self, cmd: FlexStackerGcode, tasks: &Tasks) -> Result<(), ErrorCode> {
        match cmd {
            FlexStackerGcode::ActuateSolenoid(_) => {
                let id = self.ack_cache.add(cmd);
                if id == 0 {
                    ringbuf_entry!(TRACE, Trace::CacheFull);
                    return Err(ErrorCode::GcodeCacheFull);
                }
                if !tasks.motor.try_send(MotorMessage::ActuateSolenoid { id }) {
                    self.ack_cache.remove_if_present(id);
                    ringbuf_entry!(TRACE, Trace::QueueFull);
                    return Err(ErrorCode::InternalQueueFull);
                }
                ringbuf_entry!(TRACE, Trace::Dispatched("G28.D"));
                Ok(())
            }
            FlexStackerGcode::Home(_) => {
                let id = self.ack_cache.add(cmd);
                if id == 0 {
                    ringbuf_entry!(TRACE, Trace::CacheFull);
                    return Err(ErrorCode::GcodeCacheFull);
                }
                if !tasks.motor.try_send(MotorMessage::Home { id }) {
                    self.ack_cache.remove_if_present(id);
                    ringbuf_entry!(TRACE, Trace::QueueFull);
                    return Err(ErrorCode::InternalQueueFull);
                }
                ringbuf_entry!(TRACE, Trace::Dispatched("G28"));
                Ok(())
            }
            FlexStackerGcode::DeviceInfo(_) => {
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
            FlexStackerGcode::EnterBootloader(_) => {
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

    fn handle_device_info(&mut self, r: DeviceInfoResponse, tx: &mut [u8]) -> usize {
        let mut written = 0;
        match self.ack_cache.remove_if_present(r.responding_to_id) {
            Some(FlexStackerGcode::DeviceInfo(_)) => {
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

fn write_simple_ack(buf: &mut [u8], cmd: FlexStackerGcode) -> usize {
    let prefix = match cmd {
        FlexStackerGcode::ActuateSolenoid(_) => "G28.D",
        FlexStackerGcode::Home(_) => "G28",
        FlexStackerGcode::EnterBootloader(_) => "dfu",
        FlexStackerGcode::DeviceInfo(_) => {
            return ErrorCode::BadMessageAcknowledgement.write_line(buf)
        }
    };
    let mut w = LineWriter::new(buf);
    let _ = write!(w, "{} OK\n", prefix);
    w.written()
}

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
