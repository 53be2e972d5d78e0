//! Host-comms task: the stateful reply formatter.
//!
//! Owns the ack cache every dispatched gcode goes through, plus the small
//! dual-ack tracker `M18` needs: both the plate and the lid act on a
//! combined deactivate, but the host only ever gets one reply. This is the
//! Rust shape of `host_comms_task.hpp` plus its reply-formatting contract.

use core::fmt::Write as _;

use ack_cache::AckCache;
use gcode::GroupResult;
use module_errors::{ErrorCode, LineWriter};
use ringbuf::{ringbuf, ringbuf_entry};

use crate::aggregator::{RoutedMessage, Tasks};
use crate::gcode::ThermocyclerGcode;
use crate::messages::{
    AcknowledgePrevious, AsyncError, BoardRevisionResponse, DeactivateAck, DeactivateAllAckPartial,
    DeviceInfoResponse, ForceUsbDisconnect, GetPlateTemperatureResponse, HostCommsMessage,
    IncomingBytes, LidMessage, PlateMessage, SystemMessage,
};

pub const ACK_CACHE_CAPACITY: usize = 8;
const RESPONSE_SCRATCH_LEN: usize = 128;
/// `M18` is the only command in this module's vocabulary awaiting more than
/// one reply; two outstanding at once is already generous.
const DUAL_ACK_CAPACITY: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Trace {
    Dispatched(&'static str),
    CacheFull,
    QueueFull,
    UnhandledGcode,
    BadAck,
    TxOverrun,
    DeactivateAllPartial,
    DeactivateAllComplete,
    None,
}
ringbuf!(TRACE, Trace, 16, Trace::None);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingDeactivateAll {
    outer_id: u32,
    remaining: u8,
    error: Option<ErrorCode>,
}

enum DualAckOutcome {
    NotFound,
    Pending,
    Complete(Option<ErrorCode>),
}

struct DualAckTracker {
    slots: [Option<PendingDeactivateAll>; DUAL_ACK_CAPACITY],
}

impl DualAckTracker {
    const fn new() -> Self {
        Self {
            slots: [None; DUAL_ACK_CAPACITY],
        }
    }

    fn start(&mut self, outer_id: u32, expected: u8) -> bool {
        for slot in self.slots.iter_mut() {
            if slot.is_none() {
                *slot = Some(PendingDeactivateAll {
                    outer_id,
                    remaining: expected,
                    error: None,
                });
                return true;
            }
        }
        false
    }

    fn record(&mut self, outer_id: u32, with_error: Option<ErrorCode>) -> DualAckOutcome {
        for slot in self.slots.iter_mut() {
            if let Some(pending) = slot {
                if pending.outer_id == outer_id {
                    if with_error.is_some() {
                        pending.error = pending.error.or(with_error);
                    }
                    pending.remaining = pending.remaining.saturating_sub(1);
                    if pending.remaining == 0 {
                        let error = pending.error;
                        *slot = None;
                        return DualAckOutcome::Complete(error);
                    }
                    return DualAckOutcome::Pending;
                }
            }
        }
        DualAckOutcome::NotFound
    }
}

pub struct HostCommsTask {
    ack_cache: AckCache<ThermocyclerGcode, ACK_CACHE_CAPACITY>,
    dual_ack: DualAckTracker,
    may_connect: bool,
}

impl HostCommsTask {
    pub const fn new() -> Self {
        Self {
            ack_cache: AckCache::new(),
            dual_ack: DualAckTracker::new(),
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
            HostCommsMessage::DeactivateAllAckPartial(msg) => self.handle_deactivate_all_partial(msg, tx),
            HostCommsMessage::GetPlateTemperatureResponse(r) => self.handle_get_plate_temperature(r, tx),
            HostCommsMessage::DeviceInfoResponse(r) => self.handle_device_info(r, tx),
            HostCommsMessage::BoardRevisionResponse(r) => self.handle_board_revision(r, tx),
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
            let (result, rest) = ThermocyclerGcode::parse_available(input);
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

    fn dispatch(&mut self, cmd: ThermocyclerGcode, tasks: &Tasks) -> Result<(), ErrorCode> {
        match cmd {
            ThermocyclerGcode::SetPlateTemperature(set) => {
                let id = self.ack_cache.add(cmd);
                if id == 0 {
                    ringbuf_entry!(TRACE, Trace::CacheFull);
                    return Err(ErrorCode::GcodeCacheFull);
                }
                if !tasks.plate.try_send(PlateMessage::SetTemperature {
                    id,
                    target: set.temperature,
                    hold_seconds: set.hold_seconds,
                }) {
                    self.ack_cache.remove_if_present(id);
                    ringbuf_entry!(TRACE, Trace::QueueFull);
                    return Err(ErrorCode::InternalQueueFull);
                }
                ringbuf_entry!(TRACE, Trace::Dispatched("M104"));
                Ok(())
            }
            ThermocyclerGcode::GetPlateTemperature(_) => {
                let id = self.ack_cache.add(cmd);
                if id == 0 {
                    return Err(ErrorCode::GcodeCacheFull);
                }
                if !tasks.plate.try_send(PlateMessage::GetTemperature { id }) {
                    self.ack_cache.remove_if_present(id);
                    return Err(ErrorCode::InternalQueueFull);
                }
                Ok(())
            }
            ThermocyclerGcode::SetLidTemperature(set) => {
                let id = self.ack_cache.add(cmd);
                if id == 0 {
                    return Err(ErrorCode::GcodeCacheFull);
                }
                if !tasks.lid.try_send(LidMessage::SetTemperature {
                    id,
                    target: set.temperature,
                }) {
                    self.ack_cache.remove_if_present(id);
                    return Err(ErrorCode::InternalQueueFull);
                }
                Ok(())
            }
            ThermocyclerGcode::DeactivateLid(_) => {
                let id = self.ack_cache.add(cmd);
                if id == 0 {
                    return Err(ErrorCode::GcodeCacheFull);
                }
                if !tasks.lid.try_send(LidMessage::Deactivate(DeactivateAck::Single(id))) {
                    self.ack_cache.remove_if_present(id);
                    return Err(ErrorCode::InternalQueueFull);
                }
                Ok(())
            }
            ThermocyclerGcode::DeactivateAll(_) => {
                let id = self.ack_cache.add(cmd);
                if id == 0 {
                    return Err(ErrorCode::GcodeCacheFull);
                }
                let mut expected = 0u8;
                if tasks.plate.try_send(PlateMessage::Deactivate(DeactivateAck::Combined(id))) {
                    expected += 1;
                }
                if tasks.lid.try_send(LidMessage::Deactivate(DeactivateAck::Combined(id))) {
                    expected += 1;
                }
                if expected == 0 {
                    self.ack_cache.remove_if_present(id);
                    ringbuf_entry!(TRACE, Trace::QueueFull);
                    return Err(ErrorCode::InternalQueueFull);
                }
                self.dual_ack.start(id, expected);
                ringbuf_entry!(TRACE, Trace::Dispatched("M18"));
                Ok(())
            }
            ThermocyclerGcode::GetBoardRevision(_) => {
                let id = self.ack_cache.add(cmd);
                if id == 0 {
                    return Err(ErrorCode::GcodeCacheFull);
                }
                if !tasks.system.try_send(SystemMessage::GetBoardRevision { id }) {
                    self.ack_cache.remove_if_present(id);
                    return Err(ErrorCode::InternalQueueFull);
                }
                Ok(())
            }
            ThermocyclerGcode::DeviceInfo(_) => {
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
            ThermocyclerGcode::EnterBootloader(_) => {
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

    fn handle_deactivate_all_partial(&mut self, msg: DeactivateAllAckPartial, tx: &mut [u8]) -> usize {
        match self.dual_ack.record(msg.outer_id, msg.with_error) {
            DualAckOutcome::Pending => {
                ringbuf_entry!(TRACE, Trace::DeactivateAllPartial);
                0
            }
            DualAckOutcome::NotFound => 0,
            DualAckOutcome::Complete(error) => {
                ringbuf_entry!(TRACE, Trace::DeactivateAllComplete);
                let mut written = 0;
                match self.ack_cache.remove_if_present(msg.outer_id) {
                    Some(ThermocyclerGcode::DeactivateAll(_)) => {
                        emit(tx, &mut written, |buf| match error {
                            Some(code) => code.write_line(buf),
                            None => {
                                let mut w = LineWriter::new(buf);
                                let _ = write!(w, "M18 OK\n");
                                w.written()
                            }
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
        }
    }

    fn handle_get_plate_temperature(&mut self, r: GetPlateTemperatureResponse, tx: &mut [u8]) -> usize {
        let mut written = 0;
        match self.ack_cache.remove_if_present(r.responding_to_id) {
            Some(ThermocyclerGcode::GetPlateTemperature(_)) => {
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

    fn handle_device_info(&mut self, r: DeviceInfoResponse, tx: &mut [u8]) -> usize {
        let mut written = 0;
        match self.ack_cache.remove_if_present(r.responding_to_id) {
            Some(ThermocyclerGcode::DeviceInfo(_)) => {
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

    fn handle_board_revision(&mut self, r: BoardRevisionResponse, tx: &mut [u8]) -> usize {
        let mut written = 0;
        match self.ack_cache.remove_if_present(r.responding_to_id) {
            Some(ThermocyclerGcode::GetBoardRevision(_)) => {
                emit(tx, &mut written, |buf| {
                    let mut w = LineWriter::new(buf);
                    let _ = write!(w, "M900.D C:{} OK\n", r.code);
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

fn write_simple_ack(buf: &mut [u8], cmd: ThermocyclerGcode) -> usize {
    let prefix = match cmd {
        ThermocyclerGcode::SetPlateTemperature(_) => "M104",
        ThermocyclerGcode::SetLidTemperature(_) => "M140",
        ThermocyclerGcode::DeactivateLid(_) => "M108",
        ThermocyclerGcode::EnterBootloader(_) => "dfu",
        // These close with a typed response or the dual-ack path instead;
        // reaching here would be a cache/response type mismatch.
        ThermocyclerGcode::GetPlateTemperature(_)
        | ThermocyclerGcode::DeactivateAll(_)
        | ThermocyclerGcode::GetBoardRevision(_)
        | ThermocyclerGcode::DeviceInfo(_) => return ErrorCode::BadMessageAcknowledgement.write_line(buf),
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
