//! Per-task message variants routed through the aggregator.
//!
//! Mirrors `messages.hpp` in the original, widened to carry
//! request/response correlation (a `responding_to_id` on every reply, an
//! optional error code on acks).
//! Every message is `'static` and `Copy`-ish (`IncomingBytes` aside, which
//! is merely `Clone`): mailboxes are `'static` storage and never borrow
//! from the task that enqueued them, so incoming USB bytes are copied into
//! a bounded buffer rather than referenced.

use arrayvec::ArrayVec;
use module_errors::ErrorCode;

/// Longest line host-comms will buffer from the USB ISR before handing it
/// to the parser. Generous relative to any single G-code in this module's
/// vocabulary.
pub const RX_BUFFER_LEN: usize = 256;

/// Bytes newly arrived from the USB CDC ISR, copied into a bounded buffer
/// so the message can sit in a `'static` mailbox like any other.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingBytes {
    pub buffer: ArrayVec<u8, RX_BUFFER_LEN>,
}

impl IncomingBytes {
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buffer = ArrayVec::new();
        let take = bytes.len().min(RX_BUFFER_LEN);
        buffer.try_extend_from_slice(&bytes[..take]).ok();
        Self { buffer }
    }
}

/// Closes an in-flight request with no payload of its own (`M3`, `M104`,
/// `M18`, `M996`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcknowledgePrevious {
    pub responding_to_id: u32,
    pub with_error: Option<ErrorCode>,
}

impl AcknowledgePrevious {
    pub fn ok(id: u32) -> Self {
        Self {
            responding_to_id: id,
            with_error: None,
        }
    }

    pub fn error(id: u32, code: ErrorCode) -> Self {
        Self {
            responding_to_id: id,
            with_error: Some(code),
        }
    }
}

/// Reply payload for `M105`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GetTemperatureResponse {
    pub responding_to_id: u32,
    pub current: f32,
    pub set: f32,
    pub remaining_seconds: f32,
    pub total_seconds: f32,
    pub at_target: bool,
}

/// Reply payload for `M123`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetRpmResponse {
    pub responding_to_id: u32,
    pub current: u32,
    pub set: u32,
}

/// Reply payload for `M115`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfoResponse {
    pub responding_to_id: u32,
    pub firmware_version: &'static str,
    pub hardware_version: &'static str,
    pub serial_number: [u8; module_errors::SERIAL_NUMBER_LEN],
}

/// An unsolicited fault, not tied to any particular request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncError {
    pub code: ErrorCode,
}

/// Bootloader entry handshake: "you may disconnect the host link now."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForceUsbDisconnect {
    pub responding_to_id: u32,
    pub return_address: usize,
}

/// Everything that can land in the host-comms task's mailbox.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommsMessage {
    IncomingBytes(IncomingBytes),
    AcknowledgePrevious(AcknowledgePrevious),
    GetTemperatureResponse(GetTemperatureResponse),
    GetRpmResponse(GetRpmResponse),
    DeviceInfoResponse(DeviceInfoResponse),
    AsyncError(AsyncError),
    ForceUsbDisconnect(ForceUsbDisconnect),
}

impl From<IncomingBytes> for HostCommsMessage {
    fn from(m: IncomingBytes) -> Self {
        HostCommsMessage::IncomingBytes(m)
    }
}
impl From<AcknowledgePrevious> for HostCommsMessage {
    fn from(m: AcknowledgePrevious) -> Self {
        HostCommsMessage::AcknowledgePrevious(m)
    }
}
impl From<GetTemperatureResponse> for HostCommsMessage {
    fn from(m: GetTemperatureResponse) -> Self {
        HostCommsMessage::GetTemperatureResponse(m)
    }
}
impl From<GetRpmResponse> for HostCommsMessage {
    fn from(m: GetRpmResponse) -> Self {
        HostCommsMessage::GetRpmResponse(m)
    }
}
impl From<DeviceInfoResponse> for HostCommsMessage {
    fn from(m: DeviceInfoResponse) -> Self {
        HostCommsMessage::DeviceInfoResponse(m)
    }
}
impl From<AsyncError> for HostCommsMessage {
    fn from(m: AsyncError) -> Self {
        HostCommsMessage::AsyncError(m)
    }
}
impl From<ForceUsbDisconnect> for HostCommsMessage {
    fn from(m: ForceUsbDisconnect) -> Self {
        HostCommsMessage::ForceUsbDisconnect(m)
    }
}

/// What the heater task accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeaterMessage {
    SetTemperature {
        id: u32,
        target: f32,
        hold_seconds: Option<u32>,
    },
    GetTemperature {
        id: u32,
    },
    Deactivate {
        id: u32,
    },
    /// Periodic ADC sample, pushed by the thermal policy's conversion step.
    TemperatureReadingComplete {
        raw_adc: u16,
    },
    /// Bootloader-prep: kill heater output and report straight to the
    /// system task, bypassing the host-comms ack cache entirely -- nothing
    /// the host sent is being closed out here.
    PrepareForShutdown,
}

/// What the motor task accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorMessage {
    SetRpm { id: u32, rpm: u32 },
    GetRpm { id: u32 },
    Deactivate { id: u32 },
    /// Self-addressed: "keep ramping toward the target, and ack once you
    /// arrive." Never sent by host-comms; the motor task re-sends this to
    /// its own mailbox until the ramp completes, instead of blocking in a
    /// handler.
    CheckStatus,
    /// Bootloader-prep: stop the motor and report straight to the system
    /// task, the same shutdown-quiesce step the heater task takes.
    PrepareForShutdown,
}

/// What the system task accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemMessage {
    GetDeviceInfo {
        id: u32,
    },
    SetSerialNumber {
        id: u32,
        serial: [u8; module_errors::SERIAL_NUMBER_LEN],
    },
    EnterBootloader {
        id: u32,
    },
    /// Self-addressed: one prep-shutdown step acknowledged.
    PrepAckReceived {
        with_error: Option<ErrorCode>,
    },
}
