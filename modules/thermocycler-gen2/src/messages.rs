//! Per-task message variants routed through the aggregator.
//!
//! The plate and lid are separate thermal zones with separate mailboxes;
//! `M18` is the one command both of them act on, so [`DeactivateAck`] gives
//! each `Deactivate` message a way to say whether it should close a single
//! standalone request (`M108`, lid-only) or report into the combined
//! two-part ack `M18` is waiting on.

use arrayvec::ArrayVec;
use module_errors::ErrorCode;

pub const RX_BUFFER_LEN: usize = 256;

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

/// Whether a `Deactivate` message should close a single standalone request
/// or contribute one of the two partial acks `M18` is awaiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeactivateAck {
    Single(u32),
    Combined(u32),
}

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

/// Reports that one of the two tasks `M18` woke up has finished acting on
/// it. Host-comms tracks `outer_id` in its dual-ack tracker and replies
/// exactly once, after both have reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeactivateAllAckPartial {
    pub outer_id: u32,
    pub with_error: Option<ErrorCode>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GetPlateTemperatureResponse {
    pub responding_to_id: u32,
    pub current: f32,
    pub set: f32,
    pub remaining_seconds: f32,
    pub total_seconds: f32,
    pub at_target: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfoResponse {
    pub responding_to_id: u32,
    pub firmware_version: &'static str,
    pub hardware_version: &'static str,
    pub serial_number: [u8; module_errors::SERIAL_NUMBER_LEN],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardRevisionResponse {
    pub responding_to_id: u32,
    pub code: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncError {
    pub code: ErrorCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForceUsbDisconnect {
    pub responding_to_id: u32,
    pub return_address: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostCommsMessage {
    IncomingBytes(IncomingBytes),
    AcknowledgePrevious(AcknowledgePrevious),
    DeactivateAllAckPartial(DeactivateAllAckPartial),
    GetPlateTemperatureResponse(GetPlateTemperatureResponse),
    DeviceInfoResponse(DeviceInfoResponse),
    BoardRevisionResponse(BoardRevisionResponse),
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
impl From<DeactivateAllAckPartial> for HostCommsMessage {
    fn from(m: DeactivateAllAckPartial) -> Self {
        HostCommsMessage::DeactivateAllAckPartial(m)
    }
}
impl From<GetPlateTemperatureResponse> for HostCommsMessage {
    fn from(m: GetPlateTemperatureResponse) -> Self {
        HostCommsMessage::GetPlateTemperatureResponse(m)
    }
}
impl From<DeviceInfoResponse> for HostCommsMessage {
    fn from(m: DeviceInfoResponse) -> Self {
        HostCommsMessage::DeviceInfoResponse(m)
    }
}
impl From<BoardRevisionResponse> for HostCommsMessage {
    fn from(m: BoardRevisionResponse) -> Self {
        HostCommsMessage::BoardRevisionResponse(m)
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

/// What the plate task accepts. `M105` is plate-only in this module's
/// representative vocabulary, so only the plate carries
/// `GetTemperature`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlateMessage {
    SetTemperature {
        id: u32,
        target: f32,
        hold_seconds: Option<u32>,
    },
    GetTemperature {
        id: u32,
    },
    Deactivate(DeactivateAck),
    TemperatureReadingComplete {
        raw_adc: u16,
    },
    /// Bootloader-prep: kill the peltier/fan and report straight to the
    /// system task, bypassing the ack cache entirely.
    PrepareForShutdown,
}

/// What the lid task accepts. `M108` closes with a single standalone ack;
/// `M18` closes with the combined one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LidMessage {
    SetTemperature {
        id: u32,
        target: f32,
    },
    Deactivate(DeactivateAck),
    TemperatureReadingComplete {
        raw_adc: u16,
    },
    /// Bootloader-prep: kill the lid heater and report straight to the
    /// system task, bypassing the ack cache entirely.
    PrepareForShutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemMessage {
    GetDeviceInfo {
        id: u32,
    },
    GetBoardRevision {
        id: u32,
    },
    EnterBootloader {
        id: u32,
    },
    PrepAckReceived {
        with_error: Option<ErrorCode>,
    },
}
