//! Per-task message variants routed through the aggregator. One thermal
//! channel here, unlike thermocycler-gen2's plate+lid pair, so `M18` closes
//! with a single ordinary ack -- no dual-ack tracker needed.

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

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GetTemperatureResponse {
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
    GetTemperatureResponse(GetTemperatureResponse),
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

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThermalMessage {
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
    TemperatureReadingComplete {
        raw_adc: u16,
    },
    /// Bootloader-prep: kill the peltier/fan and report straight to the
    /// system task, bypassing the ack cache entirely.
    PrepareForShutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemMessage {
    GetDeviceInfo { id: u32 },
    SetSerialNumber { id: u32, serial: [u8; module_errors::SERIAL_NUMBER_LEN] },
    EnterBootloader { id: u32 },
    PrepAckReceived { with_error: Option<ErrorCode> },
}
