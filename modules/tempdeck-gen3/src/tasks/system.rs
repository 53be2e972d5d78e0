//! System task: device info, serial number persistence, and the
//! bootloader-prep handshake.
//!
//! `dfu` is acked back to the host immediately, then this task fires a
//! prep-shutdown message at the thermal zone plus the existing host-comms
//! disconnect handshake, and only calls into the policy once both have
//! reported back. A prep step whose `try_send` fails outright counts as
//! already quiesced, so a single dropped send can't hang bootloader entry
//! forever -- the same contract heater-shaker's heater/motor pair and
//! thermocycler-gen2's plate/lid pair both honor.

use module_errors::ErrorCode;

use crate::aggregator::Tasks;
use crate::messages::{
    AcknowledgePrevious, AsyncError, DeviceInfoResponse, ForceUsbDisconnect, HostCommsMessage,
    SystemMessage, ThermalMessage,
};
use crate::policy::SystemPolicy;

const FIRMWARE_VERSION: &str = "0.1.0";
const HARDWARE_VERSION: &str = "tempdeck-gen3";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trace {
    SerialNumberWritten,
    SerialNumberWriteFailed,
    BootloaderPrepStarted,
    BootloaderEntered,
    None,
}
ringbuf::ringbuf!(TRACE, Trace, 16, Trace::None);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingBootloader {
    /// Number of prep-shutdown steps still to report in.
    pending: u8,
    /// First error reported by any prep step, if any.
    error: Option<ErrorCode>,
}

pub struct SystemTask<P> {
    policy: P,
    pending_bootloader: Option<PendingBootloader>,
}

impl<P: SystemPolicy> SystemTask<P> {
    pub const fn new(policy: P) -> Self {
        Self {
            policy,
            pending_bootloader: None,
        }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn handle_message(&mut self, message: SystemMessage, tasks: &Tasks) {
        match message {
            SystemMessage::GetDeviceInfo { id } => self.handle_get_device_info(id, tasks),
            SystemMessage::SetSerialNumber { id, serial } => {
                self.handle_set_serial_number(id, serial, tasks)
            }
            SystemMessage::EnterBootloader { id } => self.handle_enter_bootloader(id, tasks),
            SystemMessage::PrepAckReceived { with_error } => self.handle_prep_ack(with_error, tasks),
        }
    }

    fn handle_get_device_info(&self, id: u32, tasks: &Tasks) {
        let response = DeviceInfoResponse {
            responding_to_id: id,
            firmware_version: FIRMWARE_VERSION,
            hardware_version: HARDWARE_VERSION,
            serial_number: self.policy.read(),
        };
        tasks.host_comms.try_send(HostCommsMessage::DeviceInfoResponse(response));
    }

    fn handle_set_serial_number(
        &mut self,
        id: u32,
        serial: [u8; module_errors::SERIAL_NUMBER_LEN],
        tasks: &Tasks,
    ) {
        let with_error = match self.policy.write(serial) {
            Ok(()) => {
                ringbuf::ringbuf_entry!(TRACE, Trace::SerialNumberWritten);
                None
            }
            Err(code) => {
                ringbuf::ringbuf_entry!(TRACE, Trace::SerialNumberWriteFailed);
                Some(code)
            }
        };
        tasks
            .host_comms
            .try_send(HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious {
                responding_to_id: id,
                with_error,
            }));
    }

    fn handle_enter_bootloader(&mut self, id: u32, tasks: &Tasks) {
        if self.pending_bootloader.is_some() {
            return;
        }
        tasks
            .host_comms
            .try_send(HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious::ok(id)));
        ringbuf::ringbuf_entry!(TRACE, Trace::BootloaderPrepStarted);

        let mut pending = 0u8;
        if tasks.thermal.try_send(ThermalMessage::PrepareForShutdown) {
            pending += 1;
        }
        if tasks
            .host_comms
            .try_send(HostCommsMessage::ForceUsbDisconnect(ForceUsbDisconnect {
                responding_to_id: 0,
                return_address: crate::aggregator::SYSTEM_ADDRESS,
            }))
        {
            pending += 1;
        }

        if pending == 0 {
            self.enter_bootloader(tasks, None);
        } else {
            self.pending_bootloader = Some(PendingBootloader { pending, error: None });
        }
    }

    fn handle_prep_ack(&mut self, with_error: Option<ErrorCode>, tasks: &Tasks) {
        let Some(pending) = self.pending_bootloader.as_mut() else {
            return;
        };
        pending.pending = pending.pending.saturating_sub(1);
        if pending.error.is_none() {
            pending.error = with_error;
        }
        if pending.pending == 0 {
            let error = pending.error;
            self.pending_bootloader = None;
            self.enter_bootloader(tasks, error);
        }
    }

    fn enter_bootloader(&mut self, tasks: &Tasks, error: Option<ErrorCode>) {
        if let Some(code) = error {
            tasks.host_comms.try_send(HostCommsMessage::AsyncError(AsyncError { code }));
        }
        self.policy.enter_bootloader();
        ringbuf::ringbuf_entry!(TRACE, Trace::BootloaderEntered);
    }
}
