//! System task: device info, the board revision probe, and the
//! bootloader-prep handshake.
//!
//! `dfu` is acked back to the host immediately, then this task fires one
//! prep-shutdown message at every worker with outputs to quiesce -- plate,
//! lid -- plus the existing host-comms disconnect handshake, and only calls
//! into the policy once all three have reported back. A prep step whose
//! `try_send` fails outright counts as already quiesced, so a single dropped
//! send can't hang bootloader entry forever, the same contract
//! heater-shaker's heater/motor pair and tempdeck-gen3's single thermal zone
//! both honor.

use module_errors::ErrorCode;

use crate::aggregator::Tasks;
use crate::board_revision;
use crate::messages::{
    AcknowledgePrevious, AsyncError, BoardRevisionResponse, DeviceInfoResponse, ForceUsbDisconnect,
    HostCommsMessage, LidMessage, PlateMessage, SystemMessage,
};
use crate::policy::SystemPolicy;

const FIRMWARE_VERSION: &str = "0.1.0";
const HARDWARE_VERSION: &str = "thermocycler-gen2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trace {
    BootloaderPrepStarted,
    BootloaderEntered,
    BoardRevisionRead { code: u8 },
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
            SystemMessage::GetBoardRevision { id } => self.handle_get_board_revision(id, tasks),
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

    fn handle_get_board_revision(&self, id: u32, tasks: &Tasks) {
        let pins = self.policy.read_board_revision_pins();
        let revision = board_revision::detect(pins);
        let code = revision.code();
        ringbuf::ringbuf_entry!(TRACE, Trace::BoardRevisionRead { code });
        tasks
            .host_comms
            .try_send(HostCommsMessage::BoardRevisionResponse(BoardRevisionResponse {
                responding_to_id: id,
                code,
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
        if tasks.plate.try_send(PlateMessage::PrepareForShutdown) {
            pending += 1;
        }
        if tasks.lid.try_send(LidMessage::PrepareForShutdown) {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board_revision::TrinaryInput;
    use crate::policy::SimSystemPolicy;
    use queue_aggregator::Mailbox;

    fn leak_tasks() -> &'static Tasks {
        let tasks: &'static Tasks = Box::leak(Box::new(Tasks::new()));
        let host_comms: &'static Mailbox<HostCommsMessage, 8> = Box::leak(Box::new(Mailbox::new()));
        let plate: &'static Mailbox<crate::messages::PlateMessage, 8> = Box::leak(Box::new(Mailbox::new()));
        let lid: &'static Mailbox<crate::messages::LidMessage, 8> = Box::leak(Box::new(Mailbox::new()));
        let system: &'static Mailbox<SystemMessage, 8> = Box::leak(Box::new(Mailbox::new()));
        tasks.host_comms.register(host_comms);
        tasks.plate.register(plate);
        tasks.lid.register(lid);
        tasks.system.register(system);
        tasks
    }

    #[test]
    fn get_device_info_reports_the_stored_serial_number() {
        let tasks = leak_tasks();
        let mut policy = SimSystemPolicy::new();
        policy.write(*b"TC0123456789ABCDEFGHIJK").unwrap();
        let mut task = SystemTask::new(policy);
        task.handle_message(SystemMessage::GetDeviceInfo { id: 1 }, tasks);
        let HostCommsMessage::DeviceInfoResponse(response) = tasks.host_comms.recv() else {
            panic!("expected a DeviceInfoResponse");
        };
        assert_eq!(&response.serial_number, b"TC0123456789ABCDEFGHIJK");
    }

    #[test]
    fn board_revision_probe_reports_rev1_for_all_floating_pins() {
        let tasks = leak_tasks();
        let mut task = SystemTask::new(SimSystemPolicy::new());
        task.handle_message(SystemMessage::GetBoardRevision { id: 1 }, tasks);
        let HostCommsMessage::BoardRevisionResponse(response) = tasks.host_comms.recv() else {
            panic!("expected a BoardRevisionResponse");
        };
        assert_eq!(response.code, 1);
    }

    #[test]
    fn board_revision_probe_reports_rev2_for_all_pulldown_pins() {
        let tasks = leak_tasks();
        let mut policy = SimSystemPolicy::new();
        policy.board_rev_pins = [TrinaryInput::PullDown; 3];
        let mut task = SystemTask::new(policy);
        task.handle_message(SystemMessage::GetBoardRevision { id: 1 }, tasks);
        let HostCommsMessage::BoardRevisionResponse(response) = tasks.host_comms.recv() else {
            panic!("expected a BoardRevisionResponse");
        };
        assert_eq!(response.code, 2);
    }

    #[test]
    fn bootloader_entry_acks_immediately_then_waits_for_every_prep_step() {
        let tasks = leak_tasks();
        let mut task = SystemTask::new(SimSystemPolicy::new());
        task.handle_message(SystemMessage::EnterBootloader { id: 9 }, tasks);

        assert_eq!(
            tasks.host_comms.recv(),
            HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious::ok(9))
        );
        assert!(!task.policy.bootloader_entered);

        let HostCommsMessage::ForceUsbDisconnect(msg) = tasks.host_comms.recv() else {
            panic!("expected a ForceUsbDisconnect");
        };
        assert_eq!(msg.return_address, crate::aggregator::SYSTEM_ADDRESS);
        assert!(tasks.plate.has_message());
        assert!(tasks.lid.has_message());

        task.handle_message(SystemMessage::PrepAckReceived { with_error: None }, tasks);
        assert!(!task.policy.bootloader_entered);
        task.handle_message(SystemMessage::PrepAckReceived { with_error: None }, tasks);
        assert!(!task.policy.bootloader_entered);
        task.handle_message(SystemMessage::PrepAckReceived { with_error: None }, tasks);
        assert!(task.policy.bootloader_entered);
    }

    #[test]
    fn a_prep_error_is_forwarded_as_async_but_bootloader_entry_still_proceeds() {
        let tasks = leak_tasks();
        let mut task = SystemTask::new(SimSystemPolicy::new());
        task.handle_message(SystemMessage::EnterBootloader { id: 3 }, tasks);
        let _ = tasks.host_comms.recv(); // immediate ack
        let _ = tasks.host_comms.recv(); // ForceUsbDisconnect

        task.handle_message(
            SystemMessage::PrepAckReceived {
                with_error: Some(ErrorCode::PeltierError),
            },
            tasks,
        );
        task.handle_message(SystemMessage::PrepAckReceived { with_error: None }, tasks);
        assert!(!task.policy.bootloader_entered);
        task.handle_message(SystemMessage::PrepAckReceived { with_error: None }, tasks);

        assert!(task.policy.bootloader_entered);
        assert_eq!(
            tasks.host_comms.recv(),
            HostCommsMessage::AsyncError(AsyncError {
                code: ErrorCode::PeltierError
            })
        );
    }

    #[test]
    fn every_prep_send_failing_still_enters_the_bootloader() {
        let tasks: &'static Tasks = Box::leak(Box::new(Tasks::new()));
        let mut task = SystemTask::new(SimSystemPolicy::new());
        task.handle_message(SystemMessage::EnterBootloader { id: 1 }, tasks);
        assert!(task.policy.bootloader_entered);
    }
}
