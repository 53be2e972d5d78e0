//! Drives all three tasks together, synchronously. Homing is driven by repeatedly draining the
//! motor's own mailbox until it stops re-sending `CheckStatus` to itself.

use flex_stacker::aggregator::Tasks;
use flex_stacker::messages::{HostCommsMessage, IncomingBytes, MotorMessage, SystemMessage};
use flex_stacker::policy::{SimMotorPolicy, SimSystemPolicy};
use flex_stacker::{HostCommsTask, MotorTask, SystemTask};
use queue_aggregator::Mailbox;

struct Harness {
    tasks: &'static Tasks,
    motor_mailbox: &'static Mailbox<MotorMessage, 8>,
    system_mailbox: &'static Mailbox<SystemMessage, 8>,
    host_comms_mailbox: &'static Mailbox<HostCommsMessage, 8>,
    host_comms: HostCommsTask,
    motor: MotorTask<SimMotorPolicy>,
    system: SystemTask<SimSystemPolicy>,
}

impl Harness {
    fn new() -> Self {
        let tasks: &'static Tasks = Box::leak(Box::new(Tasks::new()));
        let host_comms_mailbox: &'static Mailbox<HostCommsMessage, 8> = Box::leak(Box::new(Mailbox::new()));
        let motor_mailbox: &'static Mailbox<MotorMessage, 8> = Box::leak(Box::new(Mailbox::new()));
        let system_mailbox: &'static Mailbox<SystemMessage, 8> = Box::leak(Box::new(Mailbox::new()));
        tasks.host_comms.register(host_comms_mailbox);
        tasks.motor.register(motor_mailbox);
        tasks.system.register(system_mailbox);

        Self {
            tasks,
            motor_mailbox,
            system_mailbox,
            host_comms_mailbox,
            host_comms: HostCommsTask::new(),
            motor: MotorTask::new(SimMotorPolicy::new()),
            system: SystemTask::new(SimSystemPolicy::new()),
        }
    }

    fn send_line(&mut self, line: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut tx = [0u8; 256];
        let written = self.host_comms.handle_message(
            HostCommsMessage::IncomingBytes(IncomingBytes::from_slice(line)),
            self.tasks,
            &mut tx,
        );
        out.extend_from_slice(&tx[..written]);
        out.extend_from_slice(&self.drain());
        out
    }

    fn drain(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let mut progressed = false;
            if self.motor_mailbox.has_message() {
                let message = self.motor_mailbox.recv();
                self.motor.handle_message(message, self.tasks);
                progressed = true;
            }
            if self.system_mailbox.has_message() {
                let message = self.system_mailbox.recv();
                self.system.handle_message(message, self.tasks);
                progressed = true;
            }
            if self.host_comms_mailbox.has_message() {
                let message = self.host_comms_mailbox.recv();
                let mut reply = [0u8; 256];
                let n = self.host_comms.handle_message(message, self.tasks, &mut reply);
                out.extend_from_slice(&reply[..n]);
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
        out
    }
}

#[test]
fn actuate_solenoid_acks_immediately() {
    let mut harness = Harness::new();
    assert_eq!(harness.send_line(b"G28.D\n"), b"G28.D OK\n");
}

#[test]
fn homing_completes_once_the_limit_switch_trips() {
    let mut harness = Harness::new();
    let reply = harness.send_line(b"G28\n");
    assert_eq!(reply, b"G28 OK\n");
    assert!(!harness.motor.is_homing());
}

#[test]
fn device_info_reports_firmware_and_hardware_version() {
    let mut harness = Harness::new();
    let reply = harness.send_line(b"M115\n");
    assert!(reply.starts_with(b"M115 FW:"));
    assert!(reply.windows(b"flex-stacker".len()).any(|w| w == b"flex-stacker"));
}

#[test]
fn empty_line_produces_no_reply() {
    let mut harness = Harness::new();
    assert!(harness.send_line(b"\n").is_empty());
}

#[test]
fn malformed_gcode_reports_unhandled_error() {
    let mut harness = Harness::new();
    assert_eq!(harness.send_line(b"aosjhdakljshd\n"), b"ERR003:unhandled gcode\n");
}

#[test]
fn dfu_acks_then_quiesces_the_motor_before_entering_the_bootloader() {
    let mut harness = Harness::new();
    assert_eq!(harness.send_line(b"dfu\n"), b"dfu OK\n");
    assert!(!harness.motor.is_homing());
    assert!(harness.system.policy().bootloader_entered);
}
