//! Motor task: actuates the solenoid in one step, and homes the lead screw
//! against its limit switch as an explicit state machine driven by
//! self-addressed `CheckStatus` messages rather than a blocking poll loop.

use module_errors::ErrorCode;

use crate::aggregator::Tasks;
use crate::messages::{AcknowledgePrevious, HostCommsMessage, MotorMessage, SystemMessage};
use crate::policy::MotorPolicy;

/// Upper bound on `CheckStatus` ticks before a home is abandoned as timed
/// out. The simulated policy reaches the limit switch instantly once armed,
/// so tests never get close to this; it exists for the case where the
/// switch never trips.
const HOME_MAX_TICKS: u32 = 200;

/// Steps driven toward the limit switch. A representative constant; a real
/// deployment would size this from the lead screw's travel.
const HOME_STEPS: i32 = -4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trace {
    HomeStarted,
    HomeTick { ticks_remaining: u32 },
    HomeComplete,
    HomeTimedOut,
    Stalled,
    SolenoidActuated,
    None,
}
ringbuf::ringbuf!(TRACE, Trace, 16, Trace::None);

struct PendingHome {
    ack_id: u32,
    ticks_remaining: u32,
}

pub struct MotorTask<P> {
    policy: P,
    pending_home: Option<PendingHome>,
}

impl<P: MotorPolicy> MotorTask<P> {
    pub const fn new(policy: P) -> Self {
        Self {
            policy,
            pending_home: None,
        }
    }

    pub fn is_homing(&self) -> bool {
        self.pending_home.is_some()
    }

    pub fn handle_message(&mut self, message: MotorMessage, tasks: &Tasks) {
        match message {
            MotorMessage::ActuateSolenoid { id } => self.handle_actuate_solenoid(id, tasks),
            MotorMessage::Home { id } => self.handle_home(id, tasks),
            MotorMessage::CheckStatus => self.handle_check_status(tasks),
            MotorMessage::PrepareForShutdown => self.handle_prepare_for_shutdown(tasks),
        }
    }

    fn handle_prepare_for_shutdown(&mut self, tasks: &Tasks) {
        self.policy.stepper_stop();
        self.policy.solenoid_disengage();
        self.pending_home = None;
        tasks
            .system
            .try_send(SystemMessage::PrepAckReceived { with_error: None });
    }

    fn handle_actuate_solenoid(&mut self, id: u32, tasks: &Tasks) {
        self.policy.solenoid_engage();
        self.policy.solenoid_disengage();
        ringbuf::ringbuf_entry!(TRACE, Trace::SolenoidActuated);
        self.ack(id, None, tasks);
    }

    fn handle_home(&mut self, id: u32, tasks: &Tasks) {
        if self.pending_home.is_some() {
            self.ack(id, Some(ErrorCode::InternalQueueFull), tasks);
            return;
        }
        if self.policy.stepper_check_fault() {
            ringbuf::ringbuf_entry!(TRACE, Trace::Stalled);
            self.ack(id, Some(ErrorCode::MotorStallError), tasks);
            return;
        }
        self.policy.stepper_start(HOME_STEPS);
        self.pending_home = Some(PendingHome {
            ack_id: id,
            ticks_remaining: HOME_MAX_TICKS,
        });
        ringbuf::ringbuf_entry!(TRACE, Trace::HomeStarted);
        tasks.motor.try_send(MotorMessage::CheckStatus);
    }

    fn handle_check_status(&mut self, tasks: &Tasks) {
        let Some(home) = &mut self.pending_home else { return };

        if self.policy.stepper_check_fault() {
            let id = home.ack_id;
            self.pending_home = None;
            self.policy.stepper_stop();
            ringbuf::ringbuf_entry!(TRACE, Trace::Stalled);
            self.ack(id, Some(ErrorCode::MotorStallError), tasks);
            return;
        }

        if self.policy.limit_switch_read() {
            let id = home.ack_id;
            self.pending_home = None;
            self.policy.stepper_stop();
            ringbuf::ringbuf_entry!(TRACE, Trace::HomeComplete);
            self.ack(id, None, tasks);
            return;
        }

        if home.ticks_remaining == 0 {
            let id = home.ack_id;
            self.pending_home = None;
            self.policy.stepper_stop();
            ringbuf::ringbuf_entry!(TRACE, Trace::HomeTimedOut);
            self.ack(id, Some(ErrorCode::MotorTimeout), tasks);
            return;
        }

        home.ticks_remaining -= 1;
        ringbuf::ringbuf_entry!(
            TRACE,
            Trace::HomeTick {
                ticks_remaining: home.ticks_remaining
            }
        );
        tasks.motor.try_send(MotorMessage::CheckStatus);
    }

    fn ack(&self, id: u32, with_error: Option<ErrorCode>, tasks: &Tasks) {
        tasks
            .host_comms
            .try_send(HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious {
                responding_to_id: id,
                with_error,
            }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::SimMotorPolicy;
    use queue_aggregator::Mailbox;

    fn leak_tasks() -> &'static Tasks {
        let tasks: &'static Tasks = Box::leak(Box::new(Tasks::new()));
        let host_comms: &'static Mailbox<HostCommsMessage, 8> = Box::leak(Box::new(Mailbox::new()));
        let motor: &'static Mailbox<MotorMessage, 8> = Box::leak(Box::new(Mailbox::new()));
        tasks.host_comms.register(host_comms);
        tasks.motor.register(motor);
        tasks
    }

    #[test]
    fn actuate_solenoid_acks_in_one_step_without_a_pending_state() {
        let tasks = leak_tasks();
        let mut task = MotorTask::new(SimMotorPolicy::new());
        task.handle_message(MotorMessage::ActuateSolenoid { id: 1 }, tasks);
        assert!(!task.is_homing());
        assert!(!task.policy.solenoid_engaged);
        assert_eq!(
            tasks.host_comms.recv(),
            HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious::ok(1))
        );
    }

    #[test]
    fn home_completes_once_the_limit_switch_trips() {
        let tasks = leak_tasks();
        let mut task = MotorTask::new(SimMotorPolicy::new());
        task.handle_message(MotorMessage::Home { id: 7 }, tasks);
        assert!(task.is_homing());
        assert!(tasks.motor.has_message());

        let check = tasks.motor.recv();
        task.handle_message(check, tasks);
        assert!(!task.is_homing());
        assert_eq!(
            tasks.host_comms.recv(),
            HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious::ok(7))
        );
    }

    #[test]
    fn homing_while_already_homing_is_rejected() {
        let tasks = leak_tasks();
        let mut task = MotorTask::new(SimMotorPolicy::new());
        task.handle_message(MotorMessage::Home { id: 1 }, tasks);
        tasks.motor.recv();
        task.handle_message(MotorMessage::Home { id: 2 }, tasks);
        assert_eq!(
            tasks.host_comms.recv(),
            HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious::error(
                2,
                ErrorCode::InternalQueueFull
            ))
        );
    }

    #[test]
    fn stalled_motor_reports_fault_instead_of_homing() {
        let tasks = leak_tasks();
        let mut policy = SimMotorPolicy::new();
        policy.fault = true;
        let mut task = MotorTask::new(policy);
        task.handle_message(MotorMessage::Home { id: 1 }, tasks);
        assert!(!task.is_homing());
        assert_eq!(
            tasks.host_comms.recv(),
            HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious::error(
                1,
                ErrorCode::MotorStallError
            ))
        );
    }

    #[test]
    fn home_times_out_if_the_limit_switch_never_trips() {
        let tasks = leak_tasks();
        let mut task = MotorTask::new(SimMotorPolicy::never_trips());
        task.handle_message(MotorMessage::Home { id: 3 }, tasks);
        for _ in 0..=HOME_MAX_TICKS {
            if !tasks.motor.has_message() {
                break;
            }
            let check = tasks.motor.recv();
            task.handle_message(check, tasks);
        }
        assert!(!task.is_homing());
        assert_eq!(
            tasks.host_comms.recv(),
            HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious::error(
                3,
                ErrorCode::MotorTimeout
            ))
        );
    }
}
