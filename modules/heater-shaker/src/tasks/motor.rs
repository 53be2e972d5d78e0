//! Motor task: ramps the shaker to a target RPM and answers `M3`/`M123`,
//! modeling the ramp as an explicit state machine driven by self-addressed
//! `CheckStatus` messages rather than a blocking sleep.

use crate::aggregator::Tasks;
use crate::messages::{
    AcknowledgePrevious, GetRpmResponse, HostCommsMessage, MotorMessage, SystemMessage,
};
use crate::policy::MotorPolicy;

/// How much the simulated RPM is allowed to change per `CheckStatus` tick.
/// A real driver would read an encoder; here it bounds how many ticks a
/// ramp takes so tests stay deterministic and fast.
const RPM_STEP_PER_TICK: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trace {
    Ramping { current: u32, target: u32 },
    Reached { rpm: u32 },
    Stalled,
    None,
}
ringbuf::ringbuf!(TRACE, Trace, 16, Trace::None);

struct PendingRamp {
    ack_id: u32,
    target_rpm: u32,
}

pub struct MotorTask<P> {
    policy: P,
    pending: Option<PendingRamp>,
}

impl<P: MotorPolicy> MotorTask<P> {
    pub const fn new(policy: P) -> Self {
        Self {
            policy,
            pending: None,
        }
    }

    pub fn is_ramping(&self) -> bool {
        self.pending.is_some()
    }

    /// Handles one message, sending any mailbox-bound side effects through
    /// `tasks`. For `SetRpm`, this may also enqueue a `CheckStatus` to its
    /// own mailbox to continue the ramp; the caller is expected to keep
    /// draining its own mailbox until it's empty, exactly like any other
    /// worker loop.
    pub fn handle_message(&mut self, message: MotorMessage, tasks: &Tasks) {
        match message {
            MotorMessage::SetRpm { id, rpm } => self.handle_set_rpm(id, rpm, tasks),
            MotorMessage::GetRpm { id } => self.handle_get_rpm(id, tasks),
            MotorMessage::Deactivate { id } => self.handle_deactivate(id, tasks),
            MotorMessage::CheckStatus => self.handle_check_status(tasks),
            MotorMessage::PrepareForShutdown => self.handle_prepare_for_shutdown(tasks),
        }
    }

    fn handle_set_rpm(&mut self, id: u32, rpm: u32, tasks: &Tasks) {
        if self.policy.check_fault() {
            ringbuf::ringbuf_entry!(TRACE, Trace::Stalled);
            self.ack(id, Some(module_errors::ErrorCode::MotorStallError), tasks);
            return;
        }
        self.policy.set_target_rpm(rpm);
        self.pending = Some(PendingRamp {
            ack_id: id,
            target_rpm: rpm,
        });
        tasks.motor.try_send(MotorMessage::CheckStatus);
    }

    fn handle_check_status(&mut self, tasks: &Tasks) {
        let Some(ramp) = &self.pending else { return };
        if self.policy.check_fault() {
            let id = ramp.ack_id;
            self.pending = None;
            ringbuf::ringbuf_entry!(TRACE, Trace::Stalled);
            self.ack(id, Some(module_errors::ErrorCode::MotorStallError), tasks);
            return;
        }

        let current = self.policy.get_current_rpm();
        let target = ramp.target_rpm;
        if current == target {
            let id = ramp.ack_id;
            self.pending = None;
            ringbuf::ringbuf_entry!(TRACE, Trace::Reached { rpm: current });
            self.ack(id, None, tasks);
            return;
        }

        ringbuf::ringbuf_entry!(TRACE, Trace::Ramping { current, target });
        let next = step_toward(current, target, RPM_STEP_PER_TICK);
        self.policy.set_target_rpm(next);
        tasks.motor.try_send(MotorMessage::CheckStatus);
    }

    fn handle_get_rpm(&self, id: u32, tasks: &Tasks) {
        let response = GetRpmResponse {
            responding_to_id: id,
            current: self.policy.get_current_rpm(),
            set: self
                .pending
                .as_ref()
                .map(|r| r.target_rpm)
                .unwrap_or_else(|| self.policy.get_current_rpm()),
        };
        tasks.host_comms.try_send(HostCommsMessage::GetRpmResponse(response));
    }

    fn handle_deactivate(&mut self, id: u32, tasks: &Tasks) {
        self.policy.stop();
        self.pending = None;
        if id != 0 {
            self.ack(id, None, tasks);
        }
    }

    /// Bootloader-prep quiesce step: stop the motor and report to the
    /// system task rather than closing a host request.
    fn handle_prepare_for_shutdown(&mut self, tasks: &Tasks) {
        self.policy.stop();
        self.pending = None;
        tasks
            .system
            .try_send(SystemMessage::PrepAckReceived { with_error: None });
    }

    fn ack(&self, id: u32, with_error: Option<module_errors::ErrorCode>, tasks: &Tasks) {
        tasks
            .host_comms
            .try_send(HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious {
                responding_to_id: id,
                with_error,
            }));
    }
}

fn step_toward(current: u32, target: u32, step: u32) -> u32 {
    if current < target {
        (current + step).min(target)
    } else {
        current.saturating_sub(step).max(target)
    }
}
