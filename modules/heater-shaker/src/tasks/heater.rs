//! Heater task: drives the plate/heatsink, tracks the `IDLE -> CONTROLLING
//! -> ERROR` lifecycle, and answers `M104`/`M105`/`M18`.
//!
//! There is only one thermal zone in this module (unlike thermocycler-gen2's
//! plate+lid pair), so there's no secondary ack cache here: every request
//! this task handles closes with exactly one reply, sent straight back to
//! host-comms.

use module_errors::ErrorCode;

use crate::aggregator::Tasks;
use crate::messages::{GetTemperatureResponse, HeaterMessage, HostCommsMessage, SystemMessage};
use crate::policy::HeaterPolicy;

/// Plate temperature above which a reading is treated as a thermistor fault
/// rather than a real measurement; out of scope to model the real curve
///, but the state machine still needs *a* fault path
/// to exercise the `ERROR` state.
const THERMISTOR_FAULT_CELSIUS: f32 = 110.0;

/// How close to the target counts as "at target," matching the control loop
/// tolerance the original's `PlateControl` uses for its settling check.
const AT_TARGET_TOLERANCE_CELSIUS: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Trace {
    EnteredControlling { target: i32 },
    EnteredIdle,
    EnteredError,
    Reading { celsius: i32 },
    None,
}
ringbuf::ringbuf!(TRACE, Trace, 16, Trace::None);

#[derive(Debug, Clone, Copy, PartialEq)]
enum ThermalState {
    Idle,
    Controlling,
    Error(ErrorCode),
}

pub struct HeaterTask<P> {
    policy: P,
    state: ThermalState,
    target: f32,
    hold_seconds: Option<u32>,
    elapsed_seconds: f32,
    current: f32,
}

impl<P: HeaterPolicy> HeaterTask<P> {
    pub const fn new(policy: P) -> Self {
        Self {
            policy,
            state: ThermalState::Idle,
            target: 0.0,
            hold_seconds: None,
            elapsed_seconds: 0.0,
            current: 0.0,
        }
    }

    pub fn state_is_controlling(&self) -> bool {
        matches!(self.state, ThermalState::Controlling)
    }

    pub fn handle_message(&mut self, message: HeaterMessage, tasks: &Tasks) {
        match message {
            HeaterMessage::SetTemperature {
                id,
                target,
                hold_seconds,
            } => self.handle_set_temperature(id, target, hold_seconds, tasks),
            HeaterMessage::GetTemperature { id } => self.handle_get_temperature(id, tasks),
            HeaterMessage::Deactivate { id } => self.handle_deactivate(id, tasks),
            HeaterMessage::TemperatureReadingComplete { raw_adc } => {
                self.handle_reading(raw_adc)
            }
            HeaterMessage::PrepareForShutdown => self.handle_prepare_for_shutdown(tasks),
        }
    }

    fn handle_set_temperature(
        &mut self,
        id: u32,
        target: f32,
        hold_seconds: Option<u32>,
        tasks: &Tasks,
    ) {
        if let ThermalState::Error(code) = self.state {
            self.ack(id, Some(code), tasks);
            return;
        }
        self.target = target;
        self.hold_seconds = hold_seconds;
        self.elapsed_seconds = 0.0;
        self.state = ThermalState::Controlling;
        self.policy.set_heater_power(1.0);
        self.policy.set_fan_power(0.5);
        ringbuf::ringbuf_entry!(TRACE, Trace::EnteredControlling {
            target: target as i32
        });
        self.ack(id, None, tasks);
    }

    fn handle_get_temperature(&mut self, id: u32, tasks: &Tasks) {
        let total_seconds = self.hold_seconds.map(f64::from).unwrap_or(0.0) as f32;
        let remaining_seconds = (total_seconds - self.elapsed_seconds).max(0.0);
        let response = GetTemperatureResponse {
            responding_to_id: id,
            current: self.current,
            set: self.target,
            remaining_seconds,
            total_seconds,
            at_target: self.at_target(),
        };
        tasks.host_comms.try_send(HostCommsMessage::GetTemperatureResponse(response));
    }

    fn handle_deactivate(&mut self, id: u32, tasks: &Tasks) {
        self.policy.set_heater_power(0.0);
        self.policy.set_fan_power(0.0);
        self.state = ThermalState::Idle;
        self.hold_seconds = None;
        self.elapsed_seconds = 0.0;
        ringbuf::ringbuf_entry!(TRACE, Trace::EnteredIdle);
        // `id == 0` means this deactivate rode in on a combined `M18` that
        // the motor task is already acking; don't double-reply.
        if id != 0 {
            self.ack(id, None, tasks);
        }
    }

    /// Bootloader-prep quiesce step: kill output like any other deactivate,
    /// but report to the system task instead of closing a host request --
    /// nothing the host sent is waiting on this.
    fn handle_prepare_for_shutdown(&mut self, tasks: &Tasks) {
        self.policy.set_heater_power(0.0);
        self.policy.set_fan_power(0.0);
        self.state = ThermalState::Idle;
        self.hold_seconds = None;
        self.elapsed_seconds = 0.0;
        ringbuf::ringbuf_entry!(TRACE, Trace::EnteredIdle);
        tasks
            .system
            .try_send(SystemMessage::PrepAckReceived { with_error: None });
    }

    fn handle_reading(&mut self, raw_adc: u16) {
        let celsius = self.policy.convert_adc_to_celsius(raw_adc);
        self.current = celsius;
        ringbuf::ringbuf_entry!(TRACE, Trace::Reading {
            celsius: celsius as i32
        });
        if celsius.abs() > THERMISTOR_FAULT_CELSIUS {
            self.state = ThermalState::Error(if celsius < 0.0 {
                ErrorCode::ThermistorOutOfRangeLow
            } else {
                ErrorCode::ThermistorOutOfRangeHigh
            });
            self.policy.set_heater_power(0.0);
            ringbuf::ringbuf_entry!(TRACE, Trace::EnteredError);
            return;
        }
        if matches!(self.state, ThermalState::Controlling) {
            self.elapsed_seconds += 1.0;
            if self.at_target() {
                self.policy.set_heater_power(0.3);
            }
        }
    }

    fn at_target(&self) -> bool {
        matches!(self.state, ThermalState::Controlling)
            && (self.current - self.target).abs() <= AT_TARGET_TOLERANCE_CELSIUS
    }

    fn ack(&self, id: u32, with_error: Option<ErrorCode>, tasks: &Tasks) {
        use crate::messages::AcknowledgePrevious;
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
    use crate::messages::{AcknowledgePrevious, HeaterMessage};
    use crate::policy::SimHeaterPolicy;
    use queue_aggregator::Mailbox;

    fn leak_tasks_with_host_comms() -> (&'static Tasks, &'static Mailbox<HostCommsMessage, 8>) {
        let tasks: &'static Tasks = Box::leak(Box::new(Tasks::new()));
        let host_comms: &'static Mailbox<HostCommsMessage, 8> = Box::leak(Box::new(Mailbox::new()));
        tasks.host_comms.register(host_comms);
        (tasks, host_comms)
    }

    #[test]
    fn set_temperature_acks_immediately_and_enters_controlling() {
        let (tasks, host_comms) = leak_tasks_with_host_comms();
        let mut task = HeaterTask::new(SimHeaterPolicy::new());
        task.handle_message(
            HeaterMessage::SetTemperature {
                id: 1,
                target: 37.0,
                hold_seconds: Some(60),
            },
            tasks,
        );
        assert!(task.state_is_controlling());
        assert_eq!(
            host_comms.recv(),
            HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious::ok(1))
        );
    }

    #[test]
    fn get_temperature_reports_current_reading() {
        let (tasks, host_comms) = leak_tasks_with_host_comms();
        let mut task = HeaterTask::new(SimHeaterPolicy::new());
        task.handle_message(
            HeaterMessage::SetTemperature {
                id: 1,
                target: 30.0,
                hold_seconds: None,
            },
            tasks,
        );
        let _ = host_comms.recv();
        task.handle_message(HeaterMessage::TemperatureReadingComplete { raw_adc: 3000 }, tasks);
        task.handle_message(HeaterMessage::GetTemperature { id: 2 }, tasks);
        let HostCommsMessage::GetTemperatureResponse(response) = host_comms.recv() else {
            panic!("expected a temperature response");
        };
        assert_eq!(response.responding_to_id, 2);
        assert_eq!(response.current, 30.0);
        assert_eq!(response.set, 30.0);
        assert!(response.at_target);
    }

    #[test]
    fn out_of_range_reading_enters_error_and_kills_power() {
        let (tasks, _host_comms) = leak_tasks_with_host_comms();
        let mut task = HeaterTask::new(SimHeaterPolicy::new());
        task.handle_message(
            HeaterMessage::SetTemperature {
                id: 1,
                target: 37.0,
                hold_seconds: None,
            },
            tasks,
        );
        task.handle_message(
            HeaterMessage::TemperatureReadingComplete { raw_adc: 20_000 },
            tasks,
        );
        assert_eq!(task.policy.get_heater_power(), 0.0);
        assert!(matches!(task.state, ThermalState::Error(_)));
    }

    #[test]
    fn set_temperature_while_latched_in_error_is_rejected() {
        let (tasks, host_comms) = leak_tasks_with_host_comms();
        let mut task = HeaterTask::new(SimHeaterPolicy::new());
        task.handle_message(
            HeaterMessage::SetTemperature {
                id: 1,
                target: 37.0,
                hold_seconds: None,
            },
            tasks,
        );
        let _ = host_comms.recv();
        task.handle_message(
            HeaterMessage::TemperatureReadingComplete { raw_adc: 20_000 },
            tasks,
        );
        assert!(matches!(task.state, ThermalState::Error(_)));

        task.handle_message(
            HeaterMessage::SetTemperature {
                id: 2,
                target: 40.0,
                hold_seconds: None,
            },
            tasks,
        );
        assert!(
            !task.state_is_controlling(),
            "a latched error must not be cleared by a new SetTemperature"
        );
        assert_eq!(task.policy.get_heater_power(), 0.0);
        match host_comms.recv() {
            HostCommsMessage::AcknowledgePrevious(ack) => {
                assert_eq!(ack.responding_to_id, 2);
                assert!(ack.with_error.is_some());
            }
            other => panic!("expected an error ack, got {other:?}"),
        }
    }

    #[test]
    fn deactivate_with_zero_id_sends_no_ack() {
        let (tasks, host_comms) = leak_tasks_with_host_comms();
        let mut task = HeaterTask::new(SimHeaterPolicy::new());
        task.handle_message(
            HeaterMessage::SetTemperature {
                id: 1,
                target: 37.0,
                hold_seconds: None,
            },
            tasks,
        );
        let _ = host_comms.recv();
        task.handle_message(HeaterMessage::Deactivate { id: 0 }, tasks);
        assert!(!host_comms.has_message());
        assert!(!task.state_is_controlling());
    }
}
