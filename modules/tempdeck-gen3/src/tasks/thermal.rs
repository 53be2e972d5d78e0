//! Thermal task: drives the deck's Peltier element, tracks the
//! `IDLE -> CONTROLLING -> ERROR` lifecycle, and answers
//! `M104`/`M105`/`M18`. One thermal zone in this module, so every request
//! this task handles closes with exactly one reply.

use module_errors::ErrorCode;

use crate::aggregator::Tasks;
use crate::messages::{GetTemperatureResponse, HostCommsMessage, SystemMessage, ThermalMessage};
use crate::policy::ThermalPolicy;

/// Reading above which a sample is treated as a thermistor fault rather
/// than a real measurement; out of scope to model the real curve
///, but the state machine still needs *a* fault path.
const THERMISTOR_FAULT_CELSIUS: f32 = 100.0;
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

pub struct ThermalTask<P> {
    policy: P,
    state: ThermalState,
    target: f32,
    hold_seconds: Option<u32>,
    elapsed_seconds: f32,
    current: f32,
}

impl<P: ThermalPolicy> ThermalTask<P> {
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

    pub fn handle_message(&mut self, message: ThermalMessage, tasks: &Tasks) {
        match message {
            ThermalMessage::SetTemperature {
                id,
                target,
                hold_seconds,
            } => self.handle_set_temperature(id, target, hold_seconds, tasks),
            ThermalMessage::GetTemperature { id } => self.handle_get_temperature(id, tasks),
            ThermalMessage::Deactivate { id } => self.handle_deactivate(id, tasks),
            ThermalMessage::TemperatureReadingComplete { raw_adc } => self.handle_reading(raw_adc),
            ThermalMessage::PrepareForShutdown => self.handle_prepare_for_shutdown(tasks),
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
        self.policy.set_peltier_power(1.0);
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
        self.policy.set_peltier_power(0.0);
        self.state = ThermalState::Idle;
        self.hold_seconds = None;
        self.elapsed_seconds = 0.0;
        ringbuf::ringbuf_entry!(TRACE, Trace::EnteredIdle);
        self.ack(id, None, tasks);
    }

    fn handle_prepare_for_shutdown(&mut self, tasks: &Tasks) {
        self.policy.set_peltier_power(0.0);
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
            self.policy.set_peltier_power(0.0);
            ringbuf::ringbuf_entry!(TRACE, Trace::EnteredError);
            return;
        }
        if self.policy.peltier_fault() {
            self.state = ThermalState::Error(ErrorCode::PeltierError);
            self.policy.set_peltier_power(0.0);
            ringbuf::ringbuf_entry!(TRACE, Trace::EnteredError);
            return;
        }
        if matches!(self.state, ThermalState::Controlling) {
            self.elapsed_seconds += 1.0;
            if self.at_target() {
                self.policy.set_peltier_power(0.3);
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
    use crate::messages::AcknowledgePrevious;
    use crate::policy::SimThermalPolicy;
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
        let mut task = ThermalTask::new(SimThermalPolicy::new());
        task.handle_message(
            ThermalMessage::SetTemperature {
                id: 1,
                target: 4.0,
                hold_seconds: Some(600),
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
        let mut task = ThermalTask::new(SimThermalPolicy::new());
        task.handle_message(
            ThermalMessage::SetTemperature {
                id: 1,
                target: 4.0,
                hold_seconds: None,
            },
            tasks,
        );
        let _ = host_comms.recv();
        task.handle_message(ThermalMessage::TemperatureReadingComplete { raw_adc: 400 }, tasks);
        task.handle_message(ThermalMessage::GetTemperature { id: 2 }, tasks);
        let HostCommsMessage::GetTemperatureResponse(response) = host_comms.recv() else {
            panic!("expected a temperature response");
        };
        assert_eq!(response.responding_to_id, 2);
        assert_eq!(response.current, 4.0);
        assert!(response.at_target);
    }

    #[test]
    fn set_temperature_while_latched_in_error_is_rejected() {
        let (tasks, host_comms) = leak_tasks_with_host_comms();
        let mut policy = SimThermalPolicy::new();
        policy.fault = true;
        let mut task = ThermalTask::new(policy);
        task.handle_message(
            ThermalMessage::SetTemperature {
                id: 1,
                target: 4.0,
                hold_seconds: None,
            },
            tasks,
        );
        let _ = host_comms.recv();
        task.handle_message(ThermalMessage::TemperatureReadingComplete { raw_adc: 400 }, tasks);
        assert!(matches!(task.state, ThermalState::Error(_)));

        task.handle_message(
            ThermalMessage::SetTemperature {
                id: 2,
                target: 10.0,
                hold_seconds: None,
            },
            tasks,
        );
        assert!(!task.state_is_controlling());
        assert_eq!(task.policy.get_peltier_power(), 0.0);
        match host_comms.recv() {
            HostCommsMessage::AcknowledgePrevious(ack) => {
                assert_eq!(ack.responding_to_id, 2);
                assert!(ack.with_error.is_some());
            }
            other => panic!("expected an error ack, got {other:?}"),
        }
    }

    #[test]
    fn deactivate_kills_power_and_acks() {
        let (tasks, host_comms) = leak_tasks_with_host_comms();
        let mut task = ThermalTask::new(SimThermalPolicy::new());
        task.handle_message(
            ThermalMessage::SetTemperature {
                id: 1,
                target: 4.0,
                hold_seconds: None,
            },
            tasks,
        );
        let _ = host_comms.recv();
        task.handle_message(ThermalMessage::Deactivate { id: 2 }, tasks);
        assert_eq!(
            host_comms.recv(),
            HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious::ok(2))
        );
        assert!(!task.state_is_controlling());
    }
}
