//! Lid task: drives the lid heater element, tracks the same
//! `IDLE -> CONTROLLING -> ERROR` lifecycle as the plate, and answers
//! `M140`/`M108` plus its half of `M18`. No `GetTemperature` here --
//! `M105` is plate-only in this module's representative vocabulary.

use module_errors::ErrorCode;

use crate::aggregator::Tasks;
use crate::messages::{
    AcknowledgePrevious, DeactivateAck, DeactivateAllAckPartial, HostCommsMessage, LidMessage, SystemMessage,
};
use crate::policy::LidPolicy;

const THERMISTOR_FAULT_CELSIUS: f32 = 115.0;
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

pub struct LidTask<P> {
    policy: P,
    state: ThermalState,
    target: f32,
    current: f32,
}

impl<P: LidPolicy> LidTask<P> {
    pub const fn new(policy: P) -> Self {
        Self {
            policy,
            state: ThermalState::Idle,
            target: 0.0,
            current: 0.0,
        }
    }

    pub fn state_is_controlling(&self) -> bool {
        matches!(self.state, ThermalState::Controlling)
    }

    pub fn handle_message(&mut self, message: LidMessage, tasks: &Tasks) {
        match message {
            LidMessage::SetTemperature { id, target } => self.handle_set_temperature(id, target, tasks),
            LidMessage::Deactivate(ack) => self.handle_deactivate(ack, tasks),
            LidMessage::TemperatureReadingComplete { raw_adc } => self.handle_reading(raw_adc),
            LidMessage::PrepareForShutdown => self.handle_prepare_for_shutdown(tasks),
        }
    }

    fn handle_set_temperature(&mut self, id: u32, target: f32, tasks: &Tasks) {
        if let ThermalState::Error(code) = self.state {
            tasks
                .host_comms
                .try_send(HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious::error(
                    id, code,
                )));
            return;
        }
        self.target = target;
        self.state = ThermalState::Controlling;
        self.policy.set_heater_power(1.0);
        ringbuf::ringbuf_entry!(TRACE, Trace::EnteredControlling {
            target: target as i32
        });
        tasks
            .host_comms
            .try_send(HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious::ok(id)));
    }

    fn handle_deactivate(&mut self, ack: DeactivateAck, tasks: &Tasks) {
        self.policy.set_heater_power(0.0);
        self.state = ThermalState::Idle;
        ringbuf::ringbuf_entry!(TRACE, Trace::EnteredIdle);
        match ack {
            DeactivateAck::Single(id) => {
                tasks
                    .host_comms
                    .try_send(HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious::ok(id)));
            }
            DeactivateAck::Combined(outer_id) => {
                tasks
                    .host_comms
                    .try_send(HostCommsMessage::DeactivateAllAckPartial(DeactivateAllAckPartial {
                        outer_id,
                        with_error: None,
                    }));
            }
        }
    }

    fn handle_prepare_for_shutdown(&mut self, tasks: &Tasks) {
        self.policy.set_heater_power(0.0);
        self.state = ThermalState::Idle;
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
        if self.policy.heater_fault() {
            self.state = ThermalState::Error(ErrorCode::HeaterError);
            self.policy.set_heater_power(0.0);
            ringbuf::ringbuf_entry!(TRACE, Trace::EnteredError);
            return;
        }
        if matches!(self.state, ThermalState::Controlling) && self.at_target() {
            self.policy.set_heater_power(0.3);
        }
    }

    fn at_target(&self) -> bool {
        (self.current - self.target).abs() <= AT_TARGET_TOLERANCE_CELSIUS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::SimLidPolicy;
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
        let mut task = LidTask::new(SimLidPolicy::new());
        task.handle_message(LidMessage::SetTemperature { id: 1, target: 105.0 }, tasks);
        assert!(task.state_is_controlling());
        assert_eq!(
            host_comms.recv(),
            HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious::ok(1))
        );
    }

    #[test]
    fn single_deactivate_acks_directly() {
        let (tasks, host_comms) = leak_tasks_with_host_comms();
        let mut task = LidTask::new(SimLidPolicy::new());
        task.handle_message(LidMessage::Deactivate(DeactivateAck::Single(3)), tasks);
        assert_eq!(
            host_comms.recv(),
            HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious::ok(3))
        );
        assert!(!task.state_is_controlling());
    }

    #[test]
    fn combined_deactivate_reports_a_partial_ack() {
        let (tasks, host_comms) = leak_tasks_with_host_comms();
        let mut task = LidTask::new(SimLidPolicy::new());
        task.handle_message(LidMessage::Deactivate(DeactivateAck::Combined(3)), tasks);
        assert_eq!(
            host_comms.recv(),
            HostCommsMessage::DeactivateAllAckPartial(DeactivateAllAckPartial {
                outer_id: 3,
                with_error: None,
            })
        );
    }

    #[test]
    fn heater_fault_enters_error_and_kills_power() {
        let (tasks, _host_comms) = leak_tasks_with_host_comms();
        let mut policy = SimLidPolicy::new();
        policy.fault = true;
        let mut task = LidTask::new(policy);
        task.handle_message(LidMessage::SetTemperature { id: 1, target: 105.0 }, tasks);
        task.handle_message(LidMessage::TemperatureReadingComplete { raw_adc: 3000 }, tasks);
        assert_eq!(task.policy.get_heater_power(), 0.0);
        assert!(matches!(task.state, ThermalState::Error(ErrorCode::HeaterError)));
    }

    #[test]
    fn set_temperature_while_latched_in_error_is_rejected() {
        let (tasks, host_comms) = leak_tasks_with_host_comms();
        let mut policy = SimLidPolicy::new();
        policy.fault = true;
        let mut task = LidTask::new(policy);
        task.handle_message(LidMessage::SetTemperature { id: 1, target: 105.0 }, tasks);
        let _ = host_comms.recv();
        task.handle_message(LidMessage::TemperatureReadingComplete { raw_adc: 3000 }, tasks);
        assert!(matches!(task.state, ThermalState::Error(_)));

        task.handle_message(LidMessage::SetTemperature { id: 2, target: 90.0 }, tasks);
        assert!(!task.state_is_controlling());
        assert_eq!(task.policy.get_heater_power(), 0.0);
        assert_eq!(
            host_comms.recv(),
            HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious::error(2, ErrorCode::HeaterError))
        );
    }
}
