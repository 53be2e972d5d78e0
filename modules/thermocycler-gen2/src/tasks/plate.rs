//! Plate task: drives the peltier array and heatsink fan, tracks the
//! `IDLE -> CONTROLLING -> ERROR` lifecycle, and answers
//! `M104`/`M105` plus its half of `M18`.

use module_errors::ErrorCode;

use crate::aggregator::Tasks;
use crate::messages::{
    AcknowledgePrevious, DeactivateAck, DeactivateAllAckPartial, GetPlateTemperatureResponse,
    HostCommsMessage, PlateMessage, SystemMessage,
};
use crate::policy::PlatePolicy;

/// Plate reading above which a reading is treated as a thermistor fault
/// rather than a real measurement; out of scope to model the real curve
///, but the state machine still needs *a* fault path.
const THERMISTOR_FAULT_CELSIUS: f32 = 110.0;
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

pub struct PlateTask<P> {
    policy: P,
    state: ThermalState,
    target: f32,
    hold_seconds: Option<u32>,
    elapsed_seconds: f32,
    current: f32,
}

impl<P: PlatePolicy> PlateTask<P> {
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

    pub fn handle_message(&mut self, message: PlateMessage, tasks: &Tasks) {
        match message {
            PlateMessage::SetTemperature {
                id,
                target,
                hold_seconds,
            } => self.handle_set_temperature(id, target, hold_seconds, tasks),
            PlateMessage::GetTemperature { id } => self.handle_get_temperature(id, tasks),
            PlateMessage::Deactivate(ack) => self.handle_deactivate(ack, tasks),
            PlateMessage::TemperatureReadingComplete { raw_adc } => self.handle_reading(raw_adc),
            PlateMessage::PrepareForShutdown => self.handle_prepare_for_shutdown(tasks),
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
            tasks
                .host_comms
                .try_send(HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious::error(
                    id, code,
                )));
            return;
        }
        self.target = target;
        self.hold_seconds = hold_seconds;
        self.elapsed_seconds = 0.0;
        self.state = ThermalState::Controlling;
        self.policy.set_peltier_power(1.0);
        self.policy.set_fan_power(0.5);
        ringbuf::ringbuf_entry!(TRACE, Trace::EnteredControlling {
            target: target as i32
        });
        tasks
            .host_comms
            .try_send(HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious::ok(id)));
    }

    fn handle_get_temperature(&mut self, id: u32, tasks: &Tasks) {
        let total_seconds = self.hold_seconds.map(f64::from).unwrap_or(0.0) as f32;
        let remaining_seconds = (total_seconds - self.elapsed_seconds).max(0.0);
        let response = GetPlateTemperatureResponse {
            responding_to_id: id,
            current: self.current,
            set: self.target,
            remaining_seconds,
            total_seconds,
            at_target: self.at_target(),
        };
        tasks
            .host_comms
            .try_send(HostCommsMessage::GetPlateTemperatureResponse(response));
    }

    fn handle_deactivate(&mut self, ack: DeactivateAck, tasks: &Tasks) {
        self.policy.set_peltier_power(0.0);
        self.policy.set_fan_power(0.0);
        self.state = ThermalState::Idle;
        self.hold_seconds = None;
        self.elapsed_seconds = 0.0;
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
        self.policy.set_peltier_power(0.0);
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
        if matches!(self.state, ThermalState::Error(_)) {
            // Latched ERROR disables the peltier every cycle, not just on
            // the transition into it -- a fault must not let the zone
            // coast back up while it waits for an explicit deactivate.
            self.policy.set_peltier_power(0.0);
            return;
        }
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
        if self.policy.fan_stalled() {
            self.state = ThermalState::Error(ErrorCode::HeatsinkFan);
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
}
