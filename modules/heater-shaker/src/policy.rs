//! Policy traits: the sole coupling between this module's tasks and
//! hardware/OS. Every task is generic over a policy bounded by only the
//! capability set it actually uses; no task imports hardware
//! directly. Tests (and any standalone binary) use the `Sim*` policies
//! below instead of a register-poking implementation, which this workspace
//! does not ship.

use module_errors::{ErrorCode, SerialNumberStore, SERIAL_NUMBER_LEN};

/// Capability set the heater task needs from the thermal subsystem: drive
/// the heating element and heatsink fan, and read back the plate
/// thermistor.
pub trait HeaterPolicy {
    fn set_heater_power(&mut self, power: f32);
    fn get_heater_power(&self) -> f32;
    fn set_fan_power(&mut self, power: f32);
    fn get_fan_rpm(&self) -> u32;
    /// Converts one raw ADC sample into a plate temperature in Celsius.
    fn convert_adc_to_celsius(&self, raw_adc: u16) -> f32;
}

/// Capability set the motor task needs to drive the shaker's brushless
/// motor.
pub trait MotorPolicy {
    fn set_target_rpm(&mut self, rpm: u32);
    fn get_current_rpm(&self) -> u32;
    fn stop(&mut self);
    /// True if the motor driver is reporting a fault (stall, overcurrent).
    fn check_fault(&self) -> bool;
}

/// Capability set the system task needs: bootloader entry, serial number
/// persistence, and the front LED/button, none of whose concrete hardware
/// this kernel ships.
pub trait SystemPolicy: SerialNumberStore {
    /// Does not return on real hardware; the sim implementation records
    /// that it was called instead of terminating the process.
    fn enter_bootloader(&mut self);
    fn front_button_pressed(&self) -> bool;
    fn set_led_state(&mut self, on: bool);
}

/// In-memory heater/fan model used by tests. Temperature moves toward the
/// commanded power at a fixed rate; there is no attempt at thermal realism
/// beyond "more power moves faster toward a higher plateau," which is
/// enough to exercise the PID/ackcache/state-machine plumbing around it.
#[derive(Debug, Clone, Copy)]
pub struct SimHeaterPolicy {
    pub heater_power: f32,
    pub fan_power: f32,
    pub fan_rpm: u32,
}

impl SimHeaterPolicy {
    pub const fn new() -> Self {
        Self {
            heater_power: 0.0,
            fan_power: 0.0,
            fan_rpm: 0,
        }
    }
}

impl Default for SimHeaterPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaterPolicy for SimHeaterPolicy {
    fn set_heater_power(&mut self, power: f32) {
        self.heater_power = power.clamp(0.0, 1.0);
    }

    fn get_heater_power(&self) -> f32 {
        self.heater_power
    }

    fn set_fan_power(&mut self, power: f32) {
        self.fan_power = power.clamp(0.0, 1.0);
        self.fan_rpm = (self.fan_power * 8000.0) as u32;
    }

    fn get_fan_rpm(&self) -> u32 {
        self.fan_rpm
    }

    fn convert_adc_to_celsius(&self, raw_adc: u16) -> f32 {
        // A linear stand-in for the real thermistor curve: calibration is
        // out of scope, but something monotonic is needed so tests can
        // drive specific temperatures through the ADC channel.
        raw_adc as f32 / 100.0
    }
}

/// In-memory motor model used by tests: instantly reaches its target RPM.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimMotorPolicy {
    pub target_rpm: u32,
    pub current_rpm: u32,
    pub fault: bool,
}

impl SimMotorPolicy {
    pub const fn new() -> Self {
        Self {
            target_rpm: 0,
            current_rpm: 0,
            fault: false,
        }
    }
}

impl MotorPolicy for SimMotorPolicy {
    fn set_target_rpm(&mut self, rpm: u32) {
        self.target_rpm = rpm;
        self.current_rpm = rpm;
    }

    fn get_current_rpm(&self) -> u32 {
        self.current_rpm
    }

    fn stop(&mut self) {
        self.target_rpm = 0;
        self.current_rpm = 0;
    }

    fn check_fault(&self) -> bool {
        self.fault
    }
}

/// In-memory system policy used by tests.
#[derive(Debug, Clone, Copy)]
pub struct SimSystemPolicy {
    serial: [u8; SERIAL_NUMBER_LEN],
    fail_next_write: bool,
    pub bootloader_entered: bool,
    pub button_pressed: bool,
    pub led_on: bool,
}

impl SimSystemPolicy {
    pub const fn new() -> Self {
        Self {
            serial: [0u8; SERIAL_NUMBER_LEN],
            fail_next_write: false,
            bootloader_entered: false,
            button_pressed: false,
            led_on: false,
        }
    }

    pub fn fail_next_write(&mut self) {
        self.fail_next_write = true;
    }
}

impl Default for SimSystemPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialNumberStore for SimSystemPolicy {
    fn read(&self) -> [u8; SERIAL_NUMBER_LEN] {
        self.serial
    }

    fn write(&mut self, serial: [u8; SERIAL_NUMBER_LEN]) -> Result<(), ErrorCode> {
        if self.fail_next_write {
            self.fail_next_write = false;
            return Err(ErrorCode::SerialNumberHal);
        }
        self.serial = serial;
        Ok(())
    }
}

impl SystemPolicy for SimSystemPolicy {
    fn enter_bootloader(&mut self) {
        self.bootloader_entered = true;
    }

    fn front_button_pressed(&self) -> bool {
        self.button_pressed
    }

    fn set_led_state(&mut self, on: bool) {
        self.led_on = on;
    }
}
