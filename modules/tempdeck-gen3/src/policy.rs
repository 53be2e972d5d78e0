//! Policy traits: the sole coupling between this module's tasks and
//! hardware/OS. No task imports hardware directly; tests use
//! the `Sim*` in-memory implementations below.

use module_errors::{ErrorCode, SerialNumberStore, SERIAL_NUMBER_LEN};

/// Capability set the thermal task needs: drive the Peltier element, read
/// back the deck thermistor.
pub trait ThermalPolicy {
    fn set_peltier_power(&mut self, power: f32);
    fn get_peltier_power(&self) -> f32;
    fn peltier_fault(&self) -> bool;
    fn convert_adc_to_celsius(&self, raw_adc: u16) -> f32;
}

pub trait SystemPolicy: SerialNumberStore {
    fn enter_bootloader(&mut self);
}

#[derive(Debug, Clone, Copy)]
pub struct SimThermalPolicy {
    pub peltier_power: f32,
    pub fault: bool,
}

impl SimThermalPolicy {
    pub const fn new() -> Self {
        Self {
            peltier_power: 0.0,
            fault: false,
        }
    }
}

impl Default for SimThermalPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ThermalPolicy for SimThermalPolicy {
    fn set_peltier_power(&mut self, power: f32) {
        self.peltier_power = power.clamp(-1.0, 1.0);
    }

    fn get_peltier_power(&self) -> f32 {
        self.peltier_power
    }

    fn peltier_fault(&self) -> bool {
        self.fault
    }

    fn convert_adc_to_celsius(&self, raw_adc: u16) -> f32 {
        raw_adc as f32 / 100.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimSystemPolicy {
    serial: [u8; SERIAL_NUMBER_LEN],
    fail_next_write: bool,
    pub bootloader_entered: bool,
}

impl SimSystemPolicy {
    pub const fn new() -> Self {
        Self {
            serial: [0u8; SERIAL_NUMBER_LEN],
            fail_next_write: false,
            bootloader_entered: false,
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
}
