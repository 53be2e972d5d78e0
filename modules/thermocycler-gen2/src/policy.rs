//! Policy traits: the sole coupling between this module's tasks and
//! hardware/OS. No task imports hardware directly; tests use
//! the `Sim*` in-memory implementations below.

use module_errors::{ErrorCode, SerialNumberStore, SERIAL_NUMBER_LEN};

use crate::board_revision::TrinaryInput;

/// Capability set the plate task needs: drive the peltier array and
/// heatsink fan, read back the plate thermistor.
pub trait PlatePolicy {
    fn set_peltier_power(&mut self, power: f32);
    fn get_peltier_power(&self) -> f32;
    fn set_fan_power(&mut self, power: f32);
    fn peltier_fault(&self) -> bool;
    fn fan_stalled(&self) -> bool;
    /// Converts one raw ADC sample into a plate temperature in Celsius.
    fn convert_adc_to_celsius(&self, raw_adc: u16) -> f32;
}

/// Capability set the lid task needs: drive the lid heater element.
pub trait LidPolicy {
    fn set_heater_power(&mut self, power: f32);
    fn get_heater_power(&self) -> f32;
    fn heater_fault(&self) -> bool;
    fn convert_adc_to_celsius(&self, raw_adc: u16) -> f32;
}

/// Capability set the system task needs: bootloader entry, serial number
/// persistence, and the board-revision GPIO read.
pub trait SystemPolicy: SerialNumberStore {
    fn enter_bootloader(&mut self);
    fn read_board_revision_pins(&self) -> [TrinaryInput; 3];
}

/// In-memory peltier/fan model used by tests.
#[derive(Debug, Clone, Copy)]
pub struct SimPlatePolicy {
    pub peltier_power: f32,
    pub fan_power: f32,
    pub fault: bool,
    pub fan_stalled: bool,
}

impl SimPlatePolicy {
    pub const fn new() -> Self {
        Self {
            peltier_power: 0.0,
            fan_power: 0.0,
            fault: false,
            fan_stalled: false,
        }
    }
}

impl Default for SimPlatePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatePolicy for SimPlatePolicy {
    fn set_peltier_power(&mut self, power: f32) {
        self.peltier_power = power.clamp(-1.0, 1.0);
    }

    fn get_peltier_power(&self) -> f32 {
        self.peltier_power
    }

    fn set_fan_power(&mut self, power: f32) {
        self.fan_power = power.clamp(0.0, 1.0);
    }

    fn peltier_fault(&self) -> bool {
        self.fault
    }

    fn fan_stalled(&self) -> bool {
        self.fan_stalled
    }

    fn convert_adc_to_celsius(&self, raw_adc: u16) -> f32 {
        // Linear stand-in for the real thermistor curve: calibration is out
        // of scope, but monotonic enough to drive specific temperatures
        // through tests.
        raw_adc as f32 / 100.0
    }
}

/// In-memory lid heater model used by tests.
#[derive(Debug, Clone, Copy)]
pub struct SimLidPolicy {
    pub heater_power: f32,
    pub fault: bool,
}

impl SimLidPolicy {
    pub const fn new() -> Self {
        Self {
            heater_power: 0.0,
            fault: false,
        }
    }
}

impl Default for SimLidPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl LidPolicy for SimLidPolicy {
    fn set_heater_power(&mut self, power: f32) {
        self.heater_power = power.clamp(0.0, 1.0);
    }

    fn get_heater_power(&self) -> f32 {
        self.heater_power
    }

    fn heater_fault(&self) -> bool {
        self.fault
    }

    fn convert_adc_to_celsius(&self, raw_adc: u16) -> f32 {
        raw_adc as f32 / 100.0
    }
}

/// In-memory system policy used by tests. `board_rev_pins` defaults to
/// rev1's all-floating tuple.
#[derive(Debug, Clone, Copy)]
pub struct SimSystemPolicy {
    serial: [u8; SERIAL_NUMBER_LEN],
    fail_next_write: bool,
    pub bootloader_entered: bool,
    pub board_rev_pins: [TrinaryInput; 3],
}

impl SimSystemPolicy {
    pub const fn new() -> Self {
        Self {
            serial: [0u8; SERIAL_NUMBER_LEN],
            fail_next_write: false,
            bootloader_entered: false,
            board_rev_pins: [TrinaryInput::Floating, TrinaryInput::Floating, TrinaryInput::Floating],
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

    fn read_board_revision_pins(&self) -> [TrinaryInput; 3] {
        self.board_rev_pins
    }
}
