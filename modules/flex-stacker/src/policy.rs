//! Policy traits: the sole coupling between this module's tasks and
//! hardware/OS. No task imports hardware directly; tests use
//! the `Sim*` in-memory implementations below.

use module_errors::{ErrorCode, SerialNumberStore, SERIAL_NUMBER_LEN};

/// Capability set the motor task needs: drive the lead-screw stepper, read
/// its limit switch and fault line, and actuate the solenoid. A
/// representative subset of the full TMC2130/seal-switch surface.
pub trait MotorPolicy {
    fn stepper_start(&mut self, steps: i32);
    fn stepper_stop(&mut self);
    fn stepper_check_fault(&self) -> bool;
    fn limit_switch_read(&self) -> bool;
    fn solenoid_engage(&mut self);
    fn solenoid_disengage(&mut self);
}

pub trait SystemPolicy: SerialNumberStore {
    fn enter_bootloader(&mut self);
}

/// Reaches the limit switch the instant it starts moving, the same way
/// `SimMotorPolicy` in heater-shaker reaches its target rpm in one tick --
/// deterministic enough for tests without needing several simulated ticks.
/// [`Self::never_trips`] opts out, for exercising the timeout path.
#[derive(Debug, Clone, Copy)]
pub struct SimMotorPolicy {
    pub fault: bool,
    pub limit_switch: bool,
    pub solenoid_engaged: bool,
    pub running: bool,
    auto_trip: bool,
}

impl SimMotorPolicy {
    pub const fn new() -> Self {
        Self {
            fault: false,
            limit_switch: false,
            solenoid_engaged: false,
            running: false,
            auto_trip: true,
        }
    }

    pub const fn never_trips() -> Self {
        Self {
            fault: false,
            limit_switch: false,
            solenoid_engaged: false,
            running: false,
            auto_trip: false,
        }
    }
}

impl Default for SimMotorPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl MotorPolicy for SimMotorPolicy {
    fn stepper_start(&mut self, _steps: i32) {
        self.running = true;
        if self.auto_trip {
            self.limit_switch = true;
        }
    }

    fn stepper_stop(&mut self) {
        self.running = false;
    }

    fn stepper_check_fault(&self) -> bool {
        self.fault
    }

    fn limit_switch_read(&self) -> bool {
        self.limit_switch
    }

    fn solenoid_engage(&mut self) {
        self.solenoid_engaged = true;
    }

    fn solenoid_disengage(&mut self) {
        self.solenoid_engaged = false;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimSystemPolicy {
    serial: [u8; SERIAL_NUMBER_LEN],
    pub bootloader_entered: bool,
}

impl SimSystemPolicy {
    pub const fn new() -> Self {
        Self {
            serial: [0u8; SERIAL_NUMBER_LEN],
            bootloader_entered: false,
        }
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
        self.serial = serial;
        Ok(())
    }
}

impl SystemPolicy for SimSystemPolicy {
    fn enter_bootloader(&mut self) {
        self.bootloader_entered = true;
    }
}
