//! Serial number persistence contract.
//!
//! Every module that supports `M996`/`M115` persists a 23-character serial
//! number in EEPROM. Real EEPROM wear-levelling and byte-programming are
//! out of scope (they're an external collaborator, not kernel logic); what
//! the kernel owns is the trait shape and an in-memory stand-in the tests
//! and any standalone binary use instead of real hardware.

use super::ErrorCode;

/// Width of the serial number field, fixed by the wire protocol (`M996
/// <23-char-sn>`).
pub const SERIAL_NUMBER_LEN: usize = 23;

pub type SerialNumber = [u8; SERIAL_NUMBER_LEN];

/// Capability set a system task needs to persist and recall the serial
/// number. Write operations must be idempotent: writing the same value
/// twice leaves the store in the same state as writing it once.
pub trait SerialNumberStore {
    fn read(&self) -> SerialNumber;
    fn write(&mut self, serial: SerialNumber) -> Result<(), ErrorCode>;
}

/// In-memory stand-in used by tests and by any standalone/simulated
/// binary. Starts out all-`\0`, like a never-flashed EEPROM.
#[derive(Debug, Clone, Copy)]
pub struct InMemorySerialNumberStore {
    serial: SerialNumber,
    fail_next_write: bool,
}

impl InMemorySerialNumberStore {
    pub const fn new() -> Self {
        Self {
            serial: [0u8; SERIAL_NUMBER_LEN],
            fail_next_write: false,
        }
    }

    /// Test hook: makes the next `write` call return `SerialNumberHal`
    /// without touching the stored value, modeling an EEPROM programming
    /// failure.
    pub fn fail_next_write(&mut self) {
        self.fail_next_write = true;
    }
}

impl Default for InMemorySerialNumberStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialNumberStore for InMemorySerialNumberStore {
    fn read(&self) -> SerialNumber {
        self.serial
    }

    fn write(&mut self, serial: SerialNumber) -> Result<(), ErrorCode> {
        if self.fail_next_write {
            self.fail_next_write = false;
            return Err(ErrorCode::SerialNumberHal);
        }
        self.serial = serial;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let mut store = InMemorySerialNumberStore::new();
        let sn = *b"HS0123456789ABCDEFGHIJK";
        store.write(sn).unwrap();
        assert_eq!(store.read(), sn);
    }

    #[test]
    fn write_is_idempotent() {
        let mut store = InMemorySerialNumberStore::new();
        let sn = *b"HS0123456789ABCDEFGHIJK";
        store.write(sn).unwrap();
        store.write(sn).unwrap();
        assert_eq!(store.read(), sn);
    }

    #[test]
    fn failed_write_surfaces_hal_error_and_keeps_old_value() {
        let mut store = InMemorySerialNumberStore::new();
        let original = *b"HS0123456789ABCDEFGHIJK";
        store.write(original).unwrap();
        store.fail_next_write();
        let attempt = *b"ZZZZZZZZZZZZZZZZZZZZZZZ";
        assert_eq!(store.write(attempt), Err(ErrorCode::SerialNumberHal));
        assert_eq!(store.read(), original);
    }
}
