//! The temperature deck's G-code vocabulary.
//!
//! A representative subset: set/get for its single thermal
//! channel, deactivate, device info, and serial number persistence. Each
//! recognizer is hand-written against [`gcode::value`], matching how the
//! original's per-gcode `parse` methods are hand-written rather than
//! generated from a descriptor table.

use gcode::{gcode_group, parse_word, prefix_matches, Recognizer};
use module_errors::SERIAL_NUMBER_LEN;

/// `M104 S<temp> [H<hold_s>]` -- set the deck's target temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetTemperature {
    pub temperature: f32,
    pub hold_seconds: Option<u32>,
}

impl Recognizer for SetTemperature {
    fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        let rest = prefix_matches(input, b"M104 S");
        if rest.len() == input.len() {
            return (None, input);
        }
        let (temperature, rest) = match gcode::parse_float(rest) {
            (Some(v), rest) if v >= 0.0 => (v, rest),
            _ => return (None, input),
        };

        let hold_rest = gcode::gobble_whitespace(rest);
        let after_h = prefix_matches(hold_rest, b"H");
        let (hold_seconds, rest) = if after_h.len() != hold_rest.len() {
            match gcode::parse_uint(after_h) {
                (Some(h), rest) => (Some(h), rest),
                (None, _) => (None, rest),
            }
        } else {
            (None, rest)
        };

        (
            Some(SetTemperature {
                temperature,
                hold_seconds,
            }),
            rest,
        )
    }
}

/// `M105` -- read current/target temperature and time remaining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetTemperature;

impl Recognizer for GetTemperature {
    fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        let rest = prefix_matches(input, b"M105");
        if rest.len() == input.len() {
            (None, input)
        } else {
            (Some(GetTemperature), rest)
        }
    }
}

/// `M18` -- deactivate the thermal channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeactivateAll;

impl Recognizer for DeactivateAll {
    fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        let rest = prefix_matches(input, b"M18");
        if rest.len() == input.len() {
            (None, input)
        } else {
            (Some(DeactivateAll), rest)
        }
    }
}

/// `M115` -- device info (firmware/hardware version, serial number).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo;

impl Recognizer for DeviceInfo {
    fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        let rest = prefix_matches(input, b"M115");
        if rest.len() == input.len() {
            (None, input)
        } else {
            (Some(DeviceInfo), rest)
        }
    }
}

/// `M996 <23-char-sn>` -- persist a new serial number to EEPROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetSerialNumber {
    pub serial: [u8; SERIAL_NUMBER_LEN],
}

impl Recognizer for SetSerialNumber {
    fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        let rest = prefix_matches(input, b"M996 ");
        if rest.len() == input.len() {
            return (None, input);
        }
        let (word, rest) = parse_word(rest);
        if word.len() != SERIAL_NUMBER_LEN {
            return (None, input);
        }
        let mut serial = [0u8; SERIAL_NUMBER_LEN];
        serial.copy_from_slice(word);
        (Some(SetSerialNumber { serial }), rest)
    }
}

/// `dfu` -- cooperative bootloader entry. Bare command, no arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnterBootloader;

impl Recognizer for EnterBootloader {
    fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        let rest = prefix_matches(input, b"dfu");
        if rest.len() == input.len() {
            (None, input)
        } else {
            (Some(EnterBootloader), rest)
        }
    }
}

gcode_group! {
    #[derive(Copy)]
    pub enum TempdeckGcode {
        SetTemperature(SetTemperature),
        GetTemperature(GetTemperature),
        DeactivateAll(DeactivateAll),
        DeviceInfo(DeviceInfo),
        SetSerialNumber(SetSerialNumber),
        EnterBootloader(EnterBootloader),
    }
}
