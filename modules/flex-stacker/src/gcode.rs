//! The flex-stacker's G-code vocabulary.
//!
//! A representative subset: the solenoid actuator, homing the
//! stacker's lead screw, and device info. `G28` in particular is long
//! running -- its task answers it through the self-addressed `CheckStatus`
//! pattern rather than blocking, same shape as heater-shaker's RPM ramp.

use gcode::{gcode_group, prefix_matches, Recognizer};

/// `G28.D` -- actuate the stacker's solenoid once (engage, then release).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuateSolenoid;

impl Recognizer for ActuateSolenoid {
    fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        let rest = prefix_matches(input, b"G28.D");
        if rest.len() == input.len() {
            (None, input)
        } else {
            (Some(ActuateSolenoid), rest)
        }
    }
}

/// `G28` -- home the lead screw against its limit switch. Must be tried
/// after `ActuateSolenoid`'s `G28.D` prefix, since `gcode_group!` tries
/// recognizers in declaration order and a bare `G28` prefix is also a
/// prefix of `G28.D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Home;

impl Recognizer for Home {
    fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        let rest = prefix_matches(input, b"G28");
        if rest.len() == input.len() {
            (None, input)
        } else {
            (Some(Home), rest)
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
    pub enum FlexStackerGcode {
        ActuateSolenoid(ActuateSolenoid),
        Home(Home),
        DeviceInfo(DeviceInfo),
        EnterBootloader(EnterBootloader),
    }
}
