//! The thermocycler's G-code vocabulary.
//!
//! A representative subset: plate temperature control, lid
//! heater set/deactivate, a combined deactivate awaiting both, the board
//! revision probe, and device info. Each recognizer is hand-written against
//! [`gcode::value`], exactly as every gcode struct's `parse` is hand-written
//! in the original rather than generated from a descriptor table.

use gcode::{gcode_group, prefix_matches, Recognizer};

/// `M104 S<temp> [H<hold_s>]` -- set the plate's target temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetPlateTemperature {
    pub temperature: f32,
    pub hold_seconds: Option<u32>,
}

impl Recognizer for SetPlateTemperature {
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
            Some(SetPlateTemperature {
                temperature,
                hold_seconds,
            }),
            rest,
        )
    }
}

/// `M105` -- read plate current/target temperature and time remaining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetPlateTemperature;

impl Recognizer for GetPlateTemperature {
    fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        let rest = prefix_matches(input, b"M105");
        if rest.len() == input.len() {
            (None, input)
        } else {
            (Some(GetPlateTemperature), rest)
        }
    }
}

/// `M140 S<temp>` -- set the lid heater's target temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetLidTemperature {
    pub temperature: f32,
}

impl Recognizer for SetLidTemperature {
    fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        let rest = prefix_matches(input, b"M140 S");
        if rest.len() == input.len() {
            return (None, input);
        }
        match gcode::parse_float(rest) {
            (Some(v), rest) if v >= 0.0 => (Some(SetLidTemperature { temperature: v }), rest),
            _ => (None, input),
        }
    }
}

/// `M108` -- deactivate the lid heater alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeactivateLid;

impl Recognizer for DeactivateLid {
    fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        let rest = prefix_matches(input, b"M108");
        if rest.len() == input.len() {
            (None, input)
        } else {
            (Some(DeactivateLid), rest)
        }
    }
}

/// `M18` -- deactivate both plate and lid, one combined ack.
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

/// `M900.D` -- board revision probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetBoardRevision;

impl Recognizer for GetBoardRevision {
    fn parse(input: &[u8]) -> (Option<Self>, &[u8]) {
        let rest = prefix_matches(input, b"M900.D");
        if rest.len() == input.len() {
            (None, input)
        } else {
            (Some(GetBoardRevision), rest)
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
    pub enum ThermocyclerGcode {
        SetPlateTemperature(SetPlateTemperature),
        GetPlateTemperature(GetPlateTemperature),
        SetLidTemperature(SetLidTemperature),
        DeactivateLid(DeactivateLid),
        DeactivateAll(DeactivateAll),
        GetBoardRevision(GetBoardRevision),
        DeviceInfo(DeviceInfo),
        EnterBootloader(EnterBootloader),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcode::GroupResult;

    #[test]
    fn set_plate_temperature_parses_with_hold() {
        let (result, rest) = ThermocyclerGcode::parse_available(b"M104 S95.0 H30\n");
        assert_eq!(
            result,
            GroupResult::Gcode(ThermocyclerGcode::SetPlateTemperature(SetPlateTemperature {
                temperature: 95.0,
                hold_seconds: Some(30),
            }))
        );
        assert_eq!(rest, b"");
    }

    #[test]
    fn get_board_revision_parses() {
        let (result, _) = ThermocyclerGcode::parse_available(b"M900.D\n");
        assert_eq!(
            result,
            GroupResult::Gcode(ThermocyclerGcode::GetBoardRevision(GetBoardRevision))
        );
    }

    #[test]
    fn set_lid_temperature_rejects_negative() {
        let (result, rest) = ThermocyclerGcode::parse_available(b"M140 S-1\n");
        assert!(result.is_error());
        assert_eq!(rest, b"");
    }

    #[test]
    fn malformed_gcode_is_unhandled() {
        let (result, _) = ThermocyclerGcode::parse_available(b"zzz\n");
        assert!(result.is_error());
    }

    #[test]
    fn dfu_parses_bare() {
        let (result, rest) = ThermocyclerGcode::parse_available(b"dfu\n");
        assert_eq!(
            result,
            GroupResult::Gcode(ThermocyclerGcode::EnterBootloader(EnterBootloader))
        );
        assert_eq!(rest, b"");
    }

    #[test]
    fn deactivate_lid_and_deactivate_all_are_distinct() {
        let (result, _) = ThermocyclerGcode::parse_available(b"M108\n");
        assert_eq!(result, GroupResult::Gcode(ThermocyclerGcode::DeactivateLid(DeactivateLid)));
        let (result, _) = ThermocyclerGcode::parse_available(b"M18\n");
        assert_eq!(result, GroupResult::Gcode(ThermocyclerGcode::DeactivateAll(DeactivateAll)));
    }
}
