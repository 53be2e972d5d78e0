//! Property test for the parser: formatting a command to its wire text and
//! parsing it back always yields the same command.

use gcode::GroupResult;
use heater_shaker::gcode::{HeaterShakerGcode, SetRpm, SetTemperature};
use proptest::prelude::*;

proptest! {
    #[test]
    fn set_rpm_round_trips_through_its_wire_text(rpm in 0u32..200_000) {
        let line = std::format!("M3 S{}\n", rpm);
        let (result, rest) = HeaterShakerGcode::parse_available(line.as_bytes());
        prop_assert_eq!(result, GroupResult::Gcode(HeaterShakerGcode::SetRpm(SetRpm { rpm })));
        prop_assert!(rest.is_empty());
    }

    #[test]
    fn set_temperature_round_trips_with_and_without_hold(
        tenths in 0u32..10_000,
        hold in proptest::option::of(0u32..100_000),
    ) {
        let temperature = tenths as f32 / 10.0;
        let line = match hold {
            Some(h) => std::format!("M104 S{:.1} H{}\n", temperature, h),
            None => std::format!("M104 S{:.1}\n", temperature),
        };
        let (result, rest) = HeaterShakerGcode::parse_available(line.as_bytes());
        prop_assert_eq!(
            result,
            GroupResult::Gcode(HeaterShakerGcode::SetTemperature(SetTemperature {
                temperature,
                hold_seconds: hold,
            }))
        );
        prop_assert!(rest.is_empty());
    }
}
