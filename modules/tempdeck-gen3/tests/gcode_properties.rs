//! Property test for the parser: formatting a command to its wire text and
//! parsing it back always yields the same command.

use gcode::GroupResult;
use proptest::prelude::*;
use tempdeck_gen3::gcode::{SetTemperature, TempdeckGcode};

proptest! {
    #[test]
    fn set_temperature_round_trips_with_and_without_hold(
        tenths in 0u32..1_000,
        hold in proptest::option::of(0u32..100_000),
    ) {
        let temperature = tenths as f32 / 10.0;
        let line = match hold {
            Some(h) => std::format!("M104 S{:.1} H{}\n", temperature, h),
            None => std::format!("M104 S{:.1}\n", temperature),
        };
        let (result, rest) = TempdeckGcode::parse_available(line.as_bytes());
        prop_assert_eq!(
            result,
            GroupResult::Gcode(TempdeckGcode::SetTemperature(SetTemperature {
                temperature,
                hold_seconds: hold,
            }))
        );
        prop_assert!(rest.is_empty());
    }
}
