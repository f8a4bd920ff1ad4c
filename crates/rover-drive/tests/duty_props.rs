//! Properties of the throttle/gear mapping, checked through the public Drive API.

use proptest::prelude::*;
use rover_drive::{BackendChoice, Drive, DriveConfig};

fn sim() -> Drive {
    Drive::open(&DriveConfig { backend: BackendChoice::Sim, ..DriveConfig::default() })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Forward and backward duty equal v * gear / 3.
    #[test]
    fn prop_throttle_duty_is_linear_in_gear(gear in 1i64..=3, v in 0.0f64..=100.0) {
        let mut drive = sim();
        prop_assert!(drive.set_gear(gear));
        drive.set_throttle_forward(v);
        drive.set_throttle_backward(v);
        let expected = v * gear as f64 / 3.0;
        prop_assert!((drive.state().throttle_forward - expected).abs() < 1e-9);
        prop_assert!((drive.state().throttle_backward - expected).abs() < 1e-9);
    }

    /// Gears outside 1..=3 leave the current gear alone.
    #[test]
    fn prop_out_of_range_gear_ignored(start in 1i64..=3, bad in prop_oneof![i64::MIN..1i64, 4i64..i64::MAX]) {
        let mut drive = sim();
        drive.set_gear(start);
        prop_assert!(!drive.set_gear(bad));
        prop_assert_eq!(i64::from(drive.state().gear.get()), start);
    }

    /// Percentages never leave [0, 100] whatever the client sends.
    #[test]
    fn prop_duties_stay_in_range(v in proptest::num::f64::ANY) {
        let mut drive = sim();
        drive.set_gear(3);
        drive.set_throttle_forward(v);
        drive.set_steering_left(v);
        drive.set_brake(v);
        let st = drive.state();
        for d in [st.throttle_forward, st.steering_left, st.brake] {
            prop_assert!((0.0..=100.0).contains(&d), "duty {} out of range for input {}", d, v);
        }
    }

    /// After the neutral reset only lights, auto-mode and gear survive.
    #[test]
    fn prop_neutral_reset(gear in 1i64..=3, lights: bool, auto: bool, v in 0.0f64..=100.0) {
        let mut drive = sim();
        drive.set_gear(gear);
        drive.set_lights(lights);
        drive.set_auto_mode(auto);
        drive.set_horn(true);
        drive.set_throttle_forward(v);
        drive.set_throttle_backward(v);
        drive.set_steering_right(v);
        drive.set_steering_left(v);
        drive.set_brake(v);

        drive.neutral();
        let st = drive.state();
        prop_assert!(st.is_neutral());
        prop_assert_eq!(st.lights, lights);
        prop_assert_eq!(st.auto_mode, auto);
        prop_assert_eq!(i64::from(st.gear.get()), gear);
    }
}
