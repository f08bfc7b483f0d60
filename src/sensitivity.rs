//! Runtime sensitivity: the chord gesture and motion scaling.
//!
//! Holding left and right together while turning the wheel nudges the
//! sensitivity by one step per evaluation. The wheel delta is consumed by
//! the gesture, so nothing scrolls while the chord is held.

use crate::config::{
    MOTION_ACCUM_LIMIT, SENSITIVITY_MAX, SENSITIVITY_MIN, SENSITIVITY_STEP,
};
use crate::state::{clamp, MouseOptions, MouseState};

/// Clamp a sensitivity into the accepted range. NaN maps to 1.0.
pub fn clamp_sensitivity(s: f32) -> f32 {
    if s.is_nan() {
        return 1.0;
    }
    s.max(SENSITIVITY_MIN).min(SENSITIVITY_MAX)
}

/// Sensitivity in tenths, rounded to the nearest tenth.
pub fn to_tenths(s: f32) -> u32 {
    (clamp_sensitivity(s) * 10.0 + 0.5) as u32
}

/// Sensitivity from tenths (2..=30 on the console).
///
/// Stepping in whole tenths keeps repeated adjustments from drifting.
pub fn from_tenths(tenths: u32) -> f32 {
    clamp_sensitivity(tenths as f32 / 10.0)
}

/// Evaluate the chord gesture. Returns `true` when the sensitivity changed.
pub fn apply_gesture(state: &mut MouseState, options: &mut MouseOptions) -> bool {
    if !(state.left && state.right) || state.wheel == 0 {
        return false;
    }

    let step = (SENSITIVITY_STEP * 10.0 + 0.5) as i32;
    let tenths = to_tenths(options.sensitivity) as i32;
    let tenths = if state.wheel > 0 {
        tenths + step
    } else {
        tenths - step
    };
    let before = options.sensitivity;
    options.sensitivity = from_tenths(tenths.max(0) as u32);
    state.wheel = 0;

    if options.sensitivity != before {
        info!("Sensitivity now {} tenths", to_tenths(options.sensitivity));
        true
    } else {
        false
    }
}

/// Scale accumulated motion by the sensitivity.
///
/// The result stays inside the accumulation range; the encoder applies
/// the narrower per-report clamp afterwards.
pub fn scale(x: i32, y: i32, sensitivity: f32) -> (i32, i32) {
    let s = clamp_sensitivity(sensitivity);
    (scale_axis(x, s), scale_axis(y, s))
}

fn scale_axis(v: i32, s: f32) -> i32 {
    let scaled = v as f32 * s;
    // `as` saturates on overflow
    clamp(scaled as i32, -MOTION_ACCUM_LIMIT, MOTION_ACCUM_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chord(wheel: i32) -> MouseState {
        let mut s = MouseState::new();
        s.left = true;
        s.right = true;
        s.wheel = wheel;
        s
    }

    #[test]
    fn chord_increases_and_consumes_wheel() {
        let mut o = MouseOptions::default();
        let mut s = chord(1);
        assert!(apply_gesture(&mut s, &mut o));
        assert_eq!(to_tenths(o.sensitivity), 12);
        assert_eq!(s.wheel, 0);
    }

    #[test]
    fn chord_decreases() {
        let mut o = MouseOptions::default();
        let mut s = chord(-3);
        apply_gesture(&mut s, &mut o);
        assert_eq!(to_tenths(o.sensitivity), 8);
    }

    #[test]
    fn no_chord_no_change() {
        let mut o = MouseOptions::default();
        let mut s = chord(1);
        s.right = false;
        assert!(!apply_gesture(&mut s, &mut o));
        assert_eq!(s.wheel, 1);
        assert_eq!(o.sensitivity, 1.0);
    }

    #[test]
    fn gesture_stays_in_range() {
        let mut o = MouseOptions::default();
        for _ in 0..50 {
            let mut s = chord(-1);
            apply_gesture(&mut s, &mut o);
            assert!(o.sensitivity >= SENSITIVITY_MIN);
        }
        assert_eq!(to_tenths(o.sensitivity), 2);
        for _ in 0..50 {
            let mut s = chord(1);
            apply_gesture(&mut s, &mut o);
            assert!(o.sensitivity <= SENSITIVITY_MAX);
        }
        assert_eq!(to_tenths(o.sensitivity), 30);
    }

    #[test]
    fn scaling() {
        assert_eq!(scale(10, -10, 1.0), (10, -10));
        assert_eq!(scale(10, -10, 2.0), (20, -20));
        assert_eq!(scale(10, 5, 0.2), (2, 1));
        assert_eq!(
            scale(MOTION_ACCUM_LIMIT, 0, 3.0),
            (MOTION_ACCUM_LIMIT, 0)
        );
    }

    #[test]
    fn tenths() {
        assert_eq!(to_tenths(1.0), 10);
        assert_eq!(from_tenths(14), 1.4);
        assert_eq!(from_tenths(1), SENSITIVITY_MIN);
        assert_eq!(from_tenths(99), SENSITIVITY_MAX);
    }
}
