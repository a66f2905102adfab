//! Decimal rounding of emitted values.
//!
//! Two conventions are used on everything the crate writes out:
//!
//! | Values | Places | Mode |
//! |--------|--------|------|
//! | topic-topic similarity matrices | 15 | half-up |
//! | linkage distances, topic weights, totals | 4 | up (away from zero) |
//! | comparison CSV cells | 6 | up |
//!
//! Golden files produced downstream depend on these, so they are applied at
//! the point a value is stored, not when it is printed.

/// Scaled values within this distance of an integer are treated as exact.
const NOISE: f64 = 1e-9;

/// Round away from zero to `places` decimals.
///
/// Binary noise such as `0.1 * 3.0 = 0.30000000000000004` does not bump the
/// result to the next decimal.
pub fn round_up(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scale = 10f64.powi(places as i32);
    let scaled = value.abs() * scale;
    let nearest = scaled.round();
    let magnitude = if (scaled - nearest).abs() < NOISE {
        nearest
    } else {
        scaled.ceil()
    };
    (magnitude / scale).copysign(value)
}

/// Round half away from zero to `places` decimals.
pub fn round_half_up(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scale = 10f64.powi(places as i32);
    (value * scale).round() / scale
}

/// Four decimals, rounded up. Used for weights, totals and linkage distances.
#[inline]
pub fn weight(value: f64) -> f64 {
    round_up(value, 4)
}

/// Fifteen decimals, half-up. Used for topic-topic matrices.
#[inline]
pub fn matrix_cell(value: f64) -> f64 {
    round_half_up(value, 15)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_up_moves_away_from_zero() {
        assert_eq!(round_up(0.12341, 4), 0.1235);
        assert_eq!(round_up(-0.12341, 4), -0.1235);
        assert_eq!(round_up(1.0 / 3.0, 4), 0.3334);
    }

    #[test]
    fn test_round_up_ignores_binary_noise() {
        assert_eq!(round_up(0.1, 4), 0.1);
        assert_eq!(round_up(0.1 * 3.0, 4), 0.3);
        assert_eq!(round_up(2.0, 4), 2.0);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(0.125, 2), 0.13);
        assert_eq!(round_half_up(0.124, 2), 0.12);
        assert!((matrix_cell(1.0 / 3.0) - 1.0 / 3.0).abs() < 1e-15);
    }

    #[test]
    fn test_non_finite_passthrough() {
        assert!(round_up(f64::NAN, 4).is_nan());
        assert_eq!(round_half_up(f64::INFINITY, 4), f64::INFINITY);
    }
}
