use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
///
/// Power, distances, efficiencies and event magnitudes all use this type so
/// that a tick produces bit-identical results for identical inputs.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Convert an f64 to Fixed64. Use only for initialization, never in the tick path.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display and logging.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Clamp a value into `[0, 1]`.
#[inline]
pub fn clamp_unit(v: Fixed64) -> Fixed64 {
    v.clamp(Fixed64::ZERO, Fixed64::ONE)
}

/// Checked division for Fixed64 that returns None on zero divisor or overflow.
#[inline]
pub fn checked_div_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_div(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed64_basic_arithmetic() {
        let a = f64_to_fixed64(1.5);
        let b = f64_to_fixed64(2.0);
        assert_eq!(fixed64_to_f64(a + b), 3.5);
    }

    #[test]
    fn clamp_unit_bounds() {
        assert_eq!(clamp_unit(f64_to_fixed64(-0.5)), Fixed64::ZERO);
        assert_eq!(clamp_unit(f64_to_fixed64(1.5)), Fixed64::ONE);
        assert_eq!(clamp_unit(f64_to_fixed64(0.25)), f64_to_fixed64(0.25));
    }

    #[test]
    fn checked_div_by_zero() {
        assert!(checked_div_64(Fixed64::ONE, Fixed64::ZERO).is_none());
        assert_eq!(
            checked_div_64(f64_to_fixed64(3.0), f64_to_fixed64(2.0)),
            Some(f64_to_fixed64(1.5))
        );
    }

    #[test]
    fn fixed64_determinism() {
        let a = f64_to_fixed64(1.0 / 3.0);
        let b = f64_to_fixed64(1.0 / 3.0);
        assert_eq!(a * f64_to_fixed64(3.0), b * f64_to_fixed64(3.0));
    }
}
