//! Shared helpers for Decimal ↔ f64 conversions.
//!
//! Raw station measurements are stored as `NUMERIC` and carried as
//! `Decimal`; the engine works in `f64`. Conversions happen only at the
//! persistence boundary:
//!
//! - `f64_to_decimal`: preserves full f64 precision (raw temperature, gust, precipitation)
//! - `dec_to_f64` / `opt_dec_to_f64`: back to f64 for scoring and responses
//! - `round_2dp`: presentation rounding for averages
//!
//! Non-finite inputs map to `Decimal::ZERO`; the normalizer rejects them
//! before they get this far.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Convert an f64 to Decimal preserving full precision.
pub(crate) fn f64_to_decimal(v: f64) -> Decimal {
    if !v.is_finite() {
        tracing::warn!(
            "f64_to_decimal received non-finite value {}, defaulting to 0",
            v
        );
        return Decimal::ZERO;
    }
    Decimal::from_f64(v).unwrap_or_else(|| Decimal::new(v as i64, 0))
}

/// Convert a Decimal to f64, defaulting to 0.0 for values that can't be represented.
pub(crate) fn dec_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

/// Convert an Option<Decimal> to Option<f64>.
pub(crate) fn opt_dec_to_f64(d: Option<Decimal>) -> Option<f64> {
    d.and_then(|v| v.to_f64())
}

/// Round to two decimal places for display.
pub(crate) fn round_2dp(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_f64_to_decimal_keeps_precision() {
        let d = f64_to_decimal(85.47);
        assert_eq!(d, Decimal::from_str("85.47").unwrap());
    }

    #[test]
    fn test_f64_to_decimal_negative() {
        let d = f64_to_decimal(-3.5);
        assert_eq!(d, Decimal::from_str("-3.5").unwrap());
    }

    #[test]
    fn test_f64_to_decimal_nan() {
        assert_eq!(f64_to_decimal(f64::NAN), Decimal::ZERO);
    }

    #[test]
    fn test_f64_to_decimal_infinity() {
        assert_eq!(f64_to_decimal(f64::INFINITY), Decimal::ZERO);
        assert_eq!(f64_to_decimal(f64::NEG_INFINITY), Decimal::ZERO);
    }

    #[test]
    fn test_dec_to_f64_normal() {
        let d = Decimal::from_str("0.05").unwrap();
        assert!((dec_to_f64(d) - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_dec_to_f64_zero() {
        assert_eq!(dec_to_f64(Decimal::ZERO), 0.0);
    }

    #[test]
    fn test_opt_dec_to_f64() {
        assert_eq!(opt_dec_to_f64(None), None);
        let d = Decimal::from_str("12.5").unwrap();
        assert_eq!(opt_dec_to_f64(Some(d)), Some(12.5));
    }

    #[test]
    fn test_round_2dp() {
        assert_eq!(round_2dp(14.666_666), 14.67);
        assert_eq!(round_2dp(16.0), 16.0);
    }

    #[test]
    fn test_gust_round_trip_through_decimal() {
        // 12.5 mph must come back as exactly 12.5 so the gust band is unchanged
        assert_eq!(dec_to_f64(f64_to_decimal(12.5)), 12.5);
    }
}
