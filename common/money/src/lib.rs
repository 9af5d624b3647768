use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use thiserror::Error;

/// Minor units per major unit for every supported currency (two-decimal currencies only).
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount must be positive, got {0}")]
    NonPositive(String),
    #[error("amount {0} does not fit in minor units")]
    OutOfRange(String),
}

/// Convert a positive major-unit amount to integer minor units (cents),
/// rounding half-up on the third decimal.
pub fn to_minor_units(amount: &BigDecimal) -> Result<i64, MoneyError> {
    if amount <= &BigDecimal::zero() {
        return Err(MoneyError::NonPositive(amount.to_string()));
    }
    let half = BigDecimal::new(5.into(), 1);
    let scaled = (amount * BigDecimal::from(MINOR_UNITS_PER_MAJOR) + half).with_scale(0);
    let minor = scaled
        .to_i64()
        .ok_or_else(|| MoneyError::OutOfRange(amount.to_string()))?;
    if minor == 0 {
        return Err(MoneyError::NonPositive(amount.to_string()));
    }
    Ok(minor)
}

pub fn from_minor_units(minor: i64) -> BigDecimal {
    BigDecimal::new(minor.into(), 2)
}

/// Round a positive amount to whole cents using the same rule as [`to_minor_units`].
pub fn round_to_cents(amount: &BigDecimal) -> Result<BigDecimal, MoneyError> {
    to_minor_units(amount).map(from_minor_units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn whole_amount_converts() {
        assert_eq!(to_minor_units(&BigDecimal::from(20)), Ok(2000));
    }

    #[test]
    fn fractional_cents_round_half_up() {
        assert_eq!(to_minor_units(&BigDecimal::from_str("19.994").unwrap()), Ok(1999));
        assert_eq!(to_minor_units(&BigDecimal::from_str("19.995").unwrap()), Ok(2000));
    }

    #[test]
    fn float_noise_is_absorbed() {
        // What serde produces for a JSON number like 19.99 parsed through f64.
        let noisy = BigDecimal::from_str("19.989999999999998436805981327779591083526611328125").unwrap();
        assert_eq!(to_minor_units(&noisy), Ok(1999));
    }

    #[test]
    fn rounds_to_two_decimals() {
        let rounded = round_to_cents(&BigDecimal::from_str("12.345").unwrap()).unwrap();
        assert_eq!(rounded.to_string(), "12.35");
    }

    #[test]
    fn non_positive_is_rejected() {
        assert!(matches!(to_minor_units(&BigDecimal::zero()), Err(MoneyError::NonPositive(_))));
        assert!(matches!(to_minor_units(&BigDecimal::from(-5)), Err(MoneyError::NonPositive(_))));
        assert!(matches!(to_minor_units(&BigDecimal::from_str("0.001").unwrap()), Err(MoneyError::NonPositive(_))));
    }
}
