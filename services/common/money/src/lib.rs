use bigdecimal::BigDecimal;
use bigdecimal::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;

/// Rounding applied when reducing monetary values to 2 decimal places.
/// Selected once per process from `MONEY_ROUNDING` (half_up | bankers |
/// truncate); unset or unrecognized falls back to half-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingMode {
    HalfUp,
    Bankers,
    Truncate,
}

static ROUNDING_MODE: OnceLock<RoundingMode> = OnceLock::new();

fn mode_from_env() -> RoundingMode {
    match std::env::var("MONEY_ROUNDING").as_deref() {
        Ok("bankers") => RoundingMode::Bankers,
        Ok("truncate") => RoundingMode::Truncate,
        _ => RoundingMode::HalfUp,
    }
}

pub fn rounding_mode() -> RoundingMode {
    *ROUNDING_MODE.get_or_init(mode_from_env)
}

/// Emit the active rounding mode at startup so operators can spot a
/// misconfigured environment before any invoice is computed.
pub fn log_rounding_mode_once() {
    tracing::info!(mode = ?rounding_mode(), "monetary rounding mode");
}

fn half_cent() -> BigDecimal {
    BigDecimal::from_str("0.005").unwrap()
}

fn half_up2(value: &BigDecimal) -> BigDecimal {
    let adjust = if *value < BigDecimal::from(0) { -half_cent() } else { half_cent() };
    (value + adjust).with_scale(2)
}

fn bankers2(value: &BigDecimal) -> BigDecimal {
    // with_scale truncates toward zero, leaving a remainder in (-0.01, 0.01)
    let truncated = value.with_scale(2);
    let remainder = value - &truncated;
    let abs_rem = if remainder < BigDecimal::from(0) { -remainder.clone() } else { remainder };
    if abs_rem > half_cent() {
        return half_up2(value);
    }
    if abs_rem < half_cent() {
        return truncated;
    }
    // exact midpoint: keep the final cent even
    let cents = (&truncated * BigDecimal::from(100)).with_scale(0);
    match cents.to_i64() {
        Some(c) if c % 2 == 0 => truncated,
        Some(_) => half_up2(value),
        None => half_up2(value),
    }
}

/// Normalize a monetary value to 2 decimal places under an explicit mode.
pub fn normalize_with(value: &BigDecimal, mode: RoundingMode) -> BigDecimal {
    match mode {
        RoundingMode::HalfUp => half_up2(value),
        RoundingMode::Bankers => bankers2(value),
        RoundingMode::Truncate => value.with_scale(2),
    }
}

/// Normalize a monetary value to 2 decimal places under the process mode.
pub fn normalize_scale(value: &BigDecimal) -> BigDecimal {
    normalize_with(value, rounding_mode())
}

/// Compare two monetary values allowing a tolerance (in cents) after normalization.
pub fn nearly_equal(a: &BigDecimal, b: &BigDecimal, cents_tolerance: i64) -> bool {
    let na = normalize_scale(a);
    let nb = normalize_scale(b);
    let diff = (na - nb).with_scale(2);
    let cents = diff.to_f64().unwrap_or(0.0) * 100.0;
    cents.abs() <= cents_tolerance as f64
}

/// A monetary amount guaranteed to carry exactly 2 decimal places.
/// Decodes straight from NUMERIC columns, normalizing on the way in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Money(BigDecimal);

impl Money {
    pub fn new(raw: BigDecimal) -> Self {
        Self(normalize_scale(&raw))
    }

    pub fn zero() -> Self {
        Self(BigDecimal::from(0).with_scale(2))
    }

    pub fn inner(&self) -> &BigDecimal {
        &self.0
    }

    pub fn into_inner(self) -> BigDecimal {
        self.0
    }
}

impl From<BigDecimal> for Money {
    fn from(value: BigDecimal) -> Self {
        Self::new(value)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <BigDecimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <BigDecimal as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
        Ok(Money::new(raw))
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for Money {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <BigDecimal as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bd(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn truncate_drops_extra_digits() {
        assert_eq!(normalize_with(&bd("12.3456"), RoundingMode::Truncate).to_string(), "12.34");
        assert_eq!(normalize_with(&bd("-12.3456"), RoundingMode::Truncate).to_string(), "-12.34");
    }

    #[test]
    fn half_up_rounds_midpoint_away_from_zero() {
        assert_eq!(normalize_with(&bd("12.345"), RoundingMode::HalfUp).to_string(), "12.35");
        assert_eq!(normalize_with(&bd("12.344"), RoundingMode::HalfUp).to_string(), "12.34");
        assert_eq!(normalize_with(&bd("-12.345"), RoundingMode::HalfUp).to_string(), "-12.35");
    }

    #[test]
    fn bankers_keeps_even_cent_on_tie() {
        assert_eq!(normalize_with(&bd("0.125"), RoundingMode::Bankers).to_string(), "0.12");
        assert_eq!(normalize_with(&bd("0.135"), RoundingMode::Bankers).to_string(), "0.14");
        assert_eq!(normalize_with(&bd("-0.125"), RoundingMode::Bankers).to_string(), "-0.12");
    }

    #[test]
    fn nearly_equal_within_cent() {
        assert!(nearly_equal(&bd("10.001"), &bd("10.009"), 1));
        assert!(!nearly_equal(&bd("10.00"), &bd("10.05"), 1));
    }

    #[test]
    fn money_normalizes_on_construction() {
        let m = Money::new(bd("7.999"));
        assert_eq!(m.inner(), &normalize_scale(&bd("7.999")));
    }
}
