//! Fixed-point numeric primitives.
//!
//! Prices and quantities cross the ingress boundary once, as decimal
//! strings, and are immediately converted to integer tick/qty units here.
//! Everything downstream — comparisons, sums, band queries — stays integer;
//! only egress formatting (`Ticks::to_decimal`) converts back to `f64`.

use crate::errors::ParseError;
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

/// Scale factor applied to quantities: 9 decimal places, matching the scale
/// used throughout the corpus for size/qty fields (see `core::fixed_point`
/// in the teacher crate).
pub const QTY_SCALE: i64 = 1_000_000_000;

/// A price expressed as an integer multiple of `tickSize = 10^-pricePrecision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticks(pub i64);

impl Ticks {
    pub const ZERO: Ticks = Ticks(0);

    #[inline]
    pub fn to_decimal(self, price_precision: u32) -> f64 {
        self.0 as f64 / 10f64.powi(price_precision as i32)
    }

    /// Floor this price to the nearest multiple of `resolution` ticks.
    ///
    /// Used to compute a zone's anchor price: `floor(price / (r*tickSize)) * (r*tickSize)`
    /// expressed purely in tick units (the tickSize factor cancels out).
    #[inline]
    pub fn floor_to(self, resolution: u32) -> Ticks {
        let r = resolution as i64;
        Ticks(self.0.div_euclid(r) * r)
    }

    #[inline]
    pub fn abs_diff(self, other: Ticks) -> i64 {
        (self.0 - other.0).abs()
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add<i64> for Ticks {
    type Output = Ticks;
    fn add(self, rhs: i64) -> Ticks {
        Ticks(self.0 + rhs)
    }
}

impl Sub<i64> for Ticks {
    type Output = Ticks;
    fn sub(self, rhs: i64) -> Ticks {
        Ticks(self.0 - rhs)
    }
}

impl Sub<Ticks> for Ticks {
    type Output = i64;
    fn sub(self, rhs: Ticks) -> i64 {
        self.0 - rhs.0
    }
}

/// A quantity expressed in fixed-point units, scaled by [`QTY_SCALE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Qty(pub i64);

impl Qty {
    pub const ZERO: Qty = Qty(0);

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn to_decimal(self) -> f64 {
        self.0 as f64 / QTY_SCALE as f64
    }

    #[inline]
    pub fn saturating_add(self, rhs: Qty) -> Qty {
        Qty(self.0.saturating_add(rhs.0))
    }
}

impl fmt::Display for Qty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl Add for Qty {
    type Output = Qty;
    fn add(self, rhs: Qty) -> Qty {
        Qty(self.0 + rhs.0)
    }
}

impl Sub for Qty {
    type Output = Qty;
    fn sub(self, rhs: Qty) -> Qty {
        Qty(self.0 - rhs.0)
    }
}

impl Mul<i64> for Qty {
    type Output = Qty;
    fn mul(self, rhs: i64) -> Qty {
        Qty(self.0 * rhs)
    }
}

impl Div<i64> for Qty {
    type Output = Qty;
    fn div(self, rhs: i64) -> Qty {
        Qty(self.0 / rhs)
    }
}

/// Parse a decimal price string into tick units for the given precision.
///
/// Mirrors `core::fixed_point::from_f64_checked` in spirit (reject NaN /
/// infinite / unparsable input) but scales by the book's configured
/// `pricePrecision` rather than a fixed 9-decimal scale, since tick size is
/// a per-book configuration value here, not a fixed feed constant.
pub fn parse_price(raw: &str, price_precision: u32) -> Result<Ticks, ParseError> {
    let value: f64 = raw
        .parse()
        .map_err(|_| ParseError::InvalidNumber(raw.to_string()))?;
    if !value.is_finite() {
        return Err(ParseError::InvalidNumber(raw.to_string()));
    }
    let scale = 10f64.powi(price_precision as i32);
    Ok(Ticks((value * scale).round() as i64))
}

/// Parse a decimal quantity string into fixed-point qty units.
pub fn parse_qty(raw: &str) -> Result<Qty, ParseError> {
    let value: f64 = raw
        .parse()
        .map_err(|_| ParseError::InvalidNumber(raw.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(ParseError::InvalidNumber(raw.to_string()));
    }
    Ok(Qty((value * QTY_SCALE as f64).round() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_price_round_trips() {
        let ticks = parse_price("89.01", 2).unwrap();
        assert_eq!(ticks, Ticks(8901));
        assert!((ticks.to_decimal(2) - 89.01).abs() < 1e-9);
    }

    #[test]
    fn parse_price_rejects_nan() {
        assert!(parse_price("nan", 2).is_err());
        assert!(parse_price("not-a-number", 2).is_err());
    }

    #[test]
    fn floor_to_resolution_groups_ticks() {
        // tickSize = 0.01, resolution 5 ticks -> 0.05 wide buckets
        let price = Ticks(8903); // 89.03
        assert_eq!(price.floor_to(5), Ticks(8900));
        let price = Ticks(8905);
        assert_eq!(price.floor_to(5), Ticks(8905));
    }

    #[test]
    fn qty_parses_and_formats() {
        let q = parse_qty("1.5").unwrap();
        assert_eq!(q.0, 1_500_000_000);
        assert_eq!(format!("{}", q), "1.5");
    }
}
