//! # Money Module
//!
//! Provides the `Money` and `Rate` types used by every price in the checkout.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ONE UNIT, NO FRACTIONS                                                 │
//! │                                                                         │
//! │  Catalog prices, discounts, shipping, tax and loyalty deductions are    │
//! │  all whole currency-minor-units (i64).                                  │
//! │                                                                         │
//! │  Percentages are basis points (u32):                                    │
//! │    10% tax        = 1000 bps                                            │
//! │    15% discount   = 1500 bps                                            │
//! │                                                                         │
//! │  amount × rate is computed in i128 and rounded half-up ONCE,            │
//! │  so the preview and the commit path can never drift apart.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use checkout_core::money::{Money, Rate};
//!
//! let unit_price = Money::from_minor(800_000);
//! let line_total = unit_price * 2;
//! assert_eq!(line_total.minor(), 1_600_000);
//!
//! let tax = line_total.apply_rate(Rate::from_bps(1000));
//! assert_eq!(tax.minor(), 160_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

/// Basis points in 100%.
pub const BPS_PER_WHOLE: u32 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in currency-minor-units.
///
/// ## Design Decisions
/// - **i64 (signed)**: intermediate results may go negative before the
///   total is floored at zero
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Serialized as a bare number** so the UI receives plain integers
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Variant.price / Product.base_price ──► PricedLine.unit_price           │
/// │                                            │                            │
/// │                                            ▼                            │
/// │  PricedLine.line_total ──► subtotal ──┬──► discount (clamped)           │
/// │                                       ├──► loyalty deduction            │
/// │                                       ├──► shipping                     │
/// │                                       └──► tax                          │
/// │                                              │                          │
/// │                                              ▼                          │
/// │                                   PriceBreakdown.total                  │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[serde(transparent)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from currency-minor-units.
    ///
    /// ## Example
    /// ```rust
    /// use checkout_core::money::Money;
    ///
    /// let price = Money::from_minor(50_000);
    /// assert_eq!(price.minor(), 50_000);
    /// ```
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in currency-minor-units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Clamps negative values to zero.
    ///
    /// ## Example
    /// ```rust
    /// use checkout_core::money::Money;
    ///
    /// assert_eq!(Money::from_minor(-10).floor_zero(), Money::zero());
    /// assert_eq!(Money::from_minor(10).floor_zero().minor(), 10);
    /// ```
    #[inline]
    pub const fn floor_zero(self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            self
        }
    }

    /// Multiplies by a rate and rounds half-up to the minor unit.
    ///
    /// ## Implementation
    /// `(amount * bps + 5000) / 10000` in i128, so large subtotals cannot
    /// overflow the intermediate product.
    ///
    /// ## Example
    /// ```rust
    /// use checkout_core::money::{Money, Rate};
    ///
    /// // 10% of 800,000
    /// let tax = Money::from_minor(800_000).apply_rate(Rate::from_bps(1000));
    /// assert_eq!(tax.minor(), 80_000);
    ///
    /// // 15% of 333 = 49.95 -> 50
    /// let off = Money::from_minor(333).apply_rate(Rate::from_percent(15));
    /// assert_eq!(off.minor(), 50);
    /// ```
    pub fn apply_rate(&self, rate: Rate) -> Money {
        let scaled = self.0 as i128 * rate.bps() as i128;
        let half = (BPS_PER_WHOLE / 2) as i128;
        let rounded = if scaled >= 0 {
            (scaled + half) / BPS_PER_WHOLE as i128
        } else {
            (scaled - half) / BPS_PER_WHOLE as i128
        };
        Money::from_minor(rounded as i64)
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use checkout_core::money::Money;
    ///
    /// let unit_price = Money::from_minor(299_000);
    /// assert_eq!(unit_price.multiply_quantity(3).minor(), 897_000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// `self × qty`, or `None` if the product does not fit in an `i64`.
    #[inline]
    pub const fn checked_mul(self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// `self + other`, or `None` on overflow.
    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Whole multiples of `unit` that fit into this amount (floor division).
    ///
    /// Returns 0 for a non-positive unit or a negative amount.
    ///
    /// ## Example
    /// ```rust
    /// use checkout_core::money::Money;
    ///
    /// let subtotal = Money::from_minor(300_999);
    /// assert_eq!(subtotal.whole_units_of(Money::from_minor(1000)), 300);
    /// ```
    #[inline]
    pub const fn whole_units_of(&self, unit: Money) -> i64 {
        if unit.0 <= 0 || self.0 < 0 {
            0
        } else {
            self.0 / unit.0
        }
    }
}

// =============================================================================
// Rate Type
// =============================================================================

/// A proportional rate in basis points (1 bp = 0.01%).
///
/// ## Why Basis Points?
/// 1000 bps = 10% (the flat checkout tax), 10000 bps = 100%. Integer bps
/// keep percentage discounts and tax exact until the single rounding step in
/// [`Money::apply_rate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Creates a rate from a whole percentage (10 -> 10%).
    #[inline]
    pub const fn from_percent(percent: u32) -> Self {
        Rate(percent * 100)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Groups digits in thousands: `1,250,000`.
///
/// ## Note
/// This is for logs and error messages. The UI formats amounts itself.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        if self.0 < 0 {
            write!(f, "-{grouped}")
        } else {
            f.write_str(&grouped)
        }
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by a line quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_minor(800_000);
        let b = Money::from_minor(50_000);

        assert_eq!((a + b).minor(), 850_000);
        assert_eq!((a - b).minor(), 750_000);
        assert_eq!((b * 3).minor(), 150_000);

        let mut c = a;
        c += b;
        c -= Money::from_minor(1);
        assert_eq!(c.minor(), 849_999);
    }

    #[test]
    fn test_checked_arithmetic() {
        let price = Money::from_minor(250_000);
        assert_eq!(price.checked_mul(3), Some(Money::from_minor(750_000)));
        assert_eq!(price.checked_add(price), Some(Money::from_minor(500_000)));

        assert_eq!(Money::from_minor(i64::MAX / 50).checked_mul(99), None);
        assert_eq!(Money::from_minor(i64::MAX).checked_add(Money::from_minor(1)), None);
    }

    #[test]
    fn test_money_sum() {
        let lines = [Money::from_minor(100), Money::from_minor(250), Money::from_minor(650)];
        let total: Money = lines.iter().sum();
        assert_eq!(total.minor(), 1000);

        let empty: Vec<Money> = Vec::new();
        assert_eq!(empty.into_iter().sum::<Money>(), Money::zero());
    }

    #[test]
    fn test_apply_rate_rounds_half_up() {
        // 10% of 15 = 1.5 -> 2
        assert_eq!(Money::from_minor(15).apply_rate(Rate::from_percent(10)).minor(), 2);
        // 10% of 14 = 1.4 -> 1
        assert_eq!(Money::from_minor(14).apply_rate(Rate::from_percent(10)).minor(), 1);
        // 100% is identity
        assert_eq!(
            Money::from_minor(123_457).apply_rate(Rate::from_percent(100)).minor(),
            123_457
        );
        assert_eq!(Money::from_minor(999).apply_rate(Rate::zero()), Money::zero());
    }

    #[test]
    fn test_apply_rate_large_amount() {
        let big = Money::from_minor(9_000_000_000_000_000);
        assert_eq!(
            big.apply_rate(Rate::from_percent(10)).minor(),
            900_000_000_000_000
        );
    }

    #[test]
    fn test_whole_units_of() {
        let unit = Money::from_minor(1000);
        assert_eq!(Money::from_minor(300_000).whole_units_of(unit), 300);
        assert_eq!(Money::from_minor(999).whole_units_of(unit), 0);
        assert_eq!(Money::from_minor(-5000).whole_units_of(unit), 0);
        assert_eq!(Money::from_minor(5000).whole_units_of(Money::zero()), 0);
    }

    #[test]
    fn test_floor_zero() {
        assert_eq!(Money::from_minor(-1).floor_zero(), Money::zero());
        assert_eq!(Money::from_minor(0).floor_zero(), Money::zero());
        assert_eq!(Money::from_minor(7).floor_zero().minor(), 7);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_minor(0).to_string(), "0");
        assert_eq!(Money::from_minor(999).to_string(), "999");
        assert_eq!(Money::from_minor(1000).to_string(), "1,000");
        assert_eq!(Money::from_minor(1_250_000).to_string(), "1,250,000");
        assert_eq!(Money::from_minor(-50_000).to_string(), "-50,000");
    }

    #[test]
    fn test_rate_display() {
        assert_eq!(Rate::from_bps(1000).to_string(), "10.00%");
        assert_eq!(Rate::from_bps(825).to_string(), "8.25%");
    }

    #[test]
    fn test_money_serializes_as_number() {
        let json = serde_json::to_string(&Money::from_minor(880_000)).unwrap();
        assert_eq!(json, "880000");
        let back: Money = serde_json::from_str("50000").unwrap();
        assert_eq!(back, Money::from_minor(50_000));
    }
}
