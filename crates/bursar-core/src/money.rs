//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  The legacy fee screens compared balances with an 0.01 epsilon          │
//! │  because float accumulation left near-zero remainders:                  │
//! │    100.0 - 33.33 - 33.33 - 33.34 = 0.000000000000014  ❌                │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    10000 - 3333 - 3333 - 3334 = 0  exactly                              │
//! │                                                                         │
//! │  With integer cents, "paid in full" is `balance == 0`, no epsilon,      │
//! │  and clamping to zero is exact.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bursar_core::money::Money;
//!
//! let owed = Money::from_cents(10_000); // 100.00
//! let paid = Money::from_cents(2_500);  //  25.00
//! assert_eq!((owed - paid).cents(), 7_500);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows intermediate negative values during arithmetic;
///   persisted balances are always clamped to zero or above
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
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

    /// Returns the smaller of two Money values.
    ///
    /// ## Usage
    /// The allocation cascade applies `min(remaining payment, balance)` to
    /// each installment in due-date order.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    /// Subtracts `other`, clamping the result at zero.
    ///
    /// ## Example
    /// ```rust
    /// use bursar_core::money::Money;
    ///
    /// let owed = Money::from_cents(100);
    /// let paid = Money::from_cents(250);
    /// assert_eq!(owed.clamped_sub(paid).cents(), 0); // never negative
    /// ```
    ///
    /// ## Why Clamp?
    /// Derived balances (`amount - discount - paid`) must never be shown as
    /// negative, even when a payment overshoots. The overshoot is reported
    /// separately as a remainder, not hidden in a negative balance.
    #[inline]
    pub const fn clamped_sub(self, other: Self) -> Self {
        let diff = self.0 - other.0;
        if diff < 0 {
            Money(0)
        } else {
            Money(diff)
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for debugging and log output. Receipt rendering and localization
/// are handled by the external PDF layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
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

// =============================================================================
// Unit Tests
// =============================================================================
