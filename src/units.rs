//! This module defines the unit types used for prices, incomes and time.
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Mul;

/// The number of months in a year, used for annualising monthly premiums
pub const MONTHS_PER_YEAR: i64 = 12;

macro_rules! unit_struct {
    ($name:ident, $inner:ty, $fmt:literal) => {
        /// Represents a type of quantity.
        #[derive(
            Debug,
            Default,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Serialize,
            Deserialize,
            derive_more::Add,
            derive_more::Sub,
            derive_more::Display,
        )]
        #[display($fmt, _0)]
        pub struct $name(pub $inner);

        impl $name {
            /// Creates a new instance of the unit type from a raw value.
            pub const fn new(val: $inner) -> Self {
                Self(val)
            }

            /// Returns the raw value of the unit type.
            pub const fn value(self) -> $inner {
                self.0
            }
        }

        impl Mul<$inner> for $name {
            type Output = $name;

            fn mul(self, rhs: $inner) -> $name {
                $name(self.0 * rhs)
            }
        }
    };
}

// Whole euros. All tariff arithmetic is exact integer arithmetic.
unit_struct!(Money, i64, "{}€");

// Time units for the debounce and latency timers.
unit_struct!(Millis, u64, "{}ms");

impl Money {
    /// The zero amount
    pub const ZERO: Money = Money(0);

    /// Convert a monthly amount into an annual one
    pub fn annualised(self) -> Money {
        self * MONTHS_PER_YEAR
    }

    /// Subtract `rhs`, flooring the result at zero
    pub fn saturating_sub_floor(self, rhs: Money) -> Money {
        (self - rhs).max(Money::ZERO)
    }
}

const CENTS_PER_EURO: i64 = 100;

/// A monthly income.
///
/// Incomes may have a fractional part, so they are held in cents. They compare directly with
/// [`Money`] amounts, which is all the tariff needs of them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Income(i64);

impl Income {
    /// An income of a whole number of euros
    pub const fn euros(euros: i64) -> Self {
        Self(euros * CENTS_PER_EURO)
    }

    /// An income given in euros as a decimal, rounded to the nearest cent.
    ///
    /// Returns `None` if the value is not finite or is too large to hold.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn from_decimal(euros: f64) -> Option<Self> {
        let cents = (euros * CENTS_PER_EURO as f64).round();
        if cents.is_finite() && cents.abs() < i64::MAX as f64 {
            Some(Self(cents as i64))
        } else {
            None
        }
    }

    /// The income in euros, as a decimal
    #[allow(clippy::cast_precision_loss)]
    pub fn to_decimal(self) -> f64 {
        self.0 as f64 / CENTS_PER_EURO as f64
    }

    /// The whole euros of the income, if it has no fractional part
    pub fn whole_euros(self) -> Option<Money> {
        (self.0 % CENTS_PER_EURO == 0).then_some(Money(self.0 / CENTS_PER_EURO))
    }
}

impl From<Money> for Income {
    fn from(amount: Money) -> Self {
        Self::euros(amount.value())
    }
}

impl PartialEq<Money> for Income {
    fn eq(&self, other: &Money) -> bool {
        *self == Income::from(*other)
    }
}

impl PartialOrd<Money> for Income {
    fn partial_cmp(&self, other: &Money) -> Option<Ordering> {
        Some(self.cmp(&Income::from(*other)))
    }
}

impl PartialEq<Income> for Money {
    fn eq(&self, other: &Income) -> bool {
        Income::from(*self) == *other
    }
}

impl PartialOrd<Income> for Money {
    fn partial_cmp(&self, other: &Income) -> Option<Ordering> {
        Some(Income::from(*self).cmp(other))
    }
}

impl fmt::Display for Income {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.whole_euros() {
            Some(euros) => write!(f, "{euros}"),
            None => write!(f, "{}€", self.to_decimal()),
        }
    }
}

// Whole incomes are written as integers, so answers without cents read as before.
impl Serialize for Income {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.whole_euros() {
            Some(euros) => serializer.serialize_i64(euros.value()),
            None => serializer.serialize_f64(self.to_decimal()),
        }
    }
}

impl<'de> Deserialize<'de> for Income {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let euros = f64::deserialize(deserializer)?;
        Income::from_decimal(euros)
            .ok_or_else(|| serde::de::Error::custom(format!("income out of range: {euros}")))
    }
}

/// Group the digits of `value` in threes with a narrow no-break space, as the `fr-FR` locale does
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('\u{202f}');
        }
        grouped.push(ch);
    }

    grouped
}

/// Format a whole-euro amount the way prices are shown on the site (e.g. `1 920 €`).
///
/// Thousands are separated with a narrow no-break space, as in the `fr-FR` locale.
pub fn format_price(amount: Money) -> String {
    let sign = if amount.value() < 0 { "-" } else { "" };
    format!(
        "{sign}{}\u{a0}€",
        group_thousands(amount.value().unsigned_abs())
    )
}

/// Format an income like [`format_price`], with cents after a decimal comma if there are any
pub fn format_income(income: Income) -> String {
    let sign = if income.0 < 0 { "-" } else { "" };
    let cents = income.0.unsigned_abs();
    let euros = group_thousands(cents / CENTS_PER_EURO.unsigned_abs());
    match cents % CENTS_PER_EURO.unsigned_abs() {
        0 => format!("{sign}{euros}\u{a0}€"),
        fraction => format!("{sign}{euros},{fraction:02}\u{a0}€"),
    }
}
