//! Fixed-point monetary amounts with four decimal places.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::TypesError;

/// Units per whole currency unit (10^4).
pub const MONEY_SCALE: u64 = 10_000;

const DECIMALS: usize = 4;

/// Non-negative amount stored as ten-thousandths.
///
/// Serialized as a decimal string (`"5.0000"`) so that clients never see a
/// float. Deserialization also accepts a bare integer of whole units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_units(units: u64) -> Self {
        Self(units)
    }

    pub fn from_whole(whole: u64) -> Option<Self> {
        whole.checked_mul(MONEY_SCALE).map(Self)
    }

    pub const fn units(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// `points / rate` in fixed point, rounded down.
    /// Returns `None` for a zero rate or an amount that does not fit.
    pub fn from_exchange(points: u64, rate: u64) -> Option<Money> {
        if rate == 0 {
            return None;
        }
        let units = u128::from(points) * u128::from(MONEY_SCALE) / u128::from(rate);
        u64::try_from(units).ok().map(Money)
    }

    /// Amount in cents, rounded half-up.
    pub fn cents_rounded(self) -> u64 {
        self.0.saturating_add(50) / 100
    }

    /// Two-decimal rendering (`"1.00"`), rounded half-up.
    pub fn format_cents(self) -> String {
        let cents = self.cents_rounded();
        format!("{}.{:02}", cents / 100, cents % 100)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:0width$}",
            self.0 / MONEY_SCALE,
            self.0 % MONEY_SCALE,
            width = DECIMALS
        )
    }
}

impl FromStr for Money {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypesError::InvalidMoney(s.to_string());
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if s.contains('.') && frac.is_empty() {
            return Err(invalid());
        }
        if frac.len() > DECIMALS || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: u64 = whole.parse().map_err(|_| invalid())?;
        let mut frac_units: u64 = 0;
        for (i, b) in frac.bytes().enumerate() {
            let digit = u64::from(b - b'0');
            frac_units += digit * 10u64.pow((DECIMALS - 1 - i) as u32);
        }

        whole
            .checked_mul(MONEY_SCALE)
            .and_then(|u| u.checked_add(frac_units))
            .map(Money)
            .ok_or_else(invalid)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MoneyVisitor;

        impl Visitor<'_> for MoneyVisitor {
            type Value = Money;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal string with at most 4 fraction digits, or whole units")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
                Money::from_whole(v).ok_or_else(|| E::custom("money amount overflow"))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
                let v = u64::try_from(v).map_err(|_| E::custom("money amount is negative"))?;
                self.visit_u64(v)
            }
        }

        deserializer.deserialize_any(MoneyVisitor)
    }
}
