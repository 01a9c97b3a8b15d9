//! A fixed-point decimal with six digits after the point.
//!
//! Six digits gets an angle in degrees down to hundredths of an arc-second,
//! which is plenty for GPS coordinates, and keeps every conversion exact
//! enough to compare values read from different tags.

use alloc::string::String;
use core::{fmt::Write as _, str::FromStr};

use crate::ValueError;

/// A signed decimal number, stored as an integer count of millionths.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedFloat(i64);

impl FixedFloat {
    /// How many raw units make up `1.0`.
    pub const SCALE: i64 = 1_000_000;

    /// Zero.
    pub const ZERO: FixedFloat = FixedFloat(0);

    /// Creates a value from a raw count of millionths.
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// The raw count of millionths.
    pub const fn micros(self) -> i64 {
        self.0
    }

    /// Creates a value from a whole number.
    pub const fn from_int(v: i64) -> Self {
        Self(v * Self::SCALE)
    }

    /// The integer part, truncated toward zero.
    pub const fn trunc(self) -> i64 {
        self.0 / Self::SCALE
    }

    /// Whether the value is negative.
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// The absolute value.
    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// Parses a decimal number like `-122.0199`.
    ///
    /// Digits past the sixth fractional digit are dropped, not rounded.
    ///
    /// ```
    /// use photo_metadata_types::FixedFloat;
    ///
    /// let f = FixedFloat::parse(" 37.335440123 ").unwrap();
    /// assert_eq!(f.micros(), 37_335_440);
    /// ```
    pub fn parse(s: &str) -> Result<Self, ValueError> {
        let mut s = s.trim();
        let neg = s.starts_with('-');
        if neg {
            s = &s[1..];
        }
        if s.is_empty() {
            return Err(ValueError::FixedFloat);
        }

        let mut value: i64 = 0;
        let mut seen_point = false;
        let mut frac_digits = 0;
        for c in s.chars() {
            match c {
                '0'..='9' => {
                    if frac_digits >= 6 {
                        continue;
                    }
                    value = value
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(i64::from(c as u8 - b'0')))
                        .ok_or(ValueError::FixedFloat)?;
                    if seen_point {
                        frac_digits += 1;
                    }
                }
                '.' if !seen_point => seen_point = true,
                _ => return Err(ValueError::FixedFloat),
            }
        }
        while frac_digits < 6 {
            value = value.checked_mul(10).ok_or(ValueError::FixedFloat)?;
            frac_digits += 1;
        }

        Ok(Self(if neg { -value } else { value }))
    }

    /// The value nearest to `num / den`, rounding half away from zero.
    ///
    /// Fails when `den` isn't positive.
    pub fn from_fraction(num: i64, den: i64) -> Result<Self, ValueError> {
        if den <= 0 {
            return Err(ValueError::FixedFloat);
        }

        // compute with one extra digit, then round it off
        let tenths = i128::from(num) * i128::from(Self::SCALE) * 10 / i128::from(den);
        Ok(Self(round_tenths(tenths)))
    }

    /// Multiplies two values, truncating.
    pub fn mul(self, other: Self) -> Self {
        Self((i128::from(self.0) * i128::from(other.0) / i128::from(Self::SCALE)) as i64)
    }

    /// Divides two values, rounding half away from zero.
    ///
    /// Returns `None` when dividing by zero.
    pub fn div(self, other: Self) -> Option<Self> {
        if other.0 == 0 {
            return None;
        }
        let tenths = i128::from(self.0) * i128::from(Self::SCALE) * 10 / i128::from(other.0);
        Some(Self(round_tenths(tenths)))
    }
}

/// Drops the last decimal digit of `tenths`, rounding it half away from zero.
fn round_tenths(tenths: i128) -> i64 {
    let rem = tenths % 10;
    let base = tenths / 10;
    let rounded = if rem >= 5 {
        base + 1
    } else if rem <= -5 {
        base - 1
    } else {
        base
    };
    rounded as i64
}

impl core::ops::Add for FixedFloat {
    type Output = FixedFloat;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl core::ops::Sub for FixedFloat {
    type Output = FixedFloat;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl core::ops::Neg for FixedFloat {
    type Output = FixedFloat;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl core::fmt::Display for FixedFloat {
    /// Prints the shortest decimal form: no trailing zeros, no bare point.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let abs = self.0.unsigned_abs();
        let int = abs / Self::SCALE as u64;
        let frac = abs % Self::SCALE as u64;

        let mut s = String::new();
        if self.0 < 0 {
            s.push('-');
        }
        _ = write!(s, "{int}");
        if frac != 0 {
            let mut digits = String::new();
            _ = write!(digits, "{frac:06}");
            s.push('.');
            s.push_str(digits.trim_end_matches('0'));
        }
        f.write_str(&s)
    }
}

impl FromStr for FixedFloat {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::FixedFloat;

    #[test]
    fn parses_and_prints() {
        let f = FixedFloat::parse("-122.01990").unwrap();
        assert_eq!(f.micros(), -122_019_900);
        assert_eq!(f.to_string(), "-122.0199");

        assert_eq!(FixedFloat::parse("12").unwrap().to_string(), "12");
        assert_eq!(FixedFloat::from_micros(-500_000).to_string(), "-0.5");
        assert_eq!(FixedFloat::ZERO.to_string(), "0");

        assert!(FixedFloat::parse("").is_err());
        assert!(FixedFloat::parse("1.2.3").is_err());
        assert!(FixedFloat::parse("12a").is_err());
    }

    #[test]
    fn fractions_round_half_away_from_zero() {
        // 2/3 = 0.6666666... -> 0.666667
        assert_eq!(FixedFloat::from_fraction(2, 3).unwrap().micros(), 666_667);
        assert_eq!(FixedFloat::from_fraction(-2, 3).unwrap().micros(), -666_667);
        assert_eq!(FixedFloat::from_fraction(1, 8).unwrap().micros(), 125_000);
        assert!(FixedFloat::from_fraction(1, 0).is_err());
    }

    #[test]
    fn mul_and_div() {
        let feet = FixedFloat::from_micros(304_800);
        let meters = FixedFloat::from_int(200).mul(feet);
        assert_eq!(meters.micros(), 60_960_000);
        assert_eq!(meters.div(feet), Some(FixedFloat::from_int(200)));
        assert_eq!(meters.div(FixedFloat::ZERO), None);
    }
}
