//! Fixed-point decimal numbers.
//!
//! Thresholds and sampled values are stored as integers scaled by `10^SCALE`
//! so every comparison is an exact integer comparison. The scale is a const
//! generic: a load average (`Fixed<3>`) and a swap ratio (`Fixed<2>`) are
//! different types and cannot be compared by accident.

use std::fmt;

/// 1-minute load average, three fractional digits (`10.5` → `10500`).
pub type LoadAvg = Fixed<3>;

/// Swap usage in percent, two fractional digits (`50%` → `5000`).
pub type SwapRatio = Fixed<2>;

/// Error returned when a decimal string is not a valid fixed-point number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixedError {
    /// No digits at all (`""`, `"."`).
    Empty,
    /// A byte other than an ASCII digit or a single `.`.
    InvalidChar(char),
    /// More than one `.`.
    MultipleDots,
    /// More fractional digits than the scale allows.
    TooPrecise { scale: u32 },
    /// Value does not fit into `i64` after scaling.
    Overflow,
}

impl fmt::Display for FixedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixedError::Empty => write!(f, "no digits"),
            FixedError::InvalidChar(c) => write!(f, "unexpected character {:?}", c),
            FixedError::MultipleDots => write!(f, "more than one decimal point"),
            FixedError::TooPrecise { scale } => {
                write!(f, "more than {} fractional digits", scale)
            }
            FixedError::Overflow => write!(f, "value too large"),
        }
    }
}

impl std::error::Error for FixedError {}

/// Non-negative decimal number scaled by `10^SCALE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed<const SCALE: u32>(i64);

impl<const SCALE: u32> Fixed<SCALE> {
    pub const ZERO: Self = Self(0);

    /// Wraps an already scaled integer.
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// The scaled integer.
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// `10^SCALE`.
    pub const fn factor() -> i64 {
        10i64.pow(SCALE)
    }

    /// Parses a decimal string.
    ///
    /// Missing fractional digits are zero-filled, so with `SCALE = 3` both
    /// `"10"` and `"10.000"` give `10000`, while `"10.0000"` is rejected.
    /// Signs and whitespace are not accepted.
    pub fn parse(input: &str) -> Result<Self, FixedError> {
        let mut value: i64 = 0;
        let mut digits = 0usize;
        let mut fraction: Option<u32> = None;

        for c in input.chars() {
            if c == '.' {
                if fraction.is_some() {
                    return Err(FixedError::MultipleDots);
                }
                fraction = Some(0);
                continue;
            }

            let d = c.to_digit(10).ok_or(FixedError::InvalidChar(c))?;

            if let Some(n) = fraction.as_mut() {
                if *n == SCALE {
                    return Err(FixedError::TooPrecise { scale: SCALE });
                }
                *n += 1;
            }

            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(i64::from(d)))
                .ok_or(FixedError::Overflow)?;
            digits += 1;
        }

        if digits == 0 {
            return Err(FixedError::Empty);
        }

        let pad = SCALE - fraction.unwrap_or(0);
        value
            .checked_mul(10i64.pow(pad))
            .map(Self)
            .ok_or(FixedError::Overflow)
    }
}

impl<const SCALE: u32> fmt::Display for Fixed<SCALE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if SCALE == 0 {
            return write!(f, "{}", self.0);
        }
        let factor = Self::factor();
        write!(
            f,
            "{}.{:0width$}",
            self.0 / factor,
            self.0 % factor,
            width = SCALE as usize
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integer_and_padded_fraction() {
        assert_eq!(LoadAvg::parse("10").unwrap().raw(), 10000);
        assert_eq!(LoadAvg::parse("10.000").unwrap().raw(), 10000);
        assert_eq!(LoadAvg::parse("10.5").unwrap().raw(), 10500);
        assert_eq!(LoadAvg::parse("0.001").unwrap().raw(), 1);
        assert_eq!(SwapRatio::parse("50").unwrap().raw(), 5000);
        assert_eq!(SwapRatio::parse("75.25").unwrap().raw(), 7525);
    }

    #[test]
    fn test_parse_trailing_and_leading_dot() {
        assert_eq!(LoadAvg::parse("10.").unwrap().raw(), 10000);
        assert_eq!(LoadAvg::parse(".5").unwrap().raw(), 500);
    }

    #[test]
    fn test_parse_rejects_over_precision() {
        assert_eq!(
            LoadAvg::parse("10.0000"),
            Err(FixedError::TooPrecise { scale: 3 })
        );
        assert_eq!(
            SwapRatio::parse("1.001"),
            Err(FixedError::TooPrecise { scale: 2 })
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(LoadAvg::parse(""), Err(FixedError::Empty));
        assert_eq!(LoadAvg::parse("."), Err(FixedError::Empty));
        assert_eq!(LoadAvg::parse("-1"), Err(FixedError::InvalidChar('-')));
        assert_eq!(LoadAvg::parse("1.2.3"), Err(FixedError::MultipleDots));
        assert_eq!(LoadAvg::parse("1 "), Err(FixedError::InvalidChar(' ')));
        assert_eq!(SwapRatio::parse("50%"), Err(FixedError::InvalidChar('%')));
    }

    #[test]
    fn test_parse_overflow() {
        assert_eq!(
            LoadAvg::parse("9223372036854775807"),
            Err(FixedError::Overflow)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(LoadAvg::from_raw(15000).to_string(), "15.000");
        assert_eq!(LoadAvg::from_raw(1234).to_string(), "1.234");
        assert_eq!(SwapRatio::from_raw(5).to_string(), "0.05");
    }
}
