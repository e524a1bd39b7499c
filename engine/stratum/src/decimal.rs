use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use thiserror::Error;

/// Errors raised by decimal parsing and rescaling.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecimalError {
    #[error("decimal value overflows 128-bit storage")]
    Overflow,
    #[error("decimal {value} cannot be represented with scale {scale} without losing digits")]
    Inexact { value: String, scale: i8 },
    #[error("invalid decimal literal {input:?}: {reason}")]
    Parse { input: String, reason: &'static str },
}

/// Fixed-point decimal: `unscaled * 10^-scale`.
///
/// The scale is kept as given (`1.50` parses to `150` at scale 2); equality
/// and hashing are numeric, so `1.50 == 1.5`.
#[derive(Clone, Copy, Debug)]
pub struct Decimal {
    unscaled: i128,
    scale: i8,
}

impl Decimal {
    pub const ZERO: Self = Self {
        unscaled: 0,
        scale: 0,
    };

    pub const fn new(unscaled: i128, scale: i8) -> Self {
        Self { unscaled, scale }
    }

    pub const fn unscaled(self) -> i128 {
        self.unscaled
    }

    pub const fn scale(self) -> i8 {
        self.scale
    }

    pub const fn is_negative(self) -> bool {
        self.unscaled < 0
    }

    /// Number of decimal digits in the unscaled magnitude (zero has one digit).
    pub fn digits(self) -> u8 {
        let mut magnitude = self.unscaled.unsigned_abs();
        let mut count = 1u8;
        while magnitude >= 10 {
            magnitude /= 10;
            count += 1;
        }
        count
    }

    /// Re-express the value at `scale`. Increasing the scale fails only on
    /// overflow; decreasing it fails if any dropped digit is non-zero.
    pub fn rescale(self, scale: i8) -> Result<Self, DecimalError> {
        let diff = i16::from(scale) - i16::from(self.scale);
        if diff == 0 {
            return Ok(self);
        }
        if diff > 0 {
            let factor = pow10(diff.unsigned_abs() as u32).ok_or(DecimalError::Overflow)?;
            let unscaled = self
                .unscaled
                .checked_mul(factor)
                .ok_or(DecimalError::Overflow)?;
            return Ok(Self::new(unscaled, scale));
        }
        let inexact = || DecimalError::Inexact {
            value: self.to_string(),
            scale,
        };
        match pow10(diff.unsigned_abs() as u32) {
            Some(factor) if self.unscaled % factor == 0 => {
                Ok(Self::new(self.unscaled / factor, scale))
            }
            None if self.unscaled == 0 => Ok(Self::new(0, scale)),
            _ => Err(inexact()),
        }
    }

    /// Strip trailing zeros from the unscaled value.
    pub fn normalized(self) -> Self {
        if self.unscaled == 0 {
            return Self::ZERO;
        }
        let mut unscaled = self.unscaled;
        let mut scale = self.scale;
        while unscaled % 10 == 0 && scale > i8::MIN {
            unscaled /= 10;
            scale -= 1;
        }
        Self::new(unscaled, scale)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(self) -> f64 {
        let normalized = self.normalized();
        normalized.unscaled as f64 / 10f64.powi(i32::from(normalized.scale))
    }
}

fn pow10(exp: u32) -> Option<i128> {
    10i128.checked_pow(exp)
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        let (left, right) = (self.normalized(), other.normalized());
        left.unscaled == right.unscaled && left.scale == right.scale
    }
}

impl Eq for Decimal {}

impl Hash for Decimal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let normalized = self.normalized();
        normalized.unscaled.hash(state);
        normalized.scale.hash(state);
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self::new(i128::from(value), 0)
    }
}

impl From<u64> for Decimal {
    fn from(value: u64) -> Self {
        Self::new(i128::from(value), 0)
    }
}

impl FromStr for Decimal {
    type Err = DecimalError;

    /// Accepts `[+-]digits[.digits][(e|E)[+-]digits]`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let fail = |reason| DecimalError::Parse {
            input: input.to_owned(),
            reason,
        };
        let trimmed = input.trim();
        let (mantissa, exponent) = match trimmed.find(['e', 'E']) {
            Some(pos) => {
                let exp = trimmed[pos + 1..]
                    .parse::<i32>()
                    .map_err(|_| fail("malformed exponent"))?;
                (&trimmed[..pos], exp)
            }
            None => (trimmed, 0),
        };
        let (negative, digits) = match mantissa.as_bytes().first() {
            Some(b'-') => (true, &mantissa[1..]),
            Some(b'+') => (false, &mantissa[1..]),
            Some(_) => (false, mantissa),
            None => return Err(fail("empty input")),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(fail("no digits"));
        }

        let mut unscaled = 0i128;
        for c in whole.bytes().chain(fraction.bytes()) {
            if !c.is_ascii_digit() {
                return Err(fail("unexpected character"));
            }
            unscaled = unscaled
                .checked_mul(10)
                .and_then(|v| v.checked_add(i128::from(c - b'0')))
                .ok_or(DecimalError::Overflow)?;
        }
        if negative {
            unscaled = -unscaled;
        }
        let scale = i64::try_from(fraction.len()).map_err(|_| DecimalError::Overflow)?
            - i64::from(exponent);
        let scale = i8::try_from(scale).map_err(|_| DecimalError::Overflow)?;
        Ok(Self::new(unscaled, scale))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.unscaled < 0 { "-" } else { "" };
        let magnitude = self.unscaled.unsigned_abs().to_string();
        if self.scale <= 0 {
            let zeros = if self.unscaled == 0 {
                0
            } else {
                usize::from(self.scale.unsigned_abs())
            };
            return write!(f, "{sign}{magnitude}{}", "0".repeat(zeros));
        }
        let scale = usize::from(self.scale.unsigned_abs());
        let padded = format!("{magnitude:0>width$}", width = scale + 1);
        let (whole, fraction) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{whole}.{fraction}")
    }
}
