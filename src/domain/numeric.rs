use std::fmt;

use serde::{Deserialize, Serialize};

/// Exact rational amount, stored by GnuCash as `*_num` / `*_denom` columns.
/// For EUR with a fraction of 100, €50.00 = 5000/100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Numeric {
    pub num: i64,
    pub denom: i64,
}

impl Numeric {
    pub const ZERO: Numeric = Numeric { num: 0, denom: 1 };

    /// Create a numeric. The denominator must not be zero; a negative
    /// denominator is folded into the numerator.
    pub fn new(num: i64, denom: i64) -> Result<Self, NumericError> {
        match denom {
            0 => Err(NumericError::ZeroDenominator),
            d if d < 0 => {
                let num = num.checked_neg().ok_or(NumericError::Overflow)?;
                let denom = d.checked_neg().ok_or(NumericError::Overflow)?;
                Ok(Self { num, denom })
            }
            _ => Ok(Self { num, denom }),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    pub fn checked_add(self, other: Numeric) -> Option<Numeric> {
        if self.denom == other.denom {
            return Some(Numeric {
                num: self.num.checked_add(other.num)?,
                denom: self.denom,
            });
        }
        let denom = lcm(self.denom as i128, other.denom as i128)?;
        let num = (self.num as i128) * (denom / self.denom as i128)
            + (other.num as i128) * (denom / other.denom as i128);
        Some(Numeric {
            num: i64::try_from(num).ok()?,
            denom: i64::try_from(denom).ok()?,
        })
    }

    pub fn checked_sub(self, other: Numeric) -> Option<Numeric> {
        self.checked_add(other.checked_neg()?)
    }

    pub fn checked_neg(self) -> Option<Numeric> {
        Some(Numeric {
            num: self.num.checked_neg()?,
            denom: self.denom,
        })
    }

    /// Sum an iterator of amounts; `None` on overflow.
    pub fn sum<I: IntoIterator<Item = Numeric>>(items: I) -> Option<Numeric> {
        items
            .into_iter()
            .try_fold(Numeric::ZERO, |acc, n| acc.checked_add(n))
    }

    /// Express the amount with the given denominator if that is exact.
    /// Otherwise the amount is returned unchanged.
    pub fn rescale(self, fraction: i64) -> Numeric {
        if fraction <= 0 || fraction == self.denom {
            return self;
        }
        let scaled = (self.num as i128) * (fraction as i128);
        if scaled % (self.denom as i128) != 0 {
            return self;
        }
        match i64::try_from(scaled / self.denom as i128) {
            Ok(num) => Numeric {
                num,
                denom: fraction,
            },
            Err(_) => self,
        }
    }

    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Number of decimal places if the denominator is a power of ten.
    fn decimal_places(&self) -> Option<usize> {
        let mut d = self.denom;
        let mut places = 0;
        while d > 1 {
            if d % 10 != 0 {
                return None;
            }
            d /= 10;
            places += 1;
        }
        Some(places)
    }
}

impl Default for Numeric {
    fn default() -> Self {
        Numeric::ZERO
    }
}

impl std::ops::Neg for Numeric {
    type Output = Numeric;

    /// Saturates on `i64::MIN`, which no GnuCash amount reaches.
    fn neg(self) -> Numeric {
        Numeric {
            num: self.num.saturating_neg(),
            denom: self.denom,
        }
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decimal_places() {
            Some(0) => write!(f, "{}", self.num),
            Some(places) => {
                let sign = if self.num < 0 { "-" } else { "" };
                let abs = self.num.unsigned_abs();
                let denom = self.denom as u64;
                write!(
                    f,
                    "{}{}.{:0width$}",
                    sign,
                    abs / denom,
                    abs % denom,
                    width = places
                )
            }
            None => write!(f, "{}/{}", self.num, self.denom),
        }
    }
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.abs()
}

fn lcm(a: i128, b: i128) -> Option<i128> {
    let g = gcd(a, b);
    if g == 0 {
        return None;
    }
    (a / g).checked_mul(b)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericError {
    ZeroDenominator,
    Overflow,
}

impl fmt::Display for NumericError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericError::ZeroDenominator => write!(f, "numeric with zero denominator"),
            NumericError::Overflow => write!(f, "numeric overflow"),
        }
    }
}

impl std::error::Error for NumericError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(num: i64, denom: i64) -> Numeric {
        Numeric::new(num, denom).unwrap()
    }

    #[test]
    fn test_display() {
        assert_eq!(n(5000, 100).to_string(), "50.00");
        assert_eq!(n(1234, 100).to_string(), "12.34");
        assert_eq!(n(-1, 100).to_string(), "-0.01");
        assert_eq!(n(0, 100).to_string(), "0.00");
        assert_eq!(n(7, 1).to_string(), "7");
        assert_eq!(n(12345, 1000).to_string(), "12.345");
        assert_eq!(n(1, 3).to_string(), "1/3");
    }

    #[test]
    fn test_new_rejects_zero_denominator() {
        assert_eq!(Numeric::new(1, 0), Err(NumericError::ZeroDenominator));
    }

    #[test]
    fn test_new_normalizes_negative_denominator() {
        assert_eq!(n(5, -100), n(-5, 100));
    }

    #[test]
    fn test_add_same_denominator() {
        assert_eq!(n(150, 100).checked_add(n(250, 100)), Some(n(400, 100)));
    }

    #[test]
    fn test_add_mixed_denominators() {
        // 1.5 + 0.125 = 1.625
        let total = n(15, 10).checked_add(n(125, 1000)).unwrap();
        assert_eq!(total, n(1625, 1000));
        assert_eq!(total.to_string(), "1.625");
    }

    #[test]
    fn test_sub_and_neg() {
        assert_eq!(n(100, 100).checked_sub(n(250, 100)), Some(n(-150, 100)));
        assert_eq!(-n(3, 100), n(-3, 100));
    }

    #[test]
    fn test_sum() {
        let total = Numeric::sum([n(1000, 100), n(-250, 100), n(5, 10)]).unwrap();
        assert_eq!(total.to_string(), "8.00");
        assert_eq!(Numeric::sum(Vec::new()), Some(Numeric::ZERO));
    }

    #[test]
    fn test_overflow_is_detected() {
        assert_eq!(n(i64::MAX, 1).checked_add(n(1, 1)), None);
    }

    #[test]
    fn test_rescale() {
        assert_eq!(n(5, 10).rescale(100), n(50, 100));
        assert_eq!(n(1, 1).rescale(100), n(100, 100));
        // Not exact: unchanged
        assert_eq!(n(1, 3).rescale(100), n(1, 3));
    }

    #[test]
    fn test_is_zero() {
        assert!(n(0, 1000).is_zero());
        assert!(!n(1, 1000).is_zero());
    }
}
