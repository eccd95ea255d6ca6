//! Base and bounce threshold specs.
//!
//! A bare number is an absolute price (base) or price delta (bounce). A
//! trailing `%` makes it a percentage, stored as a fraction: `"0.5%"` is
//! `0.005`. Bases may also be a range `"p1%~p2%"` relative to the previous
//! close, written smaller-first even when negative.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use trigger_core::error::ParseError;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Breakout threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseSpec {
    /// Absolute price level
    Absolute(Decimal),
    /// Band relative to the previous close, as fractions (`low <= high`)
    Percent { low: Decimal, high: Decimal },
}

impl BaseSpec {
    pub fn is_percent(&self) -> bool {
        matches!(self, BaseSpec::Percent { .. })
    }
}

impl FromStr for BaseSpec {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();

        if let Some((low, high)) = text.split_once('~') {
            let low = parse_percent(low)?
                .ok_or_else(|| ParseError::InvalidNumber(text.to_string()))?;
            let high = parse_percent(high)?
                .ok_or_else(|| ParseError::InvalidNumber(text.to_string()))?;
            if low > high {
                return Err(ParseError::UnorderedRange(text.to_string()));
            }
            return Ok(BaseSpec::Percent { low, high });
        }

        match parse_percent(text)? {
            Some(fraction) => Ok(BaseSpec::Percent {
                low: fraction,
                high: fraction,
            }),
            None => {
                let price = parse_decimal(text)?;
                if price < Decimal::ZERO {
                    return Err(ParseError::InvalidNumber(text.to_string()));
                }
                Ok(BaseSpec::Absolute(price))
            }
        }
    }
}

impl fmt::Display for BaseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseSpec::Absolute(price) => write!(f, "{price}"),
            BaseSpec::Percent { low, high } if low == high => {
                write!(f, "{}%", (*low * HUNDRED).normalize())
            }
            BaseSpec::Percent { low, high } => write!(
                f,
                "{}%~{}%",
                (*low * HUNDRED).normalize(),
                (*high * HUNDRED).normalize()
            ),
        }
    }
}

/// Retracement required to fire once armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BounceSpec {
    /// Absolute price delta
    Absolute(Decimal),
    /// Fraction of the post-breakout extreme
    Percent(Decimal),
}

impl BounceSpec {
    /// Retracement expected from the given extreme, `None` on overflow.
    pub fn expected(&self, extreme: Decimal) -> Option<Decimal> {
        match self {
            BounceSpec::Absolute(amount) => Some(*amount),
            BounceSpec::Percent(fraction) => extreme.checked_mul(*fraction),
        }
    }

    pub fn is_percent(&self) -> bool {
        matches!(self, BounceSpec::Percent(_))
    }
}

impl FromStr for BounceSpec {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.contains('~') {
            return Err(ParseError::RangeNotAllowed(text.to_string()));
        }

        let spec = match parse_percent(text)? {
            Some(fraction) => BounceSpec::Percent(fraction),
            None => BounceSpec::Absolute(parse_decimal(text)?),
        };

        let amount = match spec {
            BounceSpec::Absolute(v) | BounceSpec::Percent(v) => v,
        };
        if amount < Decimal::ZERO {
            return Err(ParseError::InvalidNumber(text.to_string()));
        }
        Ok(spec)
    }
}

impl fmt::Display for BounceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BounceSpec::Absolute(amount) => write!(f, "{amount}"),
            BounceSpec::Percent(fraction) => write!(f, "{}%", (*fraction * HUNDRED).normalize()),
        }
    }
}

/// Parse `"p%"` into a fraction; `Ok(None)` when there is no `%`.
fn parse_percent(text: &str) -> Result<Option<Decimal>, ParseError> {
    match text.trim().strip_suffix('%') {
        Some(number) => Ok(Some(parse_decimal(number)? / HUNDRED)),
        None => Ok(None),
    }
}

fn parse_decimal(text: &str) -> Result<Decimal, ParseError> {
    let text = text.trim();
    Decimal::from_str(text).map_err(|_| ParseError::InvalidNumber(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_absolute_base() {
        assert_eq!("100".parse::<BaseSpec>().unwrap(), BaseSpec::Absolute(dec!(100)));
        assert_eq!(" 10.25 ".parse::<BaseSpec>().unwrap(), BaseSpec::Absolute(dec!(10.25)));
    }

    #[test]
    fn test_single_percent_base() {
        assert_eq!(
            "0.5%".parse::<BaseSpec>().unwrap(),
            BaseSpec::Percent {
                low: dec!(0.005),
                high: dec!(0.005)
            }
        );
    }

    #[test]
    fn test_negative_range_smaller_first() {
        assert_eq!(
            "-1.5%~-0.5%".parse::<BaseSpec>().unwrap(),
            BaseSpec::Percent {
                low: dec!(-0.015),
                high: dec!(-0.005)
            }
        );
        assert_eq!(
            "-0.5%~-1.5%".parse::<BaseSpec>(),
            Err(ParseError::UnorderedRange("-0.5%~-1.5%".to_string()))
        );
    }

    #[test]
    fn test_range_requires_percent() {
        assert!("1~2".parse::<BaseSpec>().is_err());
        assert!("abc".parse::<BaseSpec>().is_err());
        assert!("-3".parse::<BaseSpec>().is_err());
    }

    #[test]
    fn test_bounce_specs() {
        assert_eq!("1".parse::<BounceSpec>().unwrap(), BounceSpec::Absolute(dec!(1)));
        assert_eq!("0.5%".parse::<BounceSpec>().unwrap(), BounceSpec::Percent(dec!(0.005)));
        assert!("0.5%~1%".parse::<BounceSpec>().is_err());
        assert!("-1".parse::<BounceSpec>().is_err());
    }

    #[test]
    fn test_expected_retracement() {
        assert_eq!(BounceSpec::Absolute(dec!(1)).expected(dec!(105)), Some(dec!(1)));
        assert_eq!(BounceSpec::Percent(dec!(0.02)).expected(dec!(50)), Some(dec!(1)));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            BaseSpec::Percent {
                low: dec!(0.005),
                high: dec!(0.015)
            }
            .to_string(),
            "0.5%~1.5%"
        );
        assert_eq!(BounceSpec::Percent(dec!(0.003)).to_string(), "0.3%");
    }
}
