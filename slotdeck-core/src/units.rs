//! Resource quantity helpers
//!
//! Resource-slot magnitudes arrive either as JSON numbers or as short-suffix
//! strings (`"4g"`, `"512m"`). This module holds the display transforms
//! (`add_unit`, `symbolic_unit`, `mark_if_unlimited`) and a 1024-based
//! [`BinarySize`] parser used when two memory amounts must be compared.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Glyph used to render an unlimited amount
pub const UNLIMITED: &str = "∞";

/// Literal text values that all mean "no limit"
const UNLIMITED_MARKERS: [&str; 4] = ["-", "Unlimited", UNLIMITED, "Infinity"];

/// A raw resource amount as sent by the API: a number or a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    Number(f64),
    Text(String),
}

impl Quantity {
    /// True for the numeric zero and the string `"0"`
    pub fn is_zero(&self) -> bool {
        match self {
            Quantity::Number(n) => *n == 0.0,
            Quantity::Text(s) => s.trim() == "0",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Number(n) if n.is_infinite() => f.write_str(UNLIMITED),
            Quantity::Number(n) => write!(f, "{}", format_number(*n)),
            Quantity::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Quantity {
    fn from(value: &str) -> Self {
        Quantity::Text(value.to_string())
    }
}

impl From<f64> for Quantity {
    fn from(value: f64) -> Self {
        Quantity::Number(value)
    }
}

/// Render a float without a trailing `.0` when it is integral
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Split `"10g"` into `("10", 'g')` when the prefix is numeric
fn split_suffix(value: &str) -> Option<(&str, char)> {
    let last = value.chars().last()?;
    if !last.is_ascii_alphabetic() {
        return None;
    }
    let magnitude = &value[..value.len() - 1];
    magnitude.trim().parse::<f64>().ok()?;
    Some((magnitude, last))
}

/// Annotate a short-suffix magnitude with its binary display unit
///
/// `m`/`g`/`t` (either case) become `MiB`/`GiB`/`TiB`. Anything else is
/// returned unchanged.
///
/// ```
/// # use slotdeck_core::units::add_unit;
/// assert_eq!(add_unit("10g"), "10GiB");
/// assert_eq!(add_unit("512M"), "512MiB");
/// assert_eq!(add_unit("4"), "4");
/// ```
pub fn add_unit(value: &str) -> String {
    let Some((magnitude, suffix)) = split_suffix(value) else {
        return value.to_string();
    };
    let unit = match suffix.to_ascii_lowercase() {
        'm' => "MiB",
        'g' => "GiB",
        't' => "TiB",
        _ => return value.to_string(),
    };
    format!("{magnitude}{unit}")
}

/// Convert a display unit back to the short suffix used in API payloads
///
/// Accepts both `MB`/`GB`/`TB` and the `MiB`/`GiB`/`TiB` forms produced by
/// [`add_unit`], so the two functions round-trip.
///
/// ```
/// # use slotdeck_core::units::symbolic_unit;
/// assert_eq!(symbolic_unit("10GiB"), "10g");
/// assert_eq!(symbolic_unit("256MB"), "256m");
/// ```
pub fn symbolic_unit(value: &str) -> String {
    const UNITS: [(&str, char); 6] = [
        ("MiB", 'm'),
        ("GiB", 'g'),
        ("TiB", 't'),
        ("MB", 'm'),
        ("GB", 'g'),
        ("TB", 't'),
    ];
    for (unit, short) in UNITS {
        if let Some(magnitude) = value.strip_suffix(unit) {
            if magnitude.trim().parse::<f64>().is_ok() {
                return format!("{}{short}", magnitude.trim());
            }
        }
    }
    value.to_string()
}

/// Render any "no limit" marker as [`UNLIMITED`]
///
/// Only for display. Stored values keep their raw form so normalization
/// stays idempotent.
pub fn mark_if_unlimited(value: &Quantity) -> Quantity {
    let unlimited = match value {
        Quantity::Number(n) => *n == 0.0 || (n.is_infinite() && n.is_sign_positive()),
        Quantity::Text(s) => UNLIMITED_MARKERS.contains(&s.as_str()),
    };
    if unlimited {
        Quantity::Text(UNLIMITED.to_string())
    } else {
        value.clone()
    }
}

/// Whether a raw text value carries the unlimited token
pub fn mentions_unlimited(value: &str) -> bool {
    value.contains("Unlimited")
}

/// Size expression that could not be parsed
#[derive(Debug, Clone, PartialEq, Error)]
#[error("unconvertible size expression '{0}'")]
pub struct SizeParseError(pub String);

/// A byte amount with 1024-based suffixes, or unlimited
///
/// `Bytes` orders before `Unlimited`, so plain comparison works for limit
/// checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BinarySize {
    Bytes(u64),
    Unlimited,
}

impl BinarySize {
    const SUFFIXES: [(char, u64); 6] = [
        ('k', 1 << 10),
        ('m', 1 << 20),
        ('g', 1 << 30),
        ('t', 1 << 40),
        ('p', 1 << 50),
        ('e', 1 << 60),
    ];
    const ENDINGS: [&'static str; 6] = ["ibytes", "ibyte", "ib", "bytes", "byte", "b"];

    fn multiplier(suffix: char) -> Option<u64> {
        if suffix == ' ' {
            return Some(1);
        }
        Self::SUFFIXES
            .iter()
            .find(|(s, _)| *s == suffix)
            .map(|(_, m)| *m)
    }

    /// Byte count, `None` when unlimited
    pub fn bytes(&self) -> Option<u64> {
        match self {
            BinarySize::Bytes(n) => Some(*n),
            BinarySize::Unlimited => None,
        }
    }

    /// Auto-scaled short form, e.g. `"4g"`, `"1.5g"`, `"512m"`
    pub fn to_short(&self) -> String {
        let n = match self {
            BinarySize::Unlimited => return "Infinity".to_string(),
            BinarySize::Bytes(n) => *n,
        };
        let mut scaled = None;
        for (suffix, multiplier) in Self::SUFFIXES.iter().rev() {
            if n >= *multiplier {
                scaled = Some((*suffix, *multiplier));
                break;
            }
        }
        match scaled {
            None => n.to_string(),
            Some((suffix, multiplier)) => {
                let value = n as f64 / multiplier as f64;
                let rounded = (value * 100.0).round() / 100.0;
                format!("{}{suffix}", format_number(rounded))
            }
        }
    }
}

impl FromStr for BinarySize {
    type Err = SizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || SizeParseError(s.to_string());
        let expr = s.trim().replace('_', "").to_lowercase();

        if matches!(
            expr.as_str(),
            "inf" | "infinite" | "infinity" | "unlimited" | UNLIMITED
        ) {
            return Ok(BinarySize::Unlimited);
        }
        if let Ok(n) = expr.parse::<u64>() {
            return Ok(BinarySize::Bytes(n));
        }

        let (magnitude, suffix) = match Self::ENDINGS.iter().find(|e| expr.ends_with(*e)) {
            Some(ending) => {
                let head = &expr[..expr.len() - ending.len()];
                let suffix = head.chars().last().ok_or_else(err)?;
                (&head[..head.len() - suffix.len_utf8()], suffix)
            }
            None => {
                let suffix = expr.chars().last().ok_or_else(err)?;
                if suffix.is_ascii_digit() {
                    // fractional bytes
                    return Err(err());
                }
                (&expr[..expr.len() - suffix.len_utf8()], suffix)
            }
        };

        let multiplier = Self::multiplier(suffix).ok_or_else(err)?;
        let value: f64 = magnitude.trim().parse().map_err(|_| err())?;
        if !value.is_finite() || value < 0.0 {
            return Err(err());
        }
        let bytes = value * multiplier as f64;
        if bytes >= u64::MAX as f64 {
            return Err(err());
        }
        Ok(BinarySize::Bytes(bytes as u64))
    }
}

impl fmt::Display for BinarySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_unit() {
        assert_eq!(add_unit("10g"), "10GiB");
        assert_eq!(add_unit("10G"), "10GiB");
        assert_eq!(add_unit("256m"), "256MiB");
        assert_eq!(add_unit("1t"), "1TiB");
        assert_eq!(add_unit("1.5g"), "1.5GiB");
    }

    #[test]
    fn test_add_unit_passthrough() {
        assert_eq!(add_unit("4"), "4");
        assert_eq!(add_unit("Unlimited"), "Unlimited");
        assert_eq!(add_unit("-"), "-");
        assert_eq!(add_unit(""), "");
        assert_eq!(add_unit("4k"), "4k");
        assert_eq!(add_unit(UNLIMITED), UNLIMITED);
    }

    #[test]
    fn test_symbolic_unit() {
        assert_eq!(symbolic_unit("10GiB"), "10g");
        assert_eq!(symbolic_unit("10GB"), "10g");
        assert_eq!(symbolic_unit("512MB"), "512m");
        assert_eq!(symbolic_unit("2TiB"), "2t");
        assert_eq!(symbolic_unit("2"), "2");
        assert_eq!(symbolic_unit("GB"), "GB");
    }

    #[test]
    fn test_unit_round_trip() {
        for value in ["10g", "256m", "1t", "0.5g"] {
            assert_eq!(symbolic_unit(&add_unit(value)), value);
        }
    }

    #[test]
    fn test_mark_if_unlimited() {
        let infinity = Quantity::Text(UNLIMITED.to_string());
        assert_eq!(mark_if_unlimited(&Quantity::from("-")), infinity);
        assert_eq!(mark_if_unlimited(&Quantity::from("Unlimited")), infinity);
        assert_eq!(mark_if_unlimited(&Quantity::from("Infinity")), infinity);
        assert_eq!(mark_if_unlimited(&Quantity::Number(0.0)), infinity);
        assert_eq!(mark_if_unlimited(&Quantity::Number(f64::INFINITY)), infinity);
        assert_eq!(mark_if_unlimited(&Quantity::from("4")), Quantity::from("4"));
        assert_eq!(
            mark_if_unlimited(&Quantity::Number(2.0)),
            Quantity::Number(2.0)
        );
    }

    #[test]
    fn test_quantity_display() {
        assert_eq!(Quantity::Number(4.0).to_string(), "4");
        assert_eq!(Quantity::Number(0.5).to_string(), "0.5");
        assert_eq!(Quantity::from("8g").to_string(), "8g");
    }

    #[test]
    fn test_quantity_deserializes_numbers_and_strings() {
        let values: Vec<Quantity> = serde_json::from_str(r#"[1, "2g", 0.25]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Quantity::Number(1.0),
                Quantity::from("2g"),
                Quantity::Number(0.25)
            ]
        );
    }

    #[test]
    fn test_binary_size_parse() {
        assert_eq!("1024".parse(), Ok(BinarySize::Bytes(1024)));
        assert_eq!("4g".parse(), Ok(BinarySize::Bytes(4 << 30)));
        assert_eq!("4G".parse(), Ok(BinarySize::Bytes(4 << 30)));
        assert_eq!("512m".parse(), Ok(BinarySize::Bytes(512 << 20)));
        assert_eq!("1.5g".parse(), Ok(BinarySize::Bytes(3 << 29)));
        assert_eq!("4GiB".parse(), Ok(BinarySize::Bytes(4 << 30)));
        assert_eq!("4 GiB".parse(), Ok(BinarySize::Bytes(4 << 30)));
        assert_eq!("2kb".parse(), Ok(BinarySize::Bytes(2048)));
        assert_eq!("infinity".parse(), Ok(BinarySize::Unlimited));
        assert_eq!("Unlimited".parse(), Ok(BinarySize::Unlimited));
    }

    #[test]
    fn test_binary_size_rejects_garbage() {
        assert!("".parse::<BinarySize>().is_err());
        assert!("1.5".parse::<BinarySize>().is_err());
        assert!("4x".parse::<BinarySize>().is_err());
        assert!("lots".parse::<BinarySize>().is_err());
        assert!("-1g".parse::<BinarySize>().is_err());
    }

    #[test]
    fn test_binary_size_plain_byte_units() {
        assert_eq!("1024 bytes".parse(), Ok(BinarySize::Bytes(1024)));
        assert_eq!("1 byte".parse(), Ok(BinarySize::Bytes(1)));
        assert_eq!("512 b".parse(), Ok(BinarySize::Bytes(512)));
        assert!("4 4".parse::<BinarySize>().is_err());
    }

    #[test]
    fn test_binary_size_rejects_overflow() {
        assert!("20000000000g".parse::<BinarySize>().is_err());
        assert!("16e".parse::<BinarySize>().is_err());
        assert_eq!("15e".parse(), Ok(BinarySize::Bytes(15 << 60)));
    }

    #[test]
    fn test_binary_size_ordering() {
        let small: BinarySize = "1g".parse().unwrap();
        let large: BinarySize = "1024m".parse().unwrap();
        assert_eq!(small, large);
        assert!(BinarySize::Bytes(u64::MAX) < BinarySize::Unlimited);
    }

    #[test]
    fn test_binary_size_short_form() {
        assert_eq!(BinarySize::Bytes(4 << 30).to_short(), "4g");
        assert_eq!(BinarySize::Bytes(3 << 29).to_short(), "1.5g");
        assert_eq!(BinarySize::Bytes(512 << 20).to_short(), "512m");
        assert_eq!(BinarySize::Bytes(100).to_short(), "100");
        assert_eq!(BinarySize::Unlimited.to_short(), "Infinity");
    }
}
