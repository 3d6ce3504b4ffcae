//! Numeric formatters for readouts, slider labels and axis ticks.
//!
//! The default formatter uses engineering prefixes (T, G, M, k, m, μ, n, p)
//! with two significant digits when the magnitude falls outside
//! `[0.1, 1000)`, and plain significant-digit formatting inside it.

use serde::{Deserialize, Serialize};

/// Placeholder shown for NaN or infinite values.
pub const NOT_A_NUMBER: &str = "—";

const PREFIXES: [(i32, &str); 9] = [
    (12, "T"),
    (9, "G"),
    (6, "M"),
    (3, "k"),
    (0, ""),
    (-3, "m"),
    (-6, "μ"),
    (-9, "n"),
    (-12, "p"),
];

fn default_digits() -> u32 {
    2
}

/// How a number is turned into display text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Formatter {
    /// Engineering prefix with `digits` significant digits.
    Engineering {
        #[serde(default = "default_digits")]
        digits: u32,
        #[serde(default)]
        unit: String,
    },
    /// Fixed number of decimals.
    Fixed {
        decimals: usize,
        #[serde(default)]
        unit: String,
    },
    /// Rounded to the nearest integer.
    Integer {
        #[serde(default)]
        unit: String,
    },
    /// Fraction shown as a percentage.
    Percent { decimals: usize },
}

impl Default for Formatter {
    fn default() -> Self {
        Formatter::Engineering {
            digits: default_digits(),
            unit: String::new(),
        }
    }
}

impl Formatter {
    /// Engineering formatter with the default precision and a unit suffix.
    pub fn engineering(unit: &str) -> Self {
        Formatter::Engineering {
            digits: default_digits(),
            unit: unit.to_string(),
        }
    }

    /// Engineering formatter with explicit precision.
    pub fn engineering_digits(unit: &str, digits: u32) -> Self {
        Formatter::Engineering {
            digits: digits.max(1),
            unit: unit.to_string(),
        }
    }

    /// Fixed-decimal formatter.
    pub fn fixed(decimals: usize, unit: &str) -> Self {
        Formatter::Fixed {
            decimals,
            unit: unit.to_string(),
        }
    }

    /// Integer formatter.
    pub fn integer(unit: &str) -> Self {
        Formatter::Integer {
            unit: unit.to_string(),
        }
    }

    /// Unit suffix carried by this formatter, if any.
    pub fn unit(&self) -> &str {
        match self {
            Formatter::Engineering { unit, .. }
            | Formatter::Fixed { unit, .. }
            | Formatter::Integer { unit } => unit,
            Formatter::Percent { .. } => "%",
        }
    }

    /// Format a value.
    pub fn format(&self, value: f64) -> String {
        if !value.is_finite() {
            return NOT_A_NUMBER.to_string();
        }
        match self {
            Formatter::Engineering { digits, unit } => format_engineering(value, *digits, unit),
            Formatter::Fixed { decimals, unit } => join(&format!("{:.*}", decimals, value), "", unit),
            Formatter::Integer { unit } => join(&format!("{}", value.round() as i64), "", unit),
            Formatter::Percent { decimals } => format!("{:.*}%", decimals, value * 100.0),
        }
    }
}

/// Format with an engineering prefix.
///
/// Magnitudes in `[0.1, 1000)` (and zero) are printed without a prefix.
/// A mantissa that rounds up to 1000 moves to the next prefix.
pub fn format_engineering(value: f64, digits: u32, unit: &str) -> String {
    if !value.is_finite() {
        return NOT_A_NUMBER.to_string();
    }
    let abs = value.abs();
    if abs == 0.0 || (0.1..1000.0).contains(&abs) {
        let text = format_significant(value, digits);
        if rounded_thousands(&text).is_none() {
            return join(&text, "", unit);
        }
    }

    let mut exp = ((abs.log10() / 3.0).floor() as i32 * 3).clamp(-12, 12);
    let mut mantissa = value / 10f64.powi(exp);
    // log10 can land one ulp short of an exact power of ten
    if mantissa.abs() >= 1000.0 && exp < 12 {
        exp += 3;
        mantissa = value / 10f64.powi(exp);
    } else if mantissa.abs() < 1.0 && exp > -12 {
        exp -= 3;
        mantissa = value / 10f64.powi(exp);
    }

    let mut text = format_significant(mantissa, digits);
    if exp < 12 {
        if let Some(thousands) = rounded_thousands(&text) {
            exp += 3;
            text = format_significant(thousands, digits);
        }
    }

    let prefix = PREFIXES
        .iter()
        .find(|(e, _)| *e == exp)
        .map(|(_, p)| *p)
        .unwrap_or("");
    join(&text, prefix, unit)
}

/// Printed mantissa in thousands, when rounding pushed it to 1000 or more.
fn rounded_thousands(text: &str) -> Option<f64> {
    text.parse::<f64>()
        .ok()
        .filter(|m| m.abs() >= 1000.0)
        .map(|m| m / 1000.0)
}

/// Print `value` with at least `digits` significant digits.
///
/// Integer digits are never dropped: `123.4` at two digits prints `123`.
pub fn format_significant(value: f64, digits: u32) -> String {
    if !value.is_finite() {
        return NOT_A_NUMBER.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = (digits.max(1) as i32 - 1 - magnitude).max(0) as usize;
    format!("{:.*}", decimals, value)
}

fn join(number: &str, prefix: &str, unit: &str) -> String {
    if prefix.is_empty() && unit.is_empty() {
        number.to_string()
    } else {
        format!("{} {}{}", number, prefix, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engineering_prefixes() {
        assert_eq!(format_engineering(1000.0, 2, "Ω"), "1.0 kΩ");
        assert_eq!(format_engineering(0.005, 2, "A"), "5.0 mA");
        assert_eq!(format_engineering(100e-6, 2, "F"), "100 μF");
        assert_eq!(format_engineering(4.7e-9, 2, "F"), "4.7 nF");
        assert_eq!(format_engineering(2.2e6, 2, ""), "2.2 M");
    }

    #[test]
    fn test_rounding_rolls_over_to_next_prefix() {
        assert_eq!(format_engineering(999.6e3, 2, ""), "1.0 M");
        assert_eq!(format_engineering(-999.6e3, 2, "V"), "-1.0 MV");
        assert_eq!(format_engineering(999.7, 2, "Ω"), "1.0 kΩ");
        assert_eq!(format_engineering(999.96e-6, 3, "F"), "1.00 mF");
        assert_eq!(format_engineering(999.4e3, 2, ""), "999 k");
    }

    #[test]
    fn test_engineering_plain_band() {
        assert_eq!(format_engineering(0.25, 2, ""), "0.25");
        assert_eq!(format_engineering(5.0, 2, "V"), "5.0 V");
        assert_eq!(format_engineering(123.4, 2, ""), "123");
        assert_eq!(format_engineering(0.0, 2, "m"), "0 m");
    }

    #[test]
    fn test_engineering_negative() {
        assert_eq!(format_engineering(-0.002, 2, "A"), "-2.0 mA");
    }

    #[test]
    fn test_non_finite_placeholder() {
        assert_eq!(Formatter::default().format(f64::NAN), NOT_A_NUMBER);
        assert_eq!(Formatter::fixed(2, "V").format(f64::INFINITY), NOT_A_NUMBER);
    }

    #[test]
    fn test_fixed_and_percent() {
        assert_eq!(Formatter::fixed(8, "").format(0.24609375), "0.24609375");
        assert_eq!(Formatter::fixed(2, "V").format(3.1606), "3.16 V");
        assert_eq!(Formatter::Percent { decimals: 1 }.format(0.632), "63.2%");
        assert_eq!(Formatter::integer("m/s").format(7667.5), "7668 m/s");
    }

    #[test]
    fn test_formatter_from_json() {
        let f: Formatter = serde_json::from_str(r#"{"kind":"engineering","unit":"Hz"}"#).unwrap();
        assert_eq!(f, Formatter::engineering("Hz"));
    }
}
