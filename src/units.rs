//! Unit code and scale exponent translation.
//!
//! The controller reports the unit of a device's main value as a pair
//! `(code, exponent)`: a code indexing a fixed table of base units, and a
//! power-of-ten scale exponent. This module turns such pairs into
//! human-readable strings.
//!
//! Resolution order:
//!
//! 1. documented exception pairs (e.g. `(g, 3)` is written `kg`, not
//!    `10^3 g`),
//! 2. exponent 0 is the base unit itself,
//! 3. ratio-like units (containing `/`) take a trailing `10^n` scale,
//!    since a magnitude prefix would bind to the numerator only,
//! 4. named magnitude prefixes for common exponents,
//! 5. a generic leading `10^n` scale otherwise.
//!
//! # Example
//!
//! ```
//! use pils_indexer::units::unit_string;
//!
//! assert_eq!(unit_string(1, 0), "V");
//! assert_eq!(unit_string(1, 6), "MV");
//! assert_eq!(unit_string(1, -3), "mV");     // exception pair
//! assert_eq!(unit_string(5, -3), "10^-3 g"); // generic scale
//! ```

/// Base units indexed by protocol unit code.
const BASE_UNITS: &[&str] = &[
    "", "V", "A", "W", "m", "g", "Hz", "T", "K", "degC", "degF", "bar", "deg", "gauss", "counts",
    "%", "m/s", "m/s^2", "l/min", "m^3/h",
];

/// Documented exception pairs rendered as literal strings.
///
/// These are combinations real controllers report where the mechanical
/// prefix rules would produce the wrong or an unidiomatic spelling.
const EXCEPTIONS: &[(u8, i8, &str)] = &[
    (1, -3, "mV"),
    (2, -3, "mA"),
    (4, -3, "mm"),
    (4, -2, "cm"),
    (5, 3, "kg"),
    (7, -3, "mT"),
    (11, -3, "mbar"),
];

/// Named magnitude prefixes for common exponents.
const PREFIXES: &[(i8, &str)] = &[
    (-12, "p"),
    (-9, "n"),
    (-6, "u"),
    (3, "k"),
    (6, "M"),
    (9, "G"),
    (12, "T"),
];

/// Returns the base unit name for a protocol unit code.
///
/// An out-of-range code degrades to a generic `unit<code>` placeholder
/// rather than failing; unknown codes are expected when talking to newer
/// controllers.
pub fn base_unit_name(code: u8) -> String {
    match BASE_UNITS.get(code as usize) {
        Some(name) => (*name).to_string(),
        None => format!("unit{code}"),
    }
}

/// Combines a unit code and scale exponent into a display string.
pub fn unit_string(code: u8, exponent: i8) -> String {
    for (exc_code, exc_exp, literal) in EXCEPTIONS {
        if *exc_code == code && *exc_exp == exponent {
            return (*literal).to_string();
        }
    }

    let base = base_unit_name(code);
    if exponent == 0 {
        return base;
    }
    if base.contains('/') {
        return format!("{base} 10^{exponent}");
    }
    for (prefix_exp, prefix) in PREFIXES {
        if *prefix_exp == exponent {
            return format!("{prefix}{base}");
        }
    }
    format!("10^{exponent} {base}")
}
