//! Number formatting compatible with C's `%g` conversion
//!
//! Model files store coefficients with `%.17g` and feature values with
//! `%.8g`; writing them the same way keeps files byte-identical to those of
//! other libsvm-format tools.

use std::str::FromStr;

/// Digits used for coefficients, rho and probability parameters
pub const COEF_PRECISION: usize = 17;

/// Digits used for support vector feature values
pub const FEATURE_PRECISION: usize = 8;

/// Format `value` like C's `printf("%.{precision}g", value)`
pub fn format_g(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let precision = precision.max(1);

    // The exponent after rounding to `precision` significant digits decides
    // between fixed and scientific notation
    let scientific = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

/// Drop trailing zeros of the fraction and a trailing decimal point
fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// `%.17g`
pub fn format_coef(value: f64) -> String {
    format_g(value, COEF_PRECISION)
}

/// `%.8g`
pub fn format_feature(value: f64) -> String {
    format_g(value, FEATURE_PRECISION)
}

/// Parse a number token, returning the token in the error message
pub fn parse_number<T: FromStr>(token: &str) -> Result<T, String> {
    token
        .parse::<T>()
        .map_err(|_| format!("malformed number '{token}'"))
}
