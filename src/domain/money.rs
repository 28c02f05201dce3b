use std::fmt;

/// Money is represented as integer cents so that splitting and balance
/// arithmetic stays exact. €12.34 = 1234 cents.
pub type Cents = i64;

/// Format cents as a decimal string.
/// Example: 1234 -> "12.34", -5 -> "-0.05"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Parse a decimal string into cents.
/// Accepts at most two decimal digits; more is an error rather than a silent
/// truncation, since a third digit cannot be represented in cents.
/// Example: "12.34" -> 1234, "12.5" -> 1250, "12" -> 1200
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };

    let (units_str, decimal_str) = match digits.split_once('.') {
        Some((units, decimal)) => (units, decimal),
        None => (digits, ""),
    };

    if units_str.is_empty() && decimal_str.is_empty() {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse::<u64>()
            .map_err(|_| ParseCentsError::InvalidFormat)? as i64
    };

    let decimal: i64 = match decimal_str.len() {
        0 => 0,
        // A single digit is tenths: "12.5" means 50 cents
        1 => {
            decimal_str
                .parse::<u32>()
                .map_err(|_| ParseCentsError::InvalidFormat)? as i64
                * 10
        }
        2 => decimal_str
            .parse::<u32>()
            .map_err(|_| ParseCentsError::InvalidFormat)? as i64,
        _ => return Err(ParseCentsError::TooManyDecimals),
    };

    let cents = units * 100 + decimal;
    Ok(if negative { -cents } else { cents })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
    TooManyDecimals,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::TooManyDecimals => {
                write!(f, "amounts support at most two decimal digits")
            }
        }
    }
}

impl std::error::Error for ParseCentsError {}
