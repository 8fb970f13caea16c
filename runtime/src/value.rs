use std::cmp::Ordering;
use std::fmt;

/// A value flowing through block inputs, variables and step code.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    #[default]
    Empty,
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl Value {
    /// Convert a descriptor value (variable initial values, field payloads).
    pub fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Null => Value::Empty,
            other => Value::Text(other.to_string()),
        }
    }

    /// Literal from a numeric input slot: text that reads as a finite
    /// number becomes a number, anything else stays text.
    pub fn numeric_literal(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            other => {
                let text = match other {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                match text.trim().parse::<f64>() {
                    Ok(n) if !text.trim().is_empty() && n.is_finite() => Value::Number(n),
                    _ => Value::Text(text),
                }
            }
        }
    }

    /// Plain numeric conversion. Text that is not a number gives NaN.
    pub fn to_raw_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Empty => 0.0,
            Value::Text(s) => parse_number(s),
        }
    }

    /// Block-input numeric cast: NaN becomes 0.
    pub fn to_number(&self) -> f64 {
        let n = self.to_raw_number();
        if n.is_nan() { 0.0 } else { n }
    }

    pub fn to_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
            Value::Empty => false,
        }
    }

    /// Whether comparisons treat this value as a number. Blank text is not
    /// numeric even though it converts to 0.
    pub fn is_numeric(&self) -> bool {
        match self {
            Value::Number(n) => !n.is_nan(),
            Value::Bool(_) => true,
            Value::Empty => false,
            Value::Text(s) => !s.trim().is_empty() && !parse_number(s).is_nan(),
        }
    }

    /// Mixed comparison: numerically when both sides are numeric,
    /// otherwise as case-insensitive text.
    pub fn compare(&self, other: &Value) -> Ordering {
        if self.is_numeric() && other.is_numeric() {
            let (a, b) = (self.to_raw_number(), other.to_raw_number());
            return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        }
        self.to_string()
            .to_lowercase()
            .cmp(&other.to_string().to_lowercase())
    }

    pub fn loosely_equals(&self, other: &Value) -> bool {
        self.compare(other) == Ordering::Equal
    }

    /// Strict equality used by step code `==`: same kind and same value.
    pub fn same(&self, other: &Value) -> bool {
        self == other
    }
}

/// Parse number text the way block inputs do: surrounding whitespace is
/// ignored, blank text is 0, `Infinity` is spelled out.
fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
    {
        return f64::NAN;
    }
    trimmed.parse().unwrap_or(f64::NAN)
}

/// Round half up, the way the round block does.
pub fn round_half_up(n: f64) -> f64 {
    (n + 0.5).floor()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) if n.is_nan() => write!(f, "NaN"),
            Value::Number(n) if n.is_infinite() => {
                write!(f, "{}", if *n > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Value::Number(n) if *n == 0.0 => write!(f, "0"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Empty => Ok(()),
        }
    }
}
