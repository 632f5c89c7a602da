use chrono::{DateTime, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Bound parameter values, keyed by parameter name.
pub type Parameters = BTreeMap<String, ParamValue>;

/// Declared type of an action parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "of")]
pub enum ParamType {
    Text,
    Integer,
    Number,
    Bool,
    Date,
    /// Closed set of allowed names. Matching is case-insensitive.
    Enum(Vec<String>),
    List(Box<ParamType>),
}

impl ParamType {
    pub fn list_of(inner: ParamType) -> Self {
        ParamType::List(Box::new(inner))
    }

    pub fn enumeration<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ParamType::Enum(variants.into_iter().map(Into::into).collect())
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ParamType::List(_))
    }
}

/// A bound parameter value. Tagged so the model round-trips without losing the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ParamValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    Enum(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Lifts a raw recognizer value (entity text or resolution) into an uncoerced value.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(ParamValue::Text(s.clone())),
            Value::Bool(b) => Some(ParamValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(ParamValue::Integer(i)),
                None => n.as_f64().map(ParamValue::Number),
            },
            Value::Array(items) => Some(ParamValue::List(
                items.iter().filter_map(ParamValue::from_json).collect(),
            )),
            // Structured resolutions (datetimeV2 and friends) carry the canonical form in "value".
            Value::Object(map) => match map.get("value") {
                Some(inner) => ParamValue::from_json(inner),
                None => Some(ParamValue::Text(value.to_string())),
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) | ParamValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            ParamValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Integer(i) => Some(*i as f64),
            ParamValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) | ParamValue::Enum(s) => f.write_str(s),
            ParamValue::Integer(i) => write!(f, "{}", i),
            ParamValue::Number(n) => write!(f, "{}", n),
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            ParamValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Integer(i)
    }
}

/// Coercion dispatch keyed by the declared type.
///
/// `None` means "value absent": the caller drops the parameter and re-prompts.
pub fn try_coerce(value: &ParamValue, ty: &ParamType) -> Option<ParamValue> {
    match ty {
        ParamType::List(inner) => coerce_list(value, inner),
        scalar => {
            // A single-element list assigns to a scalar field, more than one cannot.
            let value = match value {
                ParamValue::List(items) if items.len() == 1 => &items[0],
                ParamValue::List(_) => return None,
                other => other,
            };
            coerce_scalar(value, scalar)
        }
    }
}

fn coerce_list(value: &ParamValue, inner: &ParamType) -> Option<ParamValue> {
    let items: Vec<ParamValue> = match value {
        ParamValue::List(items) => items.clone(),
        ParamValue::Text(s) => s
            .split(',')
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .map(ParamValue::from)
            .collect(),
        other => vec![other.clone()],
    };

    if items.is_empty() {
        return None;
    }

    items
        .iter()
        .map(|item| try_coerce(item, inner))
        .collect::<Option<Vec<_>>>()
        .map(ParamValue::List)
}

fn coerce_scalar(value: &ParamValue, ty: &ParamType) -> Option<ParamValue> {
    match ty {
        ParamType::Text => match value {
            ParamValue::Text(s) if s.trim().is_empty() => None,
            ParamValue::Text(s) => Some(ParamValue::Text(s.clone())),
            other => Some(ParamValue::Text(other.to_string())),
        },
        ParamType::Integer => match value {
            ParamValue::Integer(i) => Some(ParamValue::Integer(*i)),
            ParamValue::Number(n)
                if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n < i64::MAX as f64 =>
            {
                Some(ParamValue::Integer(*n as i64))
            }
            ParamValue::Text(s) => s.trim().parse::<i64>().ok().map(ParamValue::Integer),
            _ => None,
        },
        ParamType::Number => match value {
            ParamValue::Number(n) => Some(ParamValue::Number(*n)),
            ParamValue::Integer(i) => Some(ParamValue::Number(*i as f64)),
            ParamValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(ParamValue::Number),
            _ => None,
        },
        ParamType::Bool => match value {
            ParamValue::Bool(b) => Some(ParamValue::Bool(*b)),
            ParamValue::Integer(1) => Some(ParamValue::Bool(true)),
            ParamValue::Integer(0) => Some(ParamValue::Bool(false)),
            ParamValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Some(ParamValue::Bool(true)),
                "false" | "no" | "n" | "0" => Some(ParamValue::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        ParamType::Date => match value {
            ParamValue::Date(d) => Some(ParamValue::Date(*d)),
            ParamValue::Text(s) => parse_date(s).map(ParamValue::Date),
            _ => None,
        },
        ParamType::Enum(variants) => {
            let raw = match value {
                ParamValue::Text(s) | ParamValue::Enum(s) => s.trim(),
                _ => return None,
            };
            variants
                .iter()
                .find(|v| v.eq_ignore_ascii_case(raw))
                .map(|v| ParamValue::Enum(v.clone()))
        }
        ParamType::List(inner) => coerce_list(value, inner),
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let today = Local::now().date_naive();

    match raw.to_ascii_lowercase().as_str() {
        "today" => return Some(today),
        "tomorrow" => return Some(today + Duration::days(1)),
        "yesterday" => return Some(today - Duration::days(1)),
        _ => {}
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}
