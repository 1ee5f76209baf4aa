use std::str::FromStr;

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::AppError;

/// One decoded JSON object from a quote file, keyed by currency pair.
pub type QuoteObject = Map<String, Value>;

/// `DECIMAL(10, 4)`: six integer digits, four fractional.
pub const VALUE_SCALE: i64 = 4;
const VALUE_INTEGER_DIGITS: u32 = 6;

const REFERENCE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];
const REFERENCE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Top-level shape of a quote file.
#[derive(Debug, Clone, PartialEq)]
pub enum QuotePayload {
    Single(QuoteObject),
    /// Head of a non-empty list; later elements are never inspected.
    Wrapped(QuoteObject),
    Empty,
}

impl QuotePayload {
    /// Decode raw object bytes. A top-level object, or a list whose first
    /// element is an object, is accepted; anything else is a parse error.
    pub fn decode(bytes: &[u8]) -> Result<Self, AppError> {
        let value: Value = serde_json::from_slice(bytes)?;
        match value {
            Value::Array(items) => match items.into_iter().next() {
                Some(head) => Ok(QuotePayload::Wrapped(serde_json::from_value(head)?)),
                None => Ok(QuotePayload::Empty),
            },
            other => Ok(QuotePayload::Single(serde_json::from_value(other)?)),
        }
    }

    /// The object a quote is read from: the object itself, or the first list element.
    pub fn primary(&self) -> Option<&QuoteObject> {
        match self {
            QuotePayload::Single(object) | QuotePayload::Wrapped(object) => Some(object),
            QuotePayload::Empty => None,
        }
    }
}

/// A validated quote ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub pair: String,
    pub value: BigDecimal,
    pub reference_time: NaiveDateTime,
}

impl Quote {
    /// Read `bid` and `create_date` from the object under `pair`.
    pub fn extract(object: &QuoteObject, pair: &str) -> Result<Self, AppError> {
        let content = Value::Object(object.clone()).to_string();
        let invalid = |reason: String| AppError::validation(reason, content.clone());

        let fields = match object.get(pair) {
            Some(Value::Object(fields)) => fields,
            Some(_) => return Err(invalid(format!("{} is not an object", pair))),
            None => return Err(invalid(format!("missing {} quote", pair))),
        };

        let bid = fields.get("bid").unwrap_or(&Value::Null);
        let value = parse_bid(bid).map_err(|reason| invalid(format!("{}.bid {}", pair, reason)))?;

        let reference_time = match fields.get("create_date") {
            Some(Value::String(raw)) => parse_reference_time(raw).ok_or_else(|| {
                invalid(format!("{}.create_date '{}' is not a timestamp", pair, raw))
            })?,
            Some(Value::Null) | None => {
                return Err(invalid(format!("{}.create_date is missing", pair)))
            }
            Some(other) => {
                return Err(invalid(format!("{}.create_date {} is not a string", pair, other)))
            }
        };

        Ok(Self {
            pair: pair.to_string(),
            value,
            reference_time,
        })
    }
}

/// Falsy bids (null, false, "", numeric 0) are rejected along with anything
/// that is not a decimal or does not fit the column. A non-empty string is
/// truthy, so `"0.00"` is loaded as zero.
fn parse_bid(bid: &Value) -> Result<BigDecimal, String> {
    let value = match bid {
        Value::Null => return Err("is missing".to_string()),
        Value::Bool(false) => return Err("is false".to_string()),
        Value::String(s) if s.is_empty() => return Err("is empty".to_string()),
        Value::String(s) => {
            let raw = s.trim();
            BigDecimal::from_str(raw).map_err(|_| format!("'{}' is not a number", raw))?
        }
        Value::Number(n) => {
            let value = BigDecimal::from_str(&n.to_string()).map_err(|_| format!("{} is not a number", n))?;
            if value.is_zero() {
                return Err("is zero".to_string());
            }
            value
        }
        other => return Err(format!("{} is not a number", other)),
    };

    let value = value.round(VALUE_SCALE).with_scale(VALUE_SCALE);
    if value.abs() >= BigDecimal::from(10u64.pow(VALUE_INTEGER_DIGITS)) {
        return Err(format!("{} does not fit DECIMAL(10, 4)", value));
    }
    Ok(value)
}

/// Accepts what a `TIMESTAMP` column would: a date alone means midnight, and
/// an explicit offset is dropped, keeping the wall-clock time.
fn parse_reference_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    REFERENCE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_local()))
        .or_else(|| {
            NaiveDate::parse_from_str(raw, REFERENCE_DATE_FORMAT)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
