//! Typed cell values and their decoding from the BigQuery wire format.
//!
//! BigQuery returns rows as `{"f": [{"v": ...}, ...]}` where scalar cells
//! are JSON strings, repeated fields are arrays of `{"v": ...}` and records
//! are nested `{"f": [...]}` objects. The table schema says how to read them.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WarehouseError;

/// One field of a result schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub mode: Option<String>,
    /// Sub-fields for `RECORD` / `STRUCT` columns.
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

impl FieldSchema {
    pub fn new(name: &str, field_type: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: field_type.to_string(),
            mode: None,
            fields: Vec::new(),
        }
    }

    fn is_repeated(&self) -> bool {
        self.mode.as_deref() == Some("REPEATED")
    }
}

/// A decoded cell.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// `NUMERIC` / `BIGNUMERIC`, kept as decimal text to avoid precision loss.
    Numeric(String),
    /// Base64-encoded bytes as delivered.
    Bytes(String),
    Timestamp(DateTime<Utc>),
    Date(String),
    Time(String),
    DateTime(String),
    Repeated(Vec<FieldValue>),
    Record(IndexMap<String, FieldValue>),
}

impl FieldValue {
    /// Name of the variant, as used in type-mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "NULL",
            FieldValue::String(_) => "STRING",
            FieldValue::Integer(_) => "INTEGER",
            FieldValue::Float(_) => "FLOAT",
            FieldValue::Boolean(_) => "BOOLEAN",
            FieldValue::Numeric(_) => "NUMERIC",
            FieldValue::Bytes(_) => "BYTES",
            FieldValue::Timestamp(_) => "TIMESTAMP",
            FieldValue::Date(_) => "DATE",
            FieldValue::Time(_) => "TIME",
            FieldValue::DateTime(_) => "DATETIME",
            FieldValue::Repeated(_) => "REPEATED",
            FieldValue::Record(_) => "RECORD",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("NULL"),
            FieldValue::String(s)
            | FieldValue::Numeric(s)
            | FieldValue::Bytes(s)
            | FieldValue::Date(s)
            | FieldValue::Time(s)
            | FieldValue::DateTime(s) => f.write_str(s),
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Timestamp(ts) => {
                f.write_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            FieldValue::Repeated(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            FieldValue::Record(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode one `{"f": [...]}` row object against the schema, in schema order.
pub fn decode_row(
    schema: &[FieldSchema],
    raw: &Value,
) -> Result<IndexMap<String, FieldValue>, WarehouseError> {
    let cells = raw
        .get("f")
        .and_then(Value::as_array)
        .ok_or_else(|| WarehouseError::Parse("row is missing its \"f\" array".into()))?;

    if cells.len() != schema.len() {
        return Err(WarehouseError::Parse(format!(
            "row has {} cells but schema has {} fields",
            cells.len(),
            schema.len()
        )));
    }

    schema
        .iter()
        .zip(cells)
        .map(|(field, cell)| {
            let v = cell.get("v").unwrap_or(&Value::Null);
            decode_cell(field, v).map(|value| (field.name.clone(), value))
        })
        .collect()
}

fn decode_cell(field: &FieldSchema, v: &Value) -> Result<FieldValue, WarehouseError> {
    if v.is_null() {
        return Ok(FieldValue::Null);
    }

    if field.is_repeated() {
        let items = v.as_array().ok_or_else(|| {
            WarehouseError::Parse(format!("repeated field {} is not an array", field.name))
        })?;
        let element = FieldSchema {
            mode: None,
            ..field.clone()
        };
        return items
            .iter()
            .map(|item| decode_cell(&element, item.get("v").unwrap_or(&Value::Null)))
            .collect::<Result<Vec<_>, _>>()
            .map(FieldValue::Repeated);
    }

    match field.field_type.as_str() {
        "RECORD" | "STRUCT" => decode_row(&field.fields, v).map(FieldValue::Record),
        _ => {
            let text = v.as_str().ok_or_else(|| {
                WarehouseError::Parse(format!("field {} is not a scalar string", field.name))
            })?;
            decode_scalar(field, text)
        }
    }
}

fn decode_scalar(field: &FieldSchema, text: &str) -> Result<FieldValue, WarehouseError> {
    let bad = |what: &str| {
        WarehouseError::Parse(format!("field {}: invalid {} {:?}", field.name, what, text))
    };

    let value = match field.field_type.as_str() {
        "INTEGER" | "INT64" => FieldValue::Integer(text.parse().map_err(|_| bad("integer"))?),
        "FLOAT" | "FLOAT64" => FieldValue::Float(text.parse().map_err(|_| bad("float"))?),
        "BOOLEAN" | "BOOL" => match text {
            "true" | "TRUE" => FieldValue::Boolean(true),
            "false" | "FALSE" => FieldValue::Boolean(false),
            _ => return Err(bad("boolean")),
        },
        "NUMERIC" | "BIGNUMERIC" => FieldValue::Numeric(text.to_string()),
        "BYTES" => FieldValue::Bytes(text.to_string()),
        "TIMESTAMP" => {
            let secs: f64 = text.parse().map_err(|_| bad("timestamp"))?;
            FieldValue::Timestamp(timestamp_from_seconds(secs).ok_or_else(|| bad("timestamp"))?)
        }
        "DATE" => FieldValue::Date(text.to_string()),
        "TIME" => FieldValue::Time(text.to_string()),
        "DATETIME" => FieldValue::DateTime(text.to_string()),
        _ => FieldValue::String(text.to_string()),
    };
    Ok(value)
}

/// Epoch seconds (possibly fractional, possibly in exponent notation) at
/// microsecond precision.
fn timestamp_from_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let micros = (secs * 1_000_000.0).round() as i64;
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::from_timestamp(micros.div_euclid(1_000_000), nanos)
}
