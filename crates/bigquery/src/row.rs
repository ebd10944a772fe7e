use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::WarehouseError;
use crate::value::FieldValue;

/// One result row: column name to typed value, in result-set order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultRow {
    values: IndexMap<String, FieldValue>,
}

impl ResultRow {
    pub fn new(values: IndexMap<String, FieldValue>) -> Self {
        Self { values }
    }

    /// Build a row from `(name, value)` pairs, keeping their order.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, FieldValue)>,
        S: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Look up a column by name (case-sensitive).
    pub fn get(&self, column: &str) -> Result<&FieldValue, WarehouseError> {
        self.values
            .get(column)
            .ok_or_else(|| WarehouseError::ColumnNotFound {
                column: column.to_string(),
            })
    }

    /// String value of a `STRING` column.
    pub fn get_str(&self, column: &str) -> Result<&str, WarehouseError> {
        match self.get(column)? {
            FieldValue::String(s) => Ok(s),
            other => Err(mismatch(column, ColumnKind::String, other)),
        }
    }

    pub fn get_i64(&self, column: &str) -> Result<i64, WarehouseError> {
        match self.get(column)? {
            FieldValue::Integer(n) => Ok(*n),
            other => Err(mismatch(column, ColumnKind::Integer, other)),
        }
    }

    /// Float value; integer columns widen.
    pub fn get_f64(&self, column: &str) -> Result<f64, WarehouseError> {
        match self.get(column)? {
            FieldValue::Float(x) => Ok(*x),
            FieldValue::Integer(n) => Ok(*n as f64),
            other => Err(mismatch(column, ColumnKind::Float, other)),
        }
    }

    pub fn get_bool(&self, column: &str) -> Result<bool, WarehouseError> {
        match self.get(column)? {
            FieldValue::Boolean(b) => Ok(*b),
            other => Err(mismatch(column, ColumnKind::Boolean, other)),
        }
    }

    pub fn get_timestamp(&self, column: &str) -> Result<DateTime<Utc>, WarehouseError> {
        match self.get(column)? {
            FieldValue::Timestamp(ts) => Ok(*ts),
            other => Err(mismatch(column, ColumnKind::Timestamp, other)),
        }
    }

    /// Extract the column named by `spec`, checked against its declared kind.
    pub fn extract(&self, spec: &ColumnSpec) -> Result<FieldValue, WarehouseError> {
        let name = spec.name.as_str();
        let value = match spec.kind {
            ColumnKind::String => FieldValue::String(self.get_str(name)?.to_string()),
            ColumnKind::Integer => FieldValue::Integer(self.get_i64(name)?),
            ColumnKind::Float => FieldValue::Float(self.get_f64(name)?),
            ColumnKind::Boolean => FieldValue::Boolean(self.get_bool(name)?),
            ColumnKind::Timestamp => FieldValue::Timestamp(self.get_timestamp(name)?),
        };
        Ok(value)
    }

    /// Render the given columns as `label: value` pairs separated by spaces,
    /// e.g. `url: https://x/1 views: 5`.
    pub fn format_line(&self, columns: &[ColumnSpec]) -> Result<String, WarehouseError> {
        let parts = columns
            .iter()
            .map(|spec| Ok(format!("{}: {}", spec.label(), self.extract(spec)?)))
            .collect::<Result<Vec<String>, WarehouseError>>()?;
        Ok(parts.join(" "))
    }
}

fn mismatch(column: &str, expected: ColumnKind, actual: &FieldValue) -> WarehouseError {
    WarehouseError::ColumnTypeMismatch {
        column: column.to_string(),
        expected: expected.as_str(),
        actual: actual.type_name(),
    }
}

// ---------------------------------------------------------------------------
// Extraction schema
// ---------------------------------------------------------------------------

/// Declared type of an extracted column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    String,
    Integer,
    Float,
    Boolean,
    Timestamp,
}

impl ColumnKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnKind::String => "STRING",
            ColumnKind::Integer => "INTEGER",
            ColumnKind::Float => "FLOAT",
            ColumnKind::Boolean => "BOOLEAN",
            ColumnKind::Timestamp => "TIMESTAMP",
        }
    }
}

impl FromStr for ColumnKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" | "str" => Ok(ColumnKind::String),
            "integer" | "int" | "int64" | "long" => Ok(ColumnKind::Integer),
            "float" | "float64" | "double" => Ok(ColumnKind::Float),
            "boolean" | "bool" => Ok(ColumnKind::Boolean),
            "timestamp" => Ok(ColumnKind::Timestamp),
            other => Err(format!("unknown column kind: {}", other)),
        }
    }
}

/// One column to pull out of each row, and how to label it on output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
    /// Output label; defaults to the column name.
    #[serde(default)]
    pub label: Option<String>,
}

impl ColumnSpec {
    pub fn new(name: &str, kind: ColumnKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            label: None,
        }
    }

    pub fn labelled(name: &str, kind: ColumnKind, label: &str) -> Self {
        Self {
            label: Some(label.to_string()),
            ..Self::new(name, kind)
        }
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Parses `name:kind[:label]`, e.g. `view_count:integer:views`.
impl FromStr for ColumnSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let name = parts.next().unwrap_or_default().trim();
        if name.is_empty() {
            return Err(format!("column spec {:?} has no name", s));
        }
        let kind = parts
            .next()
            .ok_or_else(|| format!("column spec {:?} has no kind (expected name:kind)", s))?
            .trim()
            .parse()?;
        let label = parts
            .next()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string);

        Ok(Self {
            name: name.to_string(),
            kind,
            label,
        })
    }
}

impl fmt::Display for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.kind.as_str().to_ascii_lowercase())?;
        if let Some(label) = &self.label {
            write!(f, ":{}", label)?;
        }
        Ok(())
    }
}
