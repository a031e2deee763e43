//! Typed records: documents mapped onto a [`RecordShape`].

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::error::FieldValueError;
use super::model::{FieldDescriptor, LogicalKind, RecordShape};

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(chrono::DateTime<Utc>),
    Int64(i64),
    Struct(TypedRecord),
    /// Values of a repeated field, in document order
    Array(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&TypedRecord> {
        match self {
            Self::Struct(record) => Some(record),
            _ => None,
        }
    }

    fn fits(&self, kind: &LogicalKind) -> bool {
        match (kind, self) {
            (LogicalKind::String, Self::String(_))
            | (LogicalKind::Date, Self::Date(_))
            | (LogicalKind::Time, Self::Time(_))
            | (LogicalKind::Timestamp, Self::Timestamp(_))
            | (LogicalKind::Int64, Self::Int64(_)) => true,
            (LogicalKind::Struct(shape), Self::Struct(record)) => {
                record.shape().name() == shape.name()
            }
            _ => false,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::String(_) => "string".to_string(),
            Self::Date(_) => "date".to_string(),
            Self::Time(_) => "time".to_string(),
            Self::Timestamp(_) => "timestamp".to_string(),
            Self::Int64(_) => "int64".to_string(),
            Self::Struct(record) => format!("struct {}", record.shape().name()),
            Self::Array(_) => "array".to_string(),
        }
    }
}

/// Whether `value` may be stored in `field`: a list of its kind when repeated, a single value
/// otherwise.
fn accepts(field: &FieldDescriptor, value: &Value) -> bool {
    match value {
        Value::Array(values) if field.repeated => values.iter().all(|v| v.fits(&field.kind)),
        _ if field.repeated => false,
        value => value.fits(&field.kind),
    }
}

fn expected(field: &FieldDescriptor) -> String {
    let kind = match field.kind.shape() {
        Some(shape) => format!("struct {}", shape.name()),
        None => field.kind.name().to_string(),
    };
    if field.repeated {
        format!("array of {kind}")
    } else {
        kind
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s:?}"),
            Self::Date(d) => write!(f, "date({d})"),
            Self::Time(t) => write!(f, "time({t})"),
            Self::Timestamp(ts) => write!(
                f,
                "timestamp({})",
                ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
            ),
            Self::Int64(i) => write!(f, "{i}"),
            Self::Struct(record) => write!(f, "{record}"),
            Self::Array(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// A value tree that always carries the shape it conforms to.
///
/// Values are stored by field position, so iteration follows the shape's field order no matter
/// in which order the source document listed them.
#[derive(Clone, Debug)]
pub struct TypedRecord {
    shape: Arc<RecordShape>,
    values: Vec<Option<Value>>,
}

impl TypedRecord {
    /// A record with every field absent.
    pub fn new(shape: Arc<RecordShape>) -> Self {
        let values = vec![None; shape.fields().len()];
        Self { shape, values }
    }

    pub fn shape(&self) -> &Arc<RecordShape> {
        &self.shape
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        let index = self.shape.field_index(field)?;
        self.values[index].as_ref()
    }

    /// Sets the value at position `index` of the shape's fields.
    pub(crate) fn set(&mut self, index: usize, value: Value) {
        self.values[index] = Some(value);
    }

    /// Sets a field by name. The value must match the field's logical kind and repetition.
    pub fn put(&mut self, field: &str, value: impl Into<Value>) -> Result<(), FieldValueError> {
        let index = self
            .shape
            .field_index(field)
            .ok_or_else(|| FieldValueError::UnknownField {
                shape: self.shape.name().to_string(),
                field: field.to_string(),
            })?;
        let value = value.into();
        let descriptor = &self.shape.fields()[index];
        if !accepts(descriptor, &value) {
            return Err(FieldValueError::KindMismatch {
                shape: self.shape.name().to_string(),
                field: field.to_string(),
                expected: expected(descriptor),
                found: value.describe(),
            });
        }
        self.values[index] = Some(value);
        Ok(())
    }

    /// Present fields in shape order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldDescriptor, &Value)> {
        self.shape
            .fields()
            .iter()
            .zip(&self.values)
            .filter_map(|(field, value)| value.as_ref().map(|value| (field, value)))
    }

    pub fn is_present(&self, field: &str) -> bool {
        self.get(field).is_some()
    }
}

impl PartialEq for TypedRecord {
    fn eq(&self, other: &Self) -> bool {
        self.shape.name() == other.shape.name() && self.values == other.values
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<TypedRecord> for Value {
    fn from(value: TypedRecord) -> Self {
        Self::Struct(value)
    }
}

impl fmt::Display for TypedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (field, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {value}", field.name)?;
        }
        write!(f, "}}")
    }
}

impl Serialize for TypedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (field, value) in self.iter() {
            map.serialize_entry(&field.name, value)?;
        }
        map.end()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::String(s) => serializer.serialize_str(s),
            Self::Date(d) => serializer.collect_str(d),
            Self::Time(t) => serializer.collect_str(t),
            Self::Timestamp(ts) => {
                serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Self::Int64(i) => serializer.serialize_i64(*i),
            Self::Struct(record) => record.serialize(serializer),
            Self::Array(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
        }
    }
}
