//! The record envelope exchanged with the surrounding pipeline.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use xt_xsd::{RecordShape, TypedRecord};

/// Which half of a record a transform reads and writes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Key,
    Value,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Key => "key",
            Self::Value => "value",
        })
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "key" => Ok(Self::Key),
            "value" => Ok(Self::Value),
            other => Err(format!("unknown record side {other:?}, expected key or value")),
        }
    }
}

/// Schema of one side of a record.
#[derive(Clone, Debug, PartialEq)]
pub enum Schema {
    String,
    Bytes,
    Int64,
    Boolean,
    Struct(Arc<RecordShape>),
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Bytes => f.write_str("bytes"),
            Self::Int64 => f.write_str("int64"),
            Self::Boolean => f.write_str("boolean"),
            Self::Struct(shape) => write!(f, "struct {} (version {})", shape.name(), shape.version()),
        }
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Data of one side of a record.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Data {
    Null,
    String(String),
    Bytes(Vec<u8>),
    Int64(i64),
    Boolean(bool),
    Struct(TypedRecord),
}

impl Data {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Int64(_) => "int64",
            Self::Boolean(_) => "boolean",
            Self::Struct(_) => "struct",
        }
    }

    /// The schema that describes this data, `None` for null.
    pub fn schema(&self) -> Option<Schema> {
        match self {
            Self::Null => None,
            Self::String(_) => Some(Schema::String),
            Self::Bytes(_) => Some(Schema::Bytes),
            Self::Int64(_) => Some(Schema::Int64),
            Self::Boolean(_) => Some(Schema::Boolean),
            Self::Struct(record) => Some(Schema::Struct(record.shape().clone())),
        }
    }

    /// Text form used when the payload is kept as is; bytes are decoded lossily.
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::String(s) => s.clone(),
            Self::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Self::Int64(i) => i.to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Struct(record) => record.to_string(),
        }
    }
}

impl From<&str> for Data {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Data {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<u8>> for Data {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Record {
    pub topic: String,
    pub partition: Option<i32>,
    pub key_schema: Option<Schema>,
    pub key: Data,
    pub value_schema: Option<Schema>,
    pub value: Data,
    /// Milliseconds since the Unix epoch
    pub timestamp: Option<i64>,
}

impl Record {
    /// A record whose schemas are derived from its data.
    pub fn new(topic: impl Into<String>, key: impl Into<Data>, value: impl Into<Data>) -> Self {
        let key = key.into();
        let value = value.into();
        Self {
            topic: topic.into(),
            partition: None,
            key_schema: key.schema(),
            key,
            value_schema: value.schema(),
            value,
            timestamp: None,
        }
    }

    pub fn with_partition(mut self, partition: i32) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn schema(&self, side: Side) -> Option<&Schema> {
        match side {
            Side::Key => self.key_schema.as_ref(),
            Side::Value => self.value_schema.as_ref(),
        }
    }

    pub fn data(&self, side: Side) -> &Data {
        match side {
            Side::Key => &self.key,
            Side::Value => &self.value,
        }
    }

    /// Copy of this record with `side` replaced; topic, partition, timestamp and the other side
    /// are kept.
    pub fn with_side(&self, side: Side, schema: Option<Schema>, data: Data) -> Self {
        let mut record = self.clone();
        match side {
            Side::Key => {
                record.key_schema = schema;
                record.key = data;
            }
            Side::Value => {
                record.value_schema = schema;
                record.value = data;
            }
        }
        record
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }
}
