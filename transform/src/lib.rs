//! Record transform that parses an XML payload on the key or value side of a record and replaces
//! it with a typed record compiled from XSD schemas.
//!
//! Records that fail to convert either fail the call or, with `reroute.on.fail.topic` set, are
//! sent to that topic with the payload wrapped in a single-field fallback shape.

pub mod config;
pub mod error;
pub mod record;
pub mod resolver;
mod transform;

pub use config::FromXmlConfig;
pub use error::{ApplyError, ConfigError, ConfigureError, PayloadTypeError, RecordError, ResolveError};
pub use record::{Data, Record, Schema, Side};
pub use resolver::{FileResolver, HttpResolver, SchemaResolver};
pub use transform::{FromXml, Transformation, XmlParser, BAD_PAYLOAD_FIELD};
