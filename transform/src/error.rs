use thiserror::Error;
use xt_xsd::{FieldValueError, MappingError, SchemaCompilationError};

use crate::record::Side;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required setting {0:?} is missing")]
    Missing(&'static str),
    #[error("setting {key:?} must be a boolean, got {value:?}")]
    InvalidBool { key: &'static str, value: String },
    #[error("setting {key:?} holds an invalid URL {value:?}")]
    InvalidUrl {
        key: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("setting {key:?} must not be empty")]
    Empty { key: &'static str },
}

/// Failure to load the bytes of a schema source.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no resolver handles {url} ({scheme:?} URLs are not supported)")]
    UnsupportedScheme { url: String, scheme: String },
    #[error("{url} does not denote a local file")]
    NotAFile { url: String },
    #[error("failed to read {url}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch {url}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Failure of [`configure`](crate::Transformation::configure); the transform stays unconfigured.
#[derive(Debug, Error)]
pub enum ConfigureError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("schema compilation failed")]
    Compile(#[from] SchemaCompilationError),
    #[error("the transform is already {0}")]
    InvalidState(&'static str),
}

/// The selected side holds neither a string nor text bytes.
#[derive(Debug, Error)]
pub enum PayloadTypeError {
    #[error("{side} payload of type {found} is neither a string nor bytes")]
    Unsupported { side: Side, found: &'static str },
    #[error("{side} payload bytes are not valid {encoding}")]
    Malformed { side: Side, encoding: &'static str },
}

/// Why one record could not be converted; rerouted when a reroute topic is configured.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    PayloadType(#[from] PayloadTypeError),
    #[error("payload is not well-formed XML")]
    Xml(#[from] roxmltree::Error),
    #[error("payload does not match the schema")]
    Mapping(#[from] MappingError),
}

/// Fatal failure of [`apply`](crate::Transformation::apply) for one record.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("the transform has not been configured")]
    NotConfigured,
    #[error("the transform is closed")]
    Closed,
    #[error("failed to convert record {side}")]
    Record {
        side: Side,
        #[source]
        source: RecordError,
    },
    #[error("failed to build the rerouted record")]
    Reroute(#[source] FieldValueError),
}
