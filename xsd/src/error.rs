use thiserror::Error;

use crate::xstypes::QName;

/// Errors in the XML representation of a single schema component.
#[derive(Debug, Error)]
pub enum XsdError {
    #[error("failed to resolve prefix {0:?} to a namespace URI")]
    NamePrefixNotResolved(String),
    #[error("invalid value {value:?}, expected {expected}")]
    InvalidValue {
        value: String,
        expected: &'static str,
    },
    #[error("<{element}> is missing the {attribute:?} attribute")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },
    #[error("unexpected <{found}> inside <{parent}>")]
    UnexpectedElement { parent: String, found: String },
    #[error("<{parent}> needs one of {expected:?} as a child")]
    MissingChild {
        parent: String,
        expected: &'static [&'static str],
    },
    #[error("{name} is a complex type but must be simple here")]
    ComplexTypeNotAllowed { name: QName },
}

/// Failure of [`compile`](crate::compile); fatal to configuration.
#[derive(Debug, Error)]
pub enum SchemaCompilationError {
    #[error("no schema sources were supplied")]
    NoSources,
    #[error("{uri} is not well-formed XML")]
    Xml {
        uri: String,
        #[source]
        source: roxmltree::Error,
    },
    #[error("{uri} is not an XML schema (root element is {found})")]
    NotASchema { uri: String, found: QName },
    #[error("invalid schema component at {location}")]
    Xsd {
        location: String,
        #[source]
        source: XsdError,
    },
    #[error("{kind} {name} is defined more than once ({location})")]
    DuplicateDefinition {
        kind: &'static str,
        name: QName,
        location: String,
    },
    #[error("{kind} {name} referenced at {location} cannot be resolved")]
    Unresolved {
        kind: &'static str,
        name: QName,
        location: String,
    },
    #[error("circular definition: {}", .path.join(" -> "))]
    Circular { path: Vec<String> },
    #[error("shape name {name} {}", collision_origin(.first, .second))]
    NameCollision {
        name: String,
        first: String,
        second: String,
    },
    #[error("field {field:?} is declared more than once in {shape}")]
    DuplicateField { shape: String, field: String },
    #[error("global element {name} is declared by both {first} and {second}")]
    DuplicateRoot {
        name: QName,
        first: String,
        second: String,
    },
    #[error("{construct} in {location} cannot be represented as a record field")]
    Unrepresentable {
        construct: &'static str,
        location: String,
    },
}

/// A value that does not fit the record field it is put into.
#[derive(Debug, Error)]
pub enum FieldValueError {
    #[error("{shape} has no field {field:?}")]
    UnknownField { shape: String, field: String },
    #[error("field {field:?} of {shape} holds {expected}, not {found}")]
    KindMismatch {
        shape: String,
        field: String,
        expected: String,
        found: String,
    },
}

fn collision_origin(first: &str, second: &str) -> String {
    if first == second {
        format!("is produced twice by {first}")
    } else {
        format!("produced by {second} collides with the one from {first}")
    }
}

/// Failure to map one document; recoverable by the caller.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("no record shape is compiled for root element {0}")]
    UnknownRoot(QName),
    #[error("required field {field:?} of {shape} is missing at {path}")]
    MissingField {
        shape: String,
        field: String,
        path: String,
    },
    #[error("{path} occurs {count} times but {field:?} holds a single value")]
    UnexpectedRepetition {
        field: String,
        path: String,
        count: usize,
    },
    #[error("invalid value at {path}")]
    InvalidValue {
        path: String,
        #[source]
        source: xt_builtins::meta::Error,
    },
}
