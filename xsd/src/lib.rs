//! Compiles XSD schemas into record shapes and maps conforming documents onto them.
//!
//! [`compile`] turns a set of schema sources into a [`CompiledSchema`], once per configuration.
//! [`map`] then converts any number of instance documents into [`TypedRecord`]s against it.

pub mod error;
pub mod model;
pub mod naming;
pub mod typed;
pub mod xstypes;

mod annotation;
mod attribute_decl;
mod builtins;
mod compiler;
mod complex_type_def;
mod element_decl;
mod instance;
mod mapping_context;
mod particle;
mod schema;
mod simple_type_def;
mod values;

pub use builtins::{XSI_NAMESPACE, XS_NAMESPACE};
pub use compiler::{compile, CompileOptions, SchemaSource, DEFAULT_PACKAGE};
pub use complex_type_def::SIMPLE_CONTENT_FIELD;
pub use error::{FieldValueError, MappingError, SchemaCompilationError, XsdError};
pub use instance::map;
pub use model::{
    CompiledSchema, FieldDescriptor, LogicalKind, NodeKind, RecordShape, ShapeName, SHAPE_VERSION,
};
pub use typed::{TypedRecord, Value};
pub use xstypes::QName;
