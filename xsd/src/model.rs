//! The compiled representation of a schema: record shapes and their fields.
//!
//! Everything in here is plain data, immutable once [`compile`](crate::compile) hands it out and
//! freely shareable between threads.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::error::SchemaCompilationError;
use super::xstypes::QName;

/// Every shape is emitted with this version tag.
pub const SHAPE_VERSION: u32 = 1;

/// Fully-qualified shape name, `package.Local`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeName {
    pub package: String,
    pub local: String,
}

impl ShapeName {
    pub fn new(package: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            local: local.into(),
        }
    }

    /// Splits a dotted name at its last dot.
    pub fn parse(qualified: &str) -> Self {
        match qualified.rsplit_once('.') {
            Some((package, local)) => Self::new(package, local),
            None => Self::new("", qualified),
        }
    }
}

impl fmt::Display for ShapeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.package.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{}.{}", self.package, self.local)
        }
    }
}

/// The fixed set of kinds every schema field is normalized into.
#[derive(Clone, Debug)]
pub enum LogicalKind {
    String,
    Date,
    Time,
    Timestamp,
    Int64,
    Struct(Arc<RecordShape>),
}

impl LogicalKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Date => "date",
            Self::Time => "time",
            Self::Timestamp => "timestamp",
            Self::Int64 => "int64",
            Self::Struct(_) => "struct",
        }
    }

    pub fn shape(&self) -> Option<&Arc<RecordShape>> {
        match self {
            Self::Struct(shape) => Some(shape),
            _ => None,
        }
    }
}

// Nested shapes are identified by name; comparing them structurally would walk the whole tree.
impl PartialEq for LogicalKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Struct(a), Self::Struct(b)) => Arc::ptr_eq(a, b) || a.name == b.name,
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}

impl fmt::Display for LogicalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Struct(shape) => write!(f, "struct {}", shape.name),
            kind => f.write_str(kind.name()),
        }
    }
}

/// Where in the instance document a field's value is read from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// A child element
    Element,
    Attribute,
    /// The element's own character data (simple content)
    Text,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    /// Output name, unique within the containing shape
    pub name: String,
    /// Expanded name of the element or attribute the value is read from
    pub node_name: QName,
    pub node_kind: NodeKind,
    pub kind: LogicalKind,
    pub optional: bool,
    /// Maps to a list of values of `kind`
    pub repeated: bool,
}

impl FieldDescriptor {
    /// A required, single-valued field read from the unqualified child element `name`.
    pub fn new(name: impl Into<String>, kind: LogicalKind) -> Self {
        let name = name.into();
        Self {
            node_name: QName::local(name.clone()),
            name,
            node_kind: NodeKind::Element,
            kind,
            optional: false,
            repeated: false,
        }
    }

    pub fn with_node(mut self, node_kind: NodeKind, node_name: QName) -> Self {
        self.node_kind = node_kind;
        self.node_name = node_name;
        self
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn with_repeated(mut self, repeated: bool) -> Self {
        self.repeated = repeated;
        self
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.name)?;
        if self.repeated {
            write!(f, "[{}]", self.kind)?;
        } else {
            write!(f, "{}", self.kind)?;
        }
        if self.optional {
            write!(f, "?")?;
        }
        Ok(())
    }
}

/// Compiled structural description of one record type.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordShape {
    name: ShapeName,
    version: u32,
    doc: Option<String>,
    fields: Vec<FieldDescriptor>,
}

impl RecordShape {
    /// Fails if two fields share a name.
    pub fn new(
        name: ShapeName,
        doc: Option<String>,
        fields: Vec<FieldDescriptor>,
    ) -> Result<Self, SchemaCompilationError> {
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaCompilationError::DuplicateField {
                    shape: name.to_string(),
                    field: field.name.clone(),
                });
            }
        }
        Ok(Self {
            name,
            version: SHAPE_VERSION,
            doc,
            fields,
        })
    }

    pub fn name(&self) -> &ShapeName {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Fields in output order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| !f.optional)
    }
}

impl fmt::Display for RecordShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "struct {} (version {})", self.name, self.version)?;
        if let Some(doc) = &self.doc {
            writeln!(f, "  // {doc}")?;
        }
        for field in &self.fields {
            writeln!(f, "  {field}")?;
        }
        Ok(())
    }
}

/// The result of compiling a set of schema sources.
#[derive(Clone, Debug)]
pub struct CompiledSchema {
    roots: BTreeMap<QName, Arc<RecordShape>>,
    shapes: Vec<Arc<RecordShape>>,
    sources: Vec<String>,
}

impl CompiledSchema {
    pub(crate) fn new(
        roots: BTreeMap<QName, Arc<RecordShape>>,
        shapes: Vec<Arc<RecordShape>>,
        sources: Vec<String>,
    ) -> Self {
        Self {
            roots,
            shapes,
            sources,
        }
    }

    /// Shape for documents whose root element is `name`.
    pub fn root(&self, name: &QName) -> Option<&Arc<RecordShape>> {
        self.roots.get(name)
    }

    pub fn roots(&self) -> impl Iterator<Item = (&QName, &Arc<RecordShape>)> {
        self.roots.iter()
    }

    /// All shapes in the order they were compiled; nested shapes precede their users.
    pub fn shapes(&self) -> &[Arc<RecordShape>] {
        &self.shapes
    }

    pub fn shape(&self, qualified_name: &str) -> Option<&Arc<RecordShape>> {
        self.shapes
            .iter()
            .find(|s| s.name().to_string() == qualified_name)
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }
}
