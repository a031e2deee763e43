use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use roxmltree::{Node, NodeId};
use tracing::{debug, warn};

use super::{
    builtins::{self, Builtin},
    compiler::CompileOptions,
    complex_type_def::ComplexTypeDefinition,
    error::{SchemaCompilationError, XsdError},
    model::{CompiledSchema, LogicalKind, RecordShape, ShapeName},
    naming,
    schema::{location, Definition, DefinitionKind, SchemaDocument, SymbolTable},
    simple_type_def::SimpleTypeDefinition,
    xstypes::QName,
};

/// A type reference after resolution.
pub(crate) enum TypeRef<'a, 'input> {
    AnyType,
    Builtin(LogicalKind),
    Simple(Definition<'a, 'input>),
    Complex(Definition<'a, 'input>),
}

/// State of one compilation pass over all schema sources.
pub(crate) struct CompileContext<'a, 'input, 'o> {
    pub options: &'o CompileOptions,
    documents: Vec<SchemaDocument<'a, 'input>>,
    symbols: SymbolTable<'a, 'input>,

    compiled: HashMap<(usize, NodeId), Arc<RecordShape>>,
    in_progress: Vec<((usize, NodeId), String)>,
    shape_owners: HashMap<ShapeName, usize>,
    /// Local shape names of every top-level complex type, across all sources.
    declared_names: HashSet<String>,
    shapes: Vec<Arc<RecordShape>>,
    roots: BTreeMap<QName, (Arc<RecordShape>, usize)>,
}

impl<'a, 'input: 'a, 'o> CompileContext<'a, 'input, 'o> {
    pub fn new(
        options: &'o CompileOptions,
        documents: Vec<SchemaDocument<'a, 'input>>,
    ) -> Result<Self, SchemaCompilationError> {
        let symbols = SymbolTable::build(&documents)?;
        let declared_names = documents
            .iter()
            .flat_map(|document| document.top_level())
            .filter(|(_, node)| node.tag_name().name() == ComplexTypeDefinition::TAG_NAME)
            .filter_map(|(_, node)| node.attribute("name"))
            .map(naming::shape_name)
            .collect();
        Ok(Self {
            options,
            documents,
            symbols,
            compiled: HashMap::new(),
            in_progress: Vec::new(),
            shape_owners: HashMap::new(),
            declared_names,
            shapes: Vec::new(),
            roots: BTreeMap::new(),
        })
    }

    pub fn documents(&self) -> &[SchemaDocument<'a, 'input>] {
        &self.documents
    }

    pub fn document(&self, source: usize) -> &SchemaDocument<'a, 'input> {
        &self.documents[source]
    }

    pub fn location(&self, source: usize, node: Node) -> String {
        location(self.documents[source].uri, node)
    }

    pub fn xsd_error(&self, source: usize, node: Node, error: XsdError) -> SchemaCompilationError {
        SchemaCompilationError::Xsd {
            location: self.location(source, node),
            source: error,
        }
    }

    pub fn resolve(
        &self,
        kind: DefinitionKind,
        name: &QName,
        source: usize,
        referrer: Node,
    ) -> Result<Definition<'a, 'input>, SchemaCompilationError> {
        self.symbols
            .resolve(kind, name, source)
            .ok_or_else(|| SchemaCompilationError::Unresolved {
                kind: kind.display_name(),
                name: name.clone(),
                location: self.location(source, referrer),
            })
    }

    pub fn resolve_type(
        &self,
        name: &QName,
        source: usize,
        referrer: Node,
    ) -> Result<TypeRef<'a, 'input>, SchemaCompilationError> {
        match builtins::lookup(name) {
            Some(Builtin::AnyType) => return Ok(TypeRef::AnyType),
            Some(Builtin::Simple(kind)) => return Ok(TypeRef::Builtin(kind)),
            None => {}
        }
        let definition = self.resolve(DefinitionKind::Type, name, source, referrer)?;
        if definition.node.tag_name().name() == ComplexTypeDefinition::TAG_NAME {
            Ok(TypeRef::Complex(definition))
        } else {
            Ok(TypeRef::Simple(definition))
        }
    }

    /// Logical kind of the type named by `name`, compiling complex types on demand.
    pub fn kind_of_type(
        &mut self,
        name: &QName,
        source: usize,
        referrer: Node,
    ) -> Result<LogicalKind, SchemaCompilationError> {
        match self.resolve_type(name, source, referrer)? {
            TypeRef::AnyType => {
                self.unrepresentable("xs:anyType", source, referrer)?;
                Ok(LogicalKind::String)
            }
            TypeRef::Builtin(kind) => Ok(kind),
            TypeRef::Simple(definition) => {
                SimpleTypeDefinition::kind(self, definition.source, definition.node)
            }
            TypeRef::Complex(definition) => {
                ComplexTypeDefinition::compile_named(self, definition.source, definition.node)
                    .map(LogicalKind::Struct)
            }
        }
    }

    /// As [`Self::kind_of_type`], but `name` must denote a simple type.
    pub fn simple_kind_of_type(
        &mut self,
        name: &QName,
        source: usize,
        referrer: Node,
    ) -> Result<LogicalKind, SchemaCompilationError> {
        match self.resolve_type(name, source, referrer)? {
            TypeRef::AnyType | TypeRef::Complex(_) => Err(self.xsd_error(
                source,
                referrer,
                XsdError::ComplexTypeNotAllowed { name: name.clone() },
            )),
            TypeRef::Builtin(kind) => Ok(kind),
            TypeRef::Simple(definition) => {
                SimpleTypeDefinition::kind(self, definition.source, definition.node)
            }
        }
    }

    /// Rejects a construct that has no field representation under strict checking, otherwise
    /// lets the caller skip or coerce it.
    pub fn unrepresentable(
        &self,
        construct: &'static str,
        source: usize,
        node: Node,
    ) -> Result<(), SchemaCompilationError> {
        let location = self.location(source, node);
        if self.options.strict_check {
            return Err(SchemaCompilationError::Unrepresentable {
                construct,
                location,
            });
        }
        debug!(construct, %location, "coercing construct without a record representation");
        Ok(())
    }

    /// Runs `f` with `node` marked as in progress; re-entering a node in progress is a cycle.
    pub fn guarded<T>(
        &mut self,
        source: usize,
        node: Node,
        label: impl Into<String>,
        f: impl FnOnce(&mut Self) -> Result<T, SchemaCompilationError>,
    ) -> Result<T, SchemaCompilationError> {
        let key = (source, node.id());
        let label = label.into();
        if let Some(start) = self.in_progress.iter().position(|(k, _)| *k == key) {
            let mut path = self.in_progress[start..]
                .iter()
                .map(|(_, label)| label.clone())
                .collect::<Vec<_>>();
            path.push(label);
            return Err(SchemaCompilationError::Circular { path });
        }

        self.in_progress.push((key, label));
        let result = f(self);
        self.in_progress.pop();
        result
    }

    pub fn compiled(&self, source: usize, node: Node) -> Option<Arc<RecordShape>> {
        self.compiled.get(&(source, node.id())).cloned()
    }

    /// Claims `package.local` for a new shape declared in `source`.
    ///
    /// Names of anonymous types (`declared == false`) never collide: they step aside for every
    /// other shape and for the names of top-level complex types not compiled yet.
    pub fn claim_shape_name(
        &mut self,
        local: &str,
        source: usize,
        declared: bool,
    ) -> Result<ShapeName, SchemaCompilationError> {
        let package = self.options.target_package.clone();
        let wanted = ShapeName::new(package.clone(), local);
        let taken = |context: &Self, candidate: &str| {
            context
                .shape_owners
                .contains_key(&ShapeName::new(package.clone(), candidate))
        };

        if !declared {
            if !taken(self, local) && !self.declared_names.contains(local) {
                self.shape_owners.insert(wanted.clone(), source);
                return Ok(wanted);
            }
            let local = naming::disambiguate(local, |candidate| {
                taken(self, candidate) || self.declared_names.contains(candidate)
            });
            let renamed = ShapeName::new(package.clone(), local);
            debug!(shape = %wanted, renamed = %renamed, "anonymous type renamed");
            self.shape_owners.insert(renamed.clone(), source);
            return Ok(renamed);
        }

        if let Some(&owner) = self.shape_owners.get(&wanted) {
            if !self.options.resolve_name_conflicts {
                return Err(SchemaCompilationError::NameCollision {
                    name: wanted.to_string(),
                    first: self.documents[owner].uri.to_string(),
                    second: self.documents[source].uri.to_string(),
                });
            }
            let local = naming::disambiguate(local, |candidate| {
                taken(self, candidate) || self.declared_names.contains(candidate)
            });
            let renamed = ShapeName::new(package, local);
            warn!(
                shape = %wanted,
                renamed = %renamed,
                uri = self.documents[source].uri,
                "shape name collision resolved"
            );
            self.shape_owners.insert(renamed.clone(), source);
            return Ok(renamed);
        }
        self.shape_owners.insert(wanted.clone(), source);
        Ok(wanted)
    }

    pub fn register_shape(&mut self, source: usize, node: Node, shape: RecordShape) -> Arc<RecordShape> {
        let shape = Arc::new(shape);
        self.compiled.insert((source, node.id()), shape.clone());
        self.shapes.push(shape.clone());
        shape
    }

    pub fn register_root(
        &mut self,
        name: QName,
        shape: Arc<RecordShape>,
        source: usize,
    ) -> Result<(), SchemaCompilationError> {
        if let Some((_, first)) = self.roots.get(&name) {
            let first = *first;
            if !self.options.resolve_name_conflicts {
                return Err(SchemaCompilationError::DuplicateRoot {
                    name,
                    first: self.documents[first].uri.to_string(),
                    second: self.documents[source].uri.to_string(),
                });
            }
            warn!(
                element = %name,
                kept = self.documents[first].uri,
                ignored = self.documents[source].uri,
                "global element declared twice, keeping the first"
            );
            return Ok(());
        }
        self.roots.insert(name, (shape, source));
        Ok(())
    }

    pub fn finish(self) -> CompiledSchema {
        let roots = self
            .roots
            .into_iter()
            .map(|(name, (shape, _))| (name, shape))
            .collect();
        let sources = self.documents.iter().map(|d| d.uri.to_string()).collect();
        CompiledSchema::new(roots, self.shapes, sources)
    }
}
