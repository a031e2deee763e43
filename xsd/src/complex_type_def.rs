use std::sync::Arc;

use roxmltree::Node;
use tracing::{debug, warn};

use super::{
    annotation::Annotation,
    attribute_decl::AttributeDeclaration,
    error::{SchemaCompilationError, XsdError},
    mapping_context::{CompileContext, TypeRef},
    model::{FieldDescriptor, LogicalKind, NodeKind, RecordShape, ShapeName},
    naming,
    particle::{Occurrence, Particle},
    schema::{required_attribute, xs_children},
    simple_type_def::SimpleTypeDefinition,
    values::attribute_value,
    xstypes::QName,
};

/// Field name holding the character data of a type with simple content.
pub const SIMPLE_CONTENT_FIELD: &str = "value";

/// Fields of a shape under construction, in declaration order.
pub(crate) struct FieldSet {
    shape: String,
    resolve_conflicts: bool,
    fields: Vec<FieldDescriptor>,
}

impl FieldSet {
    pub fn new(shape: &ShapeName, resolve_conflicts: bool) -> Self {
        Self {
            shape: shape.to_string(),
            resolve_conflicts,
            fields: Vec::new(),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    pub fn push(&mut self, mut field: FieldDescriptor) -> Result<(), SchemaCompilationError> {
        if self.contains(&field.name) {
            if !self.resolve_conflicts {
                return Err(SchemaCompilationError::DuplicateField {
                    shape: self.shape.clone(),
                    field: field.name,
                });
            }
            let renamed = naming::disambiguate(&field.name, |candidate| self.contains(candidate));
            warn!(
                shape = %self.shape,
                field = %field.name,
                %renamed,
                "field name collision resolved"
            );
            field.name = renamed;
        }
        self.fields.push(field);
        Ok(())
    }

    pub fn extend(
        &mut self,
        fields: impl IntoIterator<Item = FieldDescriptor>,
    ) -> Result<(), SchemaCompilationError> {
        fields.into_iter().try_for_each(|field| self.push(field))
    }

    /// Replaces the field read from the same node as `field`, or appends it.
    fn redeclare(&mut self, field: FieldDescriptor) -> Result<(), SchemaCompilationError> {
        match self
            .fields
            .iter_mut()
            .find(|f| f.node_kind == field.node_kind && f.node_name == field.node_name)
        {
            Some(existing) => {
                *existing = field;
                Ok(())
            }
            None => self.push(field),
        }
    }

    pub fn into_fields(self) -> Vec<FieldDescriptor> {
        self.fields
    }
}

/// `<complexType>`; compiles into a [`RecordShape`].
pub(crate) struct ComplexTypeDefinition;

impl ComplexTypeDefinition {
    pub const TAG_NAME: &'static str = "complexType";

    /// Compiles a top-level complex type, named after its `name` attribute.
    pub fn compile_named<'a, 'input: 'a>(
        context: &mut CompileContext<'a, 'input, '_>,
        source: usize,
        complex_type: Node<'a, 'input>,
    ) -> Result<Arc<RecordShape>, SchemaCompilationError> {
        let name = required_attribute(context.document(source).uri, complex_type, "name")?;
        Self::compile(context, source, complex_type, &naming::shape_name(&name))
    }

    /// Compiles `complex_type` once; later calls return the same shape. `local` names the shape
    /// unless it is already taken.
    pub fn compile<'a, 'input: 'a>(
        context: &mut CompileContext<'a, 'input, '_>,
        source: usize,
        complex_type: Node<'a, 'input>,
        local: &str,
    ) -> Result<Arc<RecordShape>, SchemaCompilationError> {
        if let Some(shape) = context.compiled(source, complex_type) {
            return Ok(shape);
        }

        let declared = complex_type.attribute("name").is_some();
        let label = match complex_type.attribute("name") {
            Some(name) => format!("complexType {name}"),
            None => format!("anonymous complexType {local}"),
        };
        context.guarded(source, complex_type, label, |context| {
            let name = context.claim_shape_name(local, source, declared)?;
            let mut fields = FieldSet::new(&name, context.options.resolve_name_conflicts);
            Self::collect_content(context, source, complex_type, &name.local, &mut fields)?;

            let shape = RecordShape::new(
                name,
                Annotation::documentation(complex_type),
                fields.into_fields(),
            )?;
            Ok(context.register_shape(source, complex_type, shape))
        })
    }

    fn collect_content<'a, 'input: 'a>(
        context: &mut CompileContext<'a, 'input, '_>,
        source: usize,
        complex_type: Node<'a, 'input>,
        owner: &str,
        fields: &mut FieldSet,
    ) -> Result<(), SchemaCompilationError> {
        Self::check_mixed(context, source, complex_type)?;

        for child in xs_children(complex_type) {
            match child.tag_name().name() {
                "complexContent" => Self::complex_content(context, source, child, owner, fields)?,
                "simpleContent" => Self::simple_content(context, source, child, fields)?,
                _ => Self::collect_declaration(context, source, child, owner, fields)?,
            }
        }
        Ok(())
    }

    /// One child of a `<complexType>`, `<extension>` or `<restriction>` besides the content
    /// derivations.
    fn collect_declaration<'a, 'input: 'a>(
        context: &mut CompileContext<'a, 'input, '_>,
        source: usize,
        child: Node<'a, 'input>,
        owner: &str,
        fields: &mut FieldSet,
    ) -> Result<(), SchemaCompilationError> {
        match child.tag_name().name() {
            "sequence" | "choice" | "all" | "group" => {
                Particle::collect(context, source, child, owner, Occurrence::ONCE, fields)
            }
            _ if AttributeDeclaration::is_attribute_use(child) => {
                AttributeDeclaration::collect(context, source, child, fields)
            }
            "openContent" => context.unrepresentable("xs:openContent", source, child),
            "assert" => {
                debug!(location = %context.location(source, child), "assertion ignored");
                Ok(())
            }
            other => Err(context.xsd_error(
                source,
                child,
                XsdError::UnexpectedElement {
                    parent: child
                        .parent_element()
                        .map(|p| p.tag_name().name().to_string())
                        .unwrap_or_default(),
                    found: other.to_string(),
                },
            )),
        }
    }

    fn check_mixed(
        context: &CompileContext,
        source: usize,
        node: Node,
    ) -> Result<(), SchemaCompilationError> {
        let mixed = attribute_value::<bool>(node, "mixed")
            .map_err(|e| context.xsd_error(source, node, e))?;
        if mixed == Some(true) {
            context.unrepresentable("mixed content", source, node)?;
        }
        Ok(())
    }

    /// `<extension>` or `<restriction>` child of a content derivation, and its base type.
    fn derivation<'a, 'input: 'a>(
        context: &CompileContext<'a, 'input, '_>,
        source: usize,
        content: Node<'a, 'input>,
    ) -> Result<(Node<'a, 'input>, QName), SchemaCompilationError> {
        let derivation = xs_children(content)
            .find(|c| matches!(c.tag_name().name(), "extension" | "restriction"))
            .ok_or_else(|| {
                context.xsd_error(
                    source,
                    content,
                    XsdError::MissingChild {
                        parent: content.tag_name().name().to_string(),
                        expected: &["extension", "restriction"],
                    },
                )
            })?;
        let base = attribute_value::<QName>(derivation, "base")
            .map_err(|e| context.xsd_error(source, derivation, e))?
            .ok_or_else(|| {
                context.xsd_error(
                    source,
                    derivation,
                    XsdError::MissingAttribute {
                        element: derivation.tag_name().name().to_string(),
                        attribute: "base",
                    },
                )
            })?;
        Ok((derivation, base))
    }

    fn complex_content<'a, 'input: 'a>(
        context: &mut CompileContext<'a, 'input, '_>,
        source: usize,
        content: Node<'a, 'input>,
        owner: &str,
        fields: &mut FieldSet,
    ) -> Result<(), SchemaCompilationError> {
        Self::check_mixed(context, source, content)?;
        let (derivation, base) = Self::derivation(context, source, content)?;
        let is_extension = derivation.tag_name().name() == "extension";

        match context.resolve_type(&base, source, derivation)? {
            TypeRef::AnyType => {}
            // A restriction restates everything it keeps, so only an extension inherits.
            TypeRef::Complex(definition) if is_extension => {
                let base_shape =
                    Self::compile_named(context, definition.source, definition.node)?;
                fields.extend(base_shape.fields().iter().cloned())?;
            }
            TypeRef::Complex(_) => {}
            TypeRef::Builtin(_) | TypeRef::Simple(_) => {
                return Err(context.xsd_error(
                    source,
                    derivation,
                    XsdError::InvalidValue {
                        value: base.to_string(),
                        expected: "a complex base type",
                    },
                ))
            }
        }

        for child in xs_children(derivation) {
            Self::collect_declaration(context, source, child, owner, fields)?;
        }
        Ok(())
    }

    fn simple_content<'a, 'input: 'a>(
        context: &mut CompileContext<'a, 'input, '_>,
        source: usize,
        content: Node<'a, 'input>,
        fields: &mut FieldSet,
    ) -> Result<(), SchemaCompilationError> {
        let (derivation, base) = Self::derivation(context, source, content)?;
        let is_restriction = derivation.tag_name().name() == "restriction";

        match context.resolve_type(&base, source, derivation)? {
            TypeRef::Complex(definition) => {
                let base_shape =
                    Self::compile_named(context, definition.source, definition.node)?;
                fields.extend(base_shape.fields().iter().cloned())?;
            }
            TypeRef::Builtin(kind) => fields.push(Self::value_field(kind))?,
            TypeRef::Simple(definition) => {
                let kind = SimpleTypeDefinition::kind(context, definition.source, definition.node)?;
                fields.push(Self::value_field(kind))?;
            }
            TypeRef::AnyType => {
                context.unrepresentable("xs:anyType", source, derivation)?;
                fields.push(Self::value_field(LogicalKind::String))?;
            }
        }

        for child in xs_children(derivation) {
            if !AttributeDeclaration::is_attribute_use(child) {
                // Facets and an inline <simpleType> only narrow the value space.
                continue;
            }
            if is_restriction {
                // Attributes restated by a restriction replace the inherited ones.
                let mut restated = FieldSet::new(&ShapeName::parse(&fields.shape), true);
                AttributeDeclaration::collect(context, source, child, &mut restated)?;
                for field in restated.into_fields() {
                    fields.redeclare(field)?;
                }
            } else {
                AttributeDeclaration::collect(context, source, child, fields)?;
            }
        }
        Ok(())
    }

    fn value_field(kind: LogicalKind) -> FieldDescriptor {
        FieldDescriptor::new(SIMPLE_CONTENT_FIELD, kind)
            .with_node(NodeKind::Text, QName::local(SIMPLE_CONTENT_FIELD))
    }
}
