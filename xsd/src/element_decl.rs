use std::sync::Arc;

use roxmltree::Node;
use tracing::debug;

use super::{
    complex_type_def::ComplexTypeDefinition,
    error::{SchemaCompilationError, XsdError},
    mapping_context::CompileContext,
    model::{FieldDescriptor, LogicalKind, NodeKind, RecordShape},
    naming,
    particle::Occurrence,
    schema::{required_attribute, xs_children, DefinitionKind},
    simple_type_def::SimpleTypeDefinition,
    values::attribute_value,
    xstypes::QName,
};

/// `<element>`, either a global declaration or a particle of a content model.
pub(crate) struct ElementDeclaration;

impl ElementDeclaration {
    pub const TAG_NAME: &'static str = "element";

    /// The field a local element particle contributes to the shape named `owner`.
    pub fn field<'a, 'input: 'a>(
        context: &mut CompileContext<'a, 'input, '_>,
        source: usize,
        element: Node<'a, 'input>,
        owner: &str,
        occurrence: Occurrence,
    ) -> Result<FieldDescriptor, SchemaCompilationError> {
        let reference = attribute_value::<QName>(element, "ref")
            .map_err(|e| context.xsd_error(source, element, e))?;

        let (node_name, kind, nillable) = if let Some(reference) = reference {
            let global = context.resolve(DefinitionKind::Element, &reference, source, element)?;
            let node_name = context.document(global.source).top_level_name(global.node)?;
            let kind = Self::global_kind(context, global.source, global.node)?;
            (node_name, kind, Self::is_nillable(context, global.source, global.node)?)
        } else {
            let name = required_attribute(context.document(source).uri, element, "name")?;
            let qualified = match element.attribute("form") {
                Some("qualified") => true,
                Some("unqualified") => false,
                Some(other) => {
                    return Err(context.xsd_error(
                        source,
                        element,
                        XsdError::InvalidValue {
                            value: other.to_string(),
                            expected: "qualified or unqualified",
                        },
                    ))
                }
                None => context.document(source).element_form_qualified,
            };
            let namespace = context
                .document(source)
                .target_namespace
                .clone()
                .filter(|_| qualified);
            let hint = format!("{owner}{}", naming::shape_name(&name));
            let kind = Self::kind(context, source, element, &hint)?;
            let node_name = QName::with_optional_namespace(namespace, name);
            (node_name, kind, Self::is_nillable(context, source, element)?)
        };

        Ok(FieldDescriptor::new(node_name.local_name.clone(), kind)
            .with_node(NodeKind::Element, node_name)
            .with_optional(occurrence.optional || nillable)
            .with_repeated(occurrence.repeated))
    }

    /// Record shape of documents rooted at the global element `element`; `None` when the element
    /// has simple content and so no record shape of its own.
    pub fn root_shape<'a, 'input: 'a>(
        context: &mut CompileContext<'a, 'input, '_>,
        source: usize,
        element: Node<'a, 'input>,
    ) -> Result<Option<(QName, Arc<RecordShape>)>, SchemaCompilationError> {
        let name = context.document(source).top_level_name(element)?;
        match Self::global_kind(context, source, element)? {
            LogicalKind::Struct(shape) => Ok(Some((name, shape))),
            kind => {
                debug!(element = %name, %kind, "global element has no record shape");
                Ok(None)
            }
        }
    }

    fn global_kind<'a, 'input: 'a>(
        context: &mut CompileContext<'a, 'input, '_>,
        source: usize,
        element: Node<'a, 'input>,
    ) -> Result<LogicalKind, SchemaCompilationError> {
        let name = required_attribute(context.document(source).uri, element, "name")?;
        context.guarded(source, element, format!("element {name}"), |context| {
            Self::kind(context, source, element, &naming::shape_name(&name))
        })
    }

    /// Resolves the declared type in order of precedence: an anonymous type definition, the
    /// `type` attribute, the head of the substitution group. Untyped elements are `xs:anyType`.
    fn kind<'a, 'input: 'a>(
        context: &mut CompileContext<'a, 'input, '_>,
        source: usize,
        element: Node<'a, 'input>,
        hint: &str,
    ) -> Result<LogicalKind, SchemaCompilationError> {
        for child in xs_children(element) {
            match child.tag_name().name() {
                ComplexTypeDefinition::TAG_NAME => {
                    return ComplexTypeDefinition::compile(context, source, child, hint)
                        .map(LogicalKind::Struct)
                }
                SimpleTypeDefinition::TAG_NAME => {
                    return SimpleTypeDefinition::kind(context, source, child)
                }
                _ => {}
            }
        }

        let type_name = attribute_value::<QName>(element, "type")
            .map_err(|e| context.xsd_error(source, element, e))?;
        if let Some(type_name) = type_name {
            return context.kind_of_type(&type_name, source, element);
        }

        let head = attribute_value::<QName>(element, "substitutionGroup")
            .map_err(|e| context.xsd_error(source, element, e))?;
        if let Some(head) = head {
            let head = context.resolve(DefinitionKind::Element, &head, source, element)?;
            return Self::global_kind(context, head.source, head.node);
        }

        context.unrepresentable("untyped element", source, element)?;
        Ok(LogicalKind::String)
    }

    fn is_nillable(
        context: &CompileContext,
        source: usize,
        element: Node,
    ) -> Result<bool, SchemaCompilationError> {
        Ok(attribute_value::<bool>(element, "nillable")
            .map_err(|e| context.xsd_error(source, element, e))?
            .unwrap_or(false))
    }
}
