use roxmltree::Node;

use super::{
    complex_type_def::FieldSet,
    error::{SchemaCompilationError, XsdError},
    mapping_context::CompileContext,
    model::{FieldDescriptor, LogicalKind, NodeKind},
    schema::{required_attribute, xs_children, DefinitionKind},
    simple_type_def::SimpleTypeDefinition,
    values::attribute_value,
    xstypes::QName,
};

/// `<attribute>`, `<attributeGroup ref>` and `<anyAttribute>` inside a type definition.
pub(crate) struct AttributeDeclaration;

impl AttributeDeclaration {
    pub const TAG_NAME: &'static str = "attribute";

    pub fn is_attribute_use(node: Node) -> bool {
        matches!(
            node.tag_name().name(),
            Self::TAG_NAME | "attributeGroup" | "anyAttribute"
        )
    }

    pub fn collect<'a, 'input: 'a>(
        context: &mut CompileContext<'a, 'input, '_>,
        source: usize,
        node: Node<'a, 'input>,
        fields: &mut FieldSet,
    ) -> Result<(), SchemaCompilationError> {
        match node.tag_name().name() {
            Self::TAG_NAME => match Self::field(context, source, node)? {
                Some(field) => fields.push(field),
                None => Ok(()),
            },
            "attributeGroup" => {
                let reference = attribute_value::<QName>(node, "ref")
                    .map_err(|e| context.xsd_error(source, node, e))?
                    .ok_or_else(|| {
                        context.xsd_error(
                            source,
                            node,
                            XsdError::MissingAttribute {
                                element: "attributeGroup".to_string(),
                                attribute: "ref",
                            },
                        )
                    })?;
                let group =
                    context.resolve(DefinitionKind::AttributeGroup, &reference, source, node)?;
                let label = format!("attributeGroup {reference}");
                context.guarded(group.source, group.node, label, |context| {
                    for child in xs_children(group.node).filter(|c| Self::is_attribute_use(*c)) {
                        Self::collect(context, group.source, child, fields)?;
                    }
                    Ok(())
                })
            }
            "anyAttribute" => context.unrepresentable("xs:anyAttribute wildcard", source, node),
            other => Err(context.xsd_error(
                source,
                node,
                XsdError::UnexpectedElement {
                    parent: "complexType".to_string(),
                    found: other.to_string(),
                },
            )),
        }
    }

    /// `None` for a prohibited attribute use.
    fn field<'a, 'input: 'a>(
        context: &mut CompileContext<'a, 'input, '_>,
        source: usize,
        attribute: Node<'a, 'input>,
    ) -> Result<Option<FieldDescriptor>, SchemaCompilationError> {
        let optional = match attribute.attribute("use").unwrap_or("optional") {
            "prohibited" => return Ok(None),
            "required" => false,
            "optional" => true,
            other => {
                return Err(context.xsd_error(
                    source,
                    attribute,
                    XsdError::InvalidValue {
                        value: other.to_string(),
                        expected: "optional, required or prohibited",
                    },
                ))
            }
        };

        let reference = attribute_value::<QName>(attribute, "ref")
            .map_err(|e| context.xsd_error(source, attribute, e))?;
        let (node_name, declaration, declared_in) = match reference {
            Some(reference) => {
                let global =
                    context.resolve(DefinitionKind::Attribute, &reference, source, attribute)?;
                let name = context.document(global.source).top_level_name(global.node)?;
                (name, global.node, global.source)
            }
            None => {
                let name = required_attribute(context.document(source).uri, attribute, "name")?;
                let qualified = match attribute.attribute("form") {
                    Some(form) => form == "qualified",
                    None => context.document(source).attribute_form_qualified,
                };
                let namespace = context
                    .document(source)
                    .target_namespace
                    .clone()
                    .filter(|_| qualified);
                (QName::with_optional_namespace(namespace, name), attribute, source)
            }
        };

        let kind = Self::kind(context, declared_in, declaration)?;
        Ok(Some(
            FieldDescriptor::new(node_name.local_name.clone(), kind)
                .with_node(NodeKind::Attribute, node_name)
                .with_optional(optional),
        ))
    }

    fn kind<'a, 'input: 'a>(
        context: &mut CompileContext<'a, 'input, '_>,
        source: usize,
        declaration: Node<'a, 'input>,
    ) -> Result<LogicalKind, SchemaCompilationError> {
        if let Some(inline) = xs_children(declaration)
            .find(|c| c.tag_name().name() == SimpleTypeDefinition::TAG_NAME)
        {
            return SimpleTypeDefinition::kind(context, source, inline);
        }
        match attribute_value::<QName>(declaration, "type")
            .map_err(|e| context.xsd_error(source, declaration, e))?
        {
            Some(type_name) => context.simple_kind_of_type(&type_name, source, declaration),
            // xs:anySimpleType
            None => Ok(LogicalKind::String),
        }
    }
}
