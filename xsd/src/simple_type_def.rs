use roxmltree::Node;

use super::{
    error::{SchemaCompilationError, XsdError},
    mapping_context::CompileContext,
    model::LogicalKind,
    schema::xs_children,
    values::attribute_value,
    xstypes::QName,
};

/// `<simpleType>`; only its logical kind is of interest.
pub(crate) struct SimpleTypeDefinition;

impl SimpleTypeDefinition {
    pub const TAG_NAME: &'static str = "simpleType";

    /// Follows the restriction chain down to a built-in type. Lists and unions keep their lexical
    /// form and map to `string`.
    pub fn kind<'a, 'input: 'a>(
        context: &mut CompileContext<'a, 'input, '_>,
        source: usize,
        simple_type: Node<'a, 'input>,
    ) -> Result<LogicalKind, SchemaCompilationError> {
        let label = match simple_type.attribute("name") {
            Some(name) => format!("simpleType {name}"),
            None => "anonymous simpleType".to_string(),
        };

        context.guarded(source, simple_type, label, |context| {
            match xs_children(simple_type).next() {
                Some(restriction) if restriction.tag_name().name() == "restriction" => {
                    Self::restriction_kind(context, source, restriction)
                }
                Some(variety) if ["list", "union"].contains(&variety.tag_name().name()) => {
                    Ok(LogicalKind::String)
                }
                Some(other) => Err(context.xsd_error(
                    source,
                    other,
                    XsdError::UnexpectedElement {
                        parent: Self::TAG_NAME.to_string(),
                        found: other.tag_name().name().to_string(),
                    },
                )),
                None => Err(context.xsd_error(
                    source,
                    simple_type,
                    XsdError::MissingChild {
                        parent: Self::TAG_NAME.to_string(),
                        expected: &["restriction", "list", "union"],
                    },
                )),
            }
        })
    }

    fn restriction_kind<'a, 'input: 'a>(
        context: &mut CompileContext<'a, 'input, '_>,
        source: usize,
        restriction: Node<'a, 'input>,
    ) -> Result<LogicalKind, SchemaCompilationError> {
        // {base type definition}
        //   The type definition ·resolved· to by the ·actual value· of the base [attribute] or
        //   the <simpleType> [children], whichever is present.
        let base = attribute_value::<QName>(restriction, "base")
            .map_err(|e| context.xsd_error(source, restriction, e))?;
        if let Some(base) = base {
            return context.simple_kind_of_type(&base, source, restriction);
        }

        match xs_children(restriction).find(|c| c.tag_name().name() == Self::TAG_NAME) {
            Some(inline) => Self::kind(context, source, inline),
            None => Err(context.xsd_error(
                source,
                restriction,
                XsdError::MissingAttribute {
                    element: "restriction".to_string(),
                    attribute: "base",
                },
            )),
        }
    }
}
