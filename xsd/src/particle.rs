use roxmltree::Node;

use super::{
    complex_type_def::FieldSet,
    element_decl::ElementDeclaration,
    error::{SchemaCompilationError, XsdError},
    mapping_context::CompileContext,
    schema::{xs_children, DefinitionKind},
    values::{actual_value, attribute_value},
    xstypes::QName,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MaxOccurs {
    Unbounded,
    Count(u64),
}

/// The effective occurrence of a field after folding in the enclosing groups.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Occurrence {
    pub optional: bool,
    pub repeated: bool,
}

impl Occurrence {
    pub const ONCE: Self = Self {
        optional: false,
        repeated: false,
    };

    /// Reads `minOccurs`/`maxOccurs` of a particle; `None` if the particle can never occur.
    ///
    /// Only an explicit `minOccurs` of at least one makes a field required, so element particles
    /// without the attribute are optional. Model groups keep the XSD default of one.
    pub fn of(particle: Node) -> Result<Option<Self>, XsdError> {
        let is_element = particle.tag_name().name() == ElementDeclaration::TAG_NAME;
        let min_occurs = attribute_value::<u64>(particle, "minOccurs")?;
        let optional = match min_occurs {
            Some(min) => min == 0,
            None => is_element,
        };
        let min_occurs = min_occurs.unwrap_or(u64::from(!is_element));
        let max_occurs = match particle.attribute("maxOccurs").map(str::trim) {
            None => MaxOccurs::Count(1),
            Some("unbounded") => MaxOccurs::Unbounded,
            Some(count) => MaxOccurs::Count(actual_value(count, particle)?),
        };

        Ok(match max_occurs {
            MaxOccurs::Count(0) => None,
            MaxOccurs::Count(max) if max < min_occurs => {
                return Err(XsdError::InvalidValue {
                    value: max.to_string(),
                    expected: "maxOccurs >= minOccurs",
                })
            }
            max_occurs => Some(Self {
                optional,
                repeated: max_occurs != MaxOccurs::Count(1),
            }),
        })
    }

    /// Nests `self` inside a group occurring as `outer`.
    pub fn within(self, outer: Self) -> Self {
        Self {
            optional: self.optional || outer.optional,
            repeated: self.repeated || outer.repeated,
        }
    }
}

/// Particles of a content model: element declarations, model groups and wildcards.
pub(crate) struct Particle;

impl Particle {
    /// Flattens the particle `node` into fields of the shape under construction. `owner` is the
    /// local name of that shape, used to name anonymous nested types.
    pub fn collect<'a, 'input: 'a>(
        context: &mut CompileContext<'a, 'input, '_>,
        source: usize,
        node: Node<'a, 'input>,
        owner: &str,
        outer: Occurrence,
        fields: &mut FieldSet,
    ) -> Result<(), SchemaCompilationError> {
        let Some(occurrence) =
            Occurrence::of(node).map_err(|e| context.xsd_error(source, node, e))?
        else {
            return Ok(());
        };
        let occurrence = occurrence.within(outer);

        match node.tag_name().name() {
            ElementDeclaration::TAG_NAME => {
                let field = ElementDeclaration::field(context, source, node, owner, occurrence)?;
                fields.push(field)
            }
            "sequence" | "all" => {
                for child in xs_children(node) {
                    Self::collect(context, source, child, owner, occurrence, fields)?;
                }
                Ok(())
            }
            "choice" => {
                // At most one branch is present in any instance.
                let branch = Occurrence {
                    optional: true,
                    ..occurrence
                };
                for child in xs_children(node) {
                    Self::collect(context, source, child, owner, branch, fields)?;
                }
                Ok(())
            }
            "group" => Self::collect_group_reference(context, source, node, owner, occurrence, fields),
            "any" => context.unrepresentable("xs:any wildcard", source, node),
            other => Err(context.xsd_error(
                source,
                node,
                XsdError::UnexpectedElement {
                    parent: node
                        .parent_element()
                        .map(|p| p.tag_name().name().to_string())
                        .unwrap_or_default(),
                    found: other.to_string(),
                },
            )),
        }
    }

    fn collect_group_reference<'a, 'input: 'a>(
        context: &mut CompileContext<'a, 'input, '_>,
        source: usize,
        node: Node<'a, 'input>,
        owner: &str,
        occurrence: Occurrence,
        fields: &mut FieldSet,
    ) -> Result<(), SchemaCompilationError> {
        let reference = attribute_value::<QName>(node, "ref")
            .map_err(|e| context.xsd_error(source, node, e))?
            .ok_or_else(|| {
                context.xsd_error(
                    source,
                    node,
                    XsdError::MissingAttribute {
                        element: "group".to_string(),
                        attribute: "ref",
                    },
                )
            })?;
        let group = context.resolve(DefinitionKind::Group, &reference, source, node)?;

        context.guarded(group.source, group.node, format!("group {reference}"), |context| {
            // A model group definition holds exactly one compositor; its own occurrence is taken
            // from the referencing particle.
            let Some(compositor) = xs_children(group.node).next() else {
                return Ok(());
            };
            let compositor_occurrence = Occurrence::of(compositor)
                .map_err(|e| context.xsd_error(group.source, compositor, e))?
                .unwrap_or(Occurrence::ONCE);
            let nested = compositor_occurrence.within(occurrence);
            match compositor.tag_name().name() {
                "choice" => {
                    let branch = Occurrence {
                        optional: true,
                        ..nested
                    };
                    for child in xs_children(compositor) {
                        Self::collect(context, group.source, child, owner, branch, fields)?;
                    }
                }
                _ => {
                    for child in xs_children(compositor) {
                        Self::collect(context, group.source, child, owner, nested, fields)?;
                    }
                }
            }
            Ok(())
        })
    }
}
