use std::collections::HashMap;

use roxmltree::Node;
use tracing::debug;

use super::{
    annotation::{is_xs, Annotation},
    builtins::{XS_NAMESPACE, XS_SCHEMA_NAME},
    error::{SchemaCompilationError, XsdError},
    values::attribute_value,
    xstypes::QName,
};

/// One parsed `<schema>` document together with the defaults it declares.
pub(crate) struct SchemaDocument<'a, 'input> {
    pub uri: &'a str,
    pub schema: Node<'a, 'input>,
    pub target_namespace: Option<String>,
    pub element_form_qualified: bool,
    pub attribute_form_qualified: bool,
}

impl<'a, 'input: 'a> SchemaDocument<'a, 'input> {
    pub fn map_from_xml(uri: &'a str, schema: Node<'a, 'input>) -> Result<Self, SchemaCompilationError> {
        let found = QName::of_element(schema);
        if found != *XS_SCHEMA_NAME {
            return Err(SchemaCompilationError::NotASchema {
                uri: uri.to_string(),
                found,
            });
        }

        let xsd_error = |source| SchemaCompilationError::Xsd {
            location: location(uri, schema),
            source,
        };
        let target_namespace = attribute_value::<String>(schema, "targetNamespace").map_err(xsd_error)?;
        let element_form_qualified = attribute_value::<String>(schema, "elementFormDefault")
            .map_err(xsd_error)?
            .is_some_and(|form| form == "qualified");
        let attribute_form_qualified = attribute_value::<String>(schema, "attributeFormDefault")
            .map_err(xsd_error)?
            .is_some_and(|form| form == "qualified");

        Ok(Self {
            uri,
            schema,
            target_namespace,
            element_form_qualified,
            attribute_form_qualified,
        })
    }

    /// Expanded name of a top-level component: its `name` in the target namespace.
    pub fn top_level_name(&self, node: Node) -> Result<QName, SchemaCompilationError> {
        let name = required_attribute(self.uri, node, "name")?;
        Ok(QName::with_optional_namespace(
            self.target_namespace.clone(),
            name,
        ))
    }

    /// Top-level declarations and definitions, in document order.
    pub fn top_level(&self) -> impl Iterator<Item = (DefinitionKind, Node<'a, 'input>)> + 'a {
        let uri = self.uri;
        self.schema
            .children()
            .filter(|c| c.is_element())
            .filter_map(move |child| {
                let kind = DefinitionKind::from_tag(child.tag_name().name());
                if kind.is_none() && child.tag_name().namespace() == Some(XS_NAMESPACE) {
                    match child.tag_name().name() {
                        "include" | "import" | "redefine" | "override" => debug!(
                            uri,
                            directive = child.tag_name().name(),
                            location = child.attribute("schemaLocation"),
                            "schema directive is satisfied by the sources compiled together"
                        ),
                        Annotation::TAG_NAME => {}
                        other => debug!(uri, element = other, "ignoring top-level element"),
                    }
                }
                kind.filter(|_| child.tag_name().namespace() == Some(XS_NAMESPACE))
                    .map(|kind| (kind, child))
            })
    }
}

/// The symbol spaces of top-level components (pt. 1, §3.17.4)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum DefinitionKind {
    /// `<complexType>` and `<simpleType>` share a symbol space
    Type,
    Element,
    Attribute,
    Group,
    AttributeGroup,
}

impl DefinitionKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "complexType" | "simpleType" => Some(Self::Type),
            "element" => Some(Self::Element),
            "attribute" => Some(Self::Attribute),
            "group" => Some(Self::Group),
            "attributeGroup" => Some(Self::AttributeGroup),
            _ => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Element => "element",
            Self::Attribute => "attribute",
            Self::Group => "group",
            Self::AttributeGroup => "attribute group",
        }
    }
}

/// A top-level component and the index of the source that declares it.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Definition<'a, 'input> {
    pub source: usize,
    pub node: Node<'a, 'input>,
}

/// Top-level components of all sources compiled together, keyed by expanded name.
#[derive(Default)]
pub(crate) struct SymbolTable<'a, 'input> {
    entries: HashMap<(DefinitionKind, QName), Vec<Definition<'a, 'input>>>,
}

impl<'a, 'input: 'a> SymbolTable<'a, 'input> {
    pub fn build(documents: &[SchemaDocument<'a, 'input>]) -> Result<Self, SchemaCompilationError> {
        let mut table = Self::default();
        for (source, document) in documents.iter().enumerate() {
            for (kind, node) in document.top_level() {
                let name = document.top_level_name(node)?;
                let definitions = table.entries.entry((kind, name.clone())).or_default();
                if definitions.iter().any(|d| d.source == source) {
                    return Err(SchemaCompilationError::DuplicateDefinition {
                        kind: kind.display_name(),
                        name,
                        location: location(document.uri, node),
                    });
                }
                definitions.push(Definition { source, node });
            }
        }
        Ok(table)
    }

    /// Resolves `name`, preferring the definition from the referring source.
    pub fn resolve(
        &self,
        kind: DefinitionKind,
        name: &QName,
        from_source: usize,
    ) -> Option<Definition<'a, 'input>> {
        let definitions = self.entries.get(&(kind, name.clone()))?;
        definitions
            .iter()
            .find(|d| d.source == from_source)
            .or_else(|| definitions.first())
            .copied()
    }
}

/// `uri:line:column` of `node`
pub(crate) fn location(uri: &str, node: Node) -> String {
    let pos = node.document().text_pos_at(node.range().start);
    format!("{uri}:{}:{}", pos.row, pos.col)
}

pub(crate) fn required_attribute(
    uri: &str,
    node: Node,
    attribute: &'static str,
) -> Result<String, SchemaCompilationError> {
    node.attribute(attribute)
        .map(str::to_string)
        .ok_or_else(|| SchemaCompilationError::Xsd {
            location: location(uri, node),
            source: XsdError::MissingAttribute {
                element: node.tag_name().name().to_string(),
                attribute,
            },
        })
}

/// Element children in the XML Schema namespace, skipping `<annotation>`.
pub(crate) fn xs_children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(|c| c.is_element() && c.tag_name().namespace() == Some(XS_NAMESPACE))
        .filter(|c| !is_xs(*c, Annotation::TAG_NAME))
}
