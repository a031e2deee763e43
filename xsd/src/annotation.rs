use roxmltree::Node;

use super::builtins::XS_NAMESPACE;

/// The `<annotation>` element; only its `<documentation>` text is kept.
pub(crate) struct Annotation;

impl Annotation {
    pub const TAG_NAME: &'static str = "annotation";

    /// Joins the text of every `<documentation>` in the `<annotation>` children of `element`,
    /// `None` if there is no non-blank documentation.
    pub fn documentation(element: Node) -> Option<String> {
        let text = element
            .children()
            .filter(|c| is_xs(*c, Self::TAG_NAME))
            .flat_map(|annotation| annotation.children())
            .filter(|c| is_xs(*c, "documentation"))
            .flat_map(|doc| doc.descendants())
            .filter(|n| n.is_text())
            .filter_map(|n| n.text())
            .collect::<Vec<_>>()
            .join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        (!text.is_empty()).then_some(text)
    }
}

/// Whether `node` is the XML Schema element `<name>`.
pub(crate) fn is_xs(node: Node, name: &str) -> bool {
    node.is_element()
        && node.tag_name().namespace() == Some(XS_NAMESPACE)
        && node.tag_name().name() == name
}
