use super::error::XsdError;
use std::fmt;

pub type NCName = String;
pub type AnyURI = String;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub namespace_name: Option<AnyURI>,
    pub local_name: NCName,
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(namespace_name) = self.namespace_name.as_ref() {
            write!(f, "{{{}}}{}", namespace_name, self.local_name)
        } else {
            write!(f, "{}", self.local_name)
        }
    }
}

impl QName {
    pub fn with_namespace(
        namespace_name: impl Into<String>,
        local_name: impl Into<String>,
    ) -> Self {
        Self::with_optional_namespace(Some(namespace_name), local_name)
    }

    pub fn with_optional_namespace(
        namespace_name: Option<impl Into<String>>,
        local_name: impl Into<String>,
    ) -> Self {
        Self {
            namespace_name: namespace_name.map(Into::into),
            local_name: local_name.into(),
        }
    }

    pub fn local(local_name: impl Into<String>) -> Self {
        Self::with_optional_namespace(None::<String>, local_name)
    }

    /// The expanded name of an element in an instance document.
    pub fn of_element(node: roxmltree::Node) -> Self {
        let tag = node.tag_name();
        Self::with_optional_namespace(tag.namespace(), tag.name())
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace_name.as_deref()
    }

    pub fn matches(&self, namespace: Option<&str>, local_name: &str) -> bool {
        self.namespace() == namespace && self.local_name == local_name
    }

    pub fn qualified(
        prefix: impl AsRef<str>,
        local_name: impl Into<String>,
        context: roxmltree::Node,
    ) -> Result<Self, XsdError> {
        let prefix = prefix.as_ref();
        let resolved_prefix = if prefix == "xml" {
            // The prefix xml is by definition bound to the namespace name
            // http://www.w3.org/XML/1998/namespace.
            // (Namespaces in XML 1.0, §3, Reserved Prefixes and Namespace Names)
            "http://www.w3.org/XML/1998/namespace"
        } else {
            context
                .lookup_namespace_uri(Some(prefix))
                .ok_or_else(|| XsdError::NamePrefixNotResolved(prefix.into()))?
        };
        Ok(Self::with_namespace(resolved_prefix, local_name))
    }

    pub fn unqualified(local_name: impl Into<String>, context: roxmltree::Node) -> Self {
        // If there is a default namespace declaration in scope, the expanded name corresponding to
        // an unprefixed element name has the URI of the default namespace as its namespace name.
        // If there is no default namespace declaration in scope, the namespace name has no value.
        // (Namespaces in XML 1.0, §6.2)
        let namespace_name = context.lookup_namespace_uri(None);
        QName::with_optional_namespace(namespace_name, local_name)
    }

    pub fn parse(source: &str, context: roxmltree::Node) -> Result<Self, XsdError> {
        if let Some((prefix, local)) = source.rsplit_once(':') {
            Self::qualified(prefix, local, context)
        } else {
            Ok(Self::unqualified(source, context))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_resolves_prefix_and_default_namespace() {
        let xml = r#"<a xmlns="urn:default" xmlns:p="urn:p"><b/></a>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let b = doc.root_element().first_element_child().unwrap();

        assert_eq!(
            QName::parse("p:thing", b).unwrap(),
            QName::with_namespace("urn:p", "thing")
        );
        assert_eq!(
            QName::parse("thing", b).unwrap(),
            QName::with_namespace("urn:default", "thing")
        );
        assert!(matches!(
            QName::parse("q:thing", b),
            Err(XsdError::NamePrefixNotResolved(p)) if p == "q"
        ));
    }

    #[test]
    fn display_uses_clark_notation() {
        assert_eq!(QName::with_namespace("urn:x", "a").to_string(), "{urn:x}a");
        assert_eq!(QName::local("a").to_string(), "a");
    }
}
