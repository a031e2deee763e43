use crate::error::XsdError;
use crate::xstypes::QName;
use roxmltree::Node;

pub trait ActualValue<'a>: Sized {
    fn convert(src: &'a str, parent: Node) -> Result<Self, XsdError>;
}

impl<'a> ActualValue<'a> for &'a str {
    fn convert(src: &'a str, _parent: Node) -> Result<Self, XsdError> {
        Ok(src)
    }
}

impl ActualValue<'_> for String {
    fn convert(src: &'_ str, _parent: Node) -> Result<Self, XsdError> {
        Ok(src.to_string())
    }
}

impl ActualValue<'_> for QName {
    fn convert(src: &'_ str, parent: Node) -> Result<Self, XsdError> {
        QName::parse(src.trim(), parent)
    }
}

impl ActualValue<'_> for bool {
    fn convert(src: &str, _parent: Node) -> Result<Self, XsdError> {
        match src.trim() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(XsdError::InvalidValue {
                value: src.to_string(),
                expected: "boolean",
            }),
        }
    }
}

impl ActualValue<'_> for u64 {
    fn convert(src: &str, _parent: Node) -> Result<Self, XsdError> {
        src.trim().parse().map_err(|_| XsdError::InvalidValue {
            value: src.to_string(),
            expected: "nonNegativeInteger",
        })
    }
}

/// Reads attribute `name` of `node` as `T`, `None` if the attribute is absent.
pub fn attribute_value<'a, T: ActualValue<'a>>(
    node: Node<'a, '_>,
    name: &str,
) -> Result<Option<T>, XsdError> {
    node.attribute(name)
        .map(|v| actual_value(v, node))
        .transpose()
}

pub fn actual_value<'a, T: ActualValue<'a>>(x: &'a str, parent: Node) -> Result<T, XsdError> {
    T::convert(x, parent)
}
