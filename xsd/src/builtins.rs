use std::collections::HashSet;

use lazy_static::lazy_static;

use super::model::LogicalKind;
use super::xstypes::QName;

// XML Schema namespaces (XSD 1.1 part 1, §1.3.1)
pub const XS_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

lazy_static! {
    /// The `xs:anyType` qualified name
    pub static ref XS_ANY_TYPE_NAME: QName = QName::with_namespace(XS_NAMESPACE, "anyType");
    pub static ref XS_DATE_NAME: QName = QName::with_namespace(XS_NAMESPACE, "date");
    pub static ref XS_TIME_NAME: QName = QName::with_namespace(XS_NAMESPACE, "time");
    pub static ref XS_DATE_TIME_NAME: QName = QName::with_namespace(XS_NAMESPACE, "dateTime");
    pub static ref XS_POSITIVE_INTEGER_NAME: QName = QName::with_namespace(XS_NAMESPACE, "positiveInteger");
    pub static ref XS_SCHEMA_NAME: QName = QName::with_namespace(XS_NAMESPACE, "schema");

    /// Local names of the built-in simple type definitions (pt. 2, §3 and §4)
    static ref BUILTIN_SIMPLE_TYPES: HashSet<&'static str> = [
        "anySimpleType", "anyAtomicType",
        // primitive
        "string", "boolean", "decimal", "float", "double", "duration", "dateTime", "time",
        "date", "gYearMonth", "gYear", "gMonthDay", "gDay", "gMonth", "hexBinary",
        "base64Binary", "anyURI", "QName", "NOTATION",
        // ordinary
        "normalizedString", "token", "language", "NMTOKEN", "NMTOKENS", "Name", "NCName",
        "ID", "IDREF", "IDREFS", "ENTITY", "ENTITIES", "integer", "nonPositiveInteger",
        "negativeInteger", "long", "int", "short", "byte", "nonNegativeInteger",
        "unsignedLong", "unsignedInt", "unsignedShort", "unsignedByte", "positiveInteger",
        "yearMonthDuration", "dayTimeDuration", "dateTimeStamp",
    ]
    .into_iter()
    .collect();
}

/// What a name in the XML Schema namespace denotes.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Builtin {
    /// `xs:anyType`, the only built-in complex type
    AnyType,
    Simple(LogicalKind),
}

/// Looks up a built-in type definition. `None` if `name` is outside the XML Schema namespace or
/// names no built-in type.
pub(crate) fn lookup(name: &QName) -> Option<Builtin> {
    if name.namespace() != Some(XS_NAMESPACE) {
        return None;
    }
    if name == &*XS_ANY_TYPE_NAME {
        return Some(Builtin::AnyType);
    }
    if !BUILTIN_SIMPLE_TYPES.contains(name.local_name.as_str()) {
        return None;
    }

    // Only these four are given a dedicated kind; every other built-in is carried as text.
    let kind = [
        (&*XS_DATE_NAME, LogicalKind::Date),
        (&*XS_TIME_NAME, LogicalKind::Time),
        (&*XS_DATE_TIME_NAME, LogicalKind::Timestamp),
        (&*XS_POSITIVE_INTEGER_NAME, LogicalKind::Int64),
    ]
    .into_iter()
    .find_map(|(builtin, kind)| (builtin == name).then_some(kind))
    .unwrap_or(LogicalKind::String);
    Some(Builtin::Simple(kind))
}
