//! Maps instance documents onto compiled record shapes.

use std::sync::Arc;

use roxmltree::{Document, Node};

use super::{
    builtins::XSI_NAMESPACE,
    error::MappingError,
    model::{CompiledSchema, FieldDescriptor, LogicalKind, NodeKind, RecordShape},
    typed::{TypedRecord, Value},
    xstypes::QName,
};

/// Maps `document` onto the shape registered for its root element.
///
/// Fields are visited in shape order; an absent optional field is left out of the record, an
/// absent required one fails the mapping. `schema` is only read, so one compiled schema can
/// serve any number of concurrent calls.
pub fn map(document: &Document, schema: &CompiledSchema) -> Result<TypedRecord, MappingError> {
    let root = document.root_element();
    let name = QName::of_element(root);
    let shape = schema
        .root(&name)
        .ok_or_else(|| MappingError::UnknownRoot(name.clone()))?;
    map_element(root, shape, &format!("/{}", root.tag_name().name()))
}

fn map_element(
    element: Node,
    shape: &Arc<RecordShape>,
    path: &str,
) -> Result<TypedRecord, MappingError> {
    let mut record = TypedRecord::new(shape.clone());
    for (index, field) in shape.fields().iter().enumerate() {
        let value = match field.node_kind {
            NodeKind::Attribute => attribute_value(element, field, path)?,
            NodeKind::Text => Some(scalar(&field.kind, &text_of(element), path)?),
            NodeKind::Element => element_value(element, field, path)?,
        };
        match value {
            Some(value) => record.set(index, value),
            None if field.optional => {}
            None => {
                return Err(MappingError::MissingField {
                    shape: shape.name().to_string(),
                    field: field.name.clone(),
                    path: path.to_string(),
                })
            }
        }
    }
    Ok(record)
}

fn attribute_value(
    element: Node,
    field: &FieldDescriptor,
    path: &str,
) -> Result<Option<Value>, MappingError> {
    let local = field.node_name.local_name.as_str();
    let text = match field.node_name.namespace() {
        Some(namespace) => element.attribute((namespace, local)),
        None => element.attribute(local),
    };
    text.map(|text| scalar(&field.kind, text, &format!("{path}/@{local}")))
        .transpose()
}

fn element_value(
    element: Node,
    field: &FieldDescriptor,
    path: &str,
) -> Result<Option<Value>, MappingError> {
    let name = &field.node_name;
    let occurrences = element
        .children()
        .filter(|c| c.is_element())
        .filter(|c| name.matches(c.tag_name().namespace(), c.tag_name().name()))
        .filter(|c| !is_nil(*c))
        .collect::<Vec<_>>();

    let child_path = format!("{path}/{}", name.local_name);
    if field.repeated {
        if occurrences.is_empty() {
            return Ok(None);
        }
        let values = occurrences
            .iter()
            .enumerate()
            .map(|(i, child)| convert(*child, &field.kind, &format!("{child_path}[{}]", i + 1)))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Some(Value::Array(values)));
    }

    match occurrences.as_slice() {
        [] => Ok(None),
        [child] => convert(*child, &field.kind, &child_path).map(Some),
        _ => Err(MappingError::UnexpectedRepetition {
            field: field.name.clone(),
            path: child_path,
            count: occurrences.len(),
        }),
    }
}

fn convert(element: Node, kind: &LogicalKind, path: &str) -> Result<Value, MappingError> {
    match kind {
        LogicalKind::Struct(shape) => map_element(element, shape, path).map(Value::Struct),
        scalar_kind => scalar(scalar_kind, &text_of(element), path),
    }
}

fn scalar(kind: &LogicalKind, text: &str, path: &str) -> Result<Value, MappingError> {
    let invalid = |source| MappingError::InvalidValue {
        path: path.to_string(),
        source,
    };
    Ok(match kind {
        LogicalKind::Date => Value::Date(xt_builtins::Date::from_literal(text).map_err(invalid)?.0),
        LogicalKind::Time => Value::Time(xt_builtins::Time::from_literal(text).map_err(invalid)?.0),
        LogicalKind::Timestamp => {
            Value::Timestamp(xt_builtins::DateTime::from_literal(text).map_err(invalid)?.0)
        }
        LogicalKind::Int64 => {
            Value::Int64(xt_builtins::PositiveInteger::from_literal(text).map_err(invalid)?.0)
        }
        // Only reached for simple content declared with a complex type, which compiles to string.
        LogicalKind::String | LogicalKind::Struct(_) => {
            Value::String(xt_builtins::String::from_literal(text).map_err(invalid)?)
        }
    })
}

/// Character data directly inside `element`.
fn text_of(element: Node) -> String {
    element
        .children()
        .filter(|c| c.is_text())
        .filter_map(|c| c.text())
        .collect()
}

/// `xsi:nil="true"`; such elements count as absent.
fn is_nil(element: Node) -> bool {
    element
        .attribute((XSI_NAMESPACE, "nil"))
        .is_some_and(|nil| matches!(nil.trim(), "true" | "1"))
}
