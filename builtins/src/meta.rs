use std::borrow::Cow;

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("{literal:?} is not a valid {type_name} literal")]
    InvalidLiteral {
        type_name: &'static str,
        literal: String,
    },
    #[error("{literal:?} is out of range for {type_name}")]
    OutOfRange {
        type_name: &'static str,
        literal: String,
    },
}

impl Error {
    pub(crate) fn invalid(type_name: &'static str, literal: &str) -> Self {
        Self::InvalidLiteral {
            type_name,
            literal: literal.to_string(),
        }
    }

    pub(crate) fn out_of_range(type_name: &'static str, literal: &str) -> Self {
        Self::OutOfRange {
            type_name,
            literal: literal.to_string(),
        }
    }
}

/// The `whiteSpace` facet values (Pt. 2, §4.3.6)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Whitespace {
    Preserve,
    Replace,
    Collapse,
}

fn is_xml_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

pub fn normalized_value(value: &str, whitespace: Whitespace) -> Cow<str> {
    match whitespace {
        Whitespace::Preserve => Cow::Borrowed(value),
        Whitespace::Replace => {
            if value.contains(['\t', '\n', '\r']) {
                Cow::Owned(value.replace(['\t', '\n', '\r'], " "))
            } else {
                Cow::Borrowed(value)
            }
        }
        Whitespace::Collapse => {
            let collapsed = value
                .split(is_xml_whitespace)
                .filter(|word| !word.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if collapsed == value {
                Cow::Borrowed(value)
            } else {
                Cow::Owned(collapsed)
            }
        }
    }
}
