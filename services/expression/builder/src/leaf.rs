use std::str::FromStr;

use strum_macros::{AsRefStr, Display, EnumString};

use expression_client::Operator;

use crate::path::Field;

/// The kind a node has been declared as
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, AsRefStr, Display, EnumString)]
pub enum VariantTag {
    Number,
    Variable,
    Expression,
    Unknown,
}

impl Default for VariantTag {
    fn default() -> Self {
        VariantTag::Unknown
    }
}

/// A single user-entered value.
///
/// The field a value is stored under follows from its variant, so a value
/// can never land in the wrong slot. Number and operator text is kept as
/// entered and only checked on materialization.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafValue {
    Number(String),
    Text(String),
    Operator(String),
    Variant(VariantTag),
}

impl LeafValue {
    pub fn number(value: f64) -> LeafValue {
        LeafValue::Number(value.to_string())
    }

    pub fn field(&self) -> Field {
        match self {
            Self::Number(_) => Field::Number,
            Self::Text(_) => Field::Name,
            Self::Operator(_) => Field::Op,
            Self::Variant(_) => Field::Variant,
        }
    }

    /// Interprets form text entered for `field`
    pub fn from_field(field: Field, text: &str) -> Result<LeafValue, strum::ParseError> {
        Ok(match field {
            Field::Variant => Self::Variant(VariantTag::from_str(text.trim())?),
            Field::Number => Self::Number(text.to_string()),
            Field::Name => Self::Text(text.to_string()),
            Field::Op => Self::Operator(text.to_string()),
        })
    }
}

impl From<Operator> for LeafValue {
    fn from(op: Operator) -> Self {
        LeafValue::Operator(op.as_ref().to_string())
    }
}

impl From<VariantTag> for LeafValue {
    fn from(tag: VariantTag) -> Self {
        LeafValue::Variant(tag)
    }
}
