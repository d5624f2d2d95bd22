use std::str::FromStr;

use derive_more::Display;

use expression_client::{Expression, Operator};

use crate::builder::{Builder, NodeEntry};
use crate::leaf::VariantTag;
use crate::path::{Field, PathKey};

/// Why a builder could not yet be turned into an [`Expression`].
///
/// Always names the first offending node in left-first, depth-first order.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum MaterializeError {
    #[display(fmt = "Incomplete node at {}", path)]
    IncompleteNode { path: PathKey },

    #[display(fmt = "Invalid {} at {}", field, path)]
    InvalidLeaf { path: PathKey, field: Field },
}

impl MaterializeError {
    pub fn path(&self) -> &PathKey {
        match self {
            Self::IncompleteNode { path } | Self::InvalidLeaf { path, .. } => path,
        }
    }

    pub fn field(&self) -> Option<Field> {
        match self {
            Self::IncompleteNode { .. } => None,
            Self::InvalidLeaf { field, .. } => Some(*field),
        }
    }
}

impl std::error::Error for MaterializeError {}

impl Builder {
    /// Converts the tree reachable from the root into an [`Expression`]
    pub fn materialize(&self) -> Result<Expression, MaterializeError> {
        self.materialize_at(&PathKey::root())
    }

    fn materialize_at(&self, path: &PathKey) -> Result<Expression, MaterializeError> {
        let entry = match self.nodes.get(path) {
            Some(entry) if entry.variant != VariantTag::Unknown => entry,
            _ => return Err(MaterializeError::IncompleteNode { path: path.clone() }),
        };

        let invalid = |field| MaterializeError::InvalidLeaf {
            path: path.clone(),
            field,
        };

        match entry.variant {
            VariantTag::Number => parse_number(entry)
                .map(Expression::number)
                .ok_or_else(|| invalid(Field::Number)),
            VariantTag::Variable => match &entry.name {
                Some(name) if !name.trim().is_empty() => Ok(Expression::variable(name.clone())),
                _ => Err(invalid(Field::Name)),
            },
            VariantTag::Expression => {
                let left = self.materialize_at(&path.left())?;
                let right = self.materialize_at(&path.right())?;
                let op = parse_operator(entry).ok_or_else(|| invalid(Field::Op))?;
                Ok(Expression::binary(left, op, right))
            }
            VariantTag::Unknown => Err(MaterializeError::IncompleteNode { path: path.clone() }),
        }
    }
}

fn parse_number(entry: &NodeEntry) -> Option<f64> {
    entry
        .number
        .as_deref()
        .and_then(|text| text.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

fn parse_operator(entry: &NodeEntry) -> Option<Operator> {
    entry
        .op
        .as_deref()
        .and_then(|text| Operator::from_str(text).ok())
}
