use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// The operators understood by the evaluation service.
///
/// Parsing is exact: `"Add"` is accepted, `"add"` and `"Sum"` are not.
#[derive(
    Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString, EnumIter,
)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operator {
    pub fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Sub => '-',
            Self::Mul => '*',
            Self::Div => '/',
        }
    }
}

/// A complete arithmetic expression tree.
///
/// Serializes externally tagged, e.g. `{"binOp": {"left": {"number": {"number": 1.0}}, ...}}`,
/// which is the body accepted by `POST /exp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Expression {
    Number {
        number: f64,
    },
    Variable {
        name: String,
    },
    BinOp {
        left: Box<Expression>,
        right: Box<Expression>,
        op: Operator,
    },
}

impl Expression {
    pub fn number(number: f64) -> Expression {
        Expression::Number { number }
    }

    pub fn variable(name: impl Into<String>) -> Expression {
        Expression::Variable { name: name.into() }
    }

    pub fn binary(left: Expression, op: Operator, right: Expression) -> Expression {
        Expression::BinOp {
            left: Box::new(left),
            right: Box::new(right),
            op,
        }
    }

    /// Number of nodes on the longest root to leaf path
    pub fn depth(&self) -> usize {
        match self {
            Self::Number { .. } | Self::Variable { .. } => 1,
            Self::BinOp { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    /// The distinct free variable names referenced by this expression
    pub fn variables(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match self {
            Self::Number { .. } => {}
            Self::Variable { name } => {
                names.insert(name.as_str());
            }
            Self::BinOp { left, right, .. } => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number { number } => write!(f, "{}", number),
            Self::Variable { name } => write!(f, "{}", name),
            Self::BinOp { left, right, op } => write!(f, "({} {} {})", left, op.symbol(), right),
        }
    }
}

/// Response body returned by the evaluation service on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub msg: String,
}
