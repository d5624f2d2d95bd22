use std::collections::BTreeMap;
use std::ops::Bound;

use log::debug;
use serde::{Deserialize, Serialize};

use expression_client::Expression;

use crate::leaf::{LeafValue, VariantTag};
use crate::path::{PathKey, Side};

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct NodeEntry {
    pub(crate) variant: VariantTag,
    pub(crate) number: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) op: Option<String>,
}

impl NodeEntry {
    fn declared(variant: VariantTag) -> NodeEntry {
        NodeEntry {
            variant,
            ..Default::default()
        }
    }
}

/// What a front end needs to draw a single node.
///
/// For `Expression` nodes the child paths are returned so the caller can
/// descend with further [`Builder::get_node_view`] calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum NodeView {
    Unknown,
    Number {
        value: Option<String>,
    },
    Variable {
        name: Option<String>,
    },
    Expression {
        op: Option<String>,
        left: PathKey,
        right: PathKey,
    },
}

impl NodeView {
    pub fn variant(&self) -> VariantTag {
        match self {
            Self::Unknown => VariantTag::Unknown,
            Self::Number { .. } => VariantTag::Number,
            Self::Variable { .. } => VariantTag::Variable,
            Self::Expression { .. } => VariantTag::Expression,
        }
    }
}

/// The whole reachable tree, as returned by [`Builder::render`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum RenderNode {
    Unknown {
        path: PathKey,
    },
    Number {
        path: PathKey,
        value: Option<String>,
    },
    Variable {
        path: PathKey,
        name: Option<String>,
    },
    Expression {
        path: PathKey,
        op: Option<String>,
        left: Box<RenderNode>,
        right: Box<RenderNode>,
    },
}

impl RenderNode {
    pub fn path(&self) -> &PathKey {
        match self {
            Self::Unknown { path }
            | Self::Number { path, .. }
            | Self::Variable { path, .. }
            | Self::Expression { path, .. } => path,
        }
    }
}

/// An in-progress expression tree keyed by node position.
///
/// Only touched positions have entries; anything else reads as
/// [`VariantTag::Unknown`]. Entries beneath a node that is not declared as an
/// `Expression` may exist but are unreachable from the root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Builder {
    pub(crate) nodes: BTreeMap<PathKey, NodeEntry>,
}

impl Builder {
    pub fn new() -> Builder {
        Default::default()
    }

    /// Creates a builder whose state materializes back into `expr`
    pub fn from_expression(expr: &Expression) -> Builder {
        let mut builder = Builder::new();
        builder.seed(&PathKey::root(), expr);
        builder
    }

    fn seed(&mut self, path: &PathKey, expr: &Expression) {
        match expr {
            Expression::Number { number } => {
                self.declare_variant(path, VariantTag::Number);
                self.set_leaf(path, LeafValue::number(*number));
            }
            Expression::Variable { name } => {
                self.declare_variant(path, VariantTag::Variable);
                self.set_leaf(path, LeafValue::Text(name.clone()));
            }
            Expression::BinOp { left, right, op } => {
                self.declare_variant(path, VariantTag::Expression);
                self.set_leaf(path, LeafValue::from(*op));
                self.seed(&path.left(), left);
                self.seed(&path.right(), right);
            }
        }
    }

    /// Number of stored node entries, reachable or not
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear()
    }

    /// Stores `value` for the node at `path`.
    ///
    /// Leaf values are written without validation. A [`LeafValue::Variant`]
    /// is a redeclaration and behaves as [`Builder::declare_variant`].
    pub fn set_leaf(&mut self, path: &PathKey, value: LeafValue) {
        if let Some(parent) = path.parent() {
            if self.get_variant(&parent) != VariantTag::Expression {
                debug!("Writing {} beneath undeclared {}", value.field(), parent);
            }
        }

        match value {
            LeafValue::Variant(tag) => self.declare_variant(path, tag),
            LeafValue::Number(text) => self.entry(path).number = Some(text),
            LeafValue::Text(name) => self.entry(path).name = Some(name),
            LeafValue::Operator(op) => self.entry(path).op = Some(op),
        }
    }

    fn entry(&mut self, path: &PathKey) -> &mut NodeEntry {
        self.nodes.entry(path.clone()).or_default()
    }

    /// Declares the node at `path` to be of kind `tag`.
    ///
    /// Everything previously stored beneath the node, and the node's own leaf
    /// values, is removed. Declaring `Unknown` removes the node entirely.
    pub fn declare_variant(&mut self, path: &PathKey, tag: VariantTag) {
        let purged = self.purge_descendants(path);
        debug!("Declared {} as {} ({} entries purged)", path, tag, purged);

        match tag {
            VariantTag::Unknown => {
                self.nodes.remove(path);
            }
            tag => {
                self.nodes.insert(path.clone(), NodeEntry::declared(tag));
            }
        }
    }

    fn purge_descendants(&mut self, path: &PathKey) -> usize {
        // Pre-order keys place every descendant directly after `path`
        let doomed: Vec<PathKey> = self
            .nodes
            .range((Bound::Excluded(path.clone()), Bound::Unbounded))
            .take_while(|(key, _)| path.is_ancestor_of(key))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            self.nodes.remove(key);
        }
        doomed.len()
    }

    pub fn get_variant(&self, path: &PathKey) -> VariantTag {
        self.nodes
            .get(path)
            .map(|entry| entry.variant)
            .unwrap_or_default()
    }

    pub fn get_node_view(&self, path: &PathKey) -> NodeView {
        let entry = match self.nodes.get(path) {
            Some(entry) => entry,
            None => return NodeView::Unknown,
        };

        match entry.variant {
            VariantTag::Unknown => NodeView::Unknown,
            VariantTag::Number => NodeView::Number {
                value: entry.number.clone(),
            },
            VariantTag::Variable => NodeView::Variable {
                name: entry.name.clone(),
            },
            VariantTag::Expression => NodeView::Expression {
                op: entry.op.clone(),
                left: path.child(Side::Left),
                right: path.child(Side::Right),
            },
        }
    }

    /// Walks the tree reachable from the root
    pub fn render(&self) -> RenderNode {
        self.render_at(PathKey::root())
    }

    fn render_at(&self, path: PathKey) -> RenderNode {
        match self.get_node_view(&path) {
            NodeView::Unknown => RenderNode::Unknown { path },
            NodeView::Number { value } => RenderNode::Number { path, value },
            NodeView::Variable { name } => RenderNode::Variable { path, name },
            NodeView::Expression { op, left, right } => RenderNode::Expression {
                left: Box::new(self.render_at(left)),
                right: Box::new(self.render_at(right)),
                path,
                op,
            },
        }
    }
}
