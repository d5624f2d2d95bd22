//! Incremental, path-addressed construction of expression trees.
//!
//! A [`Builder`] holds a sparse map from tree positions ([`PathKey`]) to the
//! values a user has entered so far. Nodes may be redeclared at any time,
//! which discards everything previously entered beneath them. Once every
//! reachable node is complete, [`Builder::materialize`] produces the nested
//! [`Expression`] sent to the evaluation service.

pub use expression_client::{Expression, Operator};

pub use builder::{Builder, NodeView, RenderNode};
pub use leaf::{LeafValue, VariantTag};
pub use materialize::MaterializeError;
pub use path::{Field, LeafKey, PathError, PathKey, Side, ROOT};
pub use record::{parse_record, FormRecord, RecordError};

mod builder;
mod leaf;
mod materialize;
mod path;
mod record;
