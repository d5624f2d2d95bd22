use std::fmt;
use std::str::FromStr;

use derive_more::Display;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use strum_macros::{AsRefStr, Display as StrumDisplay, EnumString};

/// Text of the segment every path starts with
pub const ROOT: &str = "root";

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum PathError {
    #[display(fmt = "Path must start with \"{}\": \"{}\"", ROOT, _0)]
    MissingRoot(String),

    #[display(fmt = "Invalid path segment \"{}\"", _0)]
    InvalidSegment(String),
}

impl std::error::Error for PathError {}

#[derive(
    Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, AsRefStr, StrumDisplay, EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// The values stored for a single node.
///
/// `Variant` is keyed by the bare node path, every other field by the node
/// path followed by its own suffix. Declaration order matters: a node's
/// variant sorts before its leaf values.
#[derive(
    Debug,
    Clone,
    Copy,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    AsRefStr,
    StrumDisplay,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Field {
    Variant,
    Number,
    Name,
    Op,
}

impl Field {
    pub fn suffix(self) -> Option<&'static str> {
        match self {
            Self::Variant => None,
            Self::Number => Some("number"),
            Self::Name => Some("name"),
            Self::Op => Some("op"),
        }
    }
}

/// Position of a node within the tree being built.
///
/// Stored as the sequence of descensions from the root, so distinct
/// positions can never share a key. Ordering is depth-first pre-order: a
/// node sorts before all of its descendants, and its left subtree sorts
/// before its right subtree.
#[derive(Debug, Clone, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct PathKey(Vec<Side>);

impl PathKey {
    pub fn root() -> PathKey {
        PathKey(Vec::new())
    }

    pub fn child(&self, side: Side) -> PathKey {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend_from_slice(&self.0);
        segments.push(side);
        PathKey(segments)
    }

    pub fn left(&self) -> PathKey {
        self.child(Side::Left)
    }

    pub fn right(&self) -> PathKey {
        self.child(Side::Right)
    }

    pub fn leaf(&self, field: Field) -> LeafKey {
        LeafKey {
            path: self.clone(),
            field,
        }
    }

    pub fn parent(&self) -> Option<PathKey> {
        match self.0.split_last() {
            Some((_, rest)) => Some(PathKey(rest.to_vec())),
            None => None,
        }
    }

    /// Number of descensions below the root
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Returns true if `other` lies strictly beneath this path
    pub fn is_ancestor_of(&self, other: &PathKey) -> bool {
        other.0.len() > self.0.len() && other.0.starts_with(&self.0)
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(ROOT)?;
        for side in &self.0 {
            write!(f, "/{}", side)?;
        }
        Ok(())
    }
}

impl FromStr for PathKey {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = s.split('/');
        if segments.next() != Some(ROOT) {
            return Err(PathError::MissingRoot(s.to_string()));
        }

        segments
            .map(|segment| {
                Side::from_str(segment).map_err(|_| PathError::InvalidSegment(segment.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(PathKey)
    }
}

impl Serialize for PathKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PathKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Flat key of a single stored value, e.g. `root/left/number`.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct LeafKey {
    pub path: PathKey,
    pub field: Field,
}

impl fmt::Display for LeafKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field.suffix() {
            Some(suffix) => write!(f, "{}/{}", self.path, suffix),
            None => write!(f, "{}", self.path),
        }
    }
}

impl FromStr for LeafKey {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((prefix, last)) = s.rsplit_once('/') {
            match Field::from_str(last) {
                Ok(field) if field != Field::Variant => {
                    return Ok(LeafKey {
                        path: prefix.parse()?,
                        field,
                    })
                }
                _ => {}
            }
        }

        Ok(LeafKey {
            path: s.parse()?,
            field: Field::Variant,
        })
    }
}

impl Serialize for LeafKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LeafKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
