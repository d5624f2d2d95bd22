use std::collections::BTreeMap;

use derive_more::Display;
use log::debug;

use crate::builder::{Builder, NodeView};
use crate::leaf::LeafValue;
use crate::path::{Field, LeafKey, PathError, PathKey};

/// Flat form state, one text value per [`LeafKey`].
///
/// Iterates in the order the values must be applied: ancestors before
/// descendants and a node's variant before its own leaves.
pub type FormRecord = BTreeMap<LeafKey, String>;

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[display(fmt = "Invalid key: {}", _0)]
    InvalidKey(PathError),

    #[display(fmt = "Invalid variant \"{}\" at {}", _1, _0)]
    InvalidVariant(PathKey, String),
}

impl std::error::Error for RecordError {}

impl From<PathError> for RecordError {
    fn from(e: PathError) -> Self {
        RecordError::InvalidKey(e)
    }
}

/// Parses `key: value` form entries such as `("root/left/op", "Add")`
pub fn parse_record<I, K, V>(entries: I) -> Result<FormRecord, RecordError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    entries
        .into_iter()
        .map(|(key, value)| {
            let key = key.as_ref().parse::<LeafKey>()?;
            let value: String = value.into();
            Ok::<_, RecordError>((key, value))
        })
        .collect()
}

impl Builder {
    /// Applies every entry of `record` in key order.
    ///
    /// The record is checked before anything is written, so on error the
    /// builder is left untouched.
    pub fn apply_record(&mut self, record: &FormRecord) -> Result<(), RecordError> {
        let values = record
            .iter()
            .map(|(key, text)| {
                LeafValue::from_field(key.field, text)
                    .map(|value| (&key.path, value))
                    .map_err(|_| RecordError::InvalidVariant(key.path.clone(), text.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Applying {} form values", values.len());
        for (path, value) in values {
            self.set_leaf(path, value);
        }
        Ok(())
    }

    /// Exports the reachable state as a flat record
    pub fn to_record(&self) -> FormRecord {
        let mut record = FormRecord::new();
        self.export(PathKey::root(), &mut record);
        record
    }

    fn export(&self, path: PathKey, record: &mut FormRecord) {
        let view = self.get_node_view(&path);
        let variant = view.variant();

        let leaf = match view {
            NodeView::Unknown => return,
            NodeView::Number { value } => value.map(|v| (Field::Number, v)),
            NodeView::Variable { name } => name.map(|v| (Field::Name, v)),
            NodeView::Expression { op, left, right } => {
                self.export(left, record);
                self.export(right, record);
                op.map(|v| (Field::Op, v))
            }
        };

        if let Some((field, value)) = leaf {
            record.insert(path.leaf(field), value);
        }
        record.insert(path.leaf(Field::Variant), variant.to_string());
    }
}
