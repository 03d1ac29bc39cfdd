//! Schema-level rename/drop and its positional counterpart.
//!
//! `FieldMap::map` says what the schema becomes; `FieldMap::row_filter` says
//! how to project a raw row. Positions are computed once per pipeline build,
//! never per row.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::field_list::FieldList;
use crate::types::Row;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMap {
    /// old name -> new name
    #[serde(default)]
    pub rename: HashMap<String, String>,
    #[serde(default)]
    pub drop: BTreeSet<String>,
    /// When set, only these fields survive (before `drop` is applied).
    #[serde(default)]
    pub keep: Option<BTreeSet<String>>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map that passes only `names`.
    pub fn keep_only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keep: Some(names.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rename.insert(from.into(), to.into());
        self
    }

    pub fn drop(mut self, name: impl Into<String>) -> Self {
        self.drop.insert(name.into());
        self
    }

    /// True when the field named `name` survives the map.
    pub fn passes(&self, name: &str) -> bool {
        let kept = self.keep.as_ref().map_or(true, |keep| keep.contains(name));
        kept && !self.drop.contains(name)
    }

    /// Output schema: dropped fields omitted, renamed fields copied under their
    /// new name with every other attribute preserved.
    pub fn map(&self, fields: &FieldList) -> Result<FieldList> {
        let mut out = FieldList::new();
        for field in fields {
            if !self.passes(&field.name) {
                continue;
            }
            match self.rename.get(&field.name) {
                Some(new_name) => out.append(field.renamed(new_name.clone()))?,
                None => out.append(field)?,
            }
        }
        Ok(out)
    }

    /// Positions of surviving fields. Renames do not move values.
    pub fn row_filter(&self, fields: &FieldList) -> RowFieldFilter {
        RowFieldFilter::new(
            fields
                .iter()
                .enumerate()
                .filter(|(_, f)| self.passes(&f.name))
                .map(|(i, _)| i)
                .collect(),
        )
    }
}

/// Precomputed list of source positions to keep. Valid only for rows shaped
/// like the `FieldList` it was computed from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFieldFilter {
    indexes: Vec<usize>,
}

impl RowFieldFilter {
    pub fn new(indexes: Vec<usize>) -> Self {
        Self { indexes }
    }

    /// Filter from a boolean mask aligned to a `FieldList`.
    pub fn from_mask(mask: &[bool]) -> Self {
        Self::new(
            mask.iter()
                .enumerate()
                .filter(|(_, keep)| **keep)
                .map(|(i, _)| i)
                .collect(),
        )
    }

    pub fn indexes(&self) -> &[usize] {
        &self.indexes
    }

    /// Kept values in original relative order.
    pub fn filter(&self, row: &[crate::types::Scalar]) -> Result<Row> {
        self.indexes
            .iter()
            .map(|&index| {
                row.get(index).cloned().ok_or(Error::IndexOutOfRange {
                    index,
                    len: row.len(),
                })
            })
            .collect()
    }
}
