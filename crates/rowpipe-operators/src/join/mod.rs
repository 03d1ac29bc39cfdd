//! Master/detail join.
//!
//! Semantics are a strict multi-way inner join: a master row is emitted,
//! extended by one row from every detail, only when every detail has a row
//! for its key. Master rows missing in any detail are dropped. `inner_join`
//! is the same operator under its accurate name.
//!
//! The detail side is materializing: each detail stream is drained into a
//! key -> row map (last duplicate wins) on the first pull of the output.
//! The master side streams.

mod dict;

use std::collections::HashMap;

use rowpipe_core::prelude::{FieldList, Row, Scalar};
use serde::{Deserialize, Serialize};

use crate::traits::{Buffering, OpError, Operator, RowResult};

pub use dict::{to_dict, to_dict_composite};

/// One master/detail key pair, by field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinKeys {
    pub master: String,
    /// Defaults to the master key name.
    #[serde(default)]
    pub detail: Option<String>,
    /// Prepended to every field of this detail in the output.
    #[serde(default)]
    pub prefix: Option<String>,
}

impl JoinKeys {
    pub fn new(master: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            master: master.into(),
            detail: Some(detail.into()),
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    fn detail_name(&self) -> &str {
        self.detail.as_deref().unwrap_or(&self.master)
    }
}

/// Named-field join: input 0 is the master, inputs 1.. are the details, one
/// `JoinKeys` per detail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    pub joins: Vec<JoinKeys>,
}

impl Join {
    pub fn new(joins: Vec<JoinKeys>) -> Self {
        Self { joins }
    }

    fn check_counts(&self, details: usize) -> Result<(), OpError> {
        check_join_counts(details, self.joins.len())
    }

    /// `(master_position, detail_position)` for every detail.
    pub fn positions(&self, inputs: &[FieldList]) -> Result<Vec<(usize, usize)>, OpError> {
        let (master, details) = inputs
            .split_first()
            .ok_or_else(|| OpError::Argument("join needs a master input".into()))?;
        self.check_counts(details.len())?;
        self.joins
            .iter()
            .zip(details)
            .map(|(keys, detail)| {
                Ok((
                    master.index(keys.master.as_str())?,
                    detail.index(keys.detail_name())?,
                ))
            })
            .collect()
    }

    pub fn apply<M, D>(
        &self,
        master: M,
        details: Vec<D>,
        inputs: &[FieldList],
    ) -> Result<JoinIter<M::IntoIter, D::IntoIter>, OpError>
    where
        M: IntoIterator<Item = RowResult>,
        D: IntoIterator<Item = RowResult>,
    {
        let positions = self.positions(inputs)?;
        left_inner_join(master, details, &positions)
    }
}

impl Operator for Join {
    fn name(&self) -> &'static str {
        "join"
    }

    fn buffering(&self) -> Buffering {
        Buffering::Materializing
    }

    /// Master fields followed by each detail's fields. A detail field whose
    /// name is already taken is suffixed with `_<detail number>` unless the
    /// detail carries a prefix.
    fn plan(&self, inputs: &[FieldList]) -> Result<FieldList, OpError> {
        self.positions(inputs)?;
        let mut out = inputs[0].clone();
        for (i, (keys, detail)) in self.joins.iter().zip(&inputs[1..]).enumerate() {
            for field in detail {
                let name = match &keys.prefix {
                    Some(prefix) => format!("{prefix}{}", field.name),
                    None if out.contains(&field.name) => format!("{}_{}", field.name, i + 1),
                    None => field.name.clone(),
                };
                out.append(field.renamed(name))?;
            }
        }
        Ok(out)
    }
}

fn check_join_counts(details: usize, joins: usize) -> Result<(), OpError> {
    if details == 0 {
        return Err(OpError::Argument("join requires at least one detail stream".into()));
    }
    if details != joins {
        return Err(OpError::Argument(format!(
            "join got {details} detail streams but {joins} join specs"
        )));
    }
    Ok(())
}

/// Join `master` with every stream in `details`. `joins[i]` is the
/// `(master_key_position, detail_key_position)` pair for `details[i]`.
pub fn left_inner_join<M, D>(
    master: M,
    details: Vec<D>,
    joins: &[(usize, usize)],
) -> Result<JoinIter<M::IntoIter, D::IntoIter>, OpError>
where
    M: IntoIterator<Item = RowResult>,
    D: IntoIterator<Item = RowResult>,
{
    check_join_counts(details.len(), joins.len())?;
    Ok(JoinIter {
        master: master.into_iter(),
        pending: Some(details.into_iter().map(IntoIterator::into_iter).collect()),
        maps: Vec::new(),
        joins: joins.to_vec(),
        done: false,
    })
}

/// Alias of [`left_inner_join`].
pub fn inner_join<M, D>(
    master: M,
    details: Vec<D>,
    joins: &[(usize, usize)],
) -> Result<JoinIter<M::IntoIter, D::IntoIter>, OpError>
where
    M: IntoIterator<Item = RowResult>,
    D: IntoIterator<Item = RowResult>,
{
    left_inner_join(master, details, joins)
}

pub struct JoinIter<M, D> {
    master: M,
    /// Detail streams not yet drained.
    pending: Option<Vec<D>>,
    maps: Vec<HashMap<Scalar, Row>>,
    joins: Vec<(usize, usize)>,
    done: bool,
}

impl<M, D> JoinIter<M, D>
where
    M: Iterator<Item = RowResult>,
    D: Iterator<Item = RowResult>,
{
    fn load_details(&mut self) -> Result<(), OpError> {
        if let Some(details) = self.pending.take() {
            for (detail, &(_, key)) in details.into_iter().zip(&self.joins) {
                let map = dict::index_by(detail, key)?;
                #[cfg(feature = "tracing")]
                tracing::debug!(rows = map.len(), key, "join detail materialized");
                self.maps.push(map);
            }
        }
        Ok(())
    }

    /// Extended row, or `None` when some detail has no match.
    fn join_row(&self, row: Row) -> Result<Option<Row>, OpError> {
        let mut out = row.clone();
        for (map, &(master_key, _)) in self.maps.iter().zip(&self.joins) {
            let key = row.get(master_key).ok_or_else(|| {
                OpError::Exec(format!(
                    "master row has {} values, key position is {}",
                    row.len(),
                    master_key
                ))
            })?;
            match map.get(key) {
                Some(detail) => out.extend(detail.iter().cloned()),
                None => return Ok(None),
            }
        }
        Ok(Some(out))
    }
}

impl<M, D> Iterator for JoinIter<M, D>
where
    M: Iterator<Item = RowResult>,
    D: Iterator<Item = RowResult>,
{
    type Item = RowResult;

    fn next(&mut self) -> Option<RowResult> {
        if self.done {
            return None;
        }
        if let Err(e) = self.load_details() {
            self.done = true;
            return Some(Err(e));
        }
        while let Some(item) = self.master.next() {
            match item.and_then(|row| self.join_row(row)) {
                Ok(Some(row)) => return Some(Ok(row)),
                Ok(None) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowpipe_core::prelude::row;

    fn s(v: &str) -> Scalar {
        Scalar::from(v)
    }

    #[test]
    fn count_mismatch_reports_both_counts() {
        let master: Vec<RowResult> = vec![];
        let err = left_inner_join(master, vec![Vec::<RowResult>::new()], &[(0, 0), (1, 0)])
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        assert!(err.contains('1') && err.contains('2'), "{err}");

        let none: Vec<Vec<RowResult>> = vec![];
        assert!(matches!(
            left_inner_join(Vec::<RowResult>::new(), none, &[]),
            Err(OpError::Argument(_))
        ));
    }

    #[test]
    fn two_details_must_both_match() {
        let master = vec![Ok(row([s("a"), s("x")])), Ok(row([s("b"), s("y")]))];
        let colors = vec![Ok(row([s("a"), s("red")])), Ok(row([s("b"), s("blue")]))];
        let sizes = vec![Ok(row([s("S"), s("a")]))];
        let out: Vec<Row> = left_inner_join(master, vec![colors, sizes], &[(0, 0), (0, 1)])
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(out, vec![row([s("a"), s("x"), s("a"), s("red"), s("S"), s("a")])]);
    }

    #[test]
    fn details_are_not_drained_until_pulled() {
        let mut drained = false;
        let detail = std::iter::once_with(|| {
            drained = true;
            Ok(row([1]))
        });
        let iter = left_inner_join(vec![Ok(row([1]))], vec![detail], &[(0, 0)]).unwrap();
        drop(iter);
        assert!(!drained);
    }

    #[test]
    fn plan_renames_colliding_detail_fields() {
        let master = FieldList::from_specs(["id", "name"]).unwrap();
        let detail = FieldList::from_specs(["id", "price"]).unwrap();
        let join = Join::new(vec![JoinKeys::new("id", "id")]);
        let out = join.plan(&[master.clone(), detail.clone()]).unwrap();
        assert_eq!(out.field_names(), vec!["id", "name", "id_1", "price"]);

        let join = Join::new(vec![JoinKeys::new("id", "id").with_prefix("d_")]);
        let out = join.plan(&[master, detail]).unwrap();
        assert_eq!(out.field_names(), vec!["id", "name", "d_id", "d_price"]);
    }
}
