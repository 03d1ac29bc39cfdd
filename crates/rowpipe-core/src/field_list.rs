//! Ordered, uniquely-named collection of fields describing a stream.
//!
//! Invariant: no two fields share a name, and `index` maps every field name to
//! its position in `fields`. Mutators update both in one step and leave the
//! list untouched when they fail.

use std::collections::HashMap;
use std::ops::Index;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::field::{Field, FieldSpec};

/// Anything that names a field: a string or a `Field`.
pub trait FieldRef {
    fn field_name(&self) -> &str;
}

impl FieldRef for str {
    fn field_name(&self) -> &str {
        self
    }
}

impl FieldRef for String {
    fn field_name(&self) -> &str {
        self
    }
}

impl FieldRef for Field {
    fn field_name(&self) -> &str {
        &self.name
    }
}

impl<T: FieldRef + ?Sized> FieldRef for &T {
    fn field_name(&self) -> &str {
        (**self).field_name()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldList {
    fields: Vec<Field>,
    index: HashMap<String, usize>,
}

impl FieldList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from names, triples, descriptions or fields.
    pub fn from_specs<I, S>(specs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldSpec>,
    {
        let mut list = Self::new();
        list.extend(specs)?;
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    pub fn as_slice(&self) -> &[Field] {
        &self.fields
    }

    pub fn get(&self, position: usize) -> Option<&Field> {
        self.fields.get(position)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Append one field. Fails without modifying the list if the spec is
    /// malformed or the name is taken.
    pub fn append(&mut self, spec: impl Into<FieldSpec>) -> Result<()> {
        let field = spec.into().resolve()?;
        if self.index.contains_key(&field.name) {
            return Err(Error::DuplicateField(field.name));
        }
        self.index.insert(field.name.clone(), self.fields.len());
        self.fields.push(field);
        Ok(())
    }

    /// Append several fields. All-or-nothing: on error the list is unchanged.
    pub fn extend<I, S>(&mut self, specs: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldSpec>,
    {
        let mut staged = self.clone();
        for spec in specs {
            staged.append(spec)?;
        }
        *self = staged;
        Ok(())
    }

    /// New list holding `self` followed by `other`.
    pub fn concat(&self, other: &FieldList) -> Result<FieldList> {
        let mut out = self.clone();
        out.extend(other.iter())?;
        Ok(out)
    }

    pub fn index(&self, field: impl FieldRef) -> Result<usize> {
        let name = field.field_name();
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    /// Positions of `fields`, in caller order.
    pub fn indexes<I, R>(&self, fields: I) -> Result<Vec<usize>>
    where
        I: IntoIterator<Item = R>,
        R: FieldRef,
    {
        fields.into_iter().map(|f| self.index(f)).collect()
    }

    /// All names, or the names at `positions` in the given order.
    pub fn names(&self, positions: Option<&[usize]>) -> Result<Vec<String>> {
        match positions {
            None => Ok(self.fields.iter().map(|f| f.name.clone()).collect()),
            Some(positions) => positions
                .iter()
                .map(|&i| {
                    self.fields.get(i).map(|f| f.name.clone()).ok_or(Error::IndexOutOfRange {
                        index: i,
                        len: self.fields.len(),
                    })
                })
                .collect(),
        }
    }

    /// Convenience for `names(None)`.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Boolean sequence aligned to this list, true where the field is in
    /// `subset`. Used to compress rows positionally.
    pub fn mask<I, R>(&self, subset: I) -> Result<Vec<bool>>
    where
        I: IntoIterator<Item = R>,
        R: FieldRef,
    {
        let mut mask = vec![false; self.fields.len()];
        for position in self.indexes(subset)? {
            mask[position] = true;
        }
        Ok(mask)
    }

    pub fn field(&self, name: &str) -> Result<&Field> {
        Ok(&self.fields[self.index(name)?])
    }

    /// Fields named by `names`, in caller order.
    pub fn fields<I, R>(&self, names: I) -> Result<Vec<&Field>>
    where
        I: IntoIterator<Item = R>,
        R: FieldRef,
    {
        names
            .into_iter()
            .map(|n| self.index(n).map(|i| &self.fields[i]))
            .collect()
    }

    /// Independent copy of the whole list, or of the named subset (in the
    /// order given).
    pub fn copy(&self, subset: Option<&[&str]>) -> Result<FieldList> {
        match subset {
            None => Ok(self.clone()),
            Some(names) => FieldList::from_specs(self.fields(names)?),
        }
    }

    /// Replace the field at `position`. The name index is updated in the same
    /// step; a rename onto another field's name is rejected.
    pub fn set(&mut self, position: usize, field: Field) -> Result<()> {
        let len = self.fields.len();
        let old = self
            .fields
            .get(position)
            .ok_or(Error::IndexOutOfRange { index: position, len })?;
        if let Some(&other) = self.index.get(&field.name) {
            if other != position {
                return Err(Error::DuplicateField(field.name));
            }
        }
        let old_name = old.name.clone();
        self.index.remove(&old_name);
        self.index.insert(field.name.clone(), position);
        self.fields[position] = field;
        Ok(())
    }

    /// Remove and return the field at `position`, shifting later fields.
    pub fn remove(&mut self, position: usize) -> Result<Field> {
        let len = self.fields.len();
        if position >= len {
            return Err(Error::IndexOutOfRange { index: position, len });
        }
        let removed = self.fields.remove(position);
        self.index.remove(&removed.name);
        for (i, field) in self.fields.iter().enumerate().skip(position) {
            self.index.insert(field.name.clone(), i);
        }
        Ok(removed)
    }
}

impl Index<usize> for FieldList {
    type Output = Field;

    fn index(&self, position: usize) -> &Field {
        &self.fields[position]
    }
}

impl<'a> IntoIterator for &'a FieldList {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl Serialize for FieldList {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldList {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let specs = Vec::<FieldSpec>::deserialize(deserializer)?;
        FieldList::from_specs(specs).map_err(serde::de::Error::custom)
    }
}
