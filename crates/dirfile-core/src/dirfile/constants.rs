//! CONST, CARRAY, STRING and SARRAY values.
//!
//! Numeric constants keep the element type they were defined with; values
//! stored through a different Rust type are converted on the way in.

use snafu::prelude::*;

use crate::{
    entry::{Entry, EntryKind, EntryParams},
    error::{ArrayLengthSnafu, Guarded, IndexOutOfBoundsSnafu, Result, TypeSnafu, WrongKindSnafu},
    eval::series::Series,
    types::{Sample, Samples, Value},
};

use super::Dirfile;

fn check_slice(name: &str, start: usize, count: usize, len: usize) -> Result<()> {
    ensure!(
        start.checked_add(count).is_some_and(|end| end <= len),
        IndexOutOfBoundsSnafu {
            name,
            index: (start + count) as i64,
            len,
        }
    );
    Ok(())
}

impl Dirfile {
    fn constant_of(&self, name: &str, kind: EntryKind) -> Result<&Entry> {
        let entry = self.fields.resolve(name)?;
        ensure!(
            entry.kind() == kind,
            WrongKindSnafu {
                name,
                kind: entry.kind(),
                expected: kind.name(),
            }
        );
        Ok(entry)
    }

    /// Replace the payload of constant `name` through `edit`.
    fn edit_constant(
        &mut self,
        name: &str,
        kind: EntryKind,
        edit: impl FnOnce(&mut EntryParams) -> Result<()>,
    ) -> Result<()> {
        let entry = self.constant_of(name, kind)?;
        let (target, fragment) = (entry.name.clone(), entry.fragment);
        self.ensure_unprotected(fragment, Guarded::Format)?;
        if let Some(entry) = self.fields.get_mut(&target) {
            edit(&mut entry.params)?;
        }
        self.mark_dirty(fragment);
        tracing::trace!(target: "dirfile", field = %target, %kind, "updated constant");
        Ok(())
    }

    /// Value of CONST field `name` as `T`.
    pub fn get_constant<T: Sample>(&self, name: &str) -> Result<T> {
        let result = self.get_constant_value(name).and_then(|v| v.get::<T>().context(TypeSnafu { name }));
        self.track(result)
    }

    /// Value of CONST field `name` in its stored type.
    pub fn get_constant_value(&self, name: &str) -> Result<Value> {
        let result = self.constant_of(name, EntryKind::Const).map(|e| match &e.params {
            EntryParams::Const { value } => value.clone(),
            _ => Value::Float64(0.0),
        });
        self.track(result)
    }

    /// Store `value` in CONST field `name`, converted to its stored type.
    pub fn put_constant<T: Sample>(&mut self, name: &str, value: T) -> Result<()> {
        let result = self.edit_constant(name, EntryKind::Const, |params| {
            if let EntryParams::Const { value: stored } = params {
                *stored = value
                    .into_value()
                    .convert(stored.element_type())
                    .context(TypeSnafu { name })?;
            }
            Ok(())
        });
        self.track(result)
    }

    /// Every element of CARRAY field `name` in its stored type.
    pub fn get_carray_samples(&self, name: &str) -> Result<Samples> {
        let result = self.constant_of(name, EntryKind::Carray).map(|e| match &e.params {
            EntryParams::Carray { values } => values.clone(),
            _ => Samples::Float64(Vec::new()),
        });
        self.track(result)
    }

    /// Every element of CARRAY field `name` as `T`.
    pub fn get_carray<T: Sample>(&self, name: &str) -> Result<Vec<T>> {
        let result = self
            .get_carray_samples(name)
            .and_then(|values| values.to_vec::<T>().context(TypeSnafu { name }));
        self.track(result)
    }

    /// `count` elements of CARRAY field `name` starting at `start`.
    pub fn get_carray_slice<T: Sample>(&self, name: &str, start: usize, count: usize) -> Result<Vec<T>> {
        let result = self.get_carray::<T>(name).and_then(|values| {
            check_slice(name, start, count, values.len())?;
            Ok(values[start..start + count].to_vec())
        });
        self.track(result)
    }

    /// Replace every element of CARRAY field `name`. The length cannot change.
    pub fn put_carray<T: Sample>(&mut self, name: &str, values: &[T]) -> Result<()> {
        let result = self.edit_constant(name, EntryKind::Carray, |params| {
            if let EntryParams::Carray { values: stored } = params {
                ensure!(
                    stored.len() == values.len(),
                    ArrayLengthSnafu {
                        name,
                        expected: stored.len(),
                        found: values.len(),
                    }
                );
                *stored = T::into_samples(values.to_vec())
                    .convert(stored.element_type())
                    .context(TypeSnafu { name })?;
            }
            Ok(())
        });
        self.track(result)
    }

    /// Overwrite elements of CARRAY field `name` starting at `start`.
    pub fn put_carray_slice<T: Sample>(&mut self, name: &str, start: usize, values: &[T]) -> Result<()> {
        let result = self.edit_constant(name, EntryKind::Carray, |params| {
            if let EntryParams::Carray { values: stored } = params {
                check_slice(name, start, values.len(), stored.len())?;
                let mut series = Series::from_samples(stored);
                series.overwrite(start, &Series::from_samples(&T::into_samples(values.to_vec())));
                *stored = series
                    .to_samples(stored.element_type())
                    .context(TypeSnafu { name })?;
            }
            Ok(())
        });
        self.track(result)
    }

    /// Number of elements of a constant; CONST and STRING hold one.
    pub fn array_len(&self, name: &str) -> Result<usize> {
        let result = self.fields.resolve(name).and_then(|e| match &e.params {
            EntryParams::Const { .. } | EntryParams::String { .. } => Ok(1),
            EntryParams::Carray { values } => Ok(values.len()),
            EntryParams::Sarray { values } => Ok(values.len()),
            _ => WrongKindSnafu {
                name,
                kind: e.kind(),
                expected: "a constant",
            }
            .fail(),
        });
        self.track(result)
    }

    /// Text of STRING field `name`.
    pub fn get_string(&self, name: &str) -> Result<String> {
        let result = self.constant_of(name, EntryKind::String).map(|e| match &e.params {
            EntryParams::String { value } => value.clone(),
            _ => String::new(),
        });
        self.track(result)
    }

    /// Replace the text of STRING field `name`.
    pub fn put_string(&mut self, name: &str, value: &str) -> Result<()> {
        let result = self.edit_constant(name, EntryKind::String, |params| {
            if let EntryParams::String { value: stored } = params {
                *stored = value.to_string();
            }
            Ok(())
        });
        self.track(result)
    }

    /// Every element of SARRAY field `name`.
    pub fn get_sarray(&self, name: &str) -> Result<Vec<String>> {
        let result = self.constant_of(name, EntryKind::Sarray).map(|e| match &e.params {
            EntryParams::Sarray { values } => values.clone(),
            _ => Vec::new(),
        });
        self.track(result)
    }

    /// `count` elements of SARRAY field `name` starting at `start`.
    pub fn get_sarray_slice(&self, name: &str, start: usize, count: usize) -> Result<Vec<String>> {
        let result = self.get_sarray(name).and_then(|values| {
            check_slice(name, start, count, values.len())?;
            Ok(values[start..start + count].to_vec())
        });
        self.track(result)
    }

    /// Replace every element of SARRAY field `name`. The length cannot change.
    pub fn put_sarray(&mut self, name: &str, values: &[String]) -> Result<()> {
        let result = self.edit_constant(name, EntryKind::Sarray, |params| {
            if let EntryParams::Sarray { values: stored } = params {
                ensure!(
                    stored.len() == values.len(),
                    ArrayLengthSnafu {
                        name,
                        expected: stored.len(),
                        found: values.len(),
                    }
                );
                stored.clone_from_slice(values);
            }
            Ok(())
        });
        self.track(result)
    }

    /// Overwrite elements of SARRAY field `name` starting at `start`.
    pub fn put_sarray_slice(&mut self, name: &str, start: usize, values: &[String]) -> Result<()> {
        let result = self.edit_constant(name, EntryKind::Sarray, |params| {
            if let EntryParams::Sarray { values: stored } = params {
                check_slice(name, start, values.len(), stored.len())?;
                stored[start..start + values.len()].clone_from_slice(values);
            }
            Ok(())
        });
        self.track(result)
    }

    fn listed_constants(&self, parent: Option<&str>) -> impl Iterator<Item = &Entry> {
        self.fields
            .iter()
            .filter(move |e| !e.hidden && e.parent() == parent)
    }

    /// Name and value of every visible top-level CONST field.
    pub fn constants(&self) -> Vec<(String, Value)> {
        self.collect_constants(None)
    }

    /// Name and value of every visible CONST meta-field of `parent`.
    pub fn meta_constants(&self, parent: &str) -> Vec<(String, Value)> {
        self.collect_constants(Some(parent))
    }

    fn collect_constants(&self, parent: Option<&str>) -> Vec<(String, Value)> {
        self.listed_constants(parent)
            .filter_map(|e| match &e.params {
                EntryParams::Const { value } => Some((e.name.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    /// Name and elements of every visible top-level CARRAY field.
    pub fn carrays(&self) -> Vec<(String, Samples)> {
        self.listed_constants(None)
            .filter_map(|e| match &e.params {
                EntryParams::Carray { values } => Some((e.name.clone(), values.clone())),
                _ => None,
            })
            .collect()
    }

    /// Name and text of every visible top-level STRING field.
    pub fn strings(&self) -> Vec<(String, String)> {
        self.collect_strings(None)
    }

    /// Name and text of every visible STRING meta-field of `parent`.
    pub fn meta_strings(&self, parent: &str) -> Vec<(String, String)> {
        self.collect_strings(Some(parent))
    }

    fn collect_strings(&self, parent: Option<&str>) -> Vec<(String, String)> {
        self.listed_constants(parent)
            .filter_map(|e| match &e.params {
                EntryParams::String { value } => Some((e.name.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }
}
