//! Field definitions: add, alter, delete, rename, move and list.
//!
//! Names passed to [`Dirfile::add`] and [`Dirfile::alter`] are written
//! relative to the target fragment, the way they appear in its document;
//! the fragment's namespace and affixes are applied on the way in. Every
//! other operation takes full names.

use std::collections::{BTreeMap, HashSet};

use snafu::prelude::*;

use crate::{
    entry::{Entry, EntryKind, EntryParams, INDEX_FIELD, validate_name},
    error::{
        DirfileError, DomainSnafu, DuplicateFieldSnafu, FieldNotFoundSnafu, Guarded, ReferencedSnafu,
        Result, WrongKindSnafu,
    },
    eval::{
        graph::{self, Missing},
        streams::RawTarget,
    },
    fragment::scope_of,
    storage, wire,
};

use super::Dirfile;

/// What a rename or move does about fields referring to the old name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenamePolicy {
    /// Refuse while any other field refers to the old name.
    #[default]
    Fail,
    /// Go ahead; referring fields keep the old, now dangling, name.
    Force,
    /// Rewrite referring fields to use the new name.
    UpdateReferences,
}

/// Options for [`Dirfile::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteOptions {
    /// Also remove a raw field's data file.
    pub data: bool,
    /// Delete even if other fields refer to the field.
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Vector,
    Scalar,
}

/// Which fields a listing returns.
///
/// The default lists every visible top-level field, aliases included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldFilter {
    kind: Option<EntryKind>,
    class: Option<Class>,
    parent: Option<String>,
    fragment: Option<usize>,
    hidden: bool,
    no_aliases: bool,
}

impl FieldFilter {
    /// Every visible top-level field.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only fields of `kind`.
    pub fn kind(mut self, kind: EntryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Only fields producing sample streams.
    pub fn vectors(mut self) -> Self {
        self.class = Some(Class::Vector);
        self
    }

    /// Only constant fields.
    pub fn scalars(mut self) -> Self {
        self.class = Some(Class::Scalar);
        self
    }

    /// Meta-fields of `parent` instead of top-level fields.
    pub fn meta(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Only fields defined in fragment `index`.
    pub fn fragment(mut self, index: usize) -> Self {
        self.fragment = Some(index);
        self
    }

    /// List hidden fields too.
    pub fn include_hidden(mut self, yes: bool) -> Self {
        self.hidden = yes;
        self
    }

    /// Leave aliases out.
    pub fn without_aliases(mut self) -> Self {
        self.no_aliases = true;
        self
    }

    fn matches(&self, entry: &Entry) -> bool {
        let kind = entry.kind();
        if entry.parent() != self.parent.as_deref() {
            return false;
        }
        if entry.hidden && !self.hidden {
            return false;
        }
        if self.no_aliases && kind == EntryKind::Alias {
            return false;
        }
        if self.fragment.is_some_and(|f| f != entry.fragment) {
            return false;
        }
        if self.kind.is_some_and(|k| k != kind) {
            return false;
        }
        match self.class {
            Some(Class::Vector) => kind.is_vector(),
            Some(Class::Scalar) => kind.is_scalar(),
            None => true,
        }
    }
}

impl Dirfile {
    /// Add `entry` to the fragment it names. Its name and references are
    /// relative to that fragment.
    ///
    /// References to fields that do not exist yet are allowed; a reference
    /// cycle is not. Adding a RAW field does not create its data file.
    pub fn add(&mut self, entry: Entry) -> Result<()> {
        let result = self.add_inner(entry);
        self.track(result)
    }

    /// Decode a fixed-layout entry record and add it. Returns the full name
    /// of the new field.
    pub fn add_record(&mut self, record: &[u8]) -> Result<String> {
        let result = wire::decode(record)
            .map_err(|source| DirfileError::Wire { source })
            .and_then(|entry| {
                let index = entry.fragment;
                let name = scope_of(&self.fragments, index).qualify(&entry.name);
                self.add_inner(entry)?;
                Ok(name)
            });
        self.track(result)
    }

    fn add_inner(&mut self, mut entry: Entry) -> Result<()> {
        let index = entry.fragment;
        self.ensure_unprotected(index, Guarded::Format)?;
        entry.validate()?;
        scope_of(&self.fragments, index).qualify_entry(&mut entry);
        if let Some(parent) = entry.parent() {
            ensure!(self.fields.contains(parent), FieldNotFoundSnafu { name: parent });
        }
        let name = entry.name.clone();
        let previous = self.fields.get(&name).cloned();
        self.fields.insert(entry, self.options.ignore_duplicates)?;
        if let Err(err) = graph::check(&self.fields, &name, Missing::Ignore) {
            match previous {
                Some(previous) => self.fields.insert(previous, true)?,
                None => {
                    self.fields.remove(&name);
                }
            }
            return Err(err);
        }
        self.mark_dirty(index);
        tracing::debug!(target: "dirfile", field = %name, fragment = index, "added field");
        Ok(())
    }

    /// Replace the parameters of field `name`, keeping its kind. References
    /// in `params` are relative to the field's fragment.
    pub fn alter(&mut self, name: &str, params: EntryParams) -> Result<()> {
        let result = self.alter_inner(name, params);
        self.track(result)
    }

    fn alter_inner(&mut self, name: &str, params: EntryParams) -> Result<()> {
        let current = self
            .fields
            .get(name)
            .context(FieldNotFoundSnafu { name })?
            .clone();
        ensure!(
            current.kind() == params.kind(),
            WrongKindSnafu {
                name,
                kind: current.kind(),
                expected: params.kind().name(),
            }
        );
        self.ensure_unprotected(current.fragment, Guarded::Format)?;
        let scope = scope_of(&self.fragments, current.fragment);
        let mut updated = Entry {
            name: scope.relativize(&current.name),
            params,
            ..current.clone()
        };
        scope.qualify_entry(&mut updated);
        updated.validate()?;
        self.fields.insert(updated, true)?;
        if let Err(err) = graph::check(&self.fields, name, Missing::Ignore) {
            self.fields.insert(current, true)?;
            return Err(err);
        }
        if current.kind() == EntryKind::Raw {
            self.streams.get_mut().close(name)?;
        }
        self.tables.get_mut().clear();
        self.mark_dirty(current.fragment);
        Ok(())
    }

    /// Delete field `name` and its meta-fields.
    pub fn delete(&mut self, name: &str, options: DeleteOptions) -> Result<()> {
        let result = self.delete_inner(name, options);
        self.track(result)
    }

    fn delete_inner(&mut self, name: &str, options: DeleteOptions) -> Result<()> {
        ensure!(
            name != INDEX_FIELD,
            DomainSnafu {
                name,
                reason: "the implicit INDEX field cannot be deleted",
            }
        );
        let entry = self
            .fields
            .get(name)
            .context(FieldNotFoundSnafu { name })?
            .clone();
        self.ensure_unprotected(entry.fragment, Guarded::Format)?;
        let metas: Vec<String> = self
            .fields
            .iter()
            .filter(|e| e.parent() == Some(name))
            .map(|e| e.name.clone())
            .collect();
        if !options.force {
            let by = self
                .fields
                .referrers(name)
                .find(|e| !metas.contains(&e.name))
                .map(|e| e.name.clone());
            if let Some(by) = by {
                return ReferencedSnafu { name, by }.fail();
            }
        }
        if let EntryParams::Raw { .. } = entry.params {
            if options.data {
                self.ensure_unprotected(entry.fragment, Guarded::Data)?;
                self.streams.get_mut().forget(name);
                let file = self.raw_file(name, entry.fragment)?;
                storage::remove_file(&self.location, &file)?;
            } else {
                self.streams.get_mut().close(name)?;
            }
        }
        for meta in &metas {
            self.fields.remove(meta);
        }
        self.fields.remove(name);
        self.positions.get_mut().remove(name);
        for i in 0..self.fragments.len() {
            if self.fragments[i].reference.as_deref() == Some(name) {
                self.fragments[i].reference = None;
                self.mark_dirty(i);
            }
        }
        self.mark_dirty(entry.fragment);
        tracing::debug!(target: "dirfile", field = name, metas = metas.len(), data = options.data, "deleted field");
        Ok(())
    }

    /// Rename field `old` to the full name `new`. Its meta-fields and raw
    /// data file follow it.
    pub fn rename(&mut self, old: &str, new: &str, policy: RenamePolicy) -> Result<()> {
        let result = self.rename_inner(old, new, policy);
        self.track(result)
    }

    fn rename_inner(&mut self, old: &str, new: &str, policy: RenamePolicy) -> Result<()> {
        ensure!(
            old != INDEX_FIELD,
            DomainSnafu {
                name: old,
                reason: "the implicit INDEX field cannot be renamed",
            }
        );
        validate_name(new)?;
        let fragment = self.fields.get(old).context(FieldNotFoundSnafu { name: old })?.fragment;
        ensure!(!self.fields.contains(new), DuplicateFieldSnafu { name: new });
        self.ensure_unprotected(fragment, Guarded::Format)?;
        let renames = self.renames_with_metas(old, new);
        self.check_policy(&renames, policy)?;
        self.apply_renames(&renames, policy == RenamePolicy::UpdateReferences)?;
        tracing::debug!(target: "dirfile", from = old, to = new, ?policy, "renamed field");
        Ok(())
    }

    /// Move field `name` into fragment `fragment`. The field takes the name
    /// the new fragment's scope gives it; raw data moves along.
    pub fn move_field(&mut self, name: &str, fragment: usize, policy: RenamePolicy) -> Result<()> {
        let result = self.move_inner(name, fragment, policy);
        self.track(result)
    }

    fn move_inner(&mut self, name: &str, fragment: usize, policy: RenamePolicy) -> Result<()> {
        let entry = self
            .fields
            .get(name)
            .context(FieldNotFoundSnafu { name })?
            .clone();
        ensure!(
            entry.parent().is_none() && name != INDEX_FIELD,
            DomainSnafu {
                name,
                reason: "meta-fields and INDEX move with their parent only",
            }
        );
        self.ensure_unprotected(fragment, Guarded::Format)?;
        if entry.fragment == fragment {
            return Ok(());
        }
        self.ensure_unprotected(entry.fragment, Guarded::Format)?;
        let relative = scope_of(&self.fragments, entry.fragment).relativize(name);
        let new_name = scope_of(&self.fragments, fragment).qualify(&relative);
        ensure!(
            new_name == name || !self.fields.contains(&new_name),
            DuplicateFieldSnafu { name: new_name }
        );
        let renames = self.renames_with_metas(name, &new_name);
        self.check_policy(&renames, policy)?;

        if let EntryParams::Raw { data_type, .. } = entry.params {
            self.ensure_unprotected(entry.fragment, Guarded::Data)?;
            self.ensure_unprotected(fragment, Guarded::Data)?;
            let from = RawTarget {
                name,
                data_type,
                fragment: &self.fragments[entry.fragment],
            };
            let to = RawTarget {
                name: &new_name,
                data_type,
                fragment: &self.fragments[fragment],
            };
            let streams = self.streams.get_mut();
            let samples = streams.read_all(&from, &self.location, &self.codecs)?;
            streams.forget(name);
            streams.replace(&to, &samples, &self.location, &self.codecs)?;
            if from.file_name() != to.file_name() {
                storage::remove_file(&self.location, std::path::Path::new(&from.file_name()))?;
            }
        }
        self.mark_dirty(entry.fragment);
        for old in renames.keys() {
            if let Some(e) = self.fields.get_mut(old) {
                e.fragment = fragment;
            }
        }
        if new_name != name {
            self.apply_renames(&renames, policy == RenamePolicy::UpdateReferences)?;
        }
        self.mark_dirty(fragment);
        tracing::debug!(target: "dirfile", field = name, to = fragment, "moved field");
        Ok(())
    }

    fn renames_with_metas(&self, old: &str, new: &str) -> BTreeMap<String, String> {
        let mut renames = BTreeMap::new();
        renames.insert(old.to_string(), new.to_string());
        for meta in self.fields.iter().filter(|e| e.parent() == Some(old)) {
            if let Some((_, child)) = meta.name.split_once('/') {
                renames.insert(meta.name.clone(), format!("{new}/{child}"));
            }
        }
        renames
    }

    fn check_policy(&self, renames: &BTreeMap<String, String>, policy: RenamePolicy) -> Result<()> {
        if policy != RenamePolicy::Fail {
            return Ok(());
        }
        for old in renames.keys() {
            if let Some(by) = self.fields.referrers(old).find(|e| !renames.contains_key(&e.name)) {
                return ReferencedSnafu {
                    name: old.as_str(),
                    by: by.name.clone(),
                }
                .fail();
            }
        }
        Ok(())
    }

    /// Rename every field in `renames` (full old name to full new name),
    /// moving raw files and cursors. With `update_references` every field
    /// referring to an old name is rewritten.
    pub(super) fn apply_renames(&mut self, renames: &BTreeMap<String, String>, update_references: bool) -> Result<()> {
        let mut moved = Vec::new();
        for (old, new) in renames {
            if let Some(mut entry) = self.fields.remove(old) {
                entry.name = new.clone();
                moved.push((old.as_str(), entry));
            }
        }
        for (old, entry) in &moved {
            if matches!(entry.params, EntryParams::Raw { .. }) {
                self.streams.get_mut().close(old)?;
                let from = self.raw_file(old, entry.fragment)?;
                let to = self.raw_file(&entry.name, entry.fragment)?;
                if storage::exists(&self.location, &from) {
                    storage::rename(&self.location, &from, &to)?;
                }
            }
            let positions = self.positions.get_mut();
            if let Some(position) = positions.remove(*old) {
                positions.insert(entry.name.clone(), position);
            }
        }
        let mut touched: HashSet<usize> = moved.iter().map(|(_, e)| e.fragment).collect();
        for (_, entry) in moved {
            self.fields.insert(entry, true)?;
        }

        if update_references {
            for entry in self.fields.values_mut() {
                let mut refs: Vec<String> = entry
                    .references()
                    .into_iter()
                    .filter(|r| renames.contains_key(*r))
                    .map(str::to_string)
                    .collect();
                refs.sort();
                refs.dedup();
                if refs.is_empty() {
                    continue;
                }
                // two passes so a chain like a->b, b->c cannot rename twice
                for (k, r) in refs.iter().enumerate() {
                    entry.rename_references(r, &format!("\u{1}{k}"));
                }
                for (k, r) in refs.iter().enumerate() {
                    entry.rename_references(&format!("\u{1}{k}"), &renames[r]);
                }
                touched.insert(entry.fragment);
            }
        }
        for (i, fragment) in self.fragments.iter_mut().enumerate() {
            let renamed = fragment.reference.as_ref().and_then(|r| renames.get(r));
            if let Some(new) = renamed {
                fragment.reference = Some(new.clone());
                touched.insert(i);
            }
        }
        for i in touched {
            self.mark_dirty(i);
        }
        Ok(())
    }

    /// Hide field `name` from listings.
    pub fn hide(&mut self, name: &str) -> Result<()> {
        let result = self.set_hidden(name, true);
        self.track(result)
    }

    /// Show a hidden field in listings again.
    pub fn unhide(&mut self, name: &str) -> Result<()> {
        let result = self.set_hidden(name, false);
        self.track(result)
    }

    fn set_hidden(&mut self, name: &str, hidden: bool) -> Result<()> {
        let fragment = self.fields.get(name).context(FieldNotFoundSnafu { name })?.fragment;
        self.ensure_unprotected(fragment, Guarded::Format)?;
        if let Some(entry) = self.fields.get_mut(name) {
            entry.hidden = hidden;
        }
        self.mark_dirty(fragment);
        Ok(())
    }

    /// Whether field `name` is hidden.
    pub fn hidden(&self, name: &str) -> Result<bool> {
        let result = self.fields.get(name).map(|e| e.hidden).context(FieldNotFoundSnafu { name });
        self.track(result)
    }

    /// The definition of `name`, following aliases.
    pub fn entry(&self, name: &str) -> Result<Entry> {
        let result = self.fields.resolve(name).cloned();
        self.track(result)
    }

    /// The kind of `name`, following aliases.
    pub fn entry_kind(&self, name: &str) -> Result<EntryKind> {
        let result = self.fields.resolve(name).map(Entry::kind);
        self.track(result)
    }

    /// The field alias `name` points to.
    pub fn alias_target(&self, name: &str) -> Result<String> {
        let result = self.fields.get(name).context(FieldNotFoundSnafu { name }).and_then(|e| match &e.params {
            EntryParams::Alias { target } => Ok(target.clone()),
            _ => WrongKindSnafu {
                name,
                kind: e.kind(),
                expected: "ALIAS",
            }
            .fail(),
        });
        self.track(result)
    }

    /// Aliases resolving to the same field as `name`.
    pub fn aliases(&self, name: &str) -> Result<Vec<String>> {
        let result = self.fields.resolve(name).map(|target| {
            self.fields
                .iter()
                .filter(|e| e.kind() == EntryKind::Alias && e.name != name)
                .filter(|e| self.fields.resolve(&e.name).is_ok_and(|t| t.name == target.name))
                .map(|e| e.name.clone())
                .collect()
        });
        self.track(result)
    }

    /// Names of the fields `filter` selects, in name order.
    pub fn field_list(&self, filter: &FieldFilter) -> Vec<String> {
        self.fields
            .iter()
            .filter(|e| filter.matches(e))
            .map(|e| e.name.clone())
            .collect()
    }

    /// Number of fields `filter` selects.
    pub fn field_count(&self, filter: &FieldFilter) -> usize {
        self.fields.iter().filter(|e| filter.matches(e)).count()
    }

    /// Every visible top-level field.
    pub fn fields(&self) -> Vec<String> {
        self.field_list(&FieldFilter::new())
    }

    /// Every visible meta-field of `parent`.
    pub fn meta_fields(&self, parent: &str) -> Vec<String> {
        self.field_list(&FieldFilter::new().meta(parent))
    }

    /// Check that `name` can be evaluated: every reference exists, has a
    /// usable kind and no cycle is reachable.
    pub fn validate(&self, name: &str) -> Result<()> {
        let result = graph::validate(&self.fields, name);
        self.track(result)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        config::OpenOptions,
        fragment::{IncludeOptions, Protection},
        io::SampleRange,
        types::{ElementType, Value},
    };

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    use std::sync::Arc;

    use crate::{
        codec::Encoding,
        dirfile::test_util::{FullDiskCodec, staged_leftovers},
    };

    fn scratch() -> Result<(TempDir, Dirfile), Box<dyn std::error::Error>> {
        let tmp = TempDir::new()?;
        let mut dirfile = Dirfile::open(tmp.path(), OpenOptions::new().create(true))?;
        dirfile.add(Entry::raw("data", ElementType::Uint8, 1)?)?;
        dirfile.add(Entry::phase("late", "data", 1)?)?;
        dirfile.add(Entry::constant("data/gain", Value::Float64(2.0))?)?;
        dirfile.put_data("data", SampleRange::samples(0, 3), &[1u8, 2, 3])?;
        Ok((tmp, dirfile))
    }

    #[test]
    fn cycles_are_rejected_on_add() -> TestResult {
        let (_tmp, mut dirfile) = scratch()?;
        dirfile.add(Entry::multiply("a", "b", "data")?)?;
        let err = dirfile.add(Entry::phase("b", "a", 1)?);
        assert!(matches!(err, Err(DirfileError::Cycle { .. })));
        assert!(dirfile.entry("b").is_err());
        Ok(())
    }

    #[test]
    fn rename_policies_are_distinct() -> TestResult {
        let (tmp, mut dirfile) = scratch()?;
        let err = dirfile.rename("data", "raw", RenamePolicy::Fail);
        assert!(matches!(err, Err(DirfileError::Referenced { .. })));

        dirfile.rename("data", "raw", RenamePolicy::UpdateReferences)?;
        assert_eq!(dirfile.entry("late")?.inputs(), vec!["raw"]);
        assert_eq!(dirfile.meta_fields("raw"), vec!["raw/gain"]);
        assert!(tmp.path().join("raw").exists() && !tmp.path().join("data").exists());
        assert_eq!(dirfile.get_data::<u8>("late", SampleRange::samples(0, 2))?, vec![2, 3]);

        dirfile.rename("raw", "moved", RenamePolicy::Force)?;
        assert_eq!(dirfile.entry("late")?.inputs(), vec!["raw"]);
        assert!(matches!(dirfile.validate("late"), Err(DirfileError::FieldNotFound { .. })));
        Ok(())
    }

    #[test]
    fn delete_respects_references() -> TestResult {
        let (tmp, mut dirfile) = scratch()?;
        let err = dirfile.delete("data", DeleteOptions::default());
        assert!(matches!(err, Err(DirfileError::Referenced { .. })));
        dirfile.delete(
            "data",
            DeleteOptions {
                data: true,
                force: true,
            },
        )?;
        assert!(dirfile.entry("data/gain").is_err());
        assert!(!tmp.path().join("data").exists());
        Ok(())
    }

    #[test]
    fn alter_keeps_the_kind() -> TestResult {
        let (_tmp, mut dirfile) = scratch()?;
        dirfile.alter(
            "late",
            EntryParams::Phase {
                input: "data".into(),
                shift: 2,
            },
        )?;
        assert_eq!(dirfile.get_data::<u8>("late", SampleRange::samples(0, 1))?, vec![3]);
        let err = dirfile.alter("late", EntryParams::Index);
        assert!(matches!(err, Err(DirfileError::WrongKind { .. })));
        Ok(())
    }

    #[test]
    fn listings_filter_by_kind_and_visibility() -> TestResult {
        let (_tmp, mut dirfile) = scratch()?;
        dirfile.add(Entry::alias("other", "late")?)?;
        dirfile.hide("late")?;
        assert_eq!(dirfile.fields(), vec!["INDEX", "data", "other"]);
        let all = FieldFilter::new().include_hidden(true);
        assert_eq!(dirfile.field_count(&all), 4);
        assert_eq!(dirfile.field_list(&all.clone().without_aliases().vectors()), vec!["INDEX", "data", "late"]);
        assert_eq!(dirfile.field_list(&FieldFilter::new().kind(EntryKind::Raw)), vec!["data"]);
        assert_eq!(dirfile.aliases("late")?, vec!["other"]);
        assert_eq!(dirfile.alias_target("other")?, "late");
        assert_eq!(dirfile.entry_kind("other")?, EntryKind::Phase);
        assert!(dirfile.hidden("late")?);
        Ok(())
    }

    #[test]
    fn move_follows_the_target_scope() -> TestResult {
        let (tmp, mut dirfile) = scratch()?;
        let sub = dirfile.include("sub", 0, IncludeOptions::create().affixes("s_", ""))?;
        dirfile.move_field("data", sub, RenamePolicy::UpdateReferences)?;
        assert_eq!(dirfile.entry("s_data")?.fragment, sub);
        assert_eq!(dirfile.entry("s_data/gain")?.fragment, sub);
        assert!(tmp.path().join("s_data").exists());
        assert_eq!(dirfile.get_data::<u8>("late", SampleRange::samples(0, 1))?, vec![2]);

        dirfile.alter_protection(sub, Protection::Format)?;
        let err = dirfile.add(Entry::raw("x", ElementType::Uint8, 1)?.in_fragment(sub));
        assert!(matches!(err, Err(DirfileError::Protected { .. })));
        Ok(())
    }

    #[test]
    fn failed_move_leaves_the_field_in_place() -> TestResult {
        let (tmp, mut dirfile) = scratch()?;
        let sub = dirfile.include("sub", 0, IncludeOptions::create().affixes("s_", ""))?;
        dirfile.alter_encoding(sub, Encoding::Gzip, false)?;
        dirfile.register_codec(Arc::new(FullDiskCodec));

        assert!(dirfile.move_field("data", sub, RenamePolicy::UpdateReferences).is_err());
        assert_eq!(dirfile.entry("data")?.fragment, 0);
        assert!(dirfile.entry("s_data").is_err());
        assert!(tmp.path().join("data").exists());
        assert_eq!(dirfile.get_data::<u8>("data", SampleRange::samples(0, 3))?, vec![1, 2, 3]);
        assert!(staged_leftovers(tmp.path())?.is_empty());
        Ok(())
    }
}
