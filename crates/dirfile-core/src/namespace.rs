//! Field-name qualification and the dirfile's name table.
//!
//! Fields are stored under their full name: the owning fragment's namespace,
//! then the field name wrapped in the fragment's prefix and suffix. For a
//! meta-field only the parent part is wrapped. A [`Scope`] turns bare names
//! written relative to a fragment into full names and back.
//!
//! A name starting with `.` is absolute: it bypasses the scope and names the
//! field in the root namespace. The implicit `INDEX` field is never
//! qualified.

use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
};

use snafu::prelude::*;

use crate::{
    entry::{Entry, EntryParams, INDEX_FIELD},
    error::{
        DanglingAliasSnafu, DuplicateFieldSnafu, FieldNotFoundSnafu, RecursionLimitSnafu, Result,
    },
    eval::MAX_RECURSION,
};

/// Naming rules of one fragment, inherited ones included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    /// Dotted namespace; empty for the root namespace.
    pub namespace: String,
    /// Prefix of every field name.
    pub prefix: String,
    /// Suffix of every field name.
    pub suffix: String,
}

impl Scope {
    /// A child scope inside this one.
    pub fn nest(&self, namespace: &str, prefix: &str, suffix: &str) -> Scope {
        Scope {
            namespace: join_namespace(&self.namespace, namespace),
            prefix: format!("{}{prefix}", self.prefix),
            suffix: format!("{suffix}{}", self.suffix),
        }
    }

    /// Whether names pass through unchanged.
    pub fn is_identity(&self) -> bool {
        self.namespace.is_empty() && self.prefix.is_empty() && self.suffix.is_empty()
    }

    /// Full name of `name` written relative to this scope.
    pub fn qualify(&self, name: &str) -> String {
        if name == INDEX_FIELD {
            return name.to_string();
        }
        if let Some(absolute) = name.strip_prefix('.') {
            return absolute.to_string();
        }
        let (parent, child) = split_meta(name);
        let (rel_ns, base) = match parent.rsplit_once('.') {
            Some((ns, base)) => (ns, base),
            None => ("", parent),
        };
        let namespace = join_namespace(&self.namespace, rel_ns);
        let mut out = String::new();
        if !namespace.is_empty() {
            out.push_str(&namespace);
            out.push('.');
        }
        out.push_str(&self.prefix);
        out.push_str(base);
        out.push_str(&self.suffix);
        if let Some(child) = child {
            out.push('/');
            out.push_str(child);
        }
        out
    }

    /// Name of the field `full` written relative to this scope.
    ///
    /// Falls back to the absolute `.name` form when `full` is outside the scope.
    pub fn relativize(&self, full: &str) -> String {
        if full == INDEX_FIELD {
            return full.to_string();
        }
        match self.strip(full) {
            Some(bare) if self.qualify(&bare) == full => bare,
            _ => format!(".{full}"),
        }
    }

    fn strip(&self, full: &str) -> Option<String> {
        let (parent, child) = split_meta(full);
        let rest = if self.namespace.is_empty() {
            parent
        } else {
            parent.strip_prefix(&self.namespace)?.strip_prefix('.')?
        };
        let (rel_ns, base) = match rest.rsplit_once('.') {
            Some((ns, base)) => (Some(ns), base),
            None => (None, rest),
        };
        let base = base.strip_prefix(&self.prefix)?.strip_suffix(&self.suffix)?;
        if base.is_empty() {
            return None;
        }
        let mut out = String::new();
        if let Some(ns) = rel_ns {
            out.push_str(ns);
            out.push('.');
        }
        out.push_str(base);
        if let Some(child) = child {
            out.push('/');
            out.push_str(child);
        }
        Some(out)
    }

    /// Qualify the name and every reference of `entry`.
    pub(crate) fn qualify_entry(&self, entry: &mut Entry) {
        if self.is_identity() && !has_absolute_refs(entry) {
            return;
        }
        entry.name = self.qualify(&entry.name);
        let refs: Vec<String> = entry.references().into_iter().map(str::to_string).collect();
        for r in refs {
            let full = self.qualify(&r);
            if full != r {
                entry.rename_references(&r, &full);
            }
        }
    }

    /// Inverse of [`Scope::qualify_entry`].
    pub(crate) fn relativize_entry(&self, entry: &mut Entry) {
        if self.is_identity() {
            return;
        }
        entry.name = self.relativize(&entry.name);
        let refs: Vec<String> = entry.references().into_iter().map(str::to_string).collect();
        for r in refs {
            let rel = self.relativize(&r);
            if rel != r {
                entry.rename_references(&r, &rel);
            }
        }
    }
}

fn has_absolute_refs(entry: &Entry) -> bool {
    entry.references().iter().any(|r| r.starts_with('.'))
}

fn join_namespace(outer: &str, inner: &str) -> String {
    match (outer.is_empty(), inner.is_empty()) {
        (_, true) => outer.to_string(),
        (true, false) => inner.to_string(),
        (false, false) => format!("{outer}.{inner}"),
    }
}

fn split_meta(name: &str) -> (&str, Option<&str>) {
    match name.split_once('/') {
        Some((parent, child)) => (parent, Some(child)),
        None => (name, None),
    }
}

/// Every defined field, keyed by full name.
///
/// Resolved alias chains are cached. A cached chain that no longer leads
/// anywhere is dropped and resolved again once before the lookup fails.
#[derive(Debug)]
pub(crate) struct FieldTable {
    entries: BTreeMap<String, Entry>,
    aliases: RefCell<HashMap<String, String>>,
}

impl Default for FieldTable {
    fn default() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(INDEX_FIELD.to_string(), Entry::index_field());
        Self {
            entries,
            aliases: RefCell::default(),
        }
    }
}

impl FieldTable {
    pub(crate) fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Entry> {
        self.aliases.get_mut().clear();
        self.entries.get_mut(name)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Add `entry`. An existing definition is an error unless `replace` is set.
    pub(crate) fn insert(&mut self, entry: Entry, replace: bool) -> Result<()> {
        ensure!(
            entry.name != INDEX_FIELD && (replace || !self.entries.contains_key(&entry.name)),
            DuplicateFieldSnafu {
                name: entry.name.clone()
            }
        );
        self.aliases.get_mut().clear();
        self.entries.insert(entry.name.clone(), entry);
        Ok(())
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Entry> {
        if name == INDEX_FIELD {
            return None;
        }
        self.aliases.get_mut().clear();
        self.entries.remove(name)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&Entry) -> bool) {
        self.aliases.get_mut().clear();
        self.entries.retain(|_, e| keep(e));
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut Entry> {
        self.aliases.get_mut().clear();
        self.entries.values_mut()
    }

    /// Look up `name`, following aliases to a concrete field.
    pub(crate) fn resolve(&self, name: &str) -> Result<&Entry> {
        let cached = self.aliases.borrow().get(name).cloned();
        if let Some(target) = cached {
            if let Some(entry) = self.entries.get(&target) {
                return Ok(entry);
            }
            self.aliases.borrow_mut().clear();
        }
        let entry = self.walk(name)?;
        if entry.name != name {
            self.aliases
                .borrow_mut()
                .insert(name.to_string(), entry.name.clone());
        }
        Ok(entry)
    }

    fn walk(&self, name: &str) -> Result<&Entry> {
        let mut entry = self
            .entries
            .get(name)
            .context(FieldNotFoundSnafu { name })?;
        for _ in 0..MAX_RECURSION {
            let EntryParams::Alias { target } = &entry.params else {
                return Ok(entry);
            };
            entry = self.entries.get(target).context(DanglingAliasSnafu {
                name: entry.name.clone(),
                target: target.clone(),
            })?;
        }
        RecursionLimitSnafu {
            name,
            limit: MAX_RECURSION,
        }
        .fail()
    }

    /// Fields other than `name` that refer to `name`.
    pub(crate) fn referrers<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Entry> + 'a {
        self.entries
            .values()
            .filter(move |e| e.name != name && e.references().contains(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::DirfileError, types::ElementType};

    fn scope() -> Scope {
        Scope::default().nest("ns", "A_", "_Z")
    }

    #[test]
    fn qualify_wraps_names_and_meta_parents() {
        let s = scope();
        assert_eq!(s.qualify("x"), "ns.A_x_Z");
        assert_eq!(s.qualify("x/meta"), "ns.A_x_Z/meta");
        assert_eq!(s.qualify("sub.x"), "ns.sub.A_x_Z");
        assert_eq!(s.qualify(".root"), "root");
        assert_eq!(s.qualify("INDEX"), "INDEX");
        assert_eq!(Scope::default().qualify("x"), "x");
    }

    #[test]
    fn relativize_inverts_qualify() {
        let s = scope();
        for bare in ["x", "x/meta", "sub.x"] {
            assert_eq!(s.relativize(&s.qualify(bare)), bare);
        }
        assert_eq!(s.relativize("data"), ".data");
        assert_eq!(s.relativize("ns.x"), ".ns.x");
    }

    #[test]
    fn entries_are_qualified_with_their_references() -> Result<(), Box<dyn std::error::Error>> {
        let s = scope();
        let mut e = Entry::multiply("prod", "a", ".data")?;
        s.qualify_entry(&mut e);
        assert_eq!(e.name, "ns.A_prod_Z");
        assert_eq!(e.inputs(), vec!["ns.A_a_Z", "data"]);
        s.relativize_entry(&mut e);
        assert_eq!(e.name, "prod");
        assert_eq!(e.inputs(), vec!["a", ".data"]);
        Ok(())
    }

    #[test]
    fn duplicates_are_rejected_unless_replacing() -> Result<(), Box<dyn std::error::Error>> {
        let mut table = FieldTable::default();
        table.insert(Entry::raw("a", ElementType::Int8, 1)?, false)?;
        let err = table.insert(Entry::raw("a", ElementType::Int16, 1)?, false).unwrap_err();
        assert!(matches!(err, DirfileError::DuplicateField { .. }));
        table.insert(Entry::raw("a", ElementType::Int16, 1)?, true)?;
        assert!(matches!(
            table.get("a").map(|e| &e.params),
            Some(EntryParams::Raw {
                data_type: ElementType::Int16,
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn aliases_resolve_and_dangle() -> Result<(), Box<dyn std::error::Error>> {
        let mut table = FieldTable::default();
        table.insert(Entry::raw("data", ElementType::Int8, 8)?, false)?;
        table.insert(Entry::alias("a1", "data")?, false)?;
        table.insert(Entry::alias("a2", "a1")?, false)?;
        assert_eq!(table.resolve("a2")?.name, "data");
        assert_eq!(table.resolve("a2")?.name, "data");

        table.remove("data");
        assert!(matches!(
            table.resolve("a2"),
            Err(DirfileError::DanglingAlias { .. })
        ));

        table.insert(Entry::alias("loop", "loop")?, false)?;
        assert!(matches!(
            table.resolve("loop"),
            Err(DirfileError::RecursionLimit { .. })
        ));
        Ok(())
    }
}
