//! Opening a dirfile and moving metadata between memory and disk.
//!
//! Loading is staged: the whole fragment tree below a document is read and
//! checked before the handle changes, so a failing open or include leaves
//! nothing half-applied.

use std::{
    cell::RefCell,
    collections::HashSet,
    path::{Path, PathBuf},
};

use snafu::prelude::*;

use crate::{
    codec::CodecRegistry,
    config::OpenOptions,
    entry::{Entry, INDEX_FIELD},
    error::{DirfileError, DuplicateFieldSnafu, ErrorLog, RecursionLimitSnafu, Result},
    eval::MAX_RECURSION,
    fragment::{Fragment, ROOT_FORMAT, scope_of},
    namespace::FieldTable,
    schema::{FORMAT_VERSION, FragmentDocument, IncludeDirective},
    storage::{self, DirfileLocation},
    types::ByteOrder,
};

use super::Dirfile;

/// Fragments and entries read from disk but not yet part of a handle.
#[derive(Debug)]
pub(super) struct Staged {
    pub(super) fragments: Vec<Fragment>,
    pub(super) entries: Vec<Entry>,
}

/// Naming rules an include directive applies to its child.
#[derive(Debug, Clone, Default)]
pub(super) struct Placement {
    pub(super) namespace: String,
    pub(super) prefix: String,
    pub(super) suffix: String,
}

impl Staged {
    pub(super) fn new(fragments: Vec<Fragment>) -> Self {
        Self {
            fragments,
            entries: Vec::new(),
        }
    }

    /// Read the document `file` and everything it includes, depth first.
    pub(super) fn load(
        &mut self,
        location: &DirfileLocation,
        options: &OpenOptions,
        file: &Path,
        parent: Option<usize>,
        placement: Placement,
        depth: usize,
    ) -> Result<usize> {
        ensure!(
            depth <= MAX_RECURSION,
            RecursionLimitSnafu {
                name: file.display().to_string(),
                limit: MAX_RECURSION,
            }
        );
        let text = storage::read_to_string(location, file)?;
        let doc = FragmentDocument::parse(file, &text)?;

        let index = self.fragments.len();
        let mut fragment = Fragment::new(file, parent);
        fragment.byte_order = options.byte_order.unwrap_or(doc.byte_order);
        fragment.encoding = options.encoding.unwrap_or(doc.encoding);
        fragment.frame_offset = doc.frame_offset;
        fragment.protection = doc.protection;
        fragment.namespace = placement.namespace;
        fragment.prefix = placement.prefix;
        fragment.suffix = placement.suffix;
        fragment.on_disk = Some(text);
        self.fragments.push(fragment);

        let scope = scope_of(&self.fragments, index);
        self.fragments[index].reference = doc.reference.as_deref().map(|r| scope.qualify(r));
        for mut entry in doc.entries {
            entry.validate()?;
            entry.fragment = index;
            scope.qualify_entry(&mut entry);
            self.entries.push(entry);
        }
        tracing::debug!(
            target: "dirfile",
            fragment = index,
            file = %file.display(),
            includes = doc.includes.len(),
            "loaded fragment"
        );
        for include in doc.includes {
            let placement = Placement {
                namespace: include.namespace,
                prefix: include.prefix,
                suffix: include.suffix,
            };
            self.load(location, options, &include.file, Some(index), placement, depth + 1)?;
        }
        Ok(index)
    }

    /// Fail on a name defined twice, or already present in `fields`.
    pub(super) fn check_duplicates(&self, fields: &FieldTable) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            ensure!(
                entry.name != INDEX_FIELD && !fields.contains(&entry.name) && seen.insert(entry.name.as_str()),
                DuplicateFieldSnafu {
                    name: entry.name.clone()
                }
            );
        }
        Ok(())
    }
}

impl Dirfile {
    /// Open the dirfile in directory `path`.
    ///
    /// With [`OpenOptions::create`] a missing dirfile is created with an
    /// empty root fragment, written immediately.
    pub fn open(path: impl Into<PathBuf>, options: OpenOptions) -> Result<Dirfile> {
        let location = DirfileLocation::local(path);
        let result = Self::open_inner(location, options.clone());
        if let Err(err) = &result {
            ErrorLog::new(options.verbose, options.config.verbose_prefix.clone()).record(err);
        }
        result
    }

    fn open_inner(location: DirfileLocation, options: OpenOptions) -> Result<Dirfile> {
        let root = Path::new(ROOT_FORMAT);
        let exists = storage::exists(&location, root);
        if exists && options.exclusive {
            storage::ensure_absent(&location, root)?;
        }
        let fresh = options.create && (!exists || options.truncate);
        if options.truncate && location.root().exists() {
            storage::clear_dir(&location, options.truncate_subdirectories)?;
        }

        let mut dirfile = Dirfile {
            errors: ErrorLog::new(options.verbose, options.config.verbose_prefix.clone()),
            config: options.config.clone(),
            location,
            options,
            fragments: Vec::new(),
            fields: FieldTable::default(),
            codecs: CodecRegistry::default(),
            streams: RefCell::default(),
            tables: RefCell::default(),
            positions: RefCell::default(),
        };

        if fresh {
            storage::ensure_root(&dirfile.location)?;
            let mut fragment = Fragment::new(ROOT_FORMAT, None);
            fragment.byte_order = dirfile.options.byte_order.unwrap_or_else(ByteOrder::native);
            fragment.encoding = dirfile.options.encoding.unwrap_or_default();
            fragment.dirty = true;
            dirfile.fragments.push(fragment);
            dirfile.write_fragment(0)?;
            tracing::debug!(target: "dirfile", root = %dirfile.location.root().display(), "created dirfile");
        } else {
            dirfile.load_root()?;
            tracing::debug!(
                target: "dirfile",
                root = %dirfile.location.root().display(),
                fragments = dirfile.fragments.len(),
                "opened dirfile"
            );
        }
        Ok(dirfile)
    }

    /// Replace the in-memory metadata with the tree rooted at `format`.
    fn load_root(&mut self) -> Result<()> {
        let mut staged = Staged::new(Vec::new());
        staged.load(
            &self.location,
            &self.options,
            Path::new(ROOT_FORMAT),
            None,
            Placement::default(),
            0,
        )?;
        let mut fields = FieldTable::default();
        if !self.options.ignore_duplicates {
            staged.check_duplicates(&fields)?;
        }
        for entry in staged.entries {
            fields.insert(entry, true)?;
        }
        self.fragments = staged.fragments;
        self.fields = fields;
        self.tables.get_mut().clear();
        Ok(())
    }

    /// The document of fragment `index` as it should be on disk.
    fn document(&self, index: usize) -> Result<FragmentDocument> {
        let fragment = self.fragment_checked(index)?;
        let scope = scope_of(&self.fragments, index);
        let mut entries: Vec<Entry> = self
            .fields
            .iter()
            .filter(|e| e.fragment == index && e.name != INDEX_FIELD)
            .cloned()
            .map(|mut e| {
                scope.relativize_entry(&mut e);
                e
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        let includes = self
            .fragments
            .iter()
            .filter(|f| f.parent == Some(index))
            .map(|f| IncludeDirective {
                file: f.file.clone(),
                namespace: f.namespace.clone(),
                prefix: f.prefix.clone(),
                suffix: f.suffix.clone(),
            })
            .collect();
        Ok(FragmentDocument {
            version: FORMAT_VERSION,
            written_at: chrono::Utc::now(),
            byte_order: fragment.byte_order,
            encoding: fragment.encoding,
            frame_offset: fragment.frame_offset,
            protection: fragment.protection,
            reference: fragment.reference.as_deref().map(|r| scope.relativize(r)),
            includes,
            entries,
        })
    }

    pub(super) fn write_fragment(&mut self, index: usize) -> Result<()> {
        let mut doc = self.document(index)?;
        let file = self.fragments[index].file.clone();
        let text = doc.render(&file, self.options.pretty)?;
        storage::write_atomic(&self.location, &file, text.as_bytes())?;
        let fragment = &mut self.fragments[index];
        fragment.on_disk = Some(text);
        fragment.dirty = false;
        tracing::debug!(target: "dirfile", fragment = index, file = %file.display(), "wrote fragment");
        Ok(())
    }

    pub(super) fn metaflush_inner(&mut self) -> Result<()> {
        for index in 0..self.fragments.len() {
            if self.fragments[index].dirty {
                self.ensure_writable()?;
                self.write_fragment(index)?;
            }
        }
        Ok(())
    }

    /// Write every fragment with unsaved metadata changes.
    pub fn metaflush(&mut self) -> Result<()> {
        let result = self.metaflush_inner();
        self.track(result)
    }

    /// Write fragment `index`, or every fragment with `None`, whether or not
    /// it has changed.
    pub fn rewrite_fragment(&mut self, index: Option<usize>) -> Result<()> {
        let result = self.ensure_writable().and_then(|()| match index {
            Some(i) => {
                self.fragment_checked(i)?;
                self.write_fragment(i)
            }
            None => (0..self.fragments.len()).try_for_each(|i| self.write_fragment(i)),
        });
        self.track(result)
    }

    /// Whether any fragment document changed on disk since it was read or
    /// written. With `reload` set, a changed tree replaces the in-memory
    /// metadata; unsaved changes are lost.
    pub fn desync(&mut self, reload: bool) -> Result<bool> {
        let result = self.desync_inner(reload);
        self.track(result)
    }

    fn desync_inner(&mut self, reload: bool) -> Result<bool> {
        let mut changed = false;
        for fragment in &self.fragments {
            let current = match storage::read_to_string(&self.location, &fragment.file) {
                Ok(text) => Some(text),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(DirfileError::from(e)),
            };
            if current != fragment.on_disk {
                changed = true;
                break;
            }
        }
        if changed && reload {
            self.streams.get_mut().close_all()?;
            self.positions.get_mut().clear();
            self.load_root()?;
            tracing::debug!(target: "dirfile", fragments = self.fragments.len(), "reloaded metadata");
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        entry::EntryKind,
        fragment::{IncludeOptions, Protection},
        types::ElementType,
    };

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn create_writes_the_root_immediately() -> TestResult {
        let tmp = TempDir::new()?;
        let dirfile = Dirfile::open(tmp.path(), OpenOptions::new().create(true))?;
        assert!(tmp.path().join("format").exists());
        assert_eq!(dirfile.fragment_count(), 1);
        dirfile.close()?;

        let err = Dirfile::open(tmp.path(), OpenOptions::new().exclusive(true)).err();
        assert!(matches!(err, Some(DirfileError::Storage { .. })));
        Ok(())
    }

    #[test]
    fn missing_dirfiles_fail_without_create() -> TestResult {
        let tmp = TempDir::new()?;
        let err = Dirfile::open(tmp.path().join("nope"), OpenOptions::new()).err();
        assert!(matches!(err, Some(DirfileError::Storage { .. })));
        Ok(())
    }

    #[test]
    fn metadata_survives_a_reopen() -> TestResult {
        let tmp = TempDir::new()?;
        let mut dirfile = Dirfile::open(tmp.path(), OpenOptions::new().create(true))?;
        dirfile.add(Entry::raw("data", ElementType::Int16, 4)?)?;
        let child = dirfile.include("sub", 0, IncludeOptions::create().affixes("p_", ""))?;
        dirfile.add(Entry::phase("shifted", ".data", 1)?.in_fragment(child))?;
        dirfile.alter_protection(child, Protection::Format)?;
        dirfile.close()?;

        let dirfile = Dirfile::open(tmp.path(), OpenOptions::new())?;
        assert_eq!(dirfile.fragment_count(), 2);
        assert_eq!(dirfile.entry_kind("p_shifted")?, EntryKind::Phase);
        assert_eq!(dirfile.entry("p_shifted")?.fragment, 1);
        assert_eq!(dirfile.fragment(1)?.protection(), Protection::Format);
        assert_eq!(dirfile.fragment(1)?.prefix(), "p_");
        Ok(())
    }

    #[test]
    fn truncate_empties_the_directory() -> TestResult {
        let tmp = TempDir::new()?;
        let mut dirfile = Dirfile::open(tmp.path(), OpenOptions::new().create(true))?;
        dirfile.add(Entry::raw("data", ElementType::Uint8, 1)?)?;
        dirfile.close()?;
        std::fs::write(tmp.path().join("data"), [1u8, 2, 3])?;

        let dirfile = Dirfile::open(tmp.path(), OpenOptions::new().truncate(true))?;
        assert!(dirfile.entry("data").is_err());
        assert!(!tmp.path().join("data").exists());
        Ok(())
    }

    #[test]
    fn desync_notices_outside_edits() -> TestResult {
        let tmp = TempDir::new()?;
        let mut dirfile = Dirfile::open(tmp.path(), OpenOptions::new().create(true))?;
        assert!(!dirfile.desync(false)?);

        let mut other = Dirfile::open(tmp.path(), OpenOptions::new().write(true))?;
        other.add(Entry::raw("late", ElementType::Float64, 1)?)?;
        other.close()?;

        assert!(dirfile.desync(true)?);
        assert_eq!(dirfile.entry_kind("late")?, EntryKind::Raw);
        assert!(!dirfile.desync(false)?);
        Ok(())
    }

    #[test]
    fn duplicates_fail_unless_ignored() -> TestResult {
        let tmp = TempDir::new()?;
        let mut dirfile = Dirfile::open(tmp.path(), OpenOptions::new().create(true))?;
        dirfile.add(Entry::raw("data", ElementType::Uint8, 1)?)?;
        let sub = dirfile.include("sub", 0, IncludeOptions::create())?;
        dirfile.close()?;

        // define `data` again in the child document behind the handle's back
        let mut doc = FragmentDocument::empty();
        doc.entries.push(Entry::raw("data", ElementType::Int64, 2)?);
        let text = doc.render(Path::new("sub"), false)?;
        std::fs::write(tmp.path().join("sub"), text)?;
        assert_eq!(sub, 1);

        let err = Dirfile::open(tmp.path(), OpenOptions::new()).err();
        assert!(matches!(err, Some(DirfileError::DuplicateField { .. })));
        let dirfile = Dirfile::open(tmp.path(), OpenOptions::new().ignore_duplicates(true))?;
        assert_eq!(dirfile.entry("data")?.fragment, 1);
        Ok(())
    }
}
