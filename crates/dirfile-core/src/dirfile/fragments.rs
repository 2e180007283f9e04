//! Including, removing and editing fragments.

use std::{
    collections::{BTreeMap, HashSet},
    path::{Path, PathBuf},
};

use snafu::prelude::*;

use crate::{
    codec::{Encoding, raw_file_name},
    entry::{EntryParams, INDEX_FIELD},
    error::{DomainSnafu, DuplicateFieldSnafu, Guarded, Result, TypeSnafu, WrongKindSnafu},
    eval::{series::Series, streams::RawTarget},
    fragment::{Fragment, IncludeOptions, Protection, descendants, scope_of},
    namespace::Scope,
    schema::FragmentDocument,
    storage,
    types::ByteOrder,
};

use super::{
    Dirfile,
    load::{Placement, Staged},
};

/// Raw data recoding applied while a fragment attribute changes.
enum Recode {
    ByteOrder(ByteOrder),
    Encoding(Encoding),
    FrameOffset(u64),
}

impl Dirfile {
    /// Include the document `file` below fragment `parent`, returning the
    /// index of the new fragment. Fragments it includes are loaded too.
    pub fn include(&mut self, file: impl Into<PathBuf>, parent: usize, options: IncludeOptions) -> Result<usize> {
        let result = self.include_inner(file.into(), parent, options);
        self.track(result)
    }

    fn include_inner(&mut self, file: PathBuf, parent: usize, options: IncludeOptions) -> Result<usize> {
        self.ensure_unprotected(parent, Guarded::Format)?;
        ensure!(
            !self.fragments.iter().any(|f| f.file == file),
            DomainSnafu {
                name: file.display().to_string(),
                reason: "fragment is already included",
            }
        );
        if options.exclusive {
            storage::ensure_absent(&self.location, &file)?;
        }
        if !storage::exists(&self.location, &file) && options.create {
            let mut doc = FragmentDocument::empty();
            doc.byte_order = self.options.byte_order.unwrap_or(doc.byte_order);
            doc.encoding = self.options.encoding.unwrap_or(doc.encoding);
            let text = doc.render(&file, self.options.pretty)?;
            storage::write_new(&self.location, &file, text.as_bytes())?;
        }

        let mut staged = Staged::new(self.fragments.clone());
        let placement = Placement {
            namespace: options.namespace.unwrap_or_default(),
            prefix: options.prefix.unwrap_or_default(),
            suffix: options.suffix.unwrap_or_default(),
        };
        let depth = self.depth_of(parent) + 1;
        let index = staged.load(&self.location, &self.options, &file, Some(parent), placement, depth)?;
        if !self.options.ignore_duplicates {
            staged.check_duplicates(&self.fields)?;
        }
        for entry in staged.entries {
            self.fields.insert(entry, true)?;
        }
        self.fragments = staged.fragments;
        self.mark_dirty(parent);
        tracing::debug!(target: "dirfile", fragment = index, parent, file = %file.display(), "included fragment");
        Ok(index)
    }

    fn depth_of(&self, index: usize) -> usize {
        let mut depth = 0;
        let mut at = self.fragments.get(index).and_then(|f| f.parent);
        while let Some(i) = at {
            depth += 1;
            at = self.fragments.get(i).and_then(|f| f.parent);
        }
        depth
    }

    /// Remove fragment `index`, every fragment included beneath it, and the
    /// fields they define. With `delete` the documents are removed from disk.
    ///
    /// Later fragments are renumbered to close the gap.
    pub fn uninclude(&mut self, index: usize, delete: bool) -> Result<()> {
        let result = self.uninclude_inner(index, delete);
        self.track(result)
    }

    fn uninclude_inner(&mut self, index: usize, delete: bool) -> Result<()> {
        ensure!(
            index != 0,
            DomainSnafu {
                name: "format",
                reason: "the root fragment cannot be unincluded",
            }
        );
        let parent = self.fragment_checked(index)?.parent.unwrap_or(0);
        self.ensure_unprotected(parent, Guarded::Format)?;

        let removed: HashSet<usize> = descendants(&self.fragments, index).into_iter().collect();
        let doomed: Vec<String> = self
            .fields
            .iter()
            .filter(|e| removed.contains(&e.fragment))
            .map(|e| e.name.clone())
            .collect();
        {
            let streams = self.streams.get_mut();
            for name in &doomed {
                streams.close(name)?;
                self.positions.get_mut().remove(name);
            }
        }
        if delete {
            for &i in &removed {
                storage::remove_file(&self.location, &self.fragments[i].file)?;
            }
        }
        self.fields.retain(|e| !removed.contains(&e.fragment));

        let mut renumber = vec![None; self.fragments.len()];
        let mut next = 0;
        for (old, slot) in renumber.iter_mut().enumerate() {
            if !removed.contains(&old) {
                *slot = Some(next);
                next += 1;
            }
        }
        let fragments = std::mem::take(&mut self.fragments);
        self.fragments = fragments
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !removed.contains(i))
            .map(|(_, mut f)| {
                f.parent = f.parent.and_then(|p| renumber[p]);
                f
            })
            .collect();
        for entry in self.fields.values_mut() {
            if let Some(new) = renumber.get(entry.fragment).copied().flatten() {
                entry.fragment = new;
            }
        }
        let parent = renumber[parent].unwrap_or(0);
        self.mark_dirty(parent);
        tracing::debug!(
            target: "dirfile",
            fragment = index,
            removed = removed.len(),
            fields = doomed.len(),
            delete,
            "unincluded fragment"
        );
        Ok(())
    }

    /// Change the byte order of fragment `index`. With `recode` the existing
    /// raw files are rewritten in the new order; otherwise they are
    /// reinterpreted.
    pub fn alter_byte_order(&mut self, index: usize, order: ByteOrder, recode: bool) -> Result<()> {
        let result = self.alter_attribute(index, Recode::ByteOrder(order), recode);
        self.track(result)
    }

    /// Change the encoding of fragment `index`, optionally recoding its raw files.
    pub fn alter_encoding(&mut self, index: usize, encoding: Encoding, recode: bool) -> Result<()> {
        let result = self.alter_attribute(index, Recode::Encoding(encoding), recode);
        self.track(result)
    }

    /// Change the frame offset of fragment `index`. With `recode` the raw
    /// files are padded or trimmed so every sample keeps its frame number.
    pub fn alter_frame_offset(&mut self, index: usize, offset: u64, recode: bool) -> Result<()> {
        let result = self.alter_attribute(index, Recode::FrameOffset(offset), recode);
        self.track(result)
    }

    fn alter_attribute(&mut self, index: usize, change: Recode, recode: bool) -> Result<()> {
        self.ensure_unprotected(index, Guarded::Format)?;
        if recode {
            self.ensure_unprotected(index, Guarded::Data)?;
        }
        let old = self.fragments[index].clone();
        let mut new = old.clone();
        match change {
            Recode::ByteOrder(order) => new.byte_order = order,
            Recode::Encoding(encoding) => new.encoding = encoding,
            Recode::FrameOffset(offset) => new.frame_offset = offset,
        }
        let raws: Vec<_> = self
            .fields
            .iter()
            .filter(|e| e.fragment == index)
            .filter_map(|e| match &e.params {
                EntryParams::Raw { data_type, spf } => Some((e.name.clone(), *data_type, *spf)),
                _ => None,
            })
            .collect();
        let streams = self.streams.get_mut();
        for (name, _, _) in &raws {
            streams.close(name)?;
        }
        if recode {
            let shift = old.frame_offset as i64 - new.frame_offset as i64;
            let mut staged = Vec::with_capacity(raws.len());
            for (name, data_type, spf) in &raws {
                let from = RawTarget {
                    name,
                    data_type: *data_type,
                    fragment: &old,
                };
                let to = RawTarget { fragment: &new, ..from };
                let step = streams
                    .read_all(&from, &self.location, &self.codecs)
                    .and_then(|samples| {
                        if shift == 0 {
                            return Ok(samples);
                        }
                        shift_samples(&samples, shift * i64::from(*spf)).context(TypeSnafu { name: name.as_str() })
                    })
                    .and_then(|samples| streams.stage(&to, &samples, &self.location, &self.codecs));
                match step {
                    Ok(file) => staged.push(file),
                    Err(e) => {
                        for file in &staged {
                            file.abandon(&self.location);
                        }
                        return Err(e);
                    }
                }
            }
            for file in staged {
                file.commit(&self.location)?;
            }
            for (name, data_type, _) in &raws {
                let from = RawTarget {
                    name,
                    data_type: *data_type,
                    fragment: &old,
                };
                let to = RawTarget { fragment: &new, ..from };
                if from.file_name() != to.file_name() {
                    storage::remove_file(&self.location, Path::new(&from.file_name()))?;
                }
            }
        }
        tracing::debug!(target: "dirfile", fragment = index, recode, raw_fields = raws.len(), "altered fragment");
        self.fragments[index] = new;
        self.mark_dirty(index);
        Ok(())
    }

    /// Change the protection of fragment `index`. Always permitted on a
    /// writable dirfile.
    pub fn alter_protection(&mut self, index: usize, protection: Protection) -> Result<()> {
        let result = self.ensure_writable().and_then(|()| {
            self.fragment_checked(index)?;
            self.fragments[index].protection = protection;
            self.mark_dirty(index);
            Ok(())
        });
        self.track(result)
    }

    /// Change the prefix and suffix of fragment `index`, renaming every
    /// field it and its descendants define.
    pub fn alter_affixes(&mut self, index: usize, prefix: &str, suffix: &str) -> Result<()> {
        let result = if index == 0 {
            DomainSnafu {
                name: "format",
                reason: "the root fragment has no affixes",
            }
            .fail()
        } else {
            let (prefix, suffix) = (prefix.to_string(), suffix.to_string());
            self.rescope(index, move |f| {
                f.prefix = prefix;
                f.suffix = suffix;
            })
        };
        self.track(result)
    }

    /// Change the namespace of fragment `index`, renaming its fields.
    pub fn alter_namespace(&mut self, index: usize, namespace: &str) -> Result<()> {
        let namespace = namespace.trim_matches('.').to_string();
        let result = self.rescope(index, move |f| f.namespace = namespace);
        self.track(result)
    }

    /// Apply `change` to fragment `index` and move every field in its
    /// subtree to the name the new scope gives it.
    fn rescope(&mut self, index: usize, change: impl FnOnce(&mut Fragment)) -> Result<()> {
        self.ensure_unprotected(index, Guarded::Format)?;
        let subtree = descendants(&self.fragments, index);
        let old_scopes: Vec<Scope> = subtree.iter().map(|&i| scope_of(&self.fragments, i)).collect();
        let mut fragments = self.fragments.clone();
        change(&mut fragments[index]);
        let mut renames = BTreeMap::new();
        for (k, &i) in subtree.iter().enumerate() {
            let new_scope = scope_of(&fragments, i);
            for entry in self.fields.iter().filter(|e| e.fragment == i && e.name != INDEX_FIELD) {
                let renamed = new_scope.qualify(&old_scopes[k].relativize(&entry.name));
                if renamed != entry.name {
                    renames.insert(entry.name.clone(), renamed);
                }
            }
        }
        for new in renames.values() {
            ensure!(
                !self.fields.contains(new) || renames.contains_key(new),
                DuplicateFieldSnafu { name: new.clone() }
            );
        }
        self.apply_renames(&renames, true)?;
        self.fragments[index] = fragments.swap_remove(index);
        self.mark_dirty(index);
        if let Some(parent) = self.fragments[index].parent {
            self.mark_dirty(parent);
        }
        Ok(())
    }

    /// The reference field: the first one declared, searching from the
    /// root, or else the first raw field of the earliest fragment.
    pub fn reference(&self) -> Option<String> {
        if let Some(name) = self.fragments.iter().find_map(|f| f.reference.clone()) {
            return Some(name);
        }
        self.fields
            .iter()
            .filter(|e| matches!(e.params, EntryParams::Raw { .. }))
            .min_by(|a, b| a.fragment.cmp(&b.fragment).then_with(|| a.name.cmp(&b.name)))
            .map(|e| e.name.clone())
    }

    /// Make raw field `name` the reference field.
    pub fn set_reference(&mut self, name: &str) -> Result<()> {
        let result = self.set_reference_inner(name);
        self.track(result)
    }

    fn set_reference_inner(&mut self, name: &str) -> Result<()> {
        let entry = self.fields.resolve(name)?;
        ensure!(
            matches!(entry.params, EntryParams::Raw { .. }),
            WrongKindSnafu {
                name,
                kind: entry.kind(),
                expected: "RAW",
            }
        );
        let (target, owner) = (entry.name.clone(), entry.fragment);
        self.ensure_unprotected(owner, Guarded::Format)?;
        for i in 0..self.fragments.len() {
            if self.fragments[i].reference.is_some() && i != owner {
                self.ensure_unprotected(i, Guarded::Format)?;
                self.fragments[i].reference = None;
                self.mark_dirty(i);
            }
        }
        self.fragments[owner].reference = Some(target);
        self.mark_dirty(owner);
        Ok(())
    }

    /// File name of fragment `index`'s raw field `name`.
    pub(super) fn raw_file(&self, name: &str, fragment: usize) -> Result<PathBuf> {
        let fragment = self.fragment_checked(fragment)?;
        Ok(PathBuf::from(raw_file_name(name, fragment.encoding)))
    }
}

/// Samples moved later by `shift` (zero-padded at the front) or earlier
/// (leading samples dropped).
fn shift_samples(samples: &crate::types::Samples, shift: i64) -> std::result::Result<crate::types::Samples, crate::types::TypeError> {
    let ty = samples.element_type();
    let series = Series::from_samples(samples);
    let shifted = if shift >= 0 {
        let mut out = Series::zeros(ty, shift as usize);
        out.append(&series);
        out
    } else {
        let skip = (-shift) as usize;
        series.pick(skip.min(series.len())..series.len())
    };
    shifted.to_samples(ty)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        config::OpenOptions,
        entry::Entry,
        error::DirfileError,
        io::SampleRange,
        types::ElementType,
    };

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    use std::sync::Arc;

    use crate::dirfile::test_util::{FullDiskCodec, staged_leftovers};

    fn scratch() -> Result<(TempDir, Dirfile), Box<dyn std::error::Error>> {
        let tmp = TempDir::new()?;
        let mut dirfile = Dirfile::open(tmp.path(), OpenOptions::new().create(true))?;
        dirfile.add(Entry::raw("data", ElementType::Int16, 2)?)?;
        dirfile.put_data("data", SampleRange::frames(0, 2), &[1i16, 2, 3, 4])?;
        Ok((tmp, dirfile))
    }

    #[test]
    fn uninclude_renumbers_and_drops_children() -> TestResult {
        let (tmp, mut dirfile) = scratch()?;
        let a = dirfile.include("a", 0, IncludeOptions::create())?;
        let b = dirfile.include("b", a, IncludeOptions::create())?;
        let c = dirfile.include("c", 0, IncludeOptions::create())?;
        assert_eq!((a, b, c), (1, 2, 3));
        dirfile.add(Entry::raw("in_b", ElementType::Uint8, 1)?.in_fragment(b))?;
        dirfile.add(Entry::raw("in_c", ElementType::Uint8, 1)?.in_fragment(c))?;

        dirfile.uninclude(a, true)?;
        assert_eq!(dirfile.fragment_count(), 2);
        assert!(dirfile.entry("in_b").is_err());
        assert_eq!(dirfile.entry("in_c")?.fragment, 1);
        assert_eq!(dirfile.fragment(1)?.file(), Path::new("c"));
        assert!(!tmp.path().join("a").exists() && !tmp.path().join("b").exists());
        assert!(matches!(dirfile.uninclude(0, false), Err(DirfileError::Domain { .. })));
        Ok(())
    }

    #[test]
    fn protected_fragments_keep_their_offset() -> TestResult {
        let (_tmp, mut dirfile) = scratch()?;
        dirfile.alter_protection(0, Protection::Format)?;
        let err = dirfile.alter_frame_offset(0, 3, false);
        assert!(matches!(err, Err(DirfileError::Protected { guard: Guarded::Format, .. })));
        assert_eq!(dirfile.fragment(0)?.frame_offset(), 0);
        assert!(dirfile.error_count() >= 1);
        Ok(())
    }

    #[test]
    fn recoding_keeps_frame_numbers() -> TestResult {
        let (tmp, mut dirfile) = scratch()?;
        dirfile.alter_frame_offset(0, 1, true)?;
        assert_eq!(dirfile.bof("data")?, 2);
        assert_eq!(dirfile.get_data::<i16>("data", SampleRange::frames(0, 2))?, vec![0, 0, 3, 4]);
        assert_eq!(std::fs::metadata(tmp.path().join("data"))?.len(), 4);

        dirfile.alter_frame_offset(0, 0, false)?;
        assert_eq!(dirfile.get_data::<i16>("data", SampleRange::frames(0, 1))?, vec![3, 4]);

        dirfile.alter_byte_order(0, ByteOrder::non_native(), true)?;
        assert_eq!(dirfile.get_data::<i16>("data", SampleRange::frames(0, 1))?, vec![3, 4]);
        dirfile.alter_byte_order(0, ByteOrder::native(), false)?;
        assert_eq!(dirfile.get_data::<i16>("data", SampleRange::samples(0, 1))?, vec![3i16.swap_bytes()]);
        Ok(())
    }

    #[test]
    fn affixes_and_namespaces_rename_fields() -> TestResult {
        let (tmp, mut dirfile) = scratch()?;
        let sub = dirfile.include("sub", 0, IncludeOptions::create())?;
        dirfile.add(Entry::raw("x", ElementType::Uint8, 1)?.in_fragment(sub))?;
        dirfile.add(Entry::phase("y", "x", 0)?.in_fragment(sub))?;
        dirfile.put_data("x", SampleRange::samples(0, 2), &[5u8, 6])?;
        dirfile.add(Entry::phase("watch", "x", 0)?)?;

        dirfile.alter_affixes(sub, "pre_", "_post")?;
        assert_eq!(dirfile.entry("pre_y_post")?.inputs(), vec!["pre_x_post"]);
        assert_eq!(dirfile.entry("watch")?.inputs(), vec!["pre_x_post"]);
        assert!(tmp.path().join("pre_x_post").exists());

        dirfile.alter_namespace(sub, "ns")?;
        assert_eq!(dirfile.get_data::<u8>("ns.pre_y_post", SampleRange::samples(0, 2))?, vec![5, 6]);
        Ok(())
    }

    #[test]
    fn reference_defaults_to_the_first_raw_field() -> TestResult {
        let (_tmp, mut dirfile) = scratch()?;
        dirfile.add(Entry::raw("aaa", ElementType::Uint8, 1)?)?;
        assert_eq!(dirfile.reference().as_deref(), Some("aaa"));
        dirfile.set_reference("data")?;
        assert_eq!(dirfile.reference().as_deref(), Some("data"));
        assert_eq!(dirfile.nframes()?, 2);
        dirfile.add(Entry::phase("p", "data", 1)?)?;
        assert!(matches!(dirfile.set_reference("p"), Err(DirfileError::WrongKind { .. })));
        Ok(())
    }

    #[test]
    fn failed_recode_keeps_raw_data_and_attributes() -> TestResult {
        let (tmp, mut dirfile) = scratch()?;
        dirfile.add(Entry::raw("more", ElementType::Uint8, 1)?)?;
        dirfile.put_data("more", SampleRange::samples(0, 3), &[7u8, 8, 9])?;

        let err = dirfile.alter_encoding(0, Encoding::Gzip, true);
        assert!(matches!(err, Err(DirfileError::UnsupportedEncoding { .. })));
        assert_eq!(dirfile.fragment(0)?.encoding(), Encoding::None);
        assert!(tmp.path().join("data").exists());
        assert_eq!(dirfile.get_data::<i16>("data", SampleRange::frames(0, 2))?, vec![1, 2, 3, 4]);

        dirfile.register_codec(Arc::new(FullDiskCodec));
        let err = dirfile.alter_encoding(0, Encoding::Gzip, true);
        assert!(matches!(err, Err(DirfileError::Storage { .. })));
        assert_eq!(dirfile.fragment(0)?.encoding(), Encoding::None);
        assert_eq!(dirfile.get_data::<i16>("data", SampleRange::frames(0, 2))?, vec![1, 2, 3, 4]);
        assert_eq!(dirfile.get_data::<u8>("more", SampleRange::samples(0, 3))?, vec![7, 8, 9]);
        assert!(staged_leftovers(tmp.path())?.is_empty());
        Ok(())
    }
}
