//! Schema fragments.
//!
//! A fragment is one schema document of a dirfile. Fragment 0 is the root
//! document, `format`; every other fragment was included by a parent and
//! may give the fields it defines a namespace and a name prefix and suffix.
//! Those naming rules are inherited: a child's fields carry the child's
//! affixes inside its parent's, and live in the child's namespace nested
//! under the parent's.

use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    codec::Encoding,
    error::Guarded,
    namespace::Scope,
    types::ByteOrder,
};

/// File name of the root fragment.
pub const ROOT_FORMAT: &str = "format";

/// Edits a fragment refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protection {
    /// Everything may be edited.
    #[default]
    None,
    /// Field definitions and fragment attributes are frozen.
    Format,
    /// Raw sample data is frozen.
    Data,
    /// Both.
    All,
}

impl Protection {
    /// Whether metadata edits are refused.
    pub fn protects_format(self) -> bool {
        matches!(self, Protection::Format | Protection::All)
    }

    /// Whether sample edits are refused.
    pub fn protects_data(self) -> bool {
        matches!(self, Protection::Data | Protection::All)
    }

    /// Whether `guard` is in force.
    pub fn protects(self, guard: Guarded) -> bool {
        match guard {
            Guarded::Format => self.protects_format(),
            Guarded::Data => self.protects_data(),
        }
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protection::None => "none",
            Protection::Format => "format",
            Protection::Data => "data",
            Protection::All => "all",
        })
    }
}

/// Options for including a fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeOptions {
    /// Create the fragment document if it does not exist.
    pub create: bool,
    /// Fail if the fragment document already exists.
    pub exclusive: bool,
    /// Namespace of the fragment's fields, relative to its parent's.
    pub namespace: Option<String>,
    /// Prefix of the fragment's field names.
    pub prefix: Option<String>,
    /// Suffix of the fragment's field names.
    pub suffix: Option<String>,
}

impl IncludeOptions {
    /// Create the document if missing.
    pub fn create() -> Self {
        Self {
            create: true,
            ..Self::default()
        }
    }

    /// Set the namespace.
    pub fn namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = Some(ns.into());
        self
    }

    /// Set the prefix and suffix.
    pub fn affixes(mut self, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self.suffix = Some(suffix.into());
        self
    }
}

/// One schema document and its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// File name, relative to the dirfile directory.
    pub(crate) file: PathBuf,
    /// Index of the including fragment; `None` for the root.
    pub(crate) parent: Option<usize>,
    pub(crate) byte_order: ByteOrder,
    pub(crate) encoding: Encoding,
    pub(crate) frame_offset: u64,
    pub(crate) protection: Protection,
    /// Namespace relative to the parent's.
    pub(crate) namespace: String,
    /// Prefix inside the parent's prefix.
    pub(crate) prefix: String,
    /// Suffix inside the parent's suffix.
    pub(crate) suffix: String,
    /// Reference field declared by this fragment.
    pub(crate) reference: Option<String>,
    /// Metadata changed since the document was last written.
    pub(crate) dirty: bool,
    /// Document text as last read or written.
    pub(crate) on_disk: Option<String>,
}

impl Fragment {
    pub(crate) fn new(file: impl Into<PathBuf>, parent: Option<usize>) -> Self {
        Self {
            file: file.into(),
            parent,
            byte_order: ByteOrder::native(),
            encoding: Encoding::None,
            frame_offset: 0,
            protection: Protection::None,
            namespace: String::new(),
            prefix: String::new(),
            suffix: String::new(),
            reference: None,
            dirty: false,
            on_disk: None,
        }
    }

    /// The document's file name.
    pub fn file(&self) -> &std::path::Path {
        &self.file
    }

    /// Index of the including fragment.
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Byte order of the raw fields defined here.
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Encoding of the raw fields defined here.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Frames of every raw field here that precede frame 0.
    pub fn frame_offset(&self) -> u64 {
        self.frame_offset
    }

    /// Protection level.
    pub fn protection(&self) -> Protection {
        self.protection
    }

    /// Namespace relative to the including fragment.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Own prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Own suffix.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Whether unsaved metadata changes exist.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// Naming scope of fragment `index`, combining its ancestors' rules.
pub(crate) fn scope_of(fragments: &[Fragment], index: usize) -> Scope {
    let mut chain = Vec::new();
    let mut at = Some(index);
    while let Some(i) = at {
        let Some(frag) = fragments.get(i) else { break };
        chain.push(frag);
        at = frag.parent;
    }
    let mut scope = Scope::default();
    for frag in chain.into_iter().rev() {
        scope = scope.nest(&frag.namespace, &frag.prefix, &frag.suffix);
    }
    scope
}

/// Indices of `index` and every fragment included beneath it.
pub(crate) fn descendants(fragments: &[Fragment], index: usize) -> Vec<usize> {
    let mut out = vec![index];
    let mut i = 0;
    while i < out.len() {
        let parent = out[i];
        out.extend(
            fragments
                .iter()
                .enumerate()
                .filter(|(_, f)| f.parent == Some(parent))
                .map(|(j, _)| j),
        );
        i += 1;
    }
    out
}
