//! Persisted fragment documents.
//!
//! Each fragment is stored as one JSON document. Field names inside a
//! document are written relative to the fragment's naming scope, so a
//! document can be included under a different namespace or affixes without
//! being rewritten. Include directives record the child documents together
//! with the naming rules they were included with.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::{
    codec::Encoding,
    entry::Entry,
    fragment::Protection,
    types::ByteOrder,
};

/// Version written into every document.
pub const FORMAT_VERSION: u32 = 1;

/// Errors reading or writing a fragment document.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SchemaError {
    /// The document is not valid JSON for a fragment.
    #[snafu(display("failed to parse fragment document {path}: {source}"))]
    Parse {
        /// Document file.
        path: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The document could not be serialized.
    #[snafu(display("failed to serialize fragment document {path}: {source}"))]
    Serialize {
        /// Document file.
        path: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The document was written by a newer format version.
    #[snafu(display("fragment document {path} has unsupported version {version}"))]
    UnsupportedVersion {
        /// Document file.
        path: String,
        /// Version found.
        version: u32,
    },
}

/// An include directive inside a fragment document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeDirective {
    /// Child document, relative to the dirfile directory.
    pub file: PathBuf,
    /// Child namespace, relative to the including fragment's.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Child prefix.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prefix: String,
    /// Child suffix.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub suffix: String,
}

/// The persisted form of one fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentDocument {
    /// Format version.
    pub version: u32,
    /// When the document was written.
    pub written_at: DateTime<Utc>,
    /// Byte order of the fragment's raw files.
    #[serde(default)]
    pub byte_order: ByteOrder,
    /// Encoding of the fragment's raw files.
    #[serde(default)]
    pub encoding: Encoding,
    /// Frames preceding frame 0 of each raw file.
    #[serde(default)]
    pub frame_offset: u64,
    /// Protection level.
    #[serde(default)]
    pub protection: Protection,
    /// Reference field, relative to the fragment's scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Child fragments, in inclusion order.
    #[serde(default)]
    pub includes: Vec<IncludeDirective>,
    /// Field definitions, with scope-relative names.
    #[serde(default)]
    pub entries: Vec<Entry>,
}

impl FragmentDocument {
    /// An empty document with native byte order and no encoding.
    pub fn empty() -> Self {
        Self {
            version: FORMAT_VERSION,
            written_at: Utc::now(),
            byte_order: ByteOrder::native(),
            encoding: Encoding::None,
            frame_offset: 0,
            protection: Protection::None,
            reference: None,
            includes: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Parse the text of the document stored at `path`.
    pub fn parse(path: &Path, text: &str) -> Result<Self, SchemaError> {
        let path_str = path.display().to_string();
        let doc: FragmentDocument = serde_json::from_str(text).context(ParseSnafu { path: &path_str })?;
        ensure!(
            doc.version <= FORMAT_VERSION,
            UnsupportedVersionSnafu {
                path: path_str,
                version: doc.version
            }
        );
        Ok(doc)
    }

    /// Render the document, stamping the current time.
    pub fn render(&mut self, path: &Path, pretty: bool) -> Result<String, SchemaError> {
        self.written_at = Utc::now();
        let result = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        result.context(SerializeSnafu {
            path: path.display().to_string(),
        })
    }
}
