//! File manifests embedded in generated documents.
//!
//! The wire format is a single sentinel-delimited block whose body is JSON:
//!
//! ```text
//! <file_manifest>
//! {"files": {"src/App.tsx": {"dependsOn": ["./components/Button"]}}}
//! </file_manifest>
//! ```

mod extract;
mod validation;

pub use extract::{extract_manifest, DEFAULT_CLOSE_TAG, DEFAULT_OPEN_TAG};
pub(crate) use extract::strip_fence;
pub use validation::{invalid_paths, is_valid_path, validate_paths};

use crate::errors::ManifestError;
use crate::schema::normalize_path;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One file declared by a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileManifestEntry {
    /// Project-root-relative path of the file.
    pub path: String,
    /// Dependency specifiers, relative to the entry's own directory.
    pub depends_on: Vec<String>,
}

impl FileManifestEntry {
    /// Creates an entry.
    pub fn new<I, S>(path: impl Into<String>, depends_on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into(),
            depends_on: depends_on.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the path in canonical form.
    ///
    /// `./src/App.tsx` and `src/x/../App.tsx` both become `src/App.tsx`.
    /// Returns `None` when `..` climbs above the project root.
    #[must_use]
    pub fn canonical_path(&self) -> Option<String> {
        normalize_path(&self.path)
    }
}

/// An ordered set of manifest entries, keyed by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileManifest {
    entries: Vec<FileManifestEntry>,
}

#[derive(Serialize, Deserialize)]
struct WireManifest {
    files: IndexMap<String, WireEntry>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEntry {
    #[serde(default)]
    depends_on: Vec<String>,
}

impl FileManifest {
    /// Creates an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry.
    #[must_use]
    pub fn with_entry<I, S>(mut self, path: impl Into<String>, depends_on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(FileManifestEntry::new(path, depends_on));
        self
    }

    /// Adds or replaces an entry without dependencies.
    #[must_use]
    pub fn with_file(self, path: impl Into<String>) -> Self {
        self.with_entry(path, Vec::<String>::new())
    }

    /// Adds an entry, replacing one with the same path in place.
    pub fn insert(&mut self, entry: FileManifestEntry) {
        match self.entries.iter_mut().find(|e| e.path == entry.path) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Decodes the JSON body of a manifest block.
    pub fn from_json(body: &str) -> Result<Self, ManifestError> {
        let wire: WireManifest =
            serde_json::from_str(body).map_err(|e| ManifestError::Invalid {
                message: e.to_string(),
            })?;

        Ok(Self {
            entries: wire
                .files
                .into_iter()
                .map(|(path, entry)| FileManifestEntry {
                    path,
                    depends_on: entry.depends_on,
                })
                .collect(),
        })
    }

    /// Encodes the manifest in its wire format.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let wire = WireManifest {
            files: self
                .entries
                .iter()
                .map(|e| {
                    (
                        e.path.clone(),
                        WireEntry {
                            depends_on: e.depends_on.clone(),
                        },
                    )
                })
                .collect(),
        };
        serde_json::to_value(wire).unwrap_or(serde_json::Value::Null)
    }

    /// Returns the entries in declaration order.
    #[must_use]
    pub fn entries(&self) -> &[FileManifestEntry] {
        &self.entries
    }

    /// Returns true if some entry's canonical path is `canonical`.
    #[must_use]
    pub fn declares(&self, canonical: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.canonical_path().as_deref() == Some(canonical))
    }

    /// Returns the entry for `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileManifestEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Iterates the declared paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.path.as_str())
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the manifest declares no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
