//! Resolution of extension-less dependency specifiers.
//!
//! `import Button from "./Button"` may refer to `Button.tsx` or to
//! `Button/index.tsx`. A [`ResolutionStrategy`] decides which file of the
//! virtual directory such a specifier means.

use crate::config::ResolutionConfig;
use crate::schema::VirtualDirectory;

/// Maps an extension-less, already-normalized path to a concrete file path.
pub trait ResolutionStrategy: Send + Sync {
    /// Returns the candidate file paths for `path`, most preferred first.
    fn candidates(&self, path: &str) -> Vec<String>;

    /// Picks the first candidate present as a file in `schema`.
    ///
    /// When none exists the first candidate is returned so that the caller
    /// reports a concrete missing file.
    fn resolve(&self, path: &str, schema: &VirtualDirectory) -> String {
        let candidates = self.candidates(path);
        candidates
            .iter()
            .find(|candidate| schema.is_file(candidate))
            .or_else(|| candidates.first())
            .cloned()
            .unwrap_or_else(|| path.to_string())
    }
}

/// Tries `<path>/<stem>.<ext>` and then `<path>.<ext>` for every extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFileResolution {
    index_stem: String,
    extensions: Vec<String>,
}

impl Default for IndexFileResolution {
    fn default() -> Self {
        Self::from_config(&ResolutionConfig::default())
    }
}

impl IndexFileResolution {
    /// Creates the default `index.{tsx,ts,jsx,js}` convention.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a strategy from configuration.
    #[must_use]
    pub fn from_config(config: &ResolutionConfig) -> Self {
        Self {
            index_stem: config.index_stem.clone(),
            extensions: config.extensions.clone(),
        }
    }

    /// Sets the default-file stem.
    #[must_use]
    pub fn with_index_stem(mut self, stem: impl Into<String>) -> Self {
        self.index_stem = stem.into();
        self
    }

    /// Sets the extensions tried, in order.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }
}

impl ResolutionStrategy for IndexFileResolution {
    fn candidates(&self, path: &str) -> Vec<String> {
        let index = self
            .extensions
            .iter()
            .map(|ext| format!("{path}/{}.{ext}", self.index_stem));
        let sibling = self.extensions.iter().map(|ext| format!("{path}.{ext}"));
        index.chain(sibling).collect()
    }
}

/// Takes every specifier literally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExactResolution;

impl ResolutionStrategy for ExactResolution {
    fn candidates(&self, path: &str) -> Vec<String> {
        vec![path.to_string()]
    }
}
