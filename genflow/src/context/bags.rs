//! Keyed value bags shared by the stages of one run.

use crate::errors::DataConflictError;
use parking_lot::RwLock;
use std::collections::HashMap;

/// A bag of named JSON values.
///
/// [`set`](Self::set) overwrites; [`insert`](Self::insert) refuses to.
#[derive(Debug, Default)]
pub struct ContextBag {
    data: RwLock<HashMap<String, serde_json::Value>>,
}

impl ContextBag {
    /// Creates a new empty context bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context bag from existing data.
    #[must_use]
    pub fn from_data(data: HashMap<String, serde_json::Value>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Gets a value from the bag.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.data.read().get(key).cloned()
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    /// Sets a value, replacing any previous one.
    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        self.data.write().insert(key.into(), value);
    }

    /// Inserts a value under a key that must not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `DataConflictError` if the key already exists.
    pub fn insert(
        &self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), DataConflictError> {
        let key = key.into();
        let mut data = self.data.write();

        if data.contains_key(&key) {
            return Err(DataConflictError::new(key));
        }

        data.insert(key, value);
        Ok(())
    }

    /// Removes a value, returning it.
    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.data.write().remove(key)
    }

    /// Returns a copy of all data.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        self.data.read().clone()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Returns all keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }
}

/// Record of successful stage outputs, keyed by stage id.
#[derive(Debug, Default)]
pub struct OutputBag {
    outputs: RwLock<HashMap<String, HashMap<String, serde_json::Value>>>,
}

impl OutputBag {
    /// Creates a new empty output bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the output recorded for a stage.
    #[must_use]
    pub fn get(&self, stage: &str) -> Option<HashMap<String, serde_json::Value>> {
        self.outputs.read().get(stage).cloned()
    }

    /// Gets one value of a stage's output.
    #[must_use]
    pub fn value(&self, stage: &str, key: &str) -> Option<serde_json::Value> {
        self.outputs.read().get(stage).and_then(|o| o.get(key).cloned())
    }

    /// Records a stage output, replacing any earlier one.
    pub fn record(&self, stage: impl Into<String>, data: HashMap<String, serde_json::Value>) {
        self.outputs.write().insert(stage.into(), data);
    }

    /// Checks if output exists for a stage.
    #[must_use]
    pub fn contains(&self, stage: &str) -> bool {
        self.outputs.read().contains_key(stage)
    }

    /// Returns a copy of all outputs.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, HashMap<String, serde_json::Value>> {
        self.outputs.read().clone()
    }

    /// Returns the number of stages with outputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outputs.read().len()
    }

    /// Returns true if no outputs have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.read().is_empty()
    }
}
