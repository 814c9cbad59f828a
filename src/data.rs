//! Nested key-value document content.
//!
//! [`DocData`] wraps a YAML mapping and provides the small set of
//! operations the access protocols need: nested get/set, top-level fetch
//! with a default, recursive merge-by-key, and serialization to disk.

use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;
use serde_yaml::mapping::Entry;
use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};

/// The content of one document: a nested string-keyed mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocData {
    root: Mapping,
}

impl DocData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a nested value by key path.
    ///
    /// Returns `None` if any segment is missing or a non-mapping value is
    /// traversed through.
    #[must_use]
    pub fn get(&self, keys: &[&str]) -> Option<&Value> {
        let (first, rest) = keys.split_first()?;
        let mut value = self.root.get(*first)?;
        for key in rest {
            value = value.get(*key)?;
        }
        Some(value)
    }

    /// Set a nested value, creating intermediate mappings as needed.
    ///
    /// A non-mapping value sitting in the middle of the key path is
    /// replaced by a fresh mapping.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyKeyPath`] for an empty key path, or
    /// [`Error::Yaml`] if the value cannot be represented as YAML.
    pub fn set<V: Serialize>(&mut self, keys: &[&str], value: V) -> Result<()> {
        let yaml = serde_yaml::to_value(value)?;
        let (last, parents) = keys.split_last().ok_or(Error::EmptyKeyPath)?;

        let mut current = &mut self.root;
        for key in parents {
            let slot = current
                .entry(Value::from(*key))
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            if !slot.is_mapping() {
                *slot = Value::Mapping(Mapping::new());
            }
            current = match slot {
                Value::Mapping(inner) => inner,
                _ => unreachable!("slot was just set to a mapping"),
            };
        }
        current.insert(Value::from(*last), yaml);
        Ok(())
    }

    /// Fetch a top-level value, falling back to `default` when the key is
    /// absent.
    #[must_use]
    pub fn fetch<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.root.get(key).unwrap_or(default)
    }

    /// Merge another mapping into this document, key by key.
    ///
    /// A mapping merged onto an existing mapping recurses; any other
    /// combination replaces the existing value.
    pub fn merge(&mut self, other: Mapping) {
        merge_mapping(&mut self.root, other);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    #[must_use]
    pub fn as_mapping(&self) -> &Mapping {
        &self.root
    }

    /// Parse serialized document text.
    ///
    /// Empty text and a YAML `null` document both yield `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Yaml`] on malformed YAML.
    pub fn parse(text: &str) -> Result<Option<Value>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let value: Value = serde_yaml::from_str(text)?;
        match value {
            Value::Null => Ok(None),
            other => Ok(Some(other)),
        }
    }

    /// Serialize this document to `path`.
    ///
    /// # Errors
    ///
    /// Without `force`, writing over an existing file fails with an
    /// `AlreadyExists` io error. Serialization and io failures propagate.
    pub fn write_to(&self, path: &Path, force: bool) -> Result<()> {
        if !force && path.exists() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("refusing to overwrite {}", path.display()),
            )));
        }
        let text = serde_yaml::to_string(&self.root)?;
        fs::write(path, text)?;
        Ok(())
    }
}

fn merge_mapping(dst: &mut Mapping, src: Mapping) {
    for (key, incoming) in src {
        match dst.entry(key) {
            Entry::Occupied(mut slot) => match (slot.get_mut(), incoming) {
                (Value::Mapping(existing), Value::Mapping(incoming)) => {
                    merge_mapping(existing, incoming);
                }
                (existing, incoming) => *existing = incoming,
            },
            Entry::Vacant(slot) => {
                slot.insert(incoming);
            }
        }
    }
}
