//! Entries and the ordered entry table.

use crate::path::{self, Key, Path};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// A stored leaf: value, display string and embedding at a path.
///
/// Text chunks use a two-index path `[start, end]` and carry no value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(alias = "keys")]
    pub path: Path,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,

    pub string: String,

    pub embedding: Vec<f32>,
}

impl Entry {
    pub fn key(&self) -> String {
        path::encode(&self.path)
    }
}

/// Insertion-ordered map from serialized path to [`Entry`].
///
/// Persisted as a JSON object keyed by the serialized path.
#[derive(Debug, Clone, Default)]
pub struct EntryTable {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl EntryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, replacing in place any entry at the same path.
    pub fn insert(&mut self, entry: Entry) {
        let key = entry.key();
        match self.index.get(&key) {
            Some(&i) => self.entries[i] = entry,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn get(&self, path: &[Key]) -> Option<&Entry> {
        self.index.get(&path::encode(path)).map(|&i| &self.entries[i])
    }

    /// Remove every entry matching `predicate`; returns how many went.
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&Entry) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !predicate(e));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.reindex();
        }
        removed
    }

    /// Entries whose path starts with `prefix`.
    pub fn under<'a>(&'a self, prefix: &'a [Key]) -> impl Iterator<Item = &'a Entry> + 'a {
        self.entries.iter().filter(move |e| path::is_prefix(prefix, &e.path))
    }

    /// Whether any entry lives under `prefix`.
    pub fn contains_prefix(&self, prefix: &[Key]) -> bool {
        self.under(prefix).next().is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.key(), i))
            .collect();
    }
}

impl FromIterator<Entry> for EntryTable {
    fn from_iter<T: IntoIterator<Item = Entry>>(iter: T) -> Self {
        let mut table = EntryTable::new();
        for entry in iter {
            table.insert(entry);
        }
        table
    }
}

impl<'a> IntoIterator for &'a EntryTable {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl Serialize for EntryTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.key(), entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EntryTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = EntryTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of serialized paths to entries")
            }

            // The map key is derived from the entry's own path, so it is
            // read and discarded.
            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<EntryTable, A::Error> {
                let mut table = EntryTable::new();
                while let Some((_key, entry)) = access.next_entry::<String, Entry>()? {
                    table.insert(entry);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}
