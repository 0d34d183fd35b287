//! Typed records for the playlists taking part in a flow run.
//!
//! A [`Collection`] is built once per run from the `(id, name)` pair the
//! playlist service enumerates. Its flow indicators are parsed immediately and
//! never change afterwards; its items are loaded lazily by the executor and
//! may be dropped again between batches to keep memory bounded.

use crate::naming;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use unicode_normalization::UnicodeNormalization;

/// Opaque, stable playlist identifier assigned by the playlist service.
pub type CollectionId = String;

/// Opaque, stable track identifier assigned by the playlist service.
pub type ItemId = String;

/// One user-perceived character (a grapheme cluster) in NFC form.
///
/// Flags, skin-tone modifier sequences and ZWJ sequences are a single glyph,
/// so `🇺🇸` and `👨🏾‍💻` compare as whole units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Glyph(String);

impl Glyph {
    /// Wraps a grapheme cluster, normalizing it to NFC.
    pub fn new(cluster: &str) -> Self {
        Self(cluster.nfc().collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Glyph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Glyph {
    fn from(cluster: &str) -> Self {
        Self::new(cluster)
    }
}

/// Minimal playlist metadata as enumerated by the playlist service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub id: CollectionId,
    pub name: String,
}

impl CollectionInfo {
    pub fn new(id: impl Into<CollectionId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A playlist with its parsed flow indicators and lazily loaded items.
#[derive(Debug, Clone)]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    /// Glyphs before the alphabetic core: this playlist receives from
    /// children carrying the same glyph.
    pub parent_indicators: Vec<Glyph>,
    /// Glyphs after the alphabetic core: this playlist feeds parents
    /// carrying the same glyph.
    pub child_indicators: Vec<Glyph>,
    pub items_loaded: bool,
    /// Insertion ordered so writes follow fetch order.
    pub items: IndexSet<ItemId>,
}

impl Collection {
    /// Creates a collection and parses its flow indicators from `name`.
    pub fn new(id: impl Into<CollectionId>, name: impl Into<String>) -> Self {
        let name = name.into();
        let indicators = naming::parse(&name);
        Self {
            id: id.into(),
            name,
            parent_indicators: indicators.parent,
            child_indicators: indicators.child,
            items_loaded: false,
            items: IndexSet::new(),
        }
    }

    /// True when the collection both receives and feeds (it has parent
    /// and child indicators).
    pub fn is_relay(&self) -> bool {
        !self.parent_indicators.is_empty() && !self.child_indicators.is_empty()
    }

    /// True when the name carries any indicator at all.
    pub fn is_flow_member(&self) -> bool {
        !self.parent_indicators.is_empty() || !self.child_indicators.is_empty()
    }

    /// Replaces the item set and marks the collection as loaded.
    pub fn set_items(&mut self, items: IndexSet<ItemId>) {
        self.items = items;
        self.items_loaded = true;
    }

    /// Drops the resident items. The next batch that needs them refetches.
    pub fn clear_items(&mut self) {
        self.items = IndexSet::new();
        self.items_loaded = false;
    }
}

/// All collections of one run, in the order the service enumerated them.
///
/// The catalog is the arena the executor mutates while it loads and clears
/// items; the graph only refers to collections by id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    collections: IndexMap<CollectionId, Collection>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from service metadata. A repeated id keeps its first
    /// position and the latest name.
    pub fn from_infos(infos: impl IntoIterator<Item = CollectionInfo>) -> Self {
        let mut catalog = Self::new();
        for info in infos {
            catalog.insert(Collection::new(info.id, info.name));
        }
        catalog
    }

    pub fn insert(&mut self, collection: Collection) {
        self.collections.insert(collection.id.clone(), collection);
    }

    pub fn get(&self, id: &str) -> Option<&Collection> {
        self.collections.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Collection> {
        self.collections.get_mut(id)
    }

    /// Display name for `id`, falling back to the id itself.
    pub fn name_of<'a>(&'a self, id: &'a str) -> &'a str {
        self.get(id).map_or(id, |collection| collection.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Collection> {
        self.collections.values()
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Number of collections whose items are currently resident.
    pub fn loaded_count(&self) -> usize {
        self.iter().filter(|c| c.items_loaded).count()
    }
}
