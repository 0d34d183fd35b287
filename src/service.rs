//! # Playlist Service Boundary
//!
//! The flow engine needs exactly three capabilities from whatever hosts the
//! playlists: enumerate them, read their tracks, append tracks. Everything
//! else (authentication, paging, server-side batch limits, retries) is the
//! implementor's business.
//!
//! Two implementations ship with the crate:
//!
//! - [`InMemoryService`]: playlists held in memory. Used for previews
//!   (`playflow run --dry-run`) and tests.
//! - [`crate::library::LocalLibrary`]: the SQLite library cache.

use crate::collection::{CollectionId, CollectionInfo, ItemId};
use indexmap::IndexMap;
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Keywords that mark a remote error message as a permission problem.
const PERMISSION_KEYWORDS: [&str; 9] = [
    "insufficient privileges",
    "permission",
    "forbidden",
    "unauthorized",
    "access denied",
    "not allowed",
    "modify",
    "owner",
    "collaborative",
];

/// Failure reported by a [`PlaylistService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The playlist exists but may not be modified by this user.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("playlist not found: {0}")]
    NotFound(String),

    /// Transient outage, rate limiting and the like.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("library storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

impl ServiceError {
    /// Classifies a free-form error message from a remote service.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if mentions_permission(&message) {
            Self::PermissionDenied(message)
        } else {
            Self::Other(message)
        }
    }

    /// True for permission and ownership failures, including ones that
    /// only say so in their message.
    pub fn is_permission(&self) -> bool {
        match self {
            Self::PermissionDenied(_) => true,
            Self::Other(message) | Self::Unavailable(message) => mentions_permission(message),
            Self::NotFound(_) | Self::Storage(_) => false,
        }
    }
}

fn mentions_permission(message: &str) -> bool {
    let lowered = message.to_lowercase();
    PERMISSION_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// One track slot in a playlist as the service reports it.
///
/// Only entries with an id that are neither local files nor unavailable are
/// eligible for flowing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackEntry {
    #[serde(default)]
    pub id: Option<ItemId>,
    #[serde(default)]
    pub is_local: bool,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

impl TrackEntry {
    /// A regular streamable track.
    pub fn track(id: impl Into<ItemId>) -> Self {
        Self {
            id: Some(id.into()),
            is_local: false,
            available: true,
        }
    }

    /// A local file only present on the user's device.
    pub fn local(id: impl Into<ItemId>) -> Self {
        Self {
            is_local: true,
            ..Self::track(id)
        }
    }

    /// A track that is no longer playable.
    pub fn unavailable(id: impl Into<ItemId>) -> Self {
        Self {
            available: false,
            ..Self::track(id)
        }
    }

    /// The id to flow, if this entry may be flowed at all.
    pub fn stable_id(&self) -> Option<&ItemId> {
        if self.is_local || !self.available {
            return None;
        }
        self.id.as_ref().filter(|id| !id.is_empty())
    }
}

/// What the flow engine requires from the playlist host.
pub trait PlaylistService {
    /// Enumerates every playlist of the user.
    fn list_collections(&mut self) -> Result<Vec<CollectionInfo>, ServiceError>;

    /// Lists the track slots of a playlist in playlist order. Duplicates
    /// may be returned; the caller deduplicates.
    fn list_items(&mut self, collection_id: &str) -> Result<Vec<TrackEntry>, ServiceError>;

    /// Appends `items` to a playlist. Callers never pass more items than
    /// their configured chunk size.
    fn add_items(&mut self, collection_id: &str, items: &[ItemId]) -> Result<(), ServiceError>;
}

/// A playlist held by [`InMemoryService`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistRecord {
    pub id: CollectionId,
    pub name: String,
    /// Playlists the user does not own reject writes.
    #[serde(default = "default_owned")]
    pub owned: bool,
    #[serde(default)]
    pub tracks: Vec<TrackEntry>,
}

fn default_owned() -> bool {
    true
}

impl PlaylistRecord {
    pub fn new(id: impl Into<CollectionId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owned: true,
            tracks: Vec::new(),
        }
    }

    pub fn with_tracks<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ItemId>,
    {
        self.tracks.extend(ids.into_iter().map(TrackEntry::track));
        self
    }

    pub fn with_entries(mut self, entries: impl IntoIterator<Item = TrackEntry>) -> Self {
        self.tracks.extend(entries);
        self
    }

    pub fn not_owned(mut self) -> Self {
        self.owned = false;
        self
    }

    /// Flowable track ids in playlist order, duplicates included.
    pub fn track_ids(&self) -> Vec<&ItemId> {
        self.tracks.iter().filter_map(TrackEntry::stable_id).collect()
    }
}

/// Playlist service backed by plain memory.
///
/// Failures and latency can be injected to exercise the executor's
/// recovery and deadline paths.
#[derive(Debug, Clone, Default)]
pub struct InMemoryService {
    playlists: IndexMap<CollectionId, PlaylistRecord>,
    failing_reads: HashSet<CollectionId>,
    failing_writes: HashSet<CollectionId>,
    read_latency: Duration,
    list_calls: usize,
    write_calls: Vec<(CollectionId, usize)>,
}

impl InMemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = PlaylistRecord>) -> Self {
        let mut service = Self::new();
        for record in records {
            service.insert(record);
        }
        service
    }

    pub fn insert(&mut self, record: PlaylistRecord) {
        self.playlists.insert(record.id.clone(), record);
    }

    pub fn playlist(&self, id: &str) -> Option<&PlaylistRecord> {
        self.playlists.get(id)
    }

    pub fn playlists(&self) -> impl Iterator<Item = &PlaylistRecord> {
        self.playlists.values()
    }

    /// Flowable track ids of a playlist, empty when it does not exist.
    pub fn track_ids(&self, id: &str) -> Vec<&ItemId> {
        self.playlist(id).map(PlaylistRecord::track_ids).unwrap_or_default()
    }

    /// Makes every read of `id` fail.
    pub fn fail_reads(&mut self, id: impl Into<CollectionId>) {
        self.failing_reads.insert(id.into());
    }

    /// Makes every write to `id` fail with a non-permission error.
    pub fn fail_writes(&mut self, id: impl Into<CollectionId>) {
        self.failing_writes.insert(id.into());
    }

    /// Sleeps this long in every `list_items` call.
    pub fn set_read_latency(&mut self, latency: Duration) {
        self.read_latency = latency;
    }

    /// Number of `list_items` calls served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls
    }

    /// `(playlist id, chunk length)` of every successful write.
    pub fn write_calls(&self) -> &[(CollectionId, usize)] {
        &self.write_calls
    }

    pub fn into_records(self) -> Vec<PlaylistRecord> {
        self.playlists.into_values().collect()
    }
}

impl PlaylistService for InMemoryService {
    fn list_collections(&mut self) -> Result<Vec<CollectionInfo>, ServiceError> {
        Ok(self
            .playlists
            .values()
            .map(|record| CollectionInfo::new(record.id.clone(), record.name.clone()))
            .collect())
    }

    fn list_items(&mut self, collection_id: &str) -> Result<Vec<TrackEntry>, ServiceError> {
        self.list_calls += 1;
        if !self.read_latency.is_zero() {
            std::thread::sleep(self.read_latency);
        }
        if self.failing_reads.contains(collection_id) {
            return Err(ServiceError::Unavailable(format!(
                "could not read tracks of {collection_id}"
            )));
        }
        self.playlists
            .get(collection_id)
            .map(|record| record.tracks.clone())
            .ok_or_else(|| ServiceError::NotFound(collection_id.to_string()))
    }

    fn add_items(&mut self, collection_id: &str, items: &[ItemId]) -> Result<(), ServiceError> {
        if self.failing_writes.contains(collection_id) {
            return Err(ServiceError::Other(format!(
                "write to {collection_id} rejected by server"
            )));
        }
        let record = self
            .playlists
            .get_mut(collection_id)
            .ok_or_else(|| ServiceError::NotFound(collection_id.to_string()))?;
        if !record.owned {
            return Err(ServiceError::PermissionDenied(format!(
                "{} is not owned by the current user",
                record.name
            )));
        }
        trace!("Appending {} tracks to {collection_id}", items.len());
        record
            .tracks
            .extend(items.iter().cloned().map(TrackEntry::track));
        self.write_calls.push((collection_id.to_string(), items.len()));
        Ok(())
    }
}
