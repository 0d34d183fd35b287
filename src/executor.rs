//! # Flow Executor
//!
//! Propagates tracks from child playlists into their parents.
//!
//! ## Run phases
//!
//! ```text
//! Pending -> Filtering -> Batching -> { LoadingItems -> Propagating }* -> Done | TimedOut
//! ```
//!
//! - **Filtering**: with cycle skipping enabled, every edge touching a
//!   playlist on a detected cycle is dropped.
//! - **Batching**: parents are split into fixed-size batches so only a few
//!   playlists have their tracks resident at any time.
//! - **LoadingItems**: tracks of every playlist the batch needs are fetched
//!   once and deduplicated. A failed fetch counts as an empty playlist for
//!   the rest of the run.
//! - **Propagating**: each parent receives the tracks its children have and
//!   it does not, written in chunks.
//!
//! Two [`Deadline`]s bound the run. The overall one is checked before each
//! batch, the per-batch one before each playlist load. Reaching either stops
//! new work but never interrupts a call in flight; a timed-out run returns
//! the partial report like any other.

use crate::collection::{Catalog, CollectionId, ItemId};
use crate::cycles::{cycle_members, Cycle};
use crate::graph::FlowGraph;
use crate::service::{PlaylistService, ServiceError};
use indexmap::{IndexMap, IndexSet};
use log::{debug, info, warn};
use std::borrow::Cow;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Parents processed per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Largest number of tracks sent in one `add_items` call.
pub const DEFAULT_WRITE_CHUNK_SIZE: usize = 100;

pub const DEFAULT_OVERALL_TIMEOUT: Duration = Duration::from_secs(300);

pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(60);

/// A wall-clock budget measured from a fixed start.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(started: Instant, budget: Duration) -> Self {
        Self { started, budget }
    }

    /// A deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self::new(Instant::now(), budget)
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    pub fn is_reached(&self) -> bool {
        self.elapsed() >= self.budget
    }
}

/// Tuning knobs of a flow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowConfig {
    pub overall_timeout: Duration,
    pub batch_timeout: Duration,
    pub batch_size: usize,
    pub write_chunk_size: usize,
    /// Drop every relationship touching a playlist on a cycle.
    pub skip_cycles: bool,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            overall_timeout: DEFAULT_OVERALL_TIMEOUT,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            batch_size: DEFAULT_BATCH_SIZE,
            write_chunk_size: DEFAULT_WRITE_CHUNK_SIZE,
            skip_cycles: true,
        }
    }
}

/// Where a run currently is, or where it ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunPhase {
    #[default]
    Pending,
    Filtering,
    Batching,
    LoadingItems,
    Propagating,
    Done,
    TimedOut,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every planned batch ran.
    Completed,
    /// The overall deadline stopped the run early.
    TimedOut,
    /// No relationship was left after cycle filtering.
    NothingToFlow,
}

/// A playlist whose tracks could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub collection_id: CollectionId,
    pub message: String,
}

/// A parent whose tracks could not be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub collection_id: CollectionId,
    pub message: String,
    /// The playlist is not writable by this user.
    pub permission: bool,
}

/// Outcome of one [`FlowExecutor::execute`] call.
#[derive(Debug, Clone, Default)]
pub struct FlowReport {
    /// Tracks added per parent, in processing order.
    pub items_added: IndexMap<CollectionId, usize>,
    pub batches_planned: usize,
    pub batches_completed: usize,
    /// The overall deadline stopped the run before all batches ran.
    pub deadline_hit: bool,
    pub fetch_failures: Vec<FetchFailure>,
    pub write_failures: Vec<WriteFailure>,
    /// Parents skipped because the batch deadline left them unloaded.
    pub unloaded_parents: Vec<CollectionId>,
    pub phase: RunPhase,
}

impl FlowReport {
    pub fn total_items_added(&self) -> usize {
        self.items_added.values().sum()
    }

    pub fn batches_remaining(&self) -> usize {
        self.batches_planned - self.batches_completed
    }

    pub fn is_complete(&self) -> bool {
        self.batches_completed == self.batches_planned
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.deadline_hit {
            RunOutcome::TimedOut
        } else if self.batches_planned == 0 {
            RunOutcome::NothingToFlow
        } else {
            RunOutcome::Completed
        }
    }
}

/// Runs the load/propagate cycle against a [`PlaylistService`].
pub struct FlowExecutor<'s, S> {
    service: &'s mut S,
    config: FlowConfig,
    phase: RunPhase,
}

impl<'s, S: PlaylistService> FlowExecutor<'s, S> {
    pub fn new(service: &'s mut S, config: FlowConfig) -> Self {
        Self {
            service,
            config,
            phase: RunPhase::Pending,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    fn enter(&mut self, phase: RunPhase) {
        debug!("Flow phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Flows tracks along `graph`, mutating the item sets in `catalog`.
    ///
    /// # Arguments
    ///
    /// * `catalog` - Every playlist of the run; loaded track sets are kept here
    /// * `graph` - Relationships to flow along
    /// * `cycles` - Cycles found in `graph`, dropped first when skipping is on
    /// * `deadline` - Overall budget, usually started before the graph was built
    ///
    /// # Returns
    ///
    /// A [`FlowReport`] of what was written and what failed. Service errors
    /// never abort the run; they are recorded in the report instead.
    pub fn execute(
        &mut self,
        catalog: &mut Catalog,
        graph: &FlowGraph,
        cycles: &[Cycle],
        deadline: Deadline,
    ) -> FlowReport {
        let mut report = FlowReport::default();

        // Drop every relationship touching a cycle
        self.enter(RunPhase::Filtering);
        let graph: Cow<'_, FlowGraph> = if self.config.skip_cycles && !cycles.is_empty() {
            let members = cycle_members(cycles);
            info!("Skipping relationships of {} playlists on cycles", members.len());
            Cow::Owned(graph.without_nodes(&members))
        } else {
            Cow::Borrowed(graph)
        };

        if graph.is_empty() {
            info!("No flow operations to process after filtering cycles");
            self.enter(RunPhase::Done);
            report.phase = self.phase;
            return report;
        }

        // Split parents into batches and note the last batch needing each playlist
        self.enter(RunPhase::Batching);
        let parent_ids: Vec<&CollectionId> = graph.parents().collect();
        let batches: Vec<&[&CollectionId]> = parent_ids.chunks(self.config.batch_size.max(1)).collect();
        let members: Vec<IndexSet<CollectionId>> = batches
            .iter()
            .map(|batch| batch_members(batch, &graph))
            .collect();

        let mut last_use: HashMap<&str, usize> = HashMap::new();
        for (index, touched) in members.iter().enumerate() {
            for id in touched {
                last_use.insert(id.as_str(), index);
            }
        }

        report.batches_planned = batches.len();
        info!(
            "Processing {} flow operations in {} batches (batch size: {})",
            parent_ids.len(),
            batches.len(),
            self.config.batch_size.max(1)
        );

        for (index, (batch, touched)) in batches.iter().zip(&members).enumerate() {
            if deadline.is_reached() {
                warn!(
                    "Operation timeout reached ({:?}). Processed {} of {} batches, {} remaining",
                    deadline.budget(),
                    index,
                    batches.len(),
                    batches.len() - index
                );
                report.deadline_hit = true;
                self.enter(RunPhase::TimedOut);
                break;
            }

            info!(
                "Processing batch {}/{} ({} parent playlists), {:.1}s elapsed, {:.1}s remaining",
                index + 1,
                batches.len(),
                batch.len(),
                deadline.elapsed().as_secs_f64(),
                deadline.remaining().as_secs_f64()
            );

            let batch_deadline = Deadline::after(self.config.batch_timeout);
            self.enter(RunPhase::LoadingItems);
            self.load_batch(catalog, touched, batch_deadline, &mut report);

            self.enter(RunPhase::Propagating);
            for parent_id in batch.iter() {
                self.propagate(catalog, parent_id, graph.children_of(parent_id), &mut report);
            }
            report.batches_completed += 1;

            if index + 1 < batches.len() {
                let mut released = 0;
                for id in touched.iter().filter(|id| last_use.get(id.as_str()) == Some(&index)) {
                    if let Some(collection) = catalog.get_mut(id).filter(|c| c.items_loaded) {
                        collection.clear_items();
                        released += 1;
                    }
                }
                debug!(
                    "Released tracks of {released} playlists after batch {}, {} still loaded",
                    index + 1,
                    catalog.loaded_count()
                );
            }
        }

        if report.is_complete() {
            info!("Completed all {} batches", report.batches_completed);
            self.enter(RunPhase::Done);
        }
        report.phase = self.phase;
        report
    }

    /// Fetches tracks for every not yet loaded playlist in `ids`, stopping
    /// early once `batch_deadline` is reached.
    fn load_batch(
        &mut self,
        catalog: &mut Catalog,
        ids: &IndexSet<CollectionId>,
        batch_deadline: Deadline,
        report: &mut FlowReport,
    ) {
        let total = ids.len();
        for (position, id) in ids.iter().enumerate() {
            if batch_deadline.is_reached() {
                warn!(
                    "Batch timeout reached ({:?}). Loaded {position} of {total} playlists, skipping the rest",
                    batch_deadline.budget()
                );
                break;
            }

            let Some(collection) = catalog.get_mut(id) else {
                warn!("Playlist {id} is not in the catalog");
                continue;
            };
            if collection.items_loaded {
                continue;
            }

            info!("  [{}/{total}] Loading tracks for `{}'", position + 1, collection.name);
            match fetch_items(&mut *self.service, id) {
                Ok(items) => {
                    debug!("    Loaded {} tracks", items.len());
                    collection.set_items(items);
                }
                Err(err) => {
                    warn!("    Failed to load tracks for `{}': {err}", collection.name);
                    report.fetch_failures.push(FetchFailure {
                        collection_id: id.clone(),
                        message: err.to_string(),
                    });
                    collection.set_items(IndexSet::new());
                }
            }
        }
    }

    /// Writes the tracks the children of `parent_id` have and it lacks.
    fn propagate(
        &mut self,
        catalog: &mut Catalog,
        parent_id: &str,
        child_ids: &[CollectionId],
        report: &mut FlowReport,
    ) {
        let Some(parent) = catalog.get(parent_id) else {
            return;
        };
        if !parent.items_loaded {
            info!("  Skipping `{}' - tracks not loaded", parent.name);
            report.unloaded_parents.push(parent_id.to_string());
            return;
        }

        let mut new_items: IndexSet<&ItemId> = IndexSet::new();
        for child in child_ids
            .iter()
            .filter_map(|id| catalog.get(id))
            .filter(|child| child.items_loaded)
        {
            new_items.extend(child.items.iter().filter(|item| !parent.items.contains(*item)));
        }

        if new_items.is_empty() {
            debug!("  `{}' is up to date", parent.name);
            return;
        }

        let parent_name = parent.name.clone();
        let items: Vec<ItemId> = new_items.into_iter().cloned().collect();
        info!("  Adding {} tracks to `{parent_name}'", items.len());

        let chunk_size = self.config.write_chunk_size.max(1);
        let total_chunks = items.len().div_ceil(chunk_size);
        let mut written = 0;
        let mut failure: Option<ServiceError> = None;
        for (number, chunk) in items.chunks(chunk_size).enumerate() {
            debug!("    Adding chunk {}/{total_chunks} ({} tracks)", number + 1, chunk.len());
            if let Err(err) = self.service.add_items(parent_id, chunk) {
                failure = Some(err);
                break;
            }
            written += chunk.len();
        }

        if let Some(parent) = catalog.get_mut(parent_id) {
            parent.items.extend(items[..written].iter().cloned());
        }

        match failure {
            None => {
                report.items_added.insert(parent_id.to_string(), items.len());
            }
            Some(err) => {
                let permission = err.is_permission();
                if permission {
                    warn!(
                        "    Permission denied for `{parent_name}' - skipping (playlist not owned or insufficient permissions)"
                    );
                } else {
                    warn!("    Failed to add tracks to `{parent_name}': {err}");
                }
                report.write_failures.push(WriteFailure {
                    collection_id: parent_id.to_string(),
                    message: err.to_string(),
                    permission,
                });
            }
        }
    }
}

/// Loads one playlist's flowable tracks, deduplicated, in playlist order.
fn fetch_items<S: PlaylistService + ?Sized>(
    service: &mut S,
    collection_id: &str,
) -> Result<IndexSet<ItemId>, ServiceError> {
    let entries = service.list_items(collection_id)?;
    Ok(entries
        .iter()
        .filter_map(|entry| entry.stable_id().cloned())
        .collect())
}

/// Parents of a batch, each followed by its children, without repeats.
fn batch_members(batch: &[&CollectionId], graph: &FlowGraph) -> IndexSet<CollectionId> {
    let mut members = IndexSet::new();
    for parent_id in batch {
        members.insert((*parent_id).clone());
        members.extend(graph.children_of(parent_id).iter().cloned());
    }
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycles::detect_cycles;
    use crate::service::{InMemoryService, PlaylistRecord, TrackEntry};

    fn catalog_of(service: &mut InMemoryService) -> Catalog {
        Catalog::from_infos(service.list_collections().unwrap())
    }

    fn run(service: &mut InMemoryService, config: FlowConfig) -> (Catalog, FlowReport) {
        let mut catalog = catalog_of(service);
        let graph = FlowGraph::build(catalog.iter());
        let cycles = detect_cycles(graph.child_to_parents());
        let deadline = Deadline::after(config.overall_timeout);
        let report = FlowExecutor::new(service, config).execute(&mut catalog, &graph, &cycles, deadline);
        (catalog, report)
    }

    #[test]
    fn test_child_tracks_reach_parent() {
        let mut service = InMemoryService::from_records(vec![
            PlaylistRecord::new("parent", "🎵Parent"),
            PlaylistRecord::new("child", "Child🎵").with_tracks(["t1", "t2"]),
        ]);

        let (catalog, report) = run(&mut service, FlowConfig::default());

        assert_eq!(report.items_added.get("parent"), Some(&2));
        assert_eq!(report.batches_planned, 1);
        assert_eq!(report.batches_completed, 1);
        assert_eq!(report.phase, RunPhase::Done);
        assert_eq!(report.outcome(), RunOutcome::Completed);
        let parent = catalog.get("parent").unwrap();
        assert!(parent.items.contains("t1") && parent.items.contains("t2"));
        assert_eq!(service.track_ids("parent"), vec!["t1", "t2"]);
    }

    #[test]
    fn test_second_run_adds_nothing() {
        let mut service = InMemoryService::from_records(vec![
            PlaylistRecord::new("parent", "🎵 Parent").with_tracks(["t0"]),
            PlaylistRecord::new("child", "Child 🎵").with_tracks(["t0", "t1"]),
        ]);

        let (_, first) = run(&mut service, FlowConfig::default());
        let (_, second) = run(&mut service, FlowConfig::default());

        assert_eq!(first.total_items_added(), 1);
        assert_eq!(second.total_items_added(), 0);
        assert!(second.items_added.is_empty());
    }

    #[test]
    fn test_duplicates_and_unflowable_entries_are_dropped() {
        let mut service = InMemoryService::from_records(vec![
            PlaylistRecord::new("parent", "🎵 Parent"),
            PlaylistRecord::new("child", "Child 🎵").with_entries(vec![
                TrackEntry::track("t1"),
                TrackEntry::track("t1"),
                TrackEntry::local("local"),
                TrackEntry::unavailable("gone"),
                TrackEntry {
                    id: None,
                    is_local: false,
                    available: true,
                },
            ]),
        ]);

        let (_, report) = run(&mut service, FlowConfig::default());

        assert_eq!(report.items_added.get("parent"), Some(&1));
        assert_eq!(service.track_ids("parent"), vec!["t1"]);
    }

    #[test]
    fn test_cycle_members_are_skipped() {
        let mut service = InMemoryService::from_records(vec![
            PlaylistRecord::new("a", "♪A♫").with_tracks(["t1"]),
            PlaylistRecord::new("b", "♫B♪").with_tracks(["t1"]),
        ]);

        let (_, report) = run(&mut service, FlowConfig::default());

        assert_eq!(report.total_items_added(), 0);
        assert_eq!(report.batches_planned, 0);
        assert_eq!(report.phase, RunPhase::Done);
        assert_eq!(report.outcome(), RunOutcome::NothingToFlow);
        assert_eq!(service.list_calls(), 0);
    }

    #[test]
    fn test_cycles_flow_when_not_skipped() {
        let mut service = InMemoryService::from_records(vec![
            PlaylistRecord::new("a", "♪A♫").with_tracks(["t1"]),
            PlaylistRecord::new("b", "♫B♪").with_tracks(["t2"]),
        ]);
        let config = FlowConfig {
            skip_cycles: false,
            ..FlowConfig::default()
        };

        let (_, report) = run(&mut service, config);

        assert_eq!(report.total_items_added(), 2);
    }

    #[test]
    fn test_fetch_failure_counts_as_empty() {
        let mut service = InMemoryService::from_records(vec![
            PlaylistRecord::new("parent", "🎵 Parent"),
            PlaylistRecord::new("broken", "Broken 🎵").with_tracks(["t1"]),
            PlaylistRecord::new("fine", "Fine 🎵").with_tracks(["t2"]),
        ]);
        service.fail_reads("broken");

        let (catalog, report) = run(&mut service, FlowConfig::default());

        assert_eq!(report.fetch_failures.len(), 1);
        assert_eq!(report.fetch_failures[0].collection_id, "broken");
        assert_eq!(report.items_added.get("parent"), Some(&1));
        let broken = catalog.get("broken").unwrap();
        assert!(broken.items_loaded && broken.items.is_empty());
    }

    #[test]
    fn test_permission_failure_skips_parent() {
        let mut service = InMemoryService::from_records(vec![
            PlaylistRecord::new("theirs", "🎵 Theirs").not_owned(),
            PlaylistRecord::new("mine", "🎶 Mine"),
            PlaylistRecord::new("child", "Child 🎵🎶").with_tracks(["t1"]),
        ]);

        let (_, report) = run(&mut service, FlowConfig::default());

        assert_eq!(report.write_failures.len(), 1);
        assert!(report.write_failures[0].permission);
        assert!(!report.items_added.contains_key("theirs"));
        assert_eq!(report.items_added.get("mine"), Some(&1));
    }

    #[test]
    fn test_other_write_failure_is_recorded() {
        let mut service = InMemoryService::from_records(vec![
            PlaylistRecord::new("parent", "🎵 Parent"),
            PlaylistRecord::new("child", "Child 🎵").with_tracks(["t1"]),
        ]);
        service.fail_writes("parent");

        let (_, report) = run(&mut service, FlowConfig::default());

        assert_eq!(report.write_failures.len(), 1);
        assert!(!report.write_failures[0].permission);
        assert!(report.items_added.is_empty());
        assert_eq!(report.phase, RunPhase::Done);
    }

    #[test]
    fn test_writes_are_chunked() {
        let tracks: Vec<String> = (0..250).map(|i| format!("t{i}")).collect();
        let mut service = InMemoryService::from_records(vec![
            PlaylistRecord::new("parent", "🎵 Parent"),
            PlaylistRecord::new("child", "Child 🎵").with_tracks(tracks),
        ]);

        let (_, report) = run(&mut service, FlowConfig::default());

        assert_eq!(report.items_added.get("parent"), Some(&250));
        let chunks: Vec<usize> = service.write_calls().iter().map(|(_, len)| *len).collect();
        assert_eq!(chunks, vec![100, 100, 50]);
    }

    #[test]
    fn test_overall_deadline_leaves_later_batches_untouched() {
        let mut service = InMemoryService::from_records(vec![
            PlaylistRecord::new("p1", "★ One"),
            PlaylistRecord::new("p2", "☆ Two"),
            PlaylistRecord::new("p3", "♦ Three"),
            PlaylistRecord::new("c1", "Mix ★").with_tracks(["t1"]),
            PlaylistRecord::new("c2", "Mix ☆").with_tracks(["t2"]),
            PlaylistRecord::new("c3", "Mix ♦").with_tracks(["t3"]),
        ]);
        service.set_read_latency(Duration::from_millis(30));
        let config = FlowConfig {
            overall_timeout: Duration::from_millis(40),
            batch_size: 1,
            ..FlowConfig::default()
        };

        let (catalog, report) = run(&mut service, config);

        assert!(report.deadline_hit);
        assert_eq!(report.phase, RunPhase::TimedOut);
        assert_eq!(report.outcome(), RunOutcome::TimedOut);
        assert_eq!(report.batches_planned, 3);
        assert_eq!(report.batches_completed, 1);
        assert_eq!(report.batches_remaining(), 2);
        assert_eq!(report.items_added.get("p1"), Some(&1));
        for id in ["p2", "p3", "c2", "c3"] {
            assert!(!catalog.get(id).unwrap().items_loaded, "{id} should not be loaded");
        }
        assert!(service.track_ids("p2").is_empty());
        assert!(service.track_ids("p3").is_empty());
    }

    #[test]
    fn test_expired_overall_deadline_runs_no_batch() {
        let mut service = InMemoryService::from_records(vec![
            PlaylistRecord::new("parent", "🎵 Parent"),
            PlaylistRecord::new("child", "Child 🎵").with_tracks(["t1"]),
        ]);
        let config = FlowConfig {
            overall_timeout: Duration::ZERO,
            ..FlowConfig::default()
        };

        let (_, report) = run(&mut service, config);

        assert!(report.deadline_hit);
        assert_eq!(report.batches_completed, 0);
        assert_eq!(report.batches_planned, 1);
        assert_eq!(service.list_calls(), 0);
    }

    #[test]
    fn test_batch_deadline_skips_unloaded_parent() {
        let mut service = InMemoryService::from_records(vec![
            PlaylistRecord::new("parent", "🎵 Parent"),
            PlaylistRecord::new("child", "Child 🎵").with_tracks(["t1"]),
        ]);
        let config = FlowConfig {
            batch_timeout: Duration::ZERO,
            ..FlowConfig::default()
        };

        let (_, report) = run(&mut service, config);

        assert_eq!(report.batches_completed, 1);
        assert_eq!(report.unloaded_parents, vec!["parent".to_string()]);
        assert!(report.items_added.is_empty());
    }

    #[test]
    fn test_batch_deadline_still_processes_what_loaded() {
        let mut service = InMemoryService::from_records(vec![
            PlaylistRecord::new("p1", "★ One"),
            PlaylistRecord::new("p2", "☆ Two"),
            PlaylistRecord::new("c1", "Mix ★").with_tracks(["t1"]),
            PlaylistRecord::new("c2", "Mix ☆").with_tracks(["t2"]),
        ]);
        // p1 and c1 load within the batch budget, p2 starts after it
        service.set_read_latency(Duration::from_millis(100));
        let config = FlowConfig {
            batch_timeout: Duration::from_millis(150),
            batch_size: 2,
            ..FlowConfig::default()
        };

        let (catalog, report) = run(&mut service, config);

        assert_eq!(report.batches_planned, 1);
        assert_eq!(report.batches_completed, 1);
        assert!(!report.deadline_hit);
        assert_eq!(service.list_calls(), 2);
        assert_eq!(report.items_added.get("p1"), Some(&1));
        assert_eq!(service.track_ids("p1"), vec!["t1"]);
        assert_eq!(report.unloaded_parents, vec!["p2".to_string()]);
        assert!(service.track_ids("p2").is_empty());
        assert!(!catalog.get("c2").unwrap().items_loaded);
    }

    #[test]
    fn test_cycle_behind_another_cycle_is_skipped() {
        // x feeds a and b (a <-> b) and trades tracks with y
        let mut service = InMemoryService::from_records(vec![
            PlaylistRecord::new("x", "♠ X ♣♦").with_tracks(["tx"]),
            PlaylistRecord::new("a", "♣♥ A ★"),
            PlaylistRecord::new("b", "★ B ♥"),
            PlaylistRecord::new("y", "♦ Y ♠").with_tracks(["ty"]),
        ]);

        let (_, report) = run(&mut service, FlowConfig::default());

        assert_eq!(report.total_items_added(), 0);
        assert_eq!(report.outcome(), RunOutcome::NothingToFlow);
        assert_eq!(service.track_ids("x"), vec!["tx"]);
        assert_eq!(service.track_ids("y"), vec!["ty"]);
    }

    #[test]
    fn test_executor_tracks_phase() {
        let mut service = InMemoryService::from_records(vec![
            PlaylistRecord::new("parent", "🎵 Parent"),
            PlaylistRecord::new("child", "Child 🎵").with_tracks(["t1"]),
        ]);
        let mut catalog = catalog_of(&mut service);
        let graph = FlowGraph::build(catalog.iter());
        let config = FlowConfig {
            batch_size: 4,
            ..FlowConfig::default()
        };

        let mut executor = FlowExecutor::new(&mut service, config);
        assert_eq!(executor.phase(), RunPhase::Pending);
        assert_eq!(executor.config().batch_size, 4);

        let report = executor.execute(&mut catalog, &graph, &[], Deadline::after(Duration::from_secs(60)));

        assert_eq!(executor.phase(), RunPhase::Done);
        assert!(report.is_complete());
    }

    #[test]
    fn test_shared_child_stays_loaded_until_last_use() {
        let mut service = InMemoryService::from_records(vec![
            PlaylistRecord::new("p1", "🎵 One"),
            PlaylistRecord::new("p2", "🎶 Two"),
            PlaylistRecord::new("shared", "Shared 🎵🎶").with_tracks(["t1"]),
        ]);
        let config = FlowConfig {
            batch_size: 1,
            ..FlowConfig::default()
        };

        let (catalog, report) = run(&mut service, config);

        assert_eq!(report.batches_completed, 2);
        assert_eq!(service.list_calls(), 3);
        assert!(!catalog.get("p1").unwrap().items_loaded);
        assert!(catalog.get("shared").unwrap().items_loaded);
        assert!(catalog.get("p2").unwrap().items_loaded);
        assert_eq!(report.total_items_added(), 2);
    }

    #[test]
    fn test_deadline_accounting() {
        let deadline = Deadline::after(Duration::from_secs(60));
        assert!(!deadline.is_reached());
        assert!(deadline.remaining() <= Duration::from_secs(60));
        assert!(Deadline::after(Duration::ZERO).is_reached());
    }
}
