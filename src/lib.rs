//! Naming-driven playlist flow graphs.
//!
//! Glyphs at the start of a playlist's name mark it as a parent, glyphs at
//! the end as a child. A child feeds every parent sharing one of its glyphs,
//! and a playlist with both kinds relays tracks one hop further.
//!
//! Core modules:
//! - [`naming`] - Flow indicator parsing from display names
//! - [`graph`] - Relationship graph with single-hop relay expansion
//! - [`cycles`] - Cycle detection over child -> parent edges
//! - [`executor`] - Batched, deadline-bounded track propagation
//! - [`runner`] - End-to-end flow run and its summary
//!
//! ### Supporting Modules
//!
//! - [`collection`] - Playlist records and the per-run catalog
//! - [`service`] - The playlist service boundary and an in-memory service
//! - [`library`] - SQLite library cache implementing the service
//! - [`summary`] - Human readable run outcome
//! - [`config`] - Data locations and flow settings
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```
//! use playflow::executor::FlowConfig;
//! use playflow::runner::FlowRunner;
//! use playflow::service::{InMemoryService, PlaylistRecord};
//!
//! let mut service = InMemoryService::from_records(vec![
//!     PlaylistRecord::new("p", "🎵 Favorites"),
//!     PlaylistRecord::new("c", "Discover Weekly 🎵").with_tracks(["t1", "t2"]),
//! ]);
//!
//! let result = FlowRunner::new(&mut service, FlowConfig::default()).run()?;
//! assert_eq!(result.summary.title, "Flowed 2 Songs");
//! assert_eq!(service.track_ids("p"), vec!["t1", "t2"]);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Playlist services report [`service::ServiceError`]s, which the executor
//! classifies and records instead of aborting. Everything at the application
//! layer returns `anyhow::Result`.

pub mod cli;
pub mod collection;
pub mod completion;
pub mod config;
pub mod cycles;
pub mod executor;
pub mod graph;
pub mod library;
pub mod naming;
pub mod runner;
pub mod service;
pub mod summary;
