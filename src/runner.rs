//! # Flow Runner
//!
//! One complete flow run against a [`PlaylistService`]:
//!
//! 1. enumerate playlists and parse their names into a [`Catalog`]
//! 2. build the [`FlowGraph`]
//! 3. detect cycles
//! 4. execute the flow
//! 5. summarize
//!
//! Only a failure to enumerate playlists is an error. Everything after that
//! is recoverable and ends up in the report.

use crate::collection::Catalog;
use crate::config::FlowSettings;
use crate::cycles::{detect_cycles, Cycle};
use crate::executor::{Deadline, FlowConfig, FlowExecutor, FlowReport};
use crate::graph::FlowGraph;
use crate::service::PlaylistService;
use crate::summary::RunSummary;
use anyhow::{Context, Result};
use log::{debug, info};

/// Everything known about a library's flow structure before any track is
/// loaded.
#[derive(Debug, Clone)]
pub struct FlowPlan {
    pub catalog: Catalog,
    pub graph: FlowGraph,
    pub cycles: Vec<Cycle>,
}

impl FlowPlan {
    /// Display names along a cycle, joined with arrows.
    pub fn describe_cycle(&self, cycle: &Cycle) -> String {
        cycle
            .iter()
            .map(|id| self.catalog.name_of(id))
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Result of [`FlowRunner::run`].
#[derive(Debug, Clone)]
pub struct RunResult {
    pub summary: RunSummary,
    /// Absent when the run was disabled or nothing was linked.
    pub report: Option<FlowReport>,
    pub plan: Option<FlowPlan>,
}

pub struct FlowRunner<'s, S> {
    service: &'s mut S,
    config: FlowConfig,
    enabled: bool,
}

impl<'s, S: PlaylistService> FlowRunner<'s, S> {
    pub fn new(service: &'s mut S, config: FlowConfig) -> Self {
        Self {
            service,
            config,
            enabled: true,
        }
    }

    pub fn from_settings(service: &'s mut S, settings: &FlowSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ..Self::new(service, settings.to_flow_config())
        }
    }

    /// Discovers playlists, builds the graph and finds cycles.
    pub fn plan(&mut self) -> Result<FlowPlan> {
        let infos = self
            .service
            .list_collections()
            .context("Failed to list playlists")?;
        let catalog = Catalog::from_infos(infos);
        info!(
            "Found {} playlists, {} with flow indicators",
            catalog.len(),
            catalog.iter().filter(|c| c.is_flow_member()).count()
        );

        let graph = FlowGraph::build(catalog.iter());
        let cycles = if graph.is_empty() {
            Vec::new()
        } else {
            detect_cycles(graph.child_to_parents())
        };

        for (n, cycle) in cycles.iter().enumerate() {
            let names: Vec<&str> = cycle.iter().map(|id| catalog.name_of(id)).collect();
            info!("Cycle {}: {}", n + 1, names.join(" -> "));
        }

        Ok(FlowPlan {
            catalog,
            graph,
            cycles,
        })
    }

    /// Runs the whole pipeline.
    pub fn run(&mut self) -> Result<RunResult> {
        if !self.enabled {
            info!("Playlist flow is disabled");
            return Ok(RunResult {
                summary: RunSummary::disabled(),
                report: None,
                plan: None,
            });
        }

        let deadline = Deadline::after(self.config.overall_timeout);
        let mut plan = self.plan()?;

        if plan.graph.is_empty() {
            return Ok(RunResult {
                summary: RunSummary::no_relationships(),
                report: None,
                plan: Some(plan),
            });
        }

        let mut executor = FlowExecutor::new(&mut *self.service, self.config.clone());
        debug!("Starting flow with {:?}", executor.config());
        let report = executor.execute(&mut plan.catalog, &plan.graph, &plan.cycles, deadline);
        debug!("Flow ended in phase {:?}", executor.phase());
        let summary = RunSummary::from_report(&report, &plan.cycles, &plan.catalog);
        info!("{}", summary.title);

        Ok(RunResult {
            summary,
            report: Some(report),
            plan: Some(plan),
        })
    }
}
