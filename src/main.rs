//! # Playflow
//!
//! Lets playlists feed each other. Glyphs in front of a playlist's name make
//! it a parent, glyphs after the name make it a child, and every child's
//! tracks flow into the parents that share one of its glyphs.
//!
//! ## Usage
//!
//! ```bash
//! # Load playlists into the library cache
//! playflow import playlists.json
//!
//! # See how names are read and what links to what
//! playflow parse "🎵 Chill" "Lo-fi Beats 🎵"
//! playflow graph
//!
//! # Flow tracks (or preview with --dry-run)
//! playflow run
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use playflow::cli::{self, Command};
use playflow::collection::Glyph;
use playflow::completion;
use playflow::config::{FlowSettings, RuntimeConfig};
use playflow::library::{LibrarySnapshot, LocalLibrary};
use playflow::naming::{self, FlowRole};
use playflow::runner::{FlowPlan, FlowRunner, RunResult};
use playflow::service::InMemoryService;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

/// Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=info playflow run` - batch progress
/// - `RUST_LOG=playflow::executor=debug playflow run` - per-playlist detail
fn main() -> Result<()> {
    env_logger::init();

    let cli::Args { library, command } = cli::Args::parse();

    match command {
        Command::Import { snapshot, replace } => {
            let mut library = open_library(library)?;
            let snapshot = LibrarySnapshot::read_from(&snapshot)?;
            let stats = library.import_snapshot(&snapshot, replace)?;
            println!(
                "Imported {} playlists ({} tracks); library now holds {} playlists",
                stats.playlists,
                stats.tracks,
                library.playlist_count()?
            );
        }
        Command::Export { output } => {
            let snapshot = open_library(library)?.export_snapshot()?;
            match output {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    snapshot.write_to(BufWriter::new(file))?;
                    info!("Exported {} playlists to {}", snapshot.playlists.len(), path.display());
                }
                None => {
                    let mut stdout = io::stdout().lock();
                    snapshot.write_to(&mut stdout)?;
                    writeln!(stdout)?;
                }
            }
        }
        Command::Parse { names } => print_parse(&names),
        Command::Graph => {
            let mut library = open_library(library)?;
            let settings = FlowSettings::load()?;
            let plan = FlowRunner::from_settings(&mut library, &settings).plan()?;
            print_plan(&plan);
        }
        Command::Run {
            dry_run,
            keep_cycles,
            timeout,
            batch_timeout,
        } => {
            let mut settings = FlowSettings::load()?;
            if keep_cycles {
                settings.skip_cycles = false;
            }
            if let Some(secs) = timeout {
                settings.overall_timeout_secs = secs;
            }
            if let Some(secs) = batch_timeout {
                settings.batch_timeout_secs = secs;
            }
            debug!("Flow settings: {settings:?}");

            let mut library = open_library(library)?;
            let result = if dry_run {
                let mut preview = InMemoryService::from_records(library.export_snapshot()?.playlists);
                FlowRunner::from_settings(&mut preview, &settings).run()?
            } else {
                FlowRunner::from_settings(&mut library, &settings).run()?
            };
            print_result(&result, dry_run);
        }
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(&shell), &mut cmd);
        }
    }

    Ok(())
}

fn open_library(explicit: Option<PathBuf>) -> Result<LocalLibrary> {
    let runtime = RuntimeConfig::resolve(explicit)?;
    LocalLibrary::open(&runtime.library_path)
}

fn print_parse(names: &[String]) {
    for name in names {
        let indicators = naming::parse(name);
        let join = |glyphs: &[Glyph]| {
            glyphs.iter().map(|g| g.as_str()).collect::<Vec<_>>().join(" ")
        };
        println!("{name}");
        println!("  role:   {}", FlowRole::from_indicators(&indicators));
        println!("  parent: {}", join(&indicators.parent));
        println!("  child:  {}", join(&indicators.child));
        if let Some(folder) = naming::folder_name(name) {
            println!("  folder: {folder}");
        }

        if names.len() > 1 {
            let (parents, children) = naming::find_flow_matches(name, names);
            if !parents.is_empty() {
                println!("  flows into: {}", parents.join(", "));
            }
            if !children.is_empty() {
                println!("  fed by:     {}", children.join(", "));
            }
        }
    }
}

fn print_plan(plan: &FlowPlan) {
    let stats = plan.graph.stats();
    println!(
        "{} playlists, {} linked",
        plan.catalog.len(),
        plan.graph.nodes().len()
    );
    println!(
        "{} relationships ({} direct, {} through relays)",
        plan.graph.edge_count(),
        stats.direct_edges,
        stats.transitive_edges
    );

    for (parent, children) in plan.graph.parent_to_children() {
        let names: Vec<&str> = children.iter().map(|id| plan.catalog.name_of(id)).collect();
        println!("  {} <- {}", plan.catalog.name_of(parent), names.join(", "));
    }

    let relays: Vec<&str> = plan
        .catalog
        .iter()
        .filter(|c| c.is_relay())
        .map(|c| c.name.as_str())
        .collect();
    if !relays.is_empty() {
        println!("Relays: {}", relays.join(", "));
    }

    if !plan.cycles.is_empty() {
        println!("Cycles:");
        for cycle in &plan.cycles {
            println!("  {}", plan.describe_cycle(cycle));
        }
    }
}

fn print_result(result: &RunResult, dry_run: bool) {
    println!("{}", result.summary);
    if dry_run {
        println!("\n(dry run: library left unchanged)");
    }
}
