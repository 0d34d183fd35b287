//! Human readable outcome of a flow run: a short title plus a message body,
//! suitable for a notification or the terminal.

use crate::collection::Catalog;
use crate::cycles::Cycle;
use crate::executor::FlowReport;
use indexmap::IndexSet;
use std::fmt;

/// Which kind of result a [`RunSummary`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryKind {
    Disabled,
    NoRelationships,
    /// Nothing flowed because every relationship was on a cycle.
    SkippedForCycles,
    /// The time limit stopped the run before anything flowed.
    TimedOut,
    UpToDate,
    Flowed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub kind: SummaryKind,
    pub title: String,
    pub message: String,
}

impl RunSummary {
    pub fn disabled() -> Self {
        Self {
            kind: SummaryKind::Disabled,
            title: "Playlist Flow Disabled".to_string(),
            message: "Playlist flow is disabled in configuration.".to_string(),
        }
    }

    pub fn no_relationships() -> Self {
        Self {
            kind: SummaryKind::NoRelationships,
            title: "No Flow Relationships Found".to_string(),
            message: "No playlists found with flow indicators that link them.".to_string(),
        }
    }

    /// Summarizes a finished (or timed-out) execution.
    pub fn from_report(report: &FlowReport, cycles: &[Cycle], catalog: &Catalog) -> Self {
        let mut summary = if report.items_added.is_empty() && report.deadline_hit {
            Self {
                kind: SummaryKind::TimedOut,
                title: "Playlist Flow Timed Out".to_string(),
                message: "Stopped before any songs flowed.".to_string(),
            }
        } else if report.items_added.is_empty() && !cycles.is_empty() {
            let names = cycle_names(cycles, catalog);
            Self {
                kind: SummaryKind::SkippedForCycles,
                title: "Playlist Flow Skipped".to_string(),
                message: format!(
                    "Skipped flow due to {} cycle(s) involving: {}",
                    cycles.len(),
                    names.join(", ")
                ),
            }
        } else if report.items_added.is_empty() {
            Self {
                kind: SummaryKind::UpToDate,
                title: "No New Songs to Flow".to_string(),
                message: "All parent playlists are up to date with their children.".to_string(),
            }
        } else {
            let details: Vec<String> = report
                .items_added
                .iter()
                .map(|(id, count)| format!("{}: +{count}", catalog.name_of(id)))
                .collect();
            let mut message = format!(
                "Songs flowed to {} parent playlists:\n{}",
                report.items_added.len(),
                details.join("\n")
            );
            if !cycles.is_empty() {
                message.push_str(&format!(
                    "\n\nNote: Skipped {} cycle(s) to prevent infinite loops.",
                    cycles.len()
                ));
            }
            Self {
                kind: SummaryKind::Flowed,
                title: format!("Flowed {} Songs", report.total_items_added()),
                message,
            }
        };

        if report.deadline_hit {
            summary.message.push_str(&format!(
                "\n\nStopped at the time limit with {} of {} batches remaining.",
                report.batches_remaining(),
                report.batches_planned
            ));
        }

        let permission = report.write_failures.iter().filter(|f| f.permission).count();
        let other = report.write_failures.len() - permission;
        if permission > 0 {
            summary.message.push_str(&format!(
                "\nSkipped {permission} playlist(s) without write permission."
            ));
        }
        if other > 0 {
            summary
                .message
                .push_str(&format!("\nFailed to update {other} playlist(s)."));
        }
        if !report.fetch_failures.is_empty() {
            summary.message.push_str(&format!(
                "\nCould not read {} playlist(s).",
                report.fetch_failures.len()
            ));
        }

        summary
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n{}", self.title, self.message)
    }
}

/// Distinct display names of every cycle member, first seen first.
fn cycle_names<'a>(cycles: &'a [Cycle], catalog: &'a Catalog) -> Vec<&'a str> {
    let names: IndexSet<&str> = cycles
        .iter()
        .flatten()
        .map(|id| catalog.name_of(id))
        .collect();
    names.into_iter().collect()
}
