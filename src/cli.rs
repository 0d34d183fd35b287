//! # Command-Line Interface Module
//!
//! Clap derive definitions for the `playflow` binary.
//!
//! ## Commands
//!
//! - `import`: Load a JSON library snapshot into the library cache
//! - `export`: Write the library cache as a JSON snapshot
//! - `parse`: Show how playlist names are read as flow indicators
//! - `graph`: Show flow relationships, relays and cycles of the library
//! - `run`: Flow tracks from child playlists into their parents
//!
//! ## Examples
//!
//! ```bash
//! playflow import ~/spotify-playlists.json
//! playflow parse "🎵 Chill" "Lo-fi Beats 🎵"
//! playflow run --dry-run
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

#[derive(Parser)]
#[command(name = "playflow")]
#[command(about = "Playflow: Let playlists feed each other - naming-driven playlist flow graphs")]
#[command(version)]
pub struct Args {
    /// Library cache to operate on
    ///
    /// Defaults to `library.db` in the platform data directory.
    #[arg(long, global = true, env = "PLAYFLOW_LIBRARY", value_hint = clap::ValueHint::FilePath)]
    pub library: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load a JSON library snapshot into the library cache
    ///
    /// Playlists already in the cache are updated in place and keep their
    /// position; their tracks are replaced by the snapshot's.
    Import {
        /// Snapshot file: `{"playlists": [{"id", "name", "owned", "tracks"}]}`
        #[arg(value_hint = clap::ValueHint::FilePath)]
        snapshot: PathBuf,

        /// Drop every playlist that is not in the snapshot
        #[arg(long)]
        replace: bool,
    },

    /// Write the library cache as a JSON snapshot
    Export {
        /// Output file, stdout when omitted
        #[arg(value_hint = clap::ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Show the flow indicators read from playlist names
    ///
    /// Does not touch the library.
    Parse {
        /// Playlist names to parse
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Show flow relationships, relays and cycles of the library
    Graph,

    /// Flow tracks from child playlists into their parents
    ///
    /// Settings come from `settings.json` in the config directory and the
    /// PLAYLIST_FLOW_* environment variables; the flags below win over both.
    Run {
        /// Run against an in-memory copy and leave the library unchanged
        #[arg(long)]
        dry_run: bool,

        /// Flow along cycles instead of skipping their playlists
        #[arg(long)]
        keep_cycles: bool,

        /// Overall time budget in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Time budget for loading one batch, in seconds
        #[arg(long, value_name = "SECS")]
        batch_timeout: Option<u64>,
    },

    /// Generate shell completions
    ///
    /// Usage: playflow completion bash > ~/.local/share/bash-completion/completions/playflow
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}
