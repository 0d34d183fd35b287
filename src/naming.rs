//! # Naming Module
//!
//! Extracts flow indicators from playlist display names.
//!
//! Special glyphs placed *before* the alphabetic core of a name mark a parent
//! playlist, the same glyphs placed *after* it mark a child that flows into
//! that parent:
//!
//! ```text
//! "🎵 Collection"   parent of 🎵
//! "Daily Mix 🎵"    child of 🎵   => Daily Mix flows into Collection
//! "🎵 Hub 🎶"       relay: receives 🎵 children, feeds 🎶 parents
//! ```
//!
//! Names are NFC-normalized and segmented into grapheme clusters (UAX #29),
//! so multi-codepoint emoji such as flags, keycaps, skin-tone modifiers and
//! ZWJ sequences count as one glyph each.
//!
//! ## Usage
//!
//! ```
//! use playflow::naming::{self, FlowRole};
//!
//! let indicators = naming::parse("🎵🜀 Evening Mix ★");
//! assert_eq!(indicators.parent.len(), 2);
//! assert_eq!(indicators.child.len(), 1);
//! assert_eq!(FlowRole::of("🎵🜀 Evening Mix ★"), FlowRole::Relay);
//! ```

use crate::collection::Glyph;
use log::trace;
use std::fmt;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

/// Prefix put in front of playlists created by test runs. Stripped before
/// the name is analysed so test playlists link like real ones.
pub const TEST_PREFIX: &str = "🧪TEST_";

/// Zero-width characters removed before segmentation. ZWJ (U+200D) is kept
/// because it glues emoji sequences together.
const STRIPPED_ZERO_WIDTH: [char; 4] = ['\u{200B}', '\u{200C}', '\u{2060}', '\u{FEFF}'];

const ZERO_WIDTH_JOINER: char = '\u{200D}';

/// Keyboard punctuation that never acts as a flow indicator.
const NORMAL_PUNCTUATION: &str = "!@#$%^&*()_+-=[]{}|;:'\",./<>?`~";

/// Parent and child indicators of one name, in the order they appear.
///
/// Duplicates are preserved; downstream they are treated as membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowIndicators {
    pub parent: Vec<Glyph>,
    pub child: Vec<Glyph>,
}

impl FlowIndicators {
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty() && self.child.is_empty()
    }

    /// True if some child indicator of `self` is a parent indicator of
    /// `parent`, i.e. `self` flows into `parent`.
    pub fn feeds(&self, parent: &FlowIndicators) -> bool {
        self.child.iter().any(|glyph| parent.parent.contains(glyph))
    }
}

/// How a playlist takes part in the flow graph, judged from its name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowRole {
    /// Only parent indicators: receives from children.
    Parent,
    /// Only child indicators: feeds parents.
    Child,
    /// Both: receives and feeds.
    Relay,
    /// No indicators.
    Unlinked,
}

impl FlowRole {
    pub fn of(name: &str) -> Self {
        Self::from_indicators(&parse(name))
    }

    pub fn from_indicators(indicators: &FlowIndicators) -> Self {
        match (indicators.parent.is_empty(), indicators.child.is_empty()) {
            (false, false) => Self::Relay,
            (false, true) => Self::Parent,
            (true, false) => Self::Child,
            (true, true) => Self::Unlinked,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Child => "child",
            Self::Relay => "relay",
            Self::Unlinked => "none",
        }
    }
}

impl fmt::Display for FlowRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// NFC-normalizes `name` and strips the zero-width characters that only get
/// in the way of segmentation.
pub fn normalize_name(name: &str) -> String {
    name.nfc()
        .filter(|c| !STRIPPED_ZERO_WIDTH.contains(c))
        .collect()
}

/// Extracts the flow indicators of a playlist name.
///
/// Returns empty lists when the name has no alphabetic character to anchor
/// on, and when the same glyph shows up on both sides (a self reference).
pub fn parse(name: &str) -> FlowIndicators {
    let cleaned = normalize_name(name);
    let body = cleaned.strip_prefix(TEST_PREFIX).unwrap_or(&cleaned);

    if body.trim().is_empty() {
        return FlowIndicators::default();
    }

    let clusters = grapheme_clusters(body);

    let Some(first_letter) = clusters.iter().position(|cluster| has_letter(cluster)) else {
        trace!("No alphabetic anchor in `{name}', ignoring");
        return FlowIndicators::default();
    };
    let last_letter = clusters
        .iter()
        .rposition(|cluster| has_letter(cluster))
        .unwrap_or(first_letter);

    let parent: Vec<Glyph> = clusters[..first_letter]
        .iter()
        .filter(|cluster| is_special(cluster))
        .map(|cluster| Glyph::new(cluster))
        .collect();
    let child: Vec<Glyph> = clusters[last_letter + 1..]
        .iter()
        .filter(|cluster| is_special(cluster))
        .map(|cluster| Glyph::new(cluster))
        .collect();

    if parent.iter().any(|glyph| child.contains(glyph)) {
        trace!("Self reference in `{name}', ignoring");
        return FlowIndicators::default();
    }

    FlowIndicators { parent, child }
}

/// Splits text into extended grapheme clusters.
///
/// A joiner left dangling at the end of a cluster joins nothing and is
/// trimmed, so `"🜁\u{200D}"` yields the glyph `🜁`.
fn grapheme_clusters(text: &str) -> Vec<&str> {
    text.graphemes(true)
        .map(|cluster| cluster.trim_end_matches(ZERO_WIDTH_JOINER))
        .filter(|cluster| !cluster.is_empty())
        .collect()
}

/// A cluster is special unless every code point is alphanumeric, whitespace
/// or keyboard punctuation.
fn is_special(cluster: &str) -> bool {
    !cluster
        .chars()
        .all(|c| c.is_alphanumeric() || c.is_whitespace() || NORMAL_PUNCTUATION.contains(c))
}

fn has_letter(cluster: &str) -> bool {
    cluster.chars().any(char::is_alphabetic)
}

/// Folder (genre) tag written as `[Genre]` inside a playlist name.
///
/// ```
/// assert_eq!(playflow::naming::folder_name("🎵 [Jazz] Late Night"), Some("Jazz"));
/// assert_eq!(playflow::naming::folder_name("Late Night"), None);
/// ```
pub fn folder_name(name: &str) -> Option<&str> {
    let mut rest = name;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        match after.find(']') {
            Some(0) => rest = after,
            Some(close) => return Some(&after[..close]),
            None => return None,
        }
    }
    None
}

/// Finds the names among `all_names` that `name` would flow into
/// (potential parents) and that would flow into `name` (potential children).
/// An identical name is skipped.
pub fn find_flow_matches<'a, S: AsRef<str>>(
    name: &str,
    all_names: &'a [S],
) -> (Vec<&'a str>, Vec<&'a str>) {
    let own = parse(name);
    let mut parents = Vec::new();
    let mut children = Vec::new();

    if own.is_empty() {
        return (parents, children);
    }

    for other in all_names.iter().map(AsRef::as_ref) {
        if other == name {
            continue;
        }
        let theirs = parse(other);
        if own.feeds(&theirs) {
            parents.push(other);
        }
        if theirs.feeds(&own) {
            children.push(other);
        }
    }

    (parents, children)
}

/// True when `child_name` would flow into `parent_name`.
pub fn validate_flow_relationship(parent_name: &str, child_name: &str) -> bool {
    let parent = parse(parent_name);
    let child = parse(child_name);
    !parent.parent.is_empty() && !child.child.is_empty() && child.feeds(&parent)
}
