// SPDX-FileCopyrightText: 2026 dpekbd developers
// SPDX-License-Identifier: MIT

//! Marker-delimited patching of the two XKB target files.
//!
//! Both patchers share one discipline: everything dpekbd inserts is wrapped
//! between a begin marker and an end marker, and everything dpekbd removes
//! is exactly one such delimited span. The markers are what make the patch
//! detectable and reversible years later, on a file other tools and hand
//! edits have drifted in the meantime.
//!
//! Each target file gets the parsing discipline its format calls for, and
//! only that one:
//!
//! - The symbols file is line-oriented text whose grammar dpekbd has no
//!   business parsing. [`text::TextBlockPatcher`] treats it as opaque lines
//!   and scans for full-line marker tokens.
//! - The rules file is a well-formed XML registry. [`xml::XmlVariantPatcher`]
//!   works on the parsed event stream and marks its insertion with comment
//!   nodes. Substring probes are never used to decide an XML mutation.
//!
//! Both patchers are __idempotent-refusing__: applying an already-applied
//! patch (or reverting a never-applied one) reports the no-op condition
//! instead of stacking a second copy or erroring destructively. The
//! orchestrator in [`crate::install`] downgrades those conditions to logged
//! skips.

pub mod text;
pub mod xml;

/// Default variant name registered in the rules file.
pub const VARIANT_NAME: &str = "dpe";

/// Default human-readable variant description.
pub const VARIANT_DESCRIPTION: &str = "English (Programmer Dvorak Eur. Keys)";

/// Begin marker line for the symbols file.
pub const SYMBOLS_BEGIN_MARKER: &str = "// DPE-BEGIN";

/// End marker line for the symbols file.
pub const SYMBOLS_END_MARKER: &str = "// DPE-END";

/// Begin marker token for rules file comments.
pub const RULES_BEGIN_MARKER: &str = "DPE-BEGIN";

/// End marker token for rules file comments.
pub const RULES_END_MARKER: &str = "DPE-END";

/// Pair of tokens delimiting one machine-inserted block.
///
/// For the symbols file each token occupies a full line of its own. For the
/// rules file each token is matched as a substring of an XML comment node,
/// and written out padded with one space on either side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockMarkers {
    /// Token opening the block.
    pub begin: String,

    /// Token closing the block.
    pub end: String,
}

impl BlockMarkers {
    /// Construct new marker pair.
    pub fn new(begin: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            begin: begin.into(),
            end: end.into(),
        }
    }

    /// Marker pair used in the symbols file.
    pub fn symbols() -> Self {
        Self::new(SYMBOLS_BEGIN_MARKER, SYMBOLS_END_MARKER)
    }

    /// Marker pair used in rules file comments.
    pub fn rules() -> Self {
        Self::new(RULES_BEGIN_MARKER, RULES_END_MARKER)
    }
}

/// Identity of the layout variant being registered.
///
/// The stable name is what sessions reference (`setxkbmap us -variant dpe`);
/// the description is what layout pickers display. Both end up as children of
/// the inserted `variant` element, and the name doubles as the syntactic
/// check that uninstall removed the right thing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantRecord {
    /// Stable variant name.
    pub name: String,

    /// Human-readable description.
    pub description: String,
}

impl VariantRecord {
    /// Construct new variant record.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

impl Default for VariantRecord {
    fn default() -> Self {
        Self::new(VARIANT_NAME, VARIANT_DESCRIPTION)
    }
}

/// Identity of the base layout whose variant list receives the patch.
///
/// Locale names are not unique in the rules registry, so the layout is
/// matched on both its `name` and its `shortDescription`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetLayout {
    /// Text of the layout's `configItem/name` element.
    pub name: String,

    /// Text of the layout's `configItem/shortDescription` element.
    pub short_description: String,
}

impl TargetLayout {
    /// Construct new target layout identity.
    pub fn new(name: impl Into<String>, short_description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short_description: short_description.into(),
        }
    }
}

impl Default for TargetLayout {
    fn default() -> Self {
        Self::new("us", "en")
    }
}
