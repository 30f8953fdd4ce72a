// SPDX-FileCopyrightText: 2026 dpekbd developers
// SPDX-License-Identifier: MIT

//! Block patching of the flat-text symbols file.
//!
//! The symbols file is parsed by XKB via named `xkb_symbols` entries, so the
//! position of the layout definition inside the file does not matter for
//! correctness. The block is therefore always appended at the end of the
//! file, where it is easiest to spot, between a begin marker line and an end
//! marker line.
//!
//! The patcher is pure: it maps current file content to new file content and
//! never touches the filesystem. Content outside the marker span comes out
//! byte-identical.

use crate::patch::BlockMarkers;

/// Insert or remove one marker-delimited block of opaque text.
#[derive(Clone, Debug)]
pub struct TextBlockPatcher {
    markers: BlockMarkers,
}

impl TextBlockPatcher {
    /// Construct new text block patcher with the given marker pair.
    pub fn new(markers: BlockMarkers) -> Self {
        Self { markers }
    }

    /// Check whether the block is already present.
    ///
    /// True iff the begin marker appears anywhere in `content`.
    pub fn is_applied(&self, content: &str) -> bool {
        content.contains(self.markers.begin.as_str())
    }

    /// Append the marker-delimited block to `content`.
    ///
    /// Inserts a separator newline, the begin marker on its own line, the
    /// payload verbatim (newline-terminated if it is not already), and the
    /// end marker on its own line with a trailing newline.
    ///
    /// # Errors
    ///
    /// - Return [`Error::AlreadyApplied`] if the begin marker is already
    ///   present. The block is never inserted twice.
    pub fn apply(&self, content: &str, payload: &str) -> Result<String> {
        if self.is_applied(content) {
            return Err(Error::AlreadyApplied);
        }

        let mut patched = String::with_capacity(
            content.len() + payload.len() + self.markers.begin.len() + self.markers.end.len() + 4,
        );
        patched.push_str(content);
        patched.push('\n');
        patched.push_str(self.markers.begin.as_str());
        patched.push('\n');
        patched.push_str(payload);
        if !payload.ends_with('\n') {
            patched.push('\n');
        }
        patched.push_str(self.markers.end.as_str());
        patched.push('\n');

        Ok(patched)
    }

    /// Remove the marker-delimited block from `content`.
    ///
    /// Removes the minimal span from the begin marker through the first end
    /// marker that follows it, both inclusive, plus exactly one trailing
    /// newline. The newline immediately before the begin marker is the
    /// separator [`TextBlockPatcher::apply`] inserted, so it is removed too,
    /// making revert the exact inverse of apply. Everything else comes out
    /// byte-identical.
    ///
    /// # Errors
    ///
    /// - Return [`Error::NotApplied`] if no begin marker is present.
    /// - Return [`Error::CorruptBlock`] if a begin marker has no end marker
    ///   after it. The content is handed back to the caller untouched in the
    ///   sense that no partial removal is ever produced.
    pub fn revert(&self, content: &str) -> Result<String> {
        let begin = content
            .find(self.markers.begin.as_str())
            .ok_or(Error::NotApplied)?;
        let end = content[begin..]
            .find(self.markers.end.as_str())
            .ok_or(Error::CorruptBlock)?;

        let mut span_start = begin;
        if span_start > 0 && content.as_bytes()[span_start - 1] == b'\n' {
            span_start -= 1;
        }
        let mut span_end = begin + end + self.markers.end.len();
        if content[span_end..].starts_with('\n') {
            span_end += 1;
        }

        let mut reverted = String::with_capacity(content.len() - (span_end - span_start));
        reverted.push_str(&content[..span_start]);
        reverted.push_str(&content[span_end..]);

        Ok(reverted)
    }
}

impl Default for TextBlockPatcher {
    fn default() -> Self {
        Self::new(BlockMarkers::symbols())
    }
}

/// Text block patching error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Begin marker already present; the block is never inserted twice.
    #[error("block markers already present")]
    AlreadyApplied,

    /// No begin marker present; there is nothing to remove.
    #[error("no block markers present")]
    NotApplied,

    /// Begin marker present without a matching end marker.
    #[error("begin marker has no matching end marker")]
    CorruptBlock,
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
