// SPDX-FileCopyrightText: 2026 dpekbd developers
// SPDX-License-Identifier: MIT

//! Marker-delimited patch engine for XKB configuration files.
//!
//! Registering a third-party keyboard layout variant on a stock X11 system
//! means editing two files the distribution owns: the flat-text symbols file
//! (`/usr/share/X11/xkb/symbols/us`) and the XML rules registry
//! (`/usr/share/X11/xkb/rules/evdev.xml`). Package managers know nothing
//! about these edits, so dpekbd wraps everything it inserts in recognizable
//! __marker__ pairs. The markers make every change detectable (re-running
//! install is a no-op), removable (uninstall deletes exactly the delimited
//! span), and auditable (hand-authored content is never touched).
//!
//! # Components
//!
//! - [`BackupStore`]: timestamped, append-only copies of a target file taken
//!   before every mutation.
//! - [`TextBlockPatcher`]: inserts and removes a marker-delimited block of
//!   opaque text at the end of the symbols file.
//! - [`XmlVariantPatcher`]: inserts and removes a marker-delimited `variant`
//!   element inside the `us` layout's variant list of the rules file,
//!   leaving every other node byte-identical.
//! - [`Installer`]: sequences backups and both patchers into one logical
//!   install or uninstall of the layout.
//!
//! The patchers are pure content-in/content-out functions. All file I/O is
//! confined to [`Installer`], which keeps the patch logic unit-testable
//! without a filesystem.

pub mod backup;
pub mod install;
pub mod patch;
pub mod path;

pub use backup::{BackupId, BackupStore};
pub use install::Installer;
pub use patch::{
    text::TextBlockPatcher, xml::XmlVariantPatcher, BlockMarkers, TargetLayout, VariantRecord,
};
