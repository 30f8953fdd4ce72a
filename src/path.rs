// SPDX-FileCopyrightText: 2026 dpekbd developers
// SPDX-License-Identifier: MIT

//! Default locations of the files dpekbd works on.
//!
//! These are the stock paths on Debian-family X11 installations. Every
//! command accepts overrides for them, which is also how the test suite
//! points the tool at throwaway copies.

/// Flat-text XKB symbols file the layout definition is appended to.
pub const SYMBOLS_FILE: &str = "/usr/share/X11/xkb/symbols/us";

/// XML XKB rules registry the variant entry is inserted into.
pub const RULES_FILE: &str = "/usr/share/X11/xkb/rules/evdev.xml";

/// Directory that receives timestamped backups of both files.
pub const BACKUP_DIR: &str = "/var/backups/dpe_keyboard";

/// Layout definition file read for the symbols payload, relative to the
/// current working directory unless overridden.
pub const LAYOUT_FILE: &str = "us-dpe";
