// SPDX-FileCopyrightText: 2026 dpekbd developers
// SPDX-License-Identifier: MIT

//! Install and uninstall orchestration.
//!
//! One logical install (or uninstall) of the layout touches two independent
//! files: the flat-text symbols file and the XML rules registry. The
//! [`Installer`] runs the symbols step first and the rules step second, and
//! owns every byte of file I/O; the patchers themselves only map content to
//! content.
//!
//! # Step Policy
//!
//! Each file's patch state is independent, and one file's state never blocks
//! the other's step:
//!
//! - A step whose patch is already in the requested state (block already
//!   present on install, already absent on uninstall) is logged and skipped;
//!   the other step still runs and the whole operation still succeeds.
//!   Re-running install or uninstall is always safe.
//! - Any other failure aborts the remaining steps and surfaces with the
//!   offending file attached.
//!
//! # Backups
//!
//! The new content for a file is computed first; a backup of the old content
//! is taken only once there is something to write, immediately before the
//! write. A skipped or failed patch therefore leaves no backup behind, while
//! every write is preceded by exactly one fresh copy of what it replaces.
//! Backups are never deleted, even when the write after them fails, and no
//! automatic rollback is ever attempted: restoring from a backup is a manual
//! administrative action.
//!
//! If the process dies between the two steps, one file is left patched and
//! the other untouched. Re-running the same command converges both.

use crate::{
    backup::BackupStore,
    patch::{text, text::TextBlockPatcher, xml, xml::XmlVariantPatcher, VariantRecord},
};

use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};
use tracing::{info, warn};

/// Orchestrate backups and both patchers into one install/uninstall.
#[derive(Clone, Debug)]
pub struct Installer {
    symbols_path: PathBuf,
    rules_path: PathBuf,
    backups: BackupStore,
    symbols: TextBlockPatcher,
    rules: XmlVariantPatcher,
}

impl Installer {
    /// Construct new installer over the given target files, using the
    /// default DPE markers and the `us`/`en` base layout.
    pub fn new(
        symbols_path: impl Into<PathBuf>,
        rules_path: impl Into<PathBuf>,
        backups: BackupStore,
    ) -> Self {
        Self {
            symbols_path: symbols_path.into(),
            rules_path: rules_path.into(),
            backups,
            symbols: TextBlockPatcher::default(),
            rules: XmlVariantPatcher::default(),
        }
    }

    /// Backup store this installer writes pre-mutation copies into.
    pub fn backups(&self) -> &BackupStore {
        &self.backups
    }

    /// Install the layout: append the definition block to the symbols file,
    /// then register the variant in the rules file.
    ///
    /// # Errors
    ///
    /// - Return [`Error::ReadFile`]/[`Error::WriteFile`] if a target file
    ///   cannot be read or rewritten.
    /// - Return [`Error::PatchRules`] if the rules registry is malformed,
    ///   lacks the base layout, or lacks a variant list.
    /// - Return [`Error::Backup`] if the pre-write backup cannot be taken.
    pub fn install(&self, layout: &str, variant: &VariantRecord) -> Result<()> {
        self.apply_symbols(layout)?;
        self.apply_rules(variant)?;

        Ok(())
    }

    /// Uninstall the layout: remove the definition block from the symbols
    /// file, then remove the variant from the rules file.
    ///
    /// # Errors
    ///
    /// - Return [`Error::PatchSymbols`]/[`Error::PatchRules`] if a marker
    ///   block is corrupt (begin marker without matching end marker); the
    ///   file on disk is left untouched.
    /// - Return [`Error::ReadFile`]/[`Error::WriteFile`] if a target file
    ///   cannot be read or rewritten.
    /// - Return [`Error::Backup`] if the pre-write backup cannot be taken.
    pub fn uninstall(&self) -> Result<()> {
        self.revert_symbols()?;
        self.revert_rules()?;

        Ok(())
    }

    fn apply_symbols(&self, layout: &str) -> Result<()> {
        let content = self.read(&self.symbols_path)?;
        let patched = match self.symbols.apply(&content, layout) {
            Ok(patched) => patched,
            Err(text::Error::AlreadyApplied) => {
                warn!(
                    "layout block already present in {}; skipping",
                    self.symbols_path.display()
                );
                return Ok(());
            }
            Err(source) => {
                return Err(Error::PatchSymbols {
                    source,
                    path: self.symbols_path.clone(),
                })
            }
        };

        self.commit(&self.symbols_path, &patched)?;
        info!("appended layout block to {}", self.symbols_path.display());

        Ok(())
    }

    fn revert_symbols(&self) -> Result<()> {
        let content = self.read(&self.symbols_path)?;
        let reverted = match self.symbols.revert(&content) {
            Ok(reverted) => reverted,
            Err(text::Error::NotApplied) => {
                warn!(
                    "no layout block in {}; skipping",
                    self.symbols_path.display()
                );
                return Ok(());
            }
            Err(source) => {
                return Err(Error::PatchSymbols {
                    source,
                    path: self.symbols_path.clone(),
                })
            }
        };

        self.commit(&self.symbols_path, &reverted)?;
        info!("removed layout block from {}", self.symbols_path.display());

        Ok(())
    }

    fn apply_rules(&self, variant: &VariantRecord) -> Result<()> {
        let content = self.read(&self.rules_path)?;
        let patched = match self.rules.apply(&content, variant) {
            Ok(patched) => patched,
            Err(xml::Error::AlreadyApplied) => {
                warn!(
                    "variant {:?} already registered in {}; skipping",
                    variant.name,
                    self.rules_path.display()
                );
                return Ok(());
            }
            Err(source) => {
                return Err(Error::PatchRules {
                    source,
                    path: self.rules_path.clone(),
                })
            }
        };

        self.commit(&self.rules_path, &patched)?;
        info!(
            "registered variant {:?} in {}",
            variant.name,
            self.rules_path.display()
        );

        Ok(())
    }

    fn revert_rules(&self) -> Result<()> {
        let content = self.read(&self.rules_path)?;
        let reverted = match self.rules.revert(&content) {
            Ok(reverted) => reverted,
            Err(xml::Error::NotApplied) => {
                warn!(
                    "no variant registered in {}; skipping",
                    self.rules_path.display()
                );
                return Ok(());
            }
            Err(source) => {
                return Err(Error::PatchRules {
                    source,
                    path: self.rules_path.clone(),
                })
            }
        };

        self.commit(&self.rules_path, &reverted)?;
        info!("removed variant from {}", self.rules_path.display());

        Ok(())
    }

    fn read(&self, path: &Path) -> Result<String> {
        read_to_string(path).map_err(|source| Error::ReadFile {
            source,
            path: path.to_path_buf(),
        })
    }

    /// Back up `path`, then replace its content.
    fn commit(&self, path: &Path, content: &str) -> Result<()> {
        self.backups.create(path)?;
        write(path, content).map_err(|source| Error::WriteFile {
            source,
            path: path.to_path_buf(),
        })?;

        Ok(())
    }
}

/// Install/uninstall orchestration error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Pre-write backup failed.
    #[error(transparent)]
    Backup(#[from] crate::backup::Error),

    /// Symbols file step failed.
    #[error("failed to patch symbols file {}", path.display())]
    PatchSymbols {
        #[source]
        source: text::Error,
        path: PathBuf,
    },

    /// Rules file step failed.
    #[error("failed to patch rules file {}", path.display())]
    PatchRules {
        #[source]
        source: xml::Error,
        path: PathBuf,
    },

    /// Target file cannot be read.
    #[error("failed to read {}", path.display())]
    ReadFile {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Target file cannot be rewritten.
    #[error("failed to write {}", path.display())]
    WriteFile {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
