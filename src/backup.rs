// SPDX-FileCopyrightText: 2026 dpekbd developers
// SPDX-License-Identifier: MIT

//! Backup trail for patched files.
//!
//! Every file dpekbd is about to rewrite gets copied into one designated
//! backup directory first. Backups are the recovery mechanism: dpekbd never
//! rolls anything back itself, it only guarantees that a byte-for-byte
//! pre-mutation copy exists for the operator to restore by hand.
//!
//! # Backup Naming
//!
//! A backup is named `<filename>.<YYYYMMDDHHMMSS>.<NN>.bak`, embedding the
//! original file name, a second-granularity timestamp, and a two-digit
//! sequence number that disambiguates multiple backups of the same file
//! within the same second. Lexicographic order of these names is
//! chronological order, so a plain sorted directory listing reads as a
//! timeline.
//!
//! # Invariant
//!
//! Backups are append-only. A backup file is never overwritten or deleted by
//! dpekbd; name collisions fail loudly instead of clobbering an existing
//! copy.

use chrono::Local;
use std::{
    fs::{read, read_dir, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::info;

/// Upper bound on same-second backups of one file before creation fails.
const MAX_SEQUENCE: u32 = 100;

/// Identifier of one backup: the file name inside the backup directory.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct BackupId(String);

impl BackupId {
    /// Treat backup identifier as [`str`] slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for BackupId {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.write_str(self.0.as_str())
    }
}

/// Store of timestamped pre-mutation copies.
///
/// Owns the backup directory and every file inside it. The directory is
/// created lazily on the first [`BackupStore::create`] call.
#[derive(Clone, Debug)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    /// Construct new backup store rooted at `dir`.
    ///
    /// Does not touch the filesystem.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Backup directory this store writes into.
    pub fn dir(&self) -> &Path {
        self.dir.as_path()
    }

    /// Copy `path` into the backup directory.
    ///
    /// Reads the source fully and writes it under a fresh timestamped name.
    /// The source file itself is never modified.
    ///
    /// # Errors
    ///
    /// - Return [`Error::SourceNotFound`] if `path` does not exist.
    /// - Return [`Error::ReadSource`] if the source cannot be read.
    /// - Return [`Error::CreateBackupDir`] if the backup directory cannot be
    ///   created.
    /// - Return [`Error::WriteBackup`] if the copy cannot be written.
    /// - Return [`Error::BackupExists`] if every candidate name for this
    ///   second is already taken.
    pub fn create(&self, path: impl AsRef<Path>) -> Result<BackupId> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Error::SourceNotFound {
                path: path.to_path_buf(),
            })?;
        let contents = read(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => Error::SourceNotFound {
                path: path.to_path_buf(),
            },
            _ => Error::ReadSource {
                source: err,
                path: path.to_path_buf(),
            },
        })?;

        mkdirp::mkdirp(&self.dir).map_err(|err| Error::CreateBackupDir {
            source: err,
            dir: self.dir.clone(),
        })?;

        let stamp = Local::now().format("%Y%m%d%H%M%S");
        for sequence in 0..MAX_SEQUENCE {
            let name = format!("{filename}.{stamp}.{sequence:02}.bak");
            let backup_path = self.dir.join(&name);

            // INVARIANT: Never overwrite an existing backup.
            let file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&backup_path);
            let mut file = match file {
                Ok(file) => file,
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(err) => {
                    return Err(Error::WriteBackup {
                        source: err,
                        path: backup_path,
                    })
                }
            };

            file.write_all(&contents).map_err(|err| Error::WriteBackup {
                source: err,
                path: backup_path.clone(),
            })?;
            info!("backed up {} to {}", path.display(), backup_path.display());

            return Ok(BackupId(name));
        }

        Err(Error::BackupExists {
            path: path.to_path_buf(),
            dir: self.dir.clone(),
        })
    }

    /// List every backup ever created, oldest first.
    ///
    /// A backup directory that was never created yields an empty listing,
    /// not an error.
    ///
    /// # Errors
    ///
    /// - Return [`Error::ListBackups`] if the backup directory exists but
    ///   cannot be read.
    pub fn list(&self) -> Result<Vec<BackupId>> {
        let entries = match read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(Error::ListBackups {
                    source: err,
                    dir: self.dir.clone(),
                })
            }
        };

        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| Error::ListBackups {
                source: err,
                dir: self.dir.clone(),
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".bak") {
                backups.push(BackupId(name));
            }
        }
        backups.sort();

        Ok(backups)
    }

    /// Resolve a backup identifier to the concrete file it names.
    ///
    /// Restoration from that file is a manual administrative action; dpekbd
    /// only hands out the path.
    ///
    /// # Errors
    ///
    /// - Return [`Error::NotFound`] if the identifier is not a plain backup
    ///   file name, or if no backup with that identifier exists.
    pub fn locate(&self, id: impl AsRef<str>) -> Result<PathBuf> {
        let id = id.as_ref();

        // Backup ids are bare `.bak` file names. Anything with a path
        // separator could resolve outside the store's directory.
        if id.contains(['/', '\\']) || !id.ends_with(".bak") {
            return Err(Error::NotFound { id: id.to_owned() });
        }

        let path = self.dir.join(id);
        if !path.is_file() {
            return Err(Error::NotFound { id: id.to_owned() });
        }

        Ok(path)
    }
}

/// Backup trail error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File to back up does not exist.
    #[error("no such file to back up: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// File to back up cannot be read.
    #[error("failed to read {} for backup", path.display())]
    ReadSource {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Backup directory cannot be created.
    #[error("failed to create backup directory {}", dir.display())]
    CreateBackupDir {
        #[source]
        source: std::io::Error,
        dir: PathBuf,
    },

    /// Backup copy cannot be written.
    #[error("failed to write backup {}", path.display())]
    WriteBackup {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Every candidate backup name is already taken.
    #[error("all backup names for {} are taken in {}", path.display(), dir.display())]
    BackupExists { path: PathBuf, dir: PathBuf },

    /// Backup directory cannot be listed.
    #[error("failed to list backup directory {}", dir.display())]
    ListBackups {
        #[source]
        source: std::io::Error,
        dir: PathBuf,
    },

    /// No backup matches the given identifier.
    #[error("no backup named {id:?}")]
    NotFound { id: String },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
