// SPDX-FileCopyrightText: 2026 dpekbd developers
// SPDX-License-Identifier: MIT

use dpekbd::{path, patch, BackupStore, Installer, VariantRecord};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{fs::read_to_string, path::PathBuf, process::exit};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  dpekbd [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command {
            Command::Install(opts) => run_install(opts),
            Command::Uninstall(opts) => run_uninstall(opts),
            Command::ListBackups(opts) => run_list_backups(opts),
            Command::ShowBackupLocation(opts) => run_show_backup_location(opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Install the layout variant into the system XKB files.
    #[command(override_usage = "sudo dpekbd install [options]")]
    Install(InstallOptions),

    /// Remove the layout variant from the system XKB files.
    #[command(override_usage = "sudo dpekbd uninstall [options]")]
    Uninstall(UninstallOptions),

    /// List every backup taken so far, oldest first.
    #[command(override_usage = "dpekbd list-backups [options]")]
    ListBackups(ListBackupsOptions),

    /// Print the backup directory, or the full path of one backup.
    #[command(override_usage = "dpekbd show-backup-location [options] [backup_id]")]
    ShowBackupLocation(ShowBackupLocationOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InstallOptions {
    /// Layout definition file appended to the symbols file.
    #[arg(short, long, value_name = "path", default_value = path::LAYOUT_FILE)]
    pub layout_file: String,

    /// Stable name the variant is registered under.
    #[arg(short = 'n', long, value_name = "name", default_value = patch::VARIANT_NAME)]
    pub variant_name: String,

    /// Human-readable description shown by layout pickers.
    #[arg(short, long, value_name = "text", default_value = patch::VARIANT_DESCRIPTION)]
    pub description: String,

    /// XKB symbols file to patch.
    #[arg(short, long, value_name = "path", default_value = path::SYMBOLS_FILE)]
    pub symbols_file: String,

    /// XKB rules registry to patch.
    #[arg(short, long, value_name = "path", default_value = path::RULES_FILE)]
    pub rules_file: String,

    /// Directory that receives pre-mutation backups.
    #[arg(short, long, value_name = "path", default_value = path::BACKUP_DIR)]
    pub backup_dir: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct UninstallOptions {
    /// XKB symbols file to patch.
    #[arg(short, long, value_name = "path", default_value = path::SYMBOLS_FILE)]
    pub symbols_file: String,

    /// XKB rules registry to patch.
    #[arg(short, long, value_name = "path", default_value = path::RULES_FILE)]
    pub rules_file: String,

    /// Directory that receives pre-mutation backups.
    #[arg(short, long, value_name = "path", default_value = path::BACKUP_DIR)]
    pub backup_dir: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ListBackupsOptions {
    /// Directory the backups live in.
    #[arg(short, long, value_name = "path", default_value = path::BACKUP_DIR)]
    pub backup_dir: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ShowBackupLocationOptions {
    /// Backup identifier to resolve; omit to print the backup directory.
    #[arg(value_name = "backup_id")]
    pub backup_id: Option<String>,

    /// Directory the backups live in.
    #[arg(short, long, value_name = "path", default_value = path::BACKUP_DIR)]
    pub backup_dir: String,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_install(opts: InstallOptions) -> Result<()> {
    ensure_superuser()?;

    let layout_file = expand_path(&opts.layout_file)?;
    let layout = read_to_string(&layout_file)
        .with_context(|| format!("failed to read layout file {}", layout_file.display()))?;
    let variant = VariantRecord::new(opts.variant_name, opts.description);

    let installer = Installer::new(
        expand_path(&opts.symbols_file)?,
        expand_path(&opts.rules_file)?,
        BackupStore::new(expand_path(&opts.backup_dir)?),
    );
    installer.install(&layout, &variant)?;

    Ok(())
}

fn run_uninstall(opts: UninstallOptions) -> Result<()> {
    ensure_superuser()?;

    let installer = Installer::new(
        expand_path(&opts.symbols_file)?,
        expand_path(&opts.rules_file)?,
        BackupStore::new(expand_path(&opts.backup_dir)?),
    );
    installer.uninstall()?;

    Ok(())
}

fn run_list_backups(opts: ListBackupsOptions) -> Result<()> {
    let store = BackupStore::new(expand_path(&opts.backup_dir)?);
    for backup in store.list()? {
        println!("{backup}");
    }

    Ok(())
}

fn run_show_backup_location(opts: ShowBackupLocationOptions) -> Result<()> {
    let store = BackupStore::new(expand_path(&opts.backup_dir)?);
    match opts.backup_id {
        Some(id) => println!("{}", store.locate(id)?.display()),
        None => println!("{}", store.dir().display()),
    }

    Ok(())
}

/// Perform shell expansion on a user-supplied path.
fn expand_path(raw: &str) -> Result<PathBuf> {
    Ok(PathBuf::from(shellexpand::full(raw)?.into_owned()))
}

/// Refuse to touch system files without the rights to rewrite them.
#[cfg(unix)]
fn ensure_superuser() -> Result<()> {
    if !nix::unistd::Uid::effective().is_root() {
        anyhow::bail!("this command rewrites system files and must be run as root (use sudo)");
    }

    Ok(())
}

#[cfg(not(unix))]
fn ensure_superuser() -> Result<()> {
    Ok(())
}
