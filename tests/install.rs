// SPDX-FileCopyrightText: 2026 dpekbd developers
// SPDX-License-Identifier: MIT

//! End-to-end install/uninstall runs against throwaway copies of the two
//! target files.

use dpekbd::{install, patch, BackupStore, Installer, VariantRecord};

use indoc::indoc;
use pretty_assertions::assert_eq;
use std::{
    fs::{read_to_string, write},
    path::PathBuf,
};
use tempfile::{tempdir, TempDir};

const SYMBOLS: &str = "keycodes xyz\n";

const RULES: &str = indoc! {r#"
    <?xml version="1.0" encoding="utf-8"?>
    <xkbConfigRegistry version="1.1">
      <layoutList>
        <layout>
          <configItem>
            <name>us</name>
            <shortDescription>en</shortDescription>
            <description>English (US)</description>
          </configItem>
          <variantList>
          </variantList>
        </layout>
      </layoutList>
    </xkbConfigRegistry>
"#};

const RULES_WITHOUT_US: &str = indoc! {r#"
    <?xml version="1.0" encoding="utf-8"?>
    <xkbConfigRegistry version="1.1">
      <layoutList>
        <layout>
          <configItem>
            <name>de</name>
            <shortDescription>de</shortDescription>
          </configItem>
          <variantList>
          </variantList>
        </layout>
      </layoutList>
    </xkbConfigRegistry>
"#};

const LAYOUT: &str = "partial alphanumeric_keys\nxkb_symbols \"dpe\" {\n    include \"us(dvp)\"\n};\n";

struct Fixture {
    _root: TempDir,
    installer: Installer,
    symbols: PathBuf,
    rules: PathBuf,
}

fn fixture(rules: &str) -> anyhow::Result<Fixture> {
    let root = tempdir()?;
    let symbols = root.path().join("us");
    let rules_path = root.path().join("evdev.xml");
    write(&symbols, SYMBOLS)?;
    write(&rules_path, rules)?;

    let installer = Installer::new(
        &symbols,
        &rules_path,
        BackupStore::new(root.path().join("backups")),
    );

    Ok(Fixture {
        _root: root,
        installer,
        symbols,
        rules: rules_path,
    })
}

#[test]
fn install_then_uninstall_round_trip() -> anyhow::Result<()> {
    let fix = fixture(RULES)?;

    fix.installer.install(LAYOUT, &VariantRecord::default())?;

    let symbols = read_to_string(&fix.symbols)?;
    let expect = format!("{SYMBOLS}\n// DPE-BEGIN\n{LAYOUT}// DPE-END\n");
    assert_eq!(symbols, expect);

    let rules = read_to_string(&fix.rules)?;
    assert!(rules.contains("<!-- DPE-BEGIN -->"));
    assert!(rules.contains("<name>dpe</name>"));
    assert!(rules.contains("<description>English (Programmer Dvorak Eur. Keys)</description>"));

    // One backup per mutated file, each a byte-for-byte pre-mutation copy.
    let backups = fix.installer.backups().list()?;
    assert_eq!(backups.len(), 2);
    for backup in &backups {
        let copy = read_to_string(fix.installer.backups().locate(backup.as_str())?)?;
        if backup.as_str().starts_with("us.") {
            assert_eq!(copy, SYMBOLS);
        } else {
            assert!(backup.as_str().starts_with("evdev.xml."));
            assert_eq!(copy, RULES);
        }
    }

    fix.installer.uninstall()?;
    assert_eq!(read_to_string(&fix.symbols)?, SYMBOLS);
    assert_eq!(read_to_string(&fix.rules)?, RULES);
    assert_eq!(fix.installer.backups().list()?.len(), 4);

    Ok(())
}

#[test]
fn second_install_is_benign_noop() -> anyhow::Result<()> {
    let fix = fixture(RULES)?;

    fix.installer.install(LAYOUT, &VariantRecord::default())?;
    let symbols = read_to_string(&fix.symbols)?;
    let rules = read_to_string(&fix.rules)?;

    fix.installer.install(LAYOUT, &VariantRecord::default())?;
    assert_eq!(read_to_string(&fix.symbols)?, symbols);
    assert_eq!(read_to_string(&fix.rules)?, rules);

    // Skipped steps write nothing, so they back up nothing.
    assert_eq!(fix.installer.backups().list()?.len(), 2);

    Ok(())
}

#[test]
fn uninstall_on_pristine_files_is_benign_noop() -> anyhow::Result<()> {
    let fix = fixture(RULES)?;

    fix.installer.uninstall()?;
    assert_eq!(read_to_string(&fix.symbols)?, SYMBOLS);
    assert_eq!(read_to_string(&fix.rules)?, RULES);
    assert_eq!(fix.installer.backups().list()?.len(), 0);

    Ok(())
}

#[test]
fn missing_base_layout_aborts_rules_step() -> anyhow::Result<()> {
    let fix = fixture(RULES_WITHOUT_US)?;

    let error = fix
        .installer
        .install(LAYOUT, &VariantRecord::default())
        .unwrap_err();
    assert!(matches!(
        error,
        install::Error::PatchRules {
            source: patch::xml::Error::TargetLayoutNotFound { .. },
            ..
        }
    ));

    // Symbols step ran; rules file is untouched and was never backed up.
    assert!(read_to_string(&fix.symbols)?.contains("// DPE-BEGIN"));
    assert_eq!(read_to_string(&fix.rules)?, RULES_WITHOUT_US);
    let backups = fix.installer.backups().list()?;
    assert_eq!(backups.len(), 1);
    assert!(backups[0].as_str().starts_with("us."));

    Ok(())
}

#[test]
fn corrupt_symbols_block_aborts_without_touching_files() -> anyhow::Result<()> {
    let fix = fixture(RULES)?;
    let corrupt = format!("{SYMBOLS}\n// DPE-BEGIN\norphaned payload\n");
    write(&fix.symbols, &corrupt)?;

    let error = fix.installer.uninstall().unwrap_err();
    assert!(matches!(
        error,
        install::Error::PatchSymbols {
            source: patch::text::Error::CorruptBlock,
            ..
        }
    ));

    assert_eq!(read_to_string(&fix.symbols)?, corrupt);
    assert_eq!(read_to_string(&fix.rules)?, RULES);
    assert_eq!(fix.installer.backups().list()?.len(), 0);

    Ok(())
}
