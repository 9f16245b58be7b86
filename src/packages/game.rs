//! Dwarf Fortress itself

use std::path::Path;

use super::Staging;
use crate::error::ExtractError;
use crate::extract::{make_executable, move_entry, single_entry, unpack};

const WINDOWS_EXECUTABLES: [&str; 2] = ["dfhack.exe", "Dwarf Fortress.exe"];

/// Windows archives hold the game files at top level and go straight into
/// `df/`. Linux and macOS archives wrap them in one folder (`df_linux`,
/// `df_osx`) which is renamed to `df/`.
pub fn extract(staging: &Staging<'_>, archive: &Path) -> Result<(), ExtractError> {
    let df_dir = staging.df_dir();

    if staging.windows_build() {
        unpack(archive, &df_dir)?;
    } else {
        unpack(archive, staging.release_dir)?;
        let unpacked = single_entry(staging.release_dir, "unpacked df folder", |name, _| {
            name.contains("df") && name != "df"
        });
        let unpacked = match unpacked {
            Ok(path) => path,
            // An archive whose folder is already called `df` needs no rename
            Err(ExtractError::Missing { .. }) if df_dir.is_dir() => return Ok(()),
            Err(e) => return Err(e),
        };
        move_entry(&unpacked, &df_dir)?;
    }

    if staging.compat_layer {
        for exe in WINDOWS_EXECUTABLES {
            make_executable(&df_dir.join(exe))?;
        }
    }

    Ok(())
}
