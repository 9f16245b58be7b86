//! Graphics and configuration bundles layered over the launcher

use std::path::{Path, PathBuf};

use super::Staging;
use crate::error::ExtractError;
use crate::extract::{ditto, merge_dirs, move_entry, remove_staging, single_entry, unpack, DiskImage};
use crate::logging::log_warning;

/// Launcher folders the starter pack contributes to
const STARTER_PACK_FOLDERS: [&str; 6] = [
    "colors", "defaults", "embarks", "graphics", "keybinds", "tilesets",
];

/// Merge the pack's launcher folders into `LNP/` without replacing anything
/// already there.
pub fn extract_starter_pack(staging: &Staging<'_>, archive: &Path) -> Result<(), ExtractError> {
    let pack_dir = staging.release_dir.join("PESP");
    unpack(archive, &pack_dir)?;

    let lnp = staging.lnp_dir();
    for folder in STARTER_PACK_FOLDERS {
        let source = pack_dir.join("LNP").join(folder);
        if source.is_dir() {
            merge_dirs(&source, &lnp.join(folder), false)?;
        } else {
            log_warning(&format!("PE Starter Pack has no LNP/{} folder", folder));
        }
    }

    remove_staging(&pack_dir)
}

/// The Lazy Mac Pack disk image holds one pack folder next to app bundles
/// and Finder metadata; its `LNP` becomes the launcher folder.
pub fn extract_lazy_mac_pack(staging: &Staging<'_>, archive: &Path) -> Result<(), ExtractError> {
    let pack_dir = staging.release_dir.join("LMP");

    let image = DiskImage::attach(archive)?;
    let pack = lazy_mac_pack_folder(image.mount_point())?;
    ditto(&pack, &pack_dir)?;
    image.detach()?;

    move_entry(&pack_dir.join("LNP"), &staging.lnp_dir())?;
    remove_staging(&pack_dir)
}

/// The pack folder on a mounted Lazy Mac Pack volume, ignoring app bundles
/// and Finder metadata
pub fn lazy_mac_pack_folder(volume: &Path) -> Result<PathBuf, ExtractError> {
    single_entry(volume, "Lazy Mac Pack folder", |name, _| {
        !name.contains("App") && !name.contains(".DS")
    })
}
