//! Launcher and companion utilities

use std::path::Path;

use super::Staging;
use crate::error::ExtractError;
use crate::extract::{ditto, unpack, DiskImage};

/// PyLNP unpacks into the release root next to `df/`
pub fn extract_pylnp(staging: &Staging<'_>, archive: &Path) -> Result<(), ExtractError> {
    unpack(archive, staging.release_dir)
}

/// Dwarf Therapist goes under `LNP/utilities`; macOS builds ship as a disk image
pub fn extract_therapist(staging: &Staging<'_>, archive: &Path) -> Result<(), ExtractError> {
    let utilities = staging.lnp_dir().join("utilities");

    if is_disk_image(archive) {
        let image = DiskImage::attach(archive)?;
        ditto(image.mount_point(), &utilities)?;
        image.detach()
    } else {
        unpack(archive, &utilities)
    }
}

pub fn extract_soundsense(staging: &Staging<'_>, archive: &Path) -> Result<(), ExtractError> {
    unpack(archive, &staging.lnp_dir().join("utilities").join("soundsense"))
}

fn is_disk_image(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("dmg"))
}
