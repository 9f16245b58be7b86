//! DFHack and the plugins that run inside it

use std::path::Path;

use super::Staging;
use crate::error::ExtractError;
use crate::extract::{
    make_executable, move_children, move_into, read_dir, remove_staging, single_subdir, unpack,
};
use crate::logging::log_warning;

const DFHACK_EXECUTABLES: [&str; 2] = ["dfhack", "dfhack-run"];

pub fn extract_dfhack(staging: &Staging<'_>, archive: &Path) -> Result<(), ExtractError> {
    let df_dir = staging.df_dir();
    unpack(archive, &df_dir)?;

    if !staging.windows_build() {
        for exe in DFHACK_EXECUTABLES {
            make_executable(&df_dir.join(exe))?;
        }
    }
    Ok(())
}

/// TWBT archives carry one plugin folder per DFHack release next to the
/// lua scripts, tile art and an `overrides.txt`.
pub fn extract_twbt(staging: &Staging<'_>, archive: &Path) -> Result<(), ExtractError> {
    let twbt_dir = staging.release_dir.join("twbt");
    let df_dir = staging.df_dir();
    unpack(archive, &twbt_dir)?;

    let plugin_dir = single_subdir(&twbt_dir, "TWBT plugin folder")?;
    move_children(&plugin_dir, &df_dir.join("hack").join("plugins"))?;

    for path in read_dir(&twbt_dir)? {
        if !path.is_file() {
            continue;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("lua") => {
                move_into(&path, &df_dir.join("hack").join("lua"))?;
            }
            Some("png") => {
                move_into(&path, &df_dir.join("data").join("art"))?;
            }
            _ => {}
        }
    }

    let overrides = twbt_dir.join("overrides.txt");
    if overrides.is_file() {
        move_into(&overrides, &df_dir.join("data").join("init"))?;
    } else {
        log_warning("TWBT archive has no overrides.txt");
    }

    remove_staging(&twbt_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::write_zip;
    use std::fs;

    fn staging(dir: &Path) -> Staging<'_> {
        Staging {
            release_dir: dir,
            platform: "lin64".parse().unwrap(),
            compat_layer: false,
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_dfhack_into_df_and_executable() {
        use std::os::unix::fs::PermissionsExt;

        let cache = tempfile::tempdir().unwrap();
        let release = tempfile::tempdir().unwrap();
        let archive = cache.path().join("dfhack-50.13-r1-Linux-64bit.zip");
        write_zip(&archive, &[("dfhack", b"#!/bin/sh"), ("hack/", b"")]);

        extract_dfhack(&staging(release.path()), &archive).unwrap();
        let exe = release.path().join("df/dfhack");
        assert_eq!(fs::metadata(exe).unwrap().permissions().mode() & 0o111, 0o111);
        assert!(release.path().join("df/hack").is_dir());
    }

    #[test]
    fn test_twbt_layout() {
        let cache = tempfile::tempdir().unwrap();
        let release = tempfile::tempdir().unwrap();
        let art = release.path().join("df/data/art");
        fs::create_dir_all(&art).unwrap();
        fs::write(art.join("white1px.png"), b"old").unwrap();
        fs::create_dir_all(release.path().join("df/data/init")).unwrap();
        fs::write(release.path().join("df/data/init/overrides.txt"), b"old").unwrap();

        let archive = cache.path().join("twbt-6.61-linux64-0.47.05.zip");
        write_zip(
            &archive,
            &[
                ("__MACOSX/", b""),
                ("0.47.05-r1/", b""),
                ("0.47.05-r1/twbt.plug.so", b"so"),
                ("mapshot.lua", b"lua"),
                ("white1px.png", b"new"),
                ("overrides.txt", b"new"),
            ],
        );

        extract_twbt(&staging(release.path()), &archive).unwrap();
        assert!(release.path().join("df/hack/plugins/twbt.plug.so").is_file());
        assert!(release.path().join("df/hack/lua/mapshot.lua").is_file());
        assert_eq!(fs::read(art.join("white1px.png")).unwrap(), b"new");
        assert_eq!(
            fs::read(release.path().join("df/data/init/overrides.txt")).unwrap(),
            b"new"
        );
        assert!(!release.path().join("twbt").exists());
    }

    #[test]
    fn test_twbt_ambiguous_plugin_folder() {
        let cache = tempfile::tempdir().unwrap();
        let release = tempfile::tempdir().unwrap();
        let archive = cache.path().join("twbt.zip");
        write_zip(&archive, &[("0.47.04-r5/", b""), ("0.47.05-r1/", b"")]);

        let err = extract_twbt(&staging(release.path()), &archive).unwrap_err();
        assert!(matches!(err, ExtractError::Ambiguous { .. }));
    }
}
