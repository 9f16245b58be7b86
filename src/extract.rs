//! Archive unpacking and staging-tree file operations

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use flate2::read::GzDecoder;
use tar::Archive;
use wait_timeout::ChildExt;
use walkdir::WalkDir;
use xz2::read::XzDecoder;

use crate::error::ExtractError;
use crate::logging::{log_install, log_warning};

const COMMAND_TIMEOUT_SECS: u64 = 300;

// ============================================================================
// Archives
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
    Zip,
    TarGz,
    TarBz2,
    TarXz,
    Tar,
    SevenZ,
}

impl ArchiveFormat {
    fn from_path(path: &Path) -> Option<Self> {
        Self::from_name(&path.file_name()?.to_string_lossy())
    }

    fn from_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
            Some(Self::TarBz2)
        } else if name.ends_with(".tar.xz") {
            Some(Self::TarXz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".7z") {
            Some(Self::SevenZ)
        } else {
            None
        }
    }
}

/// True for file names [`unpack`] or [`DiskImage::attach`] can handle
pub fn is_supported_artifact(name: &str) -> bool {
    ArchiveFormat::from_name(name).is_some() || name.to_lowercase().ends_with(".dmg")
}

/// Unpack `archive` into `dest`, creating it if needed. The format is chosen
/// by file extension.
pub fn unpack(archive: &Path, dest: &Path) -> Result<(), ExtractError> {
    let format = ArchiveFormat::from_path(archive)
        .ok_or_else(|| ExtractError::UnsupportedFormat(archive.to_path_buf()))?;

    fs::create_dir_all(dest).map_err(|e| ExtractError::io(dest, e))?;
    log_install(&format!("Unpacking {} into {}", archive.display(), dest.display()));

    let failed = |reason: String| ExtractError::Archive {
        archive: archive.to_path_buf(),
        reason,
    };

    if format == ArchiveFormat::SevenZ {
        return sevenz_rust::decompress_file(archive, dest).map_err(|e| failed(e.to_string()));
    }

    let file = fs::File::open(archive).map_err(|e| ExtractError::io(archive, e))?;
    match format {
        ArchiveFormat::Zip => {
            let mut zip = zip::ZipArchive::new(file).map_err(|e| failed(e.to_string()))?;
            zip.extract(dest).map_err(|e| failed(e.to_string()))
        }
        ArchiveFormat::TarGz => Archive::new(GzDecoder::new(file))
            .unpack(dest)
            .map_err(|e| failed(e.to_string())),
        ArchiveFormat::TarBz2 => Archive::new(bzip2::read::BzDecoder::new(file))
            .unpack(dest)
            .map_err(|e| failed(e.to_string())),
        ArchiveFormat::TarXz => Archive::new(XzDecoder::new(file))
            .unpack(dest)
            .map_err(|e| failed(e.to_string())),
        ArchiveFormat::Tar => Archive::new(file)
            .unpack(dest)
            .map_err(|e| failed(e.to_string())),
        ArchiveFormat::SevenZ => Ok(()),
    }
}

// ============================================================================
// Directory Operations
// ============================================================================

/// Copy the tree under `source` into `target`.
///
/// Existing files in `target` are kept unless `overwrite` is set, so running
/// it twice without overwrite changes nothing.
pub fn merge_dirs(source: &Path, target: &Path, overwrite: bool) -> Result<(), ExtractError> {
    fs::create_dir_all(target).map_err(|e| ExtractError::io(target, e))?;

    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            ExtractError::io(path, std::io::Error::other(e.to_string()))
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| ExtractError::io(entry.path(), std::io::Error::other(e.to_string())))?;
        let dest = target.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(|e| ExtractError::io(&dest, e))?;
        } else if overwrite || !dest.exists() {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| ExtractError::io(parent, e))?;
            }
            fs::copy(entry.path(), &dest).map_err(|e| ExtractError::io(&dest, e))?;
        }
    }
    Ok(())
}

/// Move `from` to exactly `to`, replacing a file already there.
///
/// Falls back to copy and delete when a rename is not possible, e.g. across
/// filesystems or onto an existing directory.
pub fn move_entry(from: &Path, to: &Path) -> Result<(), ExtractError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| ExtractError::io(parent, e))?;
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }

    if from.is_dir() {
        merge_dirs(from, to, true)?;
        fs::remove_dir_all(from).map_err(|e| ExtractError::io(from, e))
    } else {
        fs::copy(from, to).map_err(|e| ExtractError::io(to, e))?;
        fs::remove_file(from).map_err(|e| ExtractError::io(from, e))
    }
}

/// Move `from` into the directory `dir`, keeping its name
pub fn move_into(from: &Path, dir: &Path) -> Result<PathBuf, ExtractError> {
    let name = from.file_name().ok_or_else(|| ExtractError::Missing {
        what: "a file name".to_string(),
        dir: from.to_path_buf(),
    })?;
    let to = dir.join(name);
    move_entry(from, &to)?;
    Ok(to)
}

/// Move every entry of `from` into `to`
pub fn move_children(from: &Path, to: &Path) -> Result<(), ExtractError> {
    fs::create_dir_all(to).map_err(|e| ExtractError::io(to, e))?;
    for entry in read_dir(from)? {
        move_into(&entry, to)?;
    }
    Ok(())
}

/// Sorted entries of a directory
pub fn read_dir(dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| ExtractError::io(dir, e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();
    Ok(entries)
}

/// The one entry of `dir` accepted by `keep`; none or several is an error
pub fn single_entry(
    dir: &Path,
    what: &str,
    keep: impl Fn(&str, &Path) -> bool,
) -> Result<PathBuf, ExtractError> {
    let mut found: Vec<PathBuf> = read_dir(dir)?
        .into_iter()
        .filter(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            keep(&name, path)
        })
        .collect();

    match found.len() {
        1 => Ok(found.remove(0)),
        0 => Err(ExtractError::Missing {
            what: what.to_string(),
            dir: dir.to_path_buf(),
        }),
        _ => Err(ExtractError::Ambiguous {
            what: what.to_string(),
            dir: dir.to_path_buf(),
            found: found
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect(),
        }),
    }
}

/// The one visible subdirectory of `dir` (names starting with `.` or `_` are ignored)
pub fn single_subdir(dir: &Path, what: &str) -> Result<PathBuf, ExtractError> {
    single_entry(dir, what, |name, path| {
        path.is_dir() && !name.starts_with('.') && !name.starts_with('_')
    })
}

/// Set mode 0o755 on `path` if it exists
pub fn make_executable(path: &Path) -> Result<(), ExtractError> {
    if !path.exists() {
        return Ok(());
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mut perms = fs::metadata(path)
            .map_err(|e| ExtractError::io(path, e))?
            .permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).map_err(|e| ExtractError::io(path, e))?;
    }
    Ok(())
}

/// Delete a staging directory and everything under it
pub fn remove_staging(dir: &Path) -> Result<(), ExtractError> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| ExtractError::io(dir, e))?;
    }
    Ok(())
}

// ============================================================================
// External Commands
// ============================================================================

fn run_command(command: &mut Command, label: &str) -> Result<(), ExtractError> {
    let failed = |reason: String| ExtractError::Command {
        command: label.to_string(),
        reason,
    };

    let mut child = command
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| failed(e.to_string()))?;

    let timeout = Duration::from_secs(COMMAND_TIMEOUT_SECS);
    match child.wait_timeout(timeout).map_err(|e| failed(e.to_string()))? {
        Some(status) if status.success() => Ok(()),
        Some(status) => Err(failed(format!("exit code {:?}", status.code()))),
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Err(failed(format!("timed out after {} seconds", COMMAND_TIMEOUT_SECS)))
        }
    }
}

/// Copy a tree with `ditto`, which keeps macOS metadata and bundles intact
pub fn ditto(from: &Path, to: &Path) -> Result<(), ExtractError> {
    run_command(Command::new("ditto").arg(from).arg(to), "ditto")
}

/// A mounted macOS disk image; detached on drop
pub struct DiskImage {
    mount_point: PathBuf,
    attached: bool,
}

impl DiskImage {
    /// Mount `dmg` under `/Volumes/<file stem>`
    pub fn attach(dmg: &Path) -> Result<Self, ExtractError> {
        let stem = dmg.file_stem().ok_or_else(|| ExtractError::Missing {
            what: "a disk image name".to_string(),
            dir: dmg.to_path_buf(),
        })?;
        let mount_point = Path::new("/Volumes").join(stem);

        run_command(
            Command::new("hdiutil")
                .arg("attach")
                .arg("-nobrowse")
                .arg("-mountpoint")
                .arg(&mount_point)
                .arg(dmg),
            "hdiutil attach",
        )?;
        log_install(&format!("Mounted {} at {}", dmg.display(), mount_point.display()));

        Ok(Self {
            mount_point,
            attached: true,
        })
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    pub fn detach(mut self) -> Result<(), ExtractError> {
        self.attached = false;
        run_command(
            Command::new("hdiutil").arg("detach").arg(&self.mount_point),
            "hdiutil detach",
        )
    }
}

impl Drop for DiskImage {
    fn drop(&mut self) {
        if self.attached {
            if let Err(e) = run_command(
                Command::new("hdiutil").arg("detach").arg(&self.mount_point),
                "hdiutil detach",
            ) {
                log_warning(&format!(
                    "Failed to detach {}: {}",
                    self.mount_point.display(),
                    e
                ));
            }
        }
    }
}

// ============================================================================
// Test Archives
// ============================================================================

/// Write a zip with the given entries; names ending in `/` become directories
#[cfg(test)]
pub(crate) fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let file = fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for (name, data) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
    }
    writer.finish().unwrap();
}
