//! Download cache keyed by artifact file name

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::DownloadError;
use crate::logging::{log_download, log_info};
use crate::sources::{Candidate, HttpClient};

/// Flat directory of downloaded artifacts.
///
/// A file is only ever visible under its final name once fully written;
/// downloads go to `<name>.part` first and are renamed on completion.
#[derive(Debug, Clone)]
pub struct PackageCache {
    dir: PathBuf,
}

impl PackageCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where `name` lives in the cache; path separators in the name are dropped
    pub fn path_for(&self, name: &str) -> PathBuf {
        let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
        self.dir.join(file_name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    /// Return the cached artifact, downloading it first if it is not there yet
    pub fn fetch(
        &self,
        client: &dyn HttpClient,
        candidate: &Candidate,
        headers: &[(String, String)],
    ) -> Result<PathBuf, DownloadError> {
        let path = self.path_for(&candidate.name);
        if path.is_file() {
            log_info(&format!("Using cached {}", path.display()));
            return Ok(path);
        }

        fs::create_dir_all(&self.dir).map_err(|e| DownloadError::Io {
            path: self.dir.clone(),
            source: e,
        })?;

        let mut part_name = path.as_os_str().to_owned();
        part_name.push(".part");
        let part = PathBuf::from(part_name);

        log_download(&format!("Downloading {} from {}", candidate.name, candidate.url));

        let headers: Vec<(&str, &str)> = headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let result = fs::File::create(&part)
            .map_err(|e| DownloadError::Io {
                path: part.clone(),
                source: e,
            })
            .and_then(|file| {
                let mut writer = BufWriter::new(file);
                let bytes = client.download(&candidate.url, &headers, &mut writer)?;
                writer.into_inner().map_err(|e| DownloadError::Io {
                    path: part.clone(),
                    source: e.into_error(),
                })?;
                Ok(bytes)
            });

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = fs::remove_file(&part);
                return Err(e);
            }
        };

        fs::rename(&part, &path).map_err(|e| DownloadError::Io {
            path: path.clone(),
            source: e,
        })?;

        log_download(&format!(
            "Saved {} ({:.1} MB)",
            path.display(),
            bytes as f64 / 1_048_576.0
        ));
        Ok(path)
    }
}
