//! Error types shared across the assembly pipeline
//!
//! Lower layers (sources, cache, extraction) return their own error values;
//! the release orchestrator is the only place that decides whether a failure
//! is tolerated or aborts the run, and it does so through [`BuildError`].

use std::path::PathBuf;

use thiserror::Error;

/// Failure while listing candidates from a remote source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    #[error("network error while fetching {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("API error from {url}: {message}")]
    Api { url: String, message: String },

    #[error("unexpected response from {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("invalid or missing API key (HTTP 401 from {url}); check config.json")]
    Unauthorized { url: String },

    #[error("access denied (HTTP 403 from {url}); is the title purchased and the API key correct?")]
    Forbidden { url: String },

    #[error("no {what} configured; run with --gen-config and add it to config.json")]
    MissingCredentials { what: &'static str },

    #[error("'{title}' was not found in the storefront library")]
    NotOwned { title: String },
}

impl SourceError {
    /// Authentication and entitlement problems need the user to act before a
    /// retry could succeed, so they abort the run regardless of the package.
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            SourceError::Unauthorized { .. }
                | SourceError::Forbidden { .. }
                | SourceError::MissingCredentials { .. }
                | SourceError::NotOwned { .. }
        )
    }
}

/// Failure while fetching an artifact into the cache
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP {status} while downloading {url}")]
    Http { url: String, status: u16 },

    #[error("network error while downloading {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure while unpacking or rearranging files in the staging tree
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("failed to unpack {archive}: {reason}")]
    Archive { archive: PathBuf, reason: String },

    #[error("expected exactly one {what} in {dir}, found {found:?}")]
    Ambiguous {
        what: String,
        dir: PathBuf,
        found: Vec<String>,
    },

    #[error("expected {what} in {dir}, found none")]
    Missing { what: String, dir: PathBuf },

    #[error("{command} failed: {reason}")]
    Command { command: String, reason: String },

    #[error("filesystem error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    /// An unknown format, or an external tool (hdiutil, ditto) that is missing
    /// or failed. Files installed by earlier packages are left untouched.
    pub fn leaves_tree_intact(&self) -> bool {
        matches!(
            self,
            ExtractError::UnsupportedFormat(_) | ExtractError::Command { .. }
        )
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExtractError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Inconsistent data in an artifact name
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("OS check failed, '{name}' matches both {first} and {second}")]
    ConflictingOs {
        name: String,
        first: &'static str,
        second: &'static str,
    },
}

/// Failure reading or writing config.json
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Conditions that end a run
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to list {package}: {source}")]
    Source {
        package: String,
        #[source]
        source: SourceError,
    },

    #[error("no matching versions of {package} found; this package is required")]
    NoCandidates { package: String },

    #[error("could not resolve a version for {package}: {source}")]
    Version {
        package: String,
        #[source]
        source: VersionError,
    },

    #[error("failed to download {package}: {source}")]
    Download {
        package: String,
        #[source]
        source: DownloadError,
    },

    #[error("assembly of {package} failed: {source}")]
    Assembly {
        package: String,
        #[source]
        source: ExtractError,
    },

    #[error("dependencies of {package} are not satisfied: {details}")]
    DependencyUnsatisfied { package: String, details: String },

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("target directory {path} is not usable: {reason}")]
    Target { path: PathBuf, reason: String },

    #[error("aborted: {0}")]
    Declined(String),
}

impl BuildError {
    /// Name of the package whose step failed, if any
    pub fn package(&self) -> Option<&str> {
        match self {
            BuildError::Source { package, .. }
            | BuildError::NoCandidates { package }
            | BuildError::Version { package, .. }
            | BuildError::Download { package, .. }
            | BuildError::Assembly { package, .. }
            | BuildError::DependencyUnsatisfied { package, .. } => Some(package),
            _ => None,
        }
    }
}
