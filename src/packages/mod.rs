//! Package registry
//!
//! Every component the assembler knows about is a [`PackageKind`]. The kind
//! decides where listings come from, which artifact names fit the target
//! platform, how versions relate to the game, what must be installed first and
//! how the archive is laid out in the staging tree.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::cache::PackageCache;
use crate::error::{DownloadError, ExtractError, SourceError, VersionError};
use crate::extract::is_supported_artifact;
use crate::logging::log_warning;
use crate::platform::{Os, Platform};
use crate::sources::{mirror, Candidate, SourceContext, SourceKind};
use crate::version::{CompatRole, CompatTarget, InstalledPackages, Version};

pub mod assets;
pub mod game;
pub mod plugins;
pub mod runtime;
pub mod select;
pub mod utilities;

pub use select::{auto_pick, rank, select, Choice, Decision, Selection, SkipReason};

pub const GAME_NAME: &str = "Dwarf Fortress";

// ============================================================================
// Package Kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageKind {
    GameBay12,
    GameItch,
    PyLnp,
    PeStarterPack,
    DfHack,
    Twbt,
    DwarfTherapist,
    Soundsense,
    LazyMacPack,
    Ruby,
}

/// How candidate names are screened before they are offered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamePolicy {
    /// Platform filter only
    Platform,
    /// Platform filter and a required substring
    PlatformAnd(&'static str),
    /// Substring checks without the platform filter
    Contains {
        required: &'static str,
        rejected: Option<&'static str>,
    },
    /// The source already lists only fitting artifacts
    Unfiltered,
}

impl PackageKind {
    pub const OPTIONAL: [PackageKind; 8] = [
        PackageKind::PyLnp,
        PackageKind::PeStarterPack,
        PackageKind::DfHack,
        PackageKind::Twbt,
        PackageKind::DwarfTherapist,
        PackageKind::Soundsense,
        PackageKind::LazyMacPack,
        PackageKind::Ruby,
    ];

    /// Command-line name
    pub fn slug(&self) -> &'static str {
        match self {
            PackageKind::GameBay12 => "df-bay12",
            PackageKind::GameItch => "df-itch",
            PackageKind::PyLnp => "pylnp",
            PackageKind::PeStarterPack => "pe-starter-pack",
            PackageKind::DfHack => "dfhack",
            PackageKind::Twbt => "twbt",
            PackageKind::DwarfTherapist => "dwarf-therapist",
            PackageKind::Soundsense => "soundsense",
            PackageKind::LazyMacPack => "lazy-mac-pack",
            PackageKind::Ruby => "ruby",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PackageKind::GameBay12 | PackageKind::GameItch => GAME_NAME,
            PackageKind::PyLnp => "PyLNP",
            PackageKind::PeStarterPack => "PE Starter Pack",
            PackageKind::DfHack => "DFHack",
            PackageKind::Twbt => "TWBT",
            PackageKind::DwarfTherapist => "Dwarf Therapist",
            PackageKind::Soundsense => "Soundsense",
            PackageKind::LazyMacPack => "Lazy Mac Pack",
            PackageKind::Ruby => "Ruby",
        }
    }

    pub fn source(&self) -> SourceKind {
        match self {
            PackageKind::GameBay12 => SourceKind::HtmlListing {
                page_url: "http://bay12games.com/dwarves/older_versions.html",
                base_url: "http://bay12games.com/dwarves/",
                newest_first: true,
            },
            PackageKind::GameItch => SourceKind::Itch { title: GAME_NAME },
            PackageKind::PyLnp => SourceKind::Github {
                releases_url: "https://api.github.com/repos/Pidgeot/python-lnp/releases",
            },
            PackageKind::PeStarterPack => SourceKind::HtmlListing {
                page_url: "http://df.wicked-code.com",
                base_url: "http://df.wicked-code.com/",
                newest_first: true,
            },
            PackageKind::DfHack => SourceKind::Github {
                releases_url: "https://api.github.com/repos/DFHack/dfhack/releases",
            },
            PackageKind::Twbt => SourceKind::Github {
                releases_url: "https://api.github.com/repos/thurin/df-twbt/releases",
            },
            PackageKind::DwarfTherapist => SourceKind::Github {
                releases_url: "https://api.github.com/repos/Dwarf-Therapist/Dwarf-Therapist/releases",
            },
            PackageKind::Soundsense => SourceKind::HtmlListing {
                page_url: "https://df.zweistein.cz/soundsense/",
                base_url: "https://df.zweistein.cz/soundsense/",
                newest_first: false,
            },
            PackageKind::LazyMacPack => SourceKind::Mirror {
                entries: mirror::LAZY_MAC_PACK,
            },
            PackageKind::Ruby => SourceKind::Mirror {
                entries: mirror::RUBY,
            },
        }
    }

    pub fn role(&self) -> CompatRole {
        match self {
            PackageKind::GameBay12 | PackageKind::GameItch => CompatRole::Platform,
            PackageKind::DfHack => CompatRole::TracksPlatform,
            _ => CompatRole::Independent,
        }
    }

    /// Packages that must already be installed
    pub fn dependencies(&self) -> Vec<Dependency> {
        match self {
            PackageKind::Twbt => vec![Dependency::new(PackageKind::DfHack.name())],
            _ => Vec::new(),
        }
    }

    /// Name screening for a target; `os` is the OS whose builds are wanted
    pub fn name_policy(&self, os: Os) -> NamePolicy {
        match self {
            PackageKind::GameBay12 => NamePolicy::PlatformAnd(match os {
                Os::Windows => "zip",
                Os::Linux => "linux",
                Os::Mac => "osx",
            }),
            PackageKind::DfHack => NamePolicy::PlatformAnd(match os {
                Os::Windows => "Windows",
                Os::Linux => "Linux",
                Os::Mac => "OSX",
            }),
            PackageKind::DwarfTherapist => NamePolicy::PlatformAnd(match os {
                Os::Windows => "win",
                Os::Linux => "linux",
                Os::Mac => "osx",
            }),
            PackageKind::Soundsense => NamePolicy::Contains {
                required: "zip",
                rejected: Some("soundpack"),
            },
            PackageKind::PeStarterPack => NamePolicy::Contains {
                required: "zip",
                rejected: None,
            },
            PackageKind::PyLnp | PackageKind::Twbt => NamePolicy::Platform,
            PackageKind::GameItch | PackageKind::LazyMacPack | PackageKind::Ruby => {
                NamePolicy::Unfiltered
            }
        }
    }
}

impl FromStr for PackageKind {
    type Err = String;

    /// Optional packages by slug, e.g. `dfhack` or `dwarf-therapist`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        PackageKind::OPTIONAL
            .into_iter()
            .find(|kind| kind.slug() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = PackageKind::OPTIONAL.iter().map(|k| k.slug()).collect();
                format!("unknown package '{}', expected one of {}", s, known.join(", "))
            })
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Dependencies
// ============================================================================

/// What an installed dependency must be compatible with
#[derive(Debug, Clone)]
pub enum Constraint {
    Version(Version),
    Installed(InstalledPackages),
}

impl CompatTarget for Constraint {
    fn admits(&self, version: &Version) -> bool {
        match self {
            Constraint::Version(v) => v.admits(version),
            Constraint::Installed(map) => map.admits(version),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dependency {
    pub name: &'static str,
    pub constraint: Option<Constraint>,
}

impl Dependency {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            constraint: None,
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyIssue {
    Missing { name: String },
    Incompatible { name: String, installed: String },
}

impl fmt::Display for DependencyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyIssue::Missing { name } => write!(f, "{} is not installed", name),
            DependencyIssue::Incompatible { name, installed } => write!(
                f,
                "{} version {} does not meet the required version",
                name, installed
            ),
        }
    }
}

// ============================================================================
// Package
// ============================================================================

/// Where per-kind extraction writes
#[derive(Debug, Clone, Copy)]
pub struct Staging<'a> {
    pub release_dir: &'a Path,
    pub platform: Platform,
    pub compat_layer: bool,
}

impl Staging<'_> {
    /// Windows builds are installed natively or under a compatibility layer
    pub fn windows_build(&self) -> bool {
        self.compat_layer || self.platform.is_windows()
    }

    pub fn df_dir(&self) -> PathBuf {
        self.release_dir.join("df")
    }

    pub fn lnp_dir(&self) -> PathBuf {
        self.release_dir.join("LNP")
    }
}

/// One component in one run
#[derive(Debug, Clone)]
pub struct Package {
    kind: PackageKind,
    required: bool,
    release_dir: PathBuf,
    platform: Platform,
    compat_layer: bool,
    dependencies: Vec<Dependency>,
}

impl Package {
    pub fn new(
        kind: PackageKind,
        required: bool,
        release_dir: &Path,
        platform: Platform,
        compat_layer: bool,
    ) -> Self {
        Self {
            kind,
            required,
            release_dir: release_dir.to_path_buf(),
            platform,
            compat_layer,
            dependencies: kind.dependencies(),
        }
    }

    pub fn kind(&self) -> PackageKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn add_dependency(&mut self, dependency: Dependency) {
        self.dependencies.push(dependency);
    }

    fn staging(&self) -> Staging<'_> {
        Staging {
            release_dir: &self.release_dir,
            platform: self.platform,
            compat_layer: self.compat_layer,
        }
    }

    /// OS whose builds we want
    fn wanted_os(&self) -> Os {
        if self.compat_layer {
            Os::Windows
        } else {
            self.platform.os
        }
    }

    pub fn filter_by_platform(&self, name: &str) -> bool {
        self.platform.accepts(name, self.compat_layer)
    }

    /// Name screening; anything that is not an archive or disk image is dropped
    /// unless the source lists only fitting artifacts
    pub fn match_name(&self, name: &str) -> bool {
        let policy = self.kind.name_policy(self.wanted_os());
        if policy != NamePolicy::Unfiltered && !is_supported_artifact(name) {
            return false;
        }
        match policy {
            NamePolicy::Platform => self.filter_by_platform(name),
            NamePolicy::PlatformAnd(required) => {
                self.filter_by_platform(name) && self.required_token_present(name, required)
            }
            NamePolicy::Contains { required, rejected } => {
                name.contains(required) && !rejected.is_some_and(|r| name.contains(r))
            }
            NamePolicy::Unfiltered => true,
        }
    }

    // DFHack tags macOS builds with the pointer width
    fn required_token_present(&self, name: &str, token: &str) -> bool {
        if self.kind == PackageKind::DfHack && token == "OSX" {
            return name.contains(&format!("OSX-{}", self.platform.arch));
        }
        name.contains(token)
    }

    /// Listing from the package's source, screened by [`Package::match_name`]
    pub fn list(&self, ctx: &SourceContext<'_>) -> Result<Vec<Candidate>, SourceError> {
        let candidates = self.kind.source().list(ctx)?;
        Ok(candidates
            .into_iter()
            .filter(|c| self.match_name(&c.name))
            .collect())
    }

    /// Parse the version of a chosen artifact
    pub fn resolve(&self, candidate: &Candidate) -> Result<Version, VersionError> {
        Ok(Version::parse(&candidate.name, self.name())?.with_role(self.kind.role()))
    }

    pub fn dependency_issues(&self, installed: &InstalledPackages) -> Vec<DependencyIssue> {
        let mut issues = Vec::new();
        for dependency in &self.dependencies {
            let Some(version) = installed.get(dependency.name) else {
                issues.push(DependencyIssue::Missing {
                    name: dependency.name.to_string(),
                });
                continue;
            };
            if let Some(constraint) = &dependency.constraint {
                if !version.is_compatible_with(constraint) {
                    issues.push(DependencyIssue::Incompatible {
                        name: dependency.name.to_string(),
                        installed: version.to_string(),
                    });
                }
            }
        }
        issues
    }

    /// True when every dependency is installed and compatible; problems are logged
    pub fn check_dependencies(&self, installed: &InstalledPackages) -> bool {
        let issues = self.dependency_issues(installed);
        for issue in &issues {
            log_warning(&format!("{}: {}", self.name(), issue));
        }
        issues.is_empty()
    }

    pub fn download(
        &self,
        cache: &PackageCache,
        ctx: &SourceContext<'_>,
        candidate: &Candidate,
    ) -> Result<PathBuf, DownloadError> {
        let headers = self.kind.source().download_headers(ctx);
        cache.fetch(ctx.client, candidate, &headers)
    }

    /// Lay the downloaded archive out in the staging tree
    pub fn extract(&self, archive: &Path) -> Result<(), ExtractError> {
        let staging = self.staging();
        match self.kind {
            PackageKind::GameBay12 | PackageKind::GameItch => game::extract(&staging, archive),
            PackageKind::DfHack => plugins::extract_dfhack(&staging, archive),
            PackageKind::Twbt => plugins::extract_twbt(&staging, archive),
            PackageKind::PyLnp => utilities::extract_pylnp(&staging, archive),
            PackageKind::DwarfTherapist => utilities::extract_therapist(&staging, archive),
            PackageKind::Soundsense => utilities::extract_soundsense(&staging, archive),
            PackageKind::PeStarterPack => assets::extract_starter_pack(&staging, archive),
            PackageKind::LazyMacPack => assets::extract_lazy_mac_pack(&staging, archive),
            PackageKind::Ruby => runtime::extract_ruby(&staging, archive),
        }
    }
}
