//! Version model for downloaded artifacts
//!
//! Artifact names across the upstream sources follow loose conventions such as
//! `df_50_05_linux.tar.bz2`, `df_40_24_03a_osx32.tar.bz2` or
//! `dfhack-50.13-r1-Windows-64bit.zip`. [`Version::parse`] pulls a partially
//! specified version out of such names; fields are filled left to right and a
//! missing field sorts below any present one.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::VersionError;
use crate::logging::log_warning;
use crate::platform::{Arch, Os};

static THREE_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)[._](\d+)[._](\d+)([a-z])?").expect("valid regex"));
static TWO_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)[._](\d+)").expect("valid regex"));
static BARE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));
static ALPHA_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z]+").expect("valid regex"));
static ADJACENT_ARCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-_ ]?(32|64)(?:\D|$)").expect("valid regex"));

// ============================================================================
// Compatibility Roles
// ============================================================================

/// How a package's version constrains, or is constrained by, other packages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompatRole {
    /// The base game every other component is built against
    Platform,
    /// Built against a specific game release; major/minor must match it
    TracksPlatform,
    /// Released on its own schedule
    #[default]
    Independent,
}

// ============================================================================
// Version
// ============================================================================

#[derive(Debug, Clone)]
pub struct Version {
    package_name: String,
    major: Option<u32>,
    minor: Option<u32>,
    patch: Option<u32>,
    letter: Option<char>,
    os: Option<Os>,
    arch: Option<Arch>,
    role: CompatRole,
}

impl Version {
    /// A version with every field unset
    pub fn unknown(package_name: &str) -> Self {
        Self {
            package_name: package_name.to_string(),
            major: None,
            minor: None,
            patch: None,
            letter: None,
            os: None,
            arch: None,
            role: CompatRole::default(),
        }
    }

    /// Build a version from its numeric parts.
    ///
    /// Parts after the first missing one are dropped, so `minor` only
    /// survives when `major` is present and so on. The letter must be a
    /// lowercase ASCII letter.
    pub fn new(
        package_name: &str,
        major: Option<u32>,
        minor: Option<u32>,
        patch: Option<u32>,
        letter: Option<char>,
    ) -> Self {
        let mut version = Self::unknown(package_name);
        version.major = major;
        version.minor = major.and(minor);
        version.patch = version.minor.and(patch);
        version.letter = version
            .patch
            .and(letter.filter(|c| c.is_ascii_lowercase()));
        version
    }

    pub fn with_platform(mut self, os: Option<Os>, arch: Option<Arch>) -> Self {
        self.os = os;
        self.arch = arch;
        self
    }

    pub fn with_role(mut self, role: CompatRole) -> Self {
        self.role = role;
        self
    }

    /// Extract a version from an artifact file name.
    ///
    /// Tries a three-number form with an optional letter (`40_24_03a`), then a
    /// two-number form (`50_05`), then the first bare integer. OS keywords and
    /// an adjacent `32`/`64` are scanned for independently. A name with no
    /// number and no OS keyword yields a version with every field unset.
    pub fn parse(filename: &str, package_name: &str) -> Result<Self, VersionError> {
        let mut version = Self::unknown(package_name);

        if let Some(caps) = THREE_PART.captures(filename) {
            version.major = caps.get(1).and_then(|m| m.as_str().parse().ok());
            version.minor = caps.get(2).and_then(|m| m.as_str().parse().ok());
            version.patch = caps.get(3).and_then(|m| m.as_str().parse().ok());
            version.letter = caps.get(4).and_then(|m| m.as_str().chars().next());
        } else if let Some(caps) = TWO_PART.captures(filename) {
            version.major = caps.get(1).and_then(|m| m.as_str().parse().ok());
            version.minor = caps.get(2).and_then(|m| m.as_str().parse().ok());
        } else if let Some(m) = BARE_NUMBER.find(filename) {
            version.major = m.as_str().parse().ok();
        }

        let (os, arch) = scan_platform(filename)?;
        version.os = os;
        version.arch = arch;

        // Re-apply the left-to-right invariant in case a part overflowed
        let normalized = Self::new(
            package_name,
            version.major,
            version.minor,
            version.patch,
            version.letter,
        );
        Ok(normalized.with_platform(version.os, version.arch))
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn major(&self) -> Option<u32> {
        self.major
    }

    pub fn minor(&self) -> Option<u32> {
        self.minor
    }

    pub fn patch(&self) -> Option<u32> {
        self.patch
    }

    pub fn letter(&self) -> Option<char> {
        self.letter
    }

    pub fn os(&self) -> Option<Os> {
        self.os
    }

    pub fn arch(&self) -> Option<Arch> {
        self.arch
    }

    pub fn role(&self) -> CompatRole {
        self.role
    }

    /// True when neither a number nor an OS keyword was found
    pub fn is_unknown(&self) -> bool {
        self.major.is_none() && self.os.is_none() && self.arch.is_none()
    }

    /// Render as `major[.minor[.patch[letter]]][_os][-arch]`
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(major) = self.major {
            out.push_str(&major.to_string());
            if let Some(minor) = self.minor {
                out.push_str(&format!(".{}", minor));
                if let Some(patch) = self.patch {
                    out.push_str(&format!(".{}", patch));
                    if let Some(letter) = self.letter {
                        out.push(letter);
                    }
                }
            }
        }
        if let Some(os) = self.os {
            if !out.is_empty() {
                out.push('_');
            }
            out.push_str(os.tag());
        }
        if let Some(arch) = self.arch {
            out.push_str(&format!("-{}", arch));
        }
        if out.is_empty() {
            out.push_str("unknown");
        }
        out
    }

    fn sort_key(&self) -> (Option<u32>, Option<u32>, Option<u32>, Option<char>) {
        (self.major, self.minor, self.patch, self.letter)
    }

    /// Whether `self`, a platform-tracking build, targets the platform release `platform`.
    ///
    /// Older releases were numbered `0.MAJOR.MINOR`, which is accepted as
    /// equal to `MAJOR.MINOR`.
    fn targets_release(&self, platform: &Version) -> bool {
        if (self.major, self.minor) == (platform.major, platform.minor) {
            return true;
        }
        self.major == Some(0) && (self.minor, self.patch) == (platform.major, platform.minor)
    }

    fn compatible_with_one(&self, other: &Version) -> bool {
        if self.package_name == other.package_name {
            log_warning(&format!(
                "Checking compatibility between the same package: {} versions {} and {}",
                self.package_name, self, other
            ));
            return false;
        }
        match (self.role, other.role) {
            (CompatRole::TracksPlatform, CompatRole::Platform) => self.targets_release(other),
            (CompatRole::Platform, CompatRole::TracksPlatform) => other.targets_release(self),
            _ => true,
        }
    }

    /// Check this version against a single version, an installed set, or nothing.
    ///
    /// An absent or empty target is vacuously compatible.
    pub fn is_compatible_with<T: CompatTarget + ?Sized>(&self, target: &T) -> bool {
        target.admits(self)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    // Option orders None below Some, which is exactly "missing sorts lowest"
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

const OS_PREFIXES: [(&str, Os); 6] = [
    ("win", Os::Windows),
    ("mac", Os::Mac),
    ("osx", Os::Mac),
    ("lin", Os::Linux),
    ("deb", Os::Linux),
    ("ubuntu", Os::Linux),
];

/// OS family of an alphabetic token by prefix, e.g. `winxp` or `linuxarm`
fn os_family(token: &str) -> Option<Os> {
    let token = token.to_ascii_lowercase();
    if token.starts_with("debug") {
        return None;
    }
    OS_PREFIXES
        .iter()
        .find(|(prefix, _)| token.starts_with(prefix))
        .map(|(_, os)| *os)
}

fn family_name(os: Os) -> &'static str {
    match os {
        Os::Windows => "windows",
        Os::Mac => "mac",
        Os::Linux => "linux",
    }
}

fn scan_platform(filename: &str) -> Result<(Option<Os>, Option<Arch>), VersionError> {
    let mut os: Option<Os> = None;
    let mut arch: Option<Arch> = None;

    for token in ALPHA_RUN.find_iter(filename) {
        let Some(family) = os_family(token.as_str()) else {
            continue;
        };
        match os {
            Some(found) if found != family => {
                return Err(VersionError::ConflictingOs {
                    name: filename.to_string(),
                    first: family_name(found),
                    second: family_name(family),
                });
            }
            _ => os = Some(family),
        }
        if arch.is_none() {
            arch = ADJACENT_ARCH
                .captures(&filename[token.end()..])
                .and_then(|caps| caps.get(1))
                .and_then(|m| Arch::from_bits(m.as_str()));
        }
    }

    Ok((os, arch))
}

// ============================================================================
// Installed Packages
// ============================================================================

/// Versions resolved so far in a run, keyed by package display name.
///
/// Entries are only ever added; later packages consult it for compatibility.
#[derive(Debug, Clone, Default)]
pub struct InstalledPackages {
    versions: BTreeMap<String, Version>,
}

impl InstalledPackages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: &str, version: Version) {
        self.versions.insert(name.to_string(), version);
    }

    pub fn get(&self, name: &str) -> Option<&Version> {
        self.versions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.versions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Version)> {
        self.versions.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ============================================================================
// Compatibility Targets
// ============================================================================

/// Something a version can be checked against
pub trait CompatTarget {
    fn admits(&self, version: &Version) -> bool;
}

impl CompatTarget for Version {
    fn admits(&self, version: &Version) -> bool {
        version.compatible_with_one(self)
    }
}

impl CompatTarget for InstalledPackages {
    fn admits(&self, version: &Version) -> bool {
        self.versions.values().all(|v| version.compatible_with_one(v))
    }
}

impl<T: CompatTarget + ?Sized> CompatTarget for Option<&T> {
    fn admits(&self, version: &Version) -> bool {
        match self {
            Some(target) => target.admits(version),
            None => true,
        }
    }
}
