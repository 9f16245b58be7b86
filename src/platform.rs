//! Target platform tags and artifact name filtering

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Core Types
// ============================================================================

/// Operating system family of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Os {
    Windows,
    Mac,
    Linux,
}

impl Os {
    /// Short tag used in platform strings ("win", "mac", "lin")
    pub fn tag(&self) -> &'static str {
        match self {
            Os::Windows => "win",
            Os::Mac => "mac",
            Os::Linux => "lin",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Os::Windows => "Windows",
            Os::Mac => "Mac",
            Os::Linux => "Linux",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Pointer width of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arch {
    X32,
    X64,
}

impl Arch {
    pub fn bits(&self) -> &'static str {
        match self {
            Arch::X32 => "32",
            Arch::X64 => "64",
        }
    }

    pub fn from_bits(bits: &str) -> Option<Self> {
        match bits {
            "32" => Some(Arch::X32),
            "64" => Some(Arch::X64),
            _ => None,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.bits())
    }
}

/// A build target such as `lin64`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform { os: Os::Windows, arch: Arch::X32 },
        Platform { os: Os::Windows, arch: Arch::X64 },
        Platform { os: Os::Linux, arch: Arch::X32 },
        Platform { os: Os::Linux, arch: Arch::X64 },
        Platform { os: Os::Mac, arch: Arch::X32 },
        Platform { os: Os::Mac, arch: Arch::X64 },
    ];

    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Best guess for the machine we are running on
    pub fn detect() -> Self {
        let os = match std::env::consts::OS {
            "windows" => Os::Windows,
            "macos" => Os::Mac,
            _ => Os::Linux,
        };
        let arch = if cfg!(target_pointer_width = "64") {
            Arch::X64
        } else {
            Arch::X32
        };
        Self { os, arch }
    }

    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }

    pub fn is_mac(&self) -> bool {
        self.os == Os::Mac
    }

    /// Human readable label, e.g. "Linux (64-bit)"
    pub fn label(&self) -> String {
        format!("{} ({}-bit)", self.os.display_name(), self.arch)
    }

    /// Substrings that mark an artifact as built for some other platform.
    ///
    /// With `compat_layer` set, Windows builds are the wanted ones on every
    /// platform, so the native Linux/macOS tokens are excluded instead.
    pub fn excluded_tokens(&self, compat_layer: bool) -> &'static [&'static str] {
        let os = if compat_layer { Os::Windows } else { self.os };
        match (os, self.arch) {
            (Os::Windows, Arch::X32) => &["mac", "osx", "OSX", "lin", "Lin", "64"],
            (Os::Windows, Arch::X64) => &["mac", "osx", "OSX", "lin", "Lin"],
            (Os::Linux, Arch::X32) => &["mac", "osx", "OSX", "win", "Win", "64"],
            (Os::Linux, Arch::X64) => &["mac", "osx", "OSX", "win", "Win"],
            (Os::Mac, Arch::X32) => &["lin", "Lin", "win", "Win", "64"],
            (Os::Mac, Arch::X64) => &["lin", "Lin", "win", "Win"],
        }
    }

    /// True when `name` carries no token belonging to another platform
    pub fn accepts(&self, name: &str, compat_layer: bool) -> bool {
        !self
            .excluded_tokens(compat_layer)
            .iter()
            .any(|token| name.contains(token))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.os.tag(), self.arch)
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Platform::ALL
            .into_iter()
            .find(|p| p.to_string() == lower)
            .ok_or_else(|| {
                format!(
                    "unknown platform '{}', expected one of win32, win64, lin32, lin64, mac32, mac64",
                    s
                )
            })
    }
}
