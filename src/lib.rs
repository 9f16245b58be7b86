//! dfdl - Dwarf Fortress release assembler
//!
//! Library crate for fetching the game and its community tools and laying
//! them out as one ready-to-play directory. The `dfdl` binary adds argument
//! parsing and terminal prompts on top (feature `cli`).

pub mod paths;

pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod packages;
pub mod platform;
pub mod prompt;
pub mod release;
pub mod sources;
pub mod version;

pub use config::AppConfig;
pub use error::BuildError;
pub use platform::{Arch, Os, Platform};
pub use release::{GameSource, Release, ReleaseOptions, StepOutcome};
pub use version::{CompatRole, InstalledPackages, Version};
