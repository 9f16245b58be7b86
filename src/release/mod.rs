//! Release orchestration
//!
//! A run walks the packages in a fixed order, each step ending installed,
//! skipped, or aborting the whole run. Earlier steps are never rolled back;
//! the staging tree only becomes the target directory once every step is done.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tempfile::TempDir;

use crate::cache::PackageCache;
use crate::config::AppConfig;
use crate::error::BuildError;
use crate::extract::move_entry;
use crate::logging::{log_error, log_info, log_warning, BuildLog};
use crate::packages::{select, Decision, Package, PackageKind, SkipReason, GAME_NAME};
use crate::platform::{Arch, Platform};
use crate::prompt::Prompt;
use crate::sources::{Candidate, HttpClient, SourceContext};
use crate::version::{InstalledPackages, Version};

#[cfg(test)]
mod tests;

/// Where the game itself comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum GameSource {
    /// bay12games.com, free and classic releases
    Bay12,
    /// itch.io, the premium release for owners
    Itch,
}

impl GameSource {
    fn package_kind(&self) -> PackageKind {
        match self {
            GameSource::Bay12 => PackageKind::GameBay12,
            GameSource::Itch => PackageKind::GameItch,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReleaseOptions {
    pub platform: Platform,
    /// Build Windows binaries for a compatibility layer such as Wine
    pub compat_layer: bool,
    /// Asked for when unset
    pub game_source: Option<GameSource>,
    /// Game version to take without asking, e.g. "50.05"
    pub game_version: Option<String>,
    /// Defaults to `df-<platform>-<date>` in the working directory
    pub target: Option<PathBuf>,
    /// Optional packages left out of the run
    pub skip: Vec<PackageKind>,
}

impl ReleaseOptions {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            compat_layer: false,
            game_source: None,
            game_version: None,
            target: None,
            skip: Vec::new(),
        }
    }

    pub fn default_target(&self) -> PathBuf {
        PathBuf::from(format!(
            "df-{}-{}",
            self.platform,
            Local::now().format("%Y-%m-%d")
        ))
    }
}

/// Optional packages in install order
pub fn optional_packages(platform: Platform, compat_layer: bool) -> Vec<PackageKind> {
    let mut kinds = vec![
        PackageKind::PyLnp,
        PackageKind::PeStarterPack,
        PackageKind::DfHack,
        PackageKind::Twbt,
        PackageKind::DwarfTherapist,
        PackageKind::Soundsense,
    ];
    if platform.is_mac() && !compat_layer {
        kinds.push(PackageKind::LazyMacPack);
        if platform.arch == Arch::X64 {
            kinds.push(PackageKind::Ruby);
        }
    }
    kinds
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Installed(Version),
    Skipped(SkipReason),
}

pub struct Release<'a> {
    options: ReleaseOptions,
    config: AppConfig,
    client: &'a dyn HttpClient,
    prompt: &'a mut dyn Prompt,
    cache: PackageCache,
    staging: TempDir,
    target: PathBuf,
    installed: InstalledPackages,
    outcomes: Vec<(String, StepOutcome)>,
    log: BuildLog,
}

impl<'a> Release<'a> {
    /// Prepare the target and staging directories.
    ///
    /// An existing target is only removed after confirmation; declining ends
    /// the run before anything is downloaded.
    pub fn new(
        options: ReleaseOptions,
        config: AppConfig,
        client: &'a dyn HttpClient,
        prompt: &'a mut dyn Prompt,
    ) -> Result<Self, BuildError> {
        let target = options
            .target
            .clone()
            .unwrap_or_else(|| options.default_target());
        prepare_target(&target, prompt)?;

        // Stage next to the target so the final move is a rename
        let parent = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(parent).map_err(|e| BuildError::Target {
            path: parent.to_path_buf(),
            reason: e.to_string(),
        })?;
        let staging = tempfile::Builder::new()
            .prefix(".dfdl-staging-")
            .tempdir_in(parent)
            .map_err(|e| BuildError::Target {
                path: parent.to_path_buf(),
                reason: format!("cannot create staging directory: {}", e),
            })?;

        let cache = PackageCache::new(config.cache_dir());
        let mut log = BuildLog::new();
        log.add(&format!(
            "Building {} into {}{}",
            options.platform.label(),
            target.display(),
            if options.compat_layer {
                " (Windows build for a compatibility layer)"
            } else {
                ""
            }
        ));
        log_info(&format!("Staging in {}", staging.path().display()));

        Ok(Self {
            options,
            config,
            client,
            prompt,
            cache,
            staging,
            target,
            installed: InstalledPackages::new(),
            outcomes: Vec::new(),
            log,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn installed(&self) -> &InstalledPackages {
        &self.installed
    }

    pub fn outcomes(&self) -> &[(String, StepOutcome)] {
        &self.outcomes
    }

    pub fn log(&self) -> &BuildLog {
        &self.log
    }

    /// Run every step and move the result into place
    pub fn run(&mut self) -> Result<PathBuf, BuildError> {
        let result = self.run_packages().and_then(|_| self.finalize());
        if let Err(e) = &result {
            log_error(&e.to_string());
            self.log.add(&format!("Aborted: {}", e));
        }
        result
    }

    fn run_packages(&mut self) -> Result<(), BuildError> {
        let source = match self.options.game_source {
            Some(source) => source,
            None => self.ask_game_source()?,
        };

        let optional: Vec<PackageKind> =
            optional_packages(self.options.platform, self.options.compat_layer)
                .into_iter()
                .filter(|kind| !self.options.skip.contains(kind))
                .collect();
        let total = optional.len() + 1;

        log_info(&format!("[1/{}] Processing {}", total, GAME_NAME));
        match self.try_package(source.package_kind(), true)? {
            outcome @ StepOutcome::Installed(_) => {
                self.outcomes.push((GAME_NAME.to_string(), outcome));
            }
            StepOutcome::Skipped(reason) => {
                return Err(BuildError::Declined(format!(
                    "{} is required ({})",
                    GAME_NAME, reason
                )));
            }
        }

        for (i, kind) in optional.into_iter().enumerate() {
            log_info(&format!("[{}/{}] Processing {}", i + 2, total, kind));
            let outcome = self.try_package(kind, false)?;
            self.outcomes.push((kind.name().to_string(), outcome));
        }
        Ok(())
    }

    fn ask_game_source(&mut self) -> Result<GameSource, BuildError> {
        let options = vec![
            "Bay12 Games (official site, free and classic versions)".to_string(),
            "itch.io (premium version with graphics, if purchased)".to_string(),
        ];
        match self
            .prompt
            .choose("Select a web source for Dwarf Fortress", &options, false)
        {
            Some(0) => Ok(GameSource::Bay12),
            Some(_) => Ok(GameSource::Itch),
            None => Err(BuildError::Declined("no game source selected".to_string())),
        }
    }

    fn source_context(&self) -> SourceContext<'_> {
        SourceContext {
            client: self.client,
            github_token: self.config.github_token(),
            itch_key: self.config.itch_key(),
            platform: self.options.platform,
            compat_layer: self.options.compat_layer,
        }
    }

    fn skip(&mut self, package: &Package, reason: SkipReason) -> StepOutcome {
        self.log.add(&format!("Skipped {}: {}", package.name(), reason));
        StepOutcome::Skipped(reason)
    }

    /// Let the user decide whether an optional package's failure ends the run
    fn tolerate(
        &mut self,
        package: &Package,
        reason: SkipReason,
        error: BuildError,
    ) -> Result<StepOutcome, BuildError> {
        log_error(&error.to_string());
        self.log.add(&format!("Failed {}: {}", package.name(), error));
        if package.is_required() {
            return Err(error);
        }
        let question = format!("{} failed. Continue without it?", package.name());
        if self.prompt.ask(&question) {
            Ok(self.skip(package, reason))
        } else {
            Err(error)
        }
    }

    /// One package from dependency check to extraction
    pub fn try_package(&mut self, kind: PackageKind, required: bool) -> Result<StepOutcome, BuildError> {
        let package = Package::new(
            kind,
            required,
            self.staging.path(),
            self.options.platform,
            self.options.compat_layer,
        );
        let name = package.name().to_string();

        // Dependencies
        if !package.check_dependencies(&self.installed) {
            let details = package
                .dependency_issues(&self.installed)
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            let question = format!("Dependencies of {} are not satisfied ({}). Continue anyway?", name, details);
            if !self.prompt.ask(&question) {
                if required {
                    return Err(BuildError::DependencyUnsatisfied {
                        package: name,
                        details,
                    });
                }
                return Ok(self.skip(&package, SkipReason::DependencyUnsatisfied(details)));
            }
        }

        // Listing
        let listed = package.list(&self.source_context());
        let candidates: Vec<Candidate> = match listed {
            Ok(candidates) => candidates,
            Err(e) if e.requires_user_action() => {
                return Err(BuildError::Source {
                    package: name,
                    source: e,
                })
            }
            Err(e) => {
                let reason = SkipReason::ListingFailed(e.to_string());
                return self.tolerate(
                    &package,
                    reason,
                    BuildError::Source {
                        package: name,
                        source: e,
                    },
                );
            }
        };
        log_info(&format!("{} matching artifacts for {}", candidates.len(), name));

        // Selection
        let preferred = if matches!(kind, PackageKind::GameBay12 | PackageKind::GameItch) {
            self.options.game_version.clone()
        } else {
            None
        };
        let selection = match select(
            &package,
            &candidates,
            &self.installed,
            &mut *self.prompt,
            preferred.as_deref(),
        ) {
            Decision::Selected(selection) => selection,
            Decision::Skipped(reason) => return Ok(self.skip(&package, reason)),
            Decision::Aborted(e) => return Err(e),
        };
        let candidate = selection.candidate;
        if !selection.compatible {
            self.log.add(&format!(
                "{} may not be compatible with the installed packages",
                candidate.name
            ));
        }

        // Version
        let version = match package.resolve(&candidate) {
            Ok(version) => version,
            Err(e) => {
                let reason = SkipReason::Failed(e.to_string());
                return self.tolerate(
                    &package,
                    reason,
                    BuildError::Version {
                        package: name,
                        source: e,
                    },
                );
            }
        };

        // Download
        let downloaded = package.download(&self.cache, &self.source_context(), &candidate);
        let archive = match downloaded {
            Ok(path) => path,
            Err(e) => {
                let reason = SkipReason::Failed(e.to_string());
                return self.tolerate(
                    &package,
                    reason,
                    BuildError::Download {
                        package: name,
                        source: e,
                    },
                );
            }
        };

        // Extraction
        match package.extract(&archive) {
            Ok(()) => {}
            Err(e) if !required && e.leaves_tree_intact() => {
                let reason = SkipReason::Failed(e.to_string());
                return self.tolerate(
                    &package,
                    reason,
                    BuildError::Assembly {
                        package: name,
                        source: e,
                    },
                );
            }
            // Anything else leaves the tree in an unknown shape
            Err(e) => {
                return Err(BuildError::Assembly {
                    package: name,
                    source: e,
                })
            }
        }

        self.log.add(&format!(
            "Successfully unpacked {} {} ({})",
            name, version, candidate.name
        ));
        self.installed.record(&name, version.clone());
        Ok(StepOutcome::Installed(version))
    }

    // ========================================================================
    // Finalize
    // ========================================================================

    fn finalize(&mut self) -> Result<PathBuf, BuildError> {
        self.copy_extra_tilesets()?;
        self.configure()?;
        self.move_to_target()
    }

    fn copy_extra_tilesets(&mut self) -> Result<(), BuildError> {
        let has_launcher_assets = self.installed.contains(PackageKind::PeStarterPack.name())
            || self.installed.contains(PackageKind::LazyMacPack.name());
        let tileset_dir = self.config.tileset_dir();
        if !has_launcher_assets || !tileset_dir.is_dir() {
            return Ok(());
        }

        let dest = self.staging.path().join("LNP").join("tilesets");
        let assembly = |e: std::io::Error| BuildError::Assembly {
            package: "tilesets".to_string(),
            source: crate::error::ExtractError::io(&dest, e),
        };
        fs::create_dir_all(&dest).map_err(assembly)?;

        let mut copied = 0;
        for entry in fs::read_dir(&tileset_dir).map_err(assembly)? {
            let path = entry.map_err(assembly)?.path();
            if let (true, Some(file_name)) = (path.is_file(), path.file_name()) {
                fs::copy(&path, dest.join(file_name)).map_err(assembly)?;
                copied += 1;
            }
        }
        self.log.add(&format!(
            "Copied {} extra tilesets from {}",
            copied,
            tileset_dir.display()
        ));
        Ok(())
    }

    fn configure(&mut self) -> Result<(), BuildError> {
        let df_dir = self.staging.path().join("df");
        let assembly = |path: &Path, e: std::io::Error| BuildError::Assembly {
            package: "configuration".to_string(),
            source: crate::error::ExtractError::io(path, e),
        };

        let example = df_dir.join("dfhack.init-example");
        if example.is_file() {
            let init = df_dir.join("dfhack.init");
            fs::copy(&example, &init).map_err(|e| assembly(&init, e))?;
            self.log.add("Created dfhack.init from dfhack.init-example");
        }

        if self.installed.contains(PackageKind::Twbt.name()) {
            let init_txt = df_dir.join("data").join("init").join("init.txt");
            if init_txt.is_file() {
                let text = fs::read_to_string(&init_txt).map_err(|e| assembly(&init_txt, e))?;
                let updated = text.replace("[PRINT_MODE:2D]", "[PRINT_MODE:TWBT]");
                fs::write(&init_txt, updated).map_err(|e| assembly(&init_txt, e))?;
                self.log.add("Set PRINT_MODE to TWBT in init.txt");
            } else {
                log_warning(&format!("{} not found, PRINT_MODE left unchanged", init_txt.display()));
                self.log.add("init.txt not found, PRINT_MODE left unchanged");
            }
        }
        Ok(())
    }

    fn move_to_target(&mut self) -> Result<PathBuf, BuildError> {
        move_entry(self.staging.path(), &self.target).map_err(|e| BuildError::Target {
            path: self.target.clone(),
            reason: e.to_string(),
        })?;
        self.log.add(&format!("Build moved to {}", self.target.display()));
        self.log
            .write_to(&self.target)
            .map_err(|e| BuildError::Target {
                path: self.target.clone(),
                reason: format!("cannot write build log: {}", e),
            })?;
        Ok(self.target.clone())
    }
}

/// Make sure `target` does not exist, removing it only with confirmation
fn prepare_target(target: &Path, prompt: &mut dyn Prompt) -> Result<(), BuildError> {
    if !target.exists() {
        return Ok(());
    }
    let question = format!("{} already exists. Remove it and build again?", target.display());
    if !prompt.ask(&question) {
        return Err(BuildError::Declined(format!(
            "target directory {} already exists",
            target.display()
        )));
    }
    let removed = if target.is_dir() {
        fs::remove_dir_all(target)
    } else {
        fs::remove_file(target)
    };
    removed.map_err(|e| BuildError::Target {
        path: target.to_path_buf(),
        reason: e.to_string(),
    })
}
