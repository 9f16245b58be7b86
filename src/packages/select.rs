//! Choosing one artifact out of a listing
//!
//! [`rank`] and [`auto_pick`] are pure; [`select`] wraps them with the
//! interactive loop.

use std::fmt;

use super::Package;
use crate::error::BuildError;
use crate::logging::{log_info, log_warning};
use crate::prompt::Prompt;
use crate::sources::Candidate;
use crate::version::{InstalledPackages, Version};

/// A candidate with its parsed version and compatibility verdict
#[derive(Debug, Clone)]
pub struct Choice {
    pub candidate: Candidate,
    /// `None` when the name could not be parsed consistently
    pub version: Option<Version>,
    pub compatible: bool,
}

impl Choice {
    fn label(&self) -> String {
        if self.compatible {
            self.candidate.name.clone()
        } else {
            format!("{}  (incompatible with installed packages)", self.candidate.name)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub candidate: Candidate,
    pub compatible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoCandidates,
    UserSkipped,
    ListingFailed(String),
    DependencyUnsatisfied(String),
    Failed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoCandidates => f.write_str("no matching versions found"),
            SkipReason::UserSkipped => f.write_str("skipped by user"),
            SkipReason::ListingFailed(e) => write!(f, "listing failed: {}", e),
            SkipReason::DependencyUnsatisfied(e) => write!(f, "dependency issues: {}", e),
            SkipReason::Failed(e) => write!(f, "{}", e),
        }
    }
}

#[derive(Debug)]
pub enum Decision {
    Selected(Selection),
    Skipped(SkipReason),
    Aborted(BuildError),
}

/// Parse and check every candidate, newest first.
///
/// The sort is stable, so candidates with equal versions keep their listing
/// order (most recent last) before the reversal.
pub fn rank(package: &Package, candidates: &[Candidate], installed: &InstalledPackages) -> Vec<Choice> {
    let mut choices: Vec<Choice> = candidates
        .iter()
        .map(|candidate| {
            let version = package.resolve(candidate).ok();
            let compatible = version
                .as_ref()
                .is_some_and(|v| v.is_compatible_with(installed));
            Choice {
                candidate: candidate.clone(),
                version,
                compatible,
            }
        })
        .collect();

    choices.sort_by(|a, b| a.version.cmp(&b.version));
    choices.reverse();
    choices
}

/// Newest compatible choice, else the newest overall
pub fn auto_pick(choices: &[Choice]) -> Option<usize> {
    if let Some(index) = choices.iter().position(|c| c.compatible) {
        return Some(index);
    }
    if let Some(first) = choices.first() {
        log_warning(&format!(
            "No compatible version of {} found, using the newest: {}",
            first
                .version
                .as_ref()
                .map(|v| v.package_name().to_string())
                .unwrap_or_default(),
            first.candidate.name
        ));
        return Some(0);
    }
    None
}

/// Index of the choice whose version equals `wanted` (e.g. "50.05")
fn find_preferred(package: &Package, choices: &[Choice], wanted: &str) -> Option<usize> {
    let wanted = Version::parse(wanted, package.name()).ok()?;
    if wanted.major().is_none() {
        return None;
    }
    choices
        .iter()
        .position(|c| c.version.as_ref().is_some_and(|v| *v == wanted))
}

fn selected(choice: &Choice) -> Decision {
    Decision::Selected(Selection {
        candidate: choice.candidate.clone(),
        compatible: choice.compatible,
    })
}

/// Pick one candidate for `package`.
///
/// `preferred` names a version to take without asking when present in the listing.
pub fn select(
    package: &Package,
    candidates: &[Candidate],
    installed: &InstalledPackages,
    prompt: &mut dyn Prompt,
    preferred: Option<&str>,
) -> Decision {
    if candidates.is_empty() {
        if package.is_required() {
            return Decision::Aborted(BuildError::NoCandidates {
                package: package.name().to_string(),
            });
        }
        let question = format!(
            "No matching versions of {} found. Continue without it?",
            package.name()
        );
        return if prompt.ask(&question) {
            Decision::Skipped(SkipReason::NoCandidates)
        } else {
            Decision::Aborted(BuildError::Declined(format!(
                "no versions of {} available",
                package.name()
            )))
        };
    }

    let choices = rank(package, candidates, installed);

    if let Some(wanted) = preferred {
        match find_preferred(package, &choices, wanted) {
            Some(index) => {
                log_info(&format!(
                    "Using requested {} version {}: {}",
                    package.name(),
                    wanted,
                    choices[index].candidate.name
                ));
                return selected(&choices[index]);
            }
            None => log_warning(&format!(
                "Requested {} version {} not found in listing",
                package.name(),
                wanted
            )),
        }
    }

    if !prompt.is_interactive() {
        return match auto_pick(&choices) {
            Some(index) => selected(&choices[index]),
            None => Decision::Skipped(SkipReason::NoCandidates),
        };
    }

    let labels: Vec<String> = choices.iter().map(Choice::label).collect();
    let question = format!("Select a version of {}", package.name());
    loop {
        let Some(index) = prompt.choose(&question, &labels, !package.is_required()) else {
            return if package.is_required() {
                Decision::Aborted(BuildError::Declined(format!(
                    "no version of {} selected",
                    package.name()
                )))
            } else {
                Decision::Skipped(SkipReason::UserSkipped)
            };
        };

        let Some(choice) = choices.get(index) else {
            continue;
        };
        if !choice.compatible {
            log_warning(&format!(
                "{} is not compatible with the installed packages",
                choice.candidate.name
            ));
            if prompt.ask("Choose again? Otherwise this version is used anyway.") {
                continue;
            }
        }
        return selected(choice);
    }
}
