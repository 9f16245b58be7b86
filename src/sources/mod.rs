//! Upstream distribution sources
//!
//! Each [`SourceKind`] enumerates candidate artifacts from one remote API shape
//! and returns a uniform [`Candidate`] listing, most recent last.

use std::collections::HashSet;

use crate::error::SourceError;
use crate::platform::Platform;

pub mod bitbucket;
pub mod github;
pub mod html;
pub mod http;
pub mod itch;
pub mod mirror;

pub use http::{HttpClient, UreqClient};
pub use mirror::MirrorEntry;

/// One downloadable artifact advertised by a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub url: String,
}

impl Candidate {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Everything an adapter needs to talk to its upstream.
///
/// Passed explicitly to every call; adapters keep no state of their own.
pub struct SourceContext<'a> {
    pub client: &'a dyn HttpClient,
    pub github_token: Option<&'a str>,
    pub itch_key: Option<&'a str>,
    pub platform: Platform,
    pub compat_layer: bool,
}

// ============================================================================
// Source Kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// GitHub releases API (`/repos/{owner}/{repo}/releases`)
    Github { releases_url: &'static str },
    /// BitBucket downloads API. No built-in package is hosted there any
    /// more; kept for registry entries that point at BitBucket downloads.
    Bitbucket { downloads_url: &'static str },
    /// Plain HTML page whose `<a href>` targets are the artifacts
    HtmlListing {
        page_url: &'static str,
        base_url: &'static str,
        newest_first: bool,
    },
    /// itch.io library of the configured API key
    Itch { title: &'static str },
    /// Fixed list of known download locations
    Mirror { entries: &'static [MirrorEntry] },
}

impl SourceKind {
    /// Enumerate candidates, most recent last, without duplicate names
    pub fn list(&self, ctx: &SourceContext<'_>) -> Result<Vec<Candidate>, SourceError> {
        let candidates = match self {
            SourceKind::Github { releases_url } => github::list(ctx, releases_url)?,
            SourceKind::Bitbucket { downloads_url } => bitbucket::list(ctx, downloads_url)?,
            SourceKind::HtmlListing {
                page_url,
                base_url,
                newest_first,
            } => html::list(ctx, page_url, base_url, *newest_first)?,
            SourceKind::Itch { title } => itch::list(ctx, title)?,
            SourceKind::Mirror { entries } => mirror::list(ctx, entries),
        };
        Ok(dedup_by_name(candidates))
    }

    /// Extra headers needed to fetch artifacts from this source
    pub fn download_headers(&self, ctx: &SourceContext<'_>) -> Vec<(String, String)> {
        match self {
            SourceKind::Itch { .. } => ctx
                .itch_key
                .map(|key| vec![("Authorization".to_string(), format!("Bearer {}", key))])
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Github { .. } => "GitHub",
            SourceKind::Bitbucket { .. } => "BitBucket",
            SourceKind::HtmlListing { .. } => "web listing",
            SourceKind::Itch { .. } => "itch.io",
            SourceKind::Mirror { .. } => "mirror",
        }
    }
}

/// Keep the first occurrence of each name, preserving order
pub fn dedup_by_name(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.name.clone()))
        .collect()
}
