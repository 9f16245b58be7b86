//! GitHub releases adapter

use serde::Deserialize;

use super::http::get_json;
use super::{Candidate, SourceContext};
use crate::error::SourceError;
use crate::logging::log_info;

const PER_PAGE: usize = 100;

/// GitHub release metadata
#[derive(Deserialize, Debug, Clone)]
pub struct GithubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<GithubAsset>,
}

/// GitHub release asset
#[derive(Deserialize, Debug, Clone)]
pub struct GithubAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// Walk every release page and collect all assets, oldest release first
pub fn list(ctx: &SourceContext<'_>, releases_url: &str) -> Result<Vec<Candidate>, SourceError> {
    let auth = ctx.github_token.map(|token| format!("Bearer {}", token));
    let headers: Vec<(&str, &str)> = auth
        .as_deref()
        .map(|value| vec![("Authorization", value)])
        .unwrap_or_default();

    let mut releases: Vec<GithubRelease> = Vec::new();
    let mut page = 1;
    loop {
        let url = format!("{}?page={}&per_page={}", releases_url, page, PER_PAGE);
        let batch: Vec<GithubRelease> = get_json(ctx.client, &url, &headers)?;
        let count = batch.len();
        releases.extend(batch);
        if count < PER_PAGE {
            break;
        }
        page += 1;
    }

    log_info(&format!(
        "Found {} releases at {} ({} pages)",
        releases.len(),
        releases_url,
        page
    ));

    // The API lists newest first
    Ok(releases
        .into_iter()
        .rev()
        .flat_map(|release| release.assets)
        .map(|asset| Candidate::new(asset.name, asset.browser_download_url))
        .collect())
}
