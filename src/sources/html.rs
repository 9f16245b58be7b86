//! HTML listing adapter: every `<a href>` on a page is a candidate

use std::sync::LazyLock;

use regex::Regex;

use super::http::get_text;
use super::{Candidate, SourceContext};
use crate::error::SourceError;

static HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s[^>]*?href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
        .expect("valid regex")
});

/// Link targets in document order
pub fn extract_hrefs(html: &str) -> Vec<String> {
    HREF.captures_iter(html)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|m| m.as_str().to_string())
        .collect()
}

fn resolve(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        href.trim_start_matches('/')
    )
}

fn file_name(href: &str) -> &str {
    href.rsplit('/').next().unwrap_or(href)
}

pub fn list(
    ctx: &SourceContext<'_>,
    page_url: &str,
    base_url: &str,
    newest_first: bool,
) -> Result<Vec<Candidate>, SourceError> {
    let html = get_text(ctx.client, page_url)?;
    let mut candidates: Vec<Candidate> = extract_hrefs(&html)
        .into_iter()
        .filter(|href| !href.is_empty() && !href.starts_with('#'))
        .map(|href| Candidate::new(file_name(&href), resolve(base_url, &href)))
        .filter(|c| !c.name.is_empty())
        .collect();
    if newest_first {
        candidates.reverse();
    }
    Ok(candidates)
}
