//! BitBucket downloads adapter

use serde::Deserialize;

use super::http::get_json;
use super::{Candidate, SourceContext};
use crate::error::SourceError;

#[derive(Deserialize, Debug)]
struct DownloadsPage {
    values: Vec<Download>,
}

#[derive(Deserialize, Debug)]
struct Download {
    name: String,
    links: DownloadLinks,
}

#[derive(Deserialize, Debug)]
struct DownloadLinks {
    #[serde(rename = "self")]
    self_link: Link,
}

#[derive(Deserialize, Debug)]
struct Link {
    href: String,
}

pub fn list(ctx: &SourceContext<'_>, downloads_url: &str) -> Result<Vec<Candidate>, SourceError> {
    let page: DownloadsPage = get_json(ctx.client, downloads_url, &[])?;
    Ok(page
        .values
        .into_iter()
        .map(|d| Candidate::new(d.name, d.links.self_link.href))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::http::FixtureClient;
    use serde_json::json;

    #[test]
    fn test_reads_values() {
        let url = "https://api.bitbucket.org/2.0/repositories/pidgeot/python-lnp/downloads";
        let client = FixtureClient::new().with_json(
            url,
            json!({
                "values": [
                    {"name": "PyLNP_0.13b-linux.tar.xz",
                     "links": {"self": {"href": "https://bitbucket.org/dl/PyLNP_0.13b-linux.tar.xz"}}},
                ]
            }),
        );
        let ctx = SourceContext {
            client: &client,
            github_token: None,
            itch_key: None,
            platform: "lin64".parse().unwrap(),
            compat_layer: false,
        };
        let list = list(&ctx, url).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].url, "https://bitbucket.org/dl/PyLNP_0.13b-linux.tar.xz");
    }

    #[test]
    fn test_malformed_body() {
        let url = "https://api.bitbucket.org/2.0/downloads";
        let client = FixtureClient::new().with(url, 200, "not json");
        let ctx = SourceContext {
            client: &client,
            github_token: None,
            itch_key: None,
            platform: "lin64".parse().unwrap(),
            compat_layer: false,
        };
        assert!(matches!(list(&ctx, url), Err(SourceError::Parse { .. })));
    }
}
