//! itch.io storefront adapter
//!
//! Lists the download sessions of a purchased title using the API key from
//! config.json. Authentication problems surface as errors that always end the
//! run, since retrying cannot help until the user fixes the key.

use serde::Deserialize;
use serde_json::Value;

use super::http::{parse_json, HttpResponse};
use super::{Candidate, SourceContext};
use crate::error::SourceError;
use crate::logging::log_info;
use crate::platform::Os;

const PROFILE_URL: &str = "https://itch.io/api/1/key/me";
const OWNED_KEYS_URL: &str = "https://api.itch.io/profile/owned-keys";

fn sessions_url(key_id: u64) -> String {
    format!(
        "https://itch.io/api/1/jwt/download-key/{}/download-sessions",
        key_id
    )
}

#[derive(Deserialize, Debug)]
struct OwnedKeys {
    #[serde(default)]
    owned_keys: Vec<OwnedKey>,
}

#[derive(Deserialize, Debug)]
struct OwnedKey {
    id: u64,
    #[serde(default)]
    game_id: Option<u64>,
    #[serde(default)]
    game: Option<OwnedGame>,
}

#[derive(Deserialize, Debug)]
struct OwnedGame {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum Sessions {
    List(Vec<Session>),
    Wrapped { download_sessions: Vec<Session> },
}

#[derive(Deserialize, Debug)]
struct Session {
    #[serde(default)]
    platform: String,
    filename: String,
    url: String,
}

/// Platform keyword the storefront uses for our target
fn platform_keyword(ctx: &SourceContext<'_>) -> &'static str {
    if ctx.compat_layer {
        return "windows";
    }
    match ctx.platform.os {
        Os::Windows => "windows",
        Os::Mac => "osx",
        Os::Linux => "linux",
    }
}

/// GET an endpoint and reject auth failures and bodies carrying `errors`
fn fetch(ctx: &SourceContext<'_>, url: &str, auth: &str) -> Result<Value, SourceError> {
    let response: HttpResponse = ctx.client.get(url, &[("Authorization", auth)])?;
    match response.status {
        401 => return Err(SourceError::Unauthorized { url: url.to_string() }),
        403 => return Err(SourceError::Forbidden { url: url.to_string() }),
        status if !response.is_success() => {
            return Err(SourceError::Http {
                url: url.to_string(),
                status,
            })
        }
        _ => {}
    }

    let value: Value = parse_json(url, &response.body)?;
    if let Some(errors) = value.get("errors") {
        return Err(SourceError::Api {
            url: url.to_string(),
            message: errors.to_string(),
        });
    }
    Ok(value)
}

fn decode<T: serde::de::DeserializeOwned>(url: &str, value: Value) -> Result<T, SourceError> {
    serde_json::from_value(value).map_err(|e| SourceError::Parse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

pub fn list(ctx: &SourceContext<'_>, title: &str) -> Result<Vec<Candidate>, SourceError> {
    let key = ctx
        .itch_key
        .filter(|k| !k.trim().is_empty())
        .ok_or(SourceError::MissingCredentials {
            what: "itch.io API key",
        })?;
    let auth = format!("Bearer {}", key);

    fetch(ctx, PROFILE_URL, &auth)?;

    let owned: OwnedKeys = decode(OWNED_KEYS_URL, fetch(ctx, OWNED_KEYS_URL, &auth)?)?;
    let owned_key = owned
        .owned_keys
        .iter()
        .find(|k| {
            k.game
                .as_ref()
                .and_then(|g| g.title.as_deref())
                .is_some_and(|t| t.eq_ignore_ascii_case(title))
        })
        .ok_or_else(|| SourceError::NotOwned {
            title: title.to_string(),
        })?;

    log_info(&format!(
        "Found {} in itch.io library (key {}, game {})",
        title,
        owned_key.id,
        owned_key
            .game_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "?".to_string())
    ));

    let url = sessions_url(owned_key.id);
    let sessions = match decode::<Sessions>(&url, fetch(ctx, &url, &auth)?)? {
        Sessions::List(list) => list,
        Sessions::Wrapped { download_sessions } => download_sessions,
    };

    let keyword = platform_keyword(ctx);
    Ok(sessions
        .into_iter()
        .filter(|s| {
            let platform = s.platform.to_lowercase();
            platform.contains(keyword) || platform.contains("all")
        })
        .map(|s| Candidate::new(s.filename, s.url))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use crate::sources::http::FixtureClient;
    use serde_json::json;

    fn ctx<'a>(client: &'a FixtureClient, key: Option<&'a str>, platform: &str) -> SourceContext<'a> {
        SourceContext {
            client,
            github_token: None,
            itch_key: key,
            platform: platform.parse::<Platform>().unwrap(),
            compat_layer: false,
        }
    }

    fn library() -> FixtureClient {
        FixtureClient::new()
            .with_json(PROFILE_URL, json!({"user": {"id": 1}}))
            .with_json(
                OWNED_KEYS_URL,
                json!({"owned_keys": [
                    {"id": 11, "game_id": 500, "game": {"title": "Some Other Game"}},
                    {"id": 42, "game_id": 1000, "game": {"title": "Dwarf Fortress"}},
                ]}),
            )
            .with_json(
                &sessions_url(42),
                json!([
                    {"platform": "Windows", "filename": "dwarf_fortress_50_13_win.zip", "url": "https://itch.io/dl/1"},
                    {"platform": "Linux", "filename": "dwarf_fortress_50_13_linux.tar.bz2", "url": "https://itch.io/dl/2"},
                    {"platform": "all", "filename": "soundtrack.zip", "url": "https://itch.io/dl/3"},
                ]),
            )
    }

    #[test]
    fn test_lists_sessions_for_owned_key() {
        let client = library();
        let list = list(&ctx(&client, Some("k"), "lin64"), "dwarf fortress").unwrap();
        let names: Vec<&str> = list.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["dwarf_fortress_50_13_linux.tar.bz2", "soundtrack.zip"]);
        assert_eq!(
            client.header_sent(OWNED_KEYS_URL, "Authorization").as_deref(),
            Some("Bearer k")
        );
    }

    #[test]
    fn test_compat_layer_wants_windows() {
        let client = library();
        let mut context = ctx(&client, Some("k"), "mac64");
        context.compat_layer = true;
        let list = list(&context, "Dwarf Fortress").unwrap();
        assert_eq!(list[0].name, "dwarf_fortress_50_13_win.zip");
    }

    #[test]
    fn test_missing_key() {
        let client = FixtureClient::new();
        let err = list(&ctx(&client, None, "lin64"), "Dwarf Fortress").unwrap_err();
        assert!(matches!(err, SourceError::MissingCredentials { .. }));
        assert!(err.requires_user_action());
        assert!(client.requested().is_empty());
    }

    #[test]
    fn test_unauthorized_and_forbidden() {
        let client = FixtureClient::new().with(PROFILE_URL, 401, "");
        let err = list(&ctx(&client, Some("bad"), "lin64"), "Dwarf Fortress").unwrap_err();
        assert!(matches!(err, SourceError::Unauthorized { .. }));

        let client = FixtureClient::new()
            .with_json(PROFILE_URL, json!({}))
            .with(OWNED_KEYS_URL, 403, "");
        let err = list(&ctx(&client, Some("k"), "lin64"), "Dwarf Fortress").unwrap_err();
        assert!(matches!(err, SourceError::Forbidden { .. }));
        assert!(err.requires_user_action());
    }

    #[test]
    fn test_errors_field_is_api_failure() {
        let client = FixtureClient::new().with_json(PROFILE_URL, json!({"errors": ["invalid key"]}));
        let err = list(&ctx(&client, Some("k"), "lin64"), "Dwarf Fortress").unwrap_err();
        assert!(matches!(err, SourceError::Api { .. }));
        assert!(!err.requires_user_action());
    }

    #[test]
    fn test_title_not_owned() {
        let client = FixtureClient::new()
            .with_json(PROFILE_URL, json!({}))
            .with_json(OWNED_KEYS_URL, json!({"owned_keys": []}));
        let err = list(&ctx(&client, Some("k"), "lin64"), "Dwarf Fortress").unwrap_err();
        assert!(matches!(err, SourceError::NotOwned { .. }));
    }
}
