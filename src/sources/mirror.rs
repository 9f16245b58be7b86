//! Hardcoded download locations for artifacts that have no listing API

use super::{Candidate, SourceContext};
use crate::platform::{Arch, Os, Platform};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorEntry {
    pub platform: Platform,
    pub name: &'static str,
    pub url: &'static str,
}

const MAC64: Platform = Platform {
    os: Os::Mac,
    arch: Arch::X64,
};

pub const LAZY_MAC_PACK: &[MirrorEntry] = &[
    MirrorEntry {
        platform: MAC64,
        name: "Mac OS X 10.5 Dwarf Fortress SSTM Pack v0.44.02.dmg",
        url: "https://dffd.bay12games.com/download.php?id=12093&f=Dwarf+Fortress+SSTM+Pack+v0.44.02.dmg",
    },
    MirrorEntry {
        platform: MAC64,
        name: "Mac OS X 10.6-10.8 Lazy Mac Pack v0.44.09-32.dmg",
        url: "https://dffd.bay12games.com/download.php?id=12061&f=Lazy+Mac+Pack+v0.44.09-32.dmg",
    },
    MirrorEntry {
        platform: MAC64,
        name: "Lite Lazy Mac Pack v0.47.04.dmg",
        url: "https://dffd.bay12games.com/download.php?id=12310&f=Lazy+Mac+Pack+v0.47.04.dmg",
    },
    MirrorEntry {
        platform: MAC64,
        name: "Lazy Mac Pack v0.47.05 dfhack-r1.dmg",
        url: "https://dffd.bay12games.com/download.php?id=12202&f=Lazy+Mac+Pack+v0.47.05+dfhack-r1.dmg",
    },
];

pub const RUBY: &[MirrorEntry] = &[MirrorEntry {
    platform: MAC64,
    name: "ruby-2.7.5.tar.bz2",
    url: "https://s3.amazonaws.com/travis-rubies/binaries/osx/10.13/x86_64/ruby-2.7.5.tar.bz2",
}];

/// Entries for the context's platform, in table order (oldest first)
pub fn list(ctx: &SourceContext<'_>, entries: &[MirrorEntry]) -> Vec<Candidate> {
    entries
        .iter()
        .filter(|e| e.platform == ctx.platform)
        .map(|e| Candidate::new(e.name, e.url))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::http::FixtureClient;

    fn ctx<'a>(client: &'a FixtureClient, platform: &str) -> SourceContext<'a> {
        SourceContext {
            client,
            github_token: None,
            itch_key: None,
            platform: platform.parse().unwrap(),
            compat_layer: false,
        }
    }

    #[test]
    fn test_only_listed_platform() {
        let client = FixtureClient::new();
        assert_eq!(list(&ctx(&client, "mac64"), RUBY).len(), 1);
        assert!(list(&ctx(&client, "mac32"), RUBY).is_empty());
        assert!(list(&ctx(&client, "lin64"), LAZY_MAC_PACK).is_empty());
        assert!(client.requested().is_empty());
    }

    #[test]
    fn test_lazy_mac_pack_newest_last() {
        let client = FixtureClient::new();
        let entries = list(&ctx(&client, "mac64"), LAZY_MAC_PACK);
        assert_eq!(entries.len(), 4);
        assert!(entries[3].name.contains("0.47.05"));
    }
}
