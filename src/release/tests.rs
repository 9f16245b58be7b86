use std::fs;
use std::io::Write;
use std::path::Path;

use serde_json::json;

use super::*;
use crate::extract::write_zip;
use crate::prompt::{AutoPrompt, ScriptedPrompt};
use crate::sources::http::FixtureClient;

const BAY12_PAGE: &str = "http://bay12games.com/dwarves/older_versions.html";
const BAY12_BASE: &str = "http://bay12games.com/dwarves/";
const DFHACK_RELEASES: &str =
    "https://api.github.com/repos/DFHack/dfhack/releases?page=1&per_page=100";
const TWBT_RELEASES: &str =
    "https://api.github.com/repos/thurin/df-twbt/releases?page=1&per_page=100";

const GAME_ARCHIVE: &str = "df_50_05_linux.tar.bz2";
const DFHACK_ARCHIVE: &str = "dfhack-50.05-r1-Linux-64bit.tar.bz2";
const TWBT_ARCHIVE: &str = "twbt-6.61-linux64-50.05.zip";

const THERAPIST_RELEASES: &str =
    "https://api.github.com/repos/Dwarf-Therapist/Dwarf-Therapist/releases?page=1&per_page=100";
const THERAPIST_DMG: &str = "DwarfTherapist-v41.2.5-osx.dmg";

/// Every optional package a mac64 run would try, except Dwarf Therapist
const MAC_ALL_BUT_THERAPIST: [PackageKind; 7] = [
    PackageKind::PyLnp,
    PackageKind::PeStarterPack,
    PackageKind::DfHack,
    PackageKind::Twbt,
    PackageKind::Soundsense,
    PackageKind::LazyMacPack,
    PackageKind::Ruby,
];

const EVERYTHING_BUT_PLUGINS: [PackageKind; 4] = [
    PackageKind::PyLnp,
    PackageKind::PeStarterPack,
    PackageKind::DwarfTherapist,
    PackageKind::Soundsense,
];

fn write_tar_bz2(path: &Path, entries: &[(&str, &[u8])]) {
    let file = fs::File::create(path).unwrap();
    let encoder = bzip2::write::BzEncoder::new(file, bzip2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap().flush().unwrap();
}

fn game_archive(path: &Path) {
    write_tar_bz2(
        path,
        &[
            ("df_linux/dwarfort", b"#!/bin/sh\n"),
            ("df_linux/data/init/init.txt", b"[SOUND:YES]\n[PRINT_MODE:2D]\n"),
        ],
    );
}

fn bay12_page() -> String {
    [
        GAME_ARCHIVE,
        "df_50_05_win.zip",
        "df_50_05_osx.tar.bz2",
        "df_47_05_linux.tar.bz2",
    ]
    .iter()
    .map(|name| format!("<a href=\"{}\">{}</a>\n", name, name))
    .collect()
}

fn github_release(assets: &[&str]) -> serde_json::Value {
    json!({
        "tag_name": "release",
        "assets": assets
            .iter()
            .map(|name| json!({
                "name": name,
                "browser_download_url": format!("https://github.com/dl/{}", name),
            }))
            .collect::<Vec<_>>(),
    })
}

/// Game served over HTTP, everything else left to the caller
fn base_client(dir: &Path) -> FixtureClient {
    let archive = dir.join("served-game.tar.bz2");
    game_archive(&archive);
    FixtureClient::new()
        .with(BAY12_PAGE, 200, bay12_page())
        .with(
            &format!("{}{}", BAY12_BASE, GAME_ARCHIVE),
            200,
            fs::read(&archive).unwrap(),
        )
}

fn plugin_listings(client: FixtureClient) -> FixtureClient {
    client
        .with_json(
            DFHACK_RELEASES,
            json!([
                github_release(&[DFHACK_ARCHIVE, "dfhack-50.05-r1-Windows-64bit.zip"]),
                github_release(&["dfhack-47.05-r8-Linux-64bit.tar.bz2"]),
            ]),
        )
        .with_json(TWBT_RELEASES, json!([github_release(&[TWBT_ARCHIVE])]))
}

struct Workspace {
    root: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("cache")).unwrap();
        Self { root }
    }

    fn cache(&self) -> std::path::PathBuf {
        self.root.path().join("cache")
    }

    fn target(&self) -> std::path::PathBuf {
        self.root.path().join("out")
    }

    fn config(&self) -> AppConfig {
        AppConfig {
            cache_dir: Some(self.cache()),
            tileset_dir: Some(self.root.path().join("no-tilesets")),
            ..AppConfig::default()
        }
    }

    fn options(&self, skip: &[PackageKind]) -> ReleaseOptions {
        self.options_for("lin64", skip)
    }

    fn options_for(&self, platform: &str, skip: &[PackageKind]) -> ReleaseOptions {
        let mut options = ReleaseOptions::new(platform.parse().unwrap());
        options.game_source = Some(GameSource::Bay12);
        options.target = Some(self.target());
        options.skip = skip.to_vec();
        options
    }

    fn cache_plugins(&self) {
        write_tar_bz2(
            &self.cache().join(DFHACK_ARCHIVE),
            &[
                ("dfhack", b"#!/bin/sh\n"),
                ("dfhack-run", b"#!/bin/sh\n"),
                ("dfhack.init-example", b"enable automelt\n"),
                ("hack/plugins/automelt.plug.so", b"so"),
            ],
        );
        write_zip(
            &self.cache().join(TWBT_ARCHIVE),
            &[
                ("50.05/", b""),
                ("50.05/twbt.plug.so", b"so"),
                ("mousequery.lua", b"-- lua"),
                ("white1px.png", b"png"),
                ("overrides.txt", b"# overrides"),
            ],
        );
    }
}

fn installed_names(outcomes: &[(String, StepOutcome)]) -> Vec<&str> {
    outcomes
        .iter()
        .filter(|(_, outcome)| matches!(outcome, StepOutcome::Installed(_)))
        .map(|(name, _)| name.as_str())
        .collect()
}

#[test]
fn test_full_run_with_plugins() {
    let ws = Workspace::new();
    ws.cache_plugins();
    let client = plugin_listings(base_client(ws.root.path()));
    let mut prompt = AutoPrompt::new(false);

    let mut release =
        Release::new(ws.options(&EVERYTHING_BUT_PLUGINS), ws.config(), &client, &mut prompt)
            .unwrap();
    let target = release.run().unwrap();

    assert_eq!(target, ws.target());
    assert_eq!(
        installed_names(release.outcomes()),
        vec![GAME_NAME, "DFHack", "TWBT"]
    );
    let game = release.installed().get(GAME_NAME).unwrap();
    assert_eq!(game.major(), Some(50));
    assert_eq!(game.minor(), Some(5));
    assert!(release
        .log()
        .entries()
        .any(|e| e.contains("Successfully unpacked DFHack")));

    // Game downloaded into the cache, plugins served from it
    assert!(ws.cache().join(GAME_ARCHIVE).is_file());
    assert!(!client
        .requested()
        .iter()
        .any(|url| url.starts_with("https://github.com/dl/")));

    let df = target.join("df");
    assert!(df.join("dwarfort").is_file());
    assert!(df.join("hack/plugins/automelt.plug.so").is_file());
    assert!(df.join("hack/plugins/twbt.plug.so").is_file());
    assert!(df.join("hack/lua/mousequery.lua").is_file());
    assert!(df.join("data/art/white1px.png").is_file());
    assert!(df.join("data/init/overrides.txt").is_file());
    assert_eq!(
        fs::read_to_string(df.join("dfhack.init")).unwrap(),
        "enable automelt\n"
    );
    let init = fs::read_to_string(df.join("data/init/init.txt")).unwrap();
    assert!(init.contains("[PRINT_MODE:TWBT]"));
    assert!(!init.contains("[PRINT_MODE:2D]"));

    let build_log = fs::read_to_string(target.join(crate::logging::BUILD_LOG_NAME)).unwrap();
    assert!(build_log.contains("Build moved to"));

    // Staging was renamed into place
    let leftovers: Vec<_> = fs::read_dir(ws.root.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".dfdl-staging-"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_plugin_skipped_when_dependency_missing() {
    let ws = Workspace::new();
    ws.cache_plugins();
    let client = plugin_listings(base_client(ws.root.path()));
    let mut prompt = AutoPrompt::new(false);

    let mut skip = EVERYTHING_BUT_PLUGINS.to_vec();
    skip.push(PackageKind::DfHack);
    let mut release = Release::new(ws.options(&skip), ws.config(), &client, &mut prompt).unwrap();
    let target = release.run().unwrap();

    let outcomes = release.outcomes().to_vec();
    assert_eq!(installed_names(&outcomes), vec![GAME_NAME]);
    assert!(matches!(
        &outcomes[1],
        (name, StepOutcome::Skipped(SkipReason::DependencyUnsatisfied(details)))
            if name == "TWBT" && details.contains("DFHack")
    ));
    assert!(release.log().as_str().contains("Skipped TWBT"));
    assert!(!client.requested().contains(&TWBT_RELEASES.to_string()));

    // Nothing for TWBT to switch on
    let init = fs::read_to_string(target.join("df/data/init/init.txt")).unwrap();
    assert!(init.contains("[PRINT_MODE:2D]"));
}

#[test]
fn test_ambiguous_game_archive_aborts_before_finalize() {
    let ws = Workspace::new();
    write_tar_bz2(
        &ws.cache().join(GAME_ARCHIVE),
        &[
            ("df_linux/dwarfort", b"bin"),
            ("df_linux_old/dwarfort", b"bin"),
        ],
    );
    let client = FixtureClient::new().with(BAY12_PAGE, 200, bay12_page());
    let mut prompt = AutoPrompt::new(true);

    let mut skip = EVERYTHING_BUT_PLUGINS.to_vec();
    skip.extend([PackageKind::DfHack, PackageKind::Twbt]);
    let mut release = Release::new(ws.options(&skip), ws.config(), &client, &mut prompt).unwrap();
    let err = release.run().unwrap_err();

    assert!(matches!(
        err,
        BuildError::Assembly {
            source: crate::error::ExtractError::Ambiguous { .. },
            ..
        }
    ));
    assert_eq!(err.package(), Some(GAME_NAME));
    assert!(release.log().as_str().contains("Aborted"));
    assert!(!ws.target().exists());
}

#[test]
fn test_required_listing_failure_aborts() {
    let ws = Workspace::new();
    let client = FixtureClient::new().with(BAY12_PAGE, 503, "down");
    // Continuing is offered only for optional packages
    let mut prompt = AutoPrompt::new(true);

    let mut release = Release::new(ws.options(&[]), ws.config(), &client, &mut prompt).unwrap();
    let err = release.run().unwrap_err();
    assert!(matches!(err, BuildError::Source { ref package, .. } if package == GAME_NAME));
    assert!(release.outcomes().is_empty());
    assert!(!ws.target().exists());
}

#[test]
fn test_optional_download_failure_asks_to_continue() {
    let ws = Workspace::new();
    // DFHack is listed but neither cached nor served
    let client = plugin_listings(base_client(ws.root.path()));
    let mut prompt = ScriptedPrompt::new(&[true, false], &[Some(0), Some(0)]);

    let outcomes = {
        let mut release =
            Release::new(ws.options(&EVERYTHING_BUT_PLUGINS), ws.config(), &client, &mut prompt)
                .unwrap();
        release.run().unwrap();
        release.outcomes().to_vec()
    };

    assert_eq!(installed_names(&outcomes), vec![GAME_NAME]);
    assert!(matches!(
        &outcomes[1],
        (name, StepOutcome::Skipped(SkipReason::Failed(_))) if name == "DFHack"
    ));
    assert!(matches!(
        &outcomes[2],
        (name, StepOutcome::Skipped(SkipReason::DependencyUnsatisfied(_))) if name == "TWBT"
    ));
    assert_eq!(
        prompt.questions,
        vec![
            "Select a version of Dwarf Fortress".to_string(),
            "Select a version of DFHack".to_string(),
            "DFHack failed. Continue without it?".to_string(),
            "Dependencies of TWBT are not satisfied (DFHack is not installed). Continue anyway?"
                .to_string(),
        ]
    );
    assert!(!ws.cache().join(DFHACK_ARCHIVE).exists());
    assert!(!ws.cache().join(format!("{}.part", DFHACK_ARCHIVE)).exists());
}

#[test]
fn test_itch_without_key_aborts() {
    let ws = Workspace::new();
    let client = FixtureClient::new();
    let mut prompt = ScriptedPrompt::new(&[], &[Some(1)]);

    let mut options = ws.options(&[]);
    options.game_source = None;
    let mut release = Release::new(options, ws.config(), &client, &mut prompt).unwrap();
    let err = release.run().unwrap_err();

    assert!(matches!(
        err,
        BuildError::Source {
            source: crate::error::SourceError::MissingCredentials { .. },
            ..
        }
    ));
    assert!(client.requested().is_empty());
}

#[test]
fn test_requested_game_version() {
    let ws = Workspace::new();
    game_archive(&ws.cache().join("df_47_05_linux.tar.bz2"));
    let client = FixtureClient::new().with(BAY12_PAGE, 200, bay12_page());
    let mut prompt = AutoPrompt::new(false);

    let mut options = ws.options(&[PackageKind::DfHack, PackageKind::Twbt]);
    options.skip.extend(EVERYTHING_BUT_PLUGINS);
    options.game_version = Some("47.05".to_string());
    let mut release = Release::new(options, ws.config(), &client, &mut prompt).unwrap();
    release.run().unwrap();

    let game = release.installed().get(GAME_NAME).unwrap();
    assert_eq!(game.major(), Some(47));
}

#[test]
fn test_existing_target_kept_when_declined() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.target()).unwrap();
    fs::write(ws.target().join("save.dat"), b"keep").unwrap();
    let client = FixtureClient::new();
    let mut prompt = ScriptedPrompt::new(&[false], &[]);

    let result = Release::new(ws.options(&[]), ws.config(), &client, &mut prompt);
    assert!(matches!(result, Err(BuildError::Declined(_))));
    assert_eq!(fs::read(ws.target().join("save.dat")).unwrap(), b"keep");
}

#[test]
fn test_optional_packages_by_platform() {
    let lin: Platform = "lin64".parse().unwrap();
    let mac64: Platform = "mac64".parse().unwrap();
    let mac32: Platform = "mac32".parse().unwrap();

    assert_eq!(optional_packages(lin, false).len(), 6);
    assert_eq!(optional_packages(lin, false)[2], PackageKind::DfHack);
    assert_eq!(
        optional_packages(mac64, false)[6..],
        [PackageKind::LazyMacPack, PackageKind::Ruby]
    );
    assert_eq!(optional_packages(mac32, false)[6..], [PackageKind::LazyMacPack]);
    assert_eq!(optional_packages(mac64, true).len(), 6);
}

/// mac64 run where only the game and a Dwarf Therapist disk image are
/// available; the image is not a real dmg, so mounting it fails
fn therapist_disk_image_run(
    ws: &Workspace,
    prompt: &mut dyn Prompt,
) -> (Result<PathBuf, BuildError>, Vec<(String, StepOutcome)>) {
    write_tar_bz2(
        &ws.cache().join("df_50_05_osx.tar.bz2"),
        &[("df_osx/dwarfort", b"#!/bin/sh\n")],
    );
    fs::write(ws.cache().join(THERAPIST_DMG), b"not a disk image").unwrap();
    let client = FixtureClient::new()
        .with(BAY12_PAGE, 200, bay12_page())
        .with_json(THERAPIST_RELEASES, json!([github_release(&[THERAPIST_DMG])]));

    let options = ws.options_for("mac64", &MAC_ALL_BUT_THERAPIST);
    let mut release = Release::new(options, ws.config(), &client, prompt).unwrap();
    let result = release.run();
    let outcomes = release.outcomes().to_vec();
    (result, outcomes)
}

#[test]
fn test_therapist_mount_failure_skipped_when_continuing() {
    let ws = Workspace::new();
    let mut prompt = AutoPrompt::new(true);
    let (result, outcomes) = therapist_disk_image_run(&ws, &mut prompt);

    let target = result.unwrap();
    assert!(target.join("df/dwarfort").is_file());
    assert!(!target.join("LNP/utilities").exists());
    assert_eq!(installed_names(&outcomes), vec![GAME_NAME]);
    assert!(matches!(
        &outcomes[1],
        (name, StepOutcome::Skipped(SkipReason::Failed(_))) if name == "Dwarf Therapist"
    ));
    let build_log = fs::read_to_string(target.join(crate::logging::BUILD_LOG_NAME)).unwrap();
    assert!(build_log.contains("Failed Dwarf Therapist"));
    assert!(build_log.contains("Skipped Dwarf Therapist"));
}

#[test]
fn test_therapist_mount_failure_aborts_when_declined() {
    let ws = Workspace::new();
    let mut prompt = AutoPrompt::new(false);
    let (result, outcomes) = therapist_disk_image_run(&ws, &mut prompt);

    let err = result.unwrap_err();
    assert!(matches!(
        err,
        BuildError::Assembly {
            source: crate::error::ExtractError::Command { .. },
            ..
        }
    ));
    assert_eq!(err.package(), Some("Dwarf Therapist"));
    assert_eq!(installed_names(&outcomes), vec![GAME_NAME]);
    assert!(!ws.target().exists());
}

#[test]
fn test_appimage_only_listing_skips_therapist() {
    let ws = Workspace::new();
    let appimage = "DwarfTherapist-v41.2.5-linux-x86_64.AppImage";
    fs::write(ws.cache().join(appimage), b"\x7fELF").unwrap();
    let client = base_client(ws.root.path()).with_json(
        THERAPIST_RELEASES,
        json!([github_release(&[appimage, "DwarfTherapist-v41.2.5-win64.zip"])]),
    );
    let mut prompt = AutoPrompt::new(true);

    let skip = [
        PackageKind::PyLnp,
        PackageKind::PeStarterPack,
        PackageKind::DfHack,
        PackageKind::Twbt,
        PackageKind::Soundsense,
    ];
    let mut release = Release::new(ws.options(&skip), ws.config(), &client, &mut prompt).unwrap();
    let target = release.run().unwrap();

    assert!(matches!(
        &release.outcomes()[1],
        (name, StepOutcome::Skipped(SkipReason::NoCandidates)) if name == "Dwarf Therapist"
    ));
    assert!(target.join("df/dwarfort").is_file());
    assert!(!target.join("LNP/utilities").exists());
}
