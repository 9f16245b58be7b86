//! dfdl - Dwarf Fortress release assembler
//!
//! Downloads Dwarf Fortress, DFHack and the usual companion tools for one
//! platform and assembles them into a single directory.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use dfdl::logging::{init_logger, log_error, log_info, SystemInfo};
use dfdl::packages::PackageKind;
use dfdl::prompt::{AutoPrompt, Prompt, TerminalPrompt};
use dfdl::sources::UreqClient;
use dfdl::{AppConfig, BuildError, GameSource, Platform, Release, ReleaseOptions};

#[derive(Parser, Debug)]
#[clap(name = "dfdl", version, about = "Assemble a Dwarf Fortress release with community tools")]
struct Args {
    /// Write a config.json template and exit
    #[clap(long)]
    gen_config: bool,
    /// Game version to install without asking, e.g. 50.05
    #[clap(long)]
    df_ver: Option<String>,
    /// Where to get the game from; asked for when omitted
    #[clap(long, value_enum)]
    df_source: Option<GameSource>,
    /// Pick the newest compatible version of everything without asking
    #[clap(long)]
    auto_install: bool,
    /// With --auto-install, skip optional packages that fail instead of aborting
    #[clap(long, requires = "auto_install")]
    keep_going: bool,
    /// Target platform (win32, win64, lin32, lin64, mac32, mac64); defaults to this machine
    #[clap(long)]
    platform: Option<Platform>,
    /// Build Windows binaries to run under Wine or another compatibility layer
    #[clap(long)]
    wine: bool,
    /// Optional package to leave out (repeatable), e.g. --skip soundsense
    #[clap(long)]
    skip: Vec<PackageKind>,
    /// Output directory; defaults to df-<platform>-<date>
    #[clap(long)]
    target: Option<PathBuf>,
    /// Settings file; defaults to config.json in the working directory
    #[clap(long)]
    config: Option<PathBuf>,
    /// Download cache, overriding config.json
    #[clap(long)]
    cache_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.gen_config {
        let path = args.config.clone().unwrap_or_else(AppConfig::default_path);
        return match AppConfig::write_template(&path) {
            Ok(()) => {
                println!("Wrote {}; add your GitHub token and itch.io API key there.", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    init_logger();
    log_info(&format!("dfdl {} starting", env!("CARGO_PKG_VERSION")));
    log_info(&SystemInfo::detect().summary());

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), BuildError> {
    let config_path = args.config.unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(&config_path)?;
    if let Some(dir) = args.cache_dir {
        config.cache_dir = Some(dir);
    }

    let mut options = ReleaseOptions::new(args.platform.unwrap_or_else(Platform::detect));
    options.compat_layer = args.wine;
    options.game_source = args.df_source;
    options.game_version = args.df_ver;
    options.target = args.target;
    options.skip = args.skip;

    let mut prompt: Box<dyn Prompt> = if args.auto_install {
        // Unattended runs need a source up front
        if options.game_source.is_none() {
            options.game_source = Some(GameSource::Bay12);
        }
        Box::new(AutoPrompt::new(args.keep_going))
    } else {
        Box::new(TerminalPrompt::new())
    };

    let client = UreqClient::new();
    let mut release = Release::new(options, config, &client, prompt.as_mut())?;
    match release.run() {
        Ok(target) => {
            println!("{}", release.log().as_str());
            println!("Release ready in {}", target.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", release.log().as_str());
            Err(e)
        }
    }
}
