//! Ruby runtime for DFHack's scripting on macOS

use std::path::Path;

use super::Staging;
use crate::error::ExtractError;
use crate::extract::{move_entry, remove_staging, unpack};

const RUBY_DIR: &str = "ruby-2.7.5";
const RUBY_DYLIB: &str = "libruby.2.7.dylib";

/// Keep only the shared library, renamed to where DFHack looks for it
pub fn extract_ruby(staging: &Staging<'_>, archive: &Path) -> Result<(), ExtractError> {
    unpack(archive, staging.release_dir)?;

    let ruby_dir = staging.release_dir.join(RUBY_DIR);
    let dylib = ruby_dir.join("lib").join(RUBY_DYLIB);
    if !dylib.is_file() {
        return Err(ExtractError::Missing {
            what: RUBY_DYLIB.to_string(),
            dir: ruby_dir.join("lib"),
        });
    }
    move_entry(&dylib, &staging.df_dir().join("hack").join("libruby.dylib"))?;
    remove_staging(&ruby_dir)
}
