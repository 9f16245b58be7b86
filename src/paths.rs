use std::{path::PathBuf, sync::LazyLock};

pub static DEFAULT_DFDL_PATH: LazyLock<PathBuf> = LazyLock::new(|| {
    if let Ok(custom) = std::env::var("DFDL_HOME") {
        return PathBuf::from(custom);
    }

    let mut path = dirs::home_dir().unwrap_or_default();
    path.push(".dfdl");
    path
});

/// Computes a path under the dfdl data directory.
///
/// Returns a `&Path` referencing the data directory itself if no arguments are passed in, or a
/// `PathBuf` created by joining all of the arguments to the base directory if at least one
/// argument is passed in.
///
/// # Examples
///
/// ```ignore
/// // Assuming `DFDL_HOME` is not set, the default data path is ~/.dfdl
/// assert_eq!(dfdl_path!(), dirs::home_dir().unwrap().join(".dfdl"));
/// assert_eq!(dfdl_path!("logs"), dirs::home_dir().unwrap().join(".dfdl").join("logs"));
/// ```
#[macro_export]
macro_rules! dfdl_path {
    () => {
        $crate::paths::DEFAULT_DFDL_PATH.as_path()
    };

    ( $( $path:expr ),+ $(,)? ) => {
        [
            $crate::paths::DEFAULT_DFDL_PATH.as_path(),
            $( std::path::Path::new(&$path) ),+
        ].into_iter().collect::<std::path::PathBuf>()
    };
}
