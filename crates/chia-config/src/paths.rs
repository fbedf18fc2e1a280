//! Path helpers shared by config loading and identity resolution

use std::path::{Path, PathBuf};

/// Default location of the client config file
///
/// `<config_dir>/chia-repl/config.toml`, falling back to the current
/// directory when the platform reports no config directory.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chia-repl")
        .join("config.toml")
}

/// Expand a leading `~` component to the invoking user's home directory
///
/// - `~` becomes the home directory
/// - `~/rest` becomes `<home>/rest`
/// - anything else (including `~user/...`) is returned unchanged
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) if rest.as_os_str().is_empty() => home,
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
