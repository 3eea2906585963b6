use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// XDG app name used for the config directory.
pub const APP_NAME: &str = "mirai-api-http";

/// Environment variable overriding the setting file location.
pub const CONFIG_ENV: &str = "MAH_CONFIG";

/// Candidate file names, in lookup order. The first is used for new files.
pub const CONFIG_FILENAMES: [&str; 3] = ["setting.yml", "setting.toml", "setting.json"];

/// Per-user config directory, e.g. `~/.config/mirai-api-http` on Linux.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// First existing setting file in `dir`, or `dir/setting.yml` when none exists.
pub fn find_config_file_in(dir: &Path) -> PathBuf {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
        .unwrap_or_else(|| dir.join(CONFIG_FILENAMES[0]))
}

/// Resolve the setting file: `explicit` path, then `$MAH_CONFIG`, then the
/// user config directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    resolve_from(explicit, from_env, config_dir())
}

fn resolve_from(
    explicit: Option<&Path>,
    from_env: Option<PathBuf>,
    dir: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = from_env.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(path);
    }
    let dir = dir.context("cannot determine config directory; pass --config or set MAH_CONFIG")?;
    Ok(find_config_file_in(&dir))
}
