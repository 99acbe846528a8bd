//! Path helpers for on-disk artifacts (state file, log file, error reports).
//!
//! All locations hang off a single data directory. It can be pinned with the
//! `PAGESHELL_DATA_DIR` environment variable; otherwise it lives under the
//! user's home directory.

use std::path::PathBuf;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "PAGESHELL_DATA_DIR";

/// Returns the data directory for page shell artifacts.
///
/// Resolution order:
/// 1. `$PAGESHELL_DATA_DIR`
/// 2. `$HOME/.local/share/pageshell`
/// 3. `./.pageshell` when no home directory is known
///
/// # Examples
///
/// ```
/// use pageshell::infrastructure::get_data_dir;
///
/// let state_file = get_data_dir().join("state.json");
/// assert!(state_file.ends_with("state.json"));
/// ```
#[must_use]
pub fn get_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }

    std::env::var_os("HOME").filter(|h| !h.is_empty()).map_or_else(
        || PathBuf::from(".pageshell"),
        |home| PathBuf::from(home).join(".local").join("share").join("pageshell"),
    )
}

/// Expands a leading `~` to the user's home directory.
///
/// Paths without a tilde, and all paths when `$HOME` is unset, are returned
/// unchanged.
///
/// # Examples
///
/// ```
/// use pageshell::infrastructure::expand_tilde;
///
/// assert_eq!(expand_tilde("/absolute/path"), "/absolute/path");
/// ```
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    let Some(home) = std::env::var("HOME").ok().filter(|h| !h.is_empty()) else {
        return path.to_string();
    };

    if let Some(rest) = path.strip_prefix("~/") {
        format!("{}/{rest}", home.trim_end_matches('/'))
    } else if path == "~" {
        home
    } else {
        path.to_string()
    }
}

/// Resolves a configured path: expands `~` and anchors relative paths in the data directory.
#[must_use]
pub fn resolve_in_data_dir(path: &str) -> PathBuf {
    let expanded = PathBuf::from(expand_tilde(path));
    if expanded.is_absolute() {
        expanded
    } else {
        get_data_dir().join(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_paths_are_untouched() {
        assert_eq!(expand_tilde("/var/lib/app"), "/var/lib/app");
        assert_eq!(resolve_in_data_dir("/var/lib/app"), PathBuf::from("/var/lib/app"));
    }

    #[test]
    fn relative_paths_land_in_data_dir() {
        let resolved = resolve_in_data_dir("state.json");
        assert!(resolved.starts_with(get_data_dir()));
        assert!(resolved.ends_with("state.json"));
    }
}
