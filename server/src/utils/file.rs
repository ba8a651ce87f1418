//! File utility functions

use std::path::PathBuf;

/// Expand a config path string to an absolute path.
///
/// Handles `~` and `~/...` (home directory) and resolves relative paths
/// against the current working directory. Absolute paths pass through.
pub fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();

    if path.is_empty() {
        return std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    }

    let expanded = if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(path))
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            home.join(rest)
        } else {
            PathBuf::from(path)
        }
    } else {
        PathBuf::from(path)
    };

    if expanded.is_relative() {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    } else {
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_path_absolute() {
        assert_eq!(
            expand_path("/etc/rxgate/rxgate.json"),
            PathBuf::from("/etc/rxgate/rxgate.json")
        );
    }

    #[test]
    fn test_expand_path_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~"), home);
            assert_eq!(expand_path("~/.rxgate/rxgate.json"), home.join(".rxgate/rxgate.json"));
        }
    }

    #[test]
    fn test_expand_path_relative_becomes_absolute() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(expand_path("rxgate.json"), cwd.join("rxgate.json"));
        assert!(expand_path("./conf/rxgate.json").is_absolute());
        assert_eq!(expand_path("  "), cwd);
    }
}
