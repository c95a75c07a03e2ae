use sgai_core::paths::SGAI_DIR;
use std::path::{Path, PathBuf};

/// Resolve the directory whose `.sgai/config.yaml` configures this run.
///
/// Priority:
/// 1. `--root` flag / `SGAI_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.sgai/`
/// 3. Walk upward from `cwd` looking for `.git/`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    resolve_from(&cwd)
}

fn resolve_from(start: &Path) -> PathBuf {
    find_upward(start, SGAI_DIR)
        .or_else(|| find_upward(start, ".git"))
        .unwrap_or_else(|| start.to_path_buf())
}

fn find_upward(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        let result = resolve_root(Some(dir.path()));
        assert_eq!(result, dir.path());
    }

    #[test]
    fn finds_sgai_dir_from_subdir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".sgai")).unwrap();
        let subdir = dir.path().join("src/deep");
        std::fs::create_dir_all(&subdir).unwrap();

        assert_eq!(resolve_from(&subdir), dir.path());
    }

    #[test]
    fn sgai_dir_beats_git_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let inner = dir.path().join("service");
        std::fs::create_dir_all(inner.join(".sgai")).unwrap();

        assert_eq!(resolve_from(&inner.join("src")), inner);
    }

    #[test]
    fn falls_back_to_git_then_start() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let subdir = dir.path().join("a/b");
        std::fs::create_dir_all(&subdir).unwrap();
        assert_eq!(resolve_from(&subdir), dir.path());

        let bare = TempDir::new().unwrap();
        assert_eq!(resolve_from(bare.path()), bare.path());
    }
}
