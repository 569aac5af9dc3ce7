//! Directories searched for config files, per tier.

use std::path::{Path, PathBuf};

/// Where each file tier looks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPaths {
    /// Project-local directories, highest priority first. The first directory
    /// containing a matching file wins.
    pub local_dirs: Vec<PathBuf>,
    /// Per-application home directory (`~/.config/<name>`).
    pub home_dir: Option<PathBuf>,
    /// Project manifest (`<cwd>/package.json`).
    pub package_manifest: PathBuf,
}

impl SearchPaths {
    /// Search paths for `name` rooted at `cwd`.
    ///
    /// Local directories, in order: the explicit `config_dir` (relative to
    /// `cwd` unless absolute), `<cwd>/config`, `<cwd>/.config`, `<cwd>`.
    pub fn discover(cwd: &Path, config_dir: Option<&Path>, name: &str, home: Option<&Path>) -> Self {
        let mut local_dirs = Vec::with_capacity(4);
        if let Some(dir) = config_dir {
            local_dirs.push(cwd.join(dir));
        }
        for dir in [cwd.join("config"), cwd.join(".config"), cwd.to_path_buf()] {
            if !local_dirs.contains(&dir) {
                local_dirs.push(dir);
            }
        }

        Self {
            local_dirs,
            home_dir: home.map(|h| home_config_dir(h, name)),
            package_manifest: cwd.join("package.json"),
        }
    }

    /// Directories worth watching for changes: every local directory plus the
    /// home directory, if they exist.
    pub fn existing_dirs(&self) -> Vec<PathBuf> {
        self.local_dirs
            .iter()
            .chain(self.home_dir.iter())
            .filter(|dir| dir.is_dir())
            .cloned()
            .collect()
    }
}

/// `<home>/.config/<name>`.
pub fn home_config_dir(home: &Path, name: &str) -> PathBuf {
    home.join(".config").join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_local_order() {
        let paths = SearchPaths::discover(Path::new("/proj"), None, "app", None);
        assert_eq!(
            paths.local_dirs,
            vec![
                PathBuf::from("/proj/config"),
                PathBuf::from("/proj/.config"),
                PathBuf::from("/proj"),
            ]
        );
        assert_eq!(paths.home_dir, None);
        assert_eq!(paths.package_manifest, PathBuf::from("/proj/package.json"));
    }

    #[test]
    fn test_explicit_config_dir_first() {
        let paths = SearchPaths::discover(
            Path::new("/proj"),
            Some(Path::new("settings")),
            "app",
            Some(Path::new("/home/u")),
        );
        assert_eq!(paths.local_dirs[0], PathBuf::from("/proj/settings"));
        assert_eq!(paths.local_dirs.len(), 4);
        assert_eq!(paths.home_dir, Some(PathBuf::from("/home/u/.config/app")));
    }

    #[test]
    fn test_explicit_dir_is_not_duplicated() {
        let paths = SearchPaths::discover(Path::new("/proj"), Some(Path::new("config")), "app", None);
        assert_eq!(paths.local_dirs.len(), 3);
        assert_eq!(paths.local_dirs[0], PathBuf::from("/proj/config"));
    }
}
