//! Exclusion rules gating every component's view of trackable files.
//!
//! Combines three layers: version-control metadata (always excluded, so the
//! raw notification stream for `.git` internals can be routed to the git
//! detector instead), the workspace's `.gitignore`, and custom patterns from
//! configuration. Uses the `ignore` crate, which matches git's own rules.

use std::path::{Component, Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// Directory names that are version-control metadata regardless of ignore files.
const VCS_DIRS: &[&str] = &[".git", ".hg", ".svn"];

/// Compiled exclusion patterns for one workspace root.
#[derive(Debug)]
pub struct IgnoreFilter {
    root: PathBuf,
    gitignore: Option<Gitignore>,
    custom: Option<Gitignore>,
}

impl IgnoreFilter {
    /// Build the filter for `root`, loading `<root>/.gitignore` if present
    /// and compiling `custom_patterns` as gitignore-style lines.
    pub fn new(root: &Path, custom_patterns: &[String]) -> Self {
        Self {
            root: root.to_path_buf(),
            gitignore: load_gitignore(root),
            custom: build_custom(root, custom_patterns),
        }
    }

    /// Whether `path` lies inside version-control metadata.
    pub fn is_vcs_metadata(path: &Path) -> bool {
        path.components().any(|c| match c {
            Component::Normal(name) => VCS_DIRS.iter().any(|d| name == *d),
            _ => false,
        })
    }

    /// Whether `path` must be dropped from tracking.
    pub fn is_excluded(&self, path: &Path) -> bool {
        if Self::is_vcs_metadata(path) {
            return true;
        }
        if path.strip_prefix(&self.root).is_err() {
            // Outside the workspace entirely.
            return true;
        }

        let is_dir = path.is_dir();
        if let Some(gitignore) = &self.gitignore {
            if gitignore.matched_path_or_any_parents(path, is_dir).is_ignore() {
                return true;
            }
        }
        if let Some(custom) = &self.custom {
            if custom.matched_path_or_any_parents(path, is_dir).is_ignore() {
                return true;
            }
        }
        false
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn load_gitignore(root: &Path) -> Option<Gitignore> {
    let gitignore_path = root.join(".gitignore");
    if !gitignore_path.exists() {
        return None;
    }

    let mut builder = GitignoreBuilder::new(root);
    builder.add(&gitignore_path);
    match builder.build() {
        Ok(gitignore) => Some(gitignore),
        Err(e) => {
            tracing::warn!("Failed to load .gitignore from {:?}: {}", gitignore_path, e);
            None
        }
    }
}

fn build_custom(root: &Path, patterns: &[String]) -> Option<Gitignore> {
    if patterns.is_empty() {
        return None;
    }

    let mut builder = GitignoreBuilder::new(root);
    for pattern in patterns {
        if let Err(e) = builder.add_line(None, pattern) {
            tracing::warn!("Ignoring malformed exclusion pattern {:?}: {}", pattern, e);
        }
    }
    match builder.build() {
        Ok(gitignore) => Some(gitignore),
        Err(e) => {
            tracing::warn!("Failed to compile custom exclusion patterns: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_vcs_metadata_always_excluded() {
        let dir = TempDir::new().unwrap();
        let filter = IgnoreFilter::new(dir.path(), &[]);

        let head = dir.path().join(".git/HEAD");
        assert!(IgnoreFilter::is_vcs_metadata(&head));
        assert!(filter.is_excluded(&head));
        assert!(!IgnoreFilter::is_vcs_metadata(&dir.path().join("src/main.rs")));
    }

    #[test]
    fn test_paths_outside_workspace_excluded() {
        let dir = TempDir::new().unwrap();
        let filter = IgnoreFilter::new(dir.path(), &[]);
        assert!(filter.is_excluded(Path::new("/elsewhere/file.txt")));
    }

    #[test]
    fn test_gitignore_rules_apply() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "target/\n*.log\n").unwrap();
        let filter = IgnoreFilter::new(dir.path(), &[]);

        assert!(filter.is_excluded(&dir.path().join("target/debug/app")));
        assert!(filter.is_excluded(&dir.path().join("build.log")));
        assert!(!filter.is_excluded(&dir.path().join("src/lib.rs")));
    }

    #[test]
    fn test_custom_patterns_apply() {
        let dir = TempDir::new().unwrap();
        let filter = IgnoreFilter::new(dir.path(), &["*.tmp".to_string()]);

        assert!(filter.is_excluded(&dir.path().join("scratch.tmp")));
        assert!(!filter.is_excluded(&dir.path().join("scratch.txt")));
    }

    #[test]
    fn test_malformed_gitignore_does_not_panic() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "!!\\").unwrap();
        let filter = IgnoreFilter::new(dir.path(), &[]);
        assert!(!filter.is_excluded(&dir.path().join("kept.txt")));
    }
}
