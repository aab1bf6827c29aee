//! Workspace confinement for Junior's tools.
//!
//! Every path argument is resolved lexically against the sandbox root before
//! the filesystem is touched. Absolute paths are refused outright, and a
//! relative path that climbs out of the root with `..` is refused after
//! cleaning. Symlinks are not followed during resolution.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SandboxError {
    #[error("absolute paths not allowed: {0}")]
    Absolute(String),

    #[error("path escapes workspace: {0}")]
    Escapes(String),
}

/// A directory Junior's file and shell tools are confined to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Root at `root`, made absolute against the current directory and
    /// cleaned.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let absolute = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        Self {
            root: clean_path(&absolute),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a model-supplied relative path to an absolute path inside the
    /// root.
    pub fn resolve(&self, rel: &str) -> Result<PathBuf, SandboxError> {
        let cleaned = clean_path(Path::new(rel));
        if cleaned.is_absolute() || cleaned.has_root() {
            return Err(SandboxError::Absolute(rel.to_string()));
        }

        let joined = clean_path(&self.root.join(&cleaned));
        // Component-wise, so `/work-evil` is not inside `/work`.
        if !joined.starts_with(&self.root) {
            return Err(SandboxError::Escapes(rel.to_string()));
        }
        Ok(joined)
    }

    /// `path` relative to the root, for display and for commands run from
    /// the root. The root itself is `"."`.
    pub fn relative(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => PathBuf::from("."),
            Ok(rel) => rel.to_path_buf(),
            Err(_) => path.to_path_buf(),
        }
    }
}

/// Lexically normalize a path: drop `.` components, fold `..` into its
/// parent, and never climb above a root. A relative path that climbs above
/// its start keeps its leading `..` components. An empty result is `"."`.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_path_folds_dots() {
        assert_eq!(clean_path(Path::new("a/./b/../c")), PathBuf::from("a/c"));
        assert_eq!(clean_path(Path::new("./")), PathBuf::from("."));
        assert_eq!(clean_path(Path::new("a/..")), PathBuf::from("."));
        assert_eq!(clean_path(Path::new("../x")), PathBuf::from("../x"));
        assert_eq!(clean_path(Path::new("/../etc")), PathBuf::from("/etc"));
    }

    #[test]
    fn resolves_inside_root() {
        let sandbox = Sandbox::new("/work/project");
        assert_eq!(
            sandbox.resolve("src/main.rs").unwrap(),
            PathBuf::from("/work/project/src/main.rs")
        );
        assert_eq!(sandbox.resolve(".").unwrap(), PathBuf::from("/work/project"));
        assert_eq!(
            sandbox.resolve("a/../b.txt").unwrap(),
            PathBuf::from("/work/project/b.txt")
        );
    }

    #[test]
    fn rejects_absolute_paths() {
        let sandbox = Sandbox::new("/work/project");
        assert_eq!(
            sandbox.resolve("/etc/passwd"),
            Err(SandboxError::Absolute("/etc/passwd".into()))
        );
    }

    #[test]
    fn rejects_traversal() {
        let sandbox = Sandbox::new("/work/project");
        assert!(matches!(
            sandbox.resolve("../../etc/passwd"),
            Err(SandboxError::Escapes(_))
        ));
        assert!(matches!(
            sandbox.resolve("src/../../other"),
            Err(SandboxError::Escapes(_))
        ));
    }

    #[test]
    fn rejects_sibling_with_shared_prefix() {
        let sandbox = Sandbox::new("/work/project");
        assert!(matches!(
            sandbox.resolve("../project-evil/x"),
            Err(SandboxError::Escapes(_))
        ));
    }

    #[test]
    fn relative_root_is_made_absolute() {
        let sandbox = Sandbox::new(".");
        assert!(sandbox.root().is_absolute());
        assert!(sandbox.resolve("Cargo.toml").unwrap().starts_with(sandbox.root()));
    }

    #[test]
    fn relative_display() {
        let sandbox = Sandbox::new("/work/project");
        let inside = sandbox.resolve("src").unwrap();
        assert_eq!(sandbox.relative(&inside), PathBuf::from("src"));
        assert_eq!(sandbox.relative(sandbox.root()), PathBuf::from("."));
    }
}
