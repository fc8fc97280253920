//! Root containment and read-path authorization
//!
//! Resolution is purely lexical. Symlinks inside the root that point outside
//! of it are not followed or detected.

use crate::gateway::{GatewayError, GatewayResult, PolicyDocument};
use glob::{MatchOptions, Pattern};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Match a root-relative, `/`-separated path against a glob. Invalid globs never match.
pub fn glob_match(pattern: &str, rel: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(p) => p.matches_with(rel, GLOB_OPTIONS),
        Err(e) => {
            debug!(pattern = %pattern, error = %e, "Invalid glob pattern");
            false
        }
    }
}

/// Whether an allow entry should be treated as a glob
fn is_glob(entry: &str) -> bool {
    entry.contains(['*', '?', '['])
}

/// Collapse `.` and `..` components without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the filesystem root stays at the root
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Keeps every path the gateway touches inside a fixed repository root
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// Create a guard for `root`. A relative root is taken against the current directory.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let absolute = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(root))
                .unwrap_or_else(|_| root.to_path_buf())
        };

        Self {
            root: normalize(&absolute),
        }
    }

    /// The repository root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join `rel` onto the root and reject anything that lands outside it
    ///
    /// The result is either the root itself or strictly nested under it. The
    /// comparison is per path component, so a root of `/repo` never admits
    /// `/repo-evil`.
    pub fn resolve(&self, rel: impl AsRef<Path>) -> GatewayResult<PathBuf> {
        let rel = rel.as_ref();
        let resolved = normalize(&self.root.join(rel));

        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            warn!(path = %rel.display(), "Path escapes repo root");
            Err(GatewayError::PathEscape(rel.display().to_string()))
        }
    }

    /// Root-relative form of a resolved path with `/` separators; `""` for the root
    pub fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        Some(rel.to_string_lossy().replace('\\', "/"))
    }

    /// Whether a resolved path is covered by `allow.read_paths`
    ///
    /// An empty allow set denies everything. `.` (or an empty entry) allows
    /// the whole tree, entries with wildcards are globs, anything else is an
    /// exact path or a directory prefix.
    pub fn is_read_allowed(&self, path: &Path, policy: &PolicyDocument) -> bool {
        let Some(rel) = self.relative(path) else {
            return false;
        };

        policy.allow.read_paths.iter().any(|entry| {
            let normalized = entry.replace('\\', "/");
            let entry = normalized.trim_end_matches('/');

            if entry == "." || entry.is_empty() {
                return true;
            }

            if is_glob(entry) {
                return glob_match(entry, &rel);
            }

            rel == entry
                || rel
                    .strip_prefix(entry)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::AllowRules;

    fn policy(read_paths: &[&str]) -> PolicyDocument {
        PolicyDocument {
            allow: AllowRules {
                read_paths: read_paths.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_within_root() {
        let guard = PathGuard::new("/repo");

        assert_eq!(guard.resolve("docs/api.md").unwrap(), PathBuf::from("/repo/docs/api.md"));
        assert_eq!(guard.resolve("a/./b/..").unwrap(), PathBuf::from("/repo/a"));
        assert_eq!(guard.resolve("").unwrap(), PathBuf::from("/repo"));
        assert_eq!(guard.resolve(".").unwrap(), PathBuf::from("/repo"));
        assert_eq!(guard.resolve("docs/..").unwrap(), PathBuf::from("/repo"));
    }

    #[test]
    fn test_resolve_rejects_escape() {
        let guard = PathGuard::new("/repo");

        for rel in ["..", "../secret.txt", "a/../../x", "/etc/passwd", "../../../../etc"] {
            assert!(
                matches!(guard.resolve(rel), Err(GatewayError::PathEscape(_))),
                "expected {} to escape",
                rel
            );
        }
    }

    #[test]
    fn test_resolve_rejects_prefix_collision() {
        let guard = PathGuard::new("/repo");

        assert!(matches!(
            guard.resolve("../repo-evil/x"),
            Err(GatewayError::PathEscape(_))
        ));
        assert!(matches!(guard.resolve("/repo-evil/x"), Err(GatewayError::PathEscape(_))));
        assert!(guard.resolve("/repo/x").is_ok());
    }

    #[test]
    fn test_relative_root_is_made_absolute() {
        let guard = PathGuard::new("some/dir/..");
        assert!(guard.root().is_absolute());
        assert!(guard.root().ends_with("some"));
    }

    #[test]
    fn test_default_deny() {
        let guard = PathGuard::new("/repo");
        let empty = PolicyDocument::default();

        for rel in ["", "docs", "docs/api.md", "logs/app.log"] {
            let path = guard.resolve(rel).unwrap();
            assert!(!guard.is_read_allowed(&path, &empty));
        }
    }

    #[test]
    fn test_allow_root_sentinel() {
        let guard = PathGuard::new("/repo");

        for entry in [".", "", "./"] {
            let policy = policy(&[entry]);
            for rel in ["", "README.md", "deep/nested/file.txt"] {
                let path = guard.resolve(rel).unwrap();
                assert!(guard.is_read_allowed(&path, &policy), "{:?} should allow {:?}", entry, rel);
            }
        }
    }

    #[test]
    fn test_directory_prefix() {
        let guard = PathGuard::new("/repo");
        let policy = policy(&["logs"]);

        let allowed = |rel: &str| guard.is_read_allowed(&guard.resolve(rel).unwrap(), &policy);

        assert!(allowed("logs"));
        assert!(allowed("logs/app.log"));
        assert!(allowed("logs/sub/app.log"));
        assert!(!allowed("logs2/app.log"));
        assert!(!allowed("logs.txt"));
        assert!(!allowed(""));
    }

    #[test]
    fn test_trailing_slash_and_backslash_entries() {
        let guard = PathGuard::new("/repo");
        let policy = policy(&["docs/", "contracts\\api"]);

        let allowed = |rel: &str| guard.is_read_allowed(&guard.resolve(rel).unwrap(), &policy);

        assert!(allowed("docs/readme.md"));
        assert!(allowed("contracts/api/v1.yaml"));
        assert!(!allowed("contracts/internal.yaml"));
    }

    #[test]
    fn test_glob_entries() {
        let guard = PathGuard::new("/repo");
        let policy = policy(&["docs/*.md", "logs/**/*.log"]);

        let allowed = |rel: &str| guard.is_read_allowed(&guard.resolve(rel).unwrap(), &policy);

        assert!(allowed("docs/readme.md"));
        assert!(!allowed("docs/sub/readme.md"));
        assert!(!allowed("docs/readme.txt"));
        assert!(allowed("logs/app.log"));
        assert!(allowed("logs/a/b/app.log"));
        assert!(!allowed("logs/app.txt"));
    }

    #[test]
    fn test_invalid_glob_never_matches() {
        assert!(!glob_match("logs/[", "logs/["));
        assert!(glob_match("logs/*.log", "logs/app.log"));
    }

    #[test]
    fn test_path_outside_root_is_denied() {
        let guard = PathGuard::new("/repo");
        let policy = policy(&["."]);

        assert!(!guard.is_read_allowed(Path::new("/repo-evil/x"), &policy));
        assert!(!guard.is_read_allowed(Path::new("/etc/passwd"), &policy));
    }
}
