//! PathGuard - symlink-aware sandbox containment
//!
//! Every tool resolves its `path` argument through [`resolve_and_check`]. The
//! joined path is canonicalized the same way for every tool: the longest
//! existing prefix is resolved by the OS (following `..` and symlinks), and the
//! not-yet-existing tail is applied lexically until a `..` climbs back into
//! existing territory, where resolution starts over. Dangling symlinks are followed
//! by hand so a link that points outside the sandbox can never be used to
//! create a file there.

use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::ToolError;

/// Maximum number of dangling symlinks followed during one resolution
const MAX_SYMLINK_HOPS: u32 = 40;

/// Canonical sandbox directory, fixed for the lifetime of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxRoot(Arc<PathBuf>);

impl SandboxRoot {
    /// Canonicalize `path` and check that it is a directory
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ToolError> {
        let path = path.as_ref();
        debug!(?path, "SandboxRoot::new: called");

        let canonical = path.canonicalize().map_err(|e| ToolError::InvalidSandbox {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if !canonical.is_dir() {
            debug!(?canonical, "SandboxRoot::new: not a directory");
            return Err(ToolError::InvalidSandbox {
                path: path.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        Ok(Self(Arc::new(canonical)))
    }

    /// The canonical root path
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for SandboxRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Outcome of resolving a relative path against the sandbox root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Canonical absolute path (lexical join if resolution failed)
    pub path: PathBuf,

    /// Whether `path` lies inside the sandbox root
    pub contained: bool,
}

/// Resolve `relative` against `root` and decide containment
///
/// Never fails: any resolution error is reported as `contained == false`.
pub fn resolve_and_check(root: &SandboxRoot, relative: &str) -> Resolution {
    debug!(%root, %relative, "resolve_and_check: called");
    let joined = root.path().join(relative);

    match canonicalize_lenient(&joined, 0) {
        Ok(path) => {
            let contained = is_within(root.path(), &path);
            debug!(?path, contained, "resolve_and_check: resolved");
            Resolution { path, contained }
        }
        Err(e) => {
            debug!(error = %e, ?joined, "resolve_and_check: resolution failed, treating as outside");
            Resolution {
                path: joined,
                contained: false,
            }
        }
    }
}

/// Component-wise containment: equal to `root` or strictly below it
fn is_within(root: &Path, candidate: &Path) -> bool {
    candidate == root || candidate.starts_with(root)
}

/// Canonicalize a path whose tail may not exist yet
fn canonicalize_lenient(path: &Path, hops: u32) -> io::Result<PathBuf> {
    let components: Vec<Component<'_>> = path.components().collect();

    for split in (1..=components.len()).rev() {
        let head: PathBuf = components[..split].iter().collect();

        match head.canonicalize() {
            Ok(mut resolved) => {
                let tail = &components[split..];
                for (i, component) in tail.iter().enumerate() {
                    match component {
                        Component::ParentDir => {
                            // Climbing back may land on an existing entry, possibly a symlink
                            resolved.pop();
                            let rest: PathBuf = tail[i + 1..].iter().collect();
                            if rest.as_os_str().is_empty() {
                                return Ok(resolved);
                            }
                            return canonicalize_lenient(&resolved.join(rest), hops);
                        }
                        Component::CurDir => {}
                        other => resolved.push(other.as_os_str()),
                    }
                }
                return Ok(resolved);
            }
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                // A dangling symlink reports NotFound but still points somewhere
                let is_symlink = head
                    .symlink_metadata()
                    .map(|m| m.file_type().is_symlink())
                    .unwrap_or(false);
                if is_symlink {
                    if hops >= MAX_SYMLINK_HOPS {
                        return Err(io::Error::other("too many levels of symbolic links"));
                    }
                    let target = std::fs::read_link(&head)?;
                    let mut redirected = head.parent().map(Path::to_path_buf).unwrap_or_default().join(target);
                    for component in &components[split..] {
                        redirected.push(component.as_os_str());
                    }
                    debug!(?head, ?redirected, "canonicalize_lenient: following dangling symlink");
                    return canonicalize_lenient(&redirected, hops + 1);
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(ErrorKind::NotFound, "no existing ancestor"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::tempdir;

    fn sandbox() -> (tempfile::TempDir, SandboxRoot) {
        let temp = tempdir().unwrap();
        fs::create_dir(temp.path().join("box")).unwrap();
        let root = SandboxRoot::new(temp.path().join("box")).unwrap();
        (temp, root)
    }

    #[test]
    fn test_root_itself_is_contained() {
        let (_temp, root) = sandbox();
        let res = resolve_and_check(&root, ".");
        assert!(res.contained);
        assert_eq!(res.path, root.path());
    }

    #[test]
    fn test_existing_file_is_contained() {
        let (_temp, root) = sandbox();
        fs::write(root.path().join("main.py"), "print(1)").unwrap();

        let res = resolve_and_check(&root, "main.py");
        assert!(res.contained);
        assert_eq!(res.path, root.path().join("main.py"));
    }

    #[test]
    fn test_new_file_in_new_directory_is_contained() {
        let (_temp, root) = sandbox();
        let res = resolve_and_check(&root, "a/b/c.txt");
        assert!(res.contained);
        assert_eq!(res.path, root.path().join("a/b/c.txt"));
    }

    #[test]
    fn test_parent_traversal_is_rejected() {
        let (_temp, root) = sandbox();
        assert!(!resolve_and_check(&root, "../x").contained);
        assert!(!resolve_and_check(&root, "a/../../x").contained);
        assert!(!resolve_and_check(&root, "..").contained);
    }

    #[test]
    fn test_traversal_that_returns_inside_is_contained() {
        let (_temp, root) = sandbox();
        fs::create_dir(root.path().join("pkg")).unwrap();
        let res = resolve_and_check(&root, "pkg/../notes.txt");
        assert!(res.contained);
        assert_eq!(res.path, root.path().join("notes.txt"));
    }

    #[test]
    fn test_absolute_path_is_rejected() {
        let (_temp, root) = sandbox();
        assert!(!resolve_and_check(&root, "/etc/passwd").contained);
    }

    #[test]
    fn test_sibling_with_shared_prefix_is_rejected() {
        let (temp, root) = sandbox();
        fs::create_dir(temp.path().join("box-evil")).unwrap();
        fs::write(temp.path().join("box-evil/secret.txt"), "s").unwrap();

        let res = resolve_and_check(&root, "../box-evil/secret.txt");
        assert!(!res.contained);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_to_outside_is_rejected() {
        let (temp, root) = sandbox();
        fs::write(temp.path().join("outside.txt"), "secret").unwrap();
        std::os::unix::fs::symlink(temp.path().join("outside.txt"), root.path().join("link.txt")).unwrap();

        let res = resolve_and_check(&root, "link.txt");
        assert!(!res.contained);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_to_outside_is_rejected() {
        let (temp, root) = sandbox();
        fs::create_dir(temp.path().join("elsewhere")).unwrap();
        std::os::unix::fs::symlink(temp.path().join("elsewhere"), root.path().join("dir")).unwrap();

        assert!(!resolve_and_check(&root, "dir/new.txt").contained);
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_to_outside_is_rejected() {
        let (temp, root) = sandbox();
        std::os::unix::fs::symlink(temp.path().join("not-yet.txt"), root.path().join("trap.txt")).unwrap();

        let res = resolve_and_check(&root, "trap.txt");
        assert!(!res.contained);
        assert_eq!(res.path, temp.path().canonicalize().unwrap().join("not-yet.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_sandbox_is_followed() {
        let (_temp, root) = sandbox();
        fs::write(root.path().join("real.txt"), "data").unwrap();
        std::os::unix::fs::symlink(root.path().join("real.txt"), root.path().join("alias.txt")).unwrap();

        let res = resolve_and_check(&root, "alias.txt");
        assert!(res.contained);
        assert_eq!(res.path, root.path().join("real.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_rejected() {
        let (_temp, root) = sandbox();
        std::os::unix::fs::symlink(root.path().join("b"), root.path().join("a")).unwrap();
        std::os::unix::fs::symlink(root.path().join("a"), root.path().join("b")).unwrap();

        assert!(!resolve_and_check(&root, "a").contained);
    }

    #[test]
    fn test_overlong_component_is_rejected_not_panicking() {
        let (_temp, root) = sandbox();
        let long = "x".repeat(5000);
        let res = resolve_and_check(&root, &format!("{long}/{long}"));
        // Either the OS refuses the name or the lexical tail stays inside; never a panic
        if res.contained {
            assert!(res.path.starts_with(root.path()));
        }
    }

    #[test]
    fn test_path_through_regular_file_stays_lexical() {
        let (_temp, root) = sandbox();
        fs::write(root.path().join("file.txt"), "x").unwrap();
        let res = resolve_and_check(&root, "file.txt/child");
        assert!(res.contained);
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_dir_then_parent_into_outside_symlink_is_rejected() {
        let (temp, root) = sandbox();
        fs::write(temp.path().join("secret.txt"), "TOPSECRET").unwrap();
        std::os::unix::fs::symlink("../secret.txt", root.path().join("link")).unwrap();

        let res = resolve_and_check(&root, "nope/../link");
        assert!(!res.contained);
        assert_eq!(res.path, temp.path().canonicalize().unwrap().join("secret.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_then_parent_into_outside_symlink_is_rejected() {
        let (temp, root) = sandbox();
        fs::write(temp.path().join("secret.txt"), "TOPSECRET").unwrap();
        fs::write(root.path().join("file.txt"), "x").unwrap();
        std::os::unix::fs::symlink("../secret.txt", root.path().join("link")).unwrap();

        assert!(!resolve_and_check(&root, "file.txt/../link").contained);
        assert!(!resolve_and_check(&root, "a/b/../../link").contained);
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_dir_then_parent_into_inside_symlink_is_contained() {
        let (_temp, root) = sandbox();
        fs::write(root.path().join("real.txt"), "data").unwrap();
        std::os::unix::fs::symlink("real.txt", root.path().join("alias")).unwrap();

        let res = resolve_and_check(&root, "nope/../alias");
        assert!(res.contained);
        assert_eq!(res.path, root.path().join("real.txt"));
    }

    #[test]
    fn test_sandbox_root_rejects_file() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("f.txt");
        fs::write(&file, "x").unwrap();

        let err = SandboxRoot::new(&file).unwrap_err();
        assert!(matches!(err, ToolError::InvalidSandbox { .. }));
    }

    #[test]
    fn test_sandbox_root_rejects_missing() {
        let temp = tempdir().unwrap();
        assert!(SandboxRoot::new(temp.path().join("missing")).is_err());
    }

    fn segment() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just("a"), Just("b"), Just(".."), Just(".")]
    }

    proptest! {
        // With no symlinks present, a path escapes iff some prefix climbs above the root
        #[test]
        fn prop_containment_matches_depth_walk(segments in proptest::collection::vec(segment(), 1..8)) {
            let (_temp, root) = sandbox();
            fs::create_dir_all(root.path().join("a/b")).unwrap();

            let mut depth: i32 = 0;
            let mut escaped = false;
            for s in &segments {
                match *s {
                    ".." => depth -= 1,
                    "." => {}
                    _ => depth += 1,
                }
                if depth < 0 {
                    escaped = true;
                }
            }

            let relative = segments.join("/");
            let res = resolve_and_check(&root, &relative);
            prop_assert_eq!(res.contained, !escaped, "path {}", relative);
        }
    }
}
