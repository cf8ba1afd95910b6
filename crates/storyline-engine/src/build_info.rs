//! Facts about the build under test: package version, commit, CI provider.
//!
//! Everything here reads through a lookup function so tests can supply their
//! own environment.

use std::path::{Path, PathBuf};

/// Variables checked, in order, for the commit SHA before falling back to `.git`.
pub const SHA_VARS: [&str; 3] = ["GITHUB_SHA", "CI_COMMIT_SHA", "GIT_COMMIT"];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildInfo {
    pub package_version: Option<String>,
    pub git_sha: Option<String>,
    pub ci: Option<String>,
}

impl BuildInfo {
    /// Read from the process environment and the repository at or above `root`.
    pub fn detect(root: &Path, package_version: Option<String>) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), root, package_version)
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        root: &Path,
        package_version: Option<String>,
    ) -> Self {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            package_version: package_version.or_else(|| lookup("CARGO_PKG_VERSION")),
            git_sha: SHA_VARS
                .into_iter()
                .find_map(&lookup)
                .or_else(|| read_git_sha(root)),
            ci: detect_ci(&lookup),
        }
    }
}

/// Name of the CI provider, if any.
///
/// Specific providers are checked before the generic `CI=true`.
pub fn detect_ci(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    let is_true = |key: &str| lookup(key).is_some_and(|v| v == "true");
    let name = if is_true("GITHUB_ACTIONS") {
        "github"
    } else if is_true("CIRCLECI") {
        "circleci"
    } else if lookup("JENKINS_URL").is_some() {
        "jenkins"
    } else if is_true("TRAVIS") {
        "travis"
    } else if is_true("GITLAB_CI") {
        "gitlab"
    } else if is_true("CI") {
        "ci"
    } else {
        return None;
    };
    Some(name.to_string())
}

/// Resolve `HEAD` of the repository containing `start`.
pub fn read_git_sha(start: &Path) -> Option<String> {
    let git_dir = find_git_dir(start)?;
    let head = std::fs::read_to_string(git_dir.join("HEAD")).ok()?;
    let head = head.trim();

    let Some(reference) = head.strip_prefix("ref:").map(str::trim) else {
        return Some(head.to_string()).filter(|s| !s.is_empty());
    };

    if let Ok(sha) = std::fs::read_to_string(git_dir.join(reference)) {
        return Some(sha.trim().to_string());
    }

    let packed = std::fs::read_to_string(git_dir.join("packed-refs")).ok()?;
    packed
        .lines()
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('^'))
        .find_map(|l| {
            let (sha, name) = l.split_once(' ')?;
            (name == reference).then(|| sha.to_string())
        })
}

/// Nearest `.git` at or above `start`. A `.git` file (worktree) is followed.
///
/// A relative `start` is resolved against the current directory.
pub fn find_git_dir(start: &Path) -> Option<PathBuf> {
    find_git_dir_from(&std::env::current_dir().unwrap_or_default(), start)
}

/// [`find_git_dir`] with a relative `start` resolved against `base`.
///
/// The path is canonicalized first: the lexical ancestors of `.` or `..`
/// never reach the repository root.
pub fn find_git_dir_from(base: &Path, start: &Path) -> Option<PathBuf> {
    let start = std::fs::canonicalize(base.join(start)).ok()?;
    start.ancestors().find_map(|dir| {
        let candidate = dir.join(".git");
        if candidate.is_dir() {
            return Some(candidate);
        }
        let content = std::fs::read_to_string(&candidate).ok()?;
        let target = content.trim().strip_prefix("gitdir:")?.trim();
        Some(dir.join(target))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn repo_with_head(head: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git/refs/heads")).unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), head).unwrap();
        dir
    }

    #[test]
    fn ci_providers_in_precedence_order() {
        assert_eq!(detect_ci(env(&[])), None);
        assert_eq!(detect_ci(env(&[("CI", "true")])).as_deref(), Some("ci"));
        assert_eq!(
            detect_ci(env(&[("CI", "true"), ("GITLAB_CI", "true")])).as_deref(),
            Some("gitlab")
        );
        assert_eq!(
            detect_ci(env(&[("GITLAB_CI", "true"), ("GITHUB_ACTIONS", "true")])).as_deref(),
            Some("github")
        );
        assert_eq!(detect_ci(env(&[("JENKINS_URL", "")])).as_deref(), Some("jenkins"));
        assert_eq!(detect_ci(env(&[("CI", "false")])), None);
    }

    #[test]
    fn sha_from_environment_wins() {
        let repo = repo_with_head("0123456789abcdef0123456789abcdef01234567\n");
        let info = BuildInfo::from_lookup(
            env(&[("CI_COMMIT_SHA", "cafe"), ("GIT_COMMIT", "beef")]),
            repo.path(),
            None,
        );
        assert_eq!(info.git_sha.as_deref(), Some("cafe"));
    }

    #[test]
    fn empty_sha_variable_is_ignored() {
        let repo = repo_with_head("0123456789abcdef0123456789abcdef01234567\n");
        let info = BuildInfo::from_lookup(env(&[("GITHUB_SHA", " ")]), repo.path(), None);
        assert_eq!(
            info.git_sha.as_deref(),
            Some("0123456789abcdef0123456789abcdef01234567")
        );
    }

    #[test]
    fn detached_head() {
        let repo = repo_with_head("abc123\n");
        let nested = repo.path().join("crates/app");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(read_git_sha(&nested).as_deref(), Some("abc123"));
    }

    #[test]
    fn relative_start_walks_up_from_its_base() {
        let repo = repo_with_head("ref: refs/heads/main\n");
        std::fs::write(repo.path().join(".git/refs/heads/main"), "c0ffee\n").unwrap();
        let member = repo.path().join("crates/app");
        std::fs::create_dir_all(&member).unwrap();

        let expected = std::fs::canonicalize(repo.path().join(".git")).unwrap();
        assert_eq!(find_git_dir_from(&member, Path::new(".")), Some(expected.clone()));
        assert_eq!(find_git_dir_from(&member, Path::new("..")), Some(expected));
    }

    #[test]
    fn symbolic_ref_resolves_loose_then_packed() {
        let repo = repo_with_head("ref: refs/heads/main\n");
        std::fs::write(
            repo.path().join(".git/packed-refs"),
            "# pack-refs with: peeled\nfeedface refs/heads/main\n^deadbeef\n",
        )
        .unwrap();
        assert_eq!(read_git_sha(repo.path()).as_deref(), Some("feedface"));

        std::fs::write(repo.path().join(".git/refs/heads/main"), "c0ffee\n").unwrap();
        assert_eq!(read_git_sha(repo.path()).as_deref(), Some("c0ffee"));
    }

    #[test]
    fn worktree_git_file_is_followed() {
        let main = repo_with_head("ref: refs/heads/main\n");
        std::fs::write(main.path().join(".git/refs/heads/main"), "aa11\n").unwrap();
        let worktree = tempfile::tempdir().unwrap();
        std::fs::write(
            worktree.path().join(".git"),
            format!("gitdir: {}\n", main.path().join(".git").display()),
        )
        .unwrap();
        assert_eq!(read_git_sha(worktree.path()).as_deref(), Some("aa11"));
    }

    #[test]
    fn configured_version_beats_cargo() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = env(&[("CARGO_PKG_VERSION", "1.2.3")]);
        assert_eq!(
            BuildInfo::from_lookup(&lookup, dir.path(), None).package_version.as_deref(),
            Some("1.2.3")
        );
        assert_eq!(
            BuildInfo::from_lookup(&lookup, dir.path(), Some("9.9.9".into()))
                .package_version
                .as_deref(),
            Some("9.9.9")
        );
    }
}
