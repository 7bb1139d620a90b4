// ABOUTME: Repository path and subpath helpers shared by topology, resolver and backends
//
// Repository paths are absolute, '/'-separated and normalized (no empty or "."
// components, no trailing slash). Subpaths are relative, '/'-separated and the
// empty string means "the whole tree".

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Absolute path inside the repository, e.g. `/proj/branches/user/ws`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RepoPath(String);

impl RepoPath {
    /// The repository root (`/`)
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Build a normalized repository path from any '/'-separated string
    pub fn new(raw: &str) -> Self {
        let joined = components(raw).collect::<Vec<_>>().join("/");
        Self(format!("/{joined}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Append a relative subpath; an empty subpath returns a clone
    pub fn join(&self, relative: &str) -> Self {
        let tail = normalize_subpath(relative);
        if tail.is_empty() {
            self.clone()
        } else if self.is_root() {
            Self(format!("/{tail}"))
        } else {
            Self(format!("{}/{tail}", self.0))
        }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let idx = self.0.rfind('/').unwrap_or(0);
        if idx == 0 {
            Some(Self::root())
        } else {
            Some(Self(self.0[..idx].to_string()))
        }
    }

    /// Last component, or `None` for the root
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            None
        } else {
            self.0.rsplit('/').next()
        }
    }

    /// Component-wise prefix test (`/a/bc` does not start with `/a/b`)
    pub fn starts_with(&self, base: &Self) -> bool {
        self.strip_prefix(base).is_some()
    }

    /// Relative subpath of `self` below `base`; `Some("")` when equal
    pub fn strip_prefix(&self, base: &Self) -> Option<String> {
        if base.is_root() {
            return Some(self.0.trim_start_matches('/').to_string());
        }
        if self.0 == base.0 {
            return Some(String::new());
        }
        self.0
            .strip_prefix(&base.0)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(str::to_string)
    }

    /// This path and all of its ancestors, nearest first, ending at the root
    pub fn ancestors(&self) -> Vec<Self> {
        let mut out = vec![self.clone()];
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            out.push(parent.clone());
            current = parent;
        }
        out
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RepoPath {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<RepoPath> for String {
    fn from(path: RepoPath) -> Self {
        path.0
    }
}

fn components(raw: &str) -> impl Iterator<Item = &str> {
    raw.split('/').filter(|c| !c.is_empty() && *c != ".")
}

/// Normalize a relative subpath (`"a//b/"` -> `"a/b"`, `"/"` -> `""`)
pub fn normalize_subpath(raw: &str) -> String {
    components(raw).collect::<Vec<_>>().join("/")
}

/// Join two relative subpaths, either of which may be empty
pub fn join_subpath(base: &str, tail: &str) -> String {
    let base = normalize_subpath(base);
    let tail = normalize_subpath(tail);
    match (base.is_empty(), tail.is_empty()) {
        (true, _) => tail,
        (_, true) => base,
        _ => format!("{base}/{tail}"),
    }
}

/// If `prefix` is a component-wise prefix of `path`, the remainder (`""` when equal)
pub fn strip_subpath_prefix(path: &str, prefix: &str) -> Option<String> {
    let path = normalize_subpath(path);
    let prefix = normalize_subpath(prefix);
    if prefix.is_empty() {
        return Some(path);
    }
    if path == prefix {
        return Some(String::new());
    }
    path.strip_prefix(&prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .map(str::to_string)
}

/// Longest common component prefix of two subpaths
pub fn longest_common_prefix(a: &str, b: &str) -> String {
    components(a)
        .zip(components(b))
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x)
        .collect::<Vec<_>>()
        .join("/")
}

/// Append a '/'-separated subpath to a local directory
pub fn local_join(base: &Path, relative: &str) -> PathBuf {
    components(relative).fold(base.to_path_buf(), |acc, c| acc.join(c))
}

/// Relative subpath of a local path below `base`, '/'-separated
pub fn local_relative(path: &Path, base: &Path) -> Option<String> {
    let rest = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = rest
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}
