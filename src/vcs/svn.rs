// ABOUTME: Subversion backend - drives the svn and svnmucc command-line clients
//
// Repository paths are escaped segment by segment onto the repository root
// URL. Every svn target carries an explicit peg (`@` or `@REV`) so names
// containing '@' stay literal. Merge conflicts are postponed so they surface
// in the returned outcome.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::{debug, info, warn};
use url::Url;

use super::parse;
use super::{
    Backend, CommitOp, ConflictKind, MergeOutcome, NodeKind, Resolution, StatusEntry, VcsError,
    WcInfo,
};
use crate::config::BackendConfig;
use crate::models::{Properties, RepoPath, Revision};

/// svn error codes meaning "no such node" rather than a real failure
const NOT_FOUND_CODES: &[&str] = &["E170000", "W170000", "E160013", "E200009"];
/// svn error codes meaning "not a working copy"
const NOT_WC_CODES: &[&str] = &["E155007", "W155007", "W155010", "E155010"];

pub struct SvnBackend {
    repository_root: Url,
    svn: String,
    svnmucc: String,
    username: Option<String>,
    non_interactive: bool,
}

impl SvnBackend {
    /// Backend for an explicit repository root URL (e.g. `https://svn.example.com/repo`)
    pub fn new(repository_root: impl Into<String>, config: &BackendConfig) -> Result<Self, VcsError> {
        for tool in [&config.svn, &config.svnmucc] {
            if which::which(tool).is_err() {
                return Err(VcsError::ToolMissing(tool.clone()));
            }
        }
        Self::with_root(&repository_root.into(), config)
    }

    fn with_root(repository_root: &str, config: &BackendConfig) -> Result<Self, VcsError> {
        let repository_root = Url::parse(repository_root.trim_end_matches('/'))?;
        if repository_root.cannot_be_a_base() {
            return Err(VcsError::Invalid(format!(
                "{repository_root} cannot hold repository paths"
            )));
        }
        Ok(Self {
            repository_root,
            svn: config.svn.clone(),
            svnmucc: config.svnmucc.clone(),
            username: config.username.clone(),
            non_interactive: config.non_interactive,
        })
    }

    /// Discover the repository root from a working copy directory
    pub fn discover(working_dir: &Path, config: &BackendConfig) -> Result<Self, VcsError> {
        if which::which(&config.svn).is_err() {
            return Err(VcsError::ToolMissing(config.svn.clone()));
        }
        let output = Command::new(&config.svn)
            .args(["info", "--non-interactive", "--show-item", "repos-root-url"])
            .arg(Self::local(working_dir))
            .output()?;
        if !output.status.success() {
            return Err(VcsError::NotWorkingCopy(working_dir.to_path_buf()));
        }
        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!("Discovered repository root {} from {}", root, working_dir.display());
        Self::new(root, config)
    }

    /// Escaped URL of `path`, without a peg revision (svnmucc form)
    fn url(&self, path: &RepoPath) -> Result<String, VcsError> {
        let mut url = self.repository_root.clone();
        url.path_segments_mut()
            .map_err(|()| {
                VcsError::Invalid(format!("{} cannot hold repository paths", self.repository_root))
            })?
            .pop_if_empty()
            .extend(path.as_str().split('/').filter(|c| !c.is_empty()));
        // '@' is legal in a path segment but svn reads it as a peg separator
        let escaped = url.path().replace('@', "%40");
        url.set_path(&escaped);
        Ok(url.into())
    }

    /// URL target for svn with an explicit peg revision
    fn target(&self, path: &RepoPath, revision: Option<Revision>) -> Result<String, VcsError> {
        let url = self.url(path)?;
        Ok(match revision {
            Some(rev) => format!("{url}@{rev}"),
            None => format!("{url}@"),
        })
    }

    fn svn_command(&self) -> Command {
        let mut cmd = Command::new(&self.svn);
        cmd.env("LC_ALL", "C");
        if self.non_interactive {
            cmd.arg("--non-interactive");
        }
        if let Some(user) = &self.username {
            cmd.args(["--username", user]);
        }
        cmd
    }

    fn run(&self, args: &[&str]) -> Result<String, VcsError> {
        let output = self.run_raw(args)?;
        if !output.status.success() {
            return Err(command_failed(&self.svn, args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn run_raw(&self, args: &[&str]) -> Result<Output, VcsError> {
        debug!("Running {} {}", self.svn, args.join(" "));
        let output = self.svn_command().args(args).output()?;
        Ok(output)
    }

    /// Like `run`, but a "no such node" failure becomes `Ok(None)`
    fn run_optional(&self, args: &[&str], missing: &[&str]) -> Result<Option<String>, VcsError> {
        let output = self.run_raw(args)?;
        if output.status.success() {
            return Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()));
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if missing.iter().any(|code| stderr.contains(code)) {
            return Ok(None);
        }
        Err(command_failed(&self.svn, args, &output))
    }

    /// Working-copy target with an empty peg
    fn local(path: &Path) -> String {
        format!("{}@", path.display())
    }

    /// Fill in property names for property conflicts from the .prej reject file
    fn conflicted_property_names(&self, local: &Path) -> Vec<String> {
        let target = Self::local(local);
        let Ok(info) = self.run(&["info", &target]) else {
            return Vec::new();
        };
        let info = parse::parse_info(&info);
        let Some(prej) = info.get("Conflict Properties File") else {
            return Vec::new();
        };
        let prej_path = if Path::new(prej).is_absolute() {
            PathBuf::from(prej)
        } else {
            local.parent().unwrap_or(Path::new(".")).join(prej)
        };
        match std::fs::read_to_string(&prej_path) {
            Ok(contents) => parse::parse_prej(&contents),
            Err(e) => {
                warn!("Could not read {}: {}", prej_path.display(), e);
                Vec::new()
            }
        }
    }
}

fn command_failed(tool: &str, args: &[&str], output: &Output) -> VcsError {
    VcsError::CommandFailed {
        command: format!("{} {}", tool, args.join(" ")),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

impl Backend for SvnBackend {
    fn check_path(&self, path: &RepoPath, revision: Option<Revision>) -> Result<NodeKind, VcsError> {
        let url = self.target(path, revision)?;
        let kind = self.run_optional(&["info", "--show-item", "kind", &url], NOT_FOUND_CODES)?;
        Ok(kind.map_or(NodeKind::None, |k| parse::node_kind(k.trim())))
    }

    fn latest_revision(&self) -> Result<Revision, VcsError> {
        let url = self.target(&RepoPath::root(), None)?;
        let out = self.run(&["info", "--show-item", "revision", &url])?;
        parse::parse_revision(&out)
    }

    fn last_changed_revision(
        &self,
        path: &RepoPath,
        revision: Option<Revision>,
    ) -> Result<Revision, VcsError> {
        let url = self.target(path, revision)?;
        let out = self
            .run_optional(
                &["info", "--show-item", "last-changed-revision", &url],
                NOT_FOUND_CODES,
            )?
            .ok_or_else(|| VcsError::PathNotFound(path.to_string()))?;
        parse::parse_revision(&out)
    }

    fn get_properties(
        &self,
        path: &RepoPath,
        revision: Option<Revision>,
    ) -> Result<Properties, VcsError> {
        let url = self.target(path, revision)?;
        let out = self
            .run_optional(&["proplist", "-v", &url], NOT_FOUND_CODES)?
            .ok_or_else(|| VcsError::PathNotFound(path.to_string()))?;
        Ok(parse::parse_proplist(&out))
    }

    fn list(&self, path: &RepoPath) -> Result<Vec<(String, NodeKind)>, VcsError> {
        let url = self.target(path, None)?;
        let out = self
            .run_optional(&["list", &url], NOT_FOUND_CODES)?
            .ok_or_else(|| VcsError::PathNotFound(path.to_string()))?;
        Ok(parse::parse_list(&out))
    }

    fn commit_ops(&self, ops: &[CommitOp], message: &str) -> Result<Revision, VcsError> {
        let mut args: Vec<String> = Vec::new();
        if self.non_interactive {
            args.push("--non-interactive".to_string());
        }
        args.extend([
            "-m".to_string(),
            message.to_string(),
            "-U".to_string(),
            self.repository_root.as_str().trim_end_matches('/').to_string(),
        ]);
        if let Some(user) = &self.username {
            args.extend(["--username".to_string(), user.clone()]);
        }
        let mut stdin_contents: Option<String> = None;

        for op in ops {
            match op {
                CommitOp::MakeDir(path) => {
                    args.extend(["mkdir".to_string(), self.url(path)?]);
                }
                CommitOp::Copy { from, revision, to } => {
                    args.extend([
                        "cp".to_string(),
                        revision.to_string(),
                        self.url(from)?,
                        self.url(to)?,
                    ]);
                }
                CommitOp::PutFile { path, contents } => {
                    if stdin_contents.is_some() {
                        return Err(VcsError::Invalid(
                            "svnmucc can stream only one file per commit".to_string(),
                        ));
                    }
                    stdin_contents = Some(contents.clone());
                    args.extend(["put".to_string(), "-".to_string(), self.url(path)?]);
                }
                CommitOp::SetProperty { path, name, value } => {
                    args.extend([
                        "propset".to_string(),
                        name.clone(),
                        value.clone(),
                        self.url(path)?,
                    ]);
                }
            }
        }

        debug!("Running {} with {} operations", self.svnmucc, ops.len());
        let mut cmd = Command::new(&self.svnmucc);
        cmd.env("LC_ALL", "C")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = cmd.spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(stdin_contents.unwrap_or_default().as_bytes())?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
            return Err(command_failed(&self.svnmucc, &arg_refs, &output));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let revision = parse::parse_committed_revision(&stdout)
            .ok_or_else(|| VcsError::UnexpectedOutput(stdout.to_string()))?;
        info!("svnmucc committed r{}", revision);
        Ok(revision)
    }

    fn wc_info(&self, local: &Path) -> Result<Option<WcInfo>, VcsError> {
        let target = Self::local(local);
        let mut missing: Vec<&str> = NOT_WC_CODES.to_vec();
        missing.extend(NOT_FOUND_CODES);
        let Some(out) = self.run_optional(&["info", &target], &missing)? else {
            return Ok(None);
        };
        let info = parse::parse_info(&out);
        // Scheduled additions have no revision yet
        let revision = info
            .get("Revision")
            .map(|r| parse::parse_revision(r))
            .transpose()?
            .unwrap_or(0);
        let repo_path = info
            .get("Relative URL")
            .map(|u| parse::relative_url_to_path(u))
            .ok_or_else(|| VcsError::UnexpectedOutput(format!("no URL for {target}")))?;
        Ok(Some(WcInfo {
            path: local.to_path_buf(),
            repo_path,
            revision,
            kind: info
                .get("Node Kind")
                .map_or(NodeKind::None, |k| parse::node_kind(k)),
        }))
    }

    fn wc_properties(&self, local: &Path) -> Result<Option<Properties>, VcsError> {
        let target = Self::local(local);
        let mut missing: Vec<&str> = NOT_WC_CODES.to_vec();
        missing.extend(NOT_FOUND_CODES);
        Ok(self
            .run_optional(&["proplist", "-v", &target], &missing)?
            .map(|out| parse::parse_proplist(&out)))
    }

    fn set_wc_property(&self, local: &Path, name: &str, value: &str) -> Result<(), VcsError> {
        let target = Self::local(local);
        self.run(&["propset", name, value, &target])?;
        Ok(())
    }

    fn switch(
        &self,
        local: &Path,
        target: &RepoPath,
        revision: Option<Revision>,
    ) -> Result<Revision, VcsError> {
        let url = self.target(target, revision)?;
        let dir = Self::local(local);
        info!("Switching {} to {}", dir, url);
        let out = self.run(&["switch", "--accept", "postpone", &url, &dir])?;
        parse::parse_updated_revision(&out)
            .ok_or_else(|| VcsError::UnexpectedOutput(out.clone()))
    }

    fn update(&self, local: &Path) -> Result<Revision, VcsError> {
        let dir = Self::local(local);
        let out = self.run(&["update", "--accept", "postpone", &dir])?;
        parse::parse_updated_revision(&out)
            .ok_or_else(|| VcsError::UnexpectedOutput(out.clone()))
    }

    fn merge(
        &self,
        left: &RepoPath,
        left_rev: Revision,
        right: &RepoPath,
        right_rev: Revision,
        local: &Path,
    ) -> Result<MergeOutcome, VcsError> {
        let dir = Self::local(local);
        let out = if left == right {
            let url = self.target(right, Some(right_rev))?;
            let range = format!("{left_rev}:{right_rev}");
            info!("Merging {} -r {} into {}", url, range, dir);
            self.run(&["merge", "--accept", "postpone", "-r", &range, &url, &dir])?
        } else {
            let from = self.target(left, Some(left_rev))?;
            let to = self.target(right, Some(right_rev))?;
            info!("Merging {} -> {} into {}", from, to, dir);
            self.run(&["merge", "--accept", "postpone", &from, &to, &dir])?
        };
        let mut outcome = parse::parse_merge(&out);
        for conflict in &mut outcome.conflicts {
            if let ConflictKind::Property(names) = &mut conflict.kind {
                *names = self.conflicted_property_names(&conflict.path);
            }
        }
        Ok(outcome)
    }

    fn status(&self, local: &Path) -> Result<Vec<StatusEntry>, VcsError> {
        let dir = Self::local(local);
        let out = self.run(&["status", "--ignore-externals", &dir])?;
        Ok(parse::parse_status(&out))
    }

    fn resolve(&self, local: &Path, resolution: Resolution) -> Result<(), VcsError> {
        let accept = match resolution {
            Resolution::Working => "working",
            Resolution::Incoming => "theirs-full",
        };
        let target = Self::local(local);
        self.run(&["resolve", "--accept", accept, &target])?;
        Ok(())
    }

    fn commit(&self, paths: &[PathBuf], message: &str) -> Result<Option<Revision>, VcsError> {
        let targets: Vec<String> = paths.iter().map(|p| Self::local(p)).collect();
        let mut args = vec!["commit", "-m", message];
        args.extend(targets.iter().map(String::as_str));
        let out = self.run(&args)?;
        let revision = parse::parse_committed_revision(&out);
        match revision {
            Some(rev) => info!("Committed r{}", rev),
            None => info!("Nothing to commit under {:?}", targets),
        }
        Ok(revision)
    }

    fn delete(&self, paths: &[RepoPath], message: &str) -> Result<Revision, VcsError> {
        let urls = paths
            .iter()
            .map(|p| self.target(p, None))
            .collect::<Result<Vec<_>, _>>()?;
        let mut args = vec!["delete", "-m", message];
        args.extend(urls.iter().map(String::as_str));
        let out = self.run(&args)?;
        parse::parse_committed_revision(&out).ok_or(VcsError::UnexpectedOutput(out))
    }

    fn revert(&self, local: &Path, remove_added: bool) -> Result<(), VcsError> {
        let target = Self::local(local);
        let mut args = vec!["revert"];
        if remove_added {
            args.push("--remove-added");
        }
        args.push(&target);
        // Reverting a path that is not versioned is a no-op
        let mut missing: Vec<&str> = NOT_WC_CODES.to_vec();
        missing.extend(NOT_FOUND_CODES);
        self.run_optional(&args, &missing)?;
        Ok(())
    }
}
