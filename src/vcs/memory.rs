// ABOUTME: In-process backend - a revisioned tree with copy history and working copies
//
// Mirrors the Subversion semantics the lifecycle relies on: atomic multi-op
// commits, copies that remember their origin, mixed-revision working copies,
// switch that carries local edits, a three-way merge over a revision range,
// and svn-style status. Used by the test suite and for dry runs.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{
    Backend, CommitOp, Conflict, ConflictKind, EntryState, MergeOutcome, NodeKind, Resolution,
    StatusEntry, VcsError, WcInfo,
};
use crate::models::path::{local_join, local_relative};
use crate::models::{Properties, RepoPath, Revision};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    kind: NodeKind,
    content: String,
    props: Properties,
    /// Set on the root node of a copy
    copied_from: Option<(RepoPath, Revision)>,
    /// Revision that started this node's line of history; copies keep it, a
    /// replacement starts a new one. 0 until committed.
    born: Revision,
}

impl Node {
    fn dir() -> Self {
        Self {
            kind: NodeKind::Directory,
            content: String::new(),
            props: Properties::new(),
            copied_from: None,
            born: 0,
        }
    }

    fn file(contents: &str) -> Self {
        Self {
            kind: NodeKind::File,
            content: contents.to_string(),
            props: Properties::new(),
            copied_from: None,
            born: 0,
        }
    }

    fn born_in(mut self, revision: Revision) -> Self {
        self.born = revision;
        self
    }

    fn same_state(&self, other: &Self) -> bool {
        self.kind == other.kind && self.content == other.content && self.props == other.props
    }
}

type Tree = BTreeMap<RepoPath, Node>;

#[derive(Debug, Clone)]
struct CommitRecord {
    tree: Tree,
    changed: BTreeSet<RepoPath>,
    message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Schedule {
    Normal,
    Added,
    Deleted,
    Replaced,
}

#[derive(Debug, Clone)]
struct WcEntry {
    repo_path: RepoPath,
    revision: Revision,
    kind: NodeKind,
    base_content: String,
    base_props: Properties,
    content: String,
    props: Properties,
    schedule: Schedule,
    conflicted: bool,
    /// Incoming side of a conflict, for `Resolution::Incoming`
    theirs: Option<(String, Properties)>,
    missing: bool,
    born: Revision,
}

impl WcEntry {
    fn from_node(repo_path: RepoPath, revision: Revision, node: &Node) -> Self {
        Self {
            repo_path,
            revision,
            kind: node.kind,
            base_content: node.content.clone(),
            base_props: node.props.clone(),
            content: node.content.clone(),
            props: node.props.clone(),
            schedule: Schedule::Normal,
            conflicted: false,
            theirs: None,
            missing: false,
            born: node.born,
        }
    }

    fn added(repo_path: RepoPath, node: &Node) -> Self {
        Self {
            base_content: String::new(),
            base_props: Properties::new(),
            schedule: Schedule::Added,
            revision: 0,
            ..Self::from_node(repo_path, 0, node)
        }
    }

    fn is_modified(&self) -> bool {
        self.content != self.base_content || self.props != self.base_props
    }

    fn is_changed(&self) -> bool {
        self.schedule != Schedule::Normal || self.is_modified()
    }

    fn as_node(&self) -> Node {
        Node {
            kind: self.kind,
            content: self.content.clone(),
            props: self.props.clone(),
            copied_from: None,
            born: self.born,
        }
    }
}

#[derive(Debug)]
struct State {
    commits: Vec<CommitRecord>,
    entries: BTreeMap<PathBuf, WcEntry>,
}

pub struct MemoryBackend {
    state: RefCell<State>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Empty repository at revision 0 (root directory only)
    pub fn new() -> Self {
        let mut tree = Tree::new();
        tree.insert(RepoPath::root(), Node::dir());
        Self {
            state: RefCell::new(State {
                commits: vec![CommitRecord {
                    tree,
                    changed: BTreeSet::new(),
                    message: String::new(),
                }],
                entries: BTreeMap::new(),
            }),
        }
    }

    /// Check out `repo_path` at HEAD into the (virtual) directory `local`
    pub fn checkout(&self, repo_path: &RepoPath, local: &Path) -> Result<Revision, VcsError> {
        let mut state = self.state.borrow_mut();
        let head = state.head();
        let nodes = subtree(state.tree(head), repo_path);
        if nodes.is_empty() {
            return Err(VcsError::PathNotFound(repo_path.to_string()));
        }
        state.entries.retain(|p, _| !p.starts_with(local));
        for (rel, node) in nodes {
            state.entries.insert(
                local_join(local, &rel),
                WcEntry::from_node(repo_path.join(&rel), head, &node),
            );
        }
        debug!("Checked out {}@{} into {}", repo_path, head, local.display());
        Ok(head)
    }

    /// Edit a versioned file, or schedule a new file for addition
    pub fn write_file(&self, local: &Path, contents: &str) -> Result<(), VcsError> {
        let mut state = self.state.borrow_mut();
        if let Some(entry) = state.entries.get_mut(local) {
            if entry.kind != NodeKind::File {
                return Err(VcsError::Invalid(format!("{} is a directory", local.display())));
            }
            entry.content = contents.to_string();
            if entry.schedule == Schedule::Deleted {
                entry.schedule = Schedule::Replaced;
                entry.born = 0;
            }
            entry.missing = false;
            return Ok(());
        }
        let repo_path = state.child_repo_path(local)?;
        state
            .entries
            .insert(local.to_path_buf(), WcEntry::added(repo_path, &Node::file(contents)));
        Ok(())
    }

    /// Schedule a new directory for addition
    pub fn make_dir(&self, local: &Path) -> Result<(), VcsError> {
        let mut state = self.state.borrow_mut();
        if state.entries.contains_key(local) {
            return Err(VcsError::Invalid(format!("{} already exists", local.display())));
        }
        let repo_path = state.child_repo_path(local)?;
        state
            .entries
            .insert(local.to_path_buf(), WcEntry::added(repo_path, &Node::dir()));
        Ok(())
    }

    /// Schedule a versioned path for deletion (`svn delete`)
    pub fn remove(&self, local: &Path) -> Result<(), VcsError> {
        let mut state = self.state.borrow_mut();
        let entry = state
            .entries
            .get_mut(local)
            .ok_or_else(|| VcsError::NotWorkingCopy(local.to_path_buf()))?;
        entry.schedule = Schedule::Deleted;
        Ok(())
    }

    /// Simulate a file removed from disk without telling the VCS
    pub fn lose(&self, local: &Path) -> Result<(), VcsError> {
        let mut state = self.state.borrow_mut();
        let entry = state
            .entries
            .get_mut(local)
            .ok_or_else(|| VcsError::NotWorkingCopy(local.to_path_buf()))?;
        entry.missing = true;
        Ok(())
    }

    /// Delete-and-re-add a file in one step (status `R`)
    pub fn replace_file(&self, local: &Path, contents: &str) -> Result<(), VcsError> {
        let mut state = self.state.borrow_mut();
        let entry = state
            .entries
            .get_mut(local)
            .ok_or_else(|| VcsError::NotWorkingCopy(local.to_path_buf()))?;
        entry.schedule = Schedule::Replaced;
        entry.content = contents.to_string();
        entry.born = 0;
        Ok(())
    }

    /// Working content of a local file (`None` when unversioned or deleted)
    pub fn read_file(&self, local: &Path) -> Option<String> {
        let state = self.state.borrow();
        state
            .entries
            .get(local)
            .filter(|e| e.schedule != Schedule::Deleted && !e.missing)
            .map(|e| e.content.clone())
    }

    /// Content of a repository file at a revision (HEAD when `None`)
    pub fn file_at(&self, path: &RepoPath, revision: Option<Revision>) -> Option<String> {
        let state = self.state.borrow();
        let rev = revision.unwrap_or_else(|| state.head());
        state
            .commits
            .get(usize::try_from(rev).ok()?)
            .and_then(|c| c.tree.get(path))
            .filter(|n| n.kind == NodeKind::File)
            .map(|n| n.content.clone())
    }

    pub fn log_message(&self, revision: Revision) -> Option<String> {
        let state = self.state.borrow();
        let idx = usize::try_from(revision).ok()?;
        state.commits.get(idx).map(|c| c.message.clone())
    }

    /// Commit a file straight to the repository, as another developer would
    pub fn server_put(
        &self,
        path: &RepoPath,
        contents: &str,
        message: &str,
    ) -> Result<Revision, VcsError> {
        self.commit_ops(
            &[CommitOp::PutFile {
                path: path.clone(),
                contents: contents.to_string(),
            }],
            message,
        )
    }
}

impl State {
    fn head(&self) -> Revision {
        (self.commits.len() - 1) as Revision
    }

    fn tree(&self, revision: Revision) -> &Tree {
        let idx = usize::try_from(revision).unwrap_or(usize::MAX);
        self.commits.get(idx).map_or_else(
            || &self.commits[self.commits.len() - 1].tree,
            |c| &c.tree,
        )
    }

    fn check_revision(&self, revision: Option<Revision>) -> Result<Revision, VcsError> {
        let head = self.head();
        match revision {
            None => Ok(head),
            Some(rev) if rev <= head => Ok(rev),
            Some(rev) => Err(VcsError::Invalid(format!("No such revision {rev}"))),
        }
    }

    fn child_repo_path(&self, local: &Path) -> Result<RepoPath, VcsError> {
        let parent = local
            .parent()
            .and_then(|p| self.entries.get(p))
            .filter(|e| e.kind == NodeKind::Directory)
            .ok_or_else(|| VcsError::NotWorkingCopy(local.to_path_buf()))?;
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| VcsError::Invalid(format!("bad path {}", local.display())))?;
        Ok(parent.repo_path.join(&name))
    }

    fn last_changed(&self, path: &RepoPath, revision: Revision) -> Revision {
        (1..=revision)
            .rev()
            .find(|r| {
                self.commits[*r as usize]
                    .changed
                    .iter()
                    .any(|p| p.starts_with(path))
            })
            .unwrap_or(0)
    }

    /// Nodes under `path` at `revision`, following copy history backwards when
    /// `path` did not exist yet (`via` is the revision whose copy record is used)
    fn history_subtree(&self, path: &RepoPath, revision: Revision, via: Revision) -> BTreeMap<String, Node> {
        let nodes = subtree(self.tree(revision), path);
        if !nodes.is_empty() {
            return nodes;
        }
        for ancestor in path.ancestors() {
            let Some(node) = self.tree(via).get(&ancestor) else {
                continue;
            };
            if let Some((origin, origin_rev)) = &node.copied_from {
                let rel = path.strip_prefix(&ancestor).unwrap_or_default();
                let mapped = origin.join(&rel);
                let rev = revision.min(*origin_rev);
                return self.history_subtree(&mapped, rev, *origin_rev);
            }
        }
        BTreeMap::new()
    }

    fn push_commit(&mut self, tree: Tree, changed: BTreeSet<RepoPath>, message: &str) -> Revision {
        self.commits.push(CommitRecord {
            tree,
            changed,
            message: message.to_string(),
        });
        self.head()
    }

    fn entries_under(&self, local: &Path) -> Vec<PathBuf> {
        self.entries
            .keys()
            .filter(|p| p.starts_with(local))
            .cloned()
            .collect()
    }
}

/// Nodes at or below `base`, keyed by relative subpath ("" for `base` itself)
fn subtree(tree: &Tree, base: &RepoPath) -> BTreeMap<String, Node> {
    tree.iter()
        .filter_map(|(p, n)| p.strip_prefix(base).map(|rel| (rel, n.clone())))
        .collect()
}

fn require_parent_dir(tree: &Tree, path: &RepoPath) -> Result<(), VcsError> {
    let parent = path
        .parent()
        .ok_or_else(|| VcsError::Invalid("cannot replace the repository root".to_string()))?;
    match tree.get(&parent) {
        Some(node) if node.kind == NodeKind::Directory => Ok(()),
        _ => Err(VcsError::PathNotFound(parent.to_string())),
    }
}

fn remove_subtree(tree: &mut Tree, path: &RepoPath) {
    tree.retain(|p, _| !p.starts_with(path));
}

fn merge_value(local: &mut String, from: &str, to: &str) -> Result<bool, ()> {
    if from == to || local == to {
        Ok(false)
    } else if local == from {
        *local = to.to_string();
        Ok(true)
    } else {
        Err(())
    }
}

impl Backend for MemoryBackend {
    fn check_path(&self, path: &RepoPath, revision: Option<Revision>) -> Result<NodeKind, VcsError> {
        let state = self.state.borrow();
        let rev = state.check_revision(revision)?;
        Ok(state.tree(rev).get(path).map_or(NodeKind::None, |n| n.kind))
    }

    fn latest_revision(&self) -> Result<Revision, VcsError> {
        Ok(self.state.borrow().head())
    }

    fn last_changed_revision(
        &self,
        path: &RepoPath,
        revision: Option<Revision>,
    ) -> Result<Revision, VcsError> {
        let state = self.state.borrow();
        let rev = state.check_revision(revision)?;
        if !state.tree(rev).contains_key(path) {
            return Err(VcsError::PathNotFound(path.to_string()));
        }
        Ok(state.last_changed(path, rev))
    }

    fn get_properties(
        &self,
        path: &RepoPath,
        revision: Option<Revision>,
    ) -> Result<Properties, VcsError> {
        let state = self.state.borrow();
        let rev = state.check_revision(revision)?;
        state
            .tree(rev)
            .get(path)
            .map(|n| n.props.clone())
            .ok_or_else(|| VcsError::PathNotFound(path.to_string()))
    }

    fn list(&self, path: &RepoPath) -> Result<Vec<(String, NodeKind)>, VcsError> {
        let state = self.state.borrow();
        let tree = state.tree(state.head());
        if !tree.contains_key(path) {
            return Err(VcsError::PathNotFound(path.to_string()));
        }
        Ok(tree
            .iter()
            .filter(|(p, _)| p.parent().as_ref() == Some(path))
            .filter_map(|(p, n)| p.file_name().map(|name| (name.to_string(), n.kind)))
            .collect())
    }

    fn commit_ops(&self, ops: &[CommitOp], message: &str) -> Result<Revision, VcsError> {
        let mut state = self.state.borrow_mut();
        let mut tree = state.tree(state.head()).clone();
        let mut changed = BTreeSet::new();
        let next = state.head() + 1;

        for op in ops {
            match op {
                CommitOp::MakeDir(path) => {
                    if tree.contains_key(path) {
                        return Err(VcsError::Invalid(format!("{path} already exists")));
                    }
                    require_parent_dir(&tree, path)?;
                    tree.insert(path.clone(), Node::dir().born_in(next));
                    changed.insert(path.clone());
                }
                CommitOp::Copy { from, revision, to } => {
                    let rev = state.check_revision(Some(*revision))?;
                    let nodes = subtree(state.tree(rev), from);
                    if nodes.is_empty() {
                        return Err(VcsError::PathNotFound(format!("{from}@{rev}")));
                    }
                    if tree.contains_key(to) {
                        return Err(VcsError::Invalid(format!("{to} already exists")));
                    }
                    require_parent_dir(&tree, to)?;
                    for (rel, mut node) in nodes {
                        node.copied_from = rel.is_empty().then(|| (from.clone(), rev));
                        let dest = to.join(&rel);
                        changed.insert(dest.clone());
                        tree.insert(dest, node);
                    }
                }
                CommitOp::PutFile { path, contents } => {
                    match tree.get_mut(path) {
                        Some(node) if node.kind == NodeKind::File => {
                            node.content = contents.clone();
                        }
                        Some(_) => return Err(VcsError::Invalid(format!("{path} is a directory"))),
                        None => {
                            require_parent_dir(&tree, path)?;
                            tree.insert(path.clone(), Node::file(contents).born_in(next));
                        }
                    }
                    changed.insert(path.clone());
                }
                CommitOp::SetProperty { path, name, value } => {
                    let node = tree
                        .get_mut(path)
                        .ok_or_else(|| VcsError::PathNotFound(path.to_string()))?;
                    node.props.insert(name.clone(), value.clone());
                    changed.insert(path.clone());
                }
            }
        }

        let rev = state.push_commit(tree, changed, message);
        debug!("Committed r{} ({} operations)", rev, ops.len());
        Ok(rev)
    }

    fn wc_info(&self, local: &Path) -> Result<Option<WcInfo>, VcsError> {
        let state = self.state.borrow();
        Ok(state.entries.get(local).map(|e| WcInfo {
            path: local.to_path_buf(),
            repo_path: e.repo_path.clone(),
            revision: e.revision,
            kind: e.kind,
        }))
    }

    fn wc_properties(&self, local: &Path) -> Result<Option<Properties>, VcsError> {
        let state = self.state.borrow();
        Ok(state
            .entries
            .get(local)
            .filter(|e| e.schedule != Schedule::Deleted)
            .map(|e| e.props.clone()))
    }

    fn set_wc_property(&self, local: &Path, name: &str, value: &str) -> Result<(), VcsError> {
        let mut state = self.state.borrow_mut();
        let entry = state
            .entries
            .get_mut(local)
            .ok_or_else(|| VcsError::NotWorkingCopy(local.to_path_buf()))?;
        entry.props.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn switch(
        &self,
        local: &Path,
        target: &RepoPath,
        revision: Option<Revision>,
    ) -> Result<Revision, VcsError> {
        let mut state = self.state.borrow_mut();
        let rev = state.check_revision(revision)?;
        if !state.entries.contains_key(local) {
            return Err(VcsError::NotWorkingCopy(local.to_path_buf()));
        }
        let nodes = subtree(state.tree(rev), target);
        if nodes.is_empty() {
            return Err(VcsError::PathNotFound(format!("{target}@{rev}")));
        }

        // Local edits travel with the switch
        let mut carried: Vec<(String, WcEntry)> = Vec::new();
        for path in state.entries_under(local) {
            let entry = &state.entries[&path];
            if entry.is_changed() {
                let rel = local_relative(&path, local).unwrap_or_default();
                carried.push((rel, entry.clone()));
            }
        }
        state.entries.retain(|p, _| !p.starts_with(local));

        for (rel, node) in &nodes {
            state.entries.insert(
                local_join(local, rel),
                WcEntry::from_node(target.join(rel), rev, node),
            );
        }

        for (rel, old) in carried {
            let path = local_join(local, &rel);
            match state.entries.get_mut(&path) {
                Some(entry) => {
                    if old.content != old.base_content {
                        entry.content = old.content.clone();
                    }
                    for (name, value) in &old.props {
                        if old.base_props.get(name) != Some(value) {
                            entry.props.insert(name.clone(), value.clone());
                        }
                    }
                    for name in old.base_props.keys() {
                        if !old.props.contains_key(name) {
                            entry.props.remove(name);
                        }
                    }
                    if old.schedule == Schedule::Deleted {
                        entry.schedule = Schedule::Deleted;
                    }
                }
                None if old.schedule == Schedule::Deleted => {}
                None => {
                    let conflicted = old.schedule == Schedule::Normal;
                    let mut entry = WcEntry::added(target.join(&rel), &old.as_node());
                    entry.conflicted = conflicted;
                    state.entries.insert(path, entry);
                }
            }
        }

        debug!("Switched {} to {}@{}", local.display(), target, rev);
        Ok(rev)
    }

    fn update(&self, local: &Path) -> Result<Revision, VcsError> {
        let mut state = self.state.borrow_mut();
        let head = state.head();
        if !state.entries.contains_key(local) {
            return Err(VcsError::NotWorkingCopy(local.to_path_buf()));
        }
        let tree = state.tree(head).clone();

        for path in state.entries_under(local) {
            let Some(entry) = state.entries.get_mut(&path) else {
                continue;
            };
            if entry.schedule == Schedule::Added {
                continue;
            }
            match tree.get(&entry.repo_path) {
                Some(node) => {
                    if entry.content == entry.base_content {
                        entry.content = node.content.clone();
                    }
                    if entry.props == entry.base_props {
                        entry.props = node.props.clone();
                    }
                    entry.base_content = node.content.clone();
                    entry.base_props = node.props.clone();
                    entry.revision = head;
                    if entry.schedule == Schedule::Normal {
                        entry.born = node.born;
                    }
                }
                None if !entry.is_changed() => {
                    state.entries.remove(&path);
                }
                None => entry.conflicted = true,
            }
        }

        // Pull in nodes added on the server below each versioned directory
        let mut queue: Vec<PathBuf> = state
            .entries_under(local)
            .into_iter()
            .filter(|p| state.entries[p].kind == NodeKind::Directory)
            .collect();
        while let Some(dir) = queue.pop() {
            let Some(repo_dir) = state.entries.get(&dir).map(|e| e.repo_path.clone()) else {
                continue;
            };
            for (child, node) in tree.iter().filter(|(p, _)| p.parent().as_ref() == Some(&repo_dir)) {
                let Some(name) = child.file_name() else {
                    continue;
                };
                let child_local = dir.join(name);
                if state.entries.contains_key(&child_local) {
                    continue;
                }
                state
                    .entries
                    .insert(child_local.clone(), WcEntry::from_node(child.clone(), head, node));
                if node.kind == NodeKind::Directory {
                    queue.push(child_local);
                }
            }
        }

        Ok(head)
    }

    fn merge(
        &self,
        left: &RepoPath,
        left_rev: Revision,
        right: &RepoPath,
        right_rev: Revision,
        local: &Path,
    ) -> Result<MergeOutcome, VcsError> {
        let mut state = self.state.borrow_mut();
        let right_rev = state.check_revision(Some(right_rev))?;
        if !state.entries.contains_key(local) {
            return Err(VcsError::NotWorkingCopy(local.to_path_buf()));
        }
        let after = subtree(state.tree(right_rev), right);
        if after.is_empty() {
            return Err(VcsError::PathNotFound(format!("{right}@{right_rev}")));
        }
        let before = state.history_subtree(left, left_rev.min(right_rev), right_rev);

        let mut outcome = MergeOutcome::default();
        let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();

        for rel in keys {
            let path = local_join(local, rel);
            match (before.get(rel), after.get(rel)) {
                (None, Some(added)) => {
                    if let Some(existing) = state.entries.get(&path) {
                        if existing.schedule != Schedule::Deleted && !existing.as_node().same_state(added) {
                            outcome.conflicts.push(Conflict {
                                path,
                                kind: ConflictKind::Tree,
                            });
                        }
                        continue;
                    }
                    match state.child_repo_path(&path) {
                        Ok(repo_path) => {
                            state.entries.insert(path.clone(), WcEntry::added(repo_path, added));
                            outcome.merged.push(path);
                        }
                        Err(_) => outcome.skipped.push(path),
                    }
                }
                (Some(removed), None) => {
                    let Some(entry) = state.entries.get_mut(&path) else {
                        continue;
                    };
                    if entry.schedule == Schedule::Deleted {
                        continue;
                    }
                    if entry.as_node().same_state(removed) {
                        entry.schedule = Schedule::Deleted;
                        outcome.merged.push(path);
                    } else {
                        entry.conflicted = true;
                        outcome.conflicts.push(Conflict {
                            path,
                            kind: ConflictKind::Tree,
                        });
                    }
                }
                (Some(old), Some(new)) if old.born != new.born && new.kind == NodeKind::File => {
                    let Some(entry) = state
                        .entries
                        .get_mut(&path)
                        .filter(|e| e.schedule != Schedule::Deleted && !e.missing)
                    else {
                        outcome.skipped.push(path);
                        continue;
                    };
                    if entry.as_node().same_state(old) {
                        entry.schedule = Schedule::Replaced;
                        entry.content = new.content.clone();
                        entry.props = new.props.clone();
                        entry.born = new.born;
                        outcome.merged.push(path);
                    } else {
                        entry.conflicted = true;
                        outcome.conflicts.push(Conflict {
                            path,
                            kind: ConflictKind::Tree,
                        });
                    }
                }
                (Some(old), Some(new)) if !old.same_state(new) => {
                    let Some(entry) = state
                        .entries
                        .get_mut(&path)
                        .filter(|e| e.schedule != Schedule::Deleted && !e.missing)
                    else {
                        outcome.skipped.push(path);
                        continue;
                    };

                    let mut touched = false;
                    let mut text_conflict = false;
                    match merge_value(&mut entry.content, &old.content, &new.content) {
                        Ok(changed) => touched |= changed,
                        Err(()) => text_conflict = true,
                    }

                    let mut prop_conflicts = Vec::new();
                    let names: BTreeSet<String> =
                        old.props.keys().chain(new.props.keys()).cloned().collect();
                    for name in names {
                        let from_value = old.props.get(&name).cloned().unwrap_or_default();
                        let to_value = new.props.get(&name).cloned().unwrap_or_default();
                        let mut local_value = entry.props.get(&name).cloned().unwrap_or_default();
                        match merge_value(&mut local_value, &from_value, &to_value) {
                            Ok(true) => {
                                touched = true;
                                if new.props.contains_key(&name) {
                                    entry.props.insert(name, local_value);
                                } else {
                                    entry.props.remove(&name);
                                }
                            }
                            Ok(false) => {}
                            Err(()) => prop_conflicts.push(name),
                        }
                    }

                    if text_conflict || !prop_conflicts.is_empty() {
                        entry.conflicted = true;
                        entry.theirs = Some((new.content.clone(), new.props.clone()));
                    }
                    if text_conflict {
                        outcome.conflicts.push(Conflict {
                            path: path.clone(),
                            kind: ConflictKind::Text,
                        });
                    }
                    if !prop_conflicts.is_empty() {
                        outcome.conflicts.push(Conflict {
                            path: path.clone(),
                            kind: ConflictKind::Property(prop_conflicts),
                        });
                    }
                    if touched {
                        outcome.merged.push(path);
                    }
                }
                _ => {}
            }
        }

        debug!(
            "Merged {}@{} -> {}@{} into {}: {} merged, {} skipped, {} conflicts",
            left,
            left_rev,
            right,
            right_rev,
            local.display(),
            outcome.merged.len(),
            outcome.skipped.len(),
            outcome.conflicts.len()
        );
        Ok(outcome)
    }

    fn status(&self, local: &Path) -> Result<Vec<StatusEntry>, VcsError> {
        let state = self.state.borrow();
        let mut out = Vec::new();
        for (path, entry) in state.entries.iter().filter(|(p, _)| p.starts_with(local)) {
            let switched = match (path.parent().and_then(|p| state.entries.get(p)), path.file_name()) {
                (Some(parent), Some(name)) => {
                    parent.repo_path.join(&name.to_string_lossy()) != entry.repo_path
                }
                _ => false,
            };
            let state_kind = if entry.missing {
                EntryState::Missing
            } else if entry.conflicted {
                EntryState::Conflicted
            } else {
                match entry.schedule {
                    Schedule::Added => EntryState::Added,
                    Schedule::Deleted => EntryState::Deleted,
                    Schedule::Replaced => EntryState::Replaced,
                    Schedule::Normal if entry.content != entry.base_content => EntryState::Modified,
                    Schedule::Normal => EntryState::Normal,
                }
            };
            let props_modified = entry.schedule == Schedule::Normal && entry.props != entry.base_props;
            if state_kind == EntryState::Normal && !props_modified && !switched {
                continue;
            }
            out.push(StatusEntry {
                path: path.clone(),
                state: state_kind,
                props_modified,
                switched,
            });
        }
        Ok(out)
    }

    fn resolve(&self, local: &Path, resolution: Resolution) -> Result<(), VcsError> {
        let mut state = self.state.borrow_mut();
        let entry = state
            .entries
            .get_mut(local)
            .ok_or_else(|| VcsError::NotWorkingCopy(local.to_path_buf()))?;
        if let (Resolution::Incoming, Some((content, props))) = (resolution, entry.theirs.take()) {
            entry.content = content;
            entry.props = props;
        }
        entry.theirs = None;
        entry.conflicted = false;
        Ok(())
    }

    fn commit(&self, paths: &[PathBuf], message: &str) -> Result<Option<Revision>, VcsError> {
        let mut state = self.state.borrow_mut();
        let mut targets: BTreeSet<PathBuf> = BTreeSet::new();
        for root in paths {
            for path in state.entries_under(root) {
                let entry = &state.entries[&path];
                if entry.conflicted {
                    return Err(VcsError::Conflicted(path));
                }
                if entry.is_changed() && !entry.missing {
                    targets.insert(path);
                }
            }
        }
        if targets.is_empty() {
            return Ok(None);
        }

        let head = state.head();
        let mut tree = state.tree(head).clone();
        let mut changed = BTreeSet::new();
        // Merged additions keep the history they were copied with
        let fresh = |entry: &WcEntry| {
            let node = entry.as_node();
            if node.born == 0 {
                node.born_in(head + 1)
            } else {
                node
            }
        };
        for path in &targets {
            let entry = &state.entries[path];
            let repo_path = entry.repo_path.clone();
            match entry.schedule {
                Schedule::Normal | Schedule::Deleted => {
                    if !tree.contains_key(&repo_path) {
                        if entry.schedule == Schedule::Deleted {
                            continue;
                        }
                        return Err(VcsError::OutOfDate(repo_path.to_string()));
                    }
                    if state.last_changed(&repo_path, head) > entry.revision {
                        return Err(VcsError::OutOfDate(repo_path.to_string()));
                    }
                    if entry.schedule == Schedule::Deleted {
                        remove_subtree(&mut tree, &repo_path);
                    } else if let Some(node) = tree.get_mut(&repo_path) {
                        node.content = entry.content.clone();
                        node.props = entry.props.clone();
                    }
                }
                Schedule::Added => {
                    if tree.contains_key(&repo_path) {
                        return Err(VcsError::OutOfDate(repo_path.to_string()));
                    }
                    require_parent_dir(&tree, &repo_path)?;
                    tree.insert(repo_path.clone(), fresh(entry));
                }
                Schedule::Replaced => {
                    remove_subtree(&mut tree, &repo_path);
                    tree.insert(repo_path.clone(), fresh(entry));
                }
            }
            changed.insert(repo_path);
        }

        let rev = state.push_commit(tree, changed, message);
        for path in &targets {
            let deleted = state.entries.get(path).map(|e| e.schedule) == Some(Schedule::Deleted);
            if deleted {
                state.entries.retain(|p, _| !p.starts_with(path));
                continue;
            }
            if let Some(entry) = state.entries.get_mut(path) {
                entry.base_content = entry.content.clone();
                entry.base_props = entry.props.clone();
                entry.schedule = Schedule::Normal;
                entry.revision = rev;
                if entry.born == 0 {
                    entry.born = rev;
                }
            }
        }
        debug!("Committed r{} ({} paths)", rev, targets.len());
        Ok(Some(rev))
    }

    fn delete(&self, paths: &[RepoPath], message: &str) -> Result<Revision, VcsError> {
        let mut state = self.state.borrow_mut();
        let mut tree = state.tree(state.head()).clone();
        let mut changed = BTreeSet::new();
        for path in paths {
            if !tree.contains_key(path) {
                return Err(VcsError::PathNotFound(path.to_string()));
            }
            remove_subtree(&mut tree, path);
            changed.insert(path.clone());
        }
        Ok(state.push_commit(tree, changed, message))
    }

    // No disk behind the entries, so an unversioned leftover never exists and
    // both forms of revert drop a scheduled addition
    fn revert(&self, local: &Path, _remove_added: bool) -> Result<(), VcsError> {
        let mut state = self.state.borrow_mut();
        let base_born = state
            .entries
            .get(local)
            .and_then(|e| state.tree(e.revision).get(&e.repo_path))
            .map(|n| n.born);
        let Some(entry) = state.entries.get_mut(local) else {
            return Ok(());
        };
        if entry.schedule == Schedule::Added {
            state.entries.retain(|p, _| !p.starts_with(local));
            return Ok(());
        }
        entry.content = entry.base_content.clone();
        entry.props = entry.base_props.clone();
        entry.schedule = Schedule::Normal;
        entry.conflicted = false;
        entry.theirs = None;
        entry.missing = false;
        if let Some(born) = base_born {
            entry.born = born;
        }
        Ok(())
    }
}
