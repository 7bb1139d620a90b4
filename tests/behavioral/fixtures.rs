// ABOUTME: Shared test fixtures and utilities for behavioral tests
//
// Provides:
// - Sandbox: an initialized project in a MemoryBackend with trunk checked out at /wc
// - path helpers for the default project layout

#![allow(dead_code)]

use branchwork::branch::{BranchManager, CreateOutcome};
use branchwork::models::{ProjectLayout, RepoPath, Revision};
use branchwork::vcs::{Backend, CommitOp, MemoryBackend};
use std::path::PathBuf;

pub const PROJECT: &str = "/proj";
pub const TRUNK: &str = "/proj/trunk";
pub const MAIN_C: &str = "int main() { return 0; }\n";
pub const README: &str = "readme\n";

pub fn user_branch(name: &str) -> RepoPath {
    RepoPath::new(&format!("/proj/branches/user/{name}"))
}

pub fn release_branch(name: &str) -> RepoPath {
    RepoPath::new(&format!("/proj/branches/{name}"))
}

/// Project `/proj` with the default layout, trunk holding `src/main.c` and
/// `README` (r2), checked out at `/wc`
pub struct Sandbox {
    pub backend: MemoryBackend,
    pub wc: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let backend = MemoryBackend::new();
        BranchManager::new(&backend, "/")
            .init_project(&RepoPath::new(PROJECT), &ProjectLayout::default())
            .expect("init project");
        backend
            .commit_ops(
                &[
                    CommitOp::MakeDir(RepoPath::new("/proj/trunk/src")),
                    CommitOp::PutFile {
                        path: RepoPath::new("/proj/trunk/src/main.c"),
                        contents: MAIN_C.to_string(),
                    },
                    CommitOp::PutFile {
                        path: RepoPath::new("/proj/trunk/README"),
                        contents: README.to_string(),
                    },
                ],
                "trunk - seed sources",
            )
            .expect("seed trunk");
        let wc = PathBuf::from("/wc");
        backend
            .checkout(&RepoPath::new(TRUNK), &wc)
            .expect("checkout trunk");
        Self { backend, wc }
    }

    /// Manager running at the working-copy root
    pub fn manager(&self) -> BranchManager<'_> {
        BranchManager::new(&self.backend, self.wc.clone())
    }

    /// Manager running in a subdirectory of the working copy
    pub fn manager_at(&self, relative: &str) -> BranchManager<'_> {
        BranchManager::new(&self.backend, self.local(relative))
    }

    pub fn local(&self, relative: &str) -> PathBuf {
        if relative.is_empty() {
            self.wc.clone()
        } else {
            self.wc.join(relative)
        }
    }

    /// Another developer commits straight to trunk
    pub fn trunk_commit(&self, relative: &str, contents: &str) -> Revision {
        self.backend
            .server_put(
                &RepoPath::new(TRUNK).join(relative),
                contents,
                &format!("trunk - update {relative}"),
            )
            .expect("trunk commit")
    }

    /// Commit everything under the working copy
    pub fn commit_all(&self, message: &str) -> Option<Revision> {
        self.backend
            .commit(&[self.wc.clone()], message)
            .expect("commit working copy")
    }

    pub fn update(&self) -> Revision {
        self.backend.update(&self.wc).expect("update working copy")
    }

    pub fn create_user_branch(&self, name: &str) -> CreateOutcome {
        self.manager()
            .create_branch(name, true, false)
            .expect("create user branch")
    }

    pub fn read(&self, relative: &str) -> Option<String> {
        self.backend.read_file(&self.local(relative))
    }
}
