// ABOUTME: Library crate for branchwork exposing the branch workflow for the bw binary and tests

#![allow(missing_docs)]

pub mod branch;
pub mod cli;
pub mod commit_policy;
pub mod config;
pub mod models;
pub mod vcs;
