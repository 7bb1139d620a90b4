// ABOUTME: Parsers for the textual output of the svn command-line client
//
// Kept free of process handling so they can be unit tested against captured output.

use lazy_static::lazy_static;
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{Conflict, ConflictKind, EntryState, MergeOutcome, NodeKind, StatusEntry, VcsError};
use crate::models::{Properties, RepoPath, Revision};

lazy_static! {
    /// "Committed revision 42." (svn commit / svn delete / svnmucc "r42 committed by ...")
    static ref COMMITTED_REGEX: Regex =
        Regex::new(r"(?m)^(?:Committed revision (\d+)\.|r(\d+) committed)").unwrap();
    /// "Skipped 'path'" and "Skipped missing target: 'path'"
    static ref SKIPPED_REGEX: Regex = Regex::new(r"^Skipped[^']*'(.+)'").unwrap();
    /// Property names inside a .prej reject file
    static ref PREJ_PROPERTY_REGEX: Regex =
        Regex::new(r"(?:Trying to (?:add new|change|delete) property|property) '([^']+)'").unwrap();
    static ref UPDATED_REGEX: Regex =
        Regex::new(r"(?m)^(?:Updated to|At) revision (\d+)\.").unwrap();
}

/// `svn info` key/value block
pub fn parse_info(output: &str) -> BTreeMap<String, String> {
    output
        .lines()
        .filter_map(|line| line.split_once(": "))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

pub fn node_kind(value: &str) -> NodeKind {
    match value {
        "directory" | "dir" => NodeKind::Directory,
        "file" => NodeKind::File,
        _ => NodeKind::None,
    }
}

/// Turn a "Relative URL" value (`^/proj/trunk%20x`) into a repository path
pub fn relative_url_to_path(value: &str) -> RepoPath {
    let raw = value.strip_prefix('^').unwrap_or(value);
    RepoPath::new(&percent_decode_str(raw).decode_utf8_lossy())
}

pub fn parse_revision(value: &str) -> Result<Revision, VcsError> {
    value
        .trim()
        .parse()
        .map_err(|_| VcsError::UnexpectedOutput(format!("not a revision: '{}'", value.trim())))
}

/// `svn proplist -v` output. Names are indented two spaces, value lines four.
pub fn parse_proplist(output: &str) -> Properties {
    let mut props = Properties::new();
    let mut current: Option<(String, Vec<String>)> = None;

    for line in output.lines() {
        if line.starts_with("Properties on ") {
            continue;
        }
        if let Some(value) = line.strip_prefix("    ") {
            if let Some((_, values)) = current.as_mut() {
                values.push(value.to_string());
            }
        } else if let Some(name) = line.strip_prefix("  ") {
            if let Some((name, values)) = current.take() {
                props.insert(name, values.join("\n"));
            }
            current = Some((name.trim().to_string(), Vec::new()));
        }
    }
    if let Some((name, values)) = current {
        props.insert(name, values.join("\n"));
    }
    props
}

/// `svn list` output: one entry per line, directories end with '/'
pub fn parse_list(output: &str) -> Vec<(String, NodeKind)> {
    output
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(|line| match line.strip_suffix('/') {
            Some(dir) => (dir.to_string(), NodeKind::Directory),
            None => (line.to_string(), NodeKind::File),
        })
        .collect()
}

/// `svn status` output (fixed columns, path from column 8)
pub fn parse_status(output: &str) -> Vec<StatusEntry> {
    let mut entries = Vec::new();
    for line in output.lines() {
        let chars: Vec<char> = line.chars().collect();
        // anything that does not fit the column layout (headers, conflict
        // summaries, "      >" detail lines) is skipped
        if chars.len() < 9
            || !" L".contains(chars[2])
            || !" +".contains(chars[3])
            || !" SX".contains(chars[4])
            || !" KOTB".contains(chars[5])
            || !" C".contains(chars[6])
            || chars[7] != ' '
        {
            continue;
        }

        let state = match chars[0] {
            'M' => EntryState::Modified,
            'A' => EntryState::Added,
            'D' => EntryState::Deleted,
            'R' => EntryState::Replaced,
            'C' => EntryState::Conflicted,
            '!' => EntryState::Missing,
            '?' => EntryState::Unversioned,
            ' ' => EntryState::Normal,
            // ignored, external, obstructed: not something the lifecycle acts on
            _ => continue,
        };
        let state = if chars[1] == 'C' || chars[6] == 'C' {
            EntryState::Conflicted
        } else {
            state
        };

        entries.push(StatusEntry {
            path: PathBuf::from(chars[8..].iter().collect::<String>()),
            state,
            props_modified: chars[1] == 'M',
            switched: chars[4] == 'S',
        });
    }
    entries
}

/// `svn merge` output
pub fn parse_merge(output: &str) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();
    for line in output.lines() {
        if line.starts_with("---") || line.starts_with("Summary of conflicts") {
            continue;
        }
        if let Some(caps) = SKIPPED_REGEX.captures(line) {
            outcome.skipped.push(PathBuf::from(&caps[1]));
            continue;
        }
        let chars: Vec<char> = line.chars().collect();
        if chars.len() < 6 || !line.is_char_boundary(5) {
            continue;
        }
        let path = PathBuf::from(&line[5..]);
        let (content, props, tree) = (chars[0], chars[1], chars[3]);
        if !"ADUCGER ".contains(content) || !"UCG ".contains(props) {
            continue;
        }
        if tree == 'C' {
            outcome.conflicts.push(Conflict {
                path,
                kind: ConflictKind::Tree,
            });
        } else if content == 'C' {
            outcome.conflicts.push(Conflict {
                path,
                kind: ConflictKind::Text,
            });
        } else if props == 'C' {
            outcome.conflicts.push(Conflict {
                path,
                // names are filled in from the reject file by the caller
                kind: ConflictKind::Property(Vec::new()),
            });
        } else if content != ' ' || props != ' ' {
            outcome.merged.push(path);
        }
    }
    outcome
}

pub fn parse_committed_revision(output: &str) -> Option<Revision> {
    COMMITTED_REGEX.captures(output).and_then(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| m.as_str().parse().ok())
    })
}

pub fn parse_updated_revision(output: &str) -> Option<Revision> {
    UPDATED_REGEX
        .captures_iter(output)
        .last()
        .and_then(|caps| caps[1].parse().ok())
}

/// Property names mentioned in a `.prej` reject file
pub fn parse_prej(contents: &str) -> Vec<String> {
    let mut names: Vec<String> = PREJ_PROPERTY_REGEX
        .captures_iter(contents)
        .map(|caps| caps[1].to_string())
        .collect();
    names.sort();
    names.dedup();
    names
}
