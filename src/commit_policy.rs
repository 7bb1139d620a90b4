// ABOUTME: Commit policy validator - message shape per branch, minimum tool version,
// and the messages branchwork writes itself

use regex::Regex;
use std::cmp::Ordering;
use tracing::warn;

use crate::branch::PolicyError;
use crate::models::{BranchMetadata, BranchType, MessageRule, Policy};

/// Messages starting with this are accepted on any branch (metadata repair, admin commits)
pub const ADMIN_PREFIX: &str = "branch admin";

/// Accepted on user branches in place of the branch name
pub const USER_BRANCH_ALTERNATE_PREFIX: &str = "private";

/// Lets a promotion through a code freeze
pub const FREEZE_OVERRIDE_MARKER: &str = "[freeze override]";

pub fn is_admin_message(message: &str) -> bool {
    message.trim_start().starts_with(ADMIN_PREFIX)
}

pub fn has_freeze_override(message: &str) -> bool {
    message.contains(FREEZE_OVERRIDE_MARKER)
}

/// Check a commit message against the branch's policy
pub fn validate_message(branch: &BranchMetadata, message: &str) -> Result<(), PolicyError> {
    if is_admin_message(message) {
        return Ok(());
    }

    let name = branch.name();
    let rejected = |expected: String| PolicyError::MessageRejected {
        branch: branch.branch_path.to_string(),
        message: message.to_string(),
        expected,
    };

    match &branch.policy {
        Policy::Default | Policy::VersionGated { .. } => {
            let first = message.split_whitespace().next().unwrap_or("");
            let accepted = first == name
                || (branch.branch_type == BranchType::UserBranch
                    && first == USER_BRANCH_ALTERNATE_PREFIX);
            if accepted {
                Ok(())
            } else if branch.branch_type == BranchType::UserBranch {
                Err(rejected(format!(
                    "'{name}' or '{USER_BRANCH_ALTERNATE_PREFIX}'"
                )))
            } else {
                Err(rejected(format!("'{name}'")))
            }
        }
        Policy::Custom { rules, .. } => {
            if rules.iter().any(|rule| rule_matches(rule, name, message)) {
                Ok(())
            } else {
                let expected = rules
                    .iter()
                    .map(|rule| match rule {
                        MessageRule::Prefix(p) => format!("'{}'", p.replace("{branch}", name)),
                        MessageRule::Pattern(p) => format!("/{p}/"),
                    })
                    .collect::<Vec<_>>()
                    .join(" or ");
                Err(rejected(expected))
            }
        }
    }
}

fn rule_matches(rule: &MessageRule, branch_name: &str, message: &str) -> bool {
    match rule {
        MessageRule::Prefix(prefix) => message.starts_with(&prefix.replace("{branch}", branch_name)),
        MessageRule::Pattern(pattern) => {
            let expanded = pattern.replace("{branch}", &regex::escape(branch_name));
            match Regex::new(&expanded) {
                Ok(re) => re.is_match(message),
                Err(e) => {
                    warn!("Ignoring invalid message pattern '{}': {}", pattern, e);
                    false
                }
            }
        }
    }
}

/// Fail when the running tool is older than the branch's minimum version
pub fn check_tool_version(branch: &BranchMetadata, current: &str) -> Result<(), PolicyError> {
    let Some(minimum) = branch.policy.minimum_version() else {
        return Ok(());
    };
    if compare_versions(current, minimum) == Ordering::Less {
        return Err(PolicyError::VersionMismatch {
            branch: branch.branch_path.to_string(),
            current: current.to_string(),
            minimum: minimum.to_string(),
        });
    }
    Ok(())
}

/// Message rules first, then the version gate
pub fn validate_commit(
    branch: &BranchMetadata,
    message: &str,
    tool_version: &str,
) -> Result<(), PolicyError> {
    validate_message(branch, message)?;
    check_tool_version(branch, tool_version)
}

/// Dotted numeric comparison; a leading `v` and any `-pre`/`+build` suffix are ignored
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    fn parts(v: &str) -> Vec<u64> {
        let v = v.trim().trim_start_matches('v');
        let core = v.split(['-', '+']).next().unwrap_or("");
        core.split('.')
            .map(|p| {
                let digits: String = p.chars().take_while(char::is_ascii_digit).collect();
                digits.parse().unwrap_or(0)
            })
            .collect()
    }
    let (mut a, mut b) = (parts(a), parts(b));
    let len = a.len().max(b.len());
    a.resize(len, 0);
    b.resize(len, 0);
    a.cmp(&b)
}

pub fn admin_message(action: &str) -> String {
    format!("{ADMIN_PREFIX} - {action}")
}

/// Default message for promoting `branch` into `destination`
pub fn promote_message(destination: &BranchMetadata, branch: &BranchMetadata) -> String {
    format!("{} - promote {}", destination.name(), branch.name())
}
