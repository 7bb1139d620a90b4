// ABOUTME: Closed set of commit-policy variants stored on a branch's marker file
//
// Serialized as JSON inside the `bw:policy` property.

use serde::{Deserialize, Serialize};

/// Validation ruleset attached to a branch
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Policy {
    /// First message token must be the branch name (or the user-branch alternate)
    #[default]
    Default,

    /// Default message rules plus a minimum tool version
    VersionGated { minimum_version: String },

    /// Message must match at least one rule; optional minimum tool version
    Custom {
        rules: Vec<MessageRule>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum_version: Option<String>,
    },
}

impl Policy {
    pub fn minimum_version(&self) -> Option<&str> {
        match self {
            Self::Default => None,
            Self::VersionGated { minimum_version } => Some(minimum_version),
            Self::Custom { minimum_version, .. } => minimum_version.as_deref(),
        }
    }
}

/// One accepted commit-message shape. `{branch}` expands to the branch name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum MessageRule {
    /// Message starts with this text
    Prefix(String),
    /// Message matches this regular expression
    Pattern(String),
}
