//! Post-event actions.

use serde::{Deserialize, Serialize};

/// The effect an action performs.
///
/// Tagged so configs written for a newer release degrade to [`ActionKind::Unknown`]
/// instead of failing the whole streamer entry; dispatch rejects the unknown
/// variant per action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionKind {
    /// Hand the files to the upload service.
    Upload {
        remote_path: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// Run a subprocess. The program string is split on single spaces; no
    /// shell is involved and arguments cannot contain whitespace.
    Command { program: String },
    #[serde(other)]
    Unknown,
}

/// A configured completion action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Disabled actions are filtered out before dispatch.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: ActionKind,
}

impl Action {
    pub fn upload(remote_path: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            enabled: true,
            kind: ActionKind::Upload {
                remote_path: remote_path.into(),
                args,
            },
        }
    }

    pub fn command(program: impl Into<String>) -> Self {
        Self {
            enabled: true,
            kind: ActionKind::Command {
                program: program.into(),
            },
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_enabled_defaults_to_true() {
        let action: Action =
            serde_json::from_str(r#"{"type": "command", "program": "echo done"}"#).unwrap();
        assert!(action.enabled);
        assert_eq!(
            action.kind,
            ActionKind::Command {
                program: "echo done".to_string()
            }
        );
    }

    #[test]
    fn test_upload_action_parse() {
        let action: Action = serde_json::from_str(
            r#"{"type": "upload", "remote_path": "remote:rec", "args": ["--transfers", "4"], "enabled": false}"#,
        )
        .unwrap();
        assert!(!action.enabled);
        assert_eq!(
            action.kind,
            ActionKind::Upload {
                remote_path: "remote:rec".to_string(),
                args: vec!["--transfers".to_string(), "4".to_string()],
            }
        );
    }

    #[test]
    fn test_unknown_action_variant() {
        let action: Action =
            serde_json::from_str(r#"{"type": "telegram", "chat_id": "42"}"#).unwrap();
        assert_eq!(action.kind, ActionKind::Unknown);
    }

    #[test]
    fn test_action_serde_roundtrip() {
        let action = Action::upload("remote:clips", vec!["--fast-list".to_string()]);
        let json = serde_json::to_string(&action).unwrap();
        let parsed: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, action);
    }
}
