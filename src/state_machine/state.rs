//! Session state types

use serde::{Deserialize, Serialize};

/// Greeting placed at the start of every new session
pub const GREETING: &str = "Hey there! Ask me about any historical monument.";

/// Position of a session in the verification flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Ready for a fresh monument query
    #[default]
    Idle,
    /// An answer was given; waiting for an e-mail address
    AwaitingEmail,
    /// A passcode was sent; waiting for the user to type it
    AwaitingOtp,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::AwaitingEmail => "awaiting_email",
            Stage::AwaitingOtp => "awaiting_otp",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Author of a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub text: String,
}

/// One conversation, persisted between turns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub stage: Stage,
    /// Candidate address while verifying; cleared on reset or after delivery
    #[serde(default)]
    pub verified_email: Option<String>,
    #[serde(default)]
    pub otp_attempts: u32,
    /// Query whose expanded answer is owed after verification
    #[serde(default)]
    pub pending_query: Option<String>,
    /// Append-only transcript
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl Session {
    /// Fresh idle session opening with the greeting
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stage: Stage::Idle,
            verified_email: None,
            otp_attempts: 0,
            pending_query: None,
            history: vec![HistoryEntry {
                role: Role::Assistant,
                text: GREETING.to_string(),
            }],
        }
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.history.push(HistoryEntry {
            role: Role::User,
            text: text.into(),
        });
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.history.push(HistoryEntry {
            role: Role::Assistant,
            text: text.into(),
        });
    }

    #[allow(dead_code)] // Used in tests
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|entry| entry.role == Role::Assistant)
            .map(|entry| entry.text.as_str())
    }
}

/// Turn-level rules (immutable configuration)
#[derive(Debug, Clone)]
pub struct Policy {
    /// Failed code entries before the flow resets
    pub max_attempts: u32,
    /// Length of issued passcodes
    pub code_digits: usize,
    /// Start verification when an idle session volunteers an e-mail address
    /// and an answer is still owed
    pub accept_unsolicited_email: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            code_digits: crate::passcode::CODE_DIGITS,
            accept_unsolicited_email: false,
        }
    }
}
