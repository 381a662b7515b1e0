//! Dialogue history: the ordered, role-tagged transcript of one session.

use serde::{Deserialize, Serialize};

/// Speaker role for one dialogue turn. Closed enumeration — roles are not
/// free strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The seeding instruction turn.
    System,
    /// A transcribed user utterance.
    User,
    /// A backend reply or fallback notice.
    Assistant,
}

/// One role-tagged message in the dialogue history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who spoke.
    pub role: Role,
    /// What was said.
    pub content: String,
}

/// Append-only ordered transcript, seeded with one system turn.
///
/// Exclusively owned by one conversation session. Grows by a user turn and
/// then an assistant turn per cycle, strictly in cycle order — the assistant
/// turn for a cycle is only ever appended after its user turn.
#[derive(Debug, Clone)]
pub struct DialogueHistory {
    turns: Vec<Turn>,
}

impl DialogueHistory {
    /// Create a history seeded with the given system prompt.
    #[must_use]
    pub fn new(system_prompt: &str) -> Self {
        Self {
            turns: vec![Turn {
                role: Role::System,
                content: system_prompt.to_owned(),
            }],
        }
    }

    /// Append a user turn.
    pub fn push_user(&mut self, content: &str) {
        self.turns.push(Turn {
            role: Role::User,
            content: content.to_owned(),
        });
    }

    /// Append an assistant turn.
    pub fn push_assistant(&mut self, content: &str) {
        self.turns.push(Turn {
            role: Role::Assistant,
            content: content.to_owned(),
        });
    }

    /// The full transcript in append order.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns, including the seed system turn.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// A history is never empty — it always holds the system seed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
