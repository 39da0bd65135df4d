//! Commands sent from peers to the microcontroller.
//!
//! A peer toggles the window actuator; the toggle becomes a [`Command`] with an
//! [`Action`].  On the wire (relay events and the serial link) the action is a
//! short code string.  Which string stands for which action differs between
//! firmware builds (single letters `A`/`F` on the PlantGuard firmware, whole
//! words on others), so the mapping lives in a [`CommandCodes`] table instead
//! of being hardcoded.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the actuator should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Open,
    Close,
}

impl Action {
    /// The opposite action.
    pub fn toggled(self) -> Self {
        match self {
            Action::Open => Action::Close,
            Action::Close => Action::Open,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Open => f.write_str("open"),
            Action::Close => f.write_str("close"),
        }
    }
}

/// A command as produced by one user interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub action: Action,
}

impl Command {
    pub fn new(action: Action) -> Self {
        Self { action }
    }
}

/// The wire form of an action: the code string itself.
///
/// `#[serde(transparent)]` serializes it as a bare JSON string (`"A"`), which
/// is exactly the payload the relay re-broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionCode(String);

impl ActionCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised when a [`CommandCodes`] table is unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandCodesError {
    #[error("command code for '{0}' must not be empty")]
    Empty(Action),
    #[error("open and close share the code '{0}'")]
    Ambiguous(String),
}

/// Mapping between [`Action`]s and their wire codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandCodes {
    pub open: String,
    pub close: String,
}

impl Default for CommandCodes {
    /// The PlantGuard firmware codes: `A` (abrir) and `F` (fechar).
    fn default() -> Self {
        Self {
            open: "A".to_string(),
            close: "F".to_string(),
        }
    }
}

impl CommandCodes {
    /// Whole-word codes for firmware that parses `OPEN`/`CLOSE`.
    pub fn words() -> Self {
        Self {
            open: "OPEN".to_string(),
            close: "CLOSE".to_string(),
        }
    }

    /// Checks that both codes are present and distinct.
    ///
    /// # Errors
    ///
    /// [`CommandCodesError::Empty`] or [`CommandCodesError::Ambiguous`].
    pub fn validate(&self) -> Result<(), CommandCodesError> {
        if self.open.trim().is_empty() {
            return Err(CommandCodesError::Empty(Action::Open));
        }
        if self.close.trim().is_empty() {
            return Err(CommandCodesError::Empty(Action::Close));
        }
        if self.open == self.close {
            return Err(CommandCodesError::Ambiguous(self.open.clone()));
        }
        Ok(())
    }

    pub fn encode(&self, action: Action) -> ActionCode {
        match action {
            Action::Open => ActionCode::new(self.open.clone()),
            Action::Close => ActionCode::new(self.close.clone()),
        }
    }

    /// Maps a received code back to its action; `None` for unknown codes.
    pub fn decode(&self, code: &ActionCode) -> Option<Action> {
        let code = code.as_str().trim();
        if code == self.open {
            Some(Action::Open)
        } else if code == self.close {
            Some(Action::Close)
        } else {
            None
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_codes_match_firmware() {
        let codes = CommandCodes::default();
        assert_eq!(codes.encode(Action::Open).as_str(), "A");
        assert_eq!(codes.encode(Action::Close).as_str(), "F");
    }

    #[test]
    fn test_decode_inverts_encode() {
        let codes = CommandCodes::words();
        for action in [Action::Open, Action::Close] {
            assert_eq!(codes.decode(&codes.encode(action)), Some(action));
        }
    }

    #[test]
    fn test_decode_unknown_code_returns_none() {
        let codes = CommandCodes::default();
        assert_eq!(codes.decode(&ActionCode::new("Z")), None);
    }

    #[test]
    fn test_validate_rejects_identical_codes() {
        let codes = CommandCodes {
            open: "X".to_string(),
            close: "X".to_string(),
        };
        assert_eq!(
            codes.validate(),
            Err(CommandCodesError::Ambiguous("X".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_empty_code() {
        let codes = CommandCodes {
            open: " ".to_string(),
            close: "F".to_string(),
        };
        assert_eq!(codes.validate(), Err(CommandCodesError::Empty(Action::Open)));
    }

    #[test]
    fn test_action_code_serializes_as_bare_string() {
        let json = serde_json::to_string(&ActionCode::new("A")).unwrap();
        assert_eq!(json, r#""A""#);
    }

    #[test]
    fn test_toggled_flips_action() {
        assert_eq!(Action::Open.toggled(), Action::Close);
        assert_eq!(Action::Close.toggled(), Action::Open);
    }
}
