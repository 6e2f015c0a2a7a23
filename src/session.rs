//! Conversation state for one subscriber.
//!
//! Multi-step commands ("send me the url", "send me the keyword") park what
//! they are waiting for on the session itself. Sessions are serializable so a
//! front-end can persist them alongside its own conversation state.

use serde::{Deserialize, Serialize};

use crate::app::Command;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingInput {
    SourceUrl,
    Keyword { source_id: i64 },
    CheckInterval,
    MaxNewsCount,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pending: Option<PendingInput>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait_for(&mut self, input: PendingInput) {
        self.pending = Some(input);
    }

    pub fn pending(&self) -> Option<PendingInput> {
        self.pending
    }

    pub fn cancel(&mut self) -> Option<PendingInput> {
        self.pending.take()
    }

    /// Turns free text into the command the session was waiting for.
    /// Text that arrives with nothing pending resolves to `None`. Unparseable
    /// numbers leave the session waiting.
    pub fn resolve(&mut self, text: &str) -> Result<Option<Command>> {
        let Some(pending) = self.pending.take() else {
            return Ok(None);
        };
        let text = text.trim();

        let command = match pending {
            PendingInput::SourceUrl => Command::AddSource {
                url: text.to_string(),
            },
            PendingInput::Keyword { source_id } => Command::AddKeyword {
                source_id,
                keyword: text.to_string(),
            },
            PendingInput::CheckInterval => match text.parse::<u32>() {
                Ok(minutes) => Command::SetCheckInterval(minutes),
                Err(_) => {
                    self.pending = Some(pending);
                    return Err(AppError::invalid_input(
                        "check_interval_minutes",
                        "expected a whole number of minutes",
                    ));
                }
            },
            PendingInput::MaxNewsCount => match text.parse::<u32>() {
                Ok(count) => Command::SetMaxNewsCount(count),
                Err(_) => {
                    self.pending = Some(pending);
                    return Err(AppError::invalid_input(
                        "max_news_count",
                        "expected a whole number",
                    ));
                }
            },
        };

        Ok(Some(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_pending_input_is_ignored() {
        let mut session = Session::new();
        assert!(session.resolve("hello").unwrap().is_none());
    }

    #[test]
    fn keyword_reply_targets_the_selected_source() {
        let mut session = Session::new();
        session.wait_for(PendingInput::Keyword { source_id: 7 });

        let command = session.resolve("  выборы ").unwrap();
        assert_eq!(
            command,
            Some(Command::AddKeyword {
                source_id: 7,
                keyword: "выборы".to_string(),
            })
        );
        assert_eq!(session.pending(), None);
    }

    #[test]
    fn sessions_do_not_share_state() {
        let mut alice = Session::new();
        let mut bob = Session::new();
        alice.wait_for(PendingInput::Keyword { source_id: 1 });
        bob.wait_for(PendingInput::Keyword { source_id: 2 });

        assert_eq!(
            bob.resolve("rust").unwrap(),
            Some(Command::AddKeyword {
                source_id: 2,
                keyword: "rust".to_string(),
            })
        );
        assert_eq!(alice.pending(), Some(PendingInput::Keyword { source_id: 1 }));
    }

    #[test]
    fn bad_number_keeps_waiting() {
        let mut session = Session::new();
        session.wait_for(PendingInput::CheckInterval);

        assert!(matches!(
            session.resolve("ten"),
            Err(AppError::InvalidInput { .. })
        ));
        assert_eq!(session.pending(), Some(PendingInput::CheckInterval));
        assert_eq!(
            session.resolve("10").unwrap(),
            Some(Command::SetCheckInterval(10))
        );
    }

    #[test]
    fn cancel_clears_pending_input() {
        let mut session = Session::new();
        session.wait_for(PendingInput::SourceUrl);
        assert_eq!(session.cancel(), Some(PendingInput::SourceUrl));
        assert!(session.resolve("https://example.com/").unwrap().is_none());
    }

    #[test]
    fn survives_serialization() {
        let mut session = Session::new();
        session.wait_for(PendingInput::MaxNewsCount);
        let json = serde_json::to_string(&session).unwrap();
        let restored: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.pending(), Some(PendingInput::MaxNewsCount));
    }
}
