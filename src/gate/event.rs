//! Inbound events
//!
//! The transport decodes everything it receives into a `GateEvent` once, at
//! the boundary. Button payloads and command names become closed enums with
//! an `Unknown` variant for anything unrecognised.

use derive_more::Display;

/// Action attached to a message button
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ButtonAction {
    /// Inert button, such as the `i/N` position indicator
    #[display("ignore")]
    Ignore,
    #[display("start_quiz")]
    StartQuiz,
    #[display("next")]
    Next,
    #[display("prev")]
    Prev,
    /// Pick the option with the given index
    #[display("answer_{_0}")]
    Answer(usize),
    #[display("share_result")]
    ShareResult,
    #[display("{_0}")]
    Unknown(String),
}

impl ButtonAction {
    /// Decode a button payload
    #[must_use]
    pub fn parse(data: &str) -> Self {
        match data {
            "ignore" => Self::Ignore,
            "start_quiz" => Self::StartQuiz,
            "next" => Self::Next,
            "prev" => Self::Prev,
            "share_result" => Self::ShareResult,
            _ => data
                .strip_prefix("answer_")
                .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|n| n.parse().ok())
                .map_or_else(|| Self::Unknown(data.to_string()), Self::Answer),
        }
    }
}

/// Commands understood by the gate
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum GateCommand {
    #[display("start")]
    Start,
    #[display("kick")]
    Kick,
    #[display("kickme")]
    KickMe,
    #[display("ban")]
    Ban,
    #[display("{_0}")]
    Unknown(String),
}

impl GateCommand {
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            "start" => Self::Start,
            "kick" => Self::Kick,
            "kickme" => Self::KickMe,
            "ban" => Self::Ban,
            _ => Self::Unknown(name.to_string()),
        }
    }
}

/// Where a message lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chat {
    /// A channel of the guarded group
    Channel(u64),
    /// The private conversation with a user
    Direct(u64),
}

impl Chat {
    #[must_use]
    pub fn is_private(&self) -> bool {
        matches!(self, Self::Direct(_))
    }
}

/// A platform user as seen in an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: u64,
    pub display_name: String,
}

impl UserRef {
    pub fn new(id: u64, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// A command message together with everything target resolution looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub command: GateCommand,
    /// Text after the command name
    pub args: String,
    pub sender: UserRef,
    pub chat: Chat,
    pub message_id: u64,
    /// Users mentioned in the message, in order
    pub mentions: Vec<UserRef>,
    /// Author of the message this one replies to
    pub reply_to: Option<UserRef>,
}

/// A message in a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub chat: Chat,
    pub id: u64,
}

/// Kind of a system message announcing a membership change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemMessageKind {
    Join,
    Leave,
}

/// Everything the gate reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    MemberJoined {
        user: UserRef,
        is_bot: bool,
        /// The join announcement, when the platform delivers it with the event
        announcement: Option<MessageRef>,
    },
    MemberLeft {
        user: UserRef,
        announcement: Option<MessageRef>,
    },
    /// A join or leave announcement delivered separately from the membership event
    SystemMessage {
        message: MessageRef,
        kind: SystemMessageKind,
    },
    Command(CommandInvocation),
    ButtonPress {
        action: ButtonAction,
        user: UserRef,
        chat: Chat,
        message_id: u64,
    },
    InactivityTimeout {
        user_id: u64,
    },
    Shutdown,
}

impl GateEvent {
    /// Short name of the event kind, for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MemberJoined { .. } => "member_joined",
            Self::MemberLeft { .. } => "member_left",
            Self::SystemMessage { .. } => "system_message",
            Self::Command(_) => "command",
            Self::ButtonPress { .. } => "button_press",
            Self::InactivityTimeout { .. } => "inactivity_timeout",
            Self::Shutdown => "shutdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_actions() {
        assert_eq!(ButtonAction::parse("ignore"), ButtonAction::Ignore);
        assert_eq!(ButtonAction::parse("start_quiz"), ButtonAction::StartQuiz);
        assert_eq!(ButtonAction::parse("next"), ButtonAction::Next);
        assert_eq!(ButtonAction::parse("prev"), ButtonAction::Prev);
        assert_eq!(ButtonAction::parse("answer_0"), ButtonAction::Answer(0));
        assert_eq!(ButtonAction::parse("answer_12"), ButtonAction::Answer(12));
        assert_eq!(ButtonAction::parse("share_result"), ButtonAction::ShareResult);
    }

    #[test]
    fn test_parse_unknown_actions() {
        for data in ["", "answer_", "answer_-1", "answer_+1", "answer_x", "Next", "foo"] {
            assert_eq!(
                ButtonAction::parse(data),
                ButtonAction::Unknown(data.to_string()),
                "{data:?}"
            );
        }
    }

    #[test]
    fn test_action_display_is_the_payload() {
        for action in [
            ButtonAction::Ignore,
            ButtonAction::StartQuiz,
            ButtonAction::Next,
            ButtonAction::Prev,
            ButtonAction::Answer(3),
            ButtonAction::ShareResult,
        ] {
            assert_eq!(ButtonAction::parse(&action.to_string()), action);
        }
        assert_eq!(ButtonAction::Answer(3).to_string(), "answer_3");
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(GateCommand::parse("kickme"), GateCommand::KickMe);
        assert_eq!(GateCommand::parse("ban"), GateCommand::Ban);
        assert_eq!(
            GateCommand::parse("unban"),
            GateCommand::Unknown("unban".to_string())
        );
        assert_eq!(GateCommand::Kick.to_string(), "kick");
    }
}
