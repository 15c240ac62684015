//! Outbound interface to the chat platform

use crate::gate::error::PlatformResult;
use crate::gate::event::{ButtonAction, Chat};

/// A message button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: ButtonAction,
}

impl Button {
    pub fn new(label: impl Into<String>, action: ButtonAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Buttons attached to a message, as ordered rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markup {
    pub rows: Vec<Vec<Button>>,
}

impl Markup {
    /// Markup with a single button
    #[must_use]
    pub fn single(button: Button) -> Self {
        Self {
            rows: vec![vec![button]],
        }
    }

    /// All buttons, row by row
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }
}

/// What a member may do in the group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberPermissions {
    /// Read only, until the quiz is passed
    Restricted,
    Full,
}

/// Role of a user in the guarded group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRole {
    Owner,
    Admin,
    Member,
    NotMember,
}

/// The handful of platform calls the gate needs. All of them act on the
/// guarded group.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Send a message and return its id
    async fn send_message(
        &self,
        chat: Chat,
        text: &str,
        markup: Option<Markup>,
    ) -> PlatformResult<u64>;

    /// Replace the text and buttons of a message
    async fn edit_message(
        &self,
        chat: Chat,
        message_id: u64,
        text: &str,
        markup: Option<Markup>,
    ) -> PlatformResult<()>;

    async fn delete_message(&self, chat: Chat, message_id: u64) -> PlatformResult<()>;

    async fn restrict_member(
        &self,
        user_id: u64,
        permissions: MemberPermissions,
    ) -> PlatformResult<()>;

    /// Remove a member from the group
    async fn kick_member(&self, user_id: u64) -> PlatformResult<()>;

    /// Lift a ban. Succeeds when the user is not banned.
    async fn unban_member(&self, user_id: u64) -> PlatformResult<()>;

    async fn ban_member(&self, user_id: u64) -> PlatformResult<()>;

    async fn member_role(&self, user_id: u64) -> PlatformResult<MemberRole>;
}
