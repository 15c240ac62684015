//! Access policy for moderator commands

use crate::gate::error::PlatformResult;
use crate::gate::event::CommandInvocation;
use crate::gate::platform::{ChatPlatform, MemberRole};

/// How a command target was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    Mention,
    Reply,
    UserId,
}

/// The user a moderator command acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub user_id: u64,
    pub display_name: String,
    pub source: TargetSource,
}

impl Target {
    /// How the target is named in confirmations: by id when it was given
    /// as one, by name otherwise
    #[must_use]
    pub fn label(&self) -> String {
        match self.source {
            TargetSource::UserId => self.user_id.to_string(),
            TargetSource::Mention | TargetSource::Reply => self.display_name.clone(),
        }
    }
}

/// Find the target of a command. A mention wins over a reply, which wins
/// over a numeric id in the arguments.
#[must_use]
pub fn resolve_target(invocation: &CommandInvocation) -> Option<Target> {
    if let Some(user) = invocation.mentions.first() {
        return Some(Target {
            user_id: user.id,
            display_name: user.display_name.clone(),
            source: TargetSource::Mention,
        });
    }

    if let Some(user) = &invocation.reply_to {
        return Some(Target {
            user_id: user.id,
            display_name: user.display_name.clone(),
            source: TargetSource::Reply,
        });
    }

    // Platform ids are never zero
    let args = invocation.args.trim();
    args.parse::<u64>().ok().filter(|id| *id != 0).map(|user_id| Target {
        user_id,
        display_name: args.to_string(),
        source: TargetSource::UserId,
    })
}

/// Whether the user owns or administers the group
///
/// # Errors
/// Returns an error if the platform can't report the user's role
pub async fn is_admin(platform: &dyn ChatPlatform, user_id: u64) -> PlatformResult<bool> {
    let role = platform.member_role(user_id).await?;
    Ok(matches!(role, MemberRole::Owner | MemberRole::Admin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::event::{Chat, GateCommand, UserRef};
    use crate::gate::platform::MockChatPlatform;
    use mockall::predicate::eq;

    fn invocation(args: &str) -> CommandInvocation {
        CommandInvocation {
            command: GateCommand::Kick,
            args: args.to_string(),
            sender: UserRef::new(1, "admin"),
            chat: Chat::Channel(100),
            message_id: 500,
            mentions: Vec::new(),
            reply_to: None,
        }
    }

    #[test]
    fn test_mention_wins() {
        let mut command = invocation("42");
        command.mentions = vec![UserRef::new(7, "Mentioned"), UserRef::new(8, "Second")];
        command.reply_to = Some(UserRef::new(9, "Replied"));

        let target = resolve_target(&command).unwrap();
        assert_eq!(target.user_id, 7);
        assert_eq!(target.source, TargetSource::Mention);
        assert_eq!(target.label(), "Mentioned");
    }

    #[test]
    fn test_reply_wins_over_id() {
        let mut command = invocation("42");
        command.reply_to = Some(UserRef::new(9, "Replied"));

        let target = resolve_target(&command).unwrap();
        assert_eq!(target.user_id, 9);
        assert_eq!(target.source, TargetSource::Reply);
        assert_eq!(target.label(), "Replied");
    }

    #[test]
    fn test_numeric_id_is_rendered_as_id() {
        let target = resolve_target(&invocation(" 1234567890123 ")).unwrap();
        assert_eq!(target.user_id, 1_234_567_890_123);
        assert_eq!(target.source, TargetSource::UserId);
        assert_eq!(target.label(), "1234567890123");
    }

    #[test]
    fn test_no_target() {
        assert!(resolve_target(&invocation("")).is_none());
        assert!(resolve_target(&invocation("someone")).is_none());
        assert!(resolve_target(&invocation("-5")).is_none());
        assert!(resolve_target(&invocation("0")).is_none());
    }

    #[tokio::test]
    async fn test_is_admin_by_role() {
        let mut platform = MockChatPlatform::new();
        platform
            .expect_member_role()
            .with(eq(1))
            .returning(|_| Ok(MemberRole::Owner));
        platform
            .expect_member_role()
            .with(eq(2))
            .returning(|_| Ok(MemberRole::Admin));
        platform
            .expect_member_role()
            .with(eq(3))
            .returning(|_| Ok(MemberRole::Member));
        platform
            .expect_member_role()
            .with(eq(4))
            .returning(|_| Ok(MemberRole::NotMember));

        assert!(is_admin(&platform, 1).await.unwrap());
        assert!(is_admin(&platform, 2).await.unwrap());
        assert!(!is_admin(&platform, 3).await.unwrap());
        assert!(!is_admin(&platform, 4).await.unwrap());
    }
}
