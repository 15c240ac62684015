//! `ChatPlatform` over the Discord HTTP API
//!
//! Restriction is role based: a restricted member carries the configured
//! role, which the guild's channel overwrites keep from speaking.

use crate::config::{ConfigError, GateConfig};
use crate::gate::{
    Chat, ChatPlatform, Markup, MemberPermissions, MemberRole, PlatformError, PlatformResult,
};
use poise::serenity_prelude::{
    self as serenity, ButtonStyle, ChannelId, CreateActionRow, CreateAllowedMentions,
    CreateButton, CreateMessage, EditMessage, GuildId, Http, HttpError, MessageId, Permissions,
    RoleId, UserId,
};
use std::sync::Arc;
use tracing::debug;

/// Discord JSON error code for a user that is not banned
const UNKNOWN_BAN: isize = 10026;
/// Discord JSON error code for a user that is not a member of the guild
const UNKNOWN_MEMBER: isize = 10007;

const RESTRICT_REASON: &str = "Has not passed the entry quiz yet";
const KICK_REASON: &str = "Removed by the gatekeeper";
const BAN_REASON: &str = "Banned by a group admin";

/// The Discord side of the gate
pub struct DiscordPlatform {
    http: Arc<Http>,
    guild_id: GuildId,
    restricted_role: RoleId,
}

impl DiscordPlatform {
    /// Build the platform for the guild named in `config`
    ///
    /// # Errors
    /// Returns `Invalid` if the guild, channel or role id is unset
    pub fn new(http: Arc<Http>, config: &GateConfig) -> Result<Self, ConfigError> {
        for (name, id) in [
            ("group_id", config.group_id),
            ("announce_channel_id", config.announce_channel_id),
            ("restricted_role_id", config.restricted_role_id),
        ] {
            if id == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be set")));
            }
        }

        Ok(Self {
            http,
            guild_id: GuildId::new(config.group_id),
            restricted_role: RoleId::new(config.restricted_role_id),
        })
    }

    fn http(&self) -> &Http {
        &self.http
    }

    async fn channel(&self, chat: Chat) -> PlatformResult<ChannelId> {
        match chat {
            Chat::Channel(id) => Ok(ChannelId::new(id)),
            Chat::Direct(user_id) => {
                let channel = UserId::new(user_id).create_dm_channel(self.http()).await?;
                Ok(channel.id)
            }
        }
    }
}

/// Discord JSON error code of a failed request
fn discord_error_code(error: &serenity::Error) -> Option<isize> {
    match error {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) => {
            Some(response.error.code)
        }
        _ => None,
    }
}

/// Succeed when `result` failed only with the Discord error `code`.
/// Returns whether that error was swallowed.
fn tolerate(result: serenity::Result<()>, code: isize) -> PlatformResult<bool> {
    match result {
        Ok(()) => Ok(false),
        Err(e) if discord_error_code(&e) == Some(code) => Ok(true),
        Err(e) => Err(PlatformError::from(e)),
    }
}

fn action_rows(markup: Option<&Markup>) -> Vec<CreateActionRow> {
    markup.map_or_else(Vec::new, |markup| {
        markup
            .rows
            .iter()
            .map(|row| {
                CreateActionRow::Buttons(
                    row.iter()
                        .map(|button| {
                            CreateButton::new(button.action.to_string())
                                .label(&button.label)
                                .style(ButtonStyle::Secondary)
                        })
                        .collect(),
                )
            })
            .collect()
    })
}

/// Role of a member given whether they own the guild and the permissions
/// of every role they hold, `@everyone` included
fn role_from_permissions(
    is_owner: bool,
    role_permissions: impl IntoIterator<Item = Permissions>,
) -> MemberRole {
    if is_owner {
        MemberRole::Owner
    } else if role_permissions
        .into_iter()
        .any(Permissions::administrator)
    {
        MemberRole::Admin
    } else {
        MemberRole::Member
    }
}

#[async_trait::async_trait]
impl ChatPlatform for DiscordPlatform {
    async fn send_message(
        &self,
        chat: Chat,
        text: &str,
        markup: Option<Markup>,
    ) -> PlatformResult<u64> {
        let channel = self.channel(chat).await?;
        // Text may carry member names; it never pings anyone
        let mut builder = CreateMessage::new()
            .content(text)
            .allowed_mentions(CreateAllowedMentions::new());
        if markup.is_some() {
            builder = builder.components(action_rows(markup.as_ref()));
        }
        let message = channel.send_message(self.http(), builder).await?;
        Ok(message.id.get())
    }

    async fn edit_message(
        &self,
        chat: Chat,
        message_id: u64,
        text: &str,
        markup: Option<Markup>,
    ) -> PlatformResult<()> {
        let channel = self.channel(chat).await?;
        let builder = EditMessage::new()
            .content(text)
            .allowed_mentions(CreateAllowedMentions::new())
            .components(action_rows(markup.as_ref()));
        channel
            .edit_message(self.http(), MessageId::new(message_id), builder)
            .await?;
        Ok(())
    }

    async fn delete_message(&self, chat: Chat, message_id: u64) -> PlatformResult<()> {
        let channel = self.channel(chat).await?;
        channel
            .delete_message(self.http(), MessageId::new(message_id))
            .await?;
        Ok(())
    }

    async fn restrict_member(
        &self,
        user_id: u64,
        permissions: MemberPermissions,
    ) -> PlatformResult<()> {
        let user = UserId::new(user_id);
        match permissions {
            MemberPermissions::Restricted => {
                self.http()
                    .add_member_role(
                        self.guild_id,
                        user,
                        self.restricted_role,
                        Some(RESTRICT_REASON),
                    )
                    .await?;
            }
            MemberPermissions::Full => {
                self.http()
                    .remove_member_role(self.guild_id, user, self.restricted_role, None)
                    .await?;
            }
        }
        Ok(())
    }

    async fn kick_member(&self, user_id: u64) -> PlatformResult<()> {
        let result = self
            .guild_id
            .kick_with_reason(self.http(), UserId::new(user_id), KICK_REASON)
            .await;
        if tolerate(result, UNKNOWN_MEMBER)? {
            debug!(user_id, "User had already left");
        }
        Ok(())
    }

    async fn unban_member(&self, user_id: u64) -> PlatformResult<()> {
        let result = self.guild_id.unban(self.http(), UserId::new(user_id)).await;
        if tolerate(result, UNKNOWN_BAN)? {
            debug!(user_id, "User was not banned");
        }
        Ok(())
    }

    async fn ban_member(&self, user_id: u64) -> PlatformResult<()> {
        self.guild_id
            .ban_with_reason(self.http(), UserId::new(user_id), 0, BAN_REASON)
            .await?;
        Ok(())
    }

    async fn member_role(&self, user_id: u64) -> PlatformResult<MemberRole> {
        let user = UserId::new(user_id);
        let guild = self.guild_id.to_partial_guild(self.http()).await?;
        if guild.owner_id == user {
            return Ok(MemberRole::Owner);
        }

        let member = match guild.member(self.http(), user).await {
            Ok(member) => member,
            Err(e) if discord_error_code(&e) == Some(UNKNOWN_MEMBER) => {
                return Ok(MemberRole::NotMember);
            }
            Err(e) => return Err(PlatformError::from(e)),
        };

        // The @everyone role shares the guild's id
        let everyone = RoleId::new(self.guild_id.get());
        let permissions = member
            .roles
            .iter()
            .chain(std::iter::once(&everyone))
            .filter_map(|role_id| guild.roles.get(role_id))
            .map(|role| role.permissions);
        Ok(role_from_permissions(false, permissions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{Button, ButtonAction};

    fn config() -> GateConfig {
        GateConfig {
            group_id: 1,
            announce_channel_id: 2,
            restricted_role_id: 3,
            ..GateConfig::default()
        }
    }

    #[test]
    fn test_role_from_permissions() {
        assert_eq!(role_from_permissions(true, []), MemberRole::Owner);
        assert_eq!(
            role_from_permissions(
                false,
                [Permissions::SEND_MESSAGES, Permissions::ADMINISTRATOR]
            ),
            MemberRole::Admin
        );
        assert_eq!(
            role_from_permissions(
                false,
                [Permissions::SEND_MESSAGES | Permissions::KICK_MEMBERS]
            ),
            MemberRole::Member
        );
        assert_eq!(role_from_permissions(false, []), MemberRole::Member);
    }

    #[test]
    fn test_ids_must_be_configured() {
        let http = Arc::new(Http::new(""));
        assert!(DiscordPlatform::new(http.clone(), &config()).is_ok());

        let unset = GateConfig {
            restricted_role_id: 0,
            ..config()
        };
        let err = DiscordPlatform::new(http, &unset).err().unwrap();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: restricted_role_id must be set"
        );
    }

    #[test]
    fn test_tolerate_passes_other_errors_through() {
        assert!(!tolerate(Ok(()), UNKNOWN_MEMBER).unwrap());

        let other = serenity::Error::Other("Missing Permissions");
        assert!(discord_error_code(&other).is_none());
        assert!(matches!(
            tolerate(Err(other), UNKNOWN_MEMBER),
            Err(PlatformError::Discord(_))
        ));
    }

    #[test]
    fn test_action_rows_follow_markup() {
        let markup = Markup {
            rows: vec![
                vec![
                    Button::new("0", ButtonAction::Answer(0)),
                    Button::new("1", ButtonAction::Answer(1)),
                ],
                vec![Button::new("<", ButtonAction::Prev)],
            ],
        };
        let rows = action_rows(Some(&markup));
        assert_eq!(rows.len(), 2);
        assert!(action_rows(None).is_empty());
    }
}
