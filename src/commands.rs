use crate::gate::{CommandInvocation, GateCommand, GateEvent, UserRef};
use crate::handlers::chat_for;
use crate::{COMMAND_TARGET, Data, Error};
use poise::{Context, command};
use tracing::debug;

/// Turn a command message into a `CommandInvocation` and queue it for the gate
async fn submit(
    ctx: Context<'_, Data, Error>,
    command: GateCommand,
    args: Option<String>,
) -> Result<(), Error> {
    let data = ctx.data();
    if !data.is_guarded(ctx.guild_id()) {
        debug!(
            target: COMMAND_TARGET,
            command = %command,
            "Ignoring command from an unguarded guild"
        );
        return Ok(());
    }

    let author = ctx.author();
    let (mentions, reply_to) = match ctx {
        Context::Prefix(prefix) => {
            let bot_id = ctx.framework().bot_id;
            let mentions = prefix
                .msg
                .mentions
                .iter()
                .filter(|user| user.id != bot_id)
                .map(|user| UserRef::new(user.id.get(), user.display_name()))
                .collect();
            let reply_to = prefix
                .msg
                .referenced_message
                .as_ref()
                .map(|message| {
                    UserRef::new(message.author.id.get(), message.author.display_name())
                });
            (mentions, reply_to)
        }
        Context::Application(_) => (Vec::new(), None),
    };

    let invocation = CommandInvocation {
        command,
        args: args.unwrap_or_default(),
        sender: UserRef::new(author.id.get(), author.display_name()),
        chat: chat_for(ctx.guild_id(), ctx.channel_id(), author.id),
        message_id: ctx.id(),
        mentions,
        reply_to,
    };
    data.gate.send(GateEvent::Command(invocation)).await?;
    Ok(())
}

/// Get the entry quiz. Only answered in a private chat.
#[command(prefix_command)]
pub async fn start(
    ctx: Context<'_, Data, Error>,
    #[rest] args: Option<String>,
) -> Result<(), Error> {
    submit(ctx, GateCommand::Start, args).await
}

/// Remove a member, who may come back and take the quiz again. Admins only.
#[command(prefix_command)]
pub async fn kick(
    ctx: Context<'_, Data, Error>,
    #[rest] args: Option<String>,
) -> Result<(), Error> {
    submit(ctx, GateCommand::Kick, args).await
}

/// Leave the group and forget your quiz
#[command(prefix_command)]
pub async fn kickme(
    ctx: Context<'_, Data, Error>,
    #[rest] args: Option<String>,
) -> Result<(), Error> {
    submit(ctx, GateCommand::KickMe, args).await
}

/// Remove a member for good. Admins only.
#[command(prefix_command)]
pub async fn ban(
    ctx: Context<'_, Data, Error>,
    #[rest] args: Option<String>,
) -> Result<(), Error> {
    submit(ctx, GateCommand::Ban, args).await
}

/// Every command the bot registers
#[must_use]
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![start(), kick(), kickme(), ban()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_names_match_gate_commands() {
        for cmd in all() {
            assert!(
                !matches!(GateCommand::parse(&cmd.name), GateCommand::Unknown(_)),
                "{}",
                cmd.name
            );
        }
    }

    #[test]
    fn test_commands_are_prefix_only() {
        for cmd in all() {
            assert!(cmd.prefix_action.is_some(), "{}", cmd.name);
            assert!(cmd.slash_action.is_none(), "{}", cmd.name);
            assert!(!cmd.guild_only, "{}", cmd.name);
        }
    }

    #[test]
    fn test_kick_command_definition() {
        let cmd = kick();
        assert_eq!(cmd.name, "kick");
        assert!(
            cmd.description
                .unwrap_or_default()
                .contains("Admins only")
        );
        assert_eq!(cmd.parameters.len(), 1);
    }
}
