//! Gateway events in, `GateEvent`s out
//!
//! Nothing here touches quiz state. Each callback decodes what it received
//! and queues it for the gate event loop.

use crate::gate::{ButtonAction, Chat, GateEvent, MessageRef, SystemMessageKind, UserRef};
use crate::{Data, ERROR_TARGET, EVENT_TARGET};
use poise::serenity_prelude::{
    self as serenity, ChannelId, Context, CreateInteractionResponse, EventHandler, GuildId,
    Interaction, Member, Message, MessageType, Ready, User, UserId,
};
use tracing::{debug, error, info};

pub struct Handler {
    data: Data,
}

impl Handler {
    #[must_use]
    pub fn new(data: Data) -> Self {
        Self { data }
    }

    async fn forward(&self, event: GateEvent) {
        let kind = event.kind();
        debug!(target: EVENT_TARGET, event = kind, "Forwarding gateway event");
        if let Err(e) = self.data.gate.send(event).await {
            error!(target: ERROR_TARGET, event = kind, error = %e, "Failed to queue gate event");
        }
    }
}

/// Where a message or button lives: a group channel, or the private chat
/// with `user_id` when there is no guild
pub(crate) fn chat_for(
    guild_id: Option<GuildId>,
    channel_id: ChannelId,
    user_id: UserId,
) -> Chat {
    match guild_id {
        Some(_) => Chat::Channel(channel_id.get()),
        None => Chat::Direct(user_id.get()),
    }
}

/// Membership announcements the gate cares about
fn system_message_kind(kind: MessageType) -> Option<SystemMessageKind> {
    match kind {
        MessageType::MemberJoin => Some(SystemMessageKind::Join),
        _ => None,
    }
}

fn user_ref(user: &User) -> UserRef {
    UserRef::new(user.id.get(), user.display_name())
}

#[serenity::async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        let user_name = ready.user.name.clone();
        let shard_id = ctx.shard_id;
        info!(
            target: EVENT_TARGET,
            group_id = self.data.config.group_id,
            "Connected as {user_name}, shard {shard_id}"
        );
    }

    async fn guild_member_addition(&self, _ctx: Context, new_member: Member) {
        if !self.data.is_guarded(Some(new_member.guild_id)) {
            return;
        }
        info!(
            target: EVENT_TARGET,
            user_id = new_member.user.id.get(),
            is_bot = new_member.user.bot,
            "Member joined"
        );
        self.forward(GateEvent::MemberJoined {
            user: UserRef::new(new_member.user.id.get(), new_member.display_name()),
            is_bot: new_member.user.bot,
            // Discord announces joins with a separate system message
            announcement: None,
        })
        .await;
    }

    async fn guild_member_removal(
        &self,
        _ctx: Context,
        guild_id: GuildId,
        user: User,
        _member: Option<Member>,
    ) {
        if !self.data.is_guarded(Some(guild_id)) {
            return;
        }
        self.forward(GateEvent::MemberLeft {
            user: user_ref(&user),
            announcement: None,
        })
        .await;
    }

    async fn message(&self, _ctx: Context, message: Message) {
        let Some(guild_id) = message.guild_id else {
            return;
        };
        if !self.data.is_guarded(Some(guild_id)) {
            return;
        }
        let Some(kind) = system_message_kind(message.kind) else {
            return;
        };
        self.forward(GateEvent::SystemMessage {
            message: MessageRef {
                chat: Chat::Channel(message.channel_id.get()),
                id: message.id.get(),
            },
            kind,
        })
        .await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Component(component) = interaction else {
            return;
        };
        if !self.data.is_guarded(component.guild_id) {
            return;
        }

        // Discord shows the press as failed unless it is answered in time
        if let Err(e) = component
            .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
            .await
        {
            error!(
                target: ERROR_TARGET,
                user_id = component.user.id.get(),
                error = %e,
                "Failed to acknowledge button press"
            );
        }

        self.forward(GateEvent::ButtonPress {
            action: ButtonAction::parse(&component.data.custom_id),
            user: user_ref(&component.user),
            chat: chat_for(component.guild_id, component.channel_id, component.user.id),
            message_id: component.message.id.get(),
        })
        .await;
    }
}
