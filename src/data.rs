use std::{ops::Deref, sync::Arc};

use crate::config::GateConfig;
use crate::gate::GateHandle;
use poise::serenity_prelude::GuildId;

/// State shared by the commands and the event handler
#[derive(Debug)]
pub struct DataInner {
    /// Sending side of the gate event loop
    pub gate: GateHandle,
    pub config: Arc<GateConfig>,
}

/// Centralized data structure for the bot
#[derive(Debug, Clone)]
pub struct Data(pub Arc<DataInner>);

impl Deref for Data {
    type Target = DataInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Data {
    #[must_use]
    pub fn new(gate: GateHandle, config: Arc<GateConfig>) -> Self {
        Self(Arc::new(DataInner { gate, config }))
    }

    /// Whether `guild_id` is the guarded group. Events without a guild
    /// (direct messages) always belong to the gate.
    #[must_use]
    pub fn is_guarded(&self, guild_id: Option<GuildId>) -> bool {
        guild_id.is_none_or(|id| id.get() == self.config.group_id)
    }
}
