pub mod clock;
pub mod commands;
pub mod config;
pub mod data;
pub mod discord;
pub mod gate;
pub mod handlers;
pub mod logging;
pub mod messages;
pub mod questions;
pub mod quiz;

pub const BOT_NAME: &str = "gatekeeper";
pub const COMMAND_TARGET: &str = "gatekeeper::command";
pub const ERROR_TARGET: &str = "gatekeeper::error";
pub const EVENT_TARGET: &str = "gatekeeper::handlers";
pub const QUIZ_TARGET: &str = "gatekeeper::quiz";
pub const CONSOLE_TARGET: &str = "gatekeeper";

pub use data::{Data, DataInner};
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
