//! Admission control for the guarded group
//!
//! Inbound events are decoded into `GateEvent`s at the transport boundary
//! and handled one at a time by the `Gatekeeper`, which reaches the chat
//! platform only through the `ChatPlatform` trait.

mod controller;
mod error;
mod event;
mod platform;
mod policy;
mod render;
mod service;
mod timer;

pub use controller::{Admission, Gatekeeper, admission};
pub use error::{GateError, GateResult, PlatformError, PlatformResult};
pub use event::{
    ButtonAction, Chat, CommandInvocation, GateCommand, GateEvent, MessageRef, SystemMessageKind,
    UserRef,
};
pub use platform::{Button, ChatPlatform, Markup, MemberPermissions, MemberRole};
pub use policy::{Target, TargetSource, is_admin, resolve_target};
pub use render::render_current_item;
pub use service::{GateHandle, spawn};
pub use timer::{KickScheduler, ScheduledKick};
