use crate::{COMMAND_TARGET, CONSOLE_TARGET, Data, ERROR_TARGET, Error, QUIZ_TARGET};
use dashmap::DashMap;
use poise::{Context, FrameworkError};
use std::sync::LazyLock;
use std::time::Instant;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::{LevelFilter, Targets},
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log directory name
pub const LOG_DIR: &str = "logs";
/// Everything the bot logs, as JSON
pub const GATEKEEPER_LOG_FILE: &str = "gatekeeper";
/// Admission decisions and quiz progress only
pub const QUIZ_LOG_FILE: &str = "quiz";

/// Start times of running commands, keyed by invocation id
static COMMAND_STARTS: LazyLock<DashMap<u64, Instant>> = LazyLock::new(DashMap::new);

/// Install the console, main file and quiz file loggers
///
/// # Errors
/// Returns an error if the log directory can't be created or a logger is
/// already installed
pub fn init() -> Result<(), Error> {
    std::fs::create_dir_all(LOG_DIR)?;

    let main_file = RollingFileAppender::new(Rotation::DAILY, LOG_DIR, GATEKEEPER_LOG_FILE);
    let quiz_file = RollingFileAppender::new(Rotation::DAILY, LOG_DIR, QUIZ_LOG_FILE);

    let console_layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_ansi(true);

    let main_layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_ansi(false)
        .json()
        .with_writer(main_file);

    let quiz_layer = fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .json()
        .with_writer(quiz_file)
        .with_filter(Targets::new().with_target(QUIZ_TARGET, LevelFilter::DEBUG));

    // RUST_LOG wins; serenity's heartbeat chatter is dropped otherwise
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("info").add_directive("serenity=error".parse()?),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(main_layer)
        .with(quiz_layer)
        .try_init()?;

    info!(target: CONSOLE_TARGET, "Logging system initialized");
    Ok(())
}

fn guild_label(ctx: Context<'_, Data, Error>) -> String {
    ctx.guild_id()
        .map_or_else(|| "DM".to_string(), |id| id.get().to_string())
}

/// `pre_command` hook
pub fn log_command_start(ctx: Context<'_, Data, Error>) {
    COMMAND_STARTS.insert(ctx.id(), Instant::now());

    info!(
        target: COMMAND_TARGET,
        command = %ctx.command().qualified_name,
        guild_id = %guild_label(ctx),
        user_id = ctx.author().id.get(),
        invocation = %ctx.invocation_string(),
        event = "start",
        "Command started"
    );
}

/// `post_command` hook; logs how long the command took
pub fn log_command_end(ctx: Context<'_, Data, Error>) {
    let duration = COMMAND_STARTS
        .remove(&ctx.id())
        .map(|(_, start)| start.elapsed());
    let duration_ms = u64::try_from(duration.map_or(0, |d| d.as_millis())).unwrap_or_default();

    info!(
        target: COMMAND_TARGET,
        command = %ctx.command().qualified_name,
        guild_id = %guild_label(ctx),
        user_id = ctx.author().id.get(),
        duration_ms,
        event = "end",
        "Command finished"
    );
}

/// `on_error` hook
pub fn log_command_error(error: &FrameworkError<'_, Data, Error>) {
    match error {
        FrameworkError::Command { error, ctx, .. } => {
            COMMAND_STARTS.remove(&ctx.id());
            error!(
                target: ERROR_TARGET,
                command = %ctx.command().qualified_name,
                guild_id = %guild_label(*ctx),
                user_id = ctx.author().id.get(),
                error = %error,
                "Command error"
            );
        }
        FrameworkError::ArgumentParse { error, input, ctx, .. } => {
            error!(
                target: ERROR_TARGET,
                command = %ctx.command().qualified_name,
                user_id = ctx.author().id.get(),
                input = ?input,
                error = %error,
                "Command arguments could not be parsed"
            );
        }
        // Any other prefix in the group is ordinary chat
        FrameworkError::UnknownCommand { .. } => {}
        err => {
            error!(
                target: ERROR_TARGET,
                error = %err,
                "Other framework error"
            );
        }
    }
}

pub fn log_console(message: &str) {
    info!(
        target: CONSOLE_TARGET,
        message = %message,
        event = "console",
    );
}
