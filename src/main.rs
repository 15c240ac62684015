use std::{env, sync::Arc, time::Duration};

use gatekeeper::config::GateConfig;
use gatekeeper::discord::DiscordPlatform;
use gatekeeper::gate::{self, Gatekeeper};
use gatekeeper::questions::QuestionBank;
use gatekeeper::quiz::QuizStore;
use gatekeeper::{
    BOT_NAME, CONSOLE_TARGET, Data, ERROR_TARGET, Error, commands, handlers, logging,
};
use poise::serenity_prelude::{self as serenity, GatewayIntents, Http};
use tracing::{error, info};

/// Main function to run the bot
async fn async_main() -> Result<(), Error> {
    logging::init()?;

    let token = env::var("DISCORD_TOKEN").map_err(|_| "DISCORD_TOKEN must be set")?;

    let config = GateConfig::from_env().await?;
    let bank = QuestionBank::load(&config.questions_file).await?;
    config.validate(bank.len())?;
    info!(
        target: CONSOLE_TARGET,
        questions = bank.len(),
        per_quiz = config.questions_per_quiz,
        required = config.correct_answers_required,
        "Question bank loaded"
    );
    let config = Arc::new(config);

    let store = QuizStore::connect(&config.database_url).await?;

    // The platform gets its own HTTP client so the gate can run before the
    // gateway connects
    let http = Arc::new(Http::new(&token));
    let platform = DiscordPlatform::new(http, &config)?;

    let gatekeeper = Gatekeeper::new(store, Arc::new(bank), config.clone(), Arc::new(platform));
    let (gate_handle, gate_task) = gate::spawn(
        gatekeeper,
        Duration::from_secs(config.timer_check_interval_secs),
    );

    let data = Data::new(gate_handle.clone(), config.clone());

    let framework_data = data.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(config.command_prefix.clone()),
                ..Default::default()
            },
            pre_command: |ctx| {
                Box::pin(async move {
                    logging::log_command_start(ctx);
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    logging::log_command_end(ctx);
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    logging::log_command_error(&error);
                })
            },
            ..Default::default()
        })
        .setup(move |_ctx, _ready, _framework| {
            Box::pin(async move {
                logging::log_console("Prefix commands ready");
                Ok(framework_data)
            })
        })
        .build();

    let intents = GatewayIntents::non_privileged()
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS;
    let mut client = serenity::ClientBuilder::new(&token, intents)
        .event_handler(handlers::Handler::new(data))
        .framework(framework)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(target: ERROR_TARGET, error = %e, "Failed to listen for ctrl-c");
            return;
        }
        info!(target: CONSOLE_TARGET, "Received ctrl-c, shutting down");
        shard_manager.shutdown_all().await;
    });

    info!(target: CONSOLE_TARGET, bot = BOT_NAME, "Starting bot...");
    if let Err(err) = client.start().await {
        error!(target: ERROR_TARGET, error = %err, "Client stopped with an error");
    }

    // Queued events are handled before the loop stops
    if let Err(e) = gate_handle.shutdown().await {
        error!(target: ERROR_TARGET, error = %e, "Gate stopped before shutdown");
    }
    gate_task.await?;
    info!(target: CONSOLE_TARGET, "Shut down cleanly");

    Ok(())
}

fn main() {
    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(Error::from)
        .and_then(|runtime| runtime.block_on(async_main()));

    if let Err(err) = result {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
