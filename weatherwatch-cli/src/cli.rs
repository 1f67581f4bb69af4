use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Password, Text};
use std::{future::Future, sync::Arc};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    sync::watch,
    task::JoinSet,
};
use tracing::{info, warn};
use weatherwatch_core::{
    AlertMonitor, Aggregator, Config, JsonFileStore, MonitorSettings, SharedWatchList, WatchList,
    WebhookSink, provider::sources_from_config,
};

use crate::chat::{self, Bot, ChatCommand};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherwatch", version, about = "Weather reports and severe-weather alerts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively set the air-quality token, default city and alert webhook.
    Configure,

    /// Show current weather, last year's comparison and air quality.
    Report {
        /// Place name, e.g. "Prague".
        place: String,
    },

    /// Show the air-quality index only.
    Aqi {
        /// Place name; the configured default city if absent.
        place: Option<String>,
    },

    /// Manage the list of places checked for severe weather.
    Watch {
        #[command(subcommand)]
        action: WatchAction,
    },

    /// Run the chat console with the alert monitor in the background.
    Serve,
}

#[derive(Debug, Subcommand)]
pub enum WatchAction {
    Add { place: String },
    Remove { place: String },
    List,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let cmd = match self.command {
            Command::Configure => return configure(),
            Command::Serve => return serve(Config::load()?).await,
            Command::Report { place } => ChatCommand::Weather(place),
            Command::Aqi { place } => ChatCommand::Aqi(place),
            Command::Watch { action: WatchAction::Add { place } } => ChatCommand::Add(place),
            Command::Watch { action: WatchAction::Remove { place } } => ChatCommand::Remove(place),
            Command::Watch { action: WatchAction::List } => ChatCommand::List,
        };

        let config = Config::load()?;
        let bot = Bot::new(
            Aggregator::new(sources_from_config(&config)?),
            open_watch_list(&config)?,
            config.default_city.clone(),
        );

        println!("{}", bot.handle(cmd).await);
        Ok(())
    }
}

fn open_watch_list(config: &Config) -> anyhow::Result<SharedWatchList> {
    let store = JsonFileStore::new(config.watch_list_file_path()?);
    let list = WatchList::load(Box::new(store), &config.default_city)
        .context("Failed to open the watch list")?;
    Ok(list.into_shared())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let sources = sources_from_config(&config)?;
    let watch_list = open_watch_list(&config)?;
    if config.destinations.is_empty() {
        warn!("No alert destinations configured; severe weather will only be logged");
    }
    let sink = Arc::new(WebhookSink::new(config.destinations.clone(), config.http.timeout())?);

    let monitor = AlertMonitor::new(
        sources.geo.clone(),
        sources.weather.clone(),
        sink,
        watch_list.clone(),
        MonitorSettings::from(&config.monitor),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor_handle = tokio::spawn(monitor.run(shutdown_rx));

    let bot = Arc::new(Bot::new(Aggregator::new(sources), watch_list, config.default_city.clone()));
    info!("Listening for commands on stdin. Type {}help, Ctrl+C to stop.", chat::PREFIX);

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let result = console_loop(BufReader::new(tokio::io::stdin()), bot, ctrl_c, |text| {
        println!("{text}");
    })
    .await;

    let _ = shutdown_tx.send(true);
    monitor_handle.await.context("Alert monitor task failed")?;
    result
}

/// Feed chat commands from `input` to `bot` until EOF or `stop` resolves.
/// Each command is handled on its own task; replies still in flight are
/// awaited before returning.
async fn console_loop<R, F>(
    input: R,
    bot: Arc<Bot>,
    stop: impl Future<Output = ()>,
    reply: F,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    F: Fn(String) + Clone + Send + Sync + 'static,
{
    let mut lines = input.lines();
    let mut handlers = JoinSet::new();
    tokio::pin!(stop);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read commands")? else {
                    break;
                };
                let Some(cmd) = chat::parse(&line) else {
                    continue;
                };
                let (bot, reply) = (bot.clone(), reply.clone());
                handlers.spawn(async move { reply(bot.handle(cmd).await) });
            }
            Some(done) = handlers.join_next(), if !handlers.is_empty() => {
                if let Err(e) = done {
                    warn!("Command handler failed: {}", e);
                }
            }
            _ = &mut stop => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    if !handlers.is_empty() {
        info!("Waiting for {} command(s) to finish", handlers.len());
    }
    while let Some(done) = handlers.join_next().await {
        if let Err(e) = done {
            warn!("Command handler failed: {}", e);
        }
    }
    Ok(())
}

fn configure() -> anyhow::Result<()> {
    let mut cfg = Config::load_file()?;

    let token = Password::new("WAQI API token (empty to keep current):")
        .without_confirmation()
        .prompt()?;
    if !token.trim().is_empty() {
        cfg.set_aqi_token(token.trim().to_string());
    }

    cfg.default_city = Text::new("Default city:").with_default(&cfg.default_city).prompt()?;

    let channel = cfg.monitor.alert_channel.clone();
    let webhook = Text::new(&format!("Webhook URL for #{channel} (empty to skip):")).prompt()?;
    if !webhook.trim().is_empty() {
        let destination = Text::new("Destination name:").with_default("default").prompt()?;
        cfg.upsert_destination_channel(&destination, &channel, webhook.trim().to_string());
    }

    cfg.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}
