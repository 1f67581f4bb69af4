//! Command routing for the chat console.
//!
//! Every handler answers with display text; errors are logged and turned
//! into a short apology rather than surfaced.

use anyhow::Context;
use tracing::error;
use weatherwatch_core::{Aggregator, SharedWatchList, WatchChange, WatchList};

use crate::render;

pub const PREFIX: char = '!';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Weather(String),
    Aqi(Option<String>),
    Add(String),
    Remove(String),
    List,
    Help,
    Unknown(String),
}

/// Parse a chat line. Lines without the command prefix are not for us.
pub fn parse(line: &str) -> Option<ChatCommand> {
    let rest = line.trim().strip_prefix(PREFIX)?;
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let cmd = match name.to_lowercase().as_str() {
        "weather" | "w" => ChatCommand::Weather(arg.to_string()),
        "aqi" => ChatCommand::Aqi((!arg.is_empty()).then(|| arg.to_string())),
        "add" | "watch" => ChatCommand::Add(arg.to_string()),
        "remove" | "unwatch" => ChatCommand::Remove(arg.to_string()),
        "list" | "watchlist" => ChatCommand::List,
        "help" => ChatCommand::Help,
        other => ChatCommand::Unknown(other.to_string()),
    };
    Some(cmd)
}

#[derive(Debug)]
pub struct Bot {
    aggregator: Aggregator,
    watch_list: SharedWatchList,
    default_city: String,
}

impl Bot {
    pub fn new(aggregator: Aggregator, watch_list: SharedWatchList, default_city: String) -> Self {
        Self { aggregator, watch_list, default_city }
    }

    pub async fn handle(&self, cmd: ChatCommand) -> String {
        match cmd {
            ChatCommand::Weather(place) if place.trim().is_empty() => "Usage: !weather <place>".to_string(),
            ChatCommand::Weather(place) => match self.aggregator.full_report(&place).await {
                Ok(report) => render::report(&report),
                Err(e) => format!("❌ {e}"),
            },
            ChatCommand::Aqi(place) => {
                let place = place.unwrap_or_else(|| self.default_city.clone());
                let summary = self.aggregator.air_quality(&place).await;
                render::air_quality(&place, &summary)
            }
            ChatCommand::Add(place) if place.trim().is_empty() => "Usage: !add <place>".to_string(),
            ChatCommand::Add(place) => self.update_watch_list(place, WatchList::add).await,
            ChatCommand::Remove(place) if place.trim().is_empty() => {
                "Usage: !remove <place>".to_string()
            }
            ChatCommand::Remove(place) => self.update_watch_list(place, WatchList::remove).await,
            ChatCommand::List => render::watch_list(self.watch_list.read().await.names()),
            ChatCommand::Help => render::HELP.to_string(),
            ChatCommand::Unknown(name) => {
                format!("Unknown command '{PREFIX}{name}'. Try {PREFIX}help.")
            }
        }
    }

    /// The store does blocking file IO, so the mutation runs off the async
    /// workers while holding the write lock.
    async fn update_watch_list(
        &self,
        place: String,
        op: fn(&mut WatchList, &str) -> anyhow::Result<WatchChange>,
    ) -> String {
        let mut list = self.watch_list.clone().write_owned().await;
        let result = tokio::task::spawn_blocking(move || op(&mut list, &place))
            .await
            .context("Watch list task failed")
            .and_then(|r| r);
        self.watch_reply(result)
    }

    fn watch_reply(&self, result: anyhow::Result<WatchChange>) -> String {
        match result {
            Ok(change) => render::watch_change(&change),
            Err(e) => {
                error!("Watch list update failed: {:#}", e);
                "❌ Could not update the watch list, please try again later.".to_string()
            }
        }
    }
}
