//! Where alerts go: destinations (chat servers) containing named channels.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::{fmt::Debug, time::Duration};
use tracing::debug;

use crate::{config::DestinationConfig, provider::{http_client, truncate_body}};

/// Opaque handle to a channel returned by [`AlertSink::find_channel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHandle {
    pub destination: String,
    pub name: String,
    pub target: String,
}

#[async_trait]
pub trait AlertSink: Send + Sync + Debug {
    /// Every destination the bot participates in.
    fn destinations(&self) -> Vec<String>;

    /// Look up a channel by name inside one destination.
    fn find_channel(&self, destination: &str, channel: &str) -> Option<ChannelHandle>;

    async fn send(&self, channel: &ChannelHandle, message: &str) -> Result<()>;
}

/// Posts alerts to incoming webhooks (Discord-compatible `{"content": ...}`).
#[derive(Debug, Clone)]
pub struct WebhookSink {
    destinations: Vec<DestinationConfig>,
    http: Client,
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

impl WebhookSink {
    pub fn new(destinations: Vec<DestinationConfig>, timeout: Duration) -> Result<Self> {
        Ok(Self { destinations, http: http_client(timeout)? })
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    fn destinations(&self) -> Vec<String> {
        self.destinations.iter().map(|d| d.name.clone()).collect()
    }

    fn find_channel(&self, destination: &str, channel: &str) -> Option<ChannelHandle> {
        let dest = self.destinations.iter().find(|d| d.name == destination)?;
        let url = dest.channels.get(channel)?;

        Some(ChannelHandle {
            destination: dest.name.clone(),
            name: channel.to_string(),
            target: url.clone(),
        })
    }

    async fn send(&self, channel: &ChannelHandle, message: &str) -> Result<()> {
        let res = self
            .http
            .post(&channel.target)
            .json(&WebhookPayload { content: message })
            .send()
            .await
            .with_context(|| {
                format!("Failed to post to #{} in {}", channel.name, channel.destination)
            })?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Webhook for #{} in {} returned status {}: {}",
                channel.name,
                channel.destination,
                status,
                truncate_body(&body),
            ));
        }

        debug!("Delivered alert to #{} in {}", channel.name, channel.destination);
        Ok(())
    }
}
