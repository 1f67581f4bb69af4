//! Core library for the `weatherwatch` bot.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Upstream adapters (geocoding, weather, air quality) behind traits
//! - On-demand report aggregation with partial-failure tolerance
//! - The persisted watch list and the deduplicating alert monitor
//!
//! It is used by `weatherwatch-cli`, but the chat front-end is replaceable:
//! anything that can route commands and implement [`AlertSink`] will do.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod monitor;
pub mod provider;
pub mod report;
pub mod watchlist;

pub use config::{Config, DestinationConfig, MonitorConfig};
pub use dispatch::{AlertSink, ChannelHandle, WebhookSink};
pub use error::{LookupError, ReportError};
pub use model::{
    AirQualitySummary, CurrentConditions, HistoricalSample, Report, ResolvedLocation, WeatherCode,
};
pub use monitor::{AlertMonitor, AlertState, LocationOutcome, MonitorSettings};
pub use provider::{AirQualitySource, GeoResolver, Sources, WeatherSource, classify_aqi};
pub use report::Aggregator;
pub use watchlist::{JsonFileStore, SharedWatchList, WatchChange, WatchList, WatchListStore};
