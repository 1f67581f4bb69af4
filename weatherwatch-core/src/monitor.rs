//! Periodic severe-weather check over the watch list.
//!
//! One tick walks the whole list. For each place the current weather code is
//! compared with the last code seen for it; only a change into the severe set
//! produces an alert, so a storm that lasts several ticks is announced once.

use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    time::{MissedTickBehavior, interval, sleep},
};
use tracing::{debug, info, warn};

use crate::{
    config::MonitorConfig,
    dispatch::AlertSink,
    model::{CurrentConditions, WeatherCode},
    provider::{GeoResolver, WeatherSource},
    watchlist::SharedWatchList,
};

/// Last weather code evaluated per location. Lives only as long as the process.
#[derive(Debug, Default, Clone)]
pub struct AlertState {
    last_seen: HashMap<String, WeatherCode>,
}

impl AlertState {
    pub fn get(&self, location: &str) -> Option<WeatherCode> {
        self.last_seen.get(location).copied()
    }

    pub fn record(&mut self, location: &str, code: WeatherCode) {
        self.last_seen.insert(location.to_string(), code);
    }

    /// Forget locations that are no longer watched.
    pub fn retain_only(&mut self, watched: &[String]) {
        self.last_seen.retain(|name, _| watched.contains(name));
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }
}

/// What happened to one location during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationOutcome {
    /// Resolving or fetching failed; state untouched.
    Skipped,
    /// Same code as last time.
    Unchanged,
    /// New code recorded, not severe.
    Recorded(WeatherCode),
    /// New severe code; `delivered` counts channels the warning reached.
    Alerted { code: WeatherCode, delivered: usize },
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub pacing: Duration,
    pub alert_channel: String,
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(cfg: &MonitorConfig) -> Self {
        Self {
            interval: Duration::from_secs(cfg.interval_secs.max(1)),
            pacing: Duration::from_secs(cfg.pacing_secs),
            alert_channel: cfg.alert_channel.clone(),
        }
    }
}

#[derive(Debug)]
pub struct AlertMonitor {
    geo: Arc<dyn GeoResolver>,
    weather: Arc<dyn WeatherSource>,
    sink: Arc<dyn AlertSink>,
    watch_list: SharedWatchList,
    settings: MonitorSettings,
    state: AlertState,
}

impl AlertMonitor {
    pub fn new(
        geo: Arc<dyn GeoResolver>,
        weather: Arc<dyn WeatherSource>,
        sink: Arc<dyn AlertSink>,
        watch_list: SharedWatchList,
        settings: MonitorSettings,
    ) -> Self {
        Self { geo, weather, sink, watch_list, settings, state: AlertState::default() }
    }

    /// Start from a known state instead of an empty one.
    pub fn with_state(mut self, state: AlertState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    /// Run ticks every `interval` until `shutdown` flips to `true` or its
    /// sender is dropped. A tick is awaited before the next one is scheduled,
    /// so ticks never overlap; a tick that overruns the period delays the next
    /// one instead of queueing a burst.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Alert monitor started (every {:?}, channel #{})",
            self.settings.interval, self.settings.alert_channel
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stopped(&mut shutdown) => break,
            }

            if !self.tick(&mut shutdown).await {
                break;
            }
        }

        info!("Alert monitor stopped");
    }

    /// One pass over the watch list. Returns `false` if interrupted by
    /// shutdown during a pacing delay.
    pub async fn tick(&mut self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let names = self.watch_list.read().await.names().to_vec();
        self.state.retain_only(&names);
        debug!("Monitor tick over {} location(s)", names.len());

        for name in &names {
            let outcome = self.check_location(name).await;
            debug!("{}: {:?}", name, outcome);

            if self.settings.pacing.is_zero() {
                continue;
            }
            tokio::select! {
                _ = sleep(self.settings.pacing) => {}
                _ = stopped(shutdown) => return false,
            }
        }

        true
    }

    /// Evaluate a single location and dispatch an alert if warranted.
    pub async fn check_location(&mut self, name: &str) -> LocationOutcome {
        let Some(current) = self.fetch_current(name).await else {
            return LocationOutcome::Skipped;
        };

        let code = current.weather_code;
        if self.state.get(name) == Some(code) {
            return LocationOutcome::Unchanged;
        }

        self.state.record(name, code);

        if !code.is_severe() {
            return LocationOutcome::Recorded(code);
        }

        let delivered = self.dispatch(name, &current).await;
        LocationOutcome::Alerted { code, delivered }
    }

    async fn fetch_current(&self, name: &str) -> Option<CurrentConditions> {
        let location = self.geo.resolve(name).await.ok()?;
        self.weather.fetch_current(location.latitude, location.longitude).await.ok()
    }

    async fn dispatch(&self, name: &str, current: &CurrentConditions) -> usize {
        let message = alert_message(name, current);
        let mut delivered = 0;

        for destination in self.sink.destinations() {
            let Some(channel) = self.sink.find_channel(&destination, &self.settings.alert_channel)
            else {
                continue;
            };

            match self.sink.send(&channel, &message).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Failed to deliver alert for {} to {}: {:#}", name, destination, e),
            }
        }

        info!(
            "Severe weather in {} (code {}), alert delivered to {} channel(s)",
            name, current.weather_code, delivered
        );
        delivered
    }
}

/// Plain-text warning posted to alert channels.
pub fn alert_message(location: &str, current: &CurrentConditions) -> String {
    format!(
        "⚠️ Severe weather warning for {}: {}. Temperature {:.1} °C.",
        location,
        current.weather_code.severity_label(),
        current.temperature_c
    )
}

/// Resolves once shutdown is requested or the sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    if *shutdown.borrow() {
        return;
    }
    while shutdown.changed().await.is_ok() {
        if *shutdown.borrow() {
            return;
        }
    }
}
