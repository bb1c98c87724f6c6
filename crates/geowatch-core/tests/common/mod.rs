//! Test doubles and common utilities for monitor contract tests
//!
//! Providers answer from canned JSON, notifiers record what they were asked
//! to send, and the memory history store is shared with the test by cloning.

#![allow(dead_code)]

use async_trait::async_trait;
use geowatch_core::config::{HistoryConfig, MonitorConfig};
use geowatch_core::error::{Error, Result};
use geowatch_core::model::{ChangeSet, GeoRecord, ProviderResult};
use geowatch_core::traits::{
    Alert, ChangeEvent, CheckEntry, GeoProvider, HistoryStore, Notifier, RawPayload,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_IP: &str = "190.130.109.115";

/// Turn a `json!` object into a provider payload
pub fn payload(value: Value) -> RawPayload {
    match value {
        Value::Object(map) => map,
        other => panic!("payload must be a JSON object, got {}", other),
    }
}

/// ip-api shaped payload
pub fn ip_api_payload(country: &str, city: &str, lat: f64, lon: f64) -> RawPayload {
    payload(serde_json::json!({
        "status": "success",
        "query": TEST_IP,
        "country": country,
        "regionName": "Buenos Aires",
        "city": city,
        "lat": lat,
        "lon": lon,
        "isp": "Telecom Argentina",
        "as": "AS7303 Telecom Argentina S.A."
    }))
}

/// Monitor config with a memory store and short timeouts
pub fn test_config(interval_secs: u64) -> MonitorConfig {
    let mut config = MonitorConfig::new();
    config.ip = TEST_IP.to_string();
    config.interval_secs = interval_secs;
    config.history = HistoryConfig::Memory;
    config.providers.http_timeout_secs = 1;
    config
}

/// A provider that replays canned payloads, repeating the last one
pub struct ScriptedProvider {
    name: &'static str,
    script: Mutex<VecDeque<Option<RawPayload>>>,
    last: Mutex<Option<RawPayload>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn new(name: &'static str, script: Vec<Option<RawPayload>>) -> Self {
        Self {
            name,
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always answers with the same payload
    pub fn fixed(name: &'static str, payload: RawPayload) -> Self {
        Self::new(name, vec![Some(payload)])
    }

    /// Handle to the call counter
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl GeoProvider for ScriptedProvider {
    async fn fetch(&self, _ip: &str) -> Result<Option<RawPayload>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(next) = next {
            *last = next;
        }
        Ok(last.clone())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// A provider whose every call fails
pub struct FailingProvider {
    name: &'static str,
}

impl FailingProvider {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl GeoProvider for FailingProvider {
    async fn fetch(&self, _ip: &str) -> Result<Option<RawPayload>> {
        Err(Error::provider(self.name, "HTTP 503"))
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// A provider that panics mid-request
pub struct PanickingProvider {
    name: &'static str,
}

impl PanickingProvider {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl GeoProvider for PanickingProvider {
    async fn fetch(&self, ip: &str) -> Result<Option<RawPayload>> {
        tokio::task::yield_now().await;
        panic!("{} choked on {}", self.name, ip);
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// A provider that answers after a delay
pub struct SlowProvider {
    name: &'static str,
    delay: Duration,
    payload: RawPayload,
}

impl SlowProvider {
    pub fn new(name: &'static str, delay: Duration, payload: RawPayload) -> Self {
        Self {
            name,
            delay,
            payload,
        }
    }
}

#[async_trait]
impl GeoProvider for SlowProvider {
    async fn fetch(&self, _ip: &str) -> Result<Option<RawPayload>> {
        tokio::time::sleep(self.delay).await;
        Ok(Some(self.payload.clone()))
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// A notification channel that records alerts
#[derive(Clone)]
pub struct RecordingNotifier {
    channel: &'static str,
    configured: bool,
    fails: bool,
    sent: Arc<Mutex<Vec<Alert>>>,
    attempts: Arc<AtomicUsize>,
}

impl RecordingNotifier {
    pub fn new(channel: &'static str) -> Self {
        Self {
            channel,
            configured: true,
            fails: false,
            sent: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(channel: &'static str) -> Self {
        Self {
            fails: true,
            ..Self::new(channel)
        }
    }

    pub fn unconfigured(channel: &'static str) -> Self {
        Self {
            configured: false,
            ..Self::new(channel)
        }
    }

    /// Alerts accepted by this channel
    pub fn sent(&self) -> Vec<Alert> {
        self.sent.lock().unwrap().clone()
    }

    /// Send attempts, successful or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, alert: &Alert) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fails {
            return Err(Error::notify(self.channel, "connection refused"));
        }
        self.sent.lock().unwrap().push(alert.clone());
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn channel(&self) -> &'static str {
        self.channel
    }
}

/// A history store whose writes always fail
pub struct BrokenHistoryStore {
    pub write_attempts: Arc<AtomicUsize>,
}

impl BrokenHistoryStore {
    pub fn new() -> Self {
        Self {
            write_attempts: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl HistoryStore for BrokenHistoryStore {
    async fn record_check(&self, _ip: &str, _record: &GeoRecord) -> Result<CheckEntry> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::history("disk full"))
    }

    async fn record_event(
        &self,
        _ip: &str,
        _changes: &ChangeSet,
        _raw_results: &[ProviderResult],
    ) -> Result<ChangeEvent> {
        Err(Error::history("disk full"))
    }

    async fn last_check(&self, _ip: &str) -> Result<Option<CheckEntry>> {
        Ok(None)
    }

    async fn recent_checks(&self, _ip: &str, _limit: usize) -> Result<Vec<CheckEntry>> {
        Ok(Vec::new())
    }

    async fn recent_events(&self, _ip: &str, _limit: usize) -> Result<Vec<ChangeEvent>> {
        Ok(Vec::new())
    }
}

/// Box a list of providers for `Monitor::new`
pub fn boxed<P: GeoProvider + 'static>(providers: Vec<P>) -> Vec<Box<dyn GeoProvider>> {
    providers
        .into_iter()
        .map(|p| Box::new(p) as Box<dyn GeoProvider>)
        .collect()
}
