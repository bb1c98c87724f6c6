//! Core monitoring engine
//!
//! The Monitor is responsible for:
//! - Querying every provider concurrently for the tracked IP
//! - Normalizing answers and reconciling them into a consensus record
//! - Diffing the consensus against the baseline
//! - Persisting checks and change events before notifying
//! - Sleeping between cycles with jitter, forever
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  fan-out   ┌─────────────┐
//! │   Monitor    │──────────▶ │ GeoProvider │ × N
//! └──────────────┘            └─────────────┘
//!        │
//!        ├── normalize → consensus → detect_changes
//!        │
//!        ▼
//! ┌──────────────┐           ┌───────────────────┐
//! │ HistoryStore │ ────────▶ │ NotificationChain │
//! │ (write)      │  changed  │ (fallback)        │
//! └──────────────┘           └───────────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Fan out to all providers; drop failures, timeouts and empty answers
//! 2. No answers: skip persistence, retry after a short wait
//! 3. Compute consensus and record a check
//! 4. Diff against the baseline; on change record an event, then notify
//! 5. Adopt the consensus as the new baseline only when it changed

use crate::config::{EngineConfig, MonitorConfig};
use crate::consensus::consensus;
use crate::detect::detect_changes;
use crate::error::{Error, Result};
use crate::model::{ChangeSet, GeoRecord, ProviderResult, TrackedField};
use crate::normalize::normalize;
use crate::notify::{DeliveryReport, NotificationChain};
use crate::traits::{Alert, GeoProvider, HistoryStore, now_timestamp};
use futures::FutureExt;
use rand::Rng;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Events emitted by the Monitor
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// Monitor started
    Started {
        ip: String,
        providers: usize,
        has_baseline: bool,
    },

    /// A provider contributed nothing this cycle
    ProviderDropped { provider: String, reason: String },

    /// No provider answered; the cycle was skipped
    NoData,

    /// A check row was written
    CheckRecorded { check_id: i64 },

    /// The consensus differs from the baseline
    ChangeDetected {
        event_id: i64,
        fields: Vec<TrackedField>,
    },

    /// Result of notifying about a change
    Notified { report: DeliveryReport },

    /// The cycle failed unexpectedly
    CycleFailed { error: String },

    /// Monitor stopped
    Stopped { reason: String },
}

/// Baseline used for change detection
///
/// Owned by the loop and passed through each cycle explicitly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorState {
    /// Last reconciled record, `None` before the first observation
    pub baseline: Option<GeoRecord>,
}

/// What one cycle did
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Every provider was excluded; nothing was persisted
    NoData,

    /// A check was recorded and nothing changed
    Unchanged { check_id: i64 },

    /// A check and an event were recorded and a notification attempted
    Changed {
        check_id: i64,
        event_id: i64,
        changes: ChangeSet,
        delivery: DeliveryReport,
    },
}

/// Core monitoring engine
///
/// ## Lifecycle
///
/// 1. Create with [`Monitor::new()`]
/// 2. Start with [`Monitor::run()`]
/// 3. Monitor runs until a shutdown signal is received between cycles
///
/// ## Cancellation
///
/// Shutdown is only observed while sleeping, so an in-flight cycle always
/// completes, including persistence and notification.
pub struct Monitor {
    /// Monitored IP
    ip: String,

    /// Providers in vote order
    providers: Vec<Box<dyn GeoProvider>>,

    /// Durable history
    history: Box<dyn HistoryStore>,

    /// Notification channels with fallback
    notifier: NotificationChain,

    /// Poll interval
    interval: Duration,

    /// Per-provider request timeout
    provider_timeout: Duration,

    /// Loop timing
    timing: EngineConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<MonitorEvent>,
}

impl Monitor {
    /// Create a new monitor
    ///
    /// # Returns
    ///
    /// A tuple of (monitor, event_receiver) where event_receiver yields monitor events
    pub fn new(
        providers: Vec<Box<dyn GeoProvider>>,
        history: Box<dyn HistoryStore>,
        notifier: NotificationChain,
        config: MonitorConfig,
    ) -> Result<(Self, mpsc::Receiver<MonitorEvent>)> {
        config.validate()?;

        if providers.is_empty() {
            return Err(Error::config("Monitor needs at least one provider"));
        }

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity.max(1));

        let monitor = Self {
            ip: config.ip,
            providers,
            history,
            notifier,
            interval: Duration::from_secs(config.interval_secs),
            provider_timeout: Duration::from_secs(config.providers.http_timeout_secs),
            timing: config.engine,
            event_tx: tx,
        };

        Ok((monitor, rx))
    }

    /// Run the monitor until SIGINT/ctrl-c
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the monitor with a controlled shutdown signal
    ///
    /// Used by embedding applications and tests that need deterministic
    /// shutdown instead of OS signals.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(
        &self,
        mut shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        let mut state = self.hydrate().await?;

        self.emit_event(MonitorEvent::Started {
            ip: self.ip.clone(),
            providers: self.providers.len(),
            has_baseline: state.baseline.is_some(),
        });
        info!(
            "Monitoring {} with {} provider(s), interval {:?}",
            self.ip,
            self.providers.len(),
            self.interval
        );

        loop {
            let delay = match self.run_cycle(state.clone()).await {
                Ok((next, outcome)) => {
                    state = next;
                    self.delay_after(&outcome)
                }
                Err(e) => {
                    error!("[{}] Cycle failed: {}", now_timestamp(), e);
                    self.emit_event(MonitorEvent::CycleFailed {
                        error: e.to_string(),
                    });
                    Duration::from_secs(self.timing.error_backoff_secs)
                }
            };

            debug!("Next check in {:?}", delay);

            let stopped = match shutdown_rx.as_mut() {
                Some(rx) => {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => false,
                        _ = rx => true,
                    }
                }
                None => {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => false,
                        _ = tokio::signal::ctrl_c() => true,
                    }
                }
            };

            if stopped {
                info!("Shutdown signal received");
                self.emit_event(MonitorEvent::Stopped {
                    reason: "Shutdown signal".to_string(),
                });
                return Ok(());
            }
        }
    }

    /// Load the baseline from the most recent check of the monitored IP
    pub async fn hydrate(&self) -> Result<MonitorState> {
        let last = self.history.last_check(&self.ip).await?;
        match &last {
            Some(entry) => info!("Baseline loaded from check #{} ({})", entry.id, entry.timestamp),
            None => info!("No previous check for {}, first cycle will be recorded as a change", self.ip),
        }
        Ok(MonitorState {
            baseline: last.map(|entry| entry.record),
        })
    }

    /// Run one full cycle against the given baseline
    ///
    /// Returns the state for the next cycle with the outcome. The baseline
    /// only moves when a change was detected.
    pub async fn run_cycle(&self, state: MonitorState) -> Result<(MonitorState, CycleOutcome)> {
        let results = self.query_providers().await;

        let records: Vec<GeoRecord> = results.iter().map(|r| r.record.clone()).collect();
        let Some(current) = consensus(&records) else {
            warn!("No provider returned data for {}", self.ip);
            self.emit_event(MonitorEvent::NoData);
            return Ok((state, CycleOutcome::NoData));
        };

        let check = self.history.record_check(&self.ip, &current).await?;
        self.emit_event(MonitorEvent::CheckRecorded { check_id: check.id });

        let changes = detect_changes(state.baseline.as_ref(), &current);
        if changes.is_empty() {
            info!("No change for {} (check #{})", self.ip, check.id);
            return Ok((state, CycleOutcome::Unchanged { check_id: check.id }));
        }

        // Persist before notifying
        let event = self.history.record_event(&self.ip, &changes, &results).await?;
        info!(
            "Change detected for {}: {} field(s), event #{}",
            self.ip,
            changes.len(),
            event.id
        );
        self.emit_event(MonitorEvent::ChangeDetected {
            event_id: event.id,
            fields: changes.fields(),
        });

        let alert = Alert::new(&self.ip, event.timestamp.clone(), changes.clone(), current.clone());
        let delivery = self.notifier.deliver(&alert).await;
        self.emit_event(MonitorEvent::Notified {
            report: delivery.clone(),
        });

        let next = MonitorState {
            baseline: Some(current),
        };

        Ok((
            next,
            CycleOutcome::Changed {
                check_id: check.id,
                event_id: event.id,
                changes,
                delivery,
            },
        ))
    }

    /// Query all providers concurrently
    ///
    /// Every call is bounded by the provider timeout. Failures never cancel
    /// sibling calls; the failing provider is simply left out. A provider
    /// that panics is dropped the same way. Results keep provider order.
    pub async fn query_providers(&self) -> Vec<ProviderResult> {
        let calls = self.providers.iter().map(|provider| async move {
            AssertUnwindSafe(self.query_one(provider.as_ref()))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(Error::provider(provider.name(), "provider panicked")))
        });
        let outcomes = futures::future::join_all(calls).await;

        let mut results = Vec::with_capacity(outcomes.len());
        for (provider, outcome) in self.providers.iter().zip(outcomes) {
            match outcome {
                Ok(Some(record)) => {
                    debug!("Provider {} answered", provider.name());
                    results.push(ProviderResult::new(provider.name(), record));
                }
                Ok(None) => {
                    debug!("Provider {} returned no data", provider.name());
                    self.emit_event(MonitorEvent::ProviderDropped {
                        provider: provider.name().to_string(),
                        reason: "no data".to_string(),
                    });
                }
                Err(e) => {
                    warn!("Provider {} dropped: {}", provider.name(), e);
                    self.emit_event(MonitorEvent::ProviderDropped {
                        provider: provider.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        results
    }

    /// Fetch and normalize one provider's answer
    async fn query_one(&self, provider: &dyn GeoProvider) -> Result<Option<GeoRecord>> {
        let payload = tokio::time::timeout(self.provider_timeout, provider.fetch(&self.ip))
            .await
            .map_err(|_| Error::timeout(provider.name(), self.provider_timeout.as_secs()))??;

        match payload {
            Some(payload) if !payload.is_empty() => normalize(&payload).map(Some),
            _ => Ok(None),
        }
    }

    /// Wait before the next cycle
    fn delay_after(&self, outcome: &CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::NoData => no_data_delay(self.interval, &self.timing),
            _ => jittered_interval(self.interval, &self.timing, &mut rand::rng()),
        }
    }

    /// Emit a monitor event
    fn emit_event(&self, event: MonitorEvent) {
        // Nobody listening is fine; a full channel is worth a warning
        if let Err(mpsc::error::TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

/// Short wait after a cycle without data: `min(no_data_retry, interval)`
pub fn no_data_delay(interval: Duration, timing: &EngineConfig) -> Duration {
    interval.min(Duration::from_secs(timing.no_data_retry_secs))
}

/// Upper bound of the jitter: `min(max_jitter, jitter_ratio × interval)`
pub fn max_jitter(interval: Duration, timing: &EngineConfig) -> Duration {
    let ratio = interval.mul_f64(timing.jitter_ratio.clamp(0.0, 1.0));
    ratio.min(Duration::from_secs(timing.max_jitter_secs))
}

/// Interval plus uniform random jitter in `[0, max_jitter]`
pub fn jittered_interval<R: Rng>(
    interval: Duration,
    timing: &EngineConfig,
    rng: &mut R,
) -> Duration {
    let cap_ms = max_jitter(interval, timing).as_millis() as u64;
    let jitter_ms = if cap_ms == 0 { 0 } else { rng.random_range(0..=cap_ms) };
    interval + Duration::from_millis(jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_no_data_delay_is_capped_by_interval() {
        let timing = EngineConfig::default();
        assert_eq!(no_data_delay(Duration::from_secs(3600), &timing), Duration::from_secs(60));
        assert_eq!(no_data_delay(Duration::from_secs(20), &timing), Duration::from_secs(20));
    }

    #[test]
    fn test_max_jitter_bounds() {
        let timing = EngineConfig::default();
        // 5% of 3600s = 180s, capped at 60s
        assert_eq!(max_jitter(Duration::from_secs(3600), &timing), Duration::from_secs(60));
        // 5% of 600s = 30s
        assert_eq!(max_jitter(Duration::from_secs(600), &timing), Duration::from_secs(30));
    }

    #[test]
    fn test_jittered_interval_stays_in_range() {
        let timing = EngineConfig::default();
        let interval = Duration::from_secs(600);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..200 {
            let delay = jittered_interval(interval, &timing, &mut rng);
            assert!(delay >= interval);
            assert!(delay <= interval + Duration::from_secs(30));
        }
    }

    #[test]
    fn test_zero_jitter_cap() {
        let timing = EngineConfig {
            jitter_ratio: 0.0,
            ..EngineConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let interval = Duration::from_secs(10);
        assert_eq!(jittered_interval(interval, &timing, &mut rng), interval);
    }
}
