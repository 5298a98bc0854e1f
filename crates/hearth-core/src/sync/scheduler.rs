//! Keeps the semantic index eventually consistent with the structural
//! index.
//!
//! Identity-level mutations (add/remove, or name/room/platform/capability
//! changes) are re-indexed synchronously by the ingest task; state-only
//! mutations are enqueued here and flushed as a batch on a timer or when
//! the queue grows past a threshold. No lock ever spans both indexes;
//! cross-index consistency is intentionally eventual, bounded by the
//! flush interval, and that bound is part of the contract.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tracing::{debug, info, warn};

use crate::config::{PatternConfig, SyncConfig};
use crate::error::HearthResult;
use crate::index::StructuralIndex;
use crate::patterns::detect;
use crate::semantic::SemanticIndex;
use crate::traits::EventSource;
use crate::types::{Device, DeviceId, IssuePattern};

/// How a structural mutation propagates to the semantic index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncClass {
    /// Re-index synchronously: the mutation changed what the device *is*.
    Immediate,
    /// Enqueue for the next batched flush: only the state snapshot moved.
    Deferred,
}

/// Classify a structural mutation by comparing the previous record.
///
/// New devices and identity changes are immediate; a pure state change
/// (switch flipped, battery drained, connectivity blip) is deferred.
pub fn classify(previous: Option<&Device>, current: &Device) -> SyncClass {
    match previous {
        None => SyncClass::Immediate,
        Some(prev) if prev.identity_differs(current) => SyncClass::Immediate,
        Some(_) => SyncClass::Deferred,
    }
}

/// Observable scheduler state.
///
/// Idle → Queuing (on a deferred mutation) → Flushing (timer or size
/// trigger) → Idle. Mutations arriving during a flush land in the next
/// cycle; enqueue never blocks the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SyncState {
    Idle = 0,
    Queuing = 1,
    Flushing = 2,
}

impl SyncState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => SyncState::Queuing,
            2 => SyncState::Flushing,
            _ => SyncState::Idle,
        }
    }
}

/// Background synchronizer between the two indexes.
pub struct SyncScheduler {
    structural: Arc<StructuralIndex>,
    semantic: Arc<SemanticIndex>,
    events: Arc<dyn EventSource>,
    pending: Mutex<BTreeSet<DeviceId>>,
    state: AtomicU8,
    flush_notify: Notify,
    config: SyncConfig,
    pattern_config: PatternConfig,
    /// Event lookback used by the pattern-document sweep.
    event_window: chrono::Duration,
}

impl SyncScheduler {
    pub fn new(
        structural: Arc<StructuralIndex>,
        semantic: Arc<SemanticIndex>,
        events: Arc<dyn EventSource>,
        config: SyncConfig,
        pattern_config: PatternConfig,
        event_window: chrono::Duration,
    ) -> Self {
        Self {
            structural,
            semantic,
            events,
            pending: Mutex::new(BTreeSet::new()),
            state: AtomicU8::new(SyncState::Idle as u8),
            flush_notify: Notify::new(),
            config,
            pattern_config,
            event_window,
        }
    }

    /// Current state machine position.
    pub fn state(&self) -> SyncState {
        SyncState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Number of device ids awaiting the next flush.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Enqueue a device for deferred re-indexing. Fire-and-forget: never
    /// blocks beyond the queue mutex, never fails.
    pub fn enqueue(&self, id: DeviceId) {
        let over_threshold = {
            let Ok(mut pending) = self.pending.lock() else {
                warn!("sync pending queue poisoned; dropping enqueue");
                return;
            };
            pending.insert(id);
            pending.len() >= self.config.flush_threshold
        };
        // Idle → Queuing; leave Flushing alone (those ids join the next cycle).
        let _ = self.state.compare_exchange(
            SyncState::Idle as u8,
            SyncState::Queuing as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if over_threshold {
            self.flush_notify.notify_one();
        }
    }

    /// Drain the pending set and re-embed the batch.
    ///
    /// Devices that disappeared since enqueue have their semantic
    /// documents removed instead. On backend failure the batch is
    /// re-queued for the next cycle. Returns how many documents were
    /// re-embedded.
    pub async fn flush(&self) -> usize {
        let drained: BTreeSet<DeviceId> = {
            let Ok(mut pending) = self.pending.lock() else {
                return 0;
            };
            std::mem::take(&mut *pending)
        };
        if drained.is_empty() {
            self.settle_state();
            return 0;
        }
        self.state.store(SyncState::Flushing as u8, Ordering::SeqCst);

        let mut devices: Vec<Device> = Vec::with_capacity(drained.len());
        for id in &drained {
            match self.structural.get_by_id(id).await {
                Ok(device) => devices.push(device),
                Err(_) => {
                    // Removed while queued; drop its derived documents.
                    self.semantic.remove_device(id);
                }
            }
        }

        let embedded = match self.semantic.index_devices(&devices).await {
            Ok(count) => {
                debug!(
                    drained = drained.len(),
                    embedded = count,
                    "deferred sync flush complete"
                );
                count
            }
            Err(err) => {
                warn!(error = %err, "sync flush failed; re-queuing batch");
                if let Ok(mut pending) = self.pending.lock() {
                    pending.extend(drained);
                }
                0
            }
        };

        self.settle_state();
        embedded
    }

    /// Rebuild one device's event-pattern document on demand and return
    /// the detected patterns.
    ///
    /// The detection result is returned even when the embedding backend
    /// is down; the document refresh is best-effort and retried by the
    /// next sweep.
    pub async fn refresh_device_patterns(
        &self,
        device: &Device,
    ) -> HearthResult<Vec<IssuePattern>> {
        let events = self
            .events
            .recent_events(&device.id, self.event_window)
            .await?;
        let patterns = detect(&events, &self.pattern_config);
        if let Err(err) = self.semantic.index_event_patterns(device, &patterns).await {
            warn!(
                device = %device.id,
                error = %err,
                "pattern document refresh skipped; will retry on next sweep"
            );
        }
        Ok(patterns)
    }

    /// Full sweep: rebuild the event-pattern document of every device.
    pub async fn sweep(&self) -> usize {
        let ids = self.structural.all_ids().await;
        let mut refreshed = 0usize;
        for id in ids {
            let Ok(device) = self.structural.get_by_id(&id).await else {
                continue;
            };
            match self.refresh_device_patterns(&device).await {
                Ok(_) => refreshed += 1,
                Err(err) => {
                    warn!(device = %id, error = %err, "pattern sweep failed for device");
                }
            }
        }
        info!(refreshed, "event-pattern sweep complete");
        refreshed
    }

    /// Deferred-mutation flush loop. Runs until the shutdown signal
    /// flips, then performs one final flush so queued work is not lost.
    pub async fn run_flush_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.flush_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await; // the first tick fires immediately

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.flush().await;
                }
                _ = self.flush_notify.notified() => {
                    self.flush().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        self.flush().await;
                        break;
                    }
                }
            }
        }
        debug!("sync flush loop stopped");
    }

    /// Periodic full event-pattern sweep loop.
    pub async fn run_sweep_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.sweep_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("pattern sweep loop stopped");
    }

    /// After a flush: Queuing if work arrived mid-flush, otherwise Idle.
    fn settle_state(&self) {
        let next = if self.pending_len() > 0 {
            SyncState::Queuing
        } else {
            SyncState::Idle
        };
        self.state.store(next as u8, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SemanticConfig;
    use crate::error::HearthError;
    use crate::stubs::StaticEventSource;
    use crate::traits::EmbeddingProvider;
    use crate::types::Platform;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct TestProvider {
        batch_calls: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
    }

    impl TestProvider {
        fn new() -> Self {
            Self {
                batch_calls: AtomicUsize::new(0),
                fail: std::sync::atomic::AtomicBool::new(false),
            }
        }

        fn embedding(text: &str) -> Vec<f32> {
            let len = text.len() as f32;
            vec![len, 1.0, len * 0.5]
        }
    }

    #[async_trait]
    impl EmbeddingProvider for TestProvider {
        async fn embed(&self, text: &str) -> HearthResult<Vec<f32>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(HearthError::BackendUnavailable("down".into()));
            }
            Ok(Self::embedding(text))
        }

        async fn embed_batch(&self, texts: &[String]) -> HearthResult<Vec<Vec<f32>>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(HearthError::BackendUnavailable("down".into()));
            }
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| Self::embedding(t)).collect())
        }

        fn dimensions(&self) -> usize {
            3
        }

        fn model_id(&self) -> &str {
            "test"
        }
    }

    fn scheduler_with(
        provider: Arc<TestProvider>,
    ) -> (Arc<StructuralIndex>, Arc<SemanticIndex>, SyncScheduler) {
        let structural = Arc::new(StructuralIndex::new(0.6));
        let semantic = Arc::new(SemanticIndex::new(
            provider,
            SemanticConfig::default(),
        ));
        let scheduler = SyncScheduler::new(
            structural.clone(),
            semantic.clone(),
            Arc::new(StaticEventSource::default()),
            SyncConfig::default(),
            PatternConfig::default(),
            chrono::Duration::days(7),
        );
        (structural, semantic, scheduler)
    }

    fn device(local_id: &str) -> Device {
        Device::new(Platform::Tuya, local_id, format!("Device {local_id}"))
            .with_capabilities(["switch"])
    }

    #[test]
    fn test_classify_new_device_immediate() {
        let d = device("1");
        assert_eq!(classify(None, &d), SyncClass::Immediate);
    }

    #[test]
    fn test_classify_room_change_immediate() {
        let before = device("1");
        let after = before.clone().with_room("Kitchen");
        assert_eq!(classify(Some(&before), &after), SyncClass::Immediate);
    }

    #[test]
    fn test_classify_state_change_deferred() {
        let before = device("1");
        let after = before
            .clone()
            .with_state(serde_json::json!({"switch": "on"}));
        assert_eq!(classify(Some(&before), &after), SyncClass::Deferred);
    }

    #[tokio::test]
    async fn test_enqueue_transitions_to_queuing() {
        let (_, _, scheduler) = scheduler_with(Arc::new(TestProvider::new()));
        assert_eq!(scheduler.state(), SyncState::Idle);
        scheduler.enqueue(device("1").id);
        assert_eq!(scheduler.state(), SyncState::Queuing);
        assert_eq!(scheduler.pending_len(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_deduplicates() {
        let (_, _, scheduler) = scheduler_with(Arc::new(TestProvider::new()));
        let id = device("1").id;
        scheduler.enqueue(id.clone());
        scheduler.enqueue(id);
        assert_eq!(scheduler.pending_len(), 1);
    }

    #[tokio::test]
    async fn test_flush_batches_and_settles_idle() {
        let provider = Arc::new(TestProvider::new());
        let (structural, semantic, scheduler) = scheduler_with(provider.clone());

        for i in 0..3 {
            let d = device(&i.to_string());
            structural.upsert(d.clone()).await;
            scheduler.enqueue(d.id);
        }

        let embedded = scheduler.flush().await;
        assert_eq!(embedded, 3);
        assert_eq!(semantic.len(), 3);
        assert_eq!(scheduler.state(), SyncState::Idle);
        assert_eq!(scheduler.pending_len(), 0);
        // One backend round trip for the whole batch.
        assert_eq!(provider.batch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_flush_removes_vanished_devices() {
        let provider = Arc::new(TestProvider::new());
        let (structural, semantic, scheduler) = scheduler_with(provider);

        let d = device("1");
        structural.upsert(d.clone()).await;
        semantic.index_device(&d).await.unwrap();
        assert_eq!(semantic.len(), 1);

        structural.remove(&d.id).await;
        scheduler.enqueue(d.id);
        scheduler.flush().await;

        assert_eq!(semantic.len(), 0, "vanished device doc must be dropped");
    }

    #[tokio::test]
    async fn test_failed_flush_requeues() {
        let provider = Arc::new(TestProvider::new());
        let (structural, _, scheduler) = scheduler_with(provider.clone());

        let d = device("1");
        structural.upsert(d.clone()).await;
        scheduler.enqueue(d.id);

        provider.fail.store(true, Ordering::SeqCst);
        let embedded = scheduler.flush().await;
        assert_eq!(embedded, 0);
        assert_eq!(scheduler.pending_len(), 1, "failed batch stays queued");
        assert_eq!(scheduler.state(), SyncState::Queuing);

        provider.fail.store(false, Ordering::SeqCst);
        assert_eq!(scheduler.flush().await, 1);
        assert_eq!(scheduler.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_size_threshold_wakes_flush_loop() {
        let provider = Arc::new(TestProvider::new());
        let structural = Arc::new(StructuralIndex::new(0.6));
        let semantic = Arc::new(SemanticIndex::new(
            provider.clone(),
            SemanticConfig::default(),
        ));
        let config = SyncConfig {
            // Long timer so only the size trigger can fire within the test.
            flush_interval_secs: 3_600,
            flush_threshold: 2,
            ..Default::default()
        };
        let scheduler = Arc::new(SyncScheduler::new(
            structural.clone(),
            semantic.clone(),
            Arc::new(StaticEventSource::default()),
            config,
            PatternConfig::default(),
            chrono::Duration::days(7),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler.clone().run_flush_loop(shutdown_rx));

        for i in 0..2 {
            let d = device(&i.to_string());
            structural.upsert(d.clone()).await;
            scheduler.enqueue(d.id);
        }

        // The threshold notify should flush well before the hour timer.
        for _ in 0..50 {
            if semantic.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(semantic.len(), 2);

        shutdown_tx.send(true).ok();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_builds_pattern_documents() {
        let provider = Arc::new(TestProvider::new());
        let (structural, semantic, scheduler) = scheduler_with(provider);

        let d = device("1");
        structural.upsert(d.clone()).await;
        let refreshed = scheduler.sweep().await;
        assert_eq!(refreshed, 1);
        // Pattern document exists even with an empty event history
        // (normal fallback).
        assert_eq!(semantic.len(), 1);
    }
}
