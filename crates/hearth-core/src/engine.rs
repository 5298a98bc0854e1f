//! Engine facade: composition root and public entry points.
//!
//! All collaborators are injected at construction; platform adapters as
//! [`DeviceSource`]/[`EventSource`] implementations, the embedding backend
//! as an [`EmbeddingProvider`]. There is no process-wide singleton; tests
//! and embedders construct as many engines as they need.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::diagnostics::DiagnosticOrchestrator;
use crate::error::{HearthError, HearthResult};
use crate::index::StructuralIndex;
use crate::semantic::{SearchFilter, SemanticIndex};
use crate::sync::{classify, SyncClass, SyncScheduler, SyncState};
use crate::traits::{DeviceMutation, DeviceSource, EmbeddingProvider, EventSource};
use crate::types::{
    Device, DeviceFilter, DeviceId, DiagnosticReport, DocumentKind, RankedDevice,
};

/// Per-source result of a discovery pass.
#[derive(Debug)]
pub struct DiscoverySummary {
    /// Devices ingested across all sources that responded.
    pub devices_seen: usize,
    /// Indexed devices no longer present in any snapshot, removed.
    pub devices_pruned: usize,
    pub sources_ok: usize,
    /// Errors from sources that failed; discovery is best-effort and
    /// partial results from the healthy sources are still ingested.
    pub sources_failed: Vec<HearthError>,
}

/// Ranked device search, with an explicit signal for a degraded backend.
#[derive(Debug, Default)]
pub struct DeviceSearchResult {
    pub devices: Vec<RankedDevice>,
    /// True when the embedding backend was unreachable; `devices` is then
    /// empty rather than a pretend ranking.
    pub degraded: bool,
}

/// Device discovery and diagnostic engine.
///
/// Owns both indexes, the sync scheduler and the diagnostic orchestrator,
/// and funnels every structural mutation through one bounded channel with
/// a single consumer, so concurrent adapters can never interleave partial
/// index updates.
pub struct DiscoveryEngine {
    config: Config,
    structural: Arc<StructuralIndex>,
    semantic: Arc<SemanticIndex>,
    scheduler: Arc<SyncScheduler>,
    orchestrator: DiagnosticOrchestrator,
    device_sources: Vec<Arc<dyn DeviceSource>>,
    ingest_tx: mpsc::Sender<DeviceMutation>,
    /// Held until `start` hands it to the drain task.
    ingest_rx: Mutex<Option<mpsc::Receiver<DeviceMutation>>>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DiscoveryEngine {
    pub fn new(
        config: Config,
        provider: Arc<dyn EmbeddingProvider>,
        device_sources: Vec<Arc<dyn DeviceSource>>,
        event_source: Arc<dyn EventSource>,
    ) -> Self {
        let structural = Arc::new(StructuralIndex::new(config.structural.fuzzy_threshold));
        let semantic = Arc::new(SemanticIndex::new(provider, config.semantic.clone()));
        let scheduler = Arc::new(SyncScheduler::new(
            structural.clone(),
            semantic.clone(),
            event_source,
            config.sync.clone(),
            config.patterns.clone(),
            chrono::Duration::hours(config.diagnostics.event_window_hours as i64),
        ));
        let orchestrator = DiagnosticOrchestrator::new(
            semantic.clone(),
            scheduler.clone(),
            config.diagnostics.clone(),
        );

        let (ingest_tx, ingest_rx) = mpsc::channel(config.sync.ingest_queue_capacity);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            structural,
            semantic,
            scheduler,
            orchestrator,
            device_sources,
            ingest_tx,
            ingest_rx: Mutex::new(Some(ingest_rx)),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Start the background tasks and run the initial discovery pass.
    ///
    /// Calling `start` twice is a misuse and returns an error rather than
    /// double-spawning the loops.
    pub async fn start(&self) -> HearthResult<DiscoverySummary> {
        let ingest_rx = self
            .ingest_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| HearthError::Internal("engine already started".into()))?;

        let mut tasks = self.tasks.lock().await;
        tasks.push(tokio::spawn(run_ingest_loop(
            ingest_rx,
            self.structural.clone(),
            self.semantic.clone(),
            self.scheduler.clone(),
            self.shutdown_tx.subscribe(),
        )));
        tasks.push(tokio::spawn(
            self.scheduler.clone().run_flush_loop(self.shutdown_tx.subscribe()),
        ));
        tasks.push(tokio::spawn(
            self.scheduler.clone().run_sweep_loop(self.shutdown_tx.subscribe()),
        ));
        drop(tasks);

        let summary = self.discover().await;
        info!(
            devices = summary.devices_seen,
            sources_ok = summary.sources_ok,
            sources_failed = summary.sources_failed.len(),
            "engine started"
        );
        Ok(summary)
    }

    /// Fetch a snapshot from every device source and ingest it.
    ///
    /// Sources fail independently; one unreachable platform never blocks
    /// ingestion from the others. Indexed devices absent from all
    /// snapshots are pruned only when every source responded, so a flaky
    /// platform cannot mass-evict its own devices.
    pub async fn discover(&self) -> DiscoverySummary {
        let mut summary = DiscoverySummary {
            devices_seen: 0,
            devices_pruned: 0,
            sources_ok: 0,
            sources_failed: Vec::new(),
        };
        let mut seen: Vec<DeviceId> = Vec::new();

        for source in &self.device_sources {
            match source.snapshot().await {
                Ok(devices) => {
                    summary.sources_ok += 1;
                    summary.devices_seen += devices.len();
                    for device in devices {
                        seen.push(device.id.clone());
                        if self.ingest(DeviceMutation::Upsert(device)).await.is_err() {
                            return summary;
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "device source snapshot failed");
                    summary.sources_failed.push(err);
                }
            }
        }

        if summary.sources_failed.is_empty() && !self.device_sources.is_empty() {
            for id in self.structural.all_ids().await {
                if !seen.contains(&id) {
                    if self.ingest(DeviceMutation::Remove(id)).await.is_err() {
                        return summary;
                    }
                    summary.devices_pruned += 1;
                }
            }
        }

        summary
    }

    /// Submit one structural mutation.
    ///
    /// Applies backpressure: when the bounded channel is full this awaits
    /// until the drain task catches up instead of dropping the mutation.
    pub async fn ingest(&self, mutation: DeviceMutation) -> HearthResult<()> {
        self.ingest_tx
            .send(mutation)
            .await
            .map_err(|_| HearthError::Internal("ingest channel closed".into()))
    }

    /// Resolve a device reference: a composed device id
    /// ("smartthings:lamp-1") or a human name ("the kitchen light").
    ///
    /// Exact id hit wins outright; otherwise exact name/alias match, then
    /// the fuzzy scan.
    pub async fn resolve_device(&self, reference: &str) -> HearthResult<Device> {
        let id = DeviceId::from_raw(reference.trim());
        if let Ok(device) = self.structural.get_by_id(&id).await {
            return Ok(device);
        }
        self.structural.resolve_by_name(reference).await
    }

    /// Structural query by room / platform / capability.
    pub async fn query_devices(&self, filter: &DeviceFilter) -> Vec<Device> {
        self.structural.query_by_filter(filter).await
    }

    /// Natural-language device search.
    ///
    /// Ranks by embedding similarity with the capability boost applied.
    /// When the backend is down the ranked list is empty and `degraded`
    /// is set; callers that want a name-based answer instead use
    /// [`DiscoveryEngine::resolve_device`].
    pub async fn search_devices(&self, query: &str, k: usize) -> DeviceSearchResult {
        let filter = SearchFilter::of_kind(DocumentKind::Device);
        let outcome = self.semantic.search(query, k, &filter).await;
        if outcome.degraded {
            return DeviceSearchResult {
                devices: Vec::new(),
                degraded: true,
            };
        }
        DeviceSearchResult {
            devices: self.semantic.hydrate(&outcome.hits, &self.structural).await,
            degraded: false,
        }
    }

    /// Run the full diagnostic workflow for a device reference.
    ///
    /// Fails only when the reference does not resolve; everything past
    /// resolution is best-effort and reported section by section.
    pub async fn diagnose(&self, reference: &str, issue: &str) -> HearthResult<DiagnosticReport> {
        let device = self.resolve_device(reference).await?;
        Ok(self.orchestrator.diagnose(&device, issue).await)
    }

    /// Force a deferred-queue flush outside the timer, for tests and
    /// administrative tooling.
    pub async fn flush_now(&self) -> usize {
        self.scheduler.flush().await
    }

    /// Current sync scheduler state.
    pub fn sync_state(&self) -> SyncState {
        self.scheduler.state()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of devices in the structural index.
    pub async fn device_count(&self) -> usize {
        self.structural.len().await
    }

    /// Signal shutdown and wait for the background tasks to finish.
    /// The flush loop performs one final flush before exiting.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            if let Err(err) = task.await {
                warn!(error = %err, "background task panicked during shutdown");
            }
        }
        info!("engine stopped");
    }
}

/// Single consumer of the mutation channel.
///
/// Being the only writer path into the structural index, it guarantees
/// the primary map and every secondary map move together per mutation.
async fn run_ingest_loop(
    mut rx: mpsc::Receiver<DeviceMutation>,
    structural: Arc<StructuralIndex>,
    semantic: Arc<SemanticIndex>,
    scheduler: Arc<SyncScheduler>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            mutation = rx.recv() => {
                let Some(mutation) = mutation else { break };
                apply_mutation(mutation, &structural, &semantic, &scheduler).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    // Drain what is already queued before stopping.
                    while let Ok(mutation) = rx.try_recv() {
                        apply_mutation(mutation, &structural, &semantic, &scheduler).await;
                    }
                    break;
                }
            }
        }
    }
}

async fn apply_mutation(
    mutation: DeviceMutation,
    structural: &StructuralIndex,
    semantic: &SemanticIndex,
    scheduler: &SyncScheduler,
) {
    match mutation {
        DeviceMutation::Upsert(device) => {
            let previous = structural.upsert(device.clone()).await;
            match classify(previous.as_ref(), &device) {
                SyncClass::Immediate => {
                    if let Err(err) = semantic.index_device(&device).await {
                        // Keep serving structural queries; the deferred
                        // queue retries the embedding on the next flush.
                        warn!(
                            device = %device.id,
                            error = %err,
                            "immediate re-index failed; deferring"
                        );
                        scheduler.enqueue(device.id);
                    }
                }
                SyncClass::Deferred => scheduler.enqueue(device.id),
            }
        }
        DeviceMutation::Remove(id) => {
            structural.remove(&id).await;
            semantic.remove_device(&id);
        }
    }
}
