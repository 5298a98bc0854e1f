//! Embedding-backed document store with similarity search.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::config::{BoostMode, SemanticConfig};
use crate::error::HearthResult;
use crate::index::StructuralIndex;
use crate::semantic::text::{
    compose_automation_text, compose_device_text, compose_pattern_text,
};
use crate::traits::EmbeddingProvider;
use crate::types::{
    AutomationDocument, Capability, Device, DeviceId, DocumentKind, DocumentMetadata,
    IssuePattern, RankedDevice, RankedHit,
};

/// One embedded document.
#[derive(Debug, Clone)]
struct IndexedDocument {
    kind: DocumentKind,
    text: String,
    embedding: Vec<f32>,
    metadata: DocumentMetadata,
}

/// Metadata filter for semantic search.
///
/// `kind`/`room` restrict which documents are scored; `capabilities` do
/// not filter, they feed the exact-signal boost blended into the score.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub kind: Option<DocumentKind>,
    pub room: Option<String>,
    pub capabilities: BTreeSet<Capability>,
}

impl SearchFilter {
    pub fn of_kind(kind: DocumentKind) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn with_capabilities(mut self, capabilities: &BTreeSet<Capability>) -> Self {
        self.capabilities = capabilities.clone();
        self
    }
}

/// Outcome of a semantic search.
///
/// `degraded=true` means the embedding backend was unreachable and the
/// ranked list is empty; callers must distinguish this from a genuine
/// "no results" and fall back to structural-only behavior.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub hits: Vec<RankedHit>,
    pub degraded: bool,
}

impl SearchOutcome {
    fn degraded() -> Self {
        Self {
            hits: Vec::new(),
            degraded: true,
        }
    }
}

/// Embedding-backed document store for devices, automations and event
/// patterns.
///
/// Holds only derived projections; the structural index remains the
/// source of truth for identity and state. Staleness relative to the
/// structural index is bounded by the sync scheduler (immediate for
/// identity changes, one flush interval for state-only changes).
pub struct SemanticIndex {
    docs: DashMap<String, IndexedDocument>,
    /// Automations by id, for hydrating automation hits back into full
    /// documents without re-consulting the upstream platform.
    automations: DashMap<String, AutomationDocument>,
    provider: Arc<dyn EmbeddingProvider>,
    config: SemanticConfig,
}

/// Document id for a device's event-pattern document.
fn pattern_doc_id(device_id: &DeviceId) -> String {
    format!("pattern:{device_id}")
}

impl SemanticIndex {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: SemanticConfig) -> Self {
        Self {
            docs: DashMap::new(),
            automations: DashMap::new(),
            provider,
            config,
        }
    }

    /// Index (or refresh) the document for one device.
    ///
    /// Rebuilding the text for an unchanged device is idempotent: if the
    /// composed text matches the stored document, no embedding call is
    /// made. Returns whether an embedding was computed.
    pub async fn index_device(&self, device: &Device) -> HearthResult<bool> {
        let text = compose_device_text(device);
        if self.text_unchanged(device.id.as_str(), &text) {
            return Ok(false);
        }
        let embedding = self.provider.embed(&text).await?;
        self.docs.insert(
            device.id.to_string(),
            IndexedDocument {
                kind: DocumentKind::Device,
                text,
                embedding,
                metadata: DocumentMetadata::for_device(device),
            },
        );
        Ok(true)
    }

    /// Index a batch of devices with a single backend round trip for all
    /// changed texts. Returns how many documents were re-embedded.
    pub async fn index_devices(&self, devices: &[Device]) -> HearthResult<usize> {
        let mut changed: Vec<(&Device, String)> = Vec::new();
        for device in devices {
            let text = compose_device_text(device);
            if !self.text_unchanged(device.id.as_str(), &text) {
                changed.push((device, text));
            }
        }
        if changed.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = changed.iter().map(|(_, t)| t.clone()).collect();
        let embeddings = self.provider.embed_batch(&texts).await?;
        if embeddings.len() != changed.len() {
            return Err(crate::error::HearthError::Internal(format!(
                "embed_batch returned {} vectors for {} texts",
                embeddings.len(),
                changed.len()
            )));
        }

        let count = changed.len();
        for ((device, text), embedding) in changed.into_iter().zip(embeddings) {
            self.docs.insert(
                device.id.to_string(),
                IndexedDocument {
                    kind: DocumentKind::Device,
                    text,
                    embedding,
                    metadata: DocumentMetadata::for_device(device),
                },
            );
        }
        debug!(count, "batch re-embedded device documents");
        Ok(count)
    }

    /// Index an automation for device↔automation relationship discovery.
    pub async fn index_automation(&self, automation: &AutomationDocument) -> HearthResult<bool> {
        let text = compose_automation_text(automation);
        self.automations
            .insert(automation.id.clone(), automation.clone());
        if self.text_unchanged(&automation.id, &text) {
            return Ok(false);
        }
        let embedding = self.provider.embed(&text).await?;
        let mut device_ids = automation.trigger_device_ids.clone();
        device_ids.extend(automation.action_device_ids.iter().cloned());
        self.docs.insert(
            automation.id.clone(),
            IndexedDocument {
                kind: DocumentKind::Automation,
                text,
                embedding,
                metadata: DocumentMetadata {
                    device_ids,
                    ..Default::default()
                },
            },
        );
        Ok(true)
    }

    /// Index (or refresh) the event-pattern document for one device.
    pub async fn index_event_patterns(
        &self,
        device: &Device,
        patterns: &[IssuePattern],
    ) -> HearthResult<bool> {
        let text = compose_pattern_text(&device.name, patterns);
        let doc_id = pattern_doc_id(&device.id);
        if self.text_unchanged(&doc_id, &text) {
            return Ok(false);
        }
        let embedding = self.provider.embed(&text).await?;
        self.docs.insert(
            doc_id,
            IndexedDocument {
                kind: DocumentKind::EventPattern,
                text,
                embedding,
                metadata: DocumentMetadata {
                    room: device.room.clone(),
                    device_ids: vec![device.id.clone()],
                    ..Default::default()
                },
            },
        );
        Ok(true)
    }

    /// Remove a document by id. Returns whether it existed.
    pub fn remove_document(&self, id: &str) -> bool {
        self.automations.remove(id);
        self.docs.remove(id).is_some()
    }

    /// Remove every document derived from a device (the device document
    /// and its event-pattern document).
    pub fn remove_device(&self, device_id: &DeviceId) {
        self.docs.remove(device_id.as_str());
        self.docs.remove(&pattern_doc_id(device_id));
    }

    /// Full automation record for a previously indexed automation id.
    pub fn automation(&self, id: &str) -> Option<AutomationDocument> {
        self.automations.get(id).map(|a| a.clone())
    }

    /// Automations that directly reference a device as trigger or action.
    pub fn automations_for_device(&self, device_id: &DeviceId) -> Vec<AutomationDocument> {
        let mut related: Vec<AutomationDocument> = self
            .automations
            .iter()
            .filter(|entry| entry.value().references(device_id))
            .map(|entry| entry.value().clone())
            .collect();
        related.sort_by(|a, b| a.id.cmp(&b.id));
        related
    }

    /// Similarity search over indexed documents.
    ///
    /// Documents are scored by cosine similarity against the embedded
    /// query; results below the similarity threshold are discarded, then
    /// the capability boost blends in the exact signal, and the top `k`
    /// survive. If the embedding backend is unreachable this returns
    /// `degraded=true` with an empty ranked list rather than an error.
    pub async fn search(&self, query: &str, k: usize, filter: &SearchFilter) -> SearchOutcome {
        let query_embedding = match self.provider.embed(query).await {
            Ok(embedding) => embedding,
            Err(err) => {
                warn!(
                    model = self.provider.model_id(),
                    error = %err,
                    "embedding backend unavailable; semantic search degraded"
                );
                return SearchOutcome::degraded();
            }
        };

        let k = if k == 0 { self.config.default_k } else { k };
        let mut hits: Vec<RankedHit> = self
            .docs
            .iter()
            .filter(|entry| {
                let doc = entry.value();
                if let Some(kind) = filter.kind {
                    if doc.kind != kind {
                        return false;
                    }
                }
                if let Some(room) = &filter.room {
                    if doc.metadata.room.as_deref() != Some(room.as_str()) {
                        return false;
                    }
                }
                true
            })
            .filter_map(|entry| {
                let doc = entry.value();
                let similarity = cosine_similarity(&query_embedding, &doc.embedding);
                if similarity < self.config.similarity_threshold {
                    return None;
                }
                let score = self.apply_boost(similarity, &filter.capabilities, doc);
                Some(RankedHit {
                    id: entry.key().clone(),
                    kind: doc.kind,
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);

        SearchOutcome {
            hits,
            degraded: false,
        }
    }

    /// Hydrate device hits back into full device records.
    ///
    /// Delegates to the structural index; the semantic index never
    /// duplicates authoritative state. Hits whose device has since been
    /// removed are silently dropped.
    pub async fn hydrate(
        &self,
        hits: &[RankedHit],
        structural: &StructuralIndex,
    ) -> Vec<RankedDevice> {
        let mut devices = Vec::with_capacity(hits.len());
        for hit in hits {
            if hit.kind != DocumentKind::Device {
                continue;
            }
            let id = DeviceId::from_raw(hit.id.clone());
            if let Ok(device) = structural.get_by_id(&id).await {
                devices.push(RankedDevice {
                    device,
                    score: hit.score,
                });
            }
        }
        devices
    }

    /// Number of indexed documents (all kinds).
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn text_unchanged(&self, id: &str, text: &str) -> bool {
        self.docs
            .get(id)
            .map(|doc| doc.text == text)
            .unwrap_or(false)
    }

    fn apply_boost(
        &self,
        similarity: f32,
        query_capabilities: &BTreeSet<Capability>,
        doc: &IndexedDocument,
    ) -> f32 {
        let shared = query_capabilities
            .intersection(&doc.metadata.capabilities)
            .count();
        if shared == 0 {
            return similarity;
        }
        match self.config.boost_mode {
            BoostMode::Additive => similarity + self.config.capability_boost * shared as f32,
            BoostMode::Multiplicative => {
                similarity * (1.0 + self.config.capability_boost).powi(shared as i32)
            }
        }
    }
}

/// Cosine similarity between two vectors; 0.0 on length mismatch or zero
/// magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HearthError;
    use crate::types::Platform;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic test provider: embedding is the letter histogram of
    /// the text, so similar texts get similar vectors. Counts calls so
    /// tests can assert idempotence.
    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl CountingProvider {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn histogram(text: &str) -> Vec<f32> {
            let mut v = vec![0.0f32; 26];
            for c in text.to_lowercase().chars() {
                if c.is_ascii_lowercase() {
                    v[(c as u8 - b'a') as usize] += 1.0;
                }
            }
            v
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed(&self, text: &str) -> HearthResult<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Self::histogram(text))
        }

        async fn embed_batch(&self, texts: &[String]) -> HearthResult<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| Self::histogram(t)).collect())
        }

        fn dimensions(&self) -> usize {
            26
        }

        fn model_id(&self) -> &str {
            "letter-histogram"
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        async fn embed(&self, _text: &str) -> HearthResult<Vec<f32>> {
            Err(HearthError::BackendUnavailable("offline".into()))
        }

        async fn embed_batch(&self, _texts: &[String]) -> HearthResult<Vec<Vec<f32>>> {
            Err(HearthError::BackendUnavailable("offline".into()))
        }

        fn dimensions(&self) -> usize {
            26
        }

        fn model_id(&self) -> &str {
            "offline"
        }

        fn is_ready(&self) -> bool {
            false
        }
    }

    fn device(local_id: &str, name: &str) -> Device {
        Device::new(Platform::SmartThings, local_id, name)
            .with_room("Kitchen")
            .with_capabilities(["switch"])
    }

    fn semantic(provider: Arc<dyn EmbeddingProvider>) -> SemanticIndex {
        SemanticIndex::new(provider, SemanticConfig::default())
    }

    #[tokio::test]
    async fn test_index_unchanged_device_skips_embedding() {
        let provider = Arc::new(CountingProvider::new());
        let idx = semantic(provider.clone());
        let d = device("1", "Kitchen Light");

        assert!(idx.index_device(&d).await.unwrap());
        let calls_after_first = provider.call_count();
        assert!(!idx.index_device(&d).await.unwrap());
        assert_eq!(
            provider.call_count(),
            calls_after_first,
            "unchanged text must not trigger a redundant embedding call"
        );
    }

    #[tokio::test]
    async fn test_batch_embeds_only_changed() {
        let provider = Arc::new(CountingProvider::new());
        let idx = semantic(provider.clone());
        let a = device("1", "Kitchen Light");
        let b = device("2", "Den Heater");

        idx.index_device(&a).await.unwrap();
        let embedded = idx.index_devices(&[a.clone(), b.clone()]).await.unwrap();
        assert_eq!(embedded, 1, "only the new device needs embedding");

        let embedded = idx.index_devices(&[a, b]).await.unwrap();
        assert_eq!(embedded, 0);
    }

    #[tokio::test]
    async fn test_search_finds_device_by_name() {
        let idx = semantic(Arc::new(CountingProvider::new()));
        for (i, name) in ["Kitchen Light", "Den Heater", "Garage Door"]
            .iter()
            .enumerate()
        {
            idx.index_device(&device(&i.to_string(), name)).await.unwrap();
        }

        let outcome = idx
            .search("Kitchen Light", 3, &SearchFilter::default())
            .await;
        assert!(!outcome.degraded);
        assert!(!outcome.hits.is_empty());
        let top_ids: Vec<&str> = outcome.hits.iter().map(|h| h.id.as_str()).take(3).collect();
        assert!(
            top_ids.contains(&"smartthings:0"),
            "own name must rank in top 3, got {top_ids:?}"
        );
    }

    #[tokio::test]
    async fn test_capability_boost_reorders() {
        let idx = semantic(Arc::new(CountingProvider::new()));
        let plain = Device::new(Platform::Tuya, "a", "Hall Light");
        let switched = Device::new(Platform::Tuya, "b", "Hall Light")
            .with_capabilities(["switch"]);
        idx.index_device(&plain).await.unwrap();
        idx.index_device(&switched).await.unwrap();

        let mut caps = BTreeSet::new();
        caps.insert(Capability::new("switch"));
        let filter = SearchFilter::default().with_capabilities(&caps);
        let outcome = idx.search("Hall Light", 2, &filter).await;

        // Cosine scores are near-identical; the shared capability must put
        // the switched device first.
        assert_eq!(outcome.hits[0].id, "tuya:b");
        assert!(outcome.hits[0].score > outcome.hits[1].score);
    }

    #[tokio::test]
    async fn test_search_degrades_when_backend_down() {
        let idx = semantic(Arc::new(FailingProvider));
        let outcome = idx.search("anything", 5, &SearchFilter::default()).await;
        assert!(outcome.degraded);
        assert!(outcome.hits.is_empty());
    }

    #[tokio::test]
    async fn test_kind_filter() {
        let idx = semantic(Arc::new(CountingProvider::new()));
        idx.index_device(&device("1", "Hall Lamp")).await.unwrap();
        idx.index_automation(&AutomationDocument {
            id: "auto-1".into(),
            name: "Hall Lamp schedule".into(),
            trigger_device_ids: vec![],
            action_device_ids: vec![DeviceId::from_raw("smartthings:1")],
        })
        .await
        .unwrap();

        let outcome = idx
            .search(
                "Hall Lamp",
                10,
                &SearchFilter::of_kind(DocumentKind::Automation),
            )
            .await;
        assert!(outcome.hits.iter().all(|h| h.kind == DocumentKind::Automation));
        assert_eq!(outcome.hits.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_device_clears_pattern_doc() {
        let idx = semantic(Arc::new(CountingProvider::new()));
        let d = device("1", "Hall Lamp");
        idx.index_device(&d).await.unwrap();
        idx.index_event_patterns(
            &d,
            &[crate::types::IssuePattern::new(
                crate::types::IssueKind::Normal,
                "no anomalies",
                0,
                0.95,
            )],
        )
        .await
        .unwrap();
        assert_eq!(idx.len(), 2);

        idx.remove_device(&d.id);
        assert!(idx.is_empty());
    }

    #[tokio::test]
    async fn test_automations_for_device() {
        let idx = semantic(Arc::new(CountingProvider::new()));
        let lamp_id = DeviceId::from_raw("st:lamp");
        idx.index_automation(&AutomationDocument {
            id: "auto-1".into(),
            name: "evening lights".into(),
            trigger_device_ids: vec![],
            action_device_ids: vec![lamp_id.clone()],
        })
        .await
        .unwrap();
        idx.index_automation(&AutomationDocument {
            id: "auto-2".into(),
            name: "morning blinds".into(),
            trigger_device_ids: vec![],
            action_device_ids: vec![DeviceId::from_raw("st:blinds")],
        })
        .await
        .unwrap();

        let related = idx.automations_for_device(&lamp_id);
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].id, "auto-1");
    }

    #[tokio::test]
    async fn test_hydrate_delegates_to_structural() {
        let provider = Arc::new(CountingProvider::new());
        let idx = semantic(provider);
        let structural = StructuralIndex::new(0.6);

        let d = device("1", "Hall Lamp");
        structural.upsert(d.clone()).await;
        idx.index_device(&d).await.unwrap();

        let outcome = idx.search("Hall Lamp", 5, &SearchFilter::default()).await;
        let hydrated = idx.hydrate(&outcome.hits, &structural).await;
        assert_eq!(hydrated.len(), 1);
        assert_eq!(hydrated[0].device.id, d.id);

        // Removed devices disappear from hydration even while the
        // semantic doc is still pending cleanup.
        structural.remove(&d.id).await;
        let hydrated = idx.hydrate(&outcome.hits, &structural).await;
        assert!(hydrated.is_empty());
    }

    #[test]
    fn test_cosine_edge_cases() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        let sim = cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }
}
