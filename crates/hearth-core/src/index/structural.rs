//! Authoritative multi-key index over devices.

use std::collections::{BTreeSet, HashMap};

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{HearthError, HearthResult};
use crate::index::fuzzy::{levenshtein, normalized_similarity};
use crate::types::{Capability, Device, DeviceFilter, DeviceId};

/// All maps live in one struct behind one lock, so every upsert/remove
/// updates the primary map and every secondary map under the same write
/// guard. Readers take a read guard and therefore always see a consistent
/// snapshot; a partially-updated index is never observable, even while a
/// fuzzy scan is mid-flight.
#[derive(Debug, Default)]
struct IndexInner {
    devices: HashMap<DeviceId, Device>,
    by_name: HashMap<String, BTreeSet<DeviceId>>,
    by_alias: HashMap<String, BTreeSet<DeviceId>>,
    by_room: HashMap<String, BTreeSet<DeviceId>>,
    by_platform: HashMap<String, BTreeSet<DeviceId>>,
    by_capability: HashMap<Capability, BTreeSet<DeviceId>>,
}

fn norm(s: &str) -> String {
    s.trim().to_lowercase()
}

impl IndexInner {
    fn link(&mut self, device: &Device) {
        let id = device.id.clone();
        self.by_name
            .entry(norm(&device.name))
            .or_default()
            .insert(id.clone());
        for alias in &device.aliases {
            self.by_alias
                .entry(norm(alias))
                .or_default()
                .insert(id.clone());
        }
        if let Some(room) = &device.room {
            self.by_room
                .entry(norm(room))
                .or_default()
                .insert(id.clone());
        }
        self.by_platform
            .entry(device.platform.as_str().to_string())
            .or_default()
            .insert(id.clone());
        for capability in &device.capabilities {
            self.by_capability
                .entry(capability.clone())
                .or_default()
                .insert(id.clone());
        }
    }

    fn unlink(&mut self, device: &Device) {
        let id = &device.id;
        prune(&mut self.by_name, &norm(&device.name), id);
        for alias in &device.aliases {
            prune(&mut self.by_alias, &norm(alias), id);
        }
        if let Some(room) = &device.room {
            prune(&mut self.by_room, &norm(room), id);
        }
        prune(&mut self.by_platform, device.platform.as_str(), id);
        for capability in &device.capabilities {
            if let Some(set) = self.by_capability.get_mut(capability) {
                set.remove(id);
                if set.is_empty() {
                    self.by_capability.remove(capability);
                }
            }
        }
    }
}

fn prune(map: &mut HashMap<String, BTreeSet<DeviceId>>, key: &str, id: &DeviceId) {
    if let Some(set) = map.get_mut(key) {
        set.remove(id);
        if set.is_empty() {
            map.remove(key);
        }
    }
}

/// Exact multi-key index over devices with fuzzy name resolution.
///
/// Owns the authoritative [`Device`] records. Mutations are short,
/// synchronous under the write lock and serialized; O(1) for exact
/// operations, O(n) for the fuzzy scan; acceptable for populations in
/// the low thousands.
#[derive(Debug)]
pub struct StructuralIndex {
    inner: RwLock<IndexInner>,
    fuzzy_threshold: f32,
}

impl StructuralIndex {
    pub fn new(fuzzy_threshold: f32) -> Self {
        Self {
            inner: RwLock::new(IndexInner::default()),
            fuzzy_threshold,
        }
    }

    /// Insert or replace a device. Returns the previous record, if any,
    /// so the caller can classify the mutation for re-indexing.
    pub async fn upsert(&self, device: Device) -> Option<Device> {
        let mut inner = self.inner.write().await;
        let previous = inner.devices.remove(&device.id);
        if let Some(prev) = &previous {
            inner.unlink(prev);
        }
        inner.link(&device);
        inner.devices.insert(device.id.clone(), device);
        previous
    }

    /// Remove a device and all its secondary-index entries.
    /// Returns the removed record, if it existed.
    pub async fn remove(&self, id: &DeviceId) -> Option<Device> {
        let mut inner = self.inner.write().await;
        let removed = inner.devices.remove(id);
        if let Some(device) = &removed {
            inner.unlink(device);
        }
        removed
    }

    /// Exact id lookup. Absence is the typed `DeviceNotFound` result.
    pub async fn get_by_id(&self, id: &DeviceId) -> HearthResult<Device> {
        let inner = self.inner.read().await;
        inner
            .devices
            .get(id)
            .cloned()
            .ok_or_else(|| HearthError::DeviceNotFound {
                reference: id.to_string(),
            })
    }

    /// Resolve a device by (possibly misspelled) name or alias.
    ///
    /// Exact name/alias hits win outright. Otherwise every name and alias
    /// is scored with normalized edit-distance similarity and the best
    /// candidate at or above the threshold wins. Ties are broken
    /// deterministically: smallest edit distance, then lexicographic
    /// matched text, then lexicographic device id; so repeated queries
    /// always resolve identically.
    pub async fn resolve_by_name(&self, query: &str) -> HearthResult<Device> {
        let needle = norm(query);
        let inner = self.inner.read().await;

        if let Some(device) = exact_lookup(&inner, &needle) {
            return Ok(device);
        }

        // Fuzzy scan over all names and aliases.
        let mut best: Option<(f32, usize, String, DeviceId)> = None;
        for device in inner.devices.values() {
            for text in std::iter::once(device.name.as_str())
                .chain(device.aliases.iter().map(String::as_str))
            {
                let candidate = norm(text);
                let similarity = normalized_similarity(&needle, &candidate);
                if similarity < self.fuzzy_threshold {
                    continue;
                }
                let distance = levenshtein(&needle, &candidate);
                let key = (similarity, distance, candidate, device.id.clone());
                best = Some(match best.take() {
                    None => key,
                    Some(current) => {
                        if better_candidate(&key, &current) {
                            key
                        } else {
                            current
                        }
                    }
                });
            }
        }

        match best {
            Some((similarity, _, _, id)) => {
                debug!(query, %id, similarity, "fuzzy-resolved device name");
                inner
                    .devices
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| HearthError::Internal("fuzzy match id missing".into()))
            }
            None => Err(HearthError::DeviceNotFound {
                reference: query.to_string(),
            }),
        }
    }

    /// Like [`resolve_by_name`](Self::resolve_by_name), but refuses to
    /// guess when two distinct devices share the exact queried name.
    pub async fn resolve_strict(&self, query: &str) -> HearthResult<Device> {
        let needle = norm(query);
        {
            let inner = self.inner.read().await;
            let tied: BTreeSet<&DeviceId> = inner
                .by_name
                .get(&needle)
                .into_iter()
                .chain(inner.by_alias.get(&needle))
                .flatten()
                .collect();
            if tied.len() > 1 {
                return Err(HearthError::AmbiguousMatch {
                    query: query.to_string(),
                    candidates: tied.iter().map(|id| id.to_string()).collect(),
                });
            }
        }
        self.resolve_by_name(query).await
    }

    /// Filter devices by room / platform / capability via set
    /// intersection. An empty filter returns every device. Results are
    /// sorted by name then id, independent of insertion order.
    pub async fn query_by_filter(&self, filter: &DeviceFilter) -> Vec<Device> {
        let inner = self.inner.read().await;

        let mut sets: Vec<&BTreeSet<DeviceId>> = Vec::new();
        static EMPTY: BTreeSet<DeviceId> = BTreeSet::new();

        if let Some(room) = &filter.room {
            sets.push(inner.by_room.get(&norm(room)).unwrap_or(&EMPTY));
        }
        if let Some(platform) = &filter.platform {
            sets.push(inner.by_platform.get(platform.as_str()).unwrap_or(&EMPTY));
        }
        if let Some(capability) = &filter.capability {
            sets.push(inner.by_capability.get(capability).unwrap_or(&EMPTY));
        }

        let mut matched: Vec<Device> = if sets.is_empty() {
            inner.devices.values().cloned().collect()
        } else {
            // Intersect starting from the smallest set.
            sets.sort_by_key(|s| s.len());
            sets[0]
                .iter()
                .filter(|id| sets[1..].iter().all(|s| s.contains(id)))
                .filter_map(|id| inner.devices.get(id).cloned())
                .collect()
        };

        matched.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        matched
    }

    /// Ids of all indexed devices.
    pub async fn all_ids(&self) -> Vec<DeviceId> {
        let inner = self.inner.read().await;
        let mut ids: Vec<DeviceId> = inner.devices.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.devices.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.devices.is_empty()
    }
}

/// Exact name/alias hit; the alphabetically-first id wins when several
/// devices share the queried name.
fn exact_lookup(inner: &IndexInner, needle: &str) -> Option<Device> {
    let id = inner
        .by_name
        .get(needle)
        .and_then(|set| set.iter().next())
        .or_else(|| inner.by_alias.get(needle).and_then(|set| set.iter().next()))?;
    inner.devices.get(id).cloned()
}

/// Ordering for fuzzy candidates: higher similarity, then smaller edit
/// distance, then lexicographic matched text, then lexicographic id.
fn better_candidate(
    a: &(f32, usize, String, DeviceId),
    b: &(f32, usize, String, DeviceId),
) -> bool {
    if a.0 != b.0 {
        return a.0 > b.0;
    }
    if a.1 != b.1 {
        return a.1 < b.1;
    }
    if a.2 != b.2 {
        return a.2 < b.2;
    }
    a.3 < b.3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;

    fn index() -> StructuralIndex {
        StructuralIndex::new(0.6)
    }

    fn lamp(local_id: &str, name: &str, room: &str) -> Device {
        Device::new(Platform::SmartThings, local_id, name)
            .with_room(room)
            .with_capabilities(["switch"])
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let idx = index();
        let device = lamp("1", "Hall Lamp", "Hall");
        let id = device.id.clone();
        assert!(idx.upsert(device).await.is_none());
        let fetched = idx.get_by_id(&id).await.unwrap();
        assert_eq!(fetched.name, "Hall Lamp");
    }

    #[tokio::test]
    async fn test_get_missing_is_typed_not_found() {
        let idx = index();
        let result = idx.get_by_id(&DeviceId::from_raw("tuya:nope")).await;
        assert!(matches!(result, Err(HearthError::DeviceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_remove_clears_secondary_maps() {
        let idx = index();
        let device = lamp("1", "Hall Lamp", "Hall");
        let id = device.id.clone();
        idx.upsert(device).await;
        idx.remove(&id).await;

        // No stale name entry survives removal.
        let result = idx.resolve_by_name("Hall Lamp").await;
        assert!(matches!(result, Err(HearthError::DeviceNotFound { .. })));
        assert!(idx.query_by_filter(&DeviceFilter::by_room("Hall")).await.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_relinks_changed_room() {
        let idx = index();
        let device = lamp("1", "Hall Lamp", "Hall");
        idx.upsert(device.clone()).await;
        idx.upsert(device.with_room("Kitchen")).await;

        assert!(idx.query_by_filter(&DeviceFilter::by_room("Hall")).await.is_empty());
        assert_eq!(
            idx.query_by_filter(&DeviceFilter::by_room("Kitchen")).await.len(),
            1
        );
    }

    #[tokio::test]
    async fn test_exact_name_and_alias_resolution() {
        let idx = index();
        let device = lamp("1", "Hall Lamp", "Hall").with_aliases(["the lamp"]);
        idx.upsert(device).await;

        assert!(idx.resolve_by_name("hall lamp").await.is_ok());
        assert!(idx.resolve_by_name("THE LAMP").await.is_ok());
    }

    #[tokio::test]
    async fn test_fuzzy_resolution_tolerates_typo() {
        let idx = index();
        idx.upsert(lamp("1", "Kitchen Light", "Kitchen")).await;
        let resolved = idx.resolve_by_name("kitchen lihgt").await.unwrap();
        assert_eq!(resolved.name, "Kitchen Light");
    }

    #[tokio::test]
    async fn test_fuzzy_below_threshold_is_not_found() {
        let idx = index();
        idx.upsert(lamp("1", "Kitchen Light", "Kitchen")).await;
        let result = idx.resolve_by_name("garage door opener").await;
        assert!(matches!(result, Err(HearthError::DeviceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_identical_names_tie_break_deterministic() {
        let idx = index();
        // Same name on two devices; smaller id must win, on every query.
        idx.upsert(lamp("b", "Ceiling Light", "Den")).await;
        idx.upsert(lamp("a", "Ceiling Light", "Den")).await;

        for _ in 0..3 {
            let resolved = idx.resolve_by_name("Ceiling Light").await.unwrap();
            assert_eq!(resolved.id.as_str(), "smartthings:a");
        }
    }

    #[tokio::test]
    async fn test_strict_resolution_flags_ambiguity() {
        let idx = index();
        idx.upsert(lamp("a", "Ceiling Light", "Den")).await;
        idx.upsert(lamp("b", "Ceiling Light", "Den")).await;

        let result = idx.resolve_strict("Ceiling Light").await;
        assert!(matches!(result, Err(HearthError::AmbiguousMatch { .. })));

        // Unambiguous names still resolve strictly.
        idx.upsert(lamp("c", "Floor Lamp", "Den")).await;
        assert!(idx.resolve_strict("Floor Lamp").await.is_ok());
    }

    #[tokio::test]
    async fn test_filter_intersection() {
        let idx = index();
        idx.upsert(lamp("1", "Kitchen Light", "Kitchen")).await;
        idx.upsert(
            Device::new(Platform::Tuya, "2", "Kitchen Sensor")
                .with_room("Kitchen")
                .with_capabilities(["temperature"]),
        )
        .await;
        idx.upsert(lamp("3", "Den Light", "Den")).await;

        let kitchen = idx.query_by_filter(&DeviceFilter::by_room("Kitchen")).await;
        assert_eq!(kitchen.len(), 2);

        let kitchen_switches = idx
            .query_by_filter(&DeviceFilter::by_room("Kitchen").with_capability("switch"))
            .await;
        assert_eq!(kitchen_switches.len(), 1);
        assert_eq!(kitchen_switches[0].name, "Kitchen Light");

        let tuya = idx
            .query_by_filter(&DeviceFilter::default().with_platform(Platform::Tuya))
            .await;
        assert_eq!(tuya.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_filter_returns_all_sorted() {
        let idx = index();
        idx.upsert(lamp("2", "Zeta", "Den")).await;
        idx.upsert(lamp("1", "Alpha", "Den")).await;
        let all = idx.query_by_filter(&DeviceFilter::default()).await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Alpha");
    }

    #[tokio::test]
    async fn test_room_filter_independent_of_insertion_order() {
        // 19 devices across 3 rooms, inserted interleaved.
        let rooms = ["Kitchen", "Den", "Bedroom"];
        let idx = index();
        for i in 0..19 {
            let room = rooms[i % 3];
            idx.upsert(lamp(&format!("d{i}"), &format!("Device {i}"), room))
                .await;
        }
        let kitchen = idx.query_by_filter(&DeviceFilter::by_room("Kitchen")).await;
        // Indices 0, 3, 6, 9, 12, 15, 18.
        assert_eq!(kitchen.len(), 7);
        assert!(kitchen.iter().all(|d| d.room.as_deref() == Some("Kitchen")));
    }
}
