//! Stateless event-history classifier.
//!
//! Pure function over one device's events: sorts, scans, classifies.
//! Never returns an error and never panics on malformed input; the
//! worst case is the `normal` fallback.

use std::collections::BTreeMap;

use chrono::Timelike;

use crate::config::PatternConfig;
use crate::types::{AttributeValue, EventGap, EventRecord, IssueKind, IssuePattern};

/// Classify a device's event history into issue patterns.
///
/// Runs one O(n log n) sort plus two O(n) linear scans: rapid state
/// changes over stateful (boolean/enum) attributes, and connectivity gaps
/// over all events. Callers always receive at least one pattern; when
/// nothing qualifies, a single `normal` classification explains that.
///
/// Idempotent: the input slice is cloned and sorted internally, so
/// repeated runs over the same immutable history yield identical results.
pub fn detect(events: &[EventRecord], config: &PatternConfig) -> Vec<IssuePattern> {
    // 0 or 1 events: no gap arithmetic is possible.
    if events.len() < 2 {
        return vec![normal_fallback(events.len(), config)];
    }

    let mut sorted: Vec<&EventRecord> = events.iter().collect();
    sorted.sort_by_key(|e| e.epoch_ms);

    let mut patterns = Vec::new();
    if let Some(rapid) = detect_rapid_changes(&sorted, config) {
        patterns.push(rapid);
    }
    if let Some(gaps) = detect_connectivity_gaps(&sorted, config) {
        patterns.push(gaps);
    }

    if patterns.is_empty() {
        patterns.push(normal_fallback(events.len(), config));
    }
    patterns
}

fn normal_fallback(event_count: usize, config: &PatternConfig) -> IssuePattern {
    IssuePattern::new(
        IssueKind::Normal,
        format!("no anomalous patterns across {event_count} events"),
        0,
        config.normal_confidence,
    )
}

/// Scan consecutive differing-value events on stateful attributes.
///
/// Confidence by gap band: below `rapid_fast_ms` the change is
/// automation-trigger shaped and confidence interpolates from the ceiling
/// (instant) down to the floor (at the band edge); the middle band scores
/// the floor, the slow band a fixed lower value. Immediate off→on
/// re-triggers in the off-peak window get a small boost, since unattended
/// automations more commonly fire then.
fn detect_rapid_changes(sorted: &[&EventRecord], config: &PatternConfig) -> Option<IssuePattern> {
    // Group per attribute before windowing: a flip on one attribute must
    // still count when events from other attributes land between its two
    // halves in the merged stream. BTreeMap keeps the scan order stable.
    let mut by_attribute: BTreeMap<&str, Vec<&EventRecord>> = BTreeMap::new();
    for event in sorted.iter().copied().filter(|e| e.value.is_stateful()) {
        by_attribute
            .entry(event.attribute.as_str())
            .or_default()
            .push(event);
    }

    let mut occurrences = 0usize;
    let mut best_confidence: f32 = 0.0;
    let mut fastest_gap_ms: i64 = i64::MAX;

    for series in by_attribute.values() {
        for pair in series.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            if prev.value == next.value {
                continue;
            }
            let gap_ms = next.epoch_ms - prev.epoch_ms;
            let Some(mut confidence) = band_confidence(gap_ms, config) else {
                continue;
            };
            if is_off_on_retrigger(&prev.value, &next.value) && in_off_peak(next, config) {
                confidence =
                    (confidence + config.off_peak_boost).min(config.rapid_confidence_ceiling);
            }
            occurrences += 1;
            best_confidence = best_confidence.max(confidence);
            fastest_gap_ms = fastest_gap_ms.min(gap_ms);
        }
    }

    if occurrences == 0 {
        return None;
    }
    Some(IssuePattern::new(
        IssueKind::RapidChanges,
        format!(
            "{occurrences} rapid state change(s), fastest {fastest_gap_ms} ms apart; \
             consistent with an automation trigger"
        ),
        occurrences,
        best_confidence,
    ))
}

/// Map a state-change gap to its band confidence; `None` when the gap is
/// too slow to count as rapid.
fn band_confidence(gap_ms: i64, config: &PatternConfig) -> Option<f32> {
    if gap_ms < 0 {
        return None;
    }
    if gap_ms < config.rapid_fast_ms {
        let span = (config.rapid_confidence_ceiling - config.rapid_confidence_floor).max(0.0);
        let fraction = gap_ms as f32 / config.rapid_fast_ms as f32;
        Some(config.rapid_confidence_ceiling - span * fraction)
    } else if gap_ms <= config.rapid_medium_ms {
        Some(config.rapid_confidence_floor)
    } else if gap_ms <= config.rapid_slow_ms {
        Some(config.rapid_confidence_slow)
    } else {
        None
    }
}

fn is_off_on_retrigger(prev: &AttributeValue, next: &AttributeValue) -> bool {
    prev.is_off() && next.is_on()
}

fn in_off_peak(event: &EventRecord, config: &PatternConfig) -> bool {
    let hour = event.timestamp().hour();
    if config.off_peak_start_hour <= config.off_peak_end_hour {
        (config.off_peak_start_hour..config.off_peak_end_hour).contains(&hour)
    } else {
        // Window wraps midnight.
        hour >= config.off_peak_start_hour || hour < config.off_peak_end_hour
    }
}

/// Scan all events (not filtered to state changes) for long silences.
///
/// Fixed, intentionally lower confidence than the automation-trigger
/// bands: a large gap may be deliberate (vacation mode, a rarely used
/// device), not a fault.
fn detect_connectivity_gaps(
    sorted: &[&EventRecord],
    config: &PatternConfig,
) -> Option<IssuePattern> {
    let mut gaps = Vec::new();
    for pair in sorted.windows(2) {
        let duration_ms = pair[1].epoch_ms - pair[0].epoch_ms;
        if duration_ms > config.connectivity_gap_ms {
            gaps.push(EventGap::new(pair[0].epoch_ms, pair[1].epoch_ms, true));
        }
    }
    if gaps.is_empty() {
        return None;
    }
    let longest = gaps.iter().map(|g| g.duration_ms).max().unwrap_or(0);
    Some(
        IssuePattern::new(
            IssueKind::ConnectivityGap,
            format!(
                "{} event gap(s) exceeding {} ms, longest {} ms; device may be \
                 dropping off the network",
                gaps.len(),
                config.connectivity_gap_ms,
                longest
            ),
            gaps.len(),
            config.connectivity_confidence,
        )
        .with_gaps(gaps),
    )
}
