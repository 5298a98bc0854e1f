//! Fan-out/fan-in assembly of diagnostic reports.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;
use uuid::Uuid;

use crate::config::DiagnosticsConfig;
use crate::error::HearthResult;
use crate::semantic::{SearchFilter, SemanticIndex};
use crate::sync::SyncScheduler;
use crate::types::{
    AutomationDocument, Device, DiagnosticReport, DocumentKind, IssueKind, IssuePattern,
    RankedHit, ReportSection,
};

/// Composes a single diagnostic report from three concurrent sub-queries:
/// pattern detection over recent events, related-automation discovery,
/// and similar-issue search.
///
/// Each sub-call runs under its own timeout; a failure or timeout
/// degrades only its section of the report. The fan-out runs in-task
/// (`tokio::join!`), so dropping the `diagnose` future (e.g. on caller
/// disconnect) cancels all in-flight branches cooperatively and discards
/// partial results.
pub struct DiagnosticOrchestrator {
    semantic: Arc<SemanticIndex>,
    scheduler: Arc<SyncScheduler>,
    config: DiagnosticsConfig,
}

impl DiagnosticOrchestrator {
    pub fn new(
        semantic: Arc<SemanticIndex>,
        scheduler: Arc<SyncScheduler>,
        config: DiagnosticsConfig,
    ) -> Self {
        Self {
            semantic,
            scheduler,
            config,
        }
    }

    /// Build a best-effort diagnostic report for a resolved device.
    ///
    /// Always returns a report; unavailable sections are explicitly
    /// marked, never silently dropped.
    pub async fn diagnose(&self, device: &Device, issue: &str) -> DiagnosticReport {
        let deadline = Duration::from_millis(self.config.call_timeout_ms);

        let patterns_fut = timeout(deadline, self.detect_patterns(device));
        let automations_fut = timeout(deadline, self.find_related_automations(device, issue));
        let similar_fut = timeout(deadline, self.find_similar_issues(issue));

        let (patterns_res, automations_res, similar_res) =
            tokio::join!(patterns_fut, automations_fut, similar_fut);

        let patterns = section_from(patterns_res);
        let related_automations = section_from(automations_res);
        let similar_issues = section_from(similar_res);

        let recommendations = compose_recommendations(&patterns, &related_automations);

        debug!(
            device = %device.id,
            patterns_ok = patterns.is_populated(),
            automations_ok = related_automations.is_populated(),
            similar_ok = similar_issues.is_populated(),
            "diagnostic report assembled"
        );

        DiagnosticReport {
            report_id: Uuid::new_v4(),
            device: device.clone(),
            issue: issue.to_string(),
            patterns,
            related_automations,
            similar_issues,
            recommendations,
            generated_at: chrono::Utc::now(),
        }
    }

    /// Pattern analysis over recent events. Piggybacks on the scheduler's
    /// on-demand refresh so the device's event-pattern document is
    /// rebuilt as part of the diagnostic.
    async fn detect_patterns(&self, device: &Device) -> HearthResult<Vec<IssuePattern>> {
        self.scheduler.refresh_device_patterns(device).await
    }

    /// Automations related to the device: direct trigger/action
    /// references unioned with semantic hits for the issue text.
    ///
    /// Direct references need no embedding call, so this section stays
    /// populated from them even when the semantic backend is down;
    /// it degrades only when both signals are unavailable.
    async fn find_related_automations(
        &self,
        device: &Device,
        issue: &str,
    ) -> HearthResult<Vec<AutomationDocument>> {
        let mut related = self.semantic.automations_for_device(&device.id);

        let query = format!("{} {}", device.name, issue);
        let outcome = self
            .semantic
            .search(
                &query,
                0,
                &SearchFilter::of_kind(DocumentKind::Automation)
                    .with_capabilities(&device.capabilities),
            )
            .await;

        if outcome.degraded && related.is_empty() {
            return Err(crate::error::HearthError::BackendUnavailable(
                "semantic automation search degraded and no direct references found".into(),
            ));
        }
        for hit in &outcome.hits {
            if related.iter().any(|a| a.id == hit.id) {
                continue;
            }
            if let Some(automation) = self.semantic.automation(&hit.id) {
                related.push(automation);
            }
        }
        Ok(related)
    }

    /// Semantically similar past issue patterns across the home.
    async fn find_similar_issues(&self, issue: &str) -> HearthResult<Vec<RankedHit>> {
        let outcome = self
            .semantic
            .search(issue, 0, &SearchFilter::of_kind(DocumentKind::EventPattern))
            .await;
        if outcome.degraded {
            return Err(crate::error::HearthError::BackendUnavailable(
                "semantic similar-issue search degraded".into(),
            ));
        }
        Ok(outcome.hits)
    }
}

/// Map a timed-out / failed / successful branch onto its report section.
fn section_from<T>(
    result: Result<HearthResult<T>, tokio::time::error::Elapsed>,
) -> ReportSection<T> {
    match result {
        Err(_) => ReportSection::TimedOut,
        Ok(Err(err)) => ReportSection::Degraded {
            reason: err.to_string(),
        },
        Ok(Ok(data)) => ReportSection::Populated { data },
    }
}

/// Rule-based next steps from the detected patterns.
fn compose_recommendations(
    patterns: &ReportSection<Vec<IssuePattern>>,
    automations: &ReportSection<Vec<AutomationDocument>>,
) -> Vec<String> {
    let mut recommendations = Vec::new();

    match patterns {
        ReportSection::Populated { data } => {
            for pattern in data {
                match pattern.kind {
                    IssueKind::RapidChanges => {
                        let suspects = automations
                            .as_populated()
                            .map(|autos| {
                                autos
                                    .iter()
                                    .map(|a| a.name.as_str())
                                    .collect::<Vec<_>>()
                                    .join(", ")
                            })
                            .filter(|names| !names.is_empty());
                        match suspects {
                            Some(names) => recommendations.push(format!(
                                "State is cycling faster than manual use; review these \
                                 automations for competing triggers: {names}"
                            )),
                            None => recommendations.push(
                                "State is cycling faster than manual use; review automations \
                                 and schedules targeting this device for competing triggers"
                                    .to_string(),
                            ),
                        }
                    }
                    IssueKind::ConnectivityGap => recommendations.push(format!(
                        "Detected {} long silence(s) in the event stream; check the \
                         device's power, signal strength, and hub placement",
                        pattern.occurrences
                    )),
                    IssueKind::Normal => recommendations.push(
                        "No anomalous event patterns detected; if the problem persists, \
                         check the physical device and its platform status page"
                            .to_string(),
                    ),
                }
            }
        }
        ReportSection::Degraded { .. } | ReportSection::TimedOut => {
            recommendations.push(
                "Event history was unavailable for this diagnostic; retry shortly for \
                 pattern-based findings"
                    .to_string(),
            );
        }
    }

    recommendations
}
