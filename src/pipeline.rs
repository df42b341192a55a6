//! Event pipeline: normalize → extract → gated write-back.
//!
//! Each webhook event walks
//! `Received → Normalized → Extracted → (Updated | Skipped) → Done`
//! exactly once. Nothing is retried and no failure escapes [`Pipeline::handle`];
//! the caller only learns whether the payload was usable.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::DateTime;
use chrono_tz::Tz;
use mockable::{Clock, DefaultClock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::notion::RecordWriter;
use crate::task::timezone::EASTERN;
use crate::task::{PayloadNormalizer, TaskExtraction, TaskExtractor, UpdateOutcome};

/// Decides whether a successful extraction is written back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WritePolicy {
    /// Write whenever a valid extraction exists.
    Always,
    /// Write only when the model reports at least this confidence.
    MinConfidence(f64),
    /// Never write; log what would have been written.
    DryRun,
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self::Always
    }
}

impl WritePolicy {
    pub fn should_write(&self, extraction: &TaskExtraction) -> bool {
        match self {
            Self::Always => true,
            Self::MinConfidence(threshold) => extraction
                .confidence
                .map_or(false, |c| c >= *threshold),
            Self::DryRun => false,
        }
    }

    /// Whether the extractor must ask the model for a confidence score.
    pub fn needs_confidence(&self) -> bool {
        matches!(self, Self::MinConfidence(_))
    }
}

impl fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "always"),
            Self::MinConfidence(t) => write!(f, "min-confidence({})", t),
            Self::DryRun => write!(f, "dry-run"),
        }
    }
}

impl FromStr for WritePolicy {
    type Err = String;

    /// Parses `always`, `dry-run`, or `min-confidence` (threshold 0.4).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "dry-run" | "dryrun" | "never" => Ok(Self::DryRun),
            "min-confidence" | "confidence" => Ok(Self::MinConfidence(DEFAULT_MIN_CONFIDENCE)),
            other => Err(format!("unknown write policy '{}'", other)),
        }
    }
}

pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.4;

/// Coarse status reported to the webhook caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Payload was unusable; nothing else ran.
    Ignored,
    /// Payload was valid; downstream results are in the logs.
    Received,
}

/// Terminal stage an event reached before `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Normalized,
    Extracted,
    Updated,
    Skipped,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Normalized => "normalized",
            Self::Extracted => "extracted",
            Self::Updated => "updated",
            Self::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

/// What happened to one event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventReport {
    pub status: EventStatus,
    /// Last stage reached before `Done`.
    pub stage: Stage,
    pub extraction: Option<TaskExtraction>,
    /// Present only when a write was attempted.
    pub outcome: Option<UpdateOutcome>,
}

impl EventReport {
    fn ignored() -> Self {
        Self {
            status: EventStatus::Ignored,
            stage: Stage::Received,
            extraction: None,
            outcome: None,
        }
    }
}

/// Immutable per-process pipeline, shared across concurrent events.
pub struct Pipeline {
    normalizer: PayloadNormalizer,
    extractor: Arc<dyn TaskExtractor>,
    writer: Arc<dyn RecordWriter>,
    policy: WritePolicy,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl Pipeline {
    pub fn new(extractor: Arc<dyn TaskExtractor>, writer: Arc<dyn RecordWriter>) -> Self {
        Self {
            normalizer: PayloadNormalizer::default(),
            extractor,
            writer,
            policy: WritePolicy::default(),
            clock: Arc::new(DefaultClock),
        }
    }

    pub fn with_normalizer(mut self, normalizer: PayloadNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_policy(mut self, policy: WritePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    fn now_eastern(&self) -> DateTime<Tz> {
        self.clock.utc().with_timezone(&EASTERN)
    }

    /// Run one webhook payload to completion.
    pub async fn handle(&self, payload: &Value) -> EventReport {
        let span = tracing::info_span!("event", event_id = %Uuid::new_v4());
        self.run(payload).instrument(span).await
    }

    async fn run(&self, payload: &Value) -> EventReport {
        tracing::debug!(stage = %Stage::Received, "Webhook event received");

        let event = match self.normalizer.normalize(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(stage = %Stage::Received, reason = %e, "Event ignored");
                return EventReport::ignored();
            }
        };

        let record_id = event.record_id.as_str();
        tracing::info!(
            record_id,
            stage = %Stage::Normalized,
            title = %event.raw_title,
            "New task event"
        );
        tracing::debug!(
            record_id,
            days_remaining = %event.snapshot.days_remaining,
            due_date = %event.snapshot.due_date,
            status = %event.snapshot.status,
            priority = %event.snapshot.priority,
            task_types = ?event.snapshot.task_types,
            "Existing record properties"
        );

        let now = self.now_eastern();
        let extraction = match self.extractor.extract(&event.raw_title, now).await {
            Ok(extraction) => extraction,
            Err(e) => {
                tracing::error!(
                    record_id,
                    stage = %Stage::Normalized,
                    "Extraction failed, no update performed: {}",
                    e
                );
                return EventReport {
                    status: EventStatus::Received,
                    stage: Stage::Normalized,
                    extraction: None,
                    outcome: None,
                };
            }
        };

        tracing::info!(
            record_id,
            stage = %Stage::Extracted,
            category = %extraction.category,
            priority = %extraction.priority,
            due_date = ?extraction.due_date_iso(),
            summary = %extraction.summary,
            is_urgent = extraction.is_urgent,
            confidence = ?extraction.confidence,
            "Task metadata extracted"
        );

        if !self.policy.should_write(&extraction) {
            tracing::info!(
                record_id,
                stage = %Stage::Skipped,
                policy = %self.policy,
                "Update skipped by write policy"
            );
            return EventReport {
                status: EventStatus::Received,
                stage: Stage::Skipped,
                extraction: Some(extraction),
                outcome: None,
            };
        }

        let outcome = self.writer.apply_update(record_id, &extraction).await;
        if outcome.success {
            tracing::info!(record_id, stage = %Stage::Updated, "Record updated");
        } else {
            tracing::warn!(
                record_id,
                stage = %Stage::Updated,
                detail = %outcome.detail,
                "Record update failed"
            );
        }

        EventReport {
            status: EventStatus::Received,
            stage: Stage::Updated,
            extraction: Some(extraction),
            outcome: Some(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::timezone::parse_eastern;
    use crate::task::{Category, ExtractionError, Priority};
    use async_trait::async_trait;
    use chrono::{Local, TimeZone, Utc};
    use serde_json::json;
    use std::sync::Mutex;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn local(&self) -> DateTime<Local> {
            self.0.with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            self.0
        }
    }

    struct FakeExtractor {
        result: fn() -> Result<TaskExtraction, ExtractionError>,
        calls: Mutex<Vec<(String, DateTime<Tz>)>>,
    }

    impl FakeExtractor {
        fn new(result: fn() -> Result<TaskExtraction, ExtractionError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, DateTime<Tz>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TaskExtractor for FakeExtractor {
        async fn extract(
            &self,
            title: &str,
            now: DateTime<Tz>,
        ) -> Result<TaskExtraction, ExtractionError> {
            self.calls.lock().unwrap().push((title.to_string(), now));
            (self.result)()
        }
    }

    struct FakeWriter {
        success: bool,
        calls: Mutex<Vec<(String, TaskExtraction)>>,
    }

    impl FakeWriter {
        fn new(success: bool) -> Arc<Self> {
            Arc::new(Self {
                success,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RecordWriter for FakeWriter {
        async fn apply_update(
            &self,
            record_id: &str,
            extraction: &TaskExtraction,
        ) -> UpdateOutcome {
            self.calls
                .lock()
                .unwrap()
                .push((record_id.to_string(), extraction.clone()));
            if self.success {
                UpdateOutcome::ok("{}")
            } else {
                UpdateOutcome::failed("404 Not Found - {}")
            }
        }
    }

    fn lab_report() -> Result<TaskExtraction, ExtractionError> {
        Ok(TaskExtraction {
            category: Category::UniversityWork,
            priority: Priority::High,
            due_date: Some(parse_eastern("2025-11-20T23:59:00").unwrap()),
            summary: "Finish lab report".to_string(),
            is_urgent: true,
            confidence: Some(0.9),
        })
    }

    fn unsure() -> Result<TaskExtraction, ExtractionError> {
        lab_report().map(|e| TaskExtraction {
            confidence: Some(0.2),
            ..e
        })
    }

    fn malformed() -> Result<TaskExtraction, ExtractionError> {
        Err(ExtractionError::MalformedJson(
            serde_json::from_str::<Value>("{oops").unwrap_err(),
        ))
    }

    fn payload(id: &str, fragments: &[&str]) -> Value {
        let title: Vec<Value> = fragments
            .iter()
            .map(|t| json!({ "plain_text": t }))
            .collect();
        json!({ "data": { "id": id, "properties": { "Name": { "title": title } } } })
    }

    fn pipeline(extractor: Arc<FakeExtractor>, writer: Arc<FakeWriter>) -> Pipeline {
        // 2025-11-19 14:05 EST
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 11, 19, 19, 5, 0).unwrap());
        Pipeline::new(extractor, writer).with_clock(Arc::new(clock))
    }

    #[tokio::test]
    async fn test_invalid_payload_is_ignored() {
        let extractor = FakeExtractor::new(lab_report);
        let writer = FakeWriter::new(true);
        let p = pipeline(extractor.clone(), writer.clone());

        for bad in [
            json!({}),
            json!("string body"),
            payload("", &["Finish lab report"]),
            payload("page-1", &[]),
            payload("page-1", &[""]),
        ] {
            let report = p.handle(&bad).await;
            assert_eq!(report.status, EventStatus::Ignored);
            assert_eq!(report.stage, Stage::Received);
        }

        assert!(extractor.calls().is_empty());
        assert_eq!(writer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_valid_event_extracts_once_and_writes_once() {
        let extractor = FakeExtractor::new(lab_report);
        let writer = FakeWriter::new(true);
        let p = pipeline(extractor.clone(), writer.clone());

        let report = p
            .handle(&payload("page-1", &["Finish ", "lab report "]))
            .await;

        assert_eq!(report.status, EventStatus::Received);
        assert_eq!(report.stage, Stage::Updated);
        assert!(report.outcome.unwrap().success);

        let calls = extractor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "Finish lab report ");
        assert_eq!(calls[0].1.to_rfc3339(), "2025-11-19T14:05:00-05:00");

        let writes = writer.calls.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "page-1");
        assert_eq!(writes[0].1.summary, "Finish lab report");
    }

    #[tokio::test]
    async fn test_extraction_failure_skips_write() {
        let extractor = FakeExtractor::new(malformed);
        let writer = FakeWriter::new(true);
        let p = pipeline(extractor.clone(), writer.clone());

        let report = p.handle(&payload("page-1", &["Buy milk"])).await;

        assert_eq!(report.status, EventStatus::Received);
        assert_eq!(report.stage, Stage::Normalized);
        assert_eq!(extractor.calls().len(), 1);
        assert_eq!(writer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_still_received() {
        let extractor = FakeExtractor::new(lab_report);
        let writer = FakeWriter::new(false);
        let p = pipeline(extractor, writer.clone());

        let report = p.handle(&payload("page-1", &["Finish lab report"])).await;

        assert_eq!(report.status, EventStatus::Received);
        assert_eq!(report.stage, Stage::Updated);
        assert!(!report.outcome.unwrap().success);
        assert_eq!(writer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_never_writes() {
        let extractor = FakeExtractor::new(lab_report);
        let writer = FakeWriter::new(true);
        let p = pipeline(extractor.clone(), writer.clone()).with_policy(WritePolicy::DryRun);

        let report = p.handle(&payload("page-1", &["Finish lab report"])).await;

        assert_eq!(report.status, EventStatus::Received);
        assert_eq!(report.stage, Stage::Skipped);
        assert!(report.extraction.is_some());
        assert_eq!(extractor.calls().len(), 1);
        assert_eq!(writer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_min_confidence_gate() {
        let writer = FakeWriter::new(true);
        let p = pipeline(FakeExtractor::new(unsure), writer.clone())
            .with_policy(WritePolicy::MinConfidence(0.4));
        let report = p.handle(&payload("page-1", &["Something vague"])).await;
        assert_eq!(report.stage, Stage::Skipped);
        assert_eq!(writer.call_count(), 0);

        let p = pipeline(FakeExtractor::new(lab_report), writer.clone())
            .with_policy(WritePolicy::MinConfidence(0.4));
        let report = p.handle(&payload("page-1", &["Finish lab report"])).await;
        assert_eq!(report.stage, Stage::Updated);
        assert_eq!(writer.call_count(), 1);
    }

    #[test]
    fn test_should_write() {
        let mut e = lab_report().unwrap();
        assert!(WritePolicy::Always.should_write(&e));
        assert!(!WritePolicy::DryRun.should_write(&e));
        assert!(WritePolicy::MinConfidence(0.9).should_write(&e));
        assert!(!WritePolicy::MinConfidence(0.95).should_write(&e));
        e.confidence = None;
        assert!(WritePolicy::Always.should_write(&e));
        assert!(!WritePolicy::MinConfidence(0.0).should_write(&e));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("always".parse::<WritePolicy>(), Ok(WritePolicy::Always));
        assert_eq!(" Dry-Run ".parse::<WritePolicy>(), Ok(WritePolicy::DryRun));
        assert_eq!(
            "min-confidence".parse::<WritePolicy>(),
            Ok(WritePolicy::MinConfidence(0.4))
        );
        assert!("sometimes".parse::<WritePolicy>().is_err());
        assert!(WritePolicy::MinConfidence(0.4).needs_confidence());
        assert!(!WritePolicy::Always.needs_confidence());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_value(EventStatus::Ignored).unwrap(),
            json!("ignored")
        );
        assert_eq!(
            serde_json::to_value(EventStatus::Received).unwrap(),
            json!("received")
        );
    }
}
