//! Task types shared by the pipeline stages.

use std::fmt;

use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Closed set of task categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Errand,
    #[serde(rename = "Health & Life")]
    HealthAndLife,
    #[serde(rename = "University Work")]
    UniversityWork,
    #[serde(rename = "Extracurricular Work")]
    ExtracurricularWork,
    Chores,
    Hobby,
    #[serde(rename = "Social Event")]
    SocialEvent,
    #[serde(rename = "Physical Activity")]
    PhysicalActivity,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Errand,
        Category::HealthAndLife,
        Category::UniversityWork,
        Category::ExtracurricularWork,
        Category::Chores,
        Category::Hobby,
        Category::SocialEvent,
        Category::PhysicalActivity,
    ];

    /// Display name, identical to the destination select option.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Errand => "Errand",
            Self::HealthAndLife => "Health & Life",
            Self::UniversityWork => "University Work",
            Self::ExtracurricularWork => "Extracurricular Work",
            Self::Chores => "Chores",
            Self::Hobby => "Hobby",
            Self::SocialEvent => "Social Event",
            Self::PhysicalActivity => "Physical Activity",
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Self::Chores
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Properties already present on the record when the event arrived.
///
/// Only used for diagnostics; nothing here feeds the extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSnapshot {
    pub days_remaining: String,
    pub due_date: String,
    pub status: String,
    pub priority: String,
    pub task_types: Vec<String>,
}

impl Default for RecordSnapshot {
    fn default() -> Self {
        Self {
            days_remaining: "Unknown".to_string(),
            due_date: "No due date".to_string(),
            status: "Unknown".to_string(),
            priority: "Unknown".to_string(),
            task_types: Vec::new(),
        }
    }
}

/// A validated webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub record_id: String,
    /// Concatenated title fragments, untrimmed.
    pub raw_title: String,
    pub snapshot: RecordSnapshot,
}

/// Structured metadata inferred from a task title.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskExtraction {
    pub category: Category,
    pub priority: Priority,
    /// Due date anchored to US Eastern.
    pub due_date: Option<DateTime<Tz>>,
    pub summary: String,
    pub is_urgent: bool,
    /// Self-reported confidence in `[0, 1]`, only present when requested.
    pub confidence: Option<f64>,
}

impl TaskExtraction {
    /// ISO-8601 form of the due date with its UTC offset, e.g.
    /// `2025-11-20T23:59:00-05:00`.
    pub fn due_date_iso(&self) -> Option<String> {
        self.due_date.map(|dt| dt.to_rfc3339())
    }
}

/// Result of a single write-back attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub success: bool,
    pub detail: String,
}

impl UpdateOutcome {
    pub fn ok(detail: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: detail.into(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: detail.into(),
        }
    }
}
