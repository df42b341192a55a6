//! Structured extraction of task metadata from a title.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::{json, Value};

use super::timezone::{self, DateError};
use super::types::{Category, Priority, TaskExtraction};
use crate::llm::{ChatMessage, ChatOptions, LlmClient, LlmError, ResponseFormat};

const SCHEMA_NAME: &str = "task_extraction";

/// Why an extraction produced no result.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("inference failed: {0}")]
    Inference(#[from] LlmError),
    #[error("model returned no content")]
    EmptyResponse,
    #[error("model returned malformed JSON: {0}")]
    MalformedJson(#[source] serde_json::Error),
    #[error("model output does not match schema: {0}")]
    Schema(String),
    #[error(transparent)]
    Date(#[from] DateError),
}

/// Turns a raw task title into structured metadata.
///
/// Contract for implementations: the returned `due_date` is already anchored
/// to US Eastern. Upstream models are asked for naive Eastern wall-clock
/// times, and [`timezone::annotate_eastern`] is the only place a zone is
/// attached.
#[async_trait]
pub trait TaskExtractor: Send + Sync {
    /// Make exactly one extraction attempt for `title`, resolving relative
    /// dates against `now`.
    async fn extract(&self, title: &str, now: DateTime<Tz>)
        -> Result<TaskExtraction, ExtractionError>;
}

/// [`TaskExtractor`] backed by a chat-completion model with strict
/// structured output.
pub struct LlmExtractor {
    llm: Arc<dyn LlmClient>,
    model: String,
    request_confidence: bool,
}

impl LlmExtractor {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            request_confidence: false,
        }
    }

    /// Also ask the model for a self-reported confidence score.
    pub fn with_confidence(mut self, request_confidence: bool) -> Self {
        self.request_confidence = request_confidence;
        self
    }
}

#[async_trait]
impl TaskExtractor for LlmExtractor {
    async fn extract(
        &self,
        title: &str,
        now: DateTime<Tz>,
    ) -> Result<TaskExtraction, ExtractionError> {
        let messages = [
            ChatMessage::system(system_prompt(self.request_confidence)),
            ChatMessage::user(user_prompt(title, now)),
        ];
        let options = ChatOptions {
            temperature: Some(0.0),
            max_tokens: Some(300),
            response_format: Some(ResponseFormat::strict_schema(
                SCHEMA_NAME,
                extraction_schema(self.request_confidence),
            )),
        };

        let response = self
            .llm
            .chat_completion(&self.model, &messages, options)
            .await?;

        tracing::debug!(
            model = ?response.model,
            finish_reason = ?response.finish_reason,
            total_tokens = ?response.usage.as_ref().map(|u| u.total_tokens),
            "Extraction completed"
        );

        let content = response
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or(ExtractionError::EmptyResponse)?;

        parse_extraction(&content)
    }
}

/// Instructions that do not depend on the event.
fn system_prompt(request_confidence: bool) -> String {
    let categories = Category::ALL
        .iter()
        .map(Category::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let priorities = Priority::ALL
        .iter()
        .map(Priority::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    let confidence = if request_confidence {
        "- confidence: a number between 0 and 1 for how sure you are of the category\n"
    } else {
        ""
    };

    format!(
        "You organise a personal task list. Given a task title, return JSON with:\n\
         - category: exactly one of [{categories}]\n\
         - priority: exactly one of [{priorities}]\n\
         - due_date_iso: the due date as a naive local date-time in US Eastern time, \
         formatted YYYY-MM-DDTHH:MM:SS with no UTC offset, or null\n\
         - summary: a clean 3-5 word title for the task\n\
         - is_urgent: true if the task needs attention within a day\n\
         {confidence}\
         \n\
         Date rules:\n\
         - Resolve relative terms such as \"tomorrow\" or \"next Friday\" against the \
         current date and time given in the request, never against any other time.\n\
         - If a time of day is mentioned, keep it exactly.\n\
         - If no time of day is mentioned, use 23:59:00.\n\
         - If the title implies no date at all, due_date_iso must be null. \
         Never invent a date."
    )
}

/// Per-event request carrying the title and temporal context.
fn user_prompt(title: &str, now: DateTime<Tz>) -> String {
    format!(
        "Current date and time (US Eastern): {}\nDay of week: {}\nTask title: {}",
        now.format("%Y-%m-%dT%H:%M:%S"),
        now.format("%A"),
        title
    )
}

/// JSON schema for the structured output.
///
/// Strict mode requires every property to be listed as required; optional
/// values are expressed as nullable types.
pub fn extraction_schema(request_confidence: bool) -> Value {
    let mut properties = json!({
        "category": {
            "type": "string",
            "enum": Category::ALL.iter().map(Category::as_str).collect::<Vec<_>>()
        },
        "priority": {
            "type": "string",
            "enum": Priority::ALL.iter().map(Priority::as_str).collect::<Vec<_>>()
        },
        "due_date_iso": {
            "type": ["string", "null"],
            "description": "Naive US Eastern date-time YYYY-MM-DDTHH:MM:SS, or null"
        },
        "summary": {
            "type": "string",
            "description": "3-5 word task title"
        },
        "is_urgent": { "type": "boolean" }
    });
    let mut required = vec!["category", "priority", "due_date_iso", "summary", "is_urgent"];

    if request_confidence {
        properties["confidence"] = json!({ "type": "number", "minimum": 0, "maximum": 1 });
        required.push("confidence");
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

/// Wire shape of the model output.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawExtraction {
    category: Category,
    priority: Priority,
    due_date_iso: Option<String>,
    summary: String,
    is_urgent: bool,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Validate model output and anchor its date to Eastern time.
pub fn parse_extraction(content: &str) -> Result<TaskExtraction, ExtractionError> {
    let value: Value = serde_json::from_str(content).map_err(ExtractionError::MalformedJson)?;
    let raw: RawExtraction =
        serde_json::from_value(value).map_err(|e| ExtractionError::Schema(e.to_string()))?;

    if let Some(c) = raw.confidence {
        if !(0.0..=1.0).contains(&c) {
            return Err(ExtractionError::Schema(format!(
                "confidence {} is outside [0, 1]",
                c
            )));
        }
    }

    let due_date = match raw.due_date_iso.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) => Some(timezone::parse_eastern(s)?),
    };

    Ok(TaskExtraction {
        category: raw.category,
        priority: raw.priority,
        due_date,
        summary: raw.summary.trim().to_string(),
        is_urgent: raw.is_urgent,
        confidence: raw.confidence,
    })
}
