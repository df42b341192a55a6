//! Webhook payload normalization.
//!
//! Notion delivers page events as `{data: {id, properties: {...}}}` where
//! every property has a type-specific shape. Nothing about that shape is
//! trusted: every lookup falls back to an empty value.

use serde_json::Value;

use super::types::{InboundEvent, RecordSnapshot};

pub const DEFAULT_TITLE_PROPERTY: &str = "Name";

const DAYS_REMAINING_PROPERTY: &str = "Days remaining";
const DUE_DATE_PROPERTY: &str = "Due date";
const STATUS_PROPERTY: &str = "Status";
const PRIORITY_PROPERTY: &str = "Priority";
const TASK_TYPE_PROPERTY: &str = "Task type";

/// Reason a payload was dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidPayload {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("payload has no record id")]
    MissingRecordId,
    #[error("payload has an empty title")]
    EmptyTitle,
}

/// Extracts the record id and title from raw webhook bodies.
#[derive(Debug, Clone)]
pub struct PayloadNormalizer {
    title_property: String,
}

impl Default for PayloadNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE_PROPERTY)
    }
}

impl PayloadNormalizer {
    pub fn new(title_property: impl Into<String>) -> Self {
        Self {
            title_property: title_property.into(),
        }
    }

    /// Normalize a raw webhook body into an [`InboundEvent`].
    pub fn normalize(&self, raw: &Value) -> Result<InboundEvent, InvalidPayload> {
        if !raw.is_object() {
            return Err(InvalidPayload::NotAnObject);
        }

        let data = raw.get("data");
        let record_id = str_at(data, &["id"]).unwrap_or_default();
        let properties = data.and_then(|d| d.get("properties"));

        let raw_title = join_fragments(
            array_at(properties, &[self.title_property.as_str(), "title"]),
            "plain_text",
        );

        if record_id.is_empty() {
            return Err(InvalidPayload::MissingRecordId);
        }
        if raw_title.is_empty() {
            return Err(InvalidPayload::EmptyTitle);
        }

        Ok(InboundEvent {
            record_id: record_id.to_string(),
            raw_title,
            snapshot: snapshot(properties),
        })
    }
}

/// Read the record's existing properties, with the same fallbacks the
/// dashboard shows for missing values.
fn snapshot(properties: Option<&Value>) -> RecordSnapshot {
    let defaults = RecordSnapshot::default();
    let text = |path: &[&str], fallback: String| {
        str_at(properties, path)
            .map(str::to_string)
            .unwrap_or(fallback)
    };

    RecordSnapshot {
        days_remaining: text(
            &[DAYS_REMAINING_PROPERTY, "formula", "string"],
            defaults.days_remaining,
        ),
        due_date: text(&[DUE_DATE_PROPERTY, "date", "start"], defaults.due_date),
        status: text(&[STATUS_PROPERTY, "status", "name"], defaults.status),
        priority: text(&[PRIORITY_PROPERTY, "select", "name"], defaults.priority),
        task_types: array_at(properties, &[TASK_TYPE_PROPERTY, "multi_select"])
            .iter()
            .filter_map(|t| t.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect(),
    }
}

fn value_at<'a>(root: Option<&'a Value>, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root?, |node, key| node.get(*key))
}

fn str_at<'a>(root: Option<&'a Value>, path: &[&str]) -> Option<&'a str> {
    value_at(root, path).and_then(Value::as_str)
}

fn array_at<'a>(root: Option<&'a Value>, path: &[&str]) -> &'a [Value] {
    value_at(root, path)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Concatenate the `key` field of each rich-text fragment, in order.
fn join_fragments(fragments: &[Value], key: &str) -> String {
    fragments
        .iter()
        .filter_map(|f| f.get(key).and_then(Value::as_str))
        .collect()
}
