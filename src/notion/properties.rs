//! Mapping from extracted fields to Notion page properties.

use serde_json::{json, Map, Value};

use crate::task::{Category, Priority, TaskExtraction};

/// A field of [`TaskExtraction`] that can be written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionField {
    /// `select` property
    Category,
    /// `select` property
    Priority,
    /// `title` property; replaces the original title
    Summary,
    /// `date` property
    DueDate,
    /// `checkbox` property
    Urgent,
}

/// Which destination property each extracted field is written to.
///
/// Fields without an entry are never written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMap {
    entries: Vec<(ExtractionField, String)>,
}

impl Default for PropertyMap {
    fn default() -> Self {
        Self::new()
            .map(ExtractionField::Category, "Category")
            .map(ExtractionField::Priority, "Priority")
            .map(ExtractionField::Summary, "Name")
            .map(ExtractionField::DueDate, "Due date")
    }
}

impl PropertyMap {
    /// An empty map.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Map `field` to `property`, replacing any earlier mapping for `field`.
    pub fn map(mut self, field: ExtractionField, property: impl Into<String>) -> Self {
        self.entries.retain(|(f, _)| *f != field);
        self.entries.push((field, property.into()));
        self
    }

    pub fn property_for(&self, field: ExtractionField) -> Option<&str> {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, p)| p.as_str())
    }

    /// Build the partial `properties` object for a page update.
    ///
    /// Absent values (no due date, blank summary) are left out so the page
    /// keeps whatever it already has.
    pub fn update_properties(&self, extraction: &TaskExtraction) -> Map<String, Value> {
        let mut properties = Map::new();
        for (field, property) in &self.entries {
            if let Some(value) = property_value(*field, extraction) {
                properties.insert(property.clone(), value);
            }
        }
        properties
    }

    /// Full request body for `PATCH /v1/pages/{id}`.
    pub fn update_body(&self, extraction: &TaskExtraction) -> Value {
        json!({ "properties": self.update_properties(extraction) })
    }
}

fn property_value(field: ExtractionField, extraction: &TaskExtraction) -> Option<Value> {
    match field {
        ExtractionField::Category => Some(select(
            extraction.category.as_str(),
            Category::default().as_str(),
        )),
        ExtractionField::Priority => Some(select(
            extraction.priority.as_str(),
            Priority::default().as_str(),
        )),
        ExtractionField::Summary => {
            let summary = extraction.summary.trim();
            if summary.is_empty() {
                None
            } else {
                Some(json!({ "title": [{ "text": { "content": summary } }] }))
            }
        }
        ExtractionField::DueDate => extraction
            .due_date_iso()
            .map(|start| json!({ "date": { "start": start } })),
        ExtractionField::Urgent => Some(json!({ "checkbox": extraction.is_urgent })),
    }
}

/// Single-choice property, falling back to `default` for an empty name.
fn select(name: &str, default: &str) -> Value {
    let name = if name.trim().is_empty() { default } else { name };
    json!({ "select": { "name": name } })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::timezone::parse_eastern;

    fn extraction() -> TaskExtraction {
        TaskExtraction {
            category: Category::UniversityWork,
            priority: Priority::High,
            due_date: Some(parse_eastern("2025-11-20T23:59:00").unwrap()),
            summary: "Finish lab report".to_string(),
            is_urgent: true,
            confidence: None,
        }
    }

    #[test]
    fn test_full_update_body() {
        let body = PropertyMap::default().update_body(&extraction());
        assert_eq!(
            body,
            json!({
                "properties": {
                    "Category": { "select": { "name": "University Work" } },
                    "Priority": { "select": { "name": "High" } },
                    "Name": { "title": [{ "text": { "content": "Finish lab report" } }] },
                    "Due date": { "date": { "start": "2025-11-20T23:59:00-05:00" } }
                }
            })
        );
    }

    #[test]
    fn test_absent_date_is_omitted_not_nulled() {
        let mut e = extraction();
        e.due_date = None;
        let props = PropertyMap::default().update_properties(&e);
        assert!(!props.contains_key("Due date"));
        assert_eq!(props.len(), 3);
    }

    #[test]
    fn test_blank_summary_keeps_original_title() {
        let mut e = extraction();
        e.summary = "   ".to_string();
        let props = PropertyMap::default().update_properties(&e);
        assert!(!props.contains_key("Name"));
        assert!(props.contains_key("Category"));
        assert!(props.contains_key("Priority"));
    }

    #[test]
    fn test_custom_mapping() {
        let map = PropertyMap::new()
            .map(ExtractionField::Category, "Category")
            .map(ExtractionField::Priority, "Priority")
            .map(ExtractionField::Category, "Area")
            .map(ExtractionField::Urgent, "Urgent");
        let props = map.update_properties(&extraction());

        assert_eq!(props["Area"], json!({ "select": { "name": "University Work" } }));
        assert_eq!(props["Urgent"], json!({ "checkbox": true }));
        assert!(!props.contains_key("Category"));
        assert!(!props.contains_key("Name"));
        assert_eq!(map.property_for(ExtractionField::Category), Some("Area"));
        assert_eq!(map.property_for(ExtractionField::Summary), None);
    }

    #[test]
    fn test_select_fallback() {
        assert_eq!(select("", "Chores"), json!({ "select": { "name": "Chores" } }));
        assert_eq!(select("Hobby", "Chores"), json!({ "select": { "name": "Hobby" } }));
    }
}
