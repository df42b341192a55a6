//! Write-back of extracted metadata to Notion pages.
//!
//! The destination is write-only from this service's point of view: pages
//! are patched with a partial property set and never read back.

mod client;
mod properties;

pub use client::{NotionClient, NOTION_API_URL, NOTION_VERSION};
pub use properties::{ExtractionField, PropertyMap};

use async_trait::async_trait;

use crate::task::{TaskExtraction, UpdateOutcome};

/// Destination for extracted task metadata.
///
/// Implementations perform exactly one write per call and never fail:
/// transport and API errors come back as `UpdateOutcome { success: false }`.
#[async_trait]
pub trait RecordWriter: Send + Sync {
    async fn apply_update(&self, record_id: &str, extraction: &TaskExtraction) -> UpdateOutcome;
}
