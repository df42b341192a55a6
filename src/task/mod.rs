//! Task module - webhook normalization and structured metadata extraction.
//!
//! - `normalize`: raw Notion payload → [`InboundEvent`]
//! - `extract`: title + current Eastern time → [`TaskExtraction`]
//! - `timezone`: naive date handling for the fixed US Eastern zone

pub mod extract;
pub mod normalize;
pub mod timezone;
mod types;

pub use extract::{ExtractionError, LlmExtractor, TaskExtractor};
pub use normalize::{InvalidPayload, PayloadNormalizer};
pub use types::{Category, InboundEvent, Priority, RecordSnapshot, TaskExtraction, UpdateOutcome};
