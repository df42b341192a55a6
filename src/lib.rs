//! # task-sync
//!
//! Receives Notion page webhooks, infers task metadata from the page title
//! with a language model, and writes the result back to the page.
//!
//! ## Architecture
//!
//! ```text
//!   POST /webhook
//!        │
//!        ▼
//!   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!   │  normalize   │──▶│   extract    │──▶│  write-back  │
//!   │ (task::      │   │ (LlmExtractor│   │ (NotionClient│
//!   │  normalize)  │   │  + llm)      │   │  + policy)   │
//!   └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! ## Event Flow
//! 1. Extract record id and title from the payload (or ignore the event)
//! 2. Ask the model for category, priority, due date, summary and urgency
//! 3. Anchor the due date to US Eastern time
//! 4. Patch the Notion page if the write policy allows it
//! 5. Answer 200 with `{"status": "ignored" | "received"}`
//!
//! ## Modules
//! - `api`: axum routes and server bootstrap
//! - `pipeline`: the per-event state machine and write policy
//! - `task`: payload normalization, extraction and date handling
//! - `llm`: chat-completion client with structured output
//! - `notion`: page update client and property mapping

pub mod api;
pub mod config;
pub mod llm;
pub mod notion;
pub mod pipeline;
pub mod task;

pub use config::Config;
pub use pipeline::{Pipeline, WritePolicy};
