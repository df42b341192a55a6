//! Process configuration.
//!
//! Read once from the environment at startup. Missing credentials abort the
//! process before the server binds; nothing is re-read per request.
//!
//! Required:
//! - `OPENROUTER_API_KEY` - credential for the inference endpoint
//! - `NOTION_TOKEN` - integration token for the Notion API
//!
//! Everything else has a default; see [`Config::from_lookup`].

use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

use crate::llm::OPENROUTER_API_URL;
use crate::notion::{ExtractionField, PropertyMap, NOTION_API_URL, NOTION_VERSION};
use crate::pipeline::{WritePolicy, DEFAULT_MIN_CONFIDENCE};
use crate::task::normalize::DEFAULT_TITLE_PROPERTY;

pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Inference endpoint settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub timeout: Duration,
}

/// Notion endpoint settings.
#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub token: String,
    pub api_url: String,
    pub version: String,
    pub timeout: Duration,
    pub title_property: String,
    pub properties: PropertyMap,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub llm: LlmConfig,
    pub notion: NotionConfig,
    pub write_policy: WritePolicy,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset.
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let get_or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let llm_api_key = get("OPENROUTER_API_KEY").ok_or(ConfigError::Missing("OPENROUTER_API_KEY"))?;
        let notion_token = get("NOTION_TOKEN").ok_or(ConfigError::Missing("NOTION_TOKEN"))?;

        let host = get_or("HOST", "0.0.0.0");
        let port: u16 = parse_var("PORT", get("PORT"), DEFAULT_PORT)?;
        let bind_addr: SocketAddr =
            format!("{}:{}", host, port)
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    name: "HOST",
                    value: host.clone(),
                    reason: e.to_string(),
                })?;

        let llm_api_url = validate_url("LLM_API_URL", get_or("LLM_API_URL", OPENROUTER_API_URL))?;
        let notion_api_url = validate_url("NOTION_API_URL", get_or("NOTION_API_URL", NOTION_API_URL))?;

        let llm_timeout = parse_var("LLM_TIMEOUT_SECS", get("LLM_TIMEOUT_SECS"), 30u64)?;
        let notion_timeout = parse_var("NOTION_TIMEOUT_SECS", get("NOTION_TIMEOUT_SECS"), 10u64)?;

        let write_policy = match get("WRITE_POLICY") {
            None => WritePolicy::Always,
            Some(raw) => raw.parse::<WritePolicy>().map_err(|reason| ConfigError::Invalid {
                name: "WRITE_POLICY",
                value: raw.clone(),
                reason,
            })?,
        };
        let write_policy = match write_policy {
            WritePolicy::MinConfidence(_) => {
                let threshold =
                    parse_var("MIN_CONFIDENCE", get("MIN_CONFIDENCE"), DEFAULT_MIN_CONFIDENCE)?;
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(ConfigError::Invalid {
                        name: "MIN_CONFIDENCE",
                        value: threshold.to_string(),
                        reason: "must be between 0 and 1".to_string(),
                    });
                }
                WritePolicy::MinConfidence(threshold)
            }
            other => other,
        };

        let title_property = get_or("TITLE_PROPERTY", DEFAULT_TITLE_PROPERTY);
        let mut properties = PropertyMap::new()
            .map(ExtractionField::Category, get_or("CATEGORY_PROPERTY", "Category"))
            .map(ExtractionField::Priority, get_or("PRIORITY_PROPERTY", "Priority"))
            .map(ExtractionField::Summary, title_property.clone())
            .map(ExtractionField::DueDate, get_or("DUE_DATE_PROPERTY", "Due date"));
        if let Some(urgent) = get("URGENT_PROPERTY") {
            properties = properties.map(ExtractionField::Urgent, urgent);
        }

        Ok(Self {
            bind_addr,
            llm: LlmConfig {
                api_key: llm_api_key,
                api_url: llm_api_url,
                model: get_or("LLM_MODEL", DEFAULT_MODEL),
                timeout: Duration::from_secs(llm_timeout),
            },
            notion: NotionConfig {
                token: notion_token,
                api_url: notion_api_url,
                version: get_or("NOTION_VERSION", NOTION_VERSION),
                timeout: Duration::from_secs(notion_timeout),
                title_property,
                properties,
            },
            write_policy,
        })
    }
}

fn parse_var<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

fn validate_url(name: &'static str, value: String) -> Result<String, ConfigError> {
    match Url::parse(&value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(value),
        Ok(url) => Err(ConfigError::Invalid {
            name,
            reason: format!("unsupported scheme '{}'", url.scheme()),
            value,
        }),
        Err(e) => Err(ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}
