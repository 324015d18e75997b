//! Turns one named SSE message into a [`DomainEvent`]. Stateless.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sift_protocol::Activity;
use sift_protocol::DomainEvent;
use sift_protocol::ReflectionProgress;
use sift_protocol::Source;

use crate::error::DecodeError;
use crate::error::DecodeErrorKind;

pub const BREAKDOWN: &str = "breakdown";
pub const SEARCH_RESULTS: &str = "search_results";
pub const SUMMARY_PART: &str = "summary_part";
pub const BLOG_PART: &str = "blog_part";
pub const THINKING_PART: &str = "thinking_part";
pub const REFLECTION_PROGRESS: &str = "reflection_progress";
pub const STATUS: &str = "status";
pub const SEARCH_START: &str = "search_start";
pub const SCRAPE_START: &str = "scrape_start";
pub const COMPLETE: &str = "complete";
pub const ERROR: &str = "error";
pub const IN_PROGRESS: &str = "in_progress";
pub const WARNING: &str = "warning";

/// `complete`, `error` and `in_progress` end a turn; failing to decode them
/// fails the turn.
pub fn is_terminal_event_name(event_name: &str) -> bool {
    matches!(event_name, COMPLETE | ERROR | IN_PROGRESS)
}

#[derive(Debug, Deserialize)]
struct WireSource {
    title: String,
    url: String,
    #[serde(default, alias = "faviconUrl")]
    favicon_url: Option<String>,
    #[serde(default)]
    meta_url: Option<WireMetaUrl>,
    #[serde(default, alias = "thumbnailUrl")]
    thumbnail_url: Option<String>,
    #[serde(default)]
    thumbnail: Option<WireThumbnail>,
}

#[derive(Debug, Default, Deserialize)]
struct WireMetaUrl {
    #[serde(default)]
    hostname: Option<String>,
    #[serde(default)]
    favicon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireThumbnail {
    #[serde(default)]
    src: Option<String>,
}

impl From<WireSource> for Source {
    fn from(wire: WireSource) -> Self {
        let meta = wire.meta_url.unwrap_or_default();
        let favicon = wire.favicon_url.or(meta.favicon).unwrap_or_default();
        let thumbnail = wire
            .thumbnail_url
            .or_else(|| wire.thumbnail.and_then(|t| t.src));
        Source::with_fallback_hostname(wire.title, wire.url, favicon, thumbnail, meta.hostname)
    }
}

#[derive(Debug, Deserialize)]
struct WireThinking {
    thought: String,
}

#[derive(Debug, Deserialize)]
struct WireBlogPart {
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireComplete {
    #[serde(default)]
    summary: Option<String>,
    /// Cached blogs replay their full text here instead of `summary`.
    #[serde(default)]
    blog_content: Option<String>,
    #[serde(default)]
    suggestions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireInProgress {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    blog_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireWarning {
    message: String,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(default)]
    error: Option<String>,
}

/// Decode the payload of the SSE message named `event_name`.
pub fn decode(event_name: &str, raw_payload: &str) -> Result<DomainEvent, DecodeError> {
    // The `error` event may arrive without any data at all.
    if event_name == ERROR && raw_payload.trim().is_empty() {
        return Ok(DomainEvent::Error { message: None });
    }

    if !is_known_event_name(event_name) {
        return Err(DecodeError::new(
            event_name,
            raw_payload,
            DecodeErrorKind::UnknownEvent,
            "unknown event",
        ));
    }

    let value: Value = serde_json::from_str(raw_payload).map_err(|e| {
        DecodeError::new(
            event_name,
            raw_payload,
            DecodeErrorKind::Malformed,
            e.to_string(),
        )
    })?;
    let shape = |detail: String| {
        DecodeError::new(
            event_name,
            raw_payload,
            DecodeErrorKind::InvalidShape,
            detail,
        )
    };

    let event = match event_name {
        BREAKDOWN => DomainEvent::Breakdown {
            terms: from_value(value).map_err(shape)?,
        },
        SEARCH_RESULTS => match value {
            Value::Number(n) => {
                let count = n
                    .as_u64()
                    .and_then(|c| usize::try_from(c).ok())
                    .ok_or_else(|| shape(format!("invalid result count {n}")))?;
                DomainEvent::SearchResultCount { count }
            }
            other => {
                let records: Vec<WireSource> = from_value(other).map_err(shape)?;
                DomainEvent::SearchResults {
                    sources: records.into_iter().map(Source::from).collect(),
                }
            }
        },
        SUMMARY_PART => DomainEvent::SummaryPart {
            part: from_value(value).map_err(shape)?,
        },
        BLOG_PART => {
            let part: WireBlogPart = from_value(value).map_err(shape)?;
            DomainEvent::SummaryPart { part: part.content }
        }
        THINKING_PART => {
            let thinking: WireThinking = from_value(value).map_err(shape)?;
            DomainEvent::ThinkingPart {
                thought: thinking.thought,
            }
        }
        REFLECTION_PROGRESS => {
            let progress: ReflectionProgress = from_value(value).map_err(shape)?;
            DomainEvent::ReflectionProgress(progress)
        }
        STATUS => match value {
            Value::String(message) => DomainEvent::Status { message },
            Value::Object(mut map) => match map.remove("message") {
                Some(Value::String(message)) => DomainEvent::Status { message },
                _ => return Err(shape("status object without a `message` string".into())),
            },
            other => return Err(shape(format!("unexpected status payload {other}"))),
        },
        SEARCH_START => {
            let activities: Vec<Activity> = from_value(value).map_err(shape)?;
            DomainEvent::SearchStart {
                terms: activities.into_iter().map(|a| a.message).collect(),
            }
        }
        SCRAPE_START => DomainEvent::ScrapeStart {
            activities: from_value(value).map_err(shape)?,
        },
        COMPLETE => {
            if !value.is_object() {
                return Err(shape("complete payload must be an object".into()));
            }
            let complete: WireComplete = from_value(value).map_err(shape)?;
            let summary = complete
                .summary
                .filter(|s| !s.is_empty())
                .or(complete.blog_content);
            DomainEvent::Complete {
                summary,
                suggestions: complete.suggestions,
            }
        }
        IN_PROGRESS => {
            if !value.is_object() {
                return Err(shape("in_progress payload must be an object".into()));
            }
            let progress: WireInProgress = from_value(value).map_err(shape)?;
            DomainEvent::InProgress {
                status: progress
                    .status
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| "in progress".to_string()),
                content: progress.blog_content.filter(|c| !c.is_empty()),
            }
        }
        WARNING => {
            let warning: WireWarning = from_value(value).map_err(shape)?;
            DomainEvent::Status {
                message: warning.message,
            }
        }
        ERROR => match value {
            Value::Null => DomainEvent::Error { message: None },
            Value::String(message) => DomainEvent::Error {
                message: Some(message),
            },
            other => {
                let error: WireError = from_value(other).map_err(shape)?;
                DomainEvent::Error {
                    message: error.error,
                }
            }
        },
        _ => {
            return Err(DecodeError::new(
                event_name,
                raw_payload,
                DecodeErrorKind::UnknownEvent,
                "unknown event",
            ));
        }
    };
    Ok(event)
}

fn is_known_event_name(event_name: &str) -> bool {
    matches!(
        event_name,
        BREAKDOWN
            | SEARCH_RESULTS
            | SUMMARY_PART
            | BLOG_PART
            | THINKING_PART
            | REFLECTION_PROGRESS
            | STATUS
            | SEARCH_START
            | SCRAPE_START
            | COMPLETE
            | ERROR
            | IN_PROGRESS
            | WARNING
    )
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, String> {
    serde_json::from_value(value).map_err(|e| e.to_string())
}
