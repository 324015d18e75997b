use serde::Deserialize;
use serde::Serialize;
use ts_rs::TS;

/// One cited web result.
///
/// Sources are immutable once built: a newer `search_results` snapshot
/// replaces the whole list rather than editing entries in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    title: String,
    url: String,
    favicon_url: String,
    hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thumbnail_url: Option<String>,
}

impl Source {
    /// Builds a source, deriving `hostname` from `url`.
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        favicon_url: impl Into<String>,
        thumbnail_url: Option<String>,
    ) -> Self {
        let url = url.into();
        let hostname = hostname_of(&url).unwrap_or_default();
        Self {
            title: title.into(),
            url,
            favicon_url: favicon_url.into(),
            hostname,
            thumbnail_url,
        }
    }

    /// Like [`Source::new`], but uses `fallback_hostname` when `url` has no
    /// parseable host.
    pub fn with_fallback_hostname(
        title: impl Into<String>,
        url: impl Into<String>,
        favicon_url: impl Into<String>,
        thumbnail_url: Option<String>,
        fallback_hostname: Option<String>,
    ) -> Self {
        let mut source = Self::new(title, url, favicon_url, thumbnail_url);
        if source.hostname.is_empty() {
            source.hostname = fallback_hostname.unwrap_or_default();
        }
        source
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn favicon_url(&self) -> &str {
        &self.favicon_url
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn thumbnail_url(&self) -> Option<&str> {
        self.thumbnail_url.as_deref()
    }
}

fn hostname_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed.host_str().map(str::to_string)
}
