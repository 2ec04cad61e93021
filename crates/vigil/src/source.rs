//! # Source Selection
//!
//! This module resolves the candidate stream URLs of a panel from its series
//! data and tracks which one is currently active. Any change of the active
//! source is reported as a [`SourceChange`], which the monitor treats as a
//! reset signal for all per-source state.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::MonitorError;

/// Series field carrying stream URLs by default
pub const DEFAULT_URL_FIELD: &str = "video_url";

/// One named column of a data series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesField {
    pub name: String,
    #[serde(default)]
    pub values: Vec<Value>,
}

/// A data series as delivered by the host dashboard query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSeries {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: Vec<SeriesField>,
}

impl DataSeries {
    /// Create a series with a single field
    pub fn with_field(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: None,
            fields: vec![SeriesField {
                name: name.into(),
                values,
            }],
        }
    }
}

/// Resolve stream URLs using the default `video_url` field.
pub fn resolve_sources(series: &[DataSeries], fallback_url: &str) -> Vec<String> {
    resolve_sources_with_field(series, DEFAULT_URL_FIELD, fallback_url)
}

/// Extract all non-empty string values of `field` across `series`, in series
/// order then row order. Falls back to `fallback_url` when nothing was found;
/// an empty fallback yields an empty list.
pub fn resolve_sources_with_field(
    series: &[DataSeries],
    field: &str,
    fallback_url: &str,
) -> Vec<String> {
    let mut urls: Vec<String> = series
        .iter()
        .filter_map(|s| s.fields.iter().find(|f| f.name == field))
        .flat_map(|f| f.values.iter())
        .filter_map(|value| match value {
            Value::String(url) if !url.is_empty() => Some(url.clone()),
            _ => None,
        })
        .collect();

    if urls.is_empty() && !fallback_url.is_empty() {
        urls.push(fallback_url.to_owned());
    }

    urls
}

/// Reason the active source changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceChange {
    /// The resolved list changed; the first entry became active
    ListChanged { current: Option<String> },
    /// The user picked another entry of the list
    Selected { current: String },
}

impl SourceChange {
    /// The newly active source, if any
    pub fn current(&self) -> Option<&str> {
        match self {
            Self::ListChanged { current } => current.as_deref(),
            Self::Selected { current } => Some(current),
        }
    }
}

/// Tracks the resolved source list and the active entry
#[derive(Debug, Clone, Default)]
pub struct SourceSelector {
    sources: Vec<String>,
    current: Option<String>,
}

impl SourceSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the resolved list.
    ///
    /// Returns `None` when the list is identical to the previous one,
    /// otherwise activates the first entry and returns the change.
    pub fn update(&mut self, sources: Vec<String>) -> Option<SourceChange> {
        if sources == self.sources {
            return None;
        }

        self.current = sources.first().cloned();
        self.sources = sources;

        debug!(
            count = self.sources.len(),
            current = self.current.as_deref().unwrap_or(""),
            "Source list changed"
        );

        Some(SourceChange::ListChanged {
            current: self.current.clone(),
        })
    }

    /// Manually activate `url`, which must be part of the resolved list.
    ///
    /// Selecting the already active source is a no-op.
    pub fn select(&mut self, url: &str) -> Result<Option<SourceChange>, MonitorError> {
        if !self.sources.iter().any(|s| s == url) {
            return Err(MonitorError::UnknownSource(url.to_owned()));
        }
        if self.current.as_deref() == Some(url) {
            return Ok(None);
        }

        self.current = Some(url.to_owned());
        debug!(url = url, "Source selected manually");

        Ok(Some(SourceChange::Selected {
            current: url.to_owned(),
        }))
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Whether a source picker should be offered
    pub fn has_multiple(&self) -> bool {
        self.sources.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_in_series_then_row_order() {
        let series = vec![
            DataSeries::with_field("video_url", vec![json!("http://a/1.m3u8"), json!("http://a/2.flv")]),
            DataSeries::with_field("other", vec![json!("http://ignored")]),
            DataSeries::with_field("video_url", vec![json!("rtmp://b/live")]),
        ];

        assert_eq!(
            resolve_sources(&series, "http://fallback/live.mp4"),
            vec!["http://a/1.m3u8", "http://a/2.flv", "rtmp://b/live"]
        );
    }

    #[test]
    fn test_resolve_skips_non_string_and_empty_values() {
        let series = vec![DataSeries::with_field(
            "video_url",
            vec![json!(null), json!(42), json!(""), json!("http://a/ok.m3u8")],
        )];
        assert_eq!(resolve_sources(&series, ""), vec!["http://a/ok.m3u8"]);
    }

    #[test]
    fn test_resolve_falls_back() {
        assert_eq!(
            resolve_sources(&[], "http://fallback/live.mp4"),
            vec!["http://fallback/live.mp4"]
        );
        assert!(resolve_sources(&[], "").is_empty());
    }

    #[test]
    fn test_resolve_custom_field() {
        let series = vec![DataSeries::with_field("stream", vec![json!("http://c/x.flv")])];
        assert_eq!(
            resolve_sources_with_field(&series, "stream", ""),
            vec!["http://c/x.flv"]
        );
    }

    #[test]
    fn test_update_activates_first_entry() {
        let mut selector = SourceSelector::new();
        let change = selector.update(vec!["a".into(), "b".into()]);
        assert_eq!(
            change,
            Some(SourceChange::ListChanged {
                current: Some("a".to_string())
            })
        );
        assert_eq!(selector.current(), Some("a"));
        assert!(selector.has_multiple());

        // Same content is not a change
        assert_eq!(selector.update(vec!["a".into(), "b".into()]), None);

        let change = selector.update(Vec::new()).unwrap();
        assert_eq!(change.current(), None);
        assert_eq!(selector.current(), None);
    }

    #[test]
    fn test_select_known_source() {
        let mut selector = SourceSelector::new();
        selector.update(vec!["a".into(), "b".into()]);

        let change = selector.select("b").unwrap();
        assert_eq!(change.as_ref().and_then(|c| c.current()), Some("b"));
        assert_eq!(selector.current(), Some("b"));

        assert_eq!(selector.select("b").unwrap(), None);
        assert!(matches!(
            selector.select("zzz"),
            Err(MonitorError::UnknownSource(_))
        ));
    }
}
