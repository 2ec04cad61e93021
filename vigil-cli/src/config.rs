use std::path::Path;

use serde::Deserialize;
use vigil_engine::{DataSeries, PanelOptions};

use crate::error::AppError;

/// Configuration for the entire program
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProgramConfig {
    /// Panel options as edited in the dashboard
    pub panel: PanelOptions,

    /// Series rows available before the event log starts
    pub series: Vec<DataSeries>,
}

impl ProgramConfig {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, AppError> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_panel_and_series() {
        let config = ProgramConfig::parse(
            r#"
            [panel]
            error_threshold = 2
            enable_webhook = true
            webhook_url = "https://robot.example.com/send?access_token=abc"

            [[series]]
            name = "streams"

            [[series.fields]]
            name = "video_url"
            values = ["http://x/a.m3u8", "rtmp://origin/app/b"]
            "#,
        )
        .unwrap();

        assert_eq!(config.panel.error_threshold, 2);
        assert_eq!(config.panel.buffer_threshold, 10);
        assert!(config.panel.webhook_channel().is_some());
        assert_eq!(config.series.len(), 1);
        assert_eq!(config.series[0].fields[0].values.len(), 2);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[panel]\nvideo_url = \"http://x/live.flv\"").unwrap();

        let config = ProgramConfig::load(file.path()).unwrap();
        assert_eq!(config.panel.video_url, "http://x/live.flv");
        assert!(config.series.is_empty());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            ProgramConfig::parse("[panel\n"),
            Err(AppError::Config(_))
        ));
    }
}
