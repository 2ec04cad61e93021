//! Deterministic replay of a recorded event log.
//!
//! Every entry carries an offset in milliseconds from the start of the
//! recording. Time is simulated: the buffering re-evaluation runs at each
//! multiple of the configured check interval between two entries, so a
//! replay yields the same panel state no matter how fast it runs.

use chrono::{DateTime, Local, TimeDelta};
use serde::Deserialize;
use tracing::{debug, info};
use vigil_engine::decoder::{FlvEvent, HlsEvent, translate_flv_event, translate_hls_event};
use vigil_engine::source::resolve_sources_with_field;
use vigil_engine::{
    DataSeries, DecoderEvent, DecoderKind, DecoderMessage, DispatchReport, MediaEvent,
    PanelOptions, PanelSnapshot, SourceChange, SourceSelector, StreamMonitor,
};

use crate::error::AppError;

/// One line of the event log
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayEntry {
    /// Offset from the start of the recording
    #[serde(default)]
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: ReplayAction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayAction {
    /// New series data arrived
    Sources { series: Vec<DataSeries> },
    /// The user picked a source
    Select { url: String },
    /// Media element event
    Media { event: MediaEvent },
    /// HLS decoder event for the active source
    Hls { event: HlsRecord },
    /// FLV decoder event for the active source
    Flv { event: FlvRecord },
    /// Explicit buffering re-evaluation
    Tick,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HlsRecord {
    ManifestParsed,
    Error { details: String },
}

impl From<HlsRecord> for HlsEvent {
    fn from(record: HlsRecord) -> Self {
        match record {
            HlsRecord::ManifestParsed => HlsEvent::ManifestParsed,
            HlsRecord::Error { details } => HlsEvent::Error { details },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlvRecord {
    LoadingComplete,
    Error {
        #[serde(default)]
        error_type: String,
        error_detail: String,
    },
}

impl From<FlvRecord> for FlvEvent {
    fn from(record: FlvRecord) -> Self {
        match record {
            FlvRecord::LoadingComplete => FlvEvent::LoadingComplete,
            FlvRecord::Error {
                error_type,
                error_detail,
            } => FlvEvent::Error {
                error_type,
                error_detail,
            },
        }
    }
}

/// Parse a JSON-lines event log. Blank lines and lines starting with `#`
/// are skipped.
pub fn parse_script(text: &str) -> Result<Vec<ReplayEntry>, AppError> {
    let mut entries = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let entry = serde_json::from_str(line).map_err(|source| AppError::Script {
            line: index + 1,
            source,
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Drives a [`StreamMonitor`] from recorded entries.
pub struct Replayer {
    monitor: StreamMonitor,
    selector: SourceSelector,
    options: PanelOptions,
    start: DateTime<Local>,
    position_ms: u64,
    last_tick_ms: u64,
    tick_ms: u64,
}

impl Replayer {
    pub fn new(options: PanelOptions, monitor: StreamMonitor, start: DateTime<Local>) -> Self {
        let tick_ms = options.buffer_check_interval_ms.max(1);
        Self {
            monitor,
            selector: SourceSelector::new(),
            options,
            start,
            position_ms: 0,
            last_tick_ms: 0,
            tick_ms,
        }
    }

    fn at(&self, offset_ms: u64) -> Result<DateTime<Local>, AppError> {
        i64::try_from(offset_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .and_then(|offset| self.start.checked_add_signed(offset))
            .ok_or_else(|| {
                AppError::InvalidInput(format!("event offset {offset_ms} ms is out of range"))
            })
    }

    /// Resolve the configured fallback before any series data arrives.
    pub fn prime(&mut self, series: &[DataSeries]) -> Result<(), AppError> {
        self.update_sources(series, 0)
    }

    pub fn apply(&mut self, entry: ReplayEntry) -> Result<(), AppError> {
        if entry.at_ms < self.position_ms {
            return Err(AppError::InvalidInput(format!(
                "event at {} ms precedes previous event at {} ms",
                entry.at_ms, self.position_ms
            )));
        }
        let now = self.at(entry.at_ms)?;
        self.advance_to(entry.at_ms)?;

        match entry.action {
            ReplayAction::Sources { series } => self.update_sources(&series, entry.at_ms)?,
            ReplayAction::Select { url } => {
                if let Some(change) = self.selector.select(&url)? {
                    self.switch_source(&change, now);
                }
            }
            ReplayAction::Media { event } => self.monitor.handle_media_event_at(&event, now),
            ReplayAction::Hls { event } => self.decoder_event(
                DecoderKind::AdaptiveStreaming,
                translate_hls_event(event.into()),
                now,
            ),
            ReplayAction::Flv { event } => self.decoder_event(
                DecoderKind::FlashVideo,
                translate_flv_event(event.into()),
                now,
            ),
            ReplayAction::Tick => self.monitor.tick_at(now),
        }
        Ok(())
    }

    /// Run the periodic checks due up to `offset_ms`.
    ///
    /// Between two entries a check can only change anything when it is the
    /// first one, the first one past the buffering deadline, or the last
    /// one, so only those run.
    fn advance_to(&mut self, offset_ms: u64) -> Result<(), AppError> {
        let due = offset_ms - offset_ms % self.tick_ms;
        self.position_ms = offset_ms;
        if due <= self.last_tick_ms {
            return Ok(());
        }

        let first = self.last_tick_ms + self.tick_ms;
        self.tick(first)?;
        if first == due {
            return Ok(());
        }

        if let Some(deadline) = self.monitor.buffer_deadline() {
            let deadline_ms = u64::try_from(
                deadline.signed_duration_since(self.start).num_milliseconds(),
            )
            .unwrap_or(0);
            // The alert fires strictly after the deadline
            let firing = (deadline_ms / self.tick_ms)
                .checked_add(1)
                .and_then(|n| n.checked_mul(self.tick_ms));
            if let Some(firing) = firing {
                if firing > first && firing < due {
                    self.tick(firing)?;
                }
            }
        }
        self.tick(due)
    }

    fn tick(&mut self, offset_ms: u64) -> Result<(), AppError> {
        let now = self.at(offset_ms)?;
        self.last_tick_ms = offset_ms;
        self.monitor.tick_at(now);
        Ok(())
    }

    fn update_sources(&mut self, series: &[DataSeries], offset_ms: u64) -> Result<(), AppError> {
        let sources =
            resolve_sources_with_field(series, &self.options.url_field, &self.options.video_url);
        if let Some(change) = self.selector.update(sources) {
            let now = self.at(offset_ms)?;
            self.switch_source(&change, now);
        }
        Ok(())
    }

    fn switch_source(&mut self, change: &SourceChange, now: DateTime<Local>) {
        let generation = self.monitor.begin_source_at(change.current(), now);
        // Recorded decoders are attached by the time their first event shows up
        self.monitor.mark_attached(generation);
        debug!(generation = generation, "Replay source switched");
    }

    fn decoder_event(&mut self, kind: DecoderKind, event: DecoderEvent, now: DateTime<Local>) {
        let message = DecoderMessage {
            generation: self.monitor.generation(),
            kind,
            event,
        };
        self.monitor.handle_decoder_message_at(&message, now);
    }

    /// Wait for outstanding deliveries and return the final panel state.
    pub async fn finish(mut self) -> (PanelSnapshot, Vec<DispatchReport>) {
        let reports = self.monitor.flush_dispatches().await;
        info!(
            dispatches = reports.len(),
            generation = self.monitor.generation(),
            "Replay finished"
        );
        (self.monitor.snapshot(&self.selector), reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn start() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn replayer(options: PanelOptions) -> Replayer {
        let monitor = StreamMonitor::new(&options, Arc::default());
        let mut replayer = Replayer::new(options, monitor, start());
        replayer.prime(&[]).unwrap();
        replayer
    }

    fn run(replayer: &mut Replayer, script: &str) {
        for entry in parse_script(script).unwrap() {
            replayer.apply(entry).unwrap();
        }
    }

    #[test]
    fn test_parse_script_skips_comments() {
        let entries = parse_script(
            r#"
            # recorded on stage
            {"at_ms": 0, "kind": "media", "event": "play"}

            {"at_ms": 10, "kind": "media", "event": {"error": {"message": "decode"}}}
            {"at_ms": 20, "kind": "hls", "event": {"type": "error", "details": "networkError"}}
            {"at_ms": 30, "kind": "tick"}
            "#,
        )
        .unwrap();

        assert_eq!(entries.len(), 4);
        assert!(matches!(
            entries[0].action,
            ReplayAction::Media {
                event: MediaEvent::Play
            }
        ));
        assert!(matches!(entries[3].action, ReplayAction::Tick));
    }

    #[test]
    fn test_parse_script_reports_line() {
        let err = parse_script("{\"kind\": \"tick\"}\n{\"kind\": \"bogus\"}").unwrap_err();
        assert!(matches!(err, AppError::Script { line: 2, .. }));
    }

    #[tokio::test]
    async fn test_buffering_alert_from_periodic_checks() {
        let mut replayer = replayer(
            PanelOptions::builder()
                .with_video_url("http://x/live.m3u8")
                .with_buffer_threshold(2)
                .with_sound(false)
                .build(),
        );

        run(
            &mut replayer,
            r#"
            {"at_ms": 0, "kind": "media", "event": "play"}
            {"at_ms": 500, "kind": "media", "event": "waiting"}
            {"at_ms": 4000, "kind": "media", "event": "pause"}
            "#,
        );

        let (snapshot, reports) = replayer.finish().await;
        assert!(reports.is_empty());
        assert_eq!(
            snapshot.alert_banner.as_deref(),
            Some("Buffering timeout: buffering too long: 3 seconds")
        );
    }

    #[tokio::test]
    async fn test_decoder_errors_count_toward_threshold() {
        let mut replayer = replayer(
            PanelOptions::builder()
                .with_error_threshold(2)
                .with_sound(false)
                .build(),
        );

        run(
            &mut replayer,
            r#"
            {"at_ms": 0, "kind": "sources", "series": [{"fields": [{"name": "video_url", "values": ["http://x/a.flv"]}]}]}
            {"at_ms": 100, "kind": "flv", "event": {"type": "error", "error_type": "NetworkError", "error_detail": "timeout"}}
            {"at_ms": 200, "kind": "flv", "event": {"type": "error", "error_type": "NetworkError", "error_detail": "timeout"}}
            "#,
        );

        let (snapshot, _) = replayer.finish().await;
        assert_eq!(snapshot.current_source.as_deref(), Some("http://x/a.flv"));
        assert_eq!(snapshot.retry_count, 2);
        assert!(
            snapshot
                .alert_banner
                .unwrap()
                .starts_with("Playback error: 2 consecutive errors")
        );
    }

    #[test]
    fn test_out_of_order_entries_rejected() {
        let mut replayer = replayer(PanelOptions::default());
        let entries = parse_script(
            "{\"at_ms\": 50, \"kind\": \"tick\"}\n{\"at_ms\": 10, \"kind\": \"tick\"}",
        )
        .unwrap();
        let mut entries = entries.into_iter();

        replayer.apply(entries.next().unwrap()).unwrap();
        assert!(matches!(
            replayer.apply(entries.next().unwrap()),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_select_unknown_source() {
        let mut replayer = replayer(PanelOptions::default());
        let entries = parse_script("{\"kind\": \"select\", \"url\": \"http://x/none\"}").unwrap();
        for entry in entries {
            assert!(matches!(replayer.apply(entry), Err(AppError::Monitor(_))));
        }
    }

    #[test]
    fn test_offset_out_of_range_is_rejected() {
        let mut replayer = replayer(PanelOptions::default());
        for line in [
            r#"{"at_ms": 9223372036854775000, "kind": "tick"}"#,
            r#"{"at_ms": 18446744073709551615, "kind": "tick"}"#,
        ] {
            let entry = parse_script(line).unwrap().remove(0);
            assert!(matches!(
                replayer.apply(entry),
                Err(AppError::InvalidInput(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_long_gap_fires_at_first_due_check() {
        let mut replayer = replayer(
            PanelOptions::builder()
                .with_video_url("http://x/live.m3u8")
                .with_buffer_threshold(2)
                .with_sound(false)
                .build(),
        );

        // A year of simulated time between two entries
        run(
            &mut replayer,
            r#"
            {"at_ms": 0, "kind": "media", "event": "play"}
            {"at_ms": 500, "kind": "media", "event": "waiting"}
            {"at_ms": 31536000000, "kind": "media", "event": "pause"}
            "#,
        );

        let (snapshot, _) = replayer.finish().await;
        assert_eq!(
            snapshot.alert_banner.as_deref(),
            Some("Buffering timeout: buffering too long: 3 seconds")
        );
    }
}
