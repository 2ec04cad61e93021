//! # Stream Monitor
//!
//! The single state holder of a panel. It owns the health status, the alert
//! engine, the diagnostic log and the generation token of the active source,
//! and executes the effects the alert engine requests.
//!
//! All mutation goes through `&mut self`. Every entry point has an `_at`
//! variant taking the current time explicitly, which is what tests and the
//! replay tool use to drive simulated time.

use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::alert::{AlertEffect, AlertEngine, AlertState};
use crate::config::PanelOptions;
use crate::decoder::{DecoderError, DecoderMessage};
use crate::diagnostic::DiagnosticLog;
use crate::error::MonitorError;
use crate::notification::{DispatchReport, NotificationDispatcher};
use crate::snapshot::PanelSnapshot;
use crate::sound::AlertSound;
use crate::source::SourceSelector;
use crate::status::{MediaEvent, StreamStatus, Transition};

pub struct StreamMonitor {
    visual_alerts: bool,
    status: StreamStatus,
    alerts: AlertEngine,
    log: DiagnosticLog,
    /// Bumped on every source switch; decoder messages carry the value
    /// they were created for
    generation: u64,
    stream_url: Option<String>,
    /// A decoder attach for the current generation is in flight
    attaching: bool,
    sound: Option<Arc<dyn AlertSound>>,
    dispatcher: Arc<NotificationDispatcher>,
    dispatches: JoinSet<DispatchReport>,
    /// Runtime dispatches are spawned on, captured at construction when
    /// one is available
    runtime: Option<Handle>,
}

impl StreamMonitor {
    pub fn new(options: &PanelOptions, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self {
            visual_alerts: options.alert_visual,
            status: StreamStatus::new(Local::now()),
            alerts: AlertEngine::new(options.alert_policy()),
            log: DiagnosticLog::new(),
            generation: 0,
            stream_url: None,
            attaching: false,
            sound: None,
            dispatcher,
            dispatches: JoinSet::new(),
            runtime: Handle::try_current().ok(),
        }
    }

    /// Validate `options` and build the external channels they configure.
    pub fn from_options(options: &PanelOptions) -> Result<Self, MonitorError> {
        options.validate()?;
        let dispatcher = NotificationDispatcher::from_options(options)?;
        Ok(Self::new(options, Arc::new(dispatcher)))
    }

    pub fn with_sound(mut self, sound: Arc<dyn AlertSound>) -> Self {
        self.sound = Some(sound);
        self
    }

    pub fn status(&self) -> &StreamStatus {
        &self.status
    }

    pub fn alert_state(&self) -> &AlertState {
        self.alerts.state()
    }

    pub fn log(&self) -> &DiagnosticLog {
        &self.log
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stream_url(&self) -> Option<&str> {
        self.stream_url.as_deref()
    }

    pub fn is_attaching(&self) -> bool {
        self.attaching
    }

    pub fn dispatcher(&self) -> &Arc<NotificationDispatcher> {
        &self.dispatcher
    }

    pub fn begin_source(&mut self, url: Option<&str>) -> u64 {
        self.begin_source_at(url, Local::now())
    }

    /// Switch to `url` and reset every per-source field, the cool-down gate
    /// included. Returns the new generation.
    pub fn begin_source_at(&mut self, url: Option<&str>, now: DateTime<Local>) -> u64 {
        self.generation += 1;
        self.status = StreamStatus::new(now);
        self.alerts.reset();
        self.stream_url = url.map(str::to_owned);
        self.attaching = url.is_some();

        info!(
            url = url.unwrap_or(""),
            generation = self.generation,
            "Active source changed"
        );
        self.generation
    }

    /// The decoder for `generation` is ready to report. Returns false for a
    /// stale generation.
    pub fn mark_attached(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.attaching = false;
        true
    }

    pub fn attach_failed(&mut self, generation: u64, error: &DecoderError) {
        self.attach_failed_at(generation, error, Local::now());
    }

    pub fn attach_failed_at(&mut self, generation: u64, error: &DecoderError, now: DateTime<Local>) {
        if generation != self.generation {
            return;
        }
        self.attaching = false;
        warn!(generation = generation, error = %error, "Decoder attach failed");
        self.log.push_at(format!("decoder attach failed: {error}"), now);
    }

    pub fn handle_media_event(&mut self, event: &MediaEvent) {
        self.handle_media_event_at(event, Local::now());
    }

    /// Apply a media element event. Events fired while a decoder attach is
    /// in flight are dropped.
    pub fn handle_media_event_at(&mut self, event: &MediaEvent, now: DateTime<Local>) {
        if self.attaching {
            debug!(event = ?event, "Media event dropped while decoder is attaching");
            return;
        }
        let transition = self.status.on_media_event(event, now);
        self.apply(transition, now);
    }

    pub fn handle_decoder_message(&mut self, message: &DecoderMessage) {
        self.handle_decoder_message_at(message, Local::now());
    }

    /// Apply a decoder message. Messages of an earlier generation are
    /// ignored; a current one implies the decoder is attached.
    pub fn handle_decoder_message_at(&mut self, message: &DecoderMessage, now: DateTime<Local>) {
        if message.generation != self.generation {
            debug!(
                generation = message.generation,
                current = self.generation,
                event = ?message.event,
                "Stale decoder message ignored"
            );
            return;
        }
        self.attaching = false;
        let transition = self.status.on_decoder_event(message.kind, &message.event, now);
        self.apply(transition, now);
    }

    pub fn tick(&mut self) {
        self.tick_at(Local::now());
    }

    /// Periodic buffering re-evaluation
    pub fn tick_at(&mut self, now: DateTime<Local>) {
        let url = self.stream_url.clone().unwrap_or_default();
        let effects = self.alerts.tick(&self.status, &url, now);
        self.execute(effects, now);
    }

    /// When the running buffering episode will raise an alert, if ever.
    pub fn buffer_deadline(&self) -> Option<DateTime<Local>> {
        self.alerts.buffer_deadline(&self.status)
    }

    pub fn log_message(&mut self, message: impl Into<String>) {
        self.log.push(message);
    }

    pub fn has_pending_dispatches(&self) -> bool {
        !self.dispatches.is_empty()
    }

    /// Wait for the next in-flight dispatch and record its failures.
    ///
    /// Returns `None` when nothing is in flight.
    pub async fn next_dispatch_report(&mut self) -> Option<DispatchReport> {
        while let Some(joined) = self.dispatches.join_next().await {
            match joined {
                Ok(report) => {
                    self.record_dispatch_report(&report);
                    return Some(report);
                }
                Err(e) => warn!(error = %e, "Dispatch task did not complete"),
            }
        }
        None
    }

    /// Wait for every in-flight dispatch.
    pub async fn flush_dispatches(&mut self) -> Vec<DispatchReport> {
        let mut reports = Vec::new();
        while let Some(report) = self.next_dispatch_report().await {
            reports.push(report);
        }
        reports
    }

    pub fn snapshot(&self, selector: &SourceSelector) -> PanelSnapshot {
        PanelSnapshot::build(
            &self.status,
            self.alerts.state(),
            self.visual_alerts,
            &self.dispatcher.channel_names(),
            self.log.to_vec(),
            selector,
        )
    }

    fn record_dispatch_report(&mut self, report: &DispatchReport) {
        let now = Local::now();
        for (channel, reason) in &report.failed {
            self.log
                .push_at(format!("external alert failed: {channel}: {reason}"), now);
        }
    }

    fn apply(&mut self, transition: Transition, now: DateTime<Local>) {
        let Transition {
            status,
            signal,
            log,
        } = transition;
        self.status = status;
        if let Some(message) = log {
            self.log.push_at(message, now);
        }

        let url = self.stream_url.clone().unwrap_or_default();
        let effects = self.alerts.observe(&self.status, signal, &url, now);
        self.execute(effects, now);
    }

    fn execute(&mut self, effects: Vec<AlertEffect>, now: DateTime<Local>) {
        for effect in effects {
            match effect {
                AlertEffect::PlaySound => {
                    if let Some(sound) = &self.sound {
                        if let Err(e) = sound.play() {
                            warn!(error = %e, "Alert sound failed");
                        }
                    }
                }
                AlertEffect::Dispatch(alert) => {
                    if self.dispatcher.is_empty() {
                        continue;
                    }
                    let Some(runtime) = self
                        .runtime
                        .clone()
                        .or_else(|| Handle::try_current().ok())
                    else {
                        warn!(
                            alert_type = %alert.alert_type,
                            "No async runtime available, external alert skipped"
                        );
                        self.log
                            .push_at("external alert skipped: no async runtime", now);
                        continue;
                    };
                    let dispatcher = Arc::clone(&self.dispatcher);
                    self.dispatches.spawn_on(
                        async move { dispatcher.dispatch(&alert).await },
                        &runtime,
                    );
                }
                AlertEffect::Log(message) => self.log.push_at(message, now),
            }
        }
    }
}

impl std::fmt::Debug for StreamMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamMonitor")
            .field("status", &self.status)
            .field("alert", self.alerts.state())
            .field("generation", &self.generation)
            .field("stream_url", &self.stream_url)
            .field("attaching", &self.attaching)
            .field("pending_dispatches", &self.dispatches.len())
            .finish()
    }
}
