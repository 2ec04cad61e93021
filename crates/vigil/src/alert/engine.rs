use chrono::{DateTime, Local, TimeDelta};
use tracing::{debug, info};

use super::{AlertEffect, AlertInfo, AlertState, AlertType};
use crate::config::AlertPolicyConfig;
use crate::status::{HealthSignal, StreamStatus};

pub const CONNECTION_INTERRUPTED_MESSAGE: &str = "stream connection interrupted";

/// Alert policy engine.
///
/// Owns the [`AlertState`] and runs two independent monitors against every
/// status change: the buffer monitor (elapsed buffering vs. threshold) and
/// the error monitor (consecutive error observations vs. threshold). Stalls
/// bypass both and raise a connection alert directly.
///
/// The engine performs no I/O; it returns [`AlertEffect`]s for the caller
/// to execute.
#[derive(Debug, Clone)]
pub struct AlertEngine {
    config: AlertPolicyConfig,
    cooldown: TimeDelta,
    state: AlertState,
}

impl AlertEngine {
    pub fn new(config: AlertPolicyConfig) -> Self {
        let cooldown = TimeDelta::from_std(config.external_cooldown).unwrap_or(TimeDelta::MAX);
        Self {
            config,
            cooldown,
            state: AlertState::default(),
        }
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    pub fn config(&self) -> &AlertPolicyConfig {
        &self.config
    }

    /// Instant after which the buffer monitor raises an alert, if a
    /// buffering episode is being timed and has not alerted yet.
    pub fn buffer_deadline(&self, status: &StreamStatus) -> Option<DateTime<Local>> {
        if !self.config.enabled || !status.is_buffering {
            return None;
        }
        if self.state.alert_type == Some(AlertType::Buffer) {
            return None;
        }
        let threshold = TimeDelta::from_std(self.config.buffer_threshold?).ok()?;
        self.state.buffer_start_time?.checked_add_signed(threshold)
    }

    /// Clear every field, including counters and the cool-down gate.
    pub fn reset(&mut self) {
        self.state = AlertState::default();
    }

    /// React to a health transition.
    pub fn observe(
        &mut self,
        status: &StreamStatus,
        signal: HealthSignal,
        stream_url: &str,
        now: DateTime<Local>,
    ) -> Vec<AlertEffect> {
        let mut effects = Vec::new();

        match signal {
            HealthSignal::Unchanged => return effects,
            HealthSignal::Stalled => {
                self.raise(
                    &mut effects,
                    AlertType::Connection,
                    CONNECTION_INTERRUPTED_MESSAGE.to_owned(),
                    status,
                    stream_url,
                    now,
                );
                return effects;
            }
            HealthSignal::PlaybackResumed => self.clear_alert(),
            HealthSignal::Changed | HealthSignal::ErrorObserved => {}
        }

        self.monitor_buffering(&mut effects, status, stream_url, now);
        self.monitor_errors(
            &mut effects,
            status,
            signal == HealthSignal::ErrorObserved,
            stream_url,
            now,
        );
        effects
    }

    /// Periodic re-evaluation while nothing else happens.
    pub fn tick(
        &mut self,
        status: &StreamStatus,
        stream_url: &str,
        now: DateTime<Local>,
    ) -> Vec<AlertEffect> {
        let mut effects = Vec::new();
        self.monitor_buffering(&mut effects, status, stream_url, now);
        effects
    }

    /// Raise an alert of `alert_type`, replacing whatever alert is active.
    ///
    /// No-op when alerting is disabled.
    pub fn trigger_alert(
        &mut self,
        alert_type: AlertType,
        message: impl Into<String>,
        status: &StreamStatus,
        stream_url: &str,
        now: DateTime<Local>,
    ) -> Vec<AlertEffect> {
        let mut effects = Vec::new();
        self.raise(&mut effects, alert_type, message.into(), status, stream_url, now);
        effects
    }

    /// Deactivate the current alert. Counters and `alert_time` are untouched.
    pub fn clear_alert(&mut self) {
        if self.state.is_alerting {
            debug!(alert_type = ?self.state.alert_type, "Alert cleared");
        }
        self.state.is_alerting = false;
        self.state.alert_type = None;
        self.state.alert_message.clear();
    }

    fn monitor_buffering(
        &mut self,
        effects: &mut Vec<AlertEffect>,
        status: &StreamStatus,
        stream_url: &str,
        now: DateTime<Local>,
    ) {
        if !self.config.enabled {
            return;
        }
        let Some(threshold) = self.config.buffer_threshold else {
            return;
        };

        if !status.is_buffering {
            self.state.buffer_start_time = None;
            if self.state.alert_type == Some(AlertType::Buffer) {
                self.clear_alert();
            }
            return;
        }

        let Some(started) = self.state.buffer_start_time else {
            self.state.buffer_start_time = Some(now);
            return;
        };

        // One buffer alert per buffering episode
        if self.state.alert_type == Some(AlertType::Buffer) {
            return;
        }

        let elapsed = now.signed_duration_since(started);
        let threshold = TimeDelta::from_std(threshold).unwrap_or(TimeDelta::MAX);
        if elapsed > threshold {
            let seconds = (elapsed.num_milliseconds() as f64 / 1000.0).round() as i64;
            self.raise(
                effects,
                AlertType::Buffer,
                format!("buffering too long: {seconds} seconds"),
                status,
                stream_url,
                now,
            );
        }
    }

    fn monitor_errors(
        &mut self,
        effects: &mut Vec<AlertEffect>,
        status: &StreamStatus,
        observed: bool,
        stream_url: &str,
        now: DateTime<Local>,
    ) {
        if !self.config.enabled {
            return;
        }
        let Some(threshold) = self.config.error_threshold else {
            return;
        };

        if !status.is_error {
            self.state.consecutive_errors = 0;
            if self.state.alert_type == Some(AlertType::Error) {
                self.clear_alert();
            }
            return;
        }

        if !observed {
            return;
        }

        self.state.consecutive_errors = self.state.consecutive_errors.saturating_add(1);
        let count = self.state.consecutive_errors;
        if count >= threshold {
            self.raise(
                effects,
                AlertType::Error,
                format!("{count} consecutive errors: {}", status.error_message),
                status,
                stream_url,
                now,
            );
        }
    }

    fn raise(
        &mut self,
        effects: &mut Vec<AlertEffect>,
        alert_type: AlertType,
        message: String,
        status: &StreamStatus,
        stream_url: &str,
        now: DateTime<Local>,
    ) {
        if !self.config.enabled {
            return;
        }

        info!(alert_type = %alert_type, message = %message, url = stream_url, "Alert triggered");

        self.state.is_alerting = true;
        self.state.alert_type = Some(alert_type);
        self.state.alert_message = message.clone();
        self.state.alert_time = Some(now);

        if self.config.sound {
            effects.push(AlertEffect::PlaySound);
        }

        if self.external_gate_open(now) {
            self.state.last_external_alert_time = Some(now);
            effects.push(AlertEffect::Dispatch(AlertInfo {
                alert_type,
                message: message.clone(),
                stream_url: stream_url.to_owned(),
                timestamp: now,
                error_count: self.state.consecutive_errors,
                retry_count: status.retry_count,
            }));
        } else {
            debug!(
                alert_type = %alert_type,
                "External dispatch suppressed by cool-down window"
            );
        }

        effects.push(AlertEffect::Log(format!(
            "triggered alert: [{alert_type}] {message}"
        )));
    }

    fn external_gate_open(&self, now: DateTime<Local>) -> bool {
        match self.state.last_external_alert_time {
            Some(last) => now.signed_duration_since(last) >= self.cooldown,
            None => true,
        }
    }
}
