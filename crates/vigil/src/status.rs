//! # Health State Machine
//!
//! Playback health is a composite of [`StreamStatus`] flags rather than a
//! strict enum. Transitions are pure: each event is applied to the current
//! status and yields the next status together with a [`HealthSignal`] for the
//! alert engine and an optional diagnostic message.
//!
//! Recovery is observed, never forced. Reconnecting is the decoder's job.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::decoder::{DecoderEvent, DecoderKind};

/// Events emitted by the media element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaEvent {
    Play,
    Pause,
    Error {
        /// Detail reported by the element, if any
        #[serde(default)]
        message: Option<String>,
    },
    Waiting,
    CanPlay,
    Stalled,
}

/// What the alert engine should make of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthSignal {
    /// Nothing relevant changed
    Unchanged,
    /// Status changed; monitors re-evaluate against the new status
    Changed,
    /// An error-raising observation that counts toward the error threshold
    ErrorObserved,
    /// Playback (re)started; any active alert is cleared
    PlaybackResumed,
    /// The connection stalled; raises a connection alert immediately
    Stalled,
}

/// Current playback health snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamStatus {
    pub is_playing: bool,
    pub is_error: bool,
    pub error_message: String,
    pub is_buffering: bool,
    /// Decoder-reported failures within the current source lifetime
    pub retry_count: u32,
    pub last_update: DateTime<Local>,
}

/// Result of applying one event
#[derive(Debug, Clone)]
pub struct Transition {
    pub status: StreamStatus,
    pub signal: HealthSignal,
    pub log: Option<String>,
}

impl StreamStatus {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            is_playing: false,
            is_error: false,
            error_message: String::new(),
            is_buffering: false,
            retry_count: 0,
            last_update: now,
        }
    }

    /// Apply a media element event.
    pub fn on_media_event(&self, event: &MediaEvent, now: DateTime<Local>) -> Transition {
        let mut next = self.clone();

        let (signal, log) = match event {
            MediaEvent::Play => {
                next.is_playing = true;
                next.is_error = false;
                next.error_message.clear();
                (HealthSignal::PlaybackResumed, None)
            }
            MediaEvent::Pause => {
                next.is_playing = false;
                (HealthSignal::Changed, None)
            }
            MediaEvent::Error { message } => {
                let detail = message
                    .as_deref()
                    .filter(|m| !m.is_empty())
                    .unwrap_or("unknown");
                let text = format!("Playback error: {detail}");
                next.fail(text.clone());
                (HealthSignal::ErrorObserved, Some(text))
            }
            MediaEvent::Waiting => {
                next.is_buffering = true;
                (HealthSignal::Changed, None)
            }
            MediaEvent::CanPlay => {
                next.is_buffering = false;
                (HealthSignal::Changed, None)
            }
            // A stall leaves the status untouched
            MediaEvent::Stalled => {
                return Transition {
                    status: next,
                    signal: HealthSignal::Stalled,
                    log: None,
                };
            }
        };

        next.last_update = now;
        Transition {
            status: next,
            signal,
            log,
        }
    }

    /// Apply an event reported by the active decoder adapter.
    pub fn on_decoder_event(
        &self,
        kind: DecoderKind,
        event: &DecoderEvent,
        now: DateTime<Local>,
    ) -> Transition {
        let mut next = self.clone();

        let (signal, log) = match event {
            DecoderEvent::Ready => {
                next.is_error = false;
                next.error_message.clear();
                (HealthSignal::Changed, None)
            }
            DecoderEvent::DecodeError { detail } => {
                let text = format!("{} error: {detail}", kind.label());
                next.retry_count = next.retry_count.saturating_add(1);
                next.fail(text.clone());
                (HealthSignal::ErrorObserved, Some(text))
            }
            DecoderEvent::Destroyed => {
                return Transition {
                    status: next,
                    signal: HealthSignal::Unchanged,
                    log: None,
                };
            }
        };

        next.last_update = now;
        Transition {
            status: next,
            signal,
            log,
        }
    }

    // isPlaying is forced off whenever an error is raised
    fn fail(&mut self, message: String) {
        self.is_error = true;
        self.is_playing = false;
        self.error_message = message;
    }
}
