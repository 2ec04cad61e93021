use std::sync::Arc;

use chrono::{DateTime, Local, TimeDelta};
use vigil_engine::notification::{WebhookNotifier, create_client};
use vigil_engine::{
    AlertType, DecoderEvent, DecoderKind, DecoderMessage, MediaEvent, NotificationDispatcher,
    PanelOptions, StreamMonitor, WebhookChannel,
};

const HLS_URL: &str = "http://x/stream.m3u8";

fn monitor(options: PanelOptions) -> StreamMonitor {
    StreamMonitor::new(&options, Arc::new(NotificationDispatcher::new()))
}

fn hls(generation: u64, event: DecoderEvent) -> DecoderMessage {
    DecoderMessage {
        generation,
        kind: DecoderKind::AdaptiveStreaming,
        event,
    }
}

fn network_error(generation: u64) -> DecoderMessage {
    hls(
        generation,
        DecoderEvent::DecodeError {
            detail: "networkError".into(),
        },
    )
}

/// Source attached and the decoder reported ready
fn attached(monitor: &mut StreamMonitor, url: &str, now: DateTime<Local>) -> u64 {
    let generation = monitor.begin_source_at(Some(url), now);
    assert!(monitor.mark_attached(generation));
    generation
}

#[test]
fn scenario_a_consecutive_decoder_errors() {
    let mut monitor = monitor(PanelOptions::builder().with_error_threshold(2).build());
    let t0 = Local::now();
    let generation = monitor.begin_source_at(Some(HLS_URL), t0);

    monitor.handle_decoder_message_at(&hls(generation, DecoderEvent::Ready), t0);
    monitor.handle_decoder_message_at(&network_error(generation), t0 + TimeDelta::seconds(1));
    assert!(!monitor.alert_state().is_alerting);

    monitor.handle_decoder_message_at(&network_error(generation), t0 + TimeDelta::seconds(2));

    let alert = monitor.alert_state();
    assert!(alert.is_alerting);
    assert_eq!(alert.alert_type, Some(AlertType::Error));
    assert!(alert.alert_message.contains('2'));
    assert!(alert.alert_message.contains("networkError"));
    assert_eq!(monitor.status().retry_count, 2);
}

#[test]
fn scenario_b_buffering_timeout() {
    let mut monitor = monitor(PanelOptions::builder().with_buffer_threshold(10).build());
    let t = Local::now();
    attached(&mut monitor, HLS_URL, t);

    monitor.handle_media_event_at(&MediaEvent::Waiting, t);
    monitor.tick_at(t + TimeDelta::seconds(5));
    assert!(!monitor.alert_state().is_alerting);

    monitor.tick_at(t + TimeDelta::seconds(11));
    assert!(monitor.alert_state().is_alerting);
    assert_eq!(monitor.alert_state().alert_type, Some(AlertType::Buffer));
}

#[tokio::test]
async fn scenario_c_cooldown_suppresses_outbound_requests() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/robot/send")
        .with_status(200)
        .with_body(r#"{"errcode":0,"errmsg":"ok"}"#)
        .expect(2)
        .create_async()
        .await;

    let webhook = WebhookNotifier::new(
        WebhookChannel {
            url: format!("{}/robot/send", server.url()),
        },
        create_client().unwrap(),
    );
    let dispatcher = NotificationDispatcher::new().with_notifier(Arc::new(webhook));
    let options = PanelOptions::builder()
        .with_external_cooldown_secs(300)
        .with_sound(false)
        .build();
    let mut monitor = StreamMonitor::new(&options, Arc::new(dispatcher));

    let t0 = Local::now();
    attached(&mut monitor, HLS_URL, t0);

    monitor.handle_media_event_at(&MediaEvent::Stalled, t0);
    let reports = monitor.flush_dispatches().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].delivered, vec!["webhook".to_string()]);

    monitor.handle_media_event_at(&MediaEvent::Stalled, t0 + TimeDelta::minutes(2));
    assert!(!monitor.has_pending_dispatches());
    assert!(monitor.flush_dispatches().await.is_empty());

    monitor.handle_media_event_at(&MediaEvent::Stalled, t0 + TimeDelta::minutes(6));
    assert_eq!(monitor.flush_dispatches().await.len(), 1);

    mock.assert_async().await;
}

#[test]
fn scenario_d_stall_alerts_without_thresholds() {
    let mut monitor = monitor(
        PanelOptions::builder()
            .with_error_threshold(0)
            .with_buffer_threshold(0)
            .build(),
    );
    let t0 = Local::now();
    attached(&mut monitor, "http://x/live.flv", t0);

    monitor.handle_media_event_at(&MediaEvent::Stalled, t0);

    assert!(monitor.alert_state().is_alerting);
    assert_eq!(
        monitor.alert_state().alert_type,
        Some(AlertType::Connection)
    );
    assert_eq!(
        monitor.alert_state().alert_message,
        "stream connection interrupted"
    );
}

#[test]
fn stall_is_ignored_when_alerts_disabled() {
    let mut monitor = monitor(PanelOptions::builder().with_alerts_enabled(false).build());
    let t0 = Local::now();
    attached(&mut monitor, HLS_URL, t0);

    monitor.handle_media_event_at(&MediaEvent::Stalled, t0);
    assert!(!monitor.alert_state().is_alerting);
    assert!(monitor.log().is_empty());
}

#[test]
fn playing_and_error_are_never_both_set() {
    let mut monitor = monitor(PanelOptions::default());
    let t0 = Local::now();
    let generation = attached(&mut monitor, HLS_URL, t0);

    for round in 0..4 {
        let at = t0 + TimeDelta::seconds(round);
        monitor.handle_media_event_at(&MediaEvent::Play, at);
        assert!(!(monitor.status().is_playing && monitor.status().is_error));

        if round % 2 == 0 {
            monitor.handle_media_event_at(&MediaEvent::Error { message: None }, at);
        } else {
            monitor.handle_decoder_message_at(&network_error(generation), at);
        }
        assert!(!(monitor.status().is_playing && monitor.status().is_error));
        assert_eq!(monitor.status().last_update, at);
    }
}

#[test]
fn error_count_and_alert_clear_together() {
    let mut monitor = monitor(PanelOptions::builder().with_error_threshold(2).build());
    let t0 = Local::now();
    let generation = attached(&mut monitor, HLS_URL, t0);

    monitor.handle_decoder_message_at(&network_error(generation), t0);
    monitor.handle_decoder_message_at(&network_error(generation), t0);
    assert_eq!(monitor.alert_state().consecutive_errors, 2);
    assert_eq!(monitor.alert_state().alert_type, Some(AlertType::Error));

    // A ready decoder clears the error without a play event
    monitor.handle_decoder_message_at(&hls(generation, DecoderEvent::Ready), t0);
    assert_eq!(monitor.alert_state().consecutive_errors, 0);
    assert!(!monitor.alert_state().is_alerting);

    // Counting restarts from zero
    monitor.handle_media_event_at(&MediaEvent::Error { message: None }, t0);
    assert_eq!(monitor.alert_state().consecutive_errors, 1);
    assert!(!monitor.alert_state().is_alerting);
}

#[test]
fn buffer_threshold_is_strict() {
    let mut monitor = monitor(PanelOptions::builder().with_buffer_threshold(10).build());
    let t = Local::now();
    attached(&mut monitor, HLS_URL, t);
    monitor.handle_media_event_at(&MediaEvent::Waiting, t);

    monitor.tick_at(t + TimeDelta::seconds(10));
    assert!(!monitor.alert_state().is_alerting);

    monitor.tick_at(t + TimeDelta::milliseconds(10_010));
    assert_eq!(monitor.alert_state().alert_type, Some(AlertType::Buffer));

    monitor.handle_media_event_at(&MediaEvent::CanPlay, t + TimeDelta::seconds(12));
    assert!(!monitor.alert_state().is_alerting);
    assert_eq!(monitor.alert_state().buffer_start_time, None);
}

#[test]
fn cooldown_reopens_after_exactly_the_window() {
    let mut monitor = monitor(PanelOptions::default());
    let t0 = Local::now();
    attached(&mut monitor, HLS_URL, t0);

    monitor.handle_media_event_at(&MediaEvent::Stalled, t0);
    monitor.handle_media_event_at(&MediaEvent::Stalled, t0 + TimeDelta::seconds(299));
    assert_eq!(monitor.alert_state().last_external_alert_time, Some(t0));

    let reopened = t0 + TimeDelta::seconds(300);
    monitor.handle_media_event_at(&MediaEvent::Stalled, reopened);
    assert_eq!(
        monitor.alert_state().last_external_alert_time,
        Some(reopened)
    );
}

#[test]
fn source_switch_resets_everything() {
    let mut monitor = monitor(PanelOptions::builder().with_error_threshold(1).build());
    let t0 = Local::now();
    let first = attached(&mut monitor, HLS_URL, t0);
    monitor.handle_decoder_message_at(&network_error(first), t0);
    monitor.handle_media_event_at(&MediaEvent::Waiting, t0);
    assert!(monitor.alert_state().is_alerting);

    let second = attached(&mut monitor, "http://x/other.flv", t0 + TimeDelta::seconds(1));
    assert_ne!(first, second);
    assert_eq!(monitor.status().retry_count, 0);
    assert!(!monitor.status().is_error);
    assert!(!monitor.status().is_buffering);
    assert_eq!(monitor.alert_state(), &Default::default());

    // The previous decoder's late callbacks cannot touch the new source
    monitor.handle_decoder_message_at(&network_error(first), t0 + TimeDelta::seconds(2));
    assert_eq!(monitor.status().retry_count, 0);

    // The dedup gate is open again
    monitor.handle_media_event_at(&MediaEvent::Stalled, t0 + TimeDelta::seconds(3));
    assert_eq!(
        monitor.alert_state().last_external_alert_time,
        Some(t0 + TimeDelta::seconds(3))
    );
}

#[test]
fn diagnostic_log_keeps_most_recent_ten() {
    let mut monitor = monitor(PanelOptions::builder().with_alerts_enabled(false).build());
    let t0 = Local::now();
    let generation = attached(&mut monitor, HLS_URL, t0);

    for i in 0..15 {
        monitor.handle_decoder_message_at(
            &hls(
                generation,
                DecoderEvent::DecodeError {
                    detail: format!("error {i}"),
                },
            ),
            t0 + TimeDelta::seconds(i),
        );
        assert!(monitor.log().len() <= 10);
    }

    let messages: Vec<_> = monitor
        .log()
        .entries()
        .map(|entry| entry.message.clone())
        .collect();
    let expected: Vec<_> = (5..15).map(|i| format!("HLS error: error {i}")).collect();
    assert_eq!(messages, expected);
}
