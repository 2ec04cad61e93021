//! # Panel Session
//!
//! Per-panel coordinator task. It owns the [`StreamMonitor`], the
//! [`SourceSelector`] and the active [`DecoderInstance`], and multiplexes
//! host inputs, decoder messages, attach completions, periodic buffer checks
//! and finished dispatches on a single task, so state is never shared.
//!
//! The decoder of a source lives exactly as long as the source is active: it
//! is destroyed before the next one is attached and when the session ends.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::PanelOptions;
use crate::decoder::{DecoderError, DecoderMessage, MediaSink};
use crate::error::MonitorError;
use crate::factory::{DecoderFactory, DecoderInstance};
use crate::monitor::StreamMonitor;
use crate::snapshot::PanelSnapshot;
use crate::source::{DataSeries, SourceSelector, resolve_sources_with_field};
use crate::status::MediaEvent;

const INPUT_CHANNEL_CAPACITY: usize = 64;

type AttachResult = (u64, Result<DecoderInstance, DecoderError>);

/// Inputs accepted by a running session
#[derive(Debug)]
pub enum PanelInput {
    Media(MediaEvent),
    /// New series data from the host query
    Sources(Vec<DataSeries>),
    SelectSource {
        url: String,
        reply: oneshot::Sender<Result<(), MonitorError>>,
    },
    Snapshot(oneshot::Sender<PanelSnapshot>),
    /// Stop after in-flight dispatches settle
    Shutdown,
}

/// Cloneable handle used by the host to drive a session
#[derive(Debug, Clone)]
pub struct PanelHandle {
    tx: mpsc::Sender<PanelInput>,
}

impl PanelHandle {
    async fn send(&self, input: PanelInput) -> Result<(), MonitorError> {
        self.tx
            .send(input)
            .await
            .map_err(|_| MonitorError::SessionClosed)
    }

    pub async fn media_event(&self, event: MediaEvent) -> Result<(), MonitorError> {
        self.send(PanelInput::Media(event)).await
    }

    pub async fn update_series(&self, series: Vec<DataSeries>) -> Result<(), MonitorError> {
        self.send(PanelInput::Sources(series)).await
    }

    pub async fn select_source(&self, url: impl Into<String>) -> Result<(), MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.send(PanelInput::SelectSource {
            url: url.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| MonitorError::SessionClosed)?
    }

    pub async fn snapshot(&self) -> Result<PanelSnapshot, MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.send(PanelInput::Snapshot(reply)).await?;
        rx.await.map_err(|_| MonitorError::SessionClosed)
    }

    pub async fn shutdown(&self) -> Result<(), MonitorError> {
        self.send(PanelInput::Shutdown).await
    }
}

pub struct PanelSession {
    options: PanelOptions,
    monitor: StreamMonitor,
    selector: SourceSelector,
    factory: Arc<DecoderFactory>,
    sink: Arc<dyn MediaSink>,
    decoder: Option<DecoderInstance>,
    attach_task: Option<JoinHandle<()>>,
    inputs: mpsc::Receiver<PanelInput>,
    decoder_tx: mpsc::UnboundedSender<DecoderMessage>,
    decoder_rx: mpsc::UnboundedReceiver<DecoderMessage>,
    attach_tx: mpsc::UnboundedSender<AttachResult>,
    attach_rx: mpsc::UnboundedReceiver<AttachResult>,
    cancel: CancellationToken,
}

impl PanelSession {
    pub fn new(
        options: PanelOptions,
        monitor: StreamMonitor,
        factory: DecoderFactory,
        sink: Arc<dyn MediaSink>,
    ) -> (Self, PanelHandle) {
        let (tx, inputs) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        let (decoder_tx, decoder_rx) = mpsc::unbounded_channel();
        let (attach_tx, attach_rx) = mpsc::unbounded_channel();

        let session = Self {
            options,
            monitor,
            selector: SourceSelector::new(),
            factory: Arc::new(factory),
            sink,
            decoder: None,
            attach_task: None,
            inputs,
            decoder_tx,
            decoder_rx,
            attach_tx,
            attach_rx,
            cancel: CancellationToken::new(),
        };
        (session, PanelHandle { tx })
    }

    /// Token that stops the session without waiting for dispatches
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        // Until the host delivers series data only the fallback URL applies
        self.update_sources(&[]);

        let mut ticker = tokio::time::interval(self.options.buffer_check_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("Panel session cancelled");
                    break;
                }
                input = self.inputs.recv() => match input {
                    Some(PanelInput::Shutdown) | None => {
                        self.monitor.flush_dispatches().await;
                        break;
                    }
                    Some(input) => self.handle_input(input),
                },
                Some(message) = self.decoder_rx.recv() => {
                    self.monitor.handle_decoder_message(&message);
                }
                Some((generation, result)) = self.attach_rx.recv() => {
                    self.on_attached(generation, result);
                }
                _ = ticker.tick() => self.monitor.tick(),
                Some(_report) = self.monitor.next_dispatch_report(), if self.monitor.has_pending_dispatches() => {}
            }
        }

        self.teardown();
    }

    fn handle_input(&mut self, input: PanelInput) {
        match input {
            PanelInput::Media(event) => self.monitor.handle_media_event(&event),
            PanelInput::Sources(series) => self.update_sources(&series),
            PanelInput::SelectSource { url, reply } => {
                let result = self.selector.select(&url).map(|change| {
                    if let Some(change) = change {
                        self.switch_source(change.current().map(str::to_owned));
                    }
                });
                let _ = reply.send(result);
            }
            PanelInput::Snapshot(reply) => {
                let _ = reply.send(self.monitor.snapshot(&self.selector));
            }
            PanelInput::Shutdown => {}
        }
    }

    fn update_sources(&mut self, series: &[DataSeries]) {
        let urls =
            resolve_sources_with_field(series, &self.options.url_field, &self.options.video_url);
        if let Some(change) = self.selector.update(urls) {
            self.switch_source(change.current().map(str::to_owned));
        }
    }

    fn release_decoder(&mut self) {
        if let Some(task) = self.attach_task.take() {
            task.abort();
        }
        if let Some(mut decoder) = self.decoder.take() {
            debug!(kind = %decoder.kind(), "Destroying decoder");
            decoder.destroy();
        }
    }

    fn switch_source(&mut self, url: Option<String>) {
        self.release_decoder();
        let generation = self.monitor.begin_source(url.as_deref());

        let Some(url) = url else {
            return;
        };

        let factory = Arc::clone(&self.factory);
        let sink = Arc::clone(&self.sink);
        let decoder_tx = self.decoder_tx.clone();
        let attach_tx = self.attach_tx.clone();
        self.attach_task = Some(tokio::spawn(async move {
            let result = factory.attach(&url, sink, decoder_tx, generation).await;
            // A closed session drops the instance, which destroys it
            let _ = attach_tx.send((generation, result));
        }));
    }

    fn on_attached(&mut self, generation: u64, result: Result<DecoderInstance, DecoderError>) {
        match result {
            Ok(instance) if self.monitor.mark_attached(generation) => {
                info!(kind = %instance.kind(), generation = generation, "Decoder attached");
                self.decoder = Some(instance);
            }
            Ok(mut instance) => {
                debug!(generation = generation, "Discarding decoder of a replaced source");
                instance.destroy();
            }
            Err(e) => self.monitor.attach_failed(generation, &e),
        }
    }

    fn teardown(&mut self) {
        self.release_decoder();
        self.cancel.cancel();
    }
}

impl Drop for PanelSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
