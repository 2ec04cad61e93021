use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{DecoderEvent, DecoderEventSender};

/// What a backend hands back once a source is loaded: its native event
/// stream and a token stopping its workers.
#[derive(Debug)]
pub struct BackendSession<E> {
    pub events: mpsc::Receiver<E>,
    pub cancel: CancellationToken,
}

impl<E> BackendSession<E> {
    pub fn new(events: mpsc::Receiver<E>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }
}

/// A running backend plus the task translating its events.
///
/// Dropping the session cancels the backend and aborts the forwarder.
#[derive(Debug)]
pub struct ActiveSession {
    cancel: CancellationToken,
    forwarder: JoinHandle<()>,
}

impl ActiveSession {
    /// Spawn a forwarder translating backend events into [`DecoderEvent`]s.
    pub fn spawn<E, F>(session: BackendSession<E>, sender: DecoderEventSender, translate: F) -> Self
    where
        E: Send + 'static,
        F: Fn(E) -> DecoderEvent + Send + 'static,
    {
        let BackendSession { mut events, cancel } = session;
        let token = cancel.clone();

        let forwarder = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    next = events.recv() => {
                        let Some(event) = next else { break };
                        if !sender.send(translate(event)) {
                            break;
                        }
                    }
                }
            }
            debug!(
                generation = sender.generation(),
                kind = %sender.kind(),
                "Decoder event forwarder stopped"
            );
        });

        Self { cancel, forwarder }
    }

    pub fn is_finished(&self) -> bool {
        self.forwarder.is_finished()
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.forwarder.abort();
    }
}
