//! Conversation controller: runs one turn at a time from submission to settlement

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use rill_ai::{
    ByteStream, DecoderConfig, DeltaEvent, Error as AiError, FragmentExtractor, Gateway,
    OpenAiDeltaExtractor, RequestConfig, StreamDecoder, decode_stream, models::DEFAULT_MODEL_ID,
    stream::into_read_error, types::DEFAULT_TEMPERATURE,
};
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    accumulator::{Accumulator, Progress},
    events::ChatEvent,
    handle::{ActiveTurn, ChatHandle, Phase},
    transcript::{Transcript, TranscriptStore},
};

/// Appended to a turn cancelled mid-stream
pub const CANCELLED_MARKER: &str = "[cancelled]";

/// Controller settings
#[derive(Clone)]
pub struct ControllerConfig {
    /// Model id sent upstream
    pub model_id: String,
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f32,
    /// Longest wait for a single chunk
    pub read_timeout: Option<Duration>,
    /// Longest a whole turn may take, from request to last chunk
    pub stream_timeout: Option<Duration>,
    /// Stream decoder tuning
    pub decoder: DecoderConfig,
    /// Pulls text out of each streamed record
    pub extractor: Arc<dyn FragmentExtractor>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            read_timeout: None,
            stream_timeout: None,
            decoder: DecoderConfig::default(),
            extractor: Arc::new(OpenAiDeltaExtractor),
        }
    }
}

impl std::fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("model_id", &self.model_id)
            .field("temperature", &self.temperature)
            .field("read_timeout", &self.read_timeout)
            .field("stream_timeout", &self.stream_timeout)
            .field("decoder", &self.decoder)
            .finish_non_exhaustive()
    }
}

/// Why a submission was not started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Another turn is awaiting a response or streaming
    Busy,
    /// Input was empty or whitespace
    EmptyInput,
}

/// How a submission ended
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Completed,
    Failed(AiError),
    Cancelled,
    /// Nothing happened; the transcript is unchanged
    Rejected(RejectReason),
}

struct Inner {
    gateway: Arc<dyn Gateway>,
    store: Arc<TranscriptStore>,
    settings: Mutex<ControllerConfig>,
    event_tx: broadcast::Sender<ChatEvent>,
    handle: ChatHandle,
}

/// Drives conversation turns: `Idle → AwaitingResponse → Streaming → Idle`.
///
/// Cloning is cheap and every clone controls the same conversation, so one
/// task can stream while another cancels or clears.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Inner>,
}

impl Controller {
    /// Create a new controller
    pub fn new(gateway: Arc<dyn Gateway>, config: ControllerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                gateway,
                store: Arc::new(TranscriptStore::new()),
                settings: Mutex::new(config),
                event_tx,
                handle: ChatHandle::new(),
            }),
        }
    }

    /// Subscribe to chat events
    pub fn events(&self) -> broadcast::Receiver<ChatEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Subscribe to transcript snapshots
    pub fn subscribe(&self) -> watch::Receiver<Arc<Transcript>> {
        self.inner.store.subscribe()
    }

    /// Current transcript snapshot
    pub fn transcript(&self) -> Arc<Transcript> {
        self.inner.store.snapshot()
    }

    /// Get a cloneable handle for cancelling or waiting from outside.
    pub fn handle(&self) -> ChatHandle {
        self.inner.handle.clone()
    }

    pub fn phase(&self) -> Phase {
        self.inner.handle.phase()
    }

    /// Current settings
    pub fn settings(&self) -> ControllerConfig {
        self.inner.settings.lock().clone()
    }

    /// Set the model used for subsequent turns
    pub fn set_model(&self, model_id: impl Into<String>) {
        self.inner.settings.lock().model_id = model_id.into();
    }

    /// Set the temperature used for subsequent turns
    pub fn set_temperature(&self, temperature: f32) -> crate::error::Result<()> {
        rill_ai::types::validate_temperature(temperature)?;
        self.inner.settings.lock().temperature = temperature;
        Ok(())
    }

    /// Cancel the in-flight turn, keeping what it produced so far
    pub fn cancel(&self) -> bool {
        self.inner.handle.cancel()
    }

    /// Empty the transcript.
    ///
    /// A turn still in flight is cancelled and forgotten; its connection is
    /// closed by the task that was reading it.
    pub fn clear(&self) {
        {
            let mut state = self.inner.handle.state.lock();
            if let Some(active) = state.active.take() {
                tracing::info!(turn = %active.id, "clearing conversation with a turn in flight");
                active.cancel.cancel();
            }
            state.phase = Phase::Idle;
            self.inner.store.clear();
        }
        self.inner.handle.idle_notify.notify_waiters();
        let _ = self.inner.event_tx.send(ChatEvent::Cleared);
    }

    /// Submit user input and run the turn to completion.
    ///
    /// A no-op returning `Submission::Rejected` unless the controller is idle.
    pub async fn submit(&self, text: &str) -> Submission {
        if text.trim().is_empty() {
            return Submission::Rejected(RejectReason::EmptyInput);
        }

        let Some((turn_id, cancel)) = self.claim(text) else {
            tracing::debug!("submission rejected, a turn is already in flight");
            return Submission::Rejected(RejectReason::Busy);
        };
        let _ = self.inner.event_tx.send(ChatEvent::TurnStart { turn_id });

        let settings = self.settings();
        let history = self.inner.store.snapshot().history();
        let result = match RequestConfig::new(settings.model_id.clone(), settings.temperature, history)
        {
            Ok(request) => self.run_turn(turn_id, &request, &cancel, &settings).await,
            Err(e) => Err(e),
        };

        self.finish_turn(turn_id, result)
    }

    /// Atomically move from idle to awaiting-response and create the turn.
    fn claim(&self, text: &str) -> Option<(Uuid, CancellationToken)> {
        let mut state = self.inner.handle.state.lock();
        if state.phase != Phase::Idle {
            return None;
        }
        let turn_id = self.inner.store.begin_turn(text).ok()?;
        let cancel = CancellationToken::new();
        state.phase = Phase::AwaitingResponse;
        state.active = Some(ActiveTurn {
            id: turn_id,
            cancel: cancel.clone(),
        });
        Some((turn_id, cancel))
    }

    async fn run_turn(
        &self,
        turn_id: Uuid,
        request: &RequestConfig,
        cancel: &CancellationToken,
        settings: &ControllerConfig,
    ) -> rill_ai::Result<()> {
        let deadline = settings.stream_timeout.map(|d| Instant::now() + d);

        tracing::info!(turn = %turn_id, model = request.model_id(), "sending request");
        let _ = self.inner.event_tx.send(ChatEvent::RequestSent {
            turn_id,
            model: request.model_id().to_string(),
        });

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AiError::Cancelled),
            opened = within(deadline, self.inner.gateway.open_stream(request)) => match opened {
                Some(opened) => opened?,
                None => return Err(AiError::Connection("timed out waiting for a response".into())),
            },
        };

        if !self.inner.handle.advance(turn_id, Phase::Streaming) {
            return Err(AiError::Cancelled);
        }
        let _ = self.inner.event_tx.send(ChatEvent::StreamOpened {
            turn_id,
            status: opened.status,
        });

        let decoder =
            StreamDecoder::new(settings.extractor.clone()).with_config(settings.decoder);
        let body = timed(opened.body, settings.read_timeout, deadline);
        let mut deltas = decode_stream(body, decoder);
        let mut accumulator = Accumulator::new(self.inner.store.clone(), turn_id);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AiError::Cancelled),
                next = deltas.next() => next,
            };

            // A bare end of stream counts as the terminal event
            let event = match next {
                Some(event) => event?,
                None => DeltaEvent::terminal(),
            };

            if cancel.is_cancelled() {
                return Err(AiError::Cancelled);
            }

            let delta = event.fragment.clone();
            let progress = accumulator.apply(event);
            if let Some(delta) = delta {
                let _ = self.inner.event_tx.send(ChatEvent::TurnUpdate {
                    turn_id,
                    delta,
                    content_len: accumulator.content_len(),
                });
            }
            if progress == Progress::Complete {
                return Ok(());
            }
        }
    }

    /// Finalise the turn, publish its end and return to idle.
    fn finish_turn(&self, turn_id: Uuid, result: rill_ai::Result<()>) -> Submission {
        let store = &self.inner.store;
        let submission = match result {
            Ok(()) => Submission::Completed,
            Err(AiError::Cancelled) => {
                store.fail(turn_id, CANCELLED_MARKER, true);
                Submission::Cancelled
            }
            Err(e) => {
                let notice = if e.is_pre_stream() {
                    format!("Error: {}", e)
                } else {
                    format!("[error: {}]", e)
                };
                store.fail(turn_id, &notice, e.keeps_partial_content());
                Submission::Failed(e)
            }
        };

        match &submission {
            Submission::Completed => tracing::info!(turn = %turn_id, "turn complete"),
            Submission::Failed(e) => tracing::warn!(turn = %turn_id, "turn failed: {}", e),
            _ => tracing::info!(turn = %turn_id, "turn {:?}", submission),
        }

        if let Some(turn) = store.snapshot().get(turn_id).cloned() {
            let _ = self.inner.event_tx.send(ChatEvent::TurnEnd { turn });
        }
        self.inner.handle.settle(turn_id);
        submission
    }
}

/// Run `fut` until `deadline`; `None` on expiry.
async fn within<F: std::future::Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}

/// Wrap a response body so every read honours the per-read and whole-turn
/// limits. A timeout ends the stream with a read failure.
fn timed(body: ByteStream, read_timeout: Option<Duration>, deadline: Option<Instant>) -> ByteStream {
    Box::pin(stream! {
        let mut body = body;
        loop {
            match next_chunk(&mut body, read_timeout, deadline).await {
                Ok(Some(bytes)) => yield Ok(bytes),
                Ok(None) => return,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
    })
}

/// Read the next chunk, honouring the per-read and whole-turn limits.
/// `Ok(None)` means the body ended cleanly.
async fn next_chunk(
    body: &mut ByteStream,
    read_timeout: Option<Duration>,
    deadline: Option<Instant>,
) -> rill_ai::Result<Option<Bytes>> {
    let read_deadline = match (read_timeout.map(|t| Instant::now() + t), deadline) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };

    match within(read_deadline, body.next()).await {
        Some(item) => item.transpose().map_err(into_read_error),
        None => Err(AiError::StreamRead("timed out waiting for data".into())),
    }
}
