//! Server-sent event decoding: raw response bytes into delta events

use std::pin::Pin;

use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::error::{Error, Result};

/// Prefix marking a significant event line
pub const DATA_PREFIX: &str = "data: ";
/// Payload that ends a generation stream
pub const DONE_SENTINEL: &str = "[DONE]";
/// Default cap on consecutive unparsable event lines
pub const DEFAULT_MAX_MALFORMED_LINES: usize = 64;

/// One quantum of newly generated text, or the end of generation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaEvent {
    pub fragment: Option<String>,
    pub terminal: bool,
}

impl DeltaEvent {
    /// Create a text-carrying event
    pub fn text(fragment: impl Into<String>) -> Self {
        Self {
            fragment: Some(fragment.into()),
            terminal: false,
        }
    }

    /// Create the end-of-generation event
    pub fn terminal() -> Self {
        Self {
            fragment: None,
            terminal: true,
        }
    }

    /// Check if this is the end-of-generation event
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }
}

/// A stream of raw response body chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A stream of decoded delta events
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<DeltaEvent>> + Send>>;

/// Pulls the next text fragment out of one parsed event payload.
///
/// Providers lay out their streaming records differently; swapping the
/// extractor is enough to support one, the line framing stays the same.
pub trait FragmentExtractor: Send + Sync {
    /// Return the fragment carried by `payload`, or `None` for metadata-only events
    fn extract(&self, payload: &serde_json::Value) -> Option<String>;
}

impl<T: FragmentExtractor + ?Sized> FragmentExtractor for std::sync::Arc<T> {
    fn extract(&self, payload: &serde_json::Value) -> Option<String> {
        (**self).extract(payload)
    }
}

/// Extracts `choices[0].delta.content` from chat-completions chunks
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiDeltaExtractor;

impl FragmentExtractor for OpenAiDeltaExtractor {
    fn extract(&self, payload: &serde_json::Value) -> Option<String> {
        payload
            .get("choices")?
            .get(0)?
            .get("delta")?
            .get("content")?
            .as_str()
            .map(str::to_string)
    }
}

/// Extracts a string at an arbitrary JSON pointer (e.g. `/message/content`)
#[derive(Debug, Clone)]
pub struct PointerExtractor {
    pointer: String,
}

impl PointerExtractor {
    pub fn new(pointer: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
        }
    }
}

impl FragmentExtractor for PointerExtractor {
    fn extract(&self, payload: &serde_json::Value) -> Option<String> {
        payload
            .pointer(&self.pointer)?
            .as_str()
            .map(str::to_string)
    }
}

/// Decoder tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Consecutive malformed lines tolerated before the stream is declared
    /// broken. `None` tolerates any number.
    pub max_malformed_lines: Option<usize>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_malformed_lines: Some(DEFAULT_MAX_MALFORMED_LINES),
        }
    }
}

/// Incremental SSE line framer.
///
/// Chunks are buffered as bytes, so a chunk boundary inside a multi-byte
/// character, inside the `data: ` prefix or inside a JSON record is harmless:
/// only complete lines are ever decoded. Once a terminal event has been
/// produced the decoder ignores all further input.
pub struct StreamDecoder {
    extractor: Box<dyn FragmentExtractor>,
    config: DecoderConfig,
    buffer: Vec<u8>,
    malformed_run: usize,
    finished: bool,
    failure: Option<Error>,
}

impl std::fmt::Debug for StreamDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDecoder")
            .field("config", &self.config)
            .field("buffered", &self.buffer.len())
            .field("malformed_run", &self.malformed_run)
            .field("finished", &self.finished)
            .field("failure", &self.failure)
            .finish()
    }
}

impl StreamDecoder {
    /// Create a decoder using a custom fragment extractor
    pub fn new(extractor: impl FragmentExtractor + 'static) -> Self {
        Self {
            extractor: Box::new(extractor),
            config: DecoderConfig::default(),
            buffer: Vec::new(),
            malformed_run: 0,
            finished: false,
            failure: None,
        }
    }

    /// Create a decoder for chat-completions streams
    pub fn openai() -> Self {
        Self::new(OpenAiDeltaExtractor)
    }

    /// Set decoder tuning
    pub fn with_config(mut self, config: DecoderConfig) -> Self {
        self.config = config;
        self
    }

    /// Whether a terminal event has been produced
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Take a failure held back by [`feed`](Self::feed) or
    /// [`finish`](Self::finish).
    ///
    /// When a chunk yields some events before failing, those events are
    /// returned and the failure is kept here. The next `feed` or `finish`
    /// reports it too.
    pub fn take_failure(&mut self) -> Option<Error> {
        self.failure.take()
    }

    /// Feed one raw chunk, returning the events completed by it.
    ///
    /// The last, possibly incomplete, line stays buffered for the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<DeltaEvent>> {
        if let Some(e) = self.failure.take() {
            return Err(e);
        }
        if self.finished {
            return Ok(Vec::new());
        }

        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = buffer[consumed..].iter().position(|&b| b == b'\n') {
            let line = &buffer[consumed..consumed + offset];
            consumed += offset + 1;

            match self.process_line(line) {
                Ok(Some(event)) => {
                    let terminal = event.terminal;
                    events.push(event);
                    if terminal {
                        return Ok(events);
                    }
                }
                Ok(None) => {}
                Err(e) => return self.fail_after(events, e),
            }
        }

        buffer.drain(..consumed);
        self.buffer = buffer;
        Ok(events)
    }

    /// Signal end of input.
    ///
    /// A buffered trailing line without a newline is processed as complete. A
    /// stream that closes cleanly without the sentinel still ends with a
    /// terminal event.
    pub fn finish(&mut self) -> Result<Vec<DeltaEvent>> {
        if let Some(e) = self.failure.take() {
            return Err(e);
        }
        if self.finished {
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        let rest = std::mem::take(&mut self.buffer);
        if !rest.is_empty() {
            if let Some(event) = self.process_line(&rest)? {
                events.push(event);
            }
        }

        if !self.finished {
            tracing::debug!("byte stream closed without terminal sentinel");
            self.finished = true;
            events.push(DeltaEvent::terminal());
        }
        Ok(events)
    }

    /// Hand back `events` already decoded and hold `error` for the next call.
    fn fail_after(&mut self, events: Vec<DeltaEvent>, error: Error) -> Result<Vec<DeltaEvent>> {
        self.buffer.clear();
        if events.is_empty() {
            return Err(error);
        }
        self.failure = Some(error);
        Ok(events)
    }

    fn process_line(&mut self, raw: &[u8]) -> Result<Option<DeltaEvent>> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let Some(payload) = raw.strip_prefix(DATA_PREFIX.as_bytes()) else {
            return Ok(None);
        };

        let payload = String::from_utf8_lossy(payload);
        let payload = payload.trim();
        if payload.is_empty() || payload == DONE_SENTINEL {
            self.finished = true;
            self.buffer.clear();
            return Ok(Some(DeltaEvent::terminal()));
        }

        match serde_json::from_str::<serde_json::Value>(payload) {
            Ok(value) => {
                self.malformed_run = 0;
                Ok(self
                    .extractor
                    .extract(&value)
                    .filter(|fragment| !fragment.is_empty())
                    .map(DeltaEvent::text))
            }
            Err(e) => {
                let skipped = Error::MalformedEvent(e.to_string());
                self.malformed_run += 1;
                tracing::debug!(run = self.malformed_run, "skipping event line: {}", skipped);

                if let Some(limit) = self.config.max_malformed_lines {
                    if self.malformed_run > limit {
                        self.finished = true;
                        return Err(Error::StreamRead(format!(
                            "{} consecutive malformed event lines",
                            self.malformed_run
                        )));
                    }
                }
                Ok(None)
            }
        }
    }
}

/// Decode a byte source lazily into delta events.
///
/// A source error ends the sequence with `Error::StreamRead`, which is distinct
/// from the clean terminal event. Events decoded from a chunk before a
/// decoding failure are yielded ahead of the error.
pub fn decode_stream(source: ByteStream, decoder: StreamDecoder) -> DeltaStream {
    Box::pin(stream! {
        let mut source = source;
        let mut decoder = decoder;

        while let Some(chunk) = source.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(into_read_error(e));
                    return;
                }
            };

            match decoder.feed(&chunk) {
                Ok(events) => {
                    for event in events {
                        let terminal = event.terminal;
                        yield Ok(event);
                        if terminal {
                            return;
                        }
                    }
                    if let Some(e) = decoder.take_failure() {
                        yield Err(e);
                        return;
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        match decoder.finish() {
            Ok(events) => {
                for event in events {
                    yield Ok(event);
                }
            }
            Err(e) => yield Err(e),
        }
    })
}

/// Normalise a source failure into a stream-read failure
pub fn into_read_error(error: Error) -> Error {
    match error {
        Error::StreamRead(_) | Error::Cancelled => error,
        other => Error::StreamRead(other.to_string()),
    }
}
