use std::fmt::Display;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};

use super::{GenerationObserver, GenerationStatus, Snapshot, Utf8StreamDecoder, Workspace};
use crate::section_decoder::{DecoderConfig, DecoderEvent, SectionDecoder, Sections};

/// Result of handing data to a generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    /// The decoder ran and the snapshot was committed.
    Applied(Vec<DecoderEvent>),
    /// A newer generation started; nothing was decoded or published.
    Stale,
}

impl FeedOutcome {
    pub fn events(&self) -> &[DecoderEvent] {
        match self {
            FeedOutcome::Applied(events) => events,
            FeedOutcome::Stale => &[],
        }
    }
}

/// How a driven stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveOutcome {
    Finished(Sections),
    Failed { reason: String },
    /// Another generation started while this one was streaming.
    Superseded,
}

/// One in-flight generate action.
///
/// Owns the response buffer through its decoder. Every mutation is checked
/// against the workspace's current generation id before it is published.
#[derive(Debug)]
pub struct Generation {
    id: u64,
    workspace: Workspace,
    decoder: SectionDecoder,
    status: GenerationStatus,
}

impl Generation {
    pub(super) fn new(id: u64, workspace: Workspace, config: DecoderConfig) -> Self {
        Self {
            id,
            workspace,
            decoder: SectionDecoder::new(config),
            status: GenerationStatus::Streaming,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        self.workspace.current_generation() == self.id
    }

    pub fn sections(&self) -> &Sections {
        self.decoder.current_sections()
    }

    pub fn status(&self) -> &GenerationStatus {
        &self.status
    }

    /// Append a decoded text chunk.
    ///
    /// Decode errors fail the generation; they are reported through the
    /// returned events rather than propagated.
    pub fn feed(&mut self, chunk: &str) -> FeedOutcome {
        if !self.is_current() {
            debug!(generation = self.id, "Dropping chunk for superseded generation");
            return FeedOutcome::Stale;
        }
        match self.decoder.feed(chunk) {
            Ok(events) => self.publish(events),
            Err(e) => {
                warn!(generation = self.id, error = %e, "Decoding failed");
                self.fail(&e.to_string())
            }
        }
    }

    /// End of stream: run the final recomputation.
    pub fn finish(&mut self) -> FeedOutcome {
        if !self.is_current() {
            return FeedOutcome::Stale;
        }
        match self.decoder.finalize() {
            Ok(events) => {
                if self.status == GenerationStatus::Streaming {
                    self.status = GenerationStatus::Finished;
                }
                self.publish(events)
            }
            Err(e) => self.fail(&e.to_string()),
        }
    }

    /// Abort with a transport or decode failure.
    pub fn fail(&mut self, reason: &str) -> FeedOutcome {
        if !self.is_current() {
            return FeedOutcome::Stale;
        }
        let events = self.decoder.fail(reason);
        if !events.is_empty() {
            self.status = GenerationStatus::Failed {
                reason: reason.to_string(),
            };
        }
        self.publish(events)
    }

    /// Consume a byte stream until it ends, errors, stalls, or is superseded.
    ///
    /// Every event is forwarded to `observer` in order.
    pub async fn drive<S, E, O>(mut self, stream: S, observer: &mut O) -> DriveOutcome
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
        O: GenerationObserver + ?Sized,
    {
        let timeout = self.workspace.stream_timeout();
        let mut stream = std::pin::pin!(stream);
        let mut utf8 = Utf8StreamDecoder::new();

        loop {
            if !self.is_current() {
                info!(generation = self.id, "Generation superseded, abandoning stream");
                return DriveOutcome::Superseded;
            }

            let next = match tokio::time::timeout(timeout, stream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    let reason = format!("Stream stalled for {:?}", timeout);
                    return self.abort(&reason, observer);
                }
            };

            match next {
                Some(Ok(bytes)) => {
                    let text = utf8.decode(&bytes);
                    if text.is_empty() {
                        continue;
                    }
                    let outcome = self.feed(&text);
                    if let Some(done) = self.report(outcome, observer) {
                        return done;
                    }
                }
                Some(Err(e)) => {
                    return self.abort(&e.to_string(), observer);
                }
                None => {
                    let tail = utf8.finish();
                    if !tail.is_empty() {
                        let outcome = self.feed(&tail);
                        if let Some(done) = self.report(outcome, observer) {
                            return done;
                        }
                    }
                    let outcome = self.finish();
                    if let Some(done) = self.report(outcome, observer) {
                        return done;
                    }
                    info!(generation = self.id, "Generation finished");
                    return DriveOutcome::Finished(self.sections().clone());
                }
            }
        }
    }

    fn abort<O>(&mut self, reason: &str, observer: &mut O) -> DriveOutcome
    where
        O: GenerationObserver + ?Sized,
    {
        warn!(generation = self.id, reason, "Generation stream failed");
        let outcome = self.fail(reason);
        self.report(outcome, observer)
            .unwrap_or_else(|| DriveOutcome::Failed {
                reason: reason.to_string(),
            })
    }

    /// Forward events; returns a terminal outcome if the generation is done.
    fn report<O>(&self, outcome: FeedOutcome, observer: &mut O) -> Option<DriveOutcome>
    where
        O: GenerationObserver + ?Sized,
    {
        match outcome {
            FeedOutcome::Stale => Some(DriveOutcome::Superseded),
            FeedOutcome::Applied(events) => {
                for event in &events {
                    observer.on_event(self.id, event);
                }
                match &self.status {
                    GenerationStatus::Failed { reason } => Some(DriveOutcome::Failed {
                        reason: reason.clone(),
                    }),
                    _ => None,
                }
            }
        }
    }

    fn publish(&mut self, events: Vec<DecoderEvent>) -> FeedOutcome {
        let snapshot = Snapshot {
            generation: self.id,
            phase: self.decoder.current_phase(),
            sections: self.decoder.current_sections().clone(),
            status: self.status.clone(),
        };
        if self.workspace.commit(snapshot) {
            FeedOutcome::Applied(events)
        } else {
            FeedOutcome::Stale
        }
    }
}
