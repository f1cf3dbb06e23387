//! Generation lifecycle.
//!
//! A [`Workspace`] hands out request-scoped [`Generation`]s, each owning its
//! own decoder and identified by a monotonically increasing id. Only the
//! current generation may publish to the shared [`Snapshot`]; chunks that
//! arrive late for a superseded generation are dropped.

mod generation;
mod utf8;

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use serde::Serialize;
use tokio::sync::watch;

pub use generation::{DriveOutcome, FeedOutcome, Generation};
pub use utf8::Utf8StreamDecoder;

use crate::section_decoder::{DecoderConfig, DecoderEvent, Phase, Sections};

/// Default bound on how long a stream may stay silent.
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GenerationStatus {
    #[default]
    Idle,
    Streaming,
    Finished,
    Failed {
        reason: String,
    },
}

/// Committed state of the current generation, as seen by readers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub generation: u64,
    pub phase: Phase,
    pub sections: Sections,
    pub status: GenerationStatus,
}

/// Receives decoder events as a generation progresses.
pub trait GenerationObserver {
    fn on_event(&mut self, generation: u64, event: &DecoderEvent);
}

#[derive(Debug)]
struct WorkspaceInner {
    decoder_config: DecoderConfig,
    stream_timeout: Duration,
    current: AtomicU64,
    snapshot_tx: watch::Sender<Snapshot>,
}

#[derive(Debug, Clone)]
pub struct Workspace {
    inner: Arc<WorkspaceInner>,
}

impl Workspace {
    pub fn new(decoder_config: DecoderConfig, stream_timeout: Duration) -> Self {
        let (snapshot_tx, _) = watch::channel(Snapshot::default());
        Self {
            inner: Arc::new(WorkspaceInner {
                decoder_config,
                stream_timeout,
                current: AtomicU64::new(0),
                snapshot_tx,
            }),
        }
    }

    /// Start a new generation, superseding any in-flight one.
    pub fn begin(&self) -> Generation {
        let id = self.inner.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.snapshot_tx.send_if_modified(|snapshot| {
            if id <= snapshot.generation {
                return false;
            }
            *snapshot = Snapshot {
                generation: id,
                status: GenerationStatus::Streaming,
                ..Default::default()
            };
            true
        });
        tracing::info!(generation = id, "Generation started");
        Generation::new(id, self.clone(), self.inner.decoder_config.clone())
    }

    pub fn current_generation(&self) -> u64 {
        self.inner.current.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    pub fn stream_timeout(&self) -> Duration {
        self.inner.stream_timeout
    }

    /// Publish `snapshot` if it still belongs to the current generation.
    fn commit(&self, snapshot: Snapshot) -> bool {
        let id = snapshot.generation;
        self.inner.snapshot_tx.send_if_modified(|current| {
            if current.generation != id || self.current_generation() != id {
                return false;
            }
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
        self.current_generation() == id
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(DecoderConfig::default(), DEFAULT_STREAM_TIMEOUT)
    }
}
