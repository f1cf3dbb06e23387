// Shared helpers for integration tests
#![allow(dead_code)]

pub mod mock_backend;
pub mod streaming_helpers;

use std::time::Duration;

use webagent::{
    auth::{AuthSession, MemoryTokenStore},
    section_decoder::DecoderConfig,
    workspace::Workspace,
};

pub use mock_backend::{MockBackend, MockBackendConfig};

/// The chunk sequence of a well-formed three-section response.
pub const COMPLETE_RESPONSE_CHUNKS: [&str; 7] = [
    "===ANALYSIS_START===",
    "Building a landing page.",
    "===ANALYSIS_END======CODE_START===",
    "<h1>Hi</h1>",
    "===CODE_END======SUMMARY_START===",
    "Done.",
    "===SUMMARY_END===",
];

pub fn complete_response() -> String {
    COMPLETE_RESPONSE_CHUNKS.concat()
}

/// Workspace with default sentinels and a short stall timeout.
pub fn test_workspace(stream_timeout: Duration) -> Workspace {
    Workspace::new(DecoderConfig::default(), stream_timeout)
}

/// Session against `backend` with in-memory token storage.
pub fn memory_session(backend: &MockBackend) -> AuthSession<MemoryTokenStore> {
    AuthSession::new(backend.client(), MemoryTokenStore::new())
}
