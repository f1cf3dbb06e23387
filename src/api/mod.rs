//! HTTP client for the website generation backend.
//!
//! Covers the authentication endpoints, the two streaming generation
//! endpoints and the catalogue lookups used to populate prompt options.

mod client;
mod types;

use std::path::PathBuf;

pub use client::{ApiClient, ByteStream, MAX_IMAGE_SIZE};
pub use types::{
    DescriptionRequest, DesignStyles, GenerateRequest, ImageAnalysis, RefreshRequest,
    RegisterRequest, SiteTypes, Templates, TokenPair, UpdateApiKeyRequest, User,
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{detail}")]
    Status { status: u16, detail: String },

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ApiError {
    /// Whether the backend rejected the request's credentials.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Status { status: 401 | 403, .. })
    }
}
