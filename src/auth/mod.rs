//! Authentication session and client-side token persistence.

mod session;
mod token_store;

use std::path::PathBuf;

pub use session::AuthSession;
pub use token_store::{FileTokenStore, MemoryTokenStore, StoredTokens, TokenStore};

use crate::api::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Not logged in")]
    NotLoggedIn,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Token store {} unavailable: {source}", .path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Token store is corrupt: {0}")]
    Serde(#[from] serde_json::Error),
}
