use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigResult};
use crate::{
    auth::FileTokenStore,
    section_decoder::{DEFAULT_MAX_BUFFER_SIZE, DecoderConfig},
};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL including the `/api` prefix
    pub api_url: String,
    /// Bound on non-streaming requests
    pub request_timeout_secs: u64,
    /// Longest silence tolerated between two chunks of a generation stream
    pub stream_timeout_secs: u64,
    pub max_buffer_size: usize,
    /// Defaults to the platform config dir when unset
    pub token_file: Option<PathBuf>,
    pub preview: PreviewConfig,
}

/// Local preview server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreviewConfig {
    pub host: String,
    pub port: u16,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5173,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: 60,
            stream_timeout_secs: 30,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            token_file: None,
            preview: PreviewConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        let scheme_ok =
            self.api_url.starts_with("http://") || self.api_url.starts_with("https://");
        if !scheme_ok {
            return Err(ConfigError::InvalidValue {
                field: "api_url".to_string(),
                value: self.api_url.clone(),
                reason: "must start with http:// or https://".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_secs".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.stream_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "stream_timeout_secs".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_buffer_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_buffer_size".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }

    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            max_buffer_size: self.max_buffer_size,
            ..Default::default()
        }
    }

    /// Where tokens are persisted.
    pub fn token_path(&self) -> ConfigResult<PathBuf> {
        self.token_file
            .clone()
            .or_else(FileTokenStore::default_path)
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "token_file".to_string(),
            })
    }
}
