use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ApiError;

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub password: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateApiKeyRequest {
    pub new_api_key: String,
    pub current_password: String,
}

/// Body of `POST /generate`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_type: Option<String>,
    /// Page produced by an earlier generation, for iterative edits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_prompt: Option<String>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.prompt.trim().is_empty() {
            return Err(ApiError::InvalidRequest(
                "Please enter a prompt or upload an image".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DescriptionRequest<'a> {
    pub description: &'a str,
}

/// Result of `POST /analyze-image`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    #[serde(default)]
    pub success: bool,
    pub description: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub image_dimensions: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignStyles {
    #[serde(default)]
    pub styles: BTreeMap<String, Value>,
    #[serde(default = "default_design_style")]
    pub default: String,
}

fn default_design_style() -> String {
    "v0-modern".to_string()
}

impl Default for DesignStyles {
    fn default() -> Self {
        Self {
            styles: BTreeMap::new(),
            default: default_design_style(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteTypes {
    #[serde(default)]
    pub types: Vec<Value>,
    #[serde(default = "default_site_type")]
    pub default: String,
}

fn default_site_type() -> String {
    "landing".to_string()
}

impl Default for SiteTypes {
    fn default() -> Self {
        Self {
            types: Vec::new(),
            default: default_site_type(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Templates {
    #[serde(default)]
    pub templates: Vec<Value>,
}

/// Error body returned by the backend.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    /// Human readable message, if the body carried one.
    ///
    /// `detail` is a string for handled errors and a list of objects for
    /// request validation failures.
    pub fn message(&self) -> Option<String> {
        match &self.detail {
            Some(Value::String(detail)) => return Some(detail.clone()),
            Some(Value::Array(items)) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .collect();
                if !messages.is_empty() {
                    return Some(messages.join("; "));
                }
            }
            _ => {}
        }
        self.error.clone()
    }
}
