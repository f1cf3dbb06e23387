use std::{path::Path, pin::Pin, time::Duration};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{RequestBuilder, Response, multipart};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use super::{
    ApiError,
    types::{
        DescriptionRequest, DesignStyles, ErrorBody, GenerateRequest, ImageAnalysis,
        RefreshRequest, RegisterRequest, SiteTypes, Templates, TokenPair, UpdateApiKeyRequest,
        User,
    },
};

/// Largest image the backend accepts for analysis.
pub const MAX_IMAGE_SIZE: u64 = 10 * 1024 * 1024; // 10MB

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl ApiClient {
    /// `request_timeout` bounds non-streaming calls. Streaming calls are only
    /// bounded by the connect timeout; stalls are detected by the consumer.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, api_path: &str) -> String {
        if api_path.starts_with('/') {
            format!("{}{}", self.base_url, api_path)
        } else {
            format!("{}/{}", self.base_url, api_path)
        }
    }

    fn authorized(builder: RequestBuilder, access_token: Option<&str>) -> RequestBuilder {
        match access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Turn a non-2xx response into `ApiError::Status` with the backend's message.
    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.bytes().await.unwrap_or_default();
        let detail = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message())
            .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
        Err(ApiError::Status {
            status: status.as_u16(),
            detail,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = builder.timeout(self.request_timeout).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_stream(&self, builder: RequestBuilder) -> Result<ByteStream, ApiError> {
        let response = Self::check(builder.send().await?).await?;
        debug!(status = %response.status(), "Generation stream opened");
        Ok(response.bytes_stream().boxed())
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        let builder = self.client.post(self.url("/users/register")).json(request);
        self.send_json(builder).await.inspect_err(|e| {
            error!(error = %e, "Registration failed");
        })
    }

    /// Password login. The backend expects an OAuth2 password form.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, ApiError> {
        let builder = self
            .client
            .post(self.url("/users/login"))
            .form(&[("username", username), ("password", password)]);
        self.send_json(builder).await.inspect_err(|e| {
            error!(error = %e, "Login failed");
        })
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let builder = self
            .client
            .post(self.url("/users/refresh"))
            .json(&RefreshRequest { refresh_token });
        self.send_json(builder).await.inspect_err(|e| {
            error!(error = %e, "Token refresh failed");
        })
    }

    pub async fn current_user(&self, access_token: &str) -> Result<User, ApiError> {
        let builder = self
            .client
            .get(self.url("/users/me"))
            .bearer_auth(access_token);
        self.send_json(builder).await
    }

    pub async fn update_api_key(
        &self,
        access_token: &str,
        request: &UpdateApiKeyRequest,
    ) -> Result<(), ApiError> {
        let builder = self
            .client
            .post(self.url("/users/update-api-key"))
            .bearer_auth(access_token)
            .json(request);
        let response = builder.timeout(self.request_timeout).send().await?;
        Self::check(response).await.inspect_err(|e| {
            error!(error = %e, "API key update failed");
        })?;
        Ok(())
    }

    /// Start a generation from a text prompt.
    pub async fn generate(
        &self,
        access_token: Option<&str>,
        request: &GenerateRequest,
    ) -> Result<ByteStream, ApiError> {
        request.validate()?;
        let builder = self.client.post(self.url("/generate")).json(request);
        self.send_stream(Self::authorized(builder, access_token))
            .await
    }

    /// Start a generation from an image-derived description.
    pub async fn generate_from_description(
        &self,
        access_token: Option<&str>,
        description: &str,
    ) -> Result<ByteStream, ApiError> {
        if description.trim().is_empty() {
            return Err(ApiError::InvalidRequest(
                "Description is required".to_string(),
            ));
        }
        let builder = self
            .client
            .post(self.url("/generate-website"))
            .json(&DescriptionRequest { description });
        self.send_stream(Self::authorized(builder, access_token))
            .await
    }

    /// Upload a design image and get back a textual description of it.
    pub async fn analyze_image(
        &self,
        access_token: Option<&str>,
        path: &Path,
    ) -> Result<ImageAnalysis, ApiError> {
        let mime = image_mime_type(path)?;
        let io_err = |source| ApiError::Io {
            path: path.to_path_buf(),
            source,
        };

        let size = tokio::fs::metadata(path).await.map_err(io_err)?.len();
        if size > MAX_IMAGE_SIZE {
            return Err(ApiError::InvalidRequest(format!(
                "File size too large. Maximum size: {}MB",
                MAX_IMAGE_SIZE / (1024 * 1024)
            )));
        }
        let data = tokio::fs::read(path).await.map_err(io_err)?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let part = multipart::Part::bytes(data)
            .file_name(file_name)
            .mime_str(mime)?;
        let form = multipart::Form::new().part("file", part);

        let builder = self.client.post(self.url("/analyze-image")).multipart(form);
        self.send_json(Self::authorized(builder, access_token))
            .await
            .inspect_err(|e| {
                error!(error = %e, "Image analysis failed");
            })
    }

    /// Available design styles, or the built-in default when the lookup fails.
    pub async fn design_styles(&self) -> DesignStyles {
        let builder = self.client.get(self.url("/design-styles"));
        self.send_json(builder).await.unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default design styles");
            DesignStyles::default()
        })
    }

    pub async fn site_types(&self) -> SiteTypes {
        let builder = self.client.get(self.url("/site-types"));
        self.send_json(builder).await.unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default site types");
            SiteTypes::default()
        })
    }

    pub async fn templates(&self) -> Templates {
        let builder = self.client.get(self.url("/templates"));
        self.send_json(builder).await.unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to empty template list");
            Templates::default()
        })
    }
}

/// Content type for an image upload, judged by file extension.
fn image_mime_type(path: &Path) -> Result<&'static str, ApiError> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => Ok("image/jpeg"),
        Some("png") => Ok("image/png"),
        Some("webp") => Ok("image/webp"),
        Some("gif") => Ok("image/gif"),
        _ => Err(ApiError::InvalidRequest(
            "Invalid file type. Allowed types: jpeg, jpg, png, webp, gif".to_string(),
        )),
    }
}
