use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::error::ImageError;
use crate::models::ResolvedImage;
use crate::sniffer::{self, ImageMediaType};

/// Status, declared content type and body of an image download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait ImageTransport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<ImageResponse, ImageError>;
}

/// Images bigger than this are left out rather than inlined into the email.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

pub struct HttpImageTransport {
    client: Client,
    allowed: Vec<ImageMediaType>,
    max_bytes: usize,
}

impl HttpImageTransport {
    pub fn new(timeout: Duration, allowed: Vec<ImageMediaType>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (compatible; NewsRecap/1.0)")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            allowed,
            max_bytes: MAX_IMAGE_BYTES,
        })
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

fn read_error(err: reqwest::Error) -> ImageError {
    if err.is_timeout() {
        ImageError::Timeout
    } else {
        ImageError::Unreachable(format!("failed to read body: {}", err))
    }
}

#[async_trait]
impl ImageTransport for HttpImageTransport {
    /// Status and headers are checked before the body is read; rejected
    /// responses never download their payload.
    async fn get(&self, url: &Url) -> Result<ImageResponse, ImageError> {
        let mut response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ImageError::Timeout
                } else {
                    ImageError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        if !response.status().is_success() {
            return Ok(ImageResponse {
                status,
                content_type,
                body: Vec::new(),
            });
        }

        sniffer::classify_header(content_type.as_deref(), &self.allowed)?;

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(ImageError::TooLarge(self.max_bytes));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(read_error)? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(ImageError::TooLarge(self.max_bytes));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(ImageResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Downloads an article's image and decides whether it can be embedded.
pub struct ImageResolver {
    transport: Arc<dyn ImageTransport>,
    allowed: Vec<ImageMediaType>,
    timeout: Duration,
}

impl ImageResolver {
    pub fn new(
        transport: Arc<dyn ImageTransport>,
        allowed: Vec<ImageMediaType>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            allowed,
            timeout,
        }
    }

    /// Never fails: every problem degrades to `ResolvedImage::Unavailable`.
    pub async fn resolve(&self, image_url: Option<&Url>) -> ResolvedImage {
        let Some(url) = image_url else {
            return ResolvedImage::Unavailable;
        };

        match self.try_resolve(url).await {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(image_url = %url, error = %e, "Image unavailable");
                ResolvedImage::Unavailable
            }
        }
    }

    async fn try_resolve(&self, url: &Url) -> Result<ResolvedImage, ImageError> {
        let response = tokio::time::timeout(self.timeout, self.transport.get(url))
            .await
            .map_err(|_| ImageError::Timeout)??;

        if !(200..300).contains(&response.status) {
            return Err(ImageError::Unreachable(format!("HTTP {}", response.status)));
        }

        let media_type = sniffer::sniff(
            response.content_type.as_deref(),
            &response.body,
            &self.allowed,
        )?;

        Ok(ResolvedImage::Embedded {
            bytes: response.body,
            media_type,
        })
    }
}
