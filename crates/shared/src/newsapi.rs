use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::error::{AcquisitionError, BackendError};
use crate::models::NewsRecord;
use crate::traits::NewsSource;

const NEWS_API_BASE_URL: &str = "https://newsapi.org/v2";

/// NewsAPI caps `pageSize` at 100.
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiArticle {
    title: Option<String>,
    author: Option<String>,
    url: Option<String>,
    description: Option<String>,
    url_to_image: Option<String>,
}

impl From<NewsApiArticle> for NewsRecord {
    fn from(article: NewsApiArticle) -> Self {
        NewsRecord {
            title: article.title.unwrap_or_default(),
            author: article.author,
            url: article.url.unwrap_or_default(),
            description: article.description.unwrap_or_default(),
            image_url: article.url_to_image,
        }
    }
}

/// Client for the newsapi.org `top-headlines` endpoint.
pub struct NewsApiClient {
    client: Client,
    api_key: String,
    country: String,
    category: Option<String>,
    base_url: String,
}

impl NewsApiClient {
    pub fn new(
        api_key: String,
        country: String,
        category: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("NewsRecap/1.0")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            country,
            category,
            base_url: NEWS_API_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn health_check(&self) -> Result<(), AcquisitionError> {
        self.top_headlines(1).await.map(|_| ())
    }

    fn request_url(&self, page_size: usize) -> Result<Url, AcquisitionError> {
        let mut params = vec![
            ("country", self.country.clone()),
            ("pageSize", page_size.to_string()),
        ];
        if let Some(category) = &self.category {
            params.push(("category", category.clone()));
        }

        Url::parse_with_params(&format!("{}/top-headlines", self.base_url), &params)
            .map_err(|e| AcquisitionError::SourceUnreachable(format!("invalid news API URL: {}", e)))
    }
}

#[async_trait]
impl NewsSource for NewsApiClient {
    async fn top_headlines(&self, count: usize) -> Result<Vec<NewsRecord>, AcquisitionError> {
        // Over-fetch so removed or malformed records can be skipped
        let page_size = count.saturating_mul(2).clamp(1, MAX_PAGE_SIZE);
        let url = self.request_url(page_size)?;

        let response = self
            .client
            .get(url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(BackendError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status, &error_text).into());
        }

        let news_response = response
            .json::<NewsApiResponse>()
            .await
            .map_err(|e| {
                AcquisitionError::SourceUnreachable(format!("unparseable news API response: {}", e))
            })?;

        if news_response.status != "ok" {
            return Err(AcquisitionError::SourceUnreachable(
                news_response
                    .message
                    .unwrap_or_else(|| format!("news API status {}", news_response.status)),
            ));
        }

        Ok(news_response
            .articles
            .into_iter()
            .map(NewsRecord::from)
            .collect())
    }
}
