use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::error::AcquisitionError;
use crate::models::{Article, NewsRecord};
use crate::traits::{NewsSource, StructuredGenerator, TextGenerator};

/// How the initial headline list is obtained. Selected by configuration.
#[derive(Clone)]
pub enum AcquisitionStrategy {
    /// Query a structured news API and map its records directly.
    Direct(Arc<dyn NewsSource>),
    /// Ask a search-grounded model for headlines as prose, then have a
    /// JSON-mode model convert that prose into records.
    GenerateThenStructure {
        generator: Arc<dyn TextGenerator>,
        structurer: Arc<dyn StructuredGenerator>,
    },
}

impl AcquisitionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            AcquisitionStrategy::Direct(_) => "direct",
            AcquisitionStrategy::GenerateThenStructure { .. } => "generate-then-structure",
        }
    }
}

#[derive(Debug, Deserialize)]
struct StructuredHeadline {
    title: String,
    summary: String,
    url: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

pub struct HeadlineAcquirer {
    strategy: AcquisitionStrategy,
    call_timeout: Duration,
}

impl HeadlineAcquirer {
    pub fn new(strategy: AcquisitionStrategy, call_timeout: Duration) -> Self {
        Self {
            strategy,
            call_timeout,
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Produce exactly `count` articles in source order, or fail.
    pub async fn acquire(&self, count: usize) -> Result<Vec<Article>, AcquisitionError> {
        let records = match &self.strategy {
            AcquisitionStrategy::Direct(source) => {
                self.with_timeout(source.top_headlines(count)).await?
            }
            AcquisitionStrategy::GenerateThenStructure {
                generator,
                structurer,
            } => {
                let prompt = headline_prompt(count);
                let raw_text = self
                    .with_timeout(async {
                        generator
                            .generate_text(&prompt)
                            .await
                            .map_err(AcquisitionError::from)
                    })
                    .await?;
                tracing::debug!(chars = raw_text.len(), "Received headline text");

                let prompt = structuring_prompt(&raw_text);
                let schema = headline_schema();
                let json_text = self
                    .with_timeout(async {
                        structurer
                            .generate_structured(&prompt, &schema)
                            .await
                            .map_err(AcquisitionError::from)
                    })
                    .await?;

                parse_structured_headlines(&json_text)?
            }
        };

        normalize(records, count)
    }

    async fn with_timeout<T>(
        &self,
        call: impl Future<Output = Result<T, AcquisitionError>>,
    ) -> Result<T, AcquisitionError> {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| {
                AcquisitionError::SourceUnreachable(format!(
                    "timed out after {:?}",
                    self.call_timeout
                ))
            })?
    }
}

fn headline_prompt(count: usize) -> String {
    format!(
        r#"Use the Google Search tool to find the {count} most recent, major news headlines.

For each headline, provide:
1. The headline title
2. A concise 1-2 sentence summary of the article's content.
3. The direct URL link to the article.
4. The author, if the article names one.
5. The URL of the article's lead image, if it has one.

Format this as a simple, human-readable, numbered list.
Do not worry about JSON. Just list the {count} findings."#
    )
}

fn structuring_prompt(raw_text: &str) -> String {
    format!(
        r#"Please parse the following text and convert it into a valid JSON array.

Each element must be an object with:
  "title": the headline of the article
  "summary": the concise summary of the article
  "url": the direct URL to the article
  "author": the author, or omit if unknown
  "image_url": the lead image URL, or omit if unknown

Your entire response must be *only* this JSON array.
Ignore any conversational text, apologies, or non-headline content
in the input text. Just extract the articles.

Here is the text to parse:
---
{raw_text}
---"#
    )
}

fn headline_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "title": { "type": "STRING" },
                "summary": { "type": "STRING" },
                "url": { "type": "STRING" },
                "author": { "type": "STRING" },
                "image_url": { "type": "STRING" }
            },
            "required": ["title", "summary", "url"]
        }
    })
}

/// Strict parse of the structuring pass. Any deviation fails the whole step.
fn parse_structured_headlines(json_text: &str) -> Result<Vec<NewsRecord>, AcquisitionError> {
    let headlines: Vec<StructuredHeadline> = serde_json::from_str(json_text)
        .map_err(|e| AcquisitionError::MalformedStructure(e.to_string()))?;

    if headlines.is_empty() {
        return Err(AcquisitionError::MalformedStructure(
            "expected a non-empty JSON array".to_string(),
        ));
    }

    Ok(headlines
        .into_iter()
        .map(|headline| NewsRecord {
            title: headline.title,
            author: headline.author,
            url: headline.url,
            description: headline.summary,
            image_url: headline.image_url,
        })
        .collect())
}

fn parse_web_url(raw: &str) -> Option<Url> {
    Url::parse(raw.trim())
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Turn raw records into articles: drop unusable and duplicate records, keep
/// source order, and require at least `count` survivors.
fn normalize(records: Vec<NewsRecord>, count: usize) -> Result<Vec<Article>, AcquisitionError> {
    let mut seen = HashSet::new();
    let mut articles = Vec::with_capacity(count.min(records.len()));

    for record in records {
        let title = record.title.trim();
        // NewsAPI blanks out pulled stories this way
        if title.is_empty() || title == "[Removed]" {
            continue;
        }
        let Some(url) = parse_web_url(&record.url) else {
            tracing::debug!(url = %record.url, "Skipping headline with unusable URL");
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }

        articles.push(Article {
            url,
            title: title.to_string(),
            author: non_empty(record.author),
            base_summary: record.description.trim().to_string(),
            image_url: record.image_url.as_deref().and_then(parse_web_url),
        });

        if articles.len() == count {
            return Ok(articles);
        }
    }

    Err(AcquisitionError::InsufficientResults {
        wanted: count,
        got: articles.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedSource(Vec<NewsRecord>);

    #[async_trait]
    impl NewsSource for FixedSource {
        async fn top_headlines(&self, _count: usize) -> Result<Vec<NewsRecord>, AcquisitionError> {
            Ok(self.0.clone())
        }
    }

    struct StalledSource;

    #[async_trait]
    impl NewsSource for StalledSource {
        async fn top_headlines(&self, _count: usize) -> Result<Vec<NewsRecord>, AcquisitionError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
    }

    struct ScriptedModel {
        prose: String,
        json: String,
        structuring_input: Mutex<Option<String>>,
    }

    #[async_trait]
    impl TextGenerator for ScriptedModel {
        async fn generate_text(&self, _prompt: &str) -> Result<String, BackendError> {
            Ok(self.prose.clone())
        }
    }

    #[async_trait]
    impl StructuredGenerator for ScriptedModel {
        async fn generate_structured(
            &self,
            prompt: &str,
            _schema: &Value,
        ) -> Result<String, BackendError> {
            *self.structuring_input.lock().unwrap() = Some(prompt.to_string());
            Ok(self.json.clone())
        }
    }

    fn record(title: &str, url: &str) -> NewsRecord {
        NewsRecord {
            title: title.to_string(),
            url: url.to_string(),
            description: format!("About {}", title),
            ..NewsRecord::default()
        }
    }

    fn generate_then_structure(model: Arc<ScriptedModel>) -> HeadlineAcquirer {
        HeadlineAcquirer::new(
            AcquisitionStrategy::GenerateThenStructure {
                generator: model.clone(),
                structurer: model,
            },
            Duration::from_secs(1),
        )
    }

    fn scripted(json: &str) -> Arc<ScriptedModel> {
        Arc::new(ScriptedModel {
            prose: "1. Markets rally - https://example.com/markets".to_string(),
            json: json.to_string(),
            structuring_input: Mutex::new(None),
        })
    }

    #[test]
    fn test_normalize_skips_bad_and_duplicate_records() {
        let records = vec![
            record("First", "https://example.com/1"),
            record("[Removed]", "https://removed.com"),
            record("", "https://example.com/empty-title"),
            record("No URL", "not a url"),
            record("FTP", "ftp://example.com/file"),
            record("Duplicate", "https://example.com/1"),
            record("Second", "https://example.com/2"),
        ];

        let articles = normalize(records, 2).unwrap();
        let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second"]);
    }

    #[test]
    fn test_normalize_truncates_to_count() {
        let records = (1..=6)
            .map(|i| record(&format!("Story {}", i), &format!("https://example.com/{}", i)))
            .collect();
        assert_eq!(normalize(records, 4).unwrap().len(), 4);
    }

    #[test]
    fn test_normalize_cleans_optional_fields() {
        let records = vec![NewsRecord {
            title: "  Padded  ".to_string(),
            author: Some("   ".to_string()),
            url: "https://example.com/a".to_string(),
            description: " Desc ".to_string(),
            image_url: Some("/relative.jpg".to_string()),
        }];

        let article = normalize(records, 1).unwrap().remove(0);
        assert_eq!(article.title, "Padded");
        assert_eq!(article.author, None);
        assert_eq!(article.base_summary, "Desc");
        assert_eq!(article.image_url, None);
    }

    #[tokio::test]
    async fn test_direct_insufficient_results() {
        let acquirer = HeadlineAcquirer::new(
            AcquisitionStrategy::Direct(Arc::new(FixedSource(vec![
                record("Only", "https://example.com/only"),
            ]))),
            Duration::from_secs(1),
        );

        assert_eq!(
            acquirer.acquire(5).await,
            Err(AcquisitionError::InsufficientResults { wanted: 5, got: 1 })
        );
    }

    #[tokio::test]
    async fn test_direct_timeout_is_source_unreachable() {
        let acquirer = HeadlineAcquirer::new(
            AcquisitionStrategy::Direct(Arc::new(StalledSource)),
            Duration::from_millis(50),
        );

        assert!(matches!(
            acquirer.acquire(5).await,
            Err(AcquisitionError::SourceUnreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_then_structure_round() {
        let model = scripted(
            r#"[
                {"title": "Markets rally", "summary": "Stocks rose.", "url": "https://example.com/markets", "author": "A. Writer"},
                {"title": "Storm hits coast", "summary": "Heavy rain.", "url": "https://example.com/storm", "image_url": "https://example.com/storm.webp"}
            ]"#,
        );
        let acquirer = generate_then_structure(model.clone());

        let articles = acquirer.acquire(2).await.unwrap();

        assert_eq!(articles[0].title, "Markets rally");
        assert_eq!(articles[0].author.as_deref(), Some("A. Writer"));
        assert_eq!(articles[0].base_summary, "Stocks rose.");
        assert_eq!(
            articles[1].image_url.as_ref().map(Url::as_str),
            Some("https://example.com/storm.webp")
        );

        // The prose from the first pass is what gets structured
        let structuring_input = model.structuring_input.lock().unwrap().clone().unwrap();
        assert!(structuring_input.contains("1. Markets rally - https://example.com/markets"));
    }

    #[tokio::test]
    async fn test_unparseable_structure_is_fatal() {
        let acquirer = generate_then_structure(scripted("Here are the headlines: [..."));
        assert!(matches!(
            acquirer.acquire(1).await,
            Err(AcquisitionError::MalformedStructure(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_required_key_is_malformed() {
        let acquirer =
            generate_then_structure(scripted(r#"[{"title": "No link", "summary": "x"}]"#));
        assert!(matches!(
            acquirer.acquire(1).await,
            Err(AcquisitionError::MalformedStructure(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_array_is_malformed() {
        let acquirer = generate_then_structure(scripted("[]"));
        assert!(matches!(
            acquirer.acquire(1).await,
            Err(AcquisitionError::MalformedStructure(_))
        ));
    }
}
