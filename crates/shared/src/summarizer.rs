use anyhow::{ensure, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::error::SummaryError;
use crate::models::{Article, SummaryResult};
use crate::traits::SummaryBackend;

pub(crate) const SUMMARY_SYSTEM_PROMPT: &str = "You are a news summarization assistant. \
You will be given a news headline and a summary. Rewrite that summary in your own words, \
maintaining a concise and strictly neutral, factual tone.";

pub(crate) fn summary_prompt(title: &str, base_summary: &str) -> String {
    let base_summary = if base_summary.trim().is_empty() {
        "(no summary provided)"
    } else {
        base_summary
    };
    format!(
        "Please provide a one-paragraph, neutral summary based on the following information:\n\n\
         Headline: {}\n\nSummary: {}",
        title, base_summary
    )
}

/// Bounded retry for a single provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 1,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Runs two independent summary backends over the same article input.
pub struct DualSummarizer {
    first: Arc<dyn SummaryBackend>,
    second: Arc<dyn SummaryBackend>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl DualSummarizer {
    pub fn new(
        first: Arc<dyn SummaryBackend>,
        second: Arc<dyn SummaryBackend>,
        retry: RetryPolicy,
        call_timeout: Duration,
    ) -> Result<Self> {
        ensure!(
            first.provider() != second.provider(),
            "Both summary slots use {}; pick two different providers",
            first.provider()
        );

        Ok(Self {
            first,
            second,
            retry,
            call_timeout,
        })
    }

    /// Always yields both results, first provider first. Neither call sees
    /// the other's output.
    pub async fn summarize(&self, article: &Article) -> (SummaryResult, SummaryResult) {
        tokio::join!(
            self.summarize_with(self.first.as_ref(), article),
            self.summarize_with(self.second.as_ref(), article)
        )
    }

    async fn summarize_with(
        &self,
        backend: &dyn SummaryBackend,
        article: &Article,
    ) -> SummaryResult {
        let provider = backend.provider();

        for attempt in 0..=self.retry.retries {
            match self.try_summarize(backend, article).await {
                Ok(text) => return SummaryResult::success(provider, text),
                Err(e) if attempt == self.retry.retries => {
                    tracing::warn!(
                        url = %article.url,
                        provider = %provider,
                        error = %e,
                        "Summary unavailable after {} attempt(s)",
                        attempt + 1
                    );
                    return SummaryResult::failed(provider, &e);
                }
                Err(e) => {
                    tracing::debug!(
                        url = %article.url,
                        provider = %provider,
                        error = %e,
                        "Summary attempt {} failed, retrying in {:?}",
                        attempt + 1,
                        self.retry.backoff
                    );
                    tokio::time::sleep(self.retry.backoff).await;
                }
            }
        }

        SummaryResult::failed(
            provider,
            &SummaryError::ProviderRejected("max retries reached".to_string()),
        )
    }

    async fn try_summarize(
        &self,
        backend: &dyn SummaryBackend,
        article: &Article,
    ) -> Result<String, SummaryError> {
        tokio::time::timeout(
            self.call_timeout,
            backend.summarize(&article.title, &article.base_summary),
        )
        .await
        .map_err(|_| SummaryError::Timeout)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Provider, Summary};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use url::Url;

    /// Fails the first `failures` calls, then echoes its input.
    struct FlakyBackend {
        provider: Provider,
        failures: u32,
        calls: AtomicU32,
        inputs: Mutex<Vec<(String, String)>>,
    }

    impl FlakyBackend {
        fn new(provider: Provider, failures: u32) -> Arc<Self> {
            Arc::new(Self {
                provider,
                failures,
                calls: AtomicU32::new(0),
                inputs: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SummaryBackend for FlakyBackend {
        fn provider(&self) -> Provider {
            self.provider
        }

        async fn summarize(&self, title: &str, base_summary: &str) -> Result<String, SummaryError> {
            self.inputs
                .lock()
                .unwrap()
                .push((title.to_string(), base_summary.to_string()));
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(SummaryError::ProviderUnreachable("connection reset".to_string()))
            } else {
                Ok(format!("{} says: {}", self.provider, title))
            }
        }
    }

    struct HangingBackend;

    #[async_trait]
    impl SummaryBackend for HangingBackend {
        fn provider(&self) -> Provider {
            Provider::OpenAi
        }

        async fn summarize(&self, _title: &str, _base: &str) -> Result<String, SummaryError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        }
    }

    fn article() -> Article {
        Article {
            url: Url::parse("https://example.com/story").unwrap(),
            title: "Rates held steady".to_string(),
            author: None,
            base_summary: "The central bank kept rates unchanged.".to_string(),
            image_url: None,
        }
    }

    fn quick_retry(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_same_provider_twice_is_rejected() {
        let result = DualSummarizer::new(
            FlakyBackend::new(Provider::Gemini, 0),
            FlakyBackend::new(Provider::Gemini, 0),
            RetryPolicy::default(),
            Duration::from_secs(1),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_prompt_marks_missing_base_summary() {
        let prompt = summary_prompt("Title", "  ");
        assert!(prompt.contains("Headline: Title"));
        assert!(prompt.contains("Summary: (no summary provided)"));
    }

    #[tokio::test]
    async fn test_both_providers_get_identical_input() {
        let a = FlakyBackend::new(Provider::Gemini, 0);
        let b = FlakyBackend::new(Provider::OpenAi, 0);
        let summarizer =
            DualSummarizer::new(a.clone(), b.clone(), quick_retry(1), Duration::from_secs(1))
                .unwrap();

        let (first, second) = summarizer.summarize(&article()).await;

        assert_eq!(first.provider, Provider::Gemini);
        assert_eq!(second.provider, Provider::OpenAi);
        assert_eq!(first.text(), Some("Gemini says: Rates held steady"));
        let expected = vec![(
            "Rates held steady".to_string(),
            "The central bank kept rates unchanged.".to_string(),
        )];
        assert_eq!(*a.inputs.lock().unwrap(), expected);
        assert_eq!(*b.inputs.lock().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_retry_recovers_transient_failure() {
        let b = FlakyBackend::new(Provider::OpenAi, 1);
        let summarizer = DualSummarizer::new(
            FlakyBackend::new(Provider::Gemini, 0),
            b.clone(),
            quick_retry(1),
            Duration::from_secs(1),
        )
        .unwrap();

        let (_, second) = summarizer.summarize(&article()).await;

        assert!(second.is_success());
        assert_eq!(b.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_only_that_provider() {
        let a = FlakyBackend::new(Provider::Gemini, u32::MAX);
        let summarizer = DualSummarizer::new(
            a.clone(),
            FlakyBackend::new(Provider::OpenAi, 0),
            quick_retry(2),
            Duration::from_secs(1),
        )
        .unwrap();

        let (first, second) = summarizer.summarize(&article()).await;

        assert_eq!(a.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            first.summary,
            Summary::Failed("provider unreachable: connection reset".to_string())
        );
        assert!(second.is_success());
    }

    #[tokio::test]
    async fn test_per_call_timeout_is_provider_failure() {
        let summarizer = DualSummarizer::new(
            FlakyBackend::new(Provider::Gemini, 0),
            Arc::new(HangingBackend),
            quick_retry(0),
            Duration::from_millis(50),
        )
        .unwrap();

        let (first, second) = summarizer.summarize(&article()).await;

        assert!(first.is_success());
        assert_eq!(second.summary, Summary::Failed("provider timed out".to_string()));
    }
}
