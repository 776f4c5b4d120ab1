use anyhow::{Context, Result};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::acquirer::{AcquisitionStrategy, HeadlineAcquirer};
use crate::briefing::{BriefingDocument, BriefingGenerator, ImageEmbedding};
use crate::config::{Config, HeadlineSource};
use crate::error::{AssemblyError, PipelineError};
use crate::gemini::GeminiClient;
use crate::images::{HttpImageTransport, ImageResolver};
use crate::models::{Article, ArticleEntry, Provider, Report};
use crate::newsapi::NewsApiClient;
use crate::openai::OpenAiClient;
use crate::summarizer::{DualSummarizer, RetryPolicy};
use crate::traits::{ReportDelivery, SummaryBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Acquiring,
    Enriching,
    Assembling,
    Done,
    FatalFailure,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Acquiring => "acquiring",
            RunState::Enriching => "enriching",
            RunState::Assembling => "assembling",
            RunState::Done => "done",
            RunState::FatalFailure => "fatal-failure",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub headline_count: usize,
    pub concurrency: usize,
    pub run_timeout: Duration,
    pub embedding: ImageEmbedding,
}

/// One short-lived briefing run: acquire, enrich, assemble.
pub struct Pipeline {
    acquirer: HeadlineAcquirer,
    summarizer: DualSummarizer,
    resolver: ImageResolver,
    options: RunOptions,
}

/// The current stage lives outside the timed future so that a timeout or
/// cancellation can still report where the run was.
fn advance(stage: &watch::Sender<RunState>, next: RunState) {
    let from = stage.send_replace(next);
    tracing::info!(from = %from, to = %next, "Pipeline state change");
}

impl Pipeline {
    pub fn new(
        acquirer: HeadlineAcquirer,
        summarizer: DualSummarizer,
        resolver: ImageResolver,
        options: RunOptions,
    ) -> Self {
        Self {
            acquirer,
            summarizer,
            resolver,
            options,
        }
    }

    /// Wire real HTTP clients from configuration.
    pub fn from_config(config: &Config, embedding: ImageEmbedding) -> Result<Self> {
        let settings = &config.settings;

        let gemini = Arc::new(GeminiClient::new(
            config.gemini_api_key.clone(),
            settings.gemini_model.clone(),
            settings.call_timeout,
        )?);
        let openai = Arc::new(OpenAiClient::new(
            config.openai_api_key.clone(),
            settings.openai_model.clone(),
            settings.call_timeout,
        )?);

        let strategy = match settings.source {
            HeadlineSource::Gemini => AcquisitionStrategy::GenerateThenStructure {
                generator: gemini.clone(),
                structurer: gemini.clone(),
            },
            HeadlineSource::NewsApi => {
                let api_key = config
                    .news_api_key
                    .clone()
                    .context("NEWS_API_KEY is required when RECAP_SOURCE=newsapi")?;
                AcquisitionStrategy::Direct(Arc::new(NewsApiClient::new(
                    api_key,
                    settings.news_country.clone(),
                    settings.news_category.clone(),
                    settings.call_timeout,
                )?))
            }
        };

        let backend = |provider: Provider| -> Arc<dyn SummaryBackend> {
            match provider {
                Provider::Gemini => gemini.clone(),
                Provider::OpenAi => openai.clone(),
            }
        };

        let summarizer = DualSummarizer::new(
            backend(settings.provider_a),
            backend(settings.provider_b),
            RetryPolicy {
                retries: settings.summary_retries,
                backoff: settings.retry_backoff,
            },
            settings.call_timeout,
        )?;

        let resolver = ImageResolver::new(
            Arc::new(HttpImageTransport::new(
                settings.call_timeout,
                settings.image_types.clone(),
            )?),
            settings.image_types.clone(),
            settings.call_timeout,
        );

        Ok(Self::new(
            HeadlineAcquirer::new(strategy, settings.call_timeout),
            summarizer,
            resolver,
            RunOptions {
                headline_count: settings.headline_count,
                concurrency: settings.concurrency,
                run_timeout: settings.run_timeout,
                embedding,
            },
        ))
    }

    /// Produce a complete document or a fatal error. Cancellation and the
    /// run timeout abandon in-flight work and never yield a partial document.
    pub async fn run(
        &self,
        date: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<BriefingDocument, PipelineError> {
        let (stage, _) = watch::channel(RunState::Idle);
        let run_timeout = self.options.run_timeout;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled {
                stage: *stage.borrow(),
            }),
            outcome = tokio::time::timeout(run_timeout, self.execute(date, &stage)) => {
                outcome.unwrap_or_else(|_| {
                    Err(PipelineError::RunTimedOut {
                        stage: *stage.borrow(),
                        after: run_timeout,
                    })
                })
            }
        };

        if let Err(e) = &result {
            tracing::error!(stage = %e.stage(), error = %e, "Pipeline run failed");
        }
        result
    }

    /// Run, then hand the document to `delivery`. Delivery is never attempted
    /// for a failed run.
    pub async fn run_and_deliver(
        &self,
        date: NaiveDate,
        cancel: &CancellationToken,
        delivery: &dyn ReportDelivery,
    ) -> Result<BriefingDocument, PipelineError> {
        let document = self.run(date, cancel).await?;
        delivery
            .deliver(&document)
            .await
            .map_err(|e| PipelineError::Delivery(format!("{:#}", e)))?;
        Ok(document)
    }

    async fn execute(
        &self,
        date: NaiveDate,
        stage: &watch::Sender<RunState>,
    ) -> Result<BriefingDocument, PipelineError> {
        advance(stage, RunState::Acquiring);
        let articles = self
            .acquirer
            .acquire(self.options.headline_count)
            .await
            .inspect_err(|_| advance(stage, RunState::FatalFailure))?;
        tracing::info!(
            count = articles.len(),
            strategy = self.acquirer.strategy_name(),
            "Acquired headlines"
        );

        advance(stage, RunState::Enriching);
        let acquired = articles.len();
        let report = Report {
            date,
            entries: self.enrich(articles).await,
        };
        let stats = report.stats();
        tracing::info!(
            entries = stats.entries,
            summaries_populated = stats.summaries_populated,
            summaries_unavailable = stats.summaries_unavailable,
            images_embedded = stats.images_embedded,
            "Enrichment finished"
        );

        advance(stage, RunState::Assembling);
        let assembled = if report.entries.len() != acquired {
            Err(AssemblyError::InvariantViolation(format!(
                "{} entries for {} acquired articles",
                report.entries.len(),
                acquired
            )))
        } else {
            BriefingGenerator::generate_report(&report, self.options.embedding)
        };
        let document = assembled.inspect_err(|_| advance(stage, RunState::FatalFailure))?;

        advance(stage, RunState::Done);
        Ok(document)
    }

    /// Fan out with bounded concurrency, fan back in by article URL so the
    /// output follows acquisition order rather than completion order.
    async fn enrich(&self, articles: Vec<Article>) -> Vec<ArticleEntry> {
        let order: Vec<Url> = articles.iter().map(|a| a.url.clone()).collect();

        let mut slots: HashMap<Url, ArticleEntry> = stream::iter(articles)
            .map(|article| async move {
                let entry = self.enrich_article(article).await;
                (entry.article.url.clone(), entry)
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        order.iter().filter_map(|url| slots.remove(url)).collect()
    }

    async fn enrich_article(&self, article: Article) -> ArticleEntry {
        let ((summary_a, summary_b), image) = tokio::join!(
            self.summarizer.summarize(&article),
            self.resolver.resolve(article.image_url.as_ref())
        );

        ArticleEntry {
            article,
            summary_a,
            summary_b,
            image,
        }
    }
}
