use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::SummaryError;
use crate::sniffer::ImageMediaType;

/// A raw headline record as returned by a news source, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsRecord {
    pub title: String,
    pub author: Option<String>,
    pub url: String,
    pub description: String,
    pub image_url: Option<String>,
}

/// One normalized headline. The URL is its identity within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub url: Url,
    pub title: String,
    pub author: Option<String>,
    pub base_summary: String,
    pub image_url: Option<Url>,
}

/// Summarization backends the briefing can compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Gemini,
    OpenAi,
}

impl Provider {
    pub fn label(&self) -> &'static str {
        match self {
            Provider::Gemini => "Gemini",
            Provider::OpenAi => "OpenAI",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAi),
            other => Err(format!("unknown provider '{}' (use gemini or openai)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    Success(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryResult {
    pub provider: Provider,
    pub summary: Summary,
}

impl SummaryResult {
    pub fn success(provider: Provider, text: impl Into<String>) -> Self {
        Self {
            provider,
            summary: Summary::Success(text.into()),
        }
    }

    pub fn failed(provider: Provider, error: &SummaryError) -> Self {
        Self {
            provider,
            summary: Summary::Failed(error.to_string()),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.summary {
            Summary::Success(text) => Some(text),
            Summary::Failed(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.summary, Summary::Success(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedImage {
    Embedded {
        bytes: Vec<u8>,
        media_type: ImageMediaType,
    },
    Unavailable,
}

impl ResolvedImage {
    pub fn is_available(&self) -> bool {
        matches!(self, ResolvedImage::Embedded { .. })
    }
}

/// An article with everything the enrichment stage attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleEntry {
    pub article: Article,
    pub summary_a: SummaryResult,
    pub summary_b: SummaryResult,
    pub image: ResolvedImage,
}

impl ArticleEntry {
    pub fn summaries(&self) -> [&SummaryResult; 2] {
        [&self.summary_a, &self.summary_b]
    }
}

/// Enriched entries in acquisition order, stamped with the run date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub date: NaiveDate,
    pub entries: Vec<ArticleEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportStats {
    pub entries: usize,
    pub summaries_populated: usize,
    pub summaries_unavailable: usize,
    pub images_embedded: usize,
}

impl Report {
    pub fn stats(&self) -> ReportStats {
        let mut stats = ReportStats {
            entries: self.entries.len(),
            ..ReportStats::default()
        };
        for entry in &self.entries {
            for result in entry.summaries() {
                if result.is_success() {
                    stats.summaries_populated += 1;
                } else {
                    stats.summaries_unavailable += 1;
                }
            }
            if entry.image.is_available() {
                stats.images_embedded += 1;
            }
        }
        stats
    }
}
