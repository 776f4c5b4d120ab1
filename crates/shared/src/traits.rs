use async_trait::async_trait;
use serde_json::Value;

use crate::briefing::BriefingDocument;
use crate::error::{AcquisitionError, BackendError, SummaryError};
use crate::models::{NewsRecord, Provider};

/// A structured news API that returns headline records directly.
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn top_headlines(&self, count: usize) -> Result<Vec<NewsRecord>, AcquisitionError>;
}

/// Free-form generation, allowed to consult external tools such as web search.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String, BackendError>;
}

/// Generation constrained to emit JSON matching `schema`.
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    async fn generate_structured(&self, prompt: &str, schema: &Value)
        -> Result<String, BackendError>;
}

#[async_trait]
pub trait SummaryBackend: Send + Sync {
    fn provider(&self) -> Provider;

    /// Summarize a headline given only its title and the source's own summary.
    async fn summarize(&self, title: &str, base_summary: &str) -> Result<String, SummaryError>;
}

/// Hands a finished briefing to whatever sends it.
#[async_trait]
pub trait ReportDelivery: Send + Sync {
    async fn deliver(&self, document: &BriefingDocument) -> anyhow::Result<()>;
}
