// Public modules
pub mod acquirer;
pub mod briefing;
pub mod config;
pub mod error;
pub mod gemini;
pub mod images;
pub mod logging;
pub mod mailer;
pub mod models;
pub mod newsapi;
pub mod openai;
pub mod pipeline;
pub mod sniffer;
pub mod summarizer;
pub mod traits;

// Re-export commonly used types
pub use acquirer::{AcquisitionStrategy, HeadlineAcquirer};
pub use briefing::{BriefingDocument, BriefingGenerator, ImageEmbedding};
pub use config::{Config, HeadlineSource, MailConfig, PipelineSettings};
pub use error::{AcquisitionError, PipelineError};
pub use gemini::GeminiClient;
pub use logging::init_tracing;
pub use mailer::EmailSender;
pub use models::{Article, ArticleEntry, Provider, Report};
pub use newsapi::NewsApiClient;
pub use openai::OpenAiClient;
pub use pipeline::{Pipeline, RunOptions, RunState};
pub use summarizer::{DualSummarizer, RetryPolicy};
pub use traits::ReportDelivery;
