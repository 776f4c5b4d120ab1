use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{Datelike, NaiveDate};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AssemblyError;
use crate::models::{ArticleEntry, Report, ResolvedImage, Summary, SummaryResult};
use crate::sniffer::ImageMediaType;

/// How resolved images are referenced from the HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEmbedding {
    /// `cid:` references; the bytes travel next to the HTML as inline parts.
    ContentId,
    /// Base64 `data:` URIs; the HTML is self-contained.
    DataUri,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub content_id: String,
    pub media_type: ImageMediaType,
    pub bytes: Vec<u8>,
}

/// A finished briefing, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BriefingDocument {
    pub date: NaiveDate,
    pub subject: String,
    pub html: String,
    pub inline_images: Vec<InlineImage>,
    pub entry_count: usize,
}

pub struct BriefingGenerator;

impl BriefingGenerator {
    fn ordinal_suffix(day: u32) -> &'static str {
        match (day % 10, day % 100) {
            (_, 11..=13) => "th",
            (1, _) => "st",
            (2, _) => "nd",
            (3, _) => "rd",
            _ => "th",
        }
    }

    /// "November 3rd, 2025"
    pub fn ordinal_date(date: NaiveDate) -> String {
        format!(
            "{} {}{}, {}",
            date.format("%B"),
            date.day(),
            Self::ordinal_suffix(date.day()),
            date.year()
        )
    }

    pub fn subject(date: NaiveDate) -> String {
        format!("News Recap for {}", Self::ordinal_date(date))
    }

    fn content_id(index: usize) -> String {
        format!("article-{}@news-recap", index + 1)
    }

    /// Entries must already be well formed; anything else is a bug upstream.
    fn validate(entries: &[ArticleEntry]) -> Result<(), AssemblyError> {
        let mut seen = HashSet::new();
        for (index, entry) in entries.iter().enumerate() {
            let article = &entry.article;
            if article.title.trim().is_empty() {
                return Err(AssemblyError::InvariantViolation(format!(
                    "entry {} has an empty title",
                    index + 1
                )));
            }
            if !matches!(article.url.scheme(), "http" | "https") {
                return Err(AssemblyError::InvariantViolation(format!(
                    "entry {} has non-web URL {}",
                    index + 1,
                    article.url
                )));
            }
            if !seen.insert(article.url.as_str()) {
                return Err(AssemblyError::InvariantViolation(format!(
                    "duplicate article URL {}",
                    article.url
                )));
            }
            if entry.summary_a.provider == entry.summary_b.provider {
                return Err(AssemblyError::InvariantViolation(format!(
                    "entry {} has two summaries from {}",
                    index + 1,
                    entry.summary_a.provider
                )));
            }
        }
        Ok(())
    }

    pub fn generate_report(
        report: &Report,
        embedding: ImageEmbedding,
    ) -> Result<BriefingDocument, AssemblyError> {
        Self::generate(report.date, &report.entries, embedding)
    }

    /// Render the whole briefing. Output depends only on the arguments.
    pub fn generate(
        date: NaiveDate,
        entries: &[ArticleEntry],
        embedding: ImageEmbedding,
    ) -> Result<BriefingDocument, AssemblyError> {
        Self::validate(entries)?;

        let formatted_date = Self::ordinal_date(date);
        let mut inline_images = Vec::new();
        let mut html = String::new();

        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
        html.push_str("  <meta charset=\"UTF-8\">\n");
        html.push_str(&format!(
            "  <title>News Recap - {}</title>\n",
            Self::escape_html(&formatted_date)
        ));
        html.push_str("  <style>\n");
        html.push_str("    body { font-family: Arial, sans-serif; max-width: 720px; margin: 40px auto; padding: 0 20px; line-height: 1.6; color: #2c3e50; }\n");
        html.push_str("    h1 { border-bottom: 3px solid #3498db; padding-bottom: 10px; text-align: center; }\n");
        html.push_str("    h1 .date { display: block; font-size: 0.6em; font-weight: normal; color: #555; }\n");
        html.push_str("    .article { margin: 30px 0; padding: 15px; background-color: #f8f9fa; border-radius: 4px; }\n");
        html.push_str("    .article h2 { margin: 0 0 5px 0; font-size: 1.3em; }\n");
        html.push_str("    .article img { max-width: 100%; height: auto; border-radius: 4px; margin: 10px 0; }\n");
        html.push_str("    .link { color: #3498db; text-decoration: none; }\n");
        html.push_str("    .metadata { color: #7f8c8d; font-size: 0.9em; margin: 5px 0; }\n");
        html.push_str("    .provider { border-left: 4px solid #3498db; padding-left: 10px; margin: 12px 0; }\n");
        html.push_str("    .provider h3 { margin: 0; font-size: 1em; }\n");
        html.push_str("    .error { color: #e74c3c; font-style: italic; }\n");
        html.push_str("  </style>\n");
        html.push_str("</head>\n<body>\n");

        html.push_str(&format!(
            "<h1>News Recap<span class=\"date\">{}</span></h1>\n",
            Self::escape_html(&formatted_date)
        ));

        for (index, entry) in entries.iter().enumerate() {
            let article = &entry.article;
            html.push_str("<div class=\"article\">\n");
            html.push_str(&format!(
                "  <h2><a href=\"{}\" class=\"link\" target=\"_blank\">{}</a></h2>\n",
                Self::escape_html(article.url.as_str()),
                Self::escape_html(&article.title)
            ));
            if let Some(author) = &article.author {
                html.push_str(&format!(
                    "  <div class=\"metadata\">By {}</div>\n",
                    Self::escape_html(author)
                ));
            }

            if let ResolvedImage::Embedded { bytes, media_type } = &entry.image {
                let src = match embedding {
                    ImageEmbedding::DataUri => {
                        format!("data:{};base64,{}", media_type.mime(), STANDARD.encode(bytes))
                    }
                    ImageEmbedding::ContentId => {
                        let content_id = Self::content_id(index);
                        let src = format!("cid:{}", content_id);
                        inline_images.push(InlineImage {
                            content_id,
                            media_type: *media_type,
                            bytes: bytes.clone(),
                        });
                        src
                    }
                };
                html.push_str(&format!(
                    "  <img src=\"{}\" alt=\"{}\">\n",
                    src,
                    Self::escape_html(&article.title)
                ));
            }

            if !article.base_summary.is_empty() {
                html.push_str(&format!(
                    "  <p>{}</p>\n",
                    Self::escape_html(&article.base_summary)
                ));
            }

            for result in entry.summaries() {
                Self::push_summary(&mut html, result);
            }

            html.push_str("</div>\n");
        }

        html.push_str("</body>\n</html>");

        Ok(BriefingDocument {
            date,
            subject: Self::subject(date),
            html,
            inline_images,
            entry_count: entries.len(),
        })
    }

    fn push_summary(html: &mut String, result: &SummaryResult) {
        html.push_str("  <div class=\"provider\">\n");
        html.push_str(&format!(
            "    <h3>{} Summary</h3>\n",
            result.provider.label()
        ));
        match &result.summary {
            Summary::Success(text) => {
                html.push_str(&format!("    <p>{}</p>\n", Self::escape_html(text)));
            }
            Summary::Failed(_) => {
                html.push_str("    <p class=\"error\">Summary unavailable</p>\n");
            }
        }
        html.push_str("  </div>\n");
    }

    fn escape_html(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&#39;")
    }

    /// Write the HTML to `<dir>/news-recap-YYYY-MM-DD.html`.
    pub fn save_to(document: &BriefingDocument, dir: &Path) -> Result<PathBuf> {
        let filename = format!("news-recap-{}.html", document.date.format("%Y-%m-%d"));
        let filepath = dir.join(filename);

        fs::write(&filepath, &document.html).context("Failed to write briefing file")?;

        Ok(filepath)
    }

    pub fn save(document: &BriefingDocument) -> Result<PathBuf> {
        let documents_dir = dirs::document_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::save_to(document, &documents_dir)
    }
}
