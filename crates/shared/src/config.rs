use anyhow::{bail, Context, Result};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::gemini::DEFAULT_GEMINI_MODEL;
use crate::models::Provider;
use crate::openai::DEFAULT_OPENAI_MODEL;
use crate::sniffer::ImageMediaType;

const CONFIG_DIR_NAME: &str = "news-recap";

/// Upper bound on headlines per recap; matches the news API's page limit.
pub const MAX_HEADLINE_COUNT: usize = 100;

/// Where the headline list comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadlineSource {
    /// Search-grounded Gemini prose, then a JSON-mode structuring pass.
    Gemini,
    /// newsapi.org top headlines.
    NewsApi,
}

impl FromStr for HeadlineSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(HeadlineSource::Gemini),
            "newsapi" => Ok(HeadlineSource::NewsApi),
            other => Err(format!("unknown headline source '{}' (use gemini or newsapi)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub headline_count: usize,
    pub source: HeadlineSource,
    pub news_country: String,
    pub news_category: Option<String>,
    pub provider_a: Provider,
    pub provider_b: Provider,
    pub summary_retries: u32,
    pub retry_backoff: Duration,
    pub image_types: Vec<ImageMediaType>,
    pub concurrency: usize,
    pub call_timeout: Duration,
    pub run_timeout: Duration,
    pub gemini_model: String,
    pub openai_model: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            headline_count: 5,
            source: HeadlineSource::Gemini,
            news_country: "us".to_string(),
            news_category: None,
            provider_a: Provider::Gemini,
            provider_b: Provider::OpenAi,
            summary_retries: 1,
            retry_backoff: Duration::from_millis(1000),
            image_types: ImageMediaType::ALL.to_vec(),
            concurrency: 3,
            call_timeout: Duration::from_secs(30),
            run_timeout: Duration::from_secs(300),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}='{}': {}", key, raw, e)),
        _ => Ok(default),
    }
}

impl PipelineSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key/value source; unset keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let image_types = match lookup("RECAP_IMAGE_TYPES") {
            Some(raw) if !raw.trim().is_empty() => raw
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(|part| part.parse::<ImageMediaType>().map_err(anyhow::Error::msg))
                .collect::<Result<Vec<_>>>()
                .context("Invalid RECAP_IMAGE_TYPES")?,
            _ => defaults.image_types.clone(),
        };

        let settings = Self {
            headline_count: parse_var(&lookup, "RECAP_HEADLINE_COUNT", defaults.headline_count)?,
            source: parse_var(&lookup, "RECAP_SOURCE", defaults.source)?,
            news_country: parse_var(&lookup, "RECAP_NEWS_COUNTRY", defaults.news_country)?,
            news_category: lookup("RECAP_NEWS_CATEGORY")
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            provider_a: parse_var(&lookup, "RECAP_PROVIDER_A", defaults.provider_a)?,
            provider_b: parse_var(&lookup, "RECAP_PROVIDER_B", defaults.provider_b)?,
            summary_retries: parse_var(&lookup, "RECAP_SUMMARY_RETRIES", defaults.summary_retries)?,
            retry_backoff: Duration::from_millis(parse_var(
                &lookup,
                "RECAP_RETRY_BACKOFF_MS",
                defaults.retry_backoff.as_millis() as u64,
            )?),
            image_types,
            concurrency: parse_var(&lookup, "RECAP_CONCURRENCY", defaults.concurrency)?,
            call_timeout: Duration::from_secs(parse_var(
                &lookup,
                "RECAP_CALL_TIMEOUT_SECS",
                defaults.call_timeout.as_secs(),
            )?),
            run_timeout: Duration::from_secs(parse_var(
                &lookup,
                "RECAP_RUN_TIMEOUT_SECS",
                defaults.run_timeout.as_secs(),
            )?),
            gemini_model: parse_var(&lookup, "GEMINI_MODEL", defaults.gemini_model)?,
            openai_model: parse_var(&lookup, "OPENAI_MODEL", defaults.openai_model)?,
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.headline_count == 0 || self.headline_count > MAX_HEADLINE_COUNT {
            bail!(
                "Headline count must be between 1 and {} (got {})",
                MAX_HEADLINE_COUNT,
                self.headline_count
            );
        }
        if self.concurrency == 0 {
            bail!("Concurrency must be at least 1");
        }
        if self.provider_a == self.provider_b {
            bail!(
                "RECAP_PROVIDER_A and RECAP_PROVIDER_B are both {}; the briefing compares two different providers",
                self.provider_a
            );
        }
        if self.image_types.is_empty() {
            bail!("At least one image type must be allowed");
        }
        if self.call_timeout.is_zero() || self.run_timeout.is_zero() {
            bail!("Timeouts must be greater than zero");
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub openai_api_key: String,
    pub news_api_key: Option<String>,
    pub settings: PipelineSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        let gemini_api_key = env::var("GEMINI_API_KEY").context(
            "GEMINI_API_KEY not found.\n\n\
            To fix this, create ~/.config/news-recap/.env with:\n  \
            GEMINI_API_KEY=your_key_here\n  \
            OPENAI_API_KEY=your_key_here\n\n\
            Get your Gemini API key from: https://aistudio.google.com/apikey",
        )?;

        let openai_api_key = env::var("OPENAI_API_KEY").context(
            "OPENAI_API_KEY not found.\n\n\
            To fix this, create ~/.config/news-recap/.env with:\n  \
            GEMINI_API_KEY=your_key_here\n  \
            OPENAI_API_KEY=your_key_here\n\n\
            Get your OpenAI API key from: https://platform.openai.com/api-keys",
        )?;

        let news_api_key = env::var("NEWS_API_KEY").ok().filter(|k| !k.is_empty());

        Ok(Self {
            gemini_api_key,
            openai_api_key,
            news_api_key,
            settings: PipelineSettings::from_env()?,
        })
    }

    pub(crate) fn try_load_dotenv() {
        // Try locations in order of preference:

        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/news-recap/.env (standard config location)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join(CONFIG_DIR_NAME).join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env (home directory)
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }

        // If none found, that's okay - environment variables might be set system-wide
    }
}

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP settings for delivering the briefing. Only needed when actually sending.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub to_email: String,
}

impl MailConfig {
    pub fn from_env() -> Result<Self> {
        Config::try_load_dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{} not set (required to email the recap)", key))
        };

        let smtp_username = required("SMTP_USERNAME")?;
        let smtp_password = required("SMTP_PASSWORD")?;
        let to_email = required("RECAP_TO_EMAIL")?;
        let from_email = lookup("RECAP_FROM_EMAIL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| smtp_username.clone());

        Ok(Self {
            smtp_host: parse_var(&lookup, "SMTP_HOST", DEFAULT_SMTP_HOST.to_string())?,
            smtp_port: parse_var(&lookup, "SMTP_PORT", DEFAULT_SMTP_PORT)?,
            smtp_username,
            smtp_password,
            from_email,
            to_email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_mail_config_defaults_sender_to_username() {
        let mail = MailConfig::from_lookup(lookup(&[
            ("SMTP_USERNAME", "recap@gmail.com"),
            ("SMTP_PASSWORD", "app-password"),
            ("RECAP_TO_EMAIL", "reader@example.com"),
        ]))
        .unwrap();

        assert_eq!(mail.smtp_host, "smtp.gmail.com");
        assert_eq!(mail.smtp_port, 587);
        assert_eq!(mail.from_email, "recap@gmail.com");
        assert_eq!(mail.to_email, "reader@example.com");
    }

    #[test]
    fn test_mail_config_requires_recipient() {
        let err = MailConfig::from_lookup(lookup(&[
            ("SMTP_USERNAME", "recap@gmail.com"),
            ("SMTP_PASSWORD", "app-password"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("RECAP_TO_EMAIL"));
    }

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = PipelineSettings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, PipelineSettings::default());
        assert_eq!(settings.headline_count, 5);
        assert_eq!(settings.provider_a, Provider::Gemini);
        assert_eq!(settings.provider_b, Provider::OpenAi);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let settings = PipelineSettings::from_lookup(lookup(&[
            ("RECAP_HEADLINE_COUNT", "4"),
            ("RECAP_SOURCE", "newsapi"),
            ("RECAP_NEWS_CATEGORY", "technology"),
            ("RECAP_PROVIDER_A", "openai"),
            ("RECAP_PROVIDER_B", "gemini"),
            ("RECAP_SUMMARY_RETRIES", "2"),
            ("RECAP_RETRY_BACKOFF_MS", "250"),
            ("RECAP_IMAGE_TYPES", "png, image/jpeg"),
            ("RECAP_CONCURRENCY", "5"),
            ("RECAP_CALL_TIMEOUT_SECS", "10"),
        ]))
        .unwrap();

        assert_eq!(settings.headline_count, 4);
        assert_eq!(settings.source, HeadlineSource::NewsApi);
        assert_eq!(settings.news_category.as_deref(), Some("technology"));
        assert_eq!(settings.provider_a, Provider::OpenAi);
        assert_eq!(settings.summary_retries, 2);
        assert_eq!(settings.retry_backoff, Duration::from_millis(250));
        assert_eq!(
            settings.image_types,
            vec![ImageMediaType::Png, ImageMediaType::Jpeg]
        );
        assert_eq!(settings.concurrency, 5);
        assert_eq!(settings.call_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_same_provider_twice_is_rejected() {
        let err = PipelineSettings::from_lookup(lookup(&[
            ("RECAP_PROVIDER_A", "gemini"),
            ("RECAP_PROVIDER_B", "gemini"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("both Gemini"));
    }

    #[test]
    fn test_invalid_values_are_reported() {
        assert!(PipelineSettings::from_lookup(lookup(&[("RECAP_HEADLINE_COUNT", "five")])).is_err());
        assert!(PipelineSettings::from_lookup(lookup(&[("RECAP_HEADLINE_COUNT", "0")])).is_err());
        assert!(PipelineSettings::from_lookup(lookup(&[("RECAP_SOURCE", "rss")])).is_err());
        assert!(PipelineSettings::from_lookup(lookup(&[("RECAP_IMAGE_TYPES", "png,tiff")])).is_err());
        assert!(PipelineSettings::from_lookup(lookup(&[("RECAP_CONCURRENCY", "0")])).is_err());
    }

    #[test]
    fn test_headline_count_is_capped() {
        assert!(PipelineSettings::from_lookup(lookup(&[("RECAP_HEADLINE_COUNT", "100")])).is_ok());

        let mut settings = PipelineSettings::default();
        settings.headline_count = usize::MAX;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("between 1 and 100"));
    }
}
