use anyhow::Result;
use clap::Parser;
use shared::{Config, GeminiClient, NewsApiClient, OpenAiClient};
use std::fmt::Display;

#[derive(Parser)]
#[command(name = "check-apis")]
#[command(about = "Verify the configured API keys with one minimal call per service")]
struct Args {
    /// Also check NewsAPI even when the Gemini source is selected
    #[arg(long)]
    newsapi: bool,
}

fn report<E: Display>(service: &str, outcome: Result<(), E>) -> bool {
    match outcome {
        Ok(()) => {
            println!("  ✓ {} is working", service);
            true
        }
        Err(e) => {
            println!("  ✗ {} failed: {}", service, e);
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    shared::init_tracing();
    let args = Args::parse();
    let config = Config::from_env()?;
    let settings = &config.settings;

    println!("🔑 Checking API keys...\n");

    let gemini = GeminiClient::new(
        config.gemini_api_key.clone(),
        settings.gemini_model.clone(),
        settings.call_timeout,
    )?;
    let openai = OpenAiClient::new(
        config.openai_api_key.clone(),
        settings.openai_model.clone(),
        settings.call_timeout,
    )?;

    let (gemini_ok, openai_ok) = tokio::join!(gemini.health_check(), openai.health_check());
    let mut healthy = report(&format!("Gemini ({})", gemini.model()), gemini_ok);
    healthy &= report(&format!("OpenAI ({})", openai.model()), openai_ok);

    match &config.news_api_key {
        Some(key) => {
            let news = NewsApiClient::new(
                key.clone(),
                settings.news_country.clone(),
                settings.news_category.clone(),
                settings.call_timeout,
            )?;
            healthy &= report("NewsAPI", news.health_check().await);
        }
        None if args.newsapi || settings.source == shared::HeadlineSource::NewsApi => {
            println!("  ✗ NewsAPI failed: NEWS_API_KEY not set");
            healthy = false;
        }
        None => println!("  - NewsAPI skipped (NEWS_API_KEY not set)"),
    }

    if !healthy {
        anyhow::bail!("One or more API checks failed");
    }

    println!("\n✅ All configured APIs are reachable.");
    Ok(())
}
