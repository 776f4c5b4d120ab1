use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use shared::{
    BriefingGenerator, Config, EmailSender, HeadlineSource, ImageEmbedding, MailConfig, Pipeline,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "news-recap")]
#[command(about = "Email a daily recap of top headlines summarized by two AI providers")]
struct Args {
    /// Number of headlines to include (overrides RECAP_HEADLINE_COUNT)
    #[arg(short, long)]
    count: Option<usize>,

    /// Headline source: gemini or newsapi (overrides RECAP_SOURCE)
    #[arg(short, long)]
    source: Option<HeadlineSource>,

    /// Articles enriched at the same time (overrides RECAP_CONCURRENCY)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Save the HTML recap to the Documents folder instead of emailing it
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    shared::init_tracing();
    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(count) = args.count {
        config.settings.headline_count = count;
    }
    if let Some(source) = args.source {
        config.settings.source = source;
    }
    if let Some(concurrency) = args.concurrency {
        config.settings.concurrency = concurrency;
    }
    config.settings.validate()?;

    // Check mail settings up front so a long run never ends with nowhere to send.
    let mail_config = if args.dry_run {
        None
    } else {
        Some(MailConfig::from_env()?)
    };

    let embedding = if args.dry_run {
        ImageEmbedding::DataUri
    } else {
        ImageEmbedding::ContentId
    };
    let pipeline = Pipeline::from_config(&config, embedding)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n⚠️  Interrupted, abandoning run...");
            on_signal.cancel();
        }
    });

    let date = Local::now().date_naive();
    println!(
        "\n📰 Building the {} for {} top headlines...",
        BriefingGenerator::subject(date),
        config.settings.headline_count
    );

    match mail_config {
        Some(mail_config) => {
            let recipient = mail_config.to_email.clone();
            let mailer = EmailSender::new(mail_config);
            let document = pipeline
                .run_and_deliver(date, &cancel, &mailer)
                .await
                .context("News recap failed")?;
            println!("✓ Emailed {} articles to {}", document.entry_count, recipient);
        }
        None => {
            let document = pipeline
                .run(date, &cancel)
                .await
                .context("News recap failed")?;
            let path = BriefingGenerator::save(&document).context("Failed to save HTML file")?;
            println!("✓ {} articles saved to: {}", document.entry_count, path.display());
        }
    }

    println!("\n✅ Done!");
    Ok(())
}
