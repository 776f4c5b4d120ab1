//! Email delivery over SMTP with STARTTLS.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::briefing::BriefingDocument;
use crate::config::MailConfig;
use crate::traits::ReportDelivery;

const TEXT_WIDTH: usize = 100;

pub struct EmailSender {
    config: MailConfig,
}

impl EmailSender {
    #[must_use]
    pub const fn new(config: MailConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(MailConfig::from_env()?))
    }

    /// HTML and plain-text alternatives; the HTML part carries its images as
    /// inline attachments addressed by Content-ID.
    pub fn build_message(&self, document: &BriefingDocument) -> Result<Message> {
        let from: Mailbox = self
            .config
            .from_email
            .parse()
            .context("Invalid from email address")?;

        let to: Mailbox = self
            .config
            .to_email
            .parse()
            .context("Invalid to email address")?;

        let text_body = html2text::from_read(document.html.as_bytes(), TEXT_WIDTH);

        let mut related = MultiPart::related().singlepart(SinglePart::html(document.html.clone()));
        for image in &document.inline_images {
            let content_type = ContentType::parse(image.media_type.mime())
                .with_context(|| format!("Invalid image content type {}", image.media_type))?;
            related = related.singlepart(
                Attachment::new_inline(image.content_id.clone())
                    .body(image.bytes.clone(), content_type),
            );
        }

        Message::builder()
            .from(from)
            .to(to)
            .subject(document.subject.as_str())
            .multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::plain(text_body))
                    .multipart(related),
            )
            .context("Failed to build email message")
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let creds = Credentials::new(
            self.config.smtp_username.clone(),
            self.config.smtp_password.clone(),
        );

        Ok(
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
                .context("Failed to create SMTP transport")?
                .port(self.config.smtp_port)
                .credentials(creds)
                .build(),
        )
    }
}

#[async_trait]
impl ReportDelivery for EmailSender {
    async fn deliver(&self, document: &BriefingDocument) -> Result<()> {
        let email = self.build_message(document)?;

        self.transport()?
            .send(email)
            .await
            .context("Failed to send email via SMTP")?;

        tracing::info!(
            to = %self.config.to_email,
            subject = %document.subject,
            images = document.inline_images.len(),
            "Recap emailed"
        );

        Ok(())
    }
}
