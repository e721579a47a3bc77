use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{NotificationSink, RecordAlert};

/// SMTP sender configured from `SMTP_HOST`, `SMTP_USER`, `SMTP_PASS`,
/// `NOTIFY_EMAIL_FROM`, `NOTIFY_EMAIL_TO`.
pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailSender {
    pub fn from_env() -> Result<Self> {
        let var = |k: &str| std::env::var(k).with_context(|| format!("{k} missing"));
        let host = var("SMTP_HOST")?;
        let user = var("SMTP_USER")?;
        let pass = var("SMTP_PASS")?;
        let from_addr = var("NOTIFY_EMAIL_FROM")?;
        let to_addr = var("NOTIFY_EMAIL_TO")?;

        let creds = Credentials::new(user, pass);
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .context("invalid SMTP_HOST")?
            .credentials(creds)
            .build();

        let from = from_addr.parse().context("invalid NOTIFY_EMAIL_FROM")?;
        let to = to_addr.parse().context("invalid NOTIFY_EMAIL_TO")?;

        Ok(Self { mailer, from, to })
    }

    pub fn build_message(&self, alert: &RecordAlert) -> Result<Message> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(alert.subject())
            .header(header::ContentType::TEXT_PLAIN)
            .body(alert.body())
            .context("build email")
    }
}

#[async_trait::async_trait]
impl NotificationSink for EmailSender {
    async fn notify(&self, alert: &RecordAlert) -> Result<()> {
        let msg = self.build_message(alert)?;
        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}
