use async_trait::async_trait;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use panoflow_config::NotifyConfig;
use panoflow_core::{Notifier, NotifyError};

/// Sends operator alerts over implicit-TLS SMTP.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl std::fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("from", &self.from.to_string())
            .field("recipients", &self.to.len())
            .finish_non_exhaustive()
    }
}

fn mailbox(raw: &str) -> Result<Mailbox, NotifyError> {
    raw.parse::<Mailbox>()
        .map_err(|err| NotifyError::Address(format!("{raw}: {err}")))
}

impl SmtpNotifier {
    pub fn from_config(config: &NotifyConfig) -> Result<Self, NotifyError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|err| NotifyError::Delivery(err.to_string()))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from: mailbox(&config.username)?,
            to: config
                .mail_to
                .iter()
                .map(|raw| mailbox(raw))
                .collect::<Result<_, _>>()?,
        })
    }

    fn message(&self, subject: &str, body: &str) -> Result<Message, NotifyError> {
        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }
        builder
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|err| NotifyError::Address(err.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let message = self.message(subject, body)?;
        self.transport
            .send(message)
            .await
            .map_err(|err| NotifyError::Delivery(err.to_string()))?;
        info!(subject = %subject, recipients = self.to.len(), "Notification sent");
        Ok(())
    }
}
