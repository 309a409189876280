//! SMTP alert sink.
//!
//! Sends plain-text alert mail through the Gmail relay using an app-specific
//! password. Credentials come from the shared configuration surface:
//! `GMAIL_USERNAME`, `GMAIL_APP_PASSWORD`, `EMAIL_RECEIVER`,
//! `EMAIL_FROM_NAME`.

use async_trait::async_trait;
use lettre::message::{Mailbox, Message, SinglePart, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::transport::smtp::AsyncSmtpTransport;
use lettre::{AsyncTransport, Tokio1Executor};
use util::config;

use super::{AlertError, AlertSink};

const SMTP_RELAY: &str = "smtp.gmail.com";
const SMTP_PORT: u16 = 587;

pub struct SmtpAlertSink {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpAlertSink {
    /// Builds the sink from the global configuration. Fails when alerting is
    /// enabled without complete credentials, so the caller can log once and
    /// run without a sink instead of failing every cycle.
    pub fn from_config() -> Result<Self, AlertError> {
        let username = config::gmail_username();
        let password = config::gmail_app_password();
        let receiver = config::email_receiver();
        let from_name = config::email_from_name();

        if username.is_empty() || password.is_empty() || receiver.is_empty() {
            return Err(AlertError::Config(
                "GMAIL_USERNAME, GMAIL_APP_PASSWORD and EMAIL_RECEIVER must be set".into(),
            ));
        }

        let tls_parameters = TlsParameters::new(SMTP_RELAY.to_string())
            .map_err(|e| AlertError::Smtp(e.to_string()))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(SMTP_RELAY)
            .map_err(|e| AlertError::Smtp(e.to_string()))?
            .port(SMTP_PORT)
            .tls(Tls::Required(tls_parameters))
            .credentials(Credentials::new(username.clone(), password))
            .build();

        let from = format!("{from_name} <{username}>")
            .parse()
            .map_err(|_| AlertError::Address(format!("invalid sender address: {username}")))?;
        let to = receiver
            .parse()
            .map_err(|_| AlertError::Address(format!("invalid receiver address: {receiver}")))?;

        Ok(Self {
            transport,
            from,
            to,
        })
    }
}

#[async_trait]
impl AlertSink for SmtpAlertSink {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), AlertError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .singlepart(
                SinglePart::builder()
                    .header(header::ContentType::TEXT_PLAIN)
                    .body(body.to_string()),
            )
            .map_err(|e| AlertError::Smtp(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map(|_| ())
            .map_err(|e| AlertError::Smtp(e.to_string()))
    }
}
