use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType, transport::smtp::authentication::Credentials,
};

use crate::config::SmtpConfig;

/// MailError
///
/// Failures while building or delivering a message. Never swallowed: signup
/// surfaces them as a 500 and does not store the user.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("{0}")]
    Simulated(String),
}

// 1. Mailer Contract
/// Mailer
///
/// The abstract contract for outgoing mail. Handlers only see this trait, so the
/// SMTP client can be swapped for the in-memory `MockMailer` in tests.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends `code` to `email` along with instructions for redeeming it.
    async fn send_confirmation_code(&self, email: &str, code: i32) -> Result<(), MailError>;
}

pub type MailerState = Arc<dyn Mailer>;

const SUBJECT: &str = "YaMDb confirmation code";

fn confirmation_body(code: i32) -> String {
    format!(
        "Your confirmation code: {code}\n\
         Exchange it for an access token at /v1/auth/token"
    )
}

// 2. The Real Implementation (SMTP)
/// SmtpMailer
///
/// Delivers mail through an SMTP relay. Plain SMTP for local catch-all relays,
/// STARTTLS otherwise.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        }
        .port(config.port);

        if let (Some(user), Some(pass)) = (&config.user, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_confirmation_code(&self, email: &str, code: i32) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from_address.parse()?)
            .to(email.parse()?)
            .subject(SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(confirmation_body(code))?;

        self.transport.send(message).await?;

        tracing::info!(to = email, "Confirmation code sent");
        Ok(())
    }
}

// 3. The Mock Implementation (For Tests)
/// SentMail
///
/// A message captured by `MockMailer`.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMail {
    pub to: String,
    pub code: i32,
}

/// MockMailer
///
/// Records every message instead of sending it, so tests can assert on what
/// was dispatched and how many times.
#[derive(Clone, Default)]
pub struct MockMailer {
    /// When true, every send fails.
    pub should_fail: bool,
    outbox: Arc<Mutex<Vec<SentMail>>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Every attempted delivery, in order; failed attempts included.
    pub fn sent(&self) -> Vec<SentMail> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send_confirmation_code(&self, email: &str, code: i32) -> Result<(), MailError> {
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.push(SentMail {
                to: email.to_string(),
                code,
            });
        }
        if self.should_fail {
            return Err(MailError::Simulated(
                "Mock Mailer Error: Simulation requested".to_string(),
            ));
        }
        Ok(())
    }
}
