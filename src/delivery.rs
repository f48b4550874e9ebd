//! Digest delivery with bounded retry.
//!
//! [`Transport`] is the send seam; [`SmtpTransport`] implements it over
//! SMTP with STARTTLS. [`DeliveryRetrier`] wraps any transport with a fixed
//! attempt budget and a fixed pause between attempts.
//!
//! Delivery never fails the run: exhaustion is reported as
//! [`DeliveryOutcome::Exhausted`] and logged.

use crate::models::Aggregator;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::AsyncSmtpTransport;
use lettre::{AsyncTransport, Tokio1Executor};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("SMTP failure: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("no receivers configured")]
    NoReceivers,
    #[error("mail setting {0} is not set")]
    MissingSetting(&'static str),
}

/// A rendered digest ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub subject: String,
    pub html: String,
}

/// Something that can deliver an [`Artifact`].
pub trait Transport {
    async fn send(&self, artifact: &Artifact) -> Result<(), DeliveryError>;
}

/// SMTP connection settings.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    /// Also used as the login user.
    pub sender: String,
    pub password: String,
    pub receivers: Vec<String>,
}

/// Sends HTML mail through an SMTP relay using STARTTLS.
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl SmtpTransport {
    pub fn new(settings: &SmtpSettings) -> Result<Self, DeliveryError> {
        let from: Mailbox = settings.sender.parse()?;
        let to = settings
            .receivers
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(str::parse::<Mailbox>)
            .collect::<Result<Vec<_>, _>>()?;
        if to.is_empty() {
            return Err(DeliveryError::NoReceivers);
        }

        let creds = Credentials::new(settings.sender.clone(), settings.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.server)?
            .port(settings.port)
            .credentials(creds)
            .build();
        Ok(Self { mailer, from, to })
    }
}

impl fmt::Debug for SmtpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpTransport")
            .field("from", &self.from.to_string())
            .field("receivers", &self.to.len())
            .finish()
    }
}

impl Transport for SmtpTransport {
    async fn send(&self, artifact: &Artifact) -> Result<(), DeliveryError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(artifact.subject.clone())
            .header(header::ContentType::TEXT_HTML);
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        let message = builder.body(artifact.html.clone())?;
        self.mailer.send(message).await?;
        Ok(())
    }
}

/// How a delivery ended.
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// Nothing was collected, so nothing was sent.
    Skipped,
    Delivered { attempts: u32 },
    Exhausted { attempts: u32, last_error: DeliveryError },
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryOutcome::Skipped => write!(f, "skipped (no updates)"),
            DeliveryOutcome::Delivered { attempts } => {
                write!(f, "delivered after {attempts} attempt(s)")
            }
            DeliveryOutcome::Exhausted { attempts, last_error } => {
                write!(f, "failed after {attempts} attempt(s): {last_error}")
            }
        }
    }
}

/// Wraps a [`Transport`] with a fixed attempt budget and fixed backoff.
pub struct DeliveryRetrier<T> {
    inner: T,
    max_attempts: u32,
    backoff: Duration,
}

impl<T: Transport> DeliveryRetrier<T> {
    /// `max_attempts` below 1 is treated as 1.
    pub fn new(inner: T, max_attempts: u32, backoff: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Send `artifact` unless `aggregator` is empty.
    #[instrument(level = "info", skip_all, fields(items = aggregator.len()))]
    pub async fn send(&self, aggregator: &Aggregator, artifact: &Artifact) -> DeliveryOutcome {
        if aggregator.is_empty() {
            info!("No updates this week; delivery skipped");
            return DeliveryOutcome::Skipped;
        }

        let total_t0 = Instant::now();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let attempt_t0 = Instant::now();
            match self.inner.send(artifact).await {
                Ok(()) => {
                    info!(
                        attempt,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        subject = %artifact.subject,
                        "Digest delivered"
                    );
                    return DeliveryOutcome::Delivered { attempts: attempt };
                }
                Err(e) if attempt >= self.max_attempts => {
                    error!(
                        attempt,
                        max = self.max_attempts,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        error = %e,
                        "Delivery exhausted its attempts"
                    );
                    return DeliveryOutcome::Exhausted {
                        attempts: attempt,
                        last_error: e,
                    };
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max = self.max_attempts,
                        elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                        backoff = ?self.backoff,
                        error = %e,
                        "Delivery attempt failed; backing off"
                    );
                    sleep(self.backoff).await;
                }
            }
        }
    }
}

impl<T> fmt::Debug for DeliveryRetrier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryRetrier")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .finish()
    }
}
