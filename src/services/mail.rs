use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use super::{MessageDispatcher, OutgoingMessage};
use crate::error::{AgentError, Result};

pub const ADDRESS_ENV: &str = "EMAIL_ADDRESS";
pub const PASSWORD_ENV: &str = "EMAIL_PASSWORD";
pub const SERVER_ENV: &str = "EMAIL_SMTP_SERVER";
pub const PORT_ENV: &str = "EMAIL_SMTP_PORT";

const DEFAULT_SERVER: &str = "smtp.gmail.com";
const DEFAULT_PORT: u16 = 465;

/// Sends mail over SMTP with implicit TLS.
#[derive(Clone)]
pub struct SmtpDispatcher {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpDispatcher {
    pub fn new(server: &str, port: u16, address: &str, password: &str) -> Result<Self> {
        let from: Mailbox = address
            .parse()
            .map_err(|e| AgentError::Config(format!("invalid sender {}: {}", address, e)))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(server)
            .map_err(|e| AgentError::Config(format!("SMTP relay {}: {}", server, e)))?
            .port(port)
            .credentials(Credentials::new(address.to_string(), password.to_string()))
            .build();
        info!("SMTP dispatcher ready ({}:{} as {})", server, port, address);
        Ok(Self { transport, from })
    }

    pub fn from_env() -> Result<Self> {
        let address = require_env(ADDRESS_ENV)?;
        let password = require_env(PASSWORD_ENV)?;
        let server = std::env::var(SERVER_ENV).unwrap_or_else(|_| DEFAULT_SERVER.to_string());
        let port = match std::env::var(PORT_ENV) {
            Ok(raw) => raw
                .parse()
                .map_err(|_| AgentError::Config(format!("{} is not a port: {}", PORT_ENV, raw)))?,
            Err(_) => DEFAULT_PORT,
        };
        Self::new(&server, port, &address, &password)
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| AgentError::Config(format!("{} is not set", name)))
}

#[async_trait]
impl MessageDispatcher for SmtpDispatcher {
    async fn dispatch(&self, message: &OutgoingMessage) -> Result<()> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| AgentError::Dispatch(format!("{} is not a valid address ({}).", message.to, e)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| AgentError::Dispatch(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| AgentError::Dispatch(e.to_string()))?;
        Ok(())
    }
}

/// Logs messages instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunDispatcher;

#[async_trait]
impl MessageDispatcher for DryRunDispatcher {
    async fn dispatch(&self, message: &OutgoingMessage) -> Result<()> {
        info!(
            "[DRY-RUN] to={} subject='{}' body='{}'",
            message.to, message.subject, message.body
        );
        Ok(())
    }
}
