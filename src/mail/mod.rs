use crate::config::SmtpConfig;
use crate::error::{ExportError, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::response::{Category, Code, Severity};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::{Path, PathBuf};
use tracing::info;

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Reference to a file to attach. The file is read at send time, not when
/// the message is constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentRef {
    pub path: PathBuf,
    pub mime_type: String,
}

impl AttachmentRef {
    pub fn pdf(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mime_type: PDF_MIME_TYPE.to_string(),
        }
    }
}

/// One outgoing email: recipients, subject, plain-text body, and at most
/// one attachment. Consumed exactly once by a [`MailTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachment: Option<AttachmentRef>,
}

impl EmailMessage {
    pub fn validate(&self) -> Result<()> {
        if self.to.is_empty() {
            return Err(ExportError::Config(
                "at least one To recipient is required".to_string(),
            ));
        }
        if self.subject.trim().is_empty() {
            return Err(ExportError::Config("subject must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Seam between the orchestrator and SMTP, so exports can count sends in
/// tests without a live server.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// SMTP mailer. Each `send` opens a fresh connection, authenticates,
/// transmits one MIME message, and drops the connection; nothing is
/// pooled or reused across calls.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| ExportError::Config(format!("invalid SMTP relay: {e}")))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self {
            transport,
            from_email: config.from_email.clone(),
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        message.validate()?;

        let payload = match &message.attachment {
            Some(att) => Some(read_attachment(&att.path)?),
            None => None,
        };
        let email = build_mime_message(&self.from_email, message, payload)?;

        info!(
            to = %message.to.join(", "),
            subject = %message.subject,
            attachment = %message
                .attachment
                .as_ref()
                .map(|a| a.path.display().to_string())
                .unwrap_or_default(),
            "Sending email"
        );
        self.transport
            .send(email)
            .await
            .map_err(classify_smtp_error)?;
        info!("Email accepted by SMTP server");
        Ok(())
    }
}

/// The attachment must exist and be readable at send time.
fn read_attachment(path: &Path) -> Result<(String, Vec<u8>)> {
    if !path.is_file() {
        return Err(ExportError::Attachment(format!(
            "attachment not found: {}",
            path.display()
        )));
    }
    let bytes = std::fs::read(path)
        .map_err(|e| ExportError::Attachment(format!("{}: {e}", path.display())))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());
    Ok((filename, bytes))
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| ExportError::Config(format!("invalid email address {address}: {e}")))
}

/// Builds the MIME message: a plain-text body part plus the optional
/// binary attachment part with its declared content type.
fn build_mime_message(
    from: &str,
    message: &EmailMessage,
    payload: Option<(String, Vec<u8>)>,
) -> Result<Message> {
    let mut builder = Message::builder()
        .from(parse_mailbox(from)?)
        .subject(message.subject.clone());
    for to in &message.to {
        builder = builder.to(parse_mailbox(to)?);
    }
    for cc in &message.cc {
        builder = builder.cc(parse_mailbox(cc)?);
    }

    let body = SinglePart::plain(message.body.clone());
    let built = match payload {
        Some((filename, bytes)) => {
            let mime = message
                .attachment
                .as_ref()
                .map(|a| a.mime_type.as_str())
                .unwrap_or(PDF_MIME_TYPE);
            let content_type = ContentType::parse(mime)
                .map_err(|e| ExportError::Config(format!("invalid mime type {mime}: {e}")))?;
            builder.multipart(
                MultiPart::mixed()
                    .singlepart(body)
                    .singlepart(Attachment::new(filename).body(bytes, content_type)),
            )
        }
        None => builder.singlepart(body),
    };
    built.map_err(|e| ExportError::Transport(format!("failed to build MIME message: {e}")))
}

/// SMTP 53x permanent rejections (535 bad credentials, 534 mechanism too
/// weak, 530 auth required) are credential failures; everything else on
/// the wire is a transport failure.
fn classify_smtp_error(err: lettre::transport::smtp::Error) -> ExportError {
    classify_smtp_reply(err.status(), err.to_string())
}

fn classify_smtp_reply(code: Option<Code>, detail: String) -> ExportError {
    match code {
        Some(c)
            if c.severity == Severity::PermanentNegativeCompletion
                && c.category == Category::Unspecified3 =>
        {
            ExportError::Authentication(detail)
        }
        _ => ExportError::Transport(detail),
    }
}
