//! Assembles outgoing messages from the form fields.
//!
//! Every value that ends up in a header goes through [`sanitize_header`] so
//! free text typed into the form can never open a new header line.

use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::{Address, Message};
use log::debug;
use std::path::PathBuf;
use thiserror::Error;

use crate::attachment::Attachment;

pub const DEFAULT_RECIPIENT_NAME: &str = "Sir/Madam";
pub const DEFAULT_SUBJECT: &str = "(No Subject)";

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("recipient email is required")]
    MissingRecipient,

    #[error("invalid email address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("unable to read attachment {}: {source}", .path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid content type {0:?}")]
    ContentType(String),

    #[error("unable to build message: {0}")]
    Build(String),
}

/// Raw values submitted with a Send action
#[derive(Debug, Clone, Default)]
pub struct EmailFields {
    pub recipient_email: String,
    pub recipient_name: String,
    pub subject: String,
    pub body: String,
    pub sender_name: String,
    pub sender_position: String,
    pub sender_contact: String,
    pub attachments: Vec<PathBuf>,
}

/// A fully assembled email, ready to be serialized
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub from: Mailbox,
    pub to: Mailbox,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

/// Strip line breaks so the value stays on a single header line
pub fn sanitize_header(value: &str) -> String {
    value.replace(['\r', '\n'], "").trim().to_string()
}

#[derive(Debug, Clone)]
pub struct Composer {
    sender_address: String,
}

impl Composer {
    pub fn new(sender_address: impl Into<String>) -> Self {
        Composer {
            sender_address: sender_address.into(),
        }
    }

    pub fn compose(&self, fields: &EmailFields) -> Result<OutboundMessage, ComposeError> {
        let recipient_email = sanitize_header(&fields.recipient_email);
        if recipient_email.is_empty() {
            return Err(ComposeError::MissingRecipient);
        }

        let recipient_name = sanitize_header(&fields.recipient_name);
        let sender_name = sanitize_header(&fields.sender_name);
        let sender_position = sanitize_header(&fields.sender_position);
        let sender_contact = sanitize_header(&fields.sender_contact);

        let subject = match sanitize_header(&fields.subject) {
            s if s.is_empty() => DEFAULT_SUBJECT.to_string(),
            s => s,
        };

        let greeting_name = if recipient_name.is_empty() {
            DEFAULT_RECIPIENT_NAME
        } else {
            recipient_name.as_str()
        };

        let body = format!(
            "Dear {},\n\n{}\n\nBest regards,\n{}\n{}\n{}",
            greeting_name,
            fields.body.trim(),
            sender_name,
            sender_position,
            sender_contact
        );

        let to = parse_recipient(&recipient_email)?;
        let from_name = (!sender_name.is_empty()).then(|| sender_name.clone());
        let from = Mailbox::new(from_name, parse_address(&self.sender_address)?);

        let attachments = fields
            .attachments
            .iter()
            .map(|path| {
                Attachment::from_path(path).map_err(|source| ComposeError::Attachment {
                    path: path.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "Composed message to {} with {} attachment(s)",
            recipient_email,
            attachments.len()
        );

        Ok(OutboundMessage {
            from,
            to,
            subject,
            body,
            attachments,
        })
    }
}

/// Accept `Name <user@host>` as typed, or a bare address
fn parse_recipient(recipient: &str) -> Result<Mailbox, ComposeError> {
    match recipient.parse::<Mailbox>() {
        Ok(mailbox) => Ok(mailbox),
        Err(_) => parse_address(recipient).map(|address| Mailbox::new(None, address)),
    }
}

fn parse_address(address: &str) -> Result<Address, ComposeError> {
    address
        .parse::<Address>()
        .map_err(|e| ComposeError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

impl OutboundMessage {
    pub fn recipient(&self) -> String {
        self.to.email.to_string()
    }

    /// Serialize to RFC 5322 bytes, with one MIME part per attachment
    pub fn to_wire_bytes(&self) -> Result<Vec<u8>, ComposeError> {
        let builder = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(self.subject.clone());

        let text = SinglePart::plain(self.body.clone());

        let built = if self.attachments.is_empty() {
            builder.singlepart(text)
        } else {
            let mut parts = MultiPart::mixed().singlepart(text);
            for attachment in &self.attachments {
                let content_type = ContentType::parse(&attachment.content_type)
                    .map_err(|_| ComposeError::ContentType(attachment.content_type.clone()))?;
                parts = parts.singlepart(
                    lettre::message::Attachment::new(attachment.filename.clone())
                        .body(attachment.content.clone(), content_type),
                );
            }
            builder.multipart(parts)
        };

        let message = built.map_err(|e| ComposeError::Build(e.to_string()))?;

        Ok(message.formatted())
    }
}
