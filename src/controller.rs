//! The two form actions: Generate drafts subject/body, Send mails them.
//!
//! Neither action keeps state between calls; the form fields carry
//! everything. Actions run one at a time.

use log::{debug, info};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::completion::{display_text, CompletionService};
use crate::composer::{Composer, EmailFields, DEFAULT_RECIPIENT_NAME};
use crate::gmail_client::{MailSender, SendResult};

pub const MISSING_INSTRUCTIONS: &str = "Please enter email details.";
pub const MISSING_RECIPIENT: &str = "❌ Recipient email is required!";

const SUBJECT_MAX_TOKENS: u32 = 40;
const BODY_MAX_TOKENS: u32 = 600;

#[derive(Debug, Clone, Default)]
pub struct GenerateInput {
    pub instructions: String,
    pub recipient_name: String,
    pub sender_name: String,
}

/// Generated subject and body, written back into the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftEmail {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    Drafted(DraftEmail),
    /// Instructions were empty; the form is left as it was
    MissingInstructions,
}

impl GenerateOutcome {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            GenerateOutcome::Drafted(_) => None,
            GenerateOutcome::MissingInstructions => Some(MISSING_INSTRUCTIONS),
        }
    }
}

fn subject_prompt(instructions: &str) -> String {
    format!(
        "Generate a short, professional email subject (max 8 words) for this topic: '{}'. \
         Output only the subject line.",
        instructions
    )
}

fn body_prompt(instructions: &str, recipient_name: &str, sender_name: &str) -> String {
    format!(
        "Write a clear, concise, and professional email for this topic: '{instructions}'. \
         Recipient: {recipient_name}. Sender: {sender_name}. \
         Start with 'Dear {recipient_name},' and end with 'Best regards, {sender_name}'. \
         Do not include markdown or numbered lists."
    )
}

pub struct FormController {
    completion: Arc<dyn CompletionService>,
    sender: Arc<dyn MailSender>,
    composer: Composer,
    action_lock: Mutex<()>,
}

impl FormController {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        sender: Arc<dyn MailSender>,
        composer: Composer,
    ) -> Self {
        FormController {
            completion,
            sender,
            composer,
            action_lock: Mutex::new(()),
        }
    }

    pub async fn generate(&self, input: &GenerateInput) -> GenerateOutcome {
        let instructions = input.instructions.trim();
        if instructions.is_empty() {
            return GenerateOutcome::MissingInstructions;
        }

        let _guard = self.action_lock.lock().await;
        info!("🤖 Generating subject and body");

        let recipient_name = match input.recipient_name.trim() {
            "" => DEFAULT_RECIPIENT_NAME,
            name => name,
        };
        let sender_name = input.sender_name.trim();

        let subject = display_text(
            self.completion
                .complete(&subject_prompt(instructions), SUBJECT_MAX_TOKENS)
                .await,
        );
        let body = display_text(
            self.completion
                .complete(
                    &body_prompt(instructions, recipient_name, sender_name),
                    BODY_MAX_TOKENS,
                )
                .await,
        );

        debug!("Draft generated: subject {} chars, body {} chars", subject.len(), body.len());

        GenerateOutcome::Drafted(DraftEmail {
            subject: subject.trim().to_string(),
            body: body.trim().to_string(),
        })
    }

    /// Compose and send; always returns the status line for the form
    pub async fn send(&self, fields: EmailFields) -> String {
        if fields.recipient_email.trim().is_empty() {
            return MISSING_RECIPIENT.to_string();
        }

        let _guard = self.action_lock.lock().await;

        let result = match self.composer.compose(&fields) {
            Ok(message) => self.sender.send(message).await,
            Err(e) => SendResult::failed(e),
        };

        result.to_string()
    }
}
