#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use maildraft::completion::{CompletionError, CompletionService};
use maildraft::composer::{Composer, OutboundMessage};
use maildraft::controller::FormController;
use maildraft::gmail_client::{MailSender, SendResult};

/// Completion service returning a fixed answer, or failing with a network fault
pub struct MockCompletion {
    reply: Option<String>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<(String, u32)>>,
}

impl MockCompletion {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(MockCompletion {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(MockCompletion {
            reply: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for MockCompletion {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push((prompt.to_string(), max_tokens));
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(CompletionError::Http("connection refused".to_string())),
        }
    }
}

/// Mail sender that records what it was asked to send
pub struct RecordingSender {
    pub calls: AtomicUsize,
    pub sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingSender {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingSender {
            calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailSender for RecordingSender {
    async fn send(&self, message: OutboundMessage) -> SendResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let recipient = message.recipient();
        self.sent.lock().unwrap().push(message);
        SendResult::Sent { recipient }
    }
}

pub fn controller(
    completion: Arc<MockCompletion>,
    sender: Arc<RecordingSender>,
) -> FormController {
    FormController::new(completion, sender, Composer::new("me@gmail.com"))
}
