#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use parley::kernel::contacts::ContactDirectory;
use parley::services::{LanguageModel, MessageDispatcher, OutgoingMessage};
use parley::{AgentConfig, AgentError, TurnOrchestrator};

/// Language model that replays canned completions in order and keeps the
/// prompts it was given.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, reply: impl Into<String>) {
        self.replies.lock().unwrap().push_back(reply.into());
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> parley::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::Model("script exhausted".to_string()))
    }
}

/// Dispatcher that records every message. The first `failures` calls fail.
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<OutgoingMessage>>,
    failures: AtomicUsize,
}

impl RecordingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(times: usize) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            failures: AtomicUsize::new(times),
        })
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageDispatcher for RecordingDispatcher {
    async fn dispatch(&self, message: &OutgoingMessage) -> parley::Result<()> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AgentError::Dispatch("The mail server is unavailable.".to_string()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub fn contacts() -> ContactDirectory {
    ContactDirectory::new([
        ("Marta Jones", "marta@x.com"),
        ("John Smith", "john@example.com"),
    ])
}

pub fn orchestrator(model: Arc<ScriptedModel>, dispatcher: Arc<RecordingDispatcher>) -> TurnOrchestrator {
    TurnOrchestrator::new(model, dispatcher, Arc::new(contacts()), &AgentConfig::default())
}

/// Model completion proposing a send_email action.
pub fn email_action(response: &str, params: serde_json::Value) -> String {
    serde_json::json!({
        "response": response,
        "intent": "send_email",
        "action": { "type": "send_email", "parameters": params }
    })
    .to_string()
}

pub fn chat(response: &str) -> String {
    serde_json::json!({ "response": response, "intent": "general_chat" }).to_string()
}
