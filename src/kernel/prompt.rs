//! Prompt assembly for the language-model collaborator.

const TASK_INSTRUCTIONS: &str = "\
You are a voice agent that can answer questions and carry out real-world tasks such as sending e-mail.
When the user asks for a task, reply with valid JSON only, in this shape:
{
  \"response\": \"what to say aloud to the user\",
  \"intent\": \"send_email\",
  \"action\": { \"type\": \"send_email\", \"parameters\": { \"to\": \"...\", \"body\": \"...\", \"subject\": \"...\" } }
}
For a send_email action never guess the e-mail address: put the person's name in \"to\" \
(for example \"to\": \"Marta Jones\") and the assistant will look it up locally.
Leave out parameters you do not know yet.
For ordinary conversation use the intent \"general_chat\" and omit the action, \
or answer with a short spoken sentence.
";

const SPEECH_GUIDANCE: &str = "\
Your text is converted straight to speech.
Talk directly to the user in short, natural sentences.
Do not use tables, bullet points, markdown, emojis or special characters.
Do not mention that you are an AI.
";

/// Builds the full model prompt for one turn.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    style: String,
    topic: Option<String>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            style: "friendly".to_string(),
            topic: None,
        }
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn build(&self, user_input: &str, context: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str(TASK_INSTRUCTIONS);
        prompt.push_str(SPEECH_GUIDANCE);
        if let Some(topic) = &self.topic {
            prompt.push_str(&format!("You are helping the user with: {}.\n", topic));
        }
        prompt.push_str(&format!("Respond in a {} manner.\n\n", self.style));

        if !context.trim().is_empty() {
            prompt.push_str("Conversation so far:\n");
            prompt.push_str(context);
            prompt.push_str("\n\n");
        }
        prompt.push_str(&format!("User: {}\nAssistant:", user_input.trim()));
        prompt
    }
}
