use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use parley::kernel::contacts::ContactDirectory;
use parley::kernel::event::Utterance;
use parley::services::llm::ChatCompletionModel;
use parley::services::mail::{DryRunDispatcher, SmtpDispatcher};
use parley::services::{LanguageModel, MessageDispatcher};
use parley::{AgentConfig, ConversationState, TurnOrchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // 1. Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // 2. Collaborators
    let config = AgentConfig::load_default()?;
    let contacts = Arc::new(ContactDirectory::load(&config.dialogue.contacts_path)?);
    let model: Arc<dyn LanguageModel> = Arc::new(ChatCompletionModel::from_env(&config.model)?);
    let dispatcher: Arc<dyn MessageDispatcher> = if config.mail.dry_run {
        Arc::new(DryRunDispatcher)
    } else {
        Arc::new(SmtpDispatcher::from_env()?)
    };

    let orchestrator = TurnOrchestrator::new(model, dispatcher, contacts, &config);
    let mut state = ConversationState::new(&config.dialogue);

    // 3. Typed turns
    println!("assistant> {}", config.dialogue.greeting);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "exit") {
            break;
        }
        tracing::debug!("Console input: '{}'", line);
        let reply = orchestrator.handle_turn(&mut state, &Utterance::text(line)).await;
        println!("assistant> {}", reply);
    }

    Ok(())
}
