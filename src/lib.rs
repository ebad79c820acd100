pub mod audio;
pub mod config;
pub mod error;
pub mod kernel;
pub mod services;

pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use kernel::orchestrator::TurnOrchestrator;
pub use kernel::state::ConversationState;
