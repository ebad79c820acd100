pub mod confirm;
pub mod contacts;
pub mod context;
pub mod event;
pub mod fuzzy;
pub mod orchestrator;
pub mod prompt;
pub mod reply;
pub mod state;
pub mod task;
