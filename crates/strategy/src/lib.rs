pub mod inference;
pub mod report;
pub mod services;

pub use inference::GeminiClient;
pub use services::cooldown::CooldownCache;
pub use services::orchestrator::{BatchMode, BatchTicket, OrchestratorConfig, SignalOrchestrator};
