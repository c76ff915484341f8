pub mod cooldown;
pub mod orchestrator;
