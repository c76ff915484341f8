pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use error::SignalError;
