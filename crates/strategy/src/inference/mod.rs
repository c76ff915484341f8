pub mod gemini_client;
mod prompt;
mod reply;

pub use gemini_client::GeminiClient;
