pub mod dispatcher;
pub mod scheduler;
pub mod telegram_service;
