pub mod config;
pub mod error;
pub mod exchange;
pub mod gemini;
pub mod models;
pub mod providers;
pub mod server;
pub mod sources;

pub use config::AppConfig;
pub use server::run_server;
