pub mod agent;
pub mod booking;
pub mod config;
pub mod llm_interaction;
pub mod preferences;
pub mod prompt;
pub mod session;
pub mod web_server;

pub use agent::{FlowError, TravelAgent};
pub use config::{ConfigError, GeminiConfig};
pub use llm_interaction::{GeminiClient, GenerationError, TextGenerator};
