pub mod classifier;
pub mod extractor;
pub mod icons;
pub mod image_synth;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod types;

pub use orchestrator::ConversationOrchestrator;
