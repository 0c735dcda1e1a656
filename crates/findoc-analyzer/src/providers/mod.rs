//! Provider abstractions for stage reasoning backends

pub mod llm;
pub mod ollama;

pub use llm::LlmProvider;
pub use ollama::OllamaLlm;
