pub mod cache;
pub mod generation;
pub mod llm;
pub mod prompts;
pub mod repository;
pub mod revision;
pub mod setup;
pub mod store;
pub mod workflow;
