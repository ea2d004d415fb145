pub mod audio;
pub mod coach;
pub mod evaluator;
pub mod llm_provider;
pub mod speech;
