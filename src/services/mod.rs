pub mod completion_client;

// Re-export for convenience
pub use completion_client::{
    complete_with_timeout, CompletionError, CompletionService, OllamaCompletionClient,
};
