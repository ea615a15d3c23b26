pub const LOG_FILE_PATH: &str = "/tmp/parley.log";

pub const OLLAMA_ENDPOINT: &str = "http://localhost:11434";

/// Settings key holding the global system prompt.
pub const SYSTEM_PROMPT_KEY: &str = "system_prompt";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
