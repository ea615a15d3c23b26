use super::constants::*;

pub(crate) fn log_level() -> Option<String> {
    Some("info".to_string())
}

pub(crate) fn log_file_path() -> String {
    LOG_FILE_PATH.to_string()
}

pub(crate) fn ollama_endpoint() -> String {
    OLLAMA_ENDPOINT.to_string()
}

/// Built-in value returned for a settings key that has no stored row.
pub fn setting_default(key: &str) -> &'static str {
    match key {
        SYSTEM_PROMPT_KEY => DEFAULT_SYSTEM_PROMPT,
        _ => "",
    }
}
