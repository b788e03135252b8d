use serde_json::{json, Value};

/// Structured failure carried on every fallible path. `code` is a stable
/// `ND_*` string the CLI surfaces verbatim; `retryable` marks transient
/// transport failures a caller may simply run again.
#[derive(Debug, Clone)]
pub struct AppError {
    pub code: String,
    pub category: String,
    pub message: String,
    pub retryable: bool,
    pub details: Value,
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn new(code: &str, category: &str, message: &str, details: Value) -> Self {
        Self {
            code: code.to_string(),
            category: category.to_string(),
            message: message.to_string(),
            retryable: false,
            details,
        }
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    pub fn internal(message: &str) -> Self {
        Self::new("ND_INTERNAL_ERROR", "internal", message, json!({}))
    }
}
