use crate::models::Task;

/// Core error type.
///
/// Adapter crates map their specific errors into this type so the bot core can
/// tell benign control-flow outcomes (`NotFound`, `NotFinished`) apart from
/// real failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{entity} with {field} {value} not found")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("task not finished: {}", .0.url)]
    NotFinished(Box<Task>),

    /// A write lost against a concurrent one (e.g. a second in-progress task).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("messaging error: {0}")]
    Messaging(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn not_found(entity: &'static str, field: &'static str, value: impl ToString) -> Self {
        Self::NotFound {
            entity,
            field,
            value: value.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_the_lookup() {
        let err = Error::not_found("User", "external_id", "42");
        assert_eq!(err.to_string(), "User with external_id 42 not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn storage_errors_are_not_lookup_misses() {
        let err = Error::Storage("connection reset".to_string());
        assert!(!err.is_not_found());
    }
}
