use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("Invalid datetime format: '{value}'. Expected YYYY-MM-DD HH:mm:ss or YYYY-MM-DD HH:mm.")]
    Format { value: String },
    #[error("{0}")]
    Validation(String),
}

impl CoreError {
    pub fn format(value: impl Into<String>) -> Self {
        CoreError::Format {
            value: value.into(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
