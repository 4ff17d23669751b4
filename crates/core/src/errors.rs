use thiserror::Error;

/// Raised by the profile normalizer when a payload cannot be coerced.
/// This is the only failure a caller ever sees from the engine.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("payload is not valid JSON: {0}")]
    Unparseable(String),
    #[error("payload must be a JSON object")]
    NotAnObject,
    #[error("`{field}` must be {expected}")]
    InvalidShape { field: &'static str, expected: &'static str },
    #[error("slider `{slider}` has a non-numeric value {value}")]
    NonNumericSlider { slider: &'static str, value: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The preference profile could not be read. Check the inputs and try again."
            }
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "validation",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. } => correlation_id,
        }
    }

    pub fn from_validation(error: ValidationError, correlation_id: impl Into<String>) -> Self {
        Self::BadRequest { message: error.to_string(), correlation_id: correlation_id.into() }
    }
}
