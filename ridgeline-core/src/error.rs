use thiserror::Error;

/// Coarse outcome class used by outer surfaces to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// The caller sent something unusable.
    BadRequest,
    /// Nothing in the store answers the request.
    NotFound,
    /// The pipeline or one of its collaborators failed.
    ServerError,
    /// The record store could not be reached.
    Unavailable,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid image encoding: {0}")]
    InvalidImageEncoding(String),

    #[error("No image provided: {0}")]
    NoImageProvided(&'static str),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("No samples enrolled")]
    NoSamplesEnrolled,

    #[error("Feature engine failure: {0}")]
    EngineFailure(String),

    #[error("Descriptor decode error: {0}")]
    DescriptorDecodeError(String),

    #[error("No match found")]
    NoMatchFound,

    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Scratch file error: {0}")]
    Scratch(#[from] std::io::Error),
}

impl PipelineError {
    pub fn status_class(&self) -> StatusClass {
        match self {
            Self::InvalidImageEncoding(_) | Self::NoImageProvided(_) | Self::MissingField(_) => {
                StatusClass::BadRequest
            }
            Self::NoSamplesEnrolled | Self::NoMatchFound => StatusClass::NotFound,
            Self::EngineFailure(_) | Self::DescriptorDecodeError(_) | Self::Scratch(_) => {
                StatusClass::ServerError
            }
            Self::StoreUnavailable(_) => StatusClass::Unavailable,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
