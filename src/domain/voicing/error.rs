use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum VoicingServiceError {
    #[error("episode not found")]
    NotFound,
    #[error("invalid episode state: {0}")]
    InvalidState(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("dependency error: {0}")]
    Dependency(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<AppError> for VoicingServiceError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(_) => VoicingServiceError::NotFound,
            AppError::BadRequest(msg) => VoicingServiceError::InvalidState(msg),
            AppError::Conflict(msg) => VoicingServiceError::Conflict(msg),
            AppError::Configuration(msg) => VoicingServiceError::Configuration(msg),
            _ => VoicingServiceError::Dependency(err.to_string()),
        }
    }
}

impl From<VoicingServiceError> for AppError {
    fn from(err: VoicingServiceError) -> Self {
        match err {
            VoicingServiceError::NotFound => {
                AppError::NotFound("Episode not found or access denied".to_string())
            }
            VoicingServiceError::InvalidState(msg) => AppError::BadRequest(msg),
            VoicingServiceError::Configuration(msg) => AppError::Configuration(msg),
            VoicingServiceError::Conflict(msg) => AppError::Conflict(msg),
            VoicingServiceError::Dependency(msg) => AppError::ExternalService(msg),
            VoicingServiceError::Other(e) => AppError::Internal(e.to_string()),
        }
    }
}
