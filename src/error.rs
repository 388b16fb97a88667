use thiserror::Error;

use crate::api::ApiError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Report job not found: {0}")]
    JobNotFound(u64),

    #[error("Reports API error: {0}")]
    Api(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Turns a 404 on a single-job lookup into [`AppError::JobNotFound`].
    pub fn from_lookup(id: u64, err: ApiError) -> Self {
        match err {
            ApiError::Status { status: 404, .. } => AppError::JobNotFound(id),
            other => AppError::Api(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_404_is_not_found() {
        let err = AppError::from_lookup(
            7,
            ApiError::Status {
                status: 404,
                message: None,
            },
        );
        assert!(matches!(err, AppError::JobNotFound(7)));
        assert_eq!(err.to_string(), "Report job not found: 7");
    }

    #[test]
    fn other_lookup_errors_pass_through() {
        let err = AppError::from_lookup(7, ApiError::Unauthorized { message: None });
        assert!(matches!(err, AppError::Api(ApiError::Unauthorized { .. })));
    }
}
