//! Helpers shared by module handlers.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    Json,
};
use shelf_http::AppError;

/// Run blocking work (storage, password hashing) off the async executor.
pub async fn blocking<T, E, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(anyhow::Error::new(e).context("blocking task failed")))?
        .map_err(Into::into)
}

/// Unwrap a JSON body, reporting malformed input in the shared error format.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::validation(vec![], rejection.body_text()))
}

pub fn path_param<T>(param: Result<axum::extract::Path<T>, PathRejection>) -> Result<T, AppError> {
    param
        .map(|axum::extract::Path(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

pub fn query_params<T>(
    query: Result<axum::extract::Query<T>, QueryRejection>,
) -> Result<T, AppError> {
    query
        .map(|axum::extract::Query(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn blocking_propagates_errors() {
        let result: Result<(), AppError> =
            blocking(|| Err::<(), _>(AppError::not_found("missing"))).await;
        assert_eq!(result.unwrap_err().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn blocking_panics_become_internal_errors() {
        let result: Result<(), AppError> =
            blocking(|| -> Result<(), AppError> { panic!("boom") }).await;
        assert_eq!(
            result.unwrap_err().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
