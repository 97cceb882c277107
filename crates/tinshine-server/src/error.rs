use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use tinshine_shared::Collection;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{} not found", noun(.collection))]
    NotFound { collection: Collection, id: i64 },

    #[error("Collection {0} is not served by this store")]
    UnsupportedCollection(Collection),

    #[error("Record storage error: {0}")]
    Storage(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Human name of a collection's records, as used in error bodies.
pub fn noun(collection: &Collection) -> &'static str {
    match collection {
        Collection::Products => "Product",
        Collection::BlogPosts => "Blog",
        Collection::Categories => "Category",
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::NotFound { .. } => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::UnsupportedCollection(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Storage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to save data".to_string())
            }
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_the_record() {
        let err = ServerError::NotFound {
            collection: Collection::Products,
            id: 3,
        };
        assert_eq!(err.to_string(), "Product not found");
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_storage_error_hides_details() {
        let response = ServerError::Storage("EACCES /data".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
