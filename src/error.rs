use axum::response::{Html, IntoResponse, Response};

use crate::models::Store;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Neo4j error: {0}")]
    Neo4j(#[from] neo4rs::Error),

    #[error("could not decode MongoDB document: {0}")]
    Decode(#[from] mongodb::bson::de::Error),

    #[error("could not decode Neo4j row: {0}")]
    Row(#[from] neo4rs::DeError),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("unknown operation `{0}`")]
    UnknownOperation(String),

    #[error("a value for `{0}` is required")]
    MissingInput(&'static str),

    #[error("invalid value for `{field}`: {value}")]
    InvalidInput { field: &'static str, value: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// True when the failure means a store could not be reached at all,
    /// as opposed to a query that ran and failed.
    pub fn is_connectivity(&self) -> bool {
        match self {
            AppError::Mongo(err) => matches!(
                *err.kind,
                mongodb::error::ErrorKind::ServerSelection { .. }
                    | mongodb::error::ErrorKind::Io { .. }
                    | mongodb::error::ErrorKind::DnsResolve { .. }
            ),
            AppError::Neo4j(err) => matches!(
                err,
                neo4rs::Error::IOError { .. }
                    | neo4rs::Error::ConnectionError { .. }
                    | neo4rs::Error::AuthenticationError { .. }
            ),
            AppError::Timeout { .. } => true,
            _ => false,
        }
    }

    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            AppError::UnknownOperation(_)
                | AppError::MissingInput(_)
                | AppError::InvalidInput { .. }
        )
    }

    /// Message shown in the result panel.
    pub fn display_message(&self) -> String {
        match self.store() {
            Some(store) if self.is_connectivity() => {
                format!("Could not reach {store}: {self}")
            },
            _ => self.to_string(),
        }
    }

    fn store(&self) -> Option<Store> {
        match self {
            AppError::Mongo(_) | AppError::Decode(_) => Some(Store::Documents),
            AppError::Neo4j(_) | AppError::Row(_) => Some(Store::Graph),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = crate::templates::error_page(self.display_message());
        Html(body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_are_not_connectivity_failures() {
        let err = AppError::MissingInput("actor");
        assert!(err.is_user_input());
        assert!(!err.is_connectivity());
        assert_eq!(err.display_message(), "a value for `actor` is required");
    }

    #[test]
    fn timeouts_count_as_connectivity_failures() {
        let err = AppError::Timeout { operation: "co-actors".to_string(), seconds: 30 };
        assert!(err.is_connectivity());
        assert_eq!(err.to_string(), "co-actors timed out after 30s");
    }
}
