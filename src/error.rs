//! Error types for the dashboard data access layer

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DashboardError>;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid trade transition: {from} -> {to}")]
    InvalidTransition {
        from: crate::types::TradeStatus,
        to: crate::types::TradeStatus,
    },

    #[error("Config load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for DashboardError {
    fn from(e: serde_json::Error) -> Self {
        DashboardError::Malformed(e.to_string())
    }
}

/// Coarse failure taxonomy, used for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Permission,
    NotFound,
    Malformed,
    Config,
}

impl DashboardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DashboardError::Http(e) if e.is_decode() => ErrorKind::Malformed,
            DashboardError::Http(_) | DashboardError::Unavailable(_) | DashboardError::Io(_) => {
                ErrorKind::Transport
            }
            DashboardError::PermissionDenied(_) => ErrorKind::Permission,
            DashboardError::NotFound(_) => ErrorKind::NotFound,
            DashboardError::Malformed(_) => ErrorKind::Malformed,
            DashboardError::Config(_)
            | DashboardError::ConfigLoad(_)
            | DashboardError::InvalidTransition { .. } => ErrorKind::Config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_is_malformed() {
        let err: DashboardError = serde_json::from_str::<serde_json::Value>("<html>")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Malformed);
        assert!(err.to_string().starts_with("Malformed response"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            DashboardError::PermissionDenied("403".into()).kind(),
            ErrorKind::Permission
        );
        assert_eq!(
            DashboardError::Unavailable("503".into()).kind(),
            ErrorKind::Transport
        );
        assert_eq!(DashboardError::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(DashboardError::Config("x".into()).kind(), ErrorKind::Config);
    }
}
