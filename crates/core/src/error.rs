//! Error types for the Corvid domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Corvid operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model backend errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Gateway errors ---
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    // --- Decision errors ---
    #[error("Decision error: {0}")]
    Decision(#[from] DecisionError),

    // --- Action execution errors ---
    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Errors from the model backend (decision and generation calls alike).
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Backend returned an unusable response: {0}")]
    InvalidResponse(String),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Errors from the chat platform gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway not connected: {0}")]
    NotConnected(String),

    #[error("Delivery failed on {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Operation not supported by this platform: {0}")]
    Unsupported(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),
}

/// Errors from classifying a message into a [`Decision`](crate::decision::Decision).
///
/// These never crash the decision loop; callers fall back to an ignore
/// decision with zero confidence.
#[derive(Debug, Clone, Error)]
pub enum DecisionError {
    #[error("Could not parse decision output: {reason} (raw: {raw_preview:?})")]
    ParseFailed { reason: String, raw_preview: String },

    #[error("Unrecognized action: {0:?}")]
    UnknownAction(String),

    #[error("Unrecognized status: {0:?}")]
    UnknownStatus(String),

    #[error("Decision is missing required field {0}")]
    MissingField(&'static str),

    #[error("Model call failed: {0}")]
    Model(#[from] ModelError),
}

/// Errors from executing a decided action.
///
/// `PermissionDenied` and `MissingField` are raised by the validation gate
/// before any side effect happens.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Missing permission {permission} for {action} in {channel}")]
    PermissionDenied {
        action: String,
        permission: String,
        channel: String,
    },

    #[error("Action {action} is missing required field {field}")]
    MissingField {
        action: String,
        field: &'static str,
    },

    #[error("Gateway failure: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Generation failed: {0}")]
    Generation(#[from] ModelError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_error_displays_correctly() {
        let err = Error::Model(ModelError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn action_error_displays_correctly() {
        let err = Error::Action(ActionError::PermissionDenied {
            action: "react".into(),
            permission: "add_reactions".into(),
            channel: "general".into(),
        });
        assert!(err.to_string().contains("react"));
        assert!(err.to_string().contains("add_reactions"));
    }

    #[test]
    fn decision_error_wraps_model_error() {
        let err = DecisionError::from(ModelError::Timeout("90s".into()));
        assert!(matches!(err, DecisionError::Model(_)));
        assert!(err.to_string().contains("90s"));
    }
}
