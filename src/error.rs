use thiserror::Error;

/// Every failure the client can surface to a view or to the CLI.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The request never got an HTTP answer.
    #[error("Network error: {0}")]
    Transport(String),

    /// Non-2xx answer; `message` comes from the body when the server sent one.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    MalformedResponse(String),

    #[error("Live updates unavailable: {0}")]
    Push(String),

    #[error("Invalid update received: {0}")]
    PushPayload(String),

    /// Pre-flight form validation; never reaches the network.
    #[error("{0}")]
    Validation(String),

    #[error("You need to log in first")]
    NotAuthenticated,

    #[error("Session store error: {0}")]
    Session(String),
}

impl ClientError {
    /// Prefixes the message the way list and detail views report read failures.
    pub fn describe(&self, action: &str) -> String {
        format!("Failed to {}: {}", action, self)
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            ClientError::Api {
                status: status.as_u16(),
                message: format!("Request failed with status code {}", status.as_u16()),
            }
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::Push(err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::Push(format!("invalid channel url: {}", err))
    }
}

impl From<keyring::Error> for ClientError {
    fn from(err: keyring::Error) -> Self {
        ClientError::Session(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_displays_server_message() {
        let err = ClientError::Api { status: 404, message: "Contract not found".into() };
        assert_eq!(err.describe("fetch contract c1"), "Failed to fetch contract c1: Contract not found");
    }

    #[test]
    fn validation_is_flagged() {
        assert!(ClientError::Validation("Title must be at least 5 characters".into()).is_validation());
        assert!(!ClientError::NotAuthenticated.is_validation());
    }
}
