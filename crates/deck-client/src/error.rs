use thiserror::Error;

/// Everything that can go wrong between the console and the backend.
///
/// None of these are fatal to a poll loop; they are reported and the
/// next tick tries again.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {path} returned HTTP {status}: {body}")]
    Status {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    #[error("unexpected response from {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("no admin token configured for server '{server}'")]
    MissingToken { server: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Short text suitable for a status bar or table placeholder.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Network { source, .. } if source.is_timeout() => {
                "The server did not answer in time".to_string()
            }
            ClientError::Network { url, .. } => {
                format!("Cannot reach {url}; is the backend running?")
            }
            ClientError::Status { status: 401 | 403, .. } => {
                "The admin token was rejected".to_string()
            }
            ClientError::Status {
                status: 404, path, ..
            } => format!("Not found: {path}"),
            ClientError::Status { status, body, .. } if *status >= 500 => {
                if body.is_empty() {
                    format!("Server error (HTTP {status})")
                } else {
                    format!("Server error (HTTP {status}): {body}")
                }
            }
            ClientError::Status { status, body, .. } => {
                format!("Request rejected (HTTP {status}): {body}")
            }
            ClientError::Decode { path, .. } => {
                format!("The server sent data in an unexpected shape ({path})")
            }
            ClientError::MissingToken { server } => format!(
                "Admin token required for '{server}': set AGENTDECK_ADMIN_TOKEN or admin_token in the config"
            ),
            ClientError::Config(msg) => msg.clone(),
            ClientError::Io(e) => format!("File error: {e}"),
        }
    }

    /// Whether trying the same request again could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Network { .. } => true,
            ClientError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> ClientError {
        ClientError::Status {
            method: "GET".into(),
            path: "/api/agents".into(),
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn auth_failures_mention_the_token() {
        assert!(status(401).user_message().contains("token"));
        assert!(!status(401).is_retryable());
    }

    #[test]
    fn server_errors_are_retryable() {
        assert!(status(503).is_retryable());
        assert_eq!(status(503).user_message(), "Server error (HTTP 503)");
    }

    #[test]
    fn missing_token_names_the_server() {
        let err = ClientError::MissingToken {
            server: "staging".into(),
        };
        assert!(err.user_message().contains("'staging'"));
    }
}
