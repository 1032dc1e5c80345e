use thiserror::Error;

/// Failure classes surfaced to the scheduler. Every class ends the current
/// run; the next scheduled tick starts from scratch.
#[derive(Debug, Error)]
pub enum BotError {
    /// Missing or invalid configuration, raised before any network call.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport failure, non-success HTTP status, or `ok: false` from Slack.
    #[error("slack {method} failed: {message}")]
    Api { method: String, message: String },

    /// Malformed or missing snapshot/directory file, or an unknown roster entry.
    #[error("bad data in {origin}: {message}")]
    Data { origin: String, message: String },
}

impl BotError {
    pub fn api(method: &str, message: impl ToString) -> Self {
        BotError::Api {
            method: method.to_string(),
            message: message.to_string(),
        }
    }

    pub fn data(origin: impl ToString, message: impl ToString) -> Self {
        BotError::Data {
            origin: origin.to_string(),
            message: message.to_string(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            BotError::Config(_) => 2,
            BotError::Api { .. } => 3,
            BotError::Data { .. } => 4,
        }
    }
}

/// Process exit status for an error chain; unclassified failures map to 1.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<BotError>())
        .map(BotError::exit_code)
        .unwrap_or(1)
}
