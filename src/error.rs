//! Error types for the intake bot.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("No channel registered under {name}")]
    UnknownChannel { name: String },
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_error_converts_into_top_level() {
        let err: Error = ChannelError::SendFailed {
            name: "telegram".into(),
            reason: "timeout".into(),
        }
        .into();
        assert!(matches!(err, Error::Channel(_)));
        assert_eq!(
            err.to_string(),
            "Channel error: Failed to send response on channel telegram: timeout"
        );
    }

    #[test]
    fn config_error_display_names_key() {
        let err = ConfigError::InvalidValue {
            key: "INTAKE_UNEXPECTED_INPUT".into(),
            message: "expected ignore or reprompt".into(),
        };
        assert!(err.to_string().contains("INTAKE_UNEXPECTED_INPUT"));
    }
}
