use thiserror::Error;

pub type BrokerResult<T> = Result<T, BrokerError>;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("connection closed: {reason}")]
    ConnectionClosed { reason: String },

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("heartbeat timeout: broker went silent")]
    HeartbeatTimeout,

    #[error("protocol error: {message}")]
    Protocol { message: String },

    #[error("frame decode error: {message}")]
    Decode { message: String },

    #[error("timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("not connected to broker")]
    NotConnected,
}

impl BrokerError {
    #[must_use]
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Whether the reconnect loop should schedule another attempt after
    /// this error. Credential and protocol violations will not heal on
    /// their own; transport-level failures might.
    #[must_use]
    pub const fn should_reconnect(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::ConnectionClosed { .. }
                | Self::Transport { .. }
                | Self::HeartbeatTimeout
                | Self::Timeout { .. }
        )
    }
}
