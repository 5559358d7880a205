//! Typed push-notification events.

use chrono::{DateTime, Utc};

/// A single decoded push event.
///
/// Immutable once received; the bus hands out references only.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    kind: NotificationKind,
    correlation_id: Option<String>,
    timestamp: DateTime<Utc>,
}

impl NotificationEvent {
    /// Creates a new event.
    #[must_use]
    pub const fn new(
        kind: NotificationKind,
        correlation_id: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            correlation_id,
            timestamp,
        }
    }

    /// Returns the event kind.
    #[must_use]
    pub const fn kind(&self) -> &NotificationKind {
        &self.kind
    }

    /// Returns the counterparty user id or external address, when known.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Returns the server-side event timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Enumerated push event kinds with their type-specific payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationKind {
    /// Funds arrived from a counterparty or an external address.
    PaymentReceived {
        /// Transfer details.
        payment: PaymentSummary,
    },
    /// An outbound transfer settled.
    PaymentSent {
        /// Transfer details.
        payment: PaymentSummary,
    },
    /// A counterparty requested a payment.
    RequestReceived {
        /// Request details.
        request: PaymentRequestSummary,
    },
    /// A request issued by this user was paid.
    RequestPaid {
        /// Request details.
        request: PaymentRequestSummary,
    },
    /// A request issued by this user was declined.
    RequestDeclined {
        /// Request details.
        request: PaymentRequestSummary,
    },
    /// A counterparty cancelled their request.
    RequestCancelled {
        /// Request details.
        request: PaymentRequestSummary,
    },
    /// A chat message arrived.
    MessageReceived {
        /// Sender user id.
        sender_id: String,
        /// Message body preview.
        preview: String,
    },
    /// The counterparty read this user's messages.
    MessagesRead {
        /// Counterparty user id.
        counterparty_id: String,
    },
    /// Forward-compatible fallback for unrecognized types.
    Unknown {
        /// Raw wire type tag.
        event_type: String,
    },
}

impl NotificationKind {
    /// Returns whether the event concerns a funds transfer.
    #[must_use]
    pub const fn is_payment_event(&self) -> bool {
        matches!(self, Self::PaymentReceived { .. } | Self::PaymentSent { .. })
    }

    /// Returns whether the event concerns a payment request.
    #[must_use]
    pub const fn is_request_event(&self) -> bool {
        matches!(
            self,
            Self::RequestReceived { .. }
                | Self::RequestPaid { .. }
                | Self::RequestDeclined { .. }
                | Self::RequestCancelled { .. }
        )
    }
}

/// Settled transfer details carried by payment events.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSummary {
    /// Backend payment id.
    pub payment_id: String,
    /// Decimal amount as an opaque string; no arithmetic happens client-side.
    pub amount: String,
    /// Currency or asset code.
    pub currency: String,
    /// Counterparty user id, or the external address for on-chain transfers.
    pub counterparty: String,
    /// Optional sender-supplied memo.
    pub memo: Option<String>,
}

/// Payment-request details carried by request events.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequestSummary {
    /// Backend request id.
    pub request_id: String,
    /// Decimal amount as an opaque string.
    pub amount: String,
    /// Currency or asset code.
    pub currency: String,
    /// Counterparty user id.
    pub counterparty: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment() -> PaymentSummary {
        PaymentSummary {
            payment_id: "p1".into(),
            amount: "12.50".into(),
            currency: "USDC".into(),
            counterparty: "u42".into(),
            memo: None,
        }
    }

    #[test]
    fn test_kind_classification() {
        let kind = NotificationKind::PaymentReceived { payment: payment() };
        assert!(kind.is_payment_event());
        assert!(!kind.is_request_event());

        let kind = NotificationKind::MessagesRead {
            counterparty_id: "u42".into(),
        };
        assert!(!kind.is_payment_event());
        assert!(!kind.is_request_event());
    }

    #[test]
    fn test_correlation_id_accessor() {
        let event = NotificationEvent::new(
            NotificationKind::PaymentSent { payment: payment() },
            Some("u42".to_string()),
            Utc::now(),
        );
        assert_eq!(event.correlation_id(), Some("u42"));
    }
}
