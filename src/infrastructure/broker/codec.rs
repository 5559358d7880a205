//! Inbound frame body decoding.

use chrono::Utc;
use serde_json::Value;

use super::error::{BrokerError, BrokerResult};
use super::payloads::{
    ChatMessagePayload, EventEnvelope, PaymentPayload, ReadReceiptPayload, RequestPayload,
};
use crate::domain::entities::{
    NotificationEvent, NotificationKind, PaymentRequestSummary, PaymentSummary,
};

pub struct EventParser;

impl EventParser {
    /// Decodes a `MESSAGE` frame body into a typed event.
    ///
    /// Unrecognized type tags map to `NotificationKind::Unknown`; a body
    /// that is not a valid envelope is an error (the caller logs and drops
    /// the frame).
    pub fn parse_event(body: &str) -> BrokerResult<NotificationEvent> {
        let envelope: EventEnvelope = serde_json::from_str(body)
            .map_err(|e| BrokerError::decode(format!("invalid event envelope: {e}")))?;

        let timestamp = envelope.timestamp.unwrap_or_else(Utc::now);

        let (kind, correlation_id) = Self::parse_kind(&envelope.event_type, envelope.payload)?;

        Ok(NotificationEvent::new(kind, correlation_id, timestamp))
    }

    fn parse_kind(
        event_type: &str,
        payload: Value,
    ) -> BrokerResult<(NotificationKind, Option<String>)> {
        match event_type {
            "payment-received" => {
                let payment = Self::parse_payment(payload)?;
                let correlation = Some(payment.counterparty.clone());
                Ok((NotificationKind::PaymentReceived { payment }, correlation))
            }
            "payment-sent" => {
                let payment = Self::parse_payment(payload)?;
                let correlation = Some(payment.counterparty.clone());
                Ok((NotificationKind::PaymentSent { payment }, correlation))
            }
            "request-received" => {
                let request = Self::parse_request(payload)?;
                let correlation = Some(request.counterparty.clone());
                Ok((NotificationKind::RequestReceived { request }, correlation))
            }
            "request-paid" => {
                let request = Self::parse_request(payload)?;
                let correlation = Some(request.counterparty.clone());
                Ok((NotificationKind::RequestPaid { request }, correlation))
            }
            "request-declined" => {
                let request = Self::parse_request(payload)?;
                let correlation = Some(request.counterparty.clone());
                Ok((NotificationKind::RequestDeclined { request }, correlation))
            }
            "request-cancelled" => {
                let request = Self::parse_request(payload)?;
                let correlation = Some(request.counterparty.clone());
                Ok((NotificationKind::RequestCancelled { request }, correlation))
            }
            "message-received" => {
                let parsed: ChatMessagePayload = Self::parse_payload(payload, "message")?;
                let correlation = Some(parsed.sender_id.clone());
                Ok((
                    NotificationKind::MessageReceived {
                        sender_id: parsed.sender_id,
                        preview: parsed.preview,
                    },
                    correlation,
                ))
            }
            "messages-read" => {
                let parsed: ReadReceiptPayload = Self::parse_payload(payload, "read receipt")?;
                let correlation = Some(parsed.counterparty_id.clone());
                Ok((
                    NotificationKind::MessagesRead {
                        counterparty_id: parsed.counterparty_id,
                    },
                    correlation,
                ))
            }
            other => Ok((
                NotificationKind::Unknown {
                    event_type: other.to_string(),
                },
                None,
            )),
        }
    }

    fn parse_payment(payload: Value) -> BrokerResult<PaymentSummary> {
        let parsed: PaymentPayload = Self::parse_payload(payload, "payment")?;

        // Correlate on the counterparty user when there is one; on-chain
        // transfers only carry the external address.
        let counterparty = parsed
            .counterparty_id
            .or(parsed.counterparty_address)
            .ok_or_else(|| BrokerError::decode("payment without a counterparty"))?;

        Ok(PaymentSummary {
            payment_id: parsed.payment_id,
            amount: parsed.amount,
            currency: parsed.currency,
            counterparty,
            memo: parsed.memo,
        })
    }

    fn parse_request(payload: Value) -> BrokerResult<PaymentRequestSummary> {
        let parsed: RequestPayload = Self::parse_payload(payload, "request")?;

        Ok(PaymentRequestSummary {
            request_id: parsed.request_id,
            amount: parsed.amount,
            currency: parsed.currency,
            counterparty: parsed.counterparty_id,
        })
    }

    fn parse_payload<T: serde::de::DeserializeOwned>(
        payload: Value,
        what: &str,
    ) -> BrokerResult<T> {
        serde_json::from_value(payload)
            .map_err(|e| BrokerError::decode(format!("invalid {what} payload: {e}")))
    }
}
