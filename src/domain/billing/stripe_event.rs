//! Stripe webhook event envelope.
//!
//! Only the envelope is typed here; `data.object` stays as JSON until the
//! handler for the event type deserializes it into the matching object.

use serde::{Deserialize, Serialize};

/// Stripe webhook event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEvent {
    /// Unique identifier for the event (evt_xxx format).
    pub id: String,

    /// Type of event (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time at which the event was created (Unix timestamp).
    pub created: i64,

    pub data: StripeEventData,

    #[serde(default)]
    pub livemode: bool,

    #[serde(default)]
    pub api_version: Option<String>,
}

/// Container for event-specific data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object that triggered the event (polymorphic based on event type).
    pub object: serde_json::Value,

    /// Previous values for updated attributes (only for update events).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_attributes: Option<serde_json::Value>,
}

impl StripeEvent {
    /// Attempts to deserialize the data object as the specified type.
    pub fn deserialize_object<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }

    /// Parse the event type into a known enum variant.
    pub fn parsed_type(&self) -> StripeEventType {
        StripeEventType::from_str(&self.event_type)
    }
}

/// Stripe event types the reconciler acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StripeEventType {
    CustomerSubscriptionCreated,
    CustomerSubscriptionUpdated,
    CustomerSubscriptionDeleted,
    CheckoutSessionCompleted,
    InvoicePaymentSucceeded,
    InvoicePaymentFailed,
    /// Anything else. Acknowledged and ignored.
    Unknown,
}

impl StripeEventType {
    /// Parse event type from string.
    pub fn from_str(s: &str) -> Self {
        match s {
            "customer.subscription.created" => Self::CustomerSubscriptionCreated,
            "customer.subscription.updated" => Self::CustomerSubscriptionUpdated,
            "customer.subscription.deleted" => Self::CustomerSubscriptionDeleted,
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "invoice.payment_succeeded" => Self::InvoicePaymentSucceeded,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            _ => Self::Unknown,
        }
    }

    /// Convert to the Stripe event type string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CustomerSubscriptionCreated => "customer.subscription.created",
            Self::CustomerSubscriptionUpdated => "customer.subscription.updated",
            Self::CustomerSubscriptionDeleted => "customer.subscription.deleted",
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::InvoicePaymentSucceeded => "invoice.payment_succeeded",
            Self::InvoicePaymentFailed => "invoice.payment_failed",
            Self::Unknown => "unknown",
        }
    }
}

/// Builder for StripeEvent instances in tests.
#[cfg(test)]
pub struct StripeEventBuilder {
    id: String,
    event_type: String,
    created: i64,
    object: serde_json::Value,
}

#[cfg(test)]
impl Default for StripeEventBuilder {
    fn default() -> Self {
        Self {
            id: "evt_test_123".to_string(),
            event_type: "customer.subscription.created".to_string(),
            created: chrono::Utc::now().timestamp(),
            object: serde_json::json!({}),
        }
    }
}

#[cfg(test)]
impl StripeEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn object(mut self, object: serde_json::Value) -> Self {
        self.object = object;
        self
    }

    pub fn build(self) -> StripeEvent {
        StripeEvent {
            id: self.id,
            event_type: self.event_type,
            created: self.created,
            data: StripeEventData {
                object: self.object,
                previous_attributes: None,
            },
            livemode: false,
            api_version: Some("2023-10-16".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ══════════════════════════════════════════════════════════════
    // Deserialization
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn deserialize_minimal_event() {
        let json = r#"{
            "id": "evt_1234567890",
            "type": "checkout.session.completed",
            "created": 1704067200,
            "data": { "object": {} }
        }"#;

        let event: StripeEvent = serde_json::from_str(json).unwrap();

        assert_eq!(event.id, "evt_1234567890");
        assert_eq!(event.parsed_type(), StripeEventType::CheckoutSessionCompleted);
        assert_eq!(event.created, 1704067200);
        assert!(!event.livemode);
        assert!(event.api_version.is_none());
    }

    #[test]
    fn missing_type_fails_to_parse() {
        let json = r#"{"id": "evt_1", "created": 1, "data": {"object": {}}}"#;
        assert!(serde_json::from_str::<StripeEvent>(json).is_err());
    }

    #[test]
    fn deserialize_object_reads_typed_payload() {
        #[derive(Deserialize)]
        struct Partial {
            status: String,
        }

        let event = StripeEventBuilder::new()
            .object(json!({"id": "sub_1", "status": "active"}))
            .build();
        let partial: Partial = event.deserialize_object().unwrap();
        assert_eq!(partial.status, "active");
    }

    // ══════════════════════════════════════════════════════════════
    // Event Type Parsing
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn known_types_round_trip() {
        let types = [
            StripeEventType::CustomerSubscriptionCreated,
            StripeEventType::CustomerSubscriptionUpdated,
            StripeEventType::CustomerSubscriptionDeleted,
            StripeEventType::CheckoutSessionCompleted,
            StripeEventType::InvoicePaymentSucceeded,
            StripeEventType::InvoicePaymentFailed,
        ];
        for t in types {
            assert_eq!(StripeEventType::from_str(t.as_str()), t);
        }
    }

    #[test]
    fn unrecognised_type_is_unknown() {
        assert_eq!(
            StripeEventType::from_str("customer.created"),
            StripeEventType::Unknown
        );
    }
}
