//! HandlePaymentWebhookHandler - Command handler for incoming payment webhooks.

use crate::domain::billing::{StripeWebhookVerifier, WebhookError, WebhookProcessor, WebhookReceipt};

/// Command to handle a payment webhook.
#[derive(Debug, Clone)]
pub struct HandlePaymentWebhookCommand {
    /// Raw webhook payload, exactly as received.
    pub payload: Vec<u8>,
    /// `Stripe-Signature` header value.
    pub signature: String,
}

/// Verifies a delivery and hands it to the [`WebhookProcessor`].
///
/// Nothing is persisted for a delivery that fails verification.
pub struct HandlePaymentWebhookHandler {
    verifier: StripeWebhookVerifier,
    processor: WebhookProcessor,
}

impl HandlePaymentWebhookHandler {
    pub fn new(verifier: StripeWebhookVerifier, processor: WebhookProcessor) -> Self {
        Self {
            verifier,
            processor,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandlePaymentWebhookCommand,
    ) -> Result<WebhookReceipt, WebhookError> {
        let event = self
            .verifier
            .verify_and_parse(&cmd.payload, &cmd.signature)
            .map_err(|e| {
                tracing::warn!(
                    error = %e,
                    code = e.code(),
                    payload_bytes = cmd.payload.len(),
                    "Rejected webhook delivery"
                );
                e
            })?;

        tracing::debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            livemode = event.livemode,
            "Webhook signature verified"
        );

        self.processor.process(&event, &cmd.payload).await
    }
}
