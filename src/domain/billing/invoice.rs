//! Invoice audit rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stripe_objects::{from_unix, StripeInvoice};
use crate::domain::foundation::UserId;

/// A paid invoice as reported by the provider.
///
/// Written even when no matching subscription exists yet, so billing
/// history is never lost to event ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: Uuid,
    pub invoice_id: String,
    pub subscription_id: Option<String>,
    pub amount_paid: i64,
    pub amount_due: i64,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub customer_email: Option<String>,
    pub user_id: Option<UserId>,
    /// Provider creation time, falling back to receipt time.
    pub created_at: DateTime<Utc>,
}

impl InvoiceRecord {
    pub fn from_provider(
        invoice: &StripeInvoice,
        user_id: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            invoice_id: invoice.id.clone(),
            subscription_id: invoice.subscription.clone(),
            amount_paid: invoice.amount_paid,
            amount_due: invoice.amount_due,
            currency: invoice.currency.clone(),
            status: invoice.status.clone(),
            customer_email: invoice.customer_email.clone(),
            user_id,
            created_at: invoice.created.and_then(from_unix).unwrap_or(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_provider_copies_amounts_and_owner() {
        let invoice: StripeInvoice = serde_json::from_value(json!({
            "id": "in_1",
            "subscription": "sub_1",
            "status": "paid",
            "amount_paid": 999,
            "amount_due": 999,
            "currency": "usd",
            "customer_email": "ada@example.com",
            "created": 1704067200
        }))
        .unwrap();
        let user = UserId::new("user_1").unwrap();

        let record = InvoiceRecord::from_provider(&invoice, Some(user.clone()), Utc::now());

        assert_eq!(record.invoice_id, "in_1");
        assert_eq!(record.subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(record.amount_paid, 999);
        assert_eq!(record.user_id, Some(user));
        assert_eq!(record.created_at.timestamp(), 1704067200);
    }

    #[test]
    fn missing_created_uses_receipt_time() {
        let invoice: StripeInvoice = serde_json::from_value(json!({"id": "in_2"})).unwrap();
        let now = Utc::now();
        let record = InvoiceRecord::from_provider(&invoice, None, now);
        assert_eq!(record.created_at, now);
        assert!(record.user_id.is_none());
    }
}
