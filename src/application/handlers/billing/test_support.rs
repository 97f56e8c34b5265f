//! Event fixtures shared by the billing handler tests.

use serde_json::{json, Value};

use crate::domain::billing::{StripeEvent, StripeEventBuilder};

pub const BASIC_PRICE: &str = "price_basic_monthly";
pub const PRO_PRICE: &str = "price_pro_monthly";

pub fn subscription_object(id: &str, status: &str, price_id: &str, amount: i64) -> Value {
    json!({
        "id": id,
        "object": "subscription",
        "customer": "cus_test",
        "status": status,
        "current_period_start": 1704067200,
        "current_period_end": 1706745600,
        "cancel_at_period_end": false,
        "start_date": 1704067200,
        "metadata": {"userId": "user_1"},
        "items": {"data": [{
            "id": "si_1",
            "price": {
                "id": price_id,
                "unit_amount": amount,
                "currency": "usd",
                "recurring": {"interval": "month"}
            }
        }]}
    })
}

pub fn event(id: &str, event_type: &str, object: Value) -> StripeEvent {
    StripeEventBuilder::new()
        .id(id)
        .event_type(event_type)
        .object(object)
        .build()
}

pub fn checkout_object(session_id: &str, subscription_id: &str, payment_status: &str) -> Value {
    json!({
        "id": session_id,
        "object": "checkout.session",
        "customer": "cus_test",
        "subscription": subscription_id,
        "payment_status": payment_status,
        "metadata": {"userId": "user_1", "plan": "pro"}
    })
}

pub fn invoice_object(invoice_id: &str, subscription_id: Option<&str>) -> Value {
    json!({
        "id": invoice_id,
        "object": "invoice",
        "subscription": subscription_id,
        "status": "paid",
        "amount_paid": 2999,
        "amount_due": 2999,
        "currency": "usd",
        "customer_email": "student@example.com",
        "created": 1704067200
    })
}
