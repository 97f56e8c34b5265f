//! Integration tests for subscription reconciliation.
//!
//! Events go through the webhook processor and the full dispatcher with
//! in-memory adapters, covering orderings the provider actually produces:
//! redeliveries, checkout before creation, terminal states.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use educora_billing::adapters::memory::{
    InMemoryInvoiceRepository, InMemorySubscriptionRepository, InMemoryWebhookEventRepository,
};
use educora_billing::adapters::stripe::MockBillingProvider;
use educora_billing::application::BillingWebhookDispatcher;
use educora_billing::domain::billing::{
    PlanResolver, PlanTier, PriceTierTable, StripeEvent, SubscriptionRecord, SubscriptionStatus,
    WebhookProcessor, WebhookReceipt,
};
use educora_billing::domain::foundation::RetryPolicy;
use educora_billing::ports::{SubscriptionRepository, WebhookOutcome};

// =============================================================================
// Test Infrastructure
// =============================================================================

const CREATED: &str = "customer.subscription.created";
const UPDATED: &str = "customer.subscription.updated";
const DELETED: &str = "customer.subscription.deleted";
const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
const INVOICE_PAID: &str = "invoice.payment_succeeded";
const INVOICE_FAILED: &str = "invoice.payment_failed";

struct Harness {
    processor: Arc<WebhookProcessor>,
    subscriptions: Arc<InMemorySubscriptionRepository>,
    invoices: Arc<InMemoryInvoiceRepository>,
    provider: Arc<MockBillingProvider>,
}

impl Harness {
    async fn stored(&self) -> SubscriptionRecord {
        self.subscriptions
            .find_by_provider_id("sub_1")
            .await
            .unwrap()
            .unwrap()
    }
}

fn harness() -> Harness {
    harness_with(PlanResolver::default())
}

fn harness_with(resolver: PlanResolver) -> Harness {
    let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
    let invoices = Arc::new(InMemoryInvoiceRepository::new());
    let provider = Arc::new(MockBillingProvider::new());
    let dispatcher = BillingWebhookDispatcher::with_reconcilers(
        subscriptions.clone(),
        invoices.clone(),
        provider.clone(),
        Arc::new(resolver),
        RetryPolicy::default(),
    );
    let processor = WebhookProcessor::new(
        Arc::new(InMemoryWebhookEventRepository::new()),
        Arc::new(dispatcher),
    );
    Harness {
        processor: Arc::new(processor),
        subscriptions,
        invoices,
        provider,
    }
}

fn subscription(status: &str, price_id: &str, amount: i64) -> Value {
    json!({
        "id": "sub_1",
        "object": "subscription",
        "customer": "cus_1",
        "status": status,
        "current_period_start": 1704067200,
        "current_period_end": 1706745600,
        "cancel_at_period_end": false,
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

fn pro(status: &str) -> Value {
    subscription(status, "price_pro_monthly", 2999)
}

fn basic(status: &str) -> Value {
    subscription(status, "price_basic_monthly", 999)
}

fn invoice(invoice_id: &str, subscription_id: Option<&str>) -> Value {
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

fn checkout(subscription_id: &str) -> Value {
    json!({
        "id": "cs_1",
        "object": "checkout.session",
        "customer": "cus_1",
        "subscription": subscription_id,
        "payment_status": "paid",
        "metadata": {"userId": "user_1"}
    })
}

async fn deliver(
    processor: &WebhookProcessor,
    event_id: &str,
    event_type: &str,
    object: Value,
) -> WebhookReceipt {
    let raw = json!({
        "id": event_id,
        "type": event_type,
        "created": 1704067200,
        "livemode": false,
        "data": {"object": object}
    });
    let event: StripeEvent = serde_json::from_value(raw.clone()).unwrap();
    let payload = serde_json::to_vec(&raw).unwrap();
    processor.process(&event, &payload).await.unwrap()
}

// =============================================================================
// Subscription Lifecycle
// =============================================================================

#[tokio::test]
async fn created_then_updated_converges_on_one_record() {
    let h = harness();

    deliver(&h.processor, "evt_1", CREATED, basic("active")).await;
    deliver(&h.processor, "evt_2", UPDATED, pro("active")).await;

    assert_eq!(h.subscriptions.len().await, 1);
    let stored = h.stored().await;
    assert_eq!(stored.plan_tier, PlanTier::Pro);
    assert_eq!(stored.price_id.as_deref(), Some("price_pro_monthly"));
}

#[tokio::test]
async fn update_before_create_still_produces_record() {
    let h = harness();

    let receipt = deliver(&h.processor, "evt_2", UPDATED, pro("active")).await;
    deliver(&h.processor, "evt_1", CREATED, pro("incomplete")).await;

    assert_eq!(receipt.outcome, WebhookOutcome::Success);
    assert_eq!(h.subscriptions.len().await, 1);
}

#[tokio::test]
async fn duplicate_delivery_leaves_state_unchanged() {
    let h = harness();
    let object = pro("active");

    deliver(&h.processor, "evt_1", CREATED, object.clone()).await;
    let before = h.stored().await;
    let receipt = deliver(&h.processor, "evt_1", CREATED, object).await;
    let after = h.stored().await;

    assert!(receipt.duplicate);
    assert_eq!(before, after);
}

#[tokio::test]
async fn past_due_recovers_through_subscription_update() {
    let h = harness();

    deliver(&h.processor, "evt_1", CREATED, pro("active")).await;
    let failed = invoice("in_1", Some("sub_1"));
    deliver(&h.processor, "evt_2", INVOICE_FAILED, failed).await;
    let stored = h.stored().await;
    assert_eq!(stored.status, SubscriptionStatus::PastDue);
    assert_eq!(stored.plan_tier, PlanTier::Free);

    deliver(&h.processor, "evt_3", UPDATED, pro("active")).await;
    let stored = h.stored().await;
    assert_eq!(stored.status, SubscriptionStatus::Active);
    assert_eq!(stored.plan_tier, PlanTier::Pro);
}

#[tokio::test]
async fn canceled_subscription_is_not_reactivated() {
    let h = harness();

    deliver(&h.processor, "evt_1", CREATED, pro("active")).await;
    deliver(&h.processor, "evt_2", DELETED, pro("canceled")).await;
    let receipt = deliver(&h.processor, "evt_3", UPDATED, pro("active")).await;

    assert_eq!(receipt.outcome, WebhookOutcome::Ignored);
    let stored = h.stored().await;
    assert_eq!(stored.status, SubscriptionStatus::Canceled);
    assert_eq!(stored.plan_tier, PlanTier::Free);
}

#[tokio::test]
async fn configured_price_table_overrides_price_heuristics() {
    let table = PriceTierTable::new().with_price("price_launch_offer", PlanTier::Pro);
    let h = harness_with(PlanResolver::new(table));

    let launch_offer = subscription("active", "price_launch_offer", 500);

    deliver(&h.processor, "evt_1", CREATED, launch_offer).await;

    let stored = h.stored().await;
    assert_eq!(stored.plan_tier, PlanTier::Pro);
}

// =============================================================================
// Checkout Ordering
// =============================================================================

#[tokio::test(start_paused = true)]
async fn checkout_waits_for_subscription_created_later() {
    let h = harness();
    let late_creator = {
        let processor = h.processor.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            deliver(&processor, "evt_1", CREATED, pro("incomplete")).await;
        })
    };

    let session = checkout("sub_1");
    let receipt = deliver(&h.processor, "evt_2", CHECKOUT_COMPLETED, session).await;
    late_creator.await.unwrap();

    assert_eq!(receipt.outcome, WebhookOutcome::Success);
    let stored = h.stored().await;
    assert_eq!(stored.status, SubscriptionStatus::Active);
    assert_eq!(stored.plan_tier, PlanTier::Pro);
    assert_eq!(h.provider.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn checkout_gives_up_after_poll_budget() {
    let h = harness();
    let started = tokio::time::Instant::now();

    let session = checkout("sub_missing");
    let receipt = deliver(&h.processor, "evt_2", CHECKOUT_COMPLETED, session).await;

    assert_eq!(receipt.outcome, WebhookOutcome::Ignored);
    assert!(h.subscriptions.is_empty().await);
    assert!(started.elapsed() >= Duration::from_secs(4));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(h.provider.call_count(), 0);
}

// =============================================================================
// Invoices
// =============================================================================

#[tokio::test]
async fn paid_invoice_is_linked_to_subscription_owner() {
    let h = harness();

    deliver(&h.processor, "evt_1", CREATED, pro("active")).await;
    let paid = invoice("in_1", Some("sub_1"));
    deliver(&h.processor, "evt_2", INVOICE_PAID, paid).await;

    let invoices = h.invoices.all().await;
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].user_id.as_ref().map(|u| u.as_str()), Some("user_1"));
}

#[tokio::test]
async fn orphan_invoice_is_recorded_without_user() {
    let h = harness();

    let receipt = deliver(&h.processor, "evt_1", INVOICE_PAID, invoice("in_1", None)).await;

    assert_eq!(receipt.outcome, WebhookOutcome::Success);
    let invoices = h.invoices.all().await;
    assert_eq!(invoices.len(), 1);
    assert!(invoices[0].user_id.is_none());
}

#[tokio::test]
async fn redelivered_invoice_is_stored_once() {
    let h = harness();

    deliver(&h.processor, "evt_1", INVOICE_PAID, invoice("in_1", None)).await;
    deliver(&h.processor, "evt_1", INVOICE_PAID, invoice("in_1", None)).await;

    assert_eq!(h.invoices.all().await.len(), 1);
}
