//! Mock billing provider for testing.
//!
//! Serves pre-configured subscriptions, can be switched into a failing
//! mode, counts lookups, and records the checkout and portal sessions it
//! was asked for.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::ports::{
    BillingProvider, CheckoutSession, CreateCheckoutRequest, PaymentError, PortalSession,
    ProviderSubscription,
};

/// In-process stand-in for the Stripe API.
///
/// # Example
///
/// ```ignore
/// let mock = MockBillingProvider::new();
/// mock.insert_subscription(subscription);
/// mock.fail_with(PaymentError::network("connection reset"));
/// ```
#[derive(Default)]
pub struct MockBillingProvider {
    subscriptions: Mutex<HashMap<String, ProviderSubscription>>,
    next_error: Mutex<Option<PaymentError>>,
    calls: AtomicUsize,
    checkout_requests: Mutex<Vec<CreateCheckoutRequest>>,
    portal_customers: Mutex<Vec<String>>,
}

impl MockBillingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_subscription(&self, subscription: ProviderSubscription) {
        if let Ok(mut subs) = self.subscriptions.lock() {
            subs.insert(subscription.id.clone(), subscription);
        }
    }

    /// Every subsequent lookup fails with `error` until `clear_error`.
    pub fn fail_with(&self, error: PaymentError) {
        if let Ok(mut next) = self.next_error.lock() {
            *next = Some(error);
        }
    }

    pub fn clear_error(&self) {
        if let Ok(mut next) = self.next_error.lock() {
            *next = None;
        }
    }

    /// Number of `retrieve_subscription` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn checkout_requests(&self) -> Vec<CreateCheckoutRequest> {
        self.checkout_requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Customers a portal session was opened for, in order.
    pub fn portal_customers(&self) -> Vec<String> {
        self.portal_customers
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    fn injected_error(&self) -> Option<PaymentError> {
        self.next_error.lock().ok().and_then(|e| e.clone())
    }
}

#[async_trait]
impl BillingProvider for MockBillingProvider {
    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<ProviderSubscription>, PaymentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.injected_error() {
            return Err(err);
        }

        Ok(self
            .subscriptions
            .lock()
            .ok()
            .and_then(|subs| subs.get(subscription_id).cloned()))
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        if let Some(err) = self.injected_error() {
            return Err(err);
        }

        let mut requests = self
            .checkout_requests
            .lock()
            .map_err(|_| PaymentError::network("mock state poisoned"))?;
        requests.push(request);
        let id = format!("cs_mock_{}", requests.len());

        Ok(CheckoutSession {
            url: format!("https://checkout.stripe.test/c/pay/{}", id),
            id,
            expires_at: None,
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        _return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        if let Some(err) = self.injected_error() {
            return Err(err);
        }

        let mut customers = self
            .portal_customers
            .lock()
            .map_err(|_| PaymentError::network("mock state poisoned"))?;
        customers.push(customer_id.to_string());
        let id = format!("bps_mock_{}", customers.len());

        Ok(PortalSession {
            url: format!("https://billing.stripe.test/p/session/{}", id),
            id,
        })
    }
}
