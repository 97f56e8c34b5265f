//! HTTP handlers for billing endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Json, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::application::{
    BillingWebhookDispatcher, CreateCheckoutSessionCommand, CreateCheckoutSessionHandler,
    GetPermissionsHandler, GetSubscriptionHandler, GetSubscriptionQuery,
    GetSubscriptionStatusHandler, HandlePaymentWebhookCommand, HandlePaymentWebhookHandler,
    OpenBillingPortalCommand, OpenBillingPortalHandler, PruneWebhookEventsCommand,
    PruneWebhookEventsHandler, ResyncPlanTiersHandler,
};
use crate::domain::billing::{PlanResolver, StripeWebhookVerifier, WebhookError, WebhookProcessor};
use crate::domain::foundation::{DomainError, ErrorCode, RetryPolicy, UserId};
use crate::ports::{
    BillingProvider, InvoiceRepository, SubscriptionRepository, WebhookEventRepository,
};

use super::dto::{
    CheckoutSessionResponse, CreateCheckoutSessionRequest, ErrorResponse, HealthResponse,
    PermissionsResponse, PortalSessionResponse, PruneWebhookEventsRequest, SubscriptionResponse,
    SubscriptionStatusResponse, SubscriptionView, WebhookAckResponse,
};

/// Header carrying the provider's webhook signature.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";
/// Header set by the upstream identity gateway.
pub const USER_ID_HEADER: &str = "X-User-Id";
/// Optional email of the caller, set by the same gateway.
pub const USER_EMAIL_HEADER: &str = "X-User-Email";
pub const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned for each request; handlers are built on demand from it.
#[derive(Clone)]
pub struct BillingAppState {
    pub subscription_repository: Arc<dyn SubscriptionRepository>,
    pub invoice_repository: Arc<dyn InvoiceRepository>,
    pub webhook_event_repository: Arc<dyn WebhookEventRepository>,
    pub billing_provider: Arc<dyn BillingProvider>,
    pub plan_resolver: Arc<PlanResolver>,
    pub verifier: StripeWebhookVerifier,
    pub checkout_retry: RetryPolicy,
    /// Base URL of the web app; checkout and portal redirects point here.
    pub frontend_url: String,
    /// Admin endpoints are disabled when unset.
    pub admin_token: Option<SecretString>,
}

impl BillingAppState {
    pub fn webhook_handler(&self) -> HandlePaymentWebhookHandler {
        let dispatcher = BillingWebhookDispatcher::with_reconcilers(
            self.subscription_repository.clone(),
            self.invoice_repository.clone(),
            self.billing_provider.clone(),
            self.plan_resolver.clone(),
            self.checkout_retry,
        );
        HandlePaymentWebhookHandler::new(
            self.verifier.clone(),
            WebhookProcessor::new(self.webhook_event_repository.clone(), Arc::new(dispatcher)),
        )
    }

    pub fn get_subscription_handler(&self) -> GetSubscriptionHandler {
        GetSubscriptionHandler::new(self.subscription_repository.clone())
    }

    pub fn get_permissions_handler(&self) -> GetPermissionsHandler {
        GetPermissionsHandler::new(self.subscription_repository.clone())
    }

    pub fn get_subscription_status_handler(&self) -> GetSubscriptionStatusHandler {
        GetSubscriptionStatusHandler::new(self.subscription_repository.clone())
    }

    pub fn create_checkout_session_handler(&self) -> CreateCheckoutSessionHandler {
        CreateCheckoutSessionHandler::new(
            self.billing_provider.clone(),
            self.plan_resolver.clone(),
            self.frontend_url.clone(),
        )
    }

    pub fn open_billing_portal_handler(&self) -> OpenBillingPortalHandler {
        OpenBillingPortalHandler::new(
            self.subscription_repository.clone(),
            self.billing_provider.clone(),
            self.frontend_url.clone(),
        )
    }

    pub fn resync_plan_tiers_handler(&self) -> ResyncPlanTiersHandler {
        ResyncPlanTiersHandler::new(
            self.subscription_repository.clone(),
            self.plan_resolver.clone(),
        )
    }

    pub fn prune_webhook_events_handler(&self) -> PruneWebhookEventsHandler {
        PruneWebhookEventsHandler::new(self.webhook_event_repository.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Extractors
// ════════════════════════════════════════════════════════════════════════════════

/// Caller identity, taken from the gateway's `X-User-Id` header.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub email: Option<String>,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = BillingApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| UserId::new(s).ok())
            .ok_or(BillingApiError::AuthenticationRequired)?;

        let email = parts
            .headers
            .get(USER_EMAIL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(AuthenticatedUser { user_id, email })
    }
}

/// Proof that the caller presented the configured admin token.
#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

#[axum::async_trait]
impl FromRequestParts<BillingAppState> for AdminAccess {
    type Rejection = BillingApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &BillingAppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.admin_token.as_ref() else {
            return Err(BillingApiError::Forbidden);
        };
        let presented = parts
            .headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(BillingApiError::Forbidden)?;

        let matches: bool = presented
            .as_bytes()
            .ct_eq(expected.expose_secret().as_bytes())
            .into();
        if !matches {
            tracing::warn!("Admin endpoint called with wrong token");
            return Err(BillingApiError::Forbidden);
        }
        Ok(AdminAccess)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook
// ════════════════════════════════════════════════════════════════════════════════

/// POST /webhooks/payments - Receive a payment provider event
pub async fn handle_payment_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, BillingApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Webhook delivery without signature header");
            WebhookError::InvalidSignature
        })?;

    let handler = state.webhook_handler();
    let cmd = HandlePaymentWebhookCommand {
        payload: body.to_vec(),
        signature: signature.to_string(),
    };

    let receipt = handler.handle(cmd).await?;

    Ok(Json(WebhookAckResponse::from(receipt)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /health - Liveness probe
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/subscription - Current user's subscription
pub async fn get_subscription(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, BillingApiError> {
    let handler = state.get_subscription_handler();
    let query = GetSubscriptionQuery {
        user_id: user.user_id,
    };

    let result = handler.handle(query).await?;

    Ok(Json(SubscriptionResponse {
        subscription: result.map(SubscriptionView::from),
    }))
}

/// GET /api/subscription/permissions - Current user's permissions
pub async fn get_permissions(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, BillingApiError> {
    let handler = state.get_permissions_handler();
    let query = GetSubscriptionQuery {
        user_id: user.user_id,
    };

    let result = handler.handle(query).await?;

    Ok(Json(PermissionsResponse::from(result)))
}

/// GET /api/subscription/status - Whether the user has an active subscription
pub async fn get_subscription_status(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, BillingApiError> {
    let query = GetSubscriptionQuery {
        user_id: user.user_id,
    };

    let summary = state.get_subscription_status_handler().handle(query).await?;

    Ok(Json(SubscriptionStatusResponse::from(summary)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Session Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/checkout-sessions - Start a hosted checkout
pub async fn create_checkout_session(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateCheckoutSessionRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let cmd = CreateCheckoutSessionCommand {
        user_id: user.user_id,
        email: user.email,
        price_id: request.price_id,
    };

    let session = state.create_checkout_session_handler().handle(cmd).await?;

    Ok((StatusCode::CREATED, Json(CheckoutSessionResponse::from(session))))
}

/// POST /api/billing-portal - Open the billing portal
pub async fn open_billing_portal(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, BillingApiError> {
    let cmd = OpenBillingPortalCommand {
        user_id: user.user_id,
    };

    let session = state.open_billing_portal_handler().handle(cmd).await?;

    Ok(Json(PortalSessionResponse::from(session)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Admin Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/admin/subscriptions/resync-plan-tiers
pub async fn resync_plan_tiers(
    State(state): State<BillingAppState>,
    _admin: AdminAccess,
) -> Result<impl IntoResponse, BillingApiError> {
    let result = state.resync_plan_tiers_handler().handle().await?;
    Ok(Json(result))
}

/// POST /api/admin/webhook-events/prune
pub async fn prune_webhook_events(
    State(state): State<BillingAppState>,
    _admin: AdminAccess,
    Json(request): Json<PruneWebhookEventsRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let cmd = PruneWebhookEventsCommand {
        older_than_days: request.older_than_days,
    };
    let result = state.prune_webhook_events_handler().handle(cmd).await?;
    Ok(Json(result))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts application errors to HTTP responses.
#[derive(Debug)]
pub enum BillingApiError {
    Webhook(WebhookError),
    Domain(DomainError),
    AuthenticationRequired,
    Forbidden,
}

impl From<WebhookError> for BillingApiError {
    fn from(err: WebhookError) -> Self {
        Self::Webhook(err)
    }
}

impl From<DomainError> for BillingApiError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl BillingApiError {
    fn status_and_body(&self) -> (StatusCode, ErrorResponse) {
        match self {
            Self::Webhook(e) => {
                let status = e.status_code();
                let message = if status.is_server_error() {
                    "Webhook processing failed, retry later".to_string()
                } else {
                    e.to_string()
                };
                (status, ErrorResponse::new(e.code(), message))
            }
            Self::Domain(e) => {
                let status = match e.code {
                    ErrorCode::ValidationFailed => StatusCode::BAD_REQUEST,
                    ErrorCode::NotFound => StatusCode::NOT_FOUND,
                    ErrorCode::Conflict | ErrorCode::InvalidStateTransition => StatusCode::CONFLICT,
                    ErrorCode::ExternalServiceError => StatusCode::BAD_GATEWAY,
                    ErrorCode::DatabaseError | ErrorCode::InternalError => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                let message = if status.is_server_error() {
                    tracing::error!(error = %e, "Billing request failed");
                    "Internal error".to_string()
                } else {
                    e.message.clone()
                };
                (status, ErrorResponse::new(e.code.to_string(), message))
            }
            Self::AuthenticationRequired => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required"),
            ),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                ErrorResponse::new("FORBIDDEN", "Admin access required"),
            ),
        }
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}
