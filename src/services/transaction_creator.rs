//! Creates transactions: price snapshot, gateway session, persistence, routing marker.

use bigdecimal::BigDecimal;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{BuyerInfo, PurchaseSubject, Transaction, TransactionDraft};
use crate::ports::{
    CatalogError, CustomerDetails, DanglingSession, DanglingSessions, GatewayError,
    PaymentGateway, PriceCatalog, RepositoryError, RoutingMarkers, SessionRequest,
    TransactionRepository,
};
use crate::validation::{self, ValidationError};

/// Routing markers live for one hour unless configured otherwise.
pub const DEFAULT_MARKER_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Error)]
pub enum CreateError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("failed to persist transaction: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("transaction recording task failed: {0}")]
    Interrupted(String),
}

/// Input for a cart checkout.
#[derive(Debug, Clone)]
pub struct ProductPurchase {
    pub cart_id: Uuid,
}

/// Input for a ticket purchase.
#[derive(Debug, Clone)]
pub struct EventPurchase {
    pub event_price_id: Uuid,
    pub quantity: i32,
    pub buyer: BuyerInfo,
}

pub struct TransactionCreator {
    repository: Arc<dyn TransactionRepository>,
    catalog: Arc<dyn PriceCatalog>,
    gateway: Arc<dyn PaymentGateway>,
    markers: Arc<dyn RoutingMarkers>,
    dangling_sessions: Arc<dyn DanglingSessions>,
    marker_ttl: Duration,
}

impl TransactionCreator {
    pub fn new(
        repository: Arc<dyn TransactionRepository>,
        catalog: Arc<dyn PriceCatalog>,
        gateway: Arc<dyn PaymentGateway>,
        markers: Arc<dyn RoutingMarkers>,
        dangling_sessions: Arc<dyn DanglingSessions>,
    ) -> Self {
        Self {
            repository,
            catalog,
            gateway,
            markers,
            dangling_sessions,
            marker_ttl: DEFAULT_MARKER_TTL,
        }
    }

    pub fn with_marker_ttl(mut self, ttl: Duration) -> Self {
        self.marker_ttl = ttl;
        self
    }

    pub async fn create_product_transaction(
        &self,
        user_id: Uuid,
        purchase: ProductPurchase,
    ) -> Result<Transaction, CreateError> {
        let cart = self.catalog.cart_total(user_id, purchase.cart_id).await?;

        if cart.item_count == 0 {
            return Err(ValidationError::new("cartId", "cart is empty").into());
        }
        validation::validate_positive_amount("totalAmount", &cart.total)?;
        validation::validate_whole_amount("totalAmount", &cart.total)?;

        let draft = TransactionDraft::new(
            user_id,
            PurchaseSubject::Cart {
                cart_id: purchase.cart_id,
            },
            cart.total,
        );

        self.open_session(draft, None).await
    }

    pub async fn create_event_transaction(
        &self,
        user_id: Uuid,
        purchase: EventPurchase,
    ) -> Result<Transaction, CreateError> {
        validation::validate_quantity(purchase.quantity)?;
        let buyer = validation::validate_buyer(&purchase.buyer)?;

        let unit_price = self.catalog.event_unit_price(purchase.event_price_id).await?;
        let total = unit_price * BigDecimal::from(purchase.quantity);
        validation::validate_positive_amount("totalAmount", &total)?;
        validation::validate_whole_amount("totalAmount", &total)?;

        let customer = CustomerDetails {
            first_name: buyer.full_name.clone(),
            email: buyer.email.clone(),
            phone: buyer.phone.clone(),
        };

        let draft = TransactionDraft::new(
            user_id,
            PurchaseSubject::EventTicket {
                event_price_id: purchase.event_price_id,
                quantity: purchase.quantity,
                buyer,
            },
            total,
        );

        self.open_session(draft, Some(customer)).await
    }

    async fn open_session(
        &self,
        draft: TransactionDraft,
        customer: Option<CustomerDetails>,
    ) -> Result<Transaction, CreateError> {
        let kind = draft.kind();
        let request = SessionRequest {
            order_id: draft.id,
            gross_amount: draft.total_amount.clone(),
            customer,
        };

        let session = self.gateway.create_session(&request).await.map_err(|e| {
            tracing::warn!(order_id = %draft.id, kind = %kind, error = %e, "Checkout session failed");
            e
        })?;

        let tx = draft.into_transaction(session.redirect_url, session.token);

        // A session now exists at the gateway. Recording it runs on its own
        // task so a dropped request cannot leave it untracked.
        let recorder = self.recorder();
        tokio::spawn(async move { recorder.record(tx).await })
            .await
            .map_err(|e| CreateError::Interrupted(e.to_string()))?
    }

    fn recorder(&self) -> SessionRecorder {
        SessionRecorder {
            repository: self.repository.clone(),
            markers: self.markers.clone(),
            dangling_sessions: self.dangling_sessions.clone(),
            marker_ttl: self.marker_ttl,
        }
    }
}

/// Persists a transaction whose gateway session is already open.
struct SessionRecorder {
    repository: Arc<dyn TransactionRepository>,
    markers: Arc<dyn RoutingMarkers>,
    dangling_sessions: Arc<dyn DanglingSessions>,
    marker_ttl: Duration,
}

impl SessionRecorder {
    async fn record(self, tx: Transaction) -> Result<Transaction, CreateError> {
        let kind = tx.kind();

        let stored = match self.repository.insert(&tx).await {
            Ok(stored) => stored,
            Err(e) => {
                self.record_dangling_session(&tx, &e).await;
                return Err(e.into());
            }
        };

        // Written after the row exists so a marker never points at nothing.
        if let Err(e) = self.markers.put(stored.id, kind, self.marker_ttl).await {
            tracing::warn!(
                order_id = %stored.id,
                kind = %kind,
                error = %e,
                "Failed to write routing marker; notifications will fall back to the store"
            );
        }

        tracing::info!(
            order_id = %stored.id,
            kind = %kind,
            user_id = %stored.user_id,
            total_amount = %stored.total_amount,
            "Transaction created"
        );

        Ok(stored)
    }

    async fn record_dangling_session(&self, tx: &Transaction, error: &RepositoryError) {
        tracing::error!(
            order_id = %tx.id,
            kind = %tx.kind(),
            error = %error,
            "Gateway session opened but transaction was not persisted"
        );

        let session = DanglingSession {
            order_id: tx.id,
            kind: tx.kind(),
            checkout_url: tx.checkout_url.clone(),
            gross_amount: tx.total_amount.to_string(),
            error: error.to_string(),
            recorded_at: Utc::now(),
        };

        if let Err(e) = self.dangling_sessions.record(&session).await {
            tracing::error!(order_id = %tx.id, error = %e, "Failed to record dangling session");
        }
    }
}
