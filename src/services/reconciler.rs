//! Reconciles gateway notifications into transaction statuses.
//!
//! Notifications arrive at least once and in any order. Every update goes
//! through [`TransactionRepository::apply_status`], whose rank guard turns
//! duplicates into no-ops and refuses to move a transaction backwards.

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    NotificationIntent, PaymentNotification, StatusChange, TransactionKind, TransactionStatus,
};
use crate::midtrans::{SignatureError, SignatureVerifier};
use crate::ports::{
    NotificationDlq, RepositoryError, RoutingMarkers, TransactionRepository, UnroutedNotification,
};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("invalid notification signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    #[error("cannot route notification for order {order_id}: {reason}")]
    Unroutable { order_id: String, reason: String },

    #[error("failed to apply notification: {0}")]
    Persistence(#[from] RepositoryError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The transaction moved to `status`.
    Applied { id: Uuid, status: TransactionStatus },
    /// Replay of the current status.
    Duplicate { id: Uuid, status: TransactionStatus },
    /// The notification would move the transaction backwards and was dropped.
    Stale {
        id: Uuid,
        current: TransactionStatus,
        reported: TransactionStatus,
    },
    /// Gateway state with no counterpart in the transaction lifecycle.
    Ignored { order_id: String, reason: String },
}

impl ReconcileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Applied { .. } => "applied",
            ReconcileOutcome::Duplicate { .. } => "duplicate",
            ReconcileOutcome::Stale { .. } => "stale",
            ReconcileOutcome::Ignored { .. } => "ignored",
        }
    }
}

pub struct WebhookReconciler {
    repository: Arc<dyn TransactionRepository>,
    markers: Arc<dyn RoutingMarkers>,
    dlq: Arc<dyn NotificationDlq>,
    verifier: Option<SignatureVerifier>,
}

impl WebhookReconciler {
    /// `verifier = None` disables signature checks.
    pub fn new(
        repository: Arc<dyn TransactionRepository>,
        markers: Arc<dyn RoutingMarkers>,
        dlq: Arc<dyn NotificationDlq>,
        verifier: Option<SignatureVerifier>,
    ) -> Self {
        Self {
            repository,
            markers,
            dlq,
            verifier,
        }
    }

    pub async fn reconcile(
        &self,
        notification: &PaymentNotification,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        if let Some(verifier) = &self.verifier {
            verifier.verify(notification).map_err(|e| {
                tracing::warn!(order_id = %notification.order_id, error = %e, "Rejected notification");
                e
            })?;
        }

        let update = match notification.intent() {
            NotificationIntent::Update(update) => update,
            NotificationIntent::Ignore(reason) => {
                tracing::warn!(order_id = %notification.order_id, reason = %reason, "Ignoring notification");
                return Ok(ReconcileOutcome::Ignored {
                    order_id: notification.order_id.clone(),
                    reason,
                });
            }
        };

        let (id, kind) = self.route(notification).await?;

        let change = match self.repository.apply_status(id, kind, &update).await {
            Ok(change) => change,
            Err(RepositoryError::NotFound(_)) => {
                return Err(self
                    .dead_letter(notification, format!("no {kind} transaction with this id"))
                    .await);
            }
            Err(e) => {
                tracing::error!(order_id = %id, error = %e, "Failed to apply notification");
                return Err(e.into());
            }
        };

        let outcome = match change {
            StatusChange::Applied(tx) => ReconcileOutcome::Applied {
                id,
                status: tx.status,
            },
            StatusChange::Unchanged(tx) => ReconcileOutcome::Duplicate {
                id,
                status: tx.status,
            },
            StatusChange::Stale(tx) => ReconcileOutcome::Stale {
                id,
                current: tx.status,
                reported: update.status,
            },
        };

        tracing::info!(
            order_id = %id,
            kind = %kind,
            transaction_status = %notification.transaction_status,
            outcome = outcome.label(),
            "Notification reconciled"
        );

        Ok(outcome)
    }

    /// Resolves the transaction kind from the routing marker, falling back to the store.
    async fn route(
        &self,
        notification: &PaymentNotification,
    ) -> Result<(Uuid, TransactionKind), ReconcileError> {
        let id = match Uuid::parse_str(notification.order_id.trim()) {
            Ok(id) => id,
            Err(_) => {
                return Err(self
                    .dead_letter(notification, "order_id is not a transaction id".to_string())
                    .await)
            }
        };

        match self.markers.get(id).await {
            Ok(Some(kind)) => return Ok((id, kind)),
            Ok(None) => {
                tracing::debug!(order_id = %id, "Routing marker missing, falling back to store");
            }
            Err(e) => {
                tracing::warn!(order_id = %id, error = %e, "Routing marker lookup failed, falling back to store");
            }
        }

        match self.repository.find_kind(id).await? {
            Some(kind) => Ok((id, kind)),
            None => Err(self
                .dead_letter(notification, "no transaction with this id".to_string())
                .await),
        }
    }

    /// Stores the notification for manual reconciliation and returns the routing error.
    async fn dead_letter(&self, notification: &PaymentNotification, reason: String) -> ReconcileError {
        tracing::error!(
            order_id = %notification.order_id,
            transaction_status = %notification.transaction_status,
            reason = %reason,
            "Unroutable payment notification"
        );

        let entry = UnroutedNotification {
            id: Uuid::new_v4(),
            order_id: notification.order_id.clone(),
            transaction_status: notification.transaction_status.clone(),
            fraud_status: notification.fraud_status.clone(),
            payment_type: notification.payment_type.clone(),
            gross_amount: notification.gross_amount.clone(),
            error_reason: reason.clone(),
            payload: serde_json::to_value(notification).unwrap_or(serde_json::Value::Null),
            received_at: Utc::now(),
        };

        if let Err(e) = self.dlq.push(&entry).await {
            tracing::error!(order_id = %notification.order_id, error = %e, "Failed to store unroutable notification");
        }

        ReconcileError::Unroutable {
            order_id: notification.order_id.clone(),
            reason,
        }
    }
}
