use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;

use crate::domain::PaymentNotification;
use crate::error::AppError;
use crate::services::ReconcileOutcome;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAck {
    pub status: &'static str,
    pub outcome: &'static str,
    pub order_id: String,
    /// Stored status after reconciliation, or the reported one when ignored.
    pub transaction_status: String,
}

/// Midtrans HTTP notification endpoint.
///
/// Reconciliation runs on its own task so a dropped gateway connection
/// cannot abandon an update halfway.
pub async fn midtrans_notification(
    State(state): State<AppState>,
    payload: Result<Json<PaymentNotification>, JsonRejection>,
) -> Result<Json<NotificationAck>, AppError> {
    let Json(notification) = payload?;

    tracing::info!(
        order_id = %notification.order_id,
        transaction_status = %notification.transaction_status,
        fraud_status = ?notification.fraud_status,
        "Payment notification received"
    );

    let reconciler = state.reconciler.clone();
    let outcome = {
        let notification = notification.clone();
        tokio::spawn(async move { reconciler.reconcile(&notification).await })
            .await
            .map_err(|e| AppError::Internal(format!("reconciliation task failed: {}", e)))??
    };

    let transaction_status = match &outcome {
        ReconcileOutcome::Applied { status, .. } | ReconcileOutcome::Duplicate { status, .. } => {
            status.to_string()
        }
        ReconcileOutcome::Stale { current, .. } => current.to_string(),
        ReconcileOutcome::Ignored { .. } => notification.transaction_status.clone(),
    };

    Ok(Json(NotificationAck {
        status: "ok",
        outcome: outcome.label(),
        order_id: notification.order_id,
        transaction_status,
    }))
}
