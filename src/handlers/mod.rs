pub mod event_transactions;
pub mod notification;
pub mod product_transactions;

use axum::{extract::State, response::IntoResponse, Json};
use uuid::Uuid;

use crate::domain::{Transaction, TransactionKind};
use crate::error::AppError;
use crate::ports::RepositoryError;
use crate::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.health.check().await;
    (report.status_code(), Json(report))
}

/// Loads a transaction of `kind` owned by `user_id`.
///
/// Other users' transactions and transactions of the other kind are reported
/// as missing so ids cannot be enumerated.
pub(crate) async fn load_owned(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
    kind: TransactionKind,
) -> Result<Transaction, AppError> {
    let not_found = || AppError::NotFound(format!("{} transaction {}", kind, id));

    let tx = match state.transactions.get_by_id(id).await {
        Ok(tx) => tx,
        Err(RepositoryError::NotFound(_)) => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };

    if tx.user_id != user_id || tx.kind() != kind {
        return Err(not_found());
    }

    Ok(tx)
}
