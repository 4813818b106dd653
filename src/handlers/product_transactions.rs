use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::load_owned;
use crate::domain::{PurchaseSubject, Transaction, TransactionKind, TransactionStatus};
use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::services::ProductPurchase;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductTransactionRequest {
    pub cart_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductTransactionResponse {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub user_id: Uuid,
    pub total_amount: BigDecimal,
    pub transaction_status: TransactionStatus,
    pub payment_method: Option<String>,
    #[serde(rename = "snapURL")]
    pub snap_url: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<Transaction> for ProductTransactionResponse {
    type Error = AppError;

    fn try_from(tx: Transaction) -> Result<Self, Self::Error> {
        let cart_id = match tx.subject {
            PurchaseSubject::Cart { cart_id } => cart_id,
            PurchaseSubject::EventTicket { .. } => {
                return Err(AppError::NotFound(format!("product transaction {}", tx.id)))
            }
        };

        Ok(Self {
            id: tx.id,
            cart_id,
            user_id: tx.user_id,
            total_amount: tx.total_amount,
            transaction_status: tx.status,
            payment_method: tx.payment_method,
            snap_url: tx.checkout_url,
            created_at: tx.created_at,
        })
    }
}

pub async fn create_product_transaction(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<CreateProductTransactionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;

    let tx = state
        .creator
        .create_product_transaction(
            user.user_id,
            ProductPurchase {
                cart_id: payload.cart_id,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ProductTransactionResponse::try_from(tx)?)))
}

pub async fn get_product_transaction(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ProductTransactionResponse>, AppError> {
    let Path(id) = id?;
    let tx = load_owned(&state, user.user_id, id, TransactionKind::Product).await?;
    Ok(Json(ProductTransactionResponse::try_from(tx)?))
}
