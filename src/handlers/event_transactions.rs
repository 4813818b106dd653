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
use crate::domain::{BuyerInfo, PurchaseSubject, Transaction, TransactionKind, TransactionStatus};
use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::services::EventPurchase;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventTransactionRequest {
    pub event_price_id: Uuid,
    pub quantity: i32,
    pub identity_number: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerInformation {
    pub identity_number: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

impl From<BuyerInfo> for BuyerInformation {
    fn from(buyer: BuyerInfo) -> Self {
        Self {
            identity_number: buyer.identity_number,
            full_name: buyer.full_name,
            email: buyer.email,
            phone: buyer.phone,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTransactionResponse {
    pub id: Uuid,
    pub event_price_id: Uuid,
    pub quantity: i32,
    pub user_id: Uuid,
    pub buyer_information: BuyerInformation,
    pub total_amount: BigDecimal,
    pub transaction_status: TransactionStatus,
    pub payment_method: Option<String>,
    #[serde(rename = "snapURL")]
    pub snap_url: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<Transaction> for EventTransactionResponse {
    type Error = AppError;

    fn try_from(tx: Transaction) -> Result<Self, Self::Error> {
        let (event_price_id, quantity, buyer) = match tx.subject {
            PurchaseSubject::EventTicket {
                event_price_id,
                quantity,
                buyer,
            } => (event_price_id, quantity, buyer),
            PurchaseSubject::Cart { .. } => {
                return Err(AppError::NotFound(format!("event transaction {}", tx.id)))
            }
        };

        Ok(Self {
            id: tx.id,
            event_price_id,
            quantity,
            user_id: tx.user_id,
            buyer_information: buyer.into(),
            total_amount: tx.total_amount,
            transaction_status: tx.status,
            payment_method: tx.payment_method,
            snap_url: tx.checkout_url,
            created_at: tx.created_at,
        })
    }
}

pub async fn create_event_transaction(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<CreateEventTransactionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;

    let purchase = EventPurchase {
        event_price_id: payload.event_price_id,
        quantity: payload.quantity,
        buyer: BuyerInfo {
            identity_number: payload.identity_number,
            full_name: payload.full_name,
            email: payload.email,
            phone: payload.phone,
        },
    };

    let tx = state
        .creator
        .create_event_transaction(user.user_id, purchase)
        .await?;

    Ok((StatusCode::CREATED, Json(EventTransactionResponse::try_from(tx)?)))
}

pub async fn get_event_transaction(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<EventTransactionResponse>, AppError> {
    let Path(id) = id?;
    let tx = load_owned(&state, user.user_id, id, TransactionKind::Event).await?;
    Ok(Json(EventTransactionResponse::try_from(tx)?))
}
