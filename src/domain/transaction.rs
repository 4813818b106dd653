//! Transaction domain entity.
//! Framework-agnostic representation of a purchase attempt and its payment status.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Which purchase flow created a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Product,
    Event,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Product => "product",
            TransactionKind::Event => "event",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product" => Ok(TransactionKind::Product),
            "event" => Ok(TransactionKind::Event),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

/// Payment status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Challenge,
    Paid,
    Rejected,
    Canceled,
}

/// How a target status relates to the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Moves further along the lifecycle and may be applied.
    Advance,
    /// Re-asserts the current status.
    Replay,
    /// Would move backwards or sideways out of a terminal status.
    Regress,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 5] = [
        TransactionStatus::Pending,
        TransactionStatus::Challenge,
        TransactionStatus::Paid,
        TransactionStatus::Rejected,
        TransactionStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Challenge => "challenge",
            TransactionStatus::Paid => "paid",
            TransactionStatus::Rejected => "rejected",
            TransactionStatus::Canceled => "canceled",
        }
    }

    /// Position in the lifecycle. Updates are only applied when the rank grows.
    pub fn rank(&self) -> i32 {
        match self {
            TransactionStatus::Pending => 0,
            TransactionStatus::Challenge => 1,
            TransactionStatus::Paid | TransactionStatus::Rejected | TransactionStatus::Canceled => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Paid | TransactionStatus::Rejected | TransactionStatus::Canceled
        )
    }

    pub fn transition_to(&self, target: TransactionStatus) -> Transition {
        if *self == target {
            Transition::Replay
        } else if target.rank() > self.rank() {
            Transition::Advance
        } else {
            Transition::Regress
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownValue(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value: {0}")]
pub struct UnknownValue(pub String);

/// Ticket buyer details. Captured at creation and never derived from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerInfo {
    pub identity_number: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

/// What was bought.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseSubject {
    Cart {
        cart_id: Uuid,
    },
    EventTicket {
        event_price_id: Uuid,
        quantity: i32,
        buyer: BuyerInfo,
    },
}

impl PurchaseSubject {
    pub fn kind(&self) -> TransactionKind {
        match self {
            PurchaseSubject::Cart { .. } => TransactionKind::Product,
            PurchaseSubject::EventTicket { .. } => TransactionKind::Event,
        }
    }
}

/// A priced purchase that has not been sent to the payment gateway yet.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject: PurchaseSubject,
    pub total_amount: BigDecimal,
}

impl TransactionDraft {
    pub fn new(user_id: Uuid, subject: PurchaseSubject, total_amount: BigDecimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            subject,
            total_amount,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        self.subject.kind()
    }

    /// Binds the draft to the checkout session issued by the gateway.
    pub fn into_transaction(self, checkout_url: String, gateway_token: String) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: self.id,
            user_id: self.user_id,
            subject: self.subject,
            total_amount: self.total_amount,
            status: TransactionStatus::Pending,
            payment_method: None,
            checkout_url,
            gateway_token,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Domain entity representing a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject: PurchaseSubject,
    pub total_amount: BigDecimal,
    pub status: TransactionStatus,
    pub payment_method: Option<String>,
    pub checkout_url: String,
    pub gateway_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn kind(&self) -> TransactionKind {
        self.subject.kind()
    }

    pub fn buyer(&self) -> Option<&BuyerInfo> {
        match &self.subject {
            PurchaseSubject::EventTicket { buyer, .. } => Some(buyer),
            PurchaseSubject::Cart { .. } => None,
        }
    }
}

/// Status and payment method reported for a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: TransactionStatus,
    pub payment_method: Option<String>,
}

/// Result of applying a [`StatusUpdate`] through the monotonic guard.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    Applied(Transaction),
    Unchanged(Transaction),
    Stale(Transaction),
}

impl StatusChange {
    pub fn transaction(&self) -> &Transaction {
        match self {
            StatusChange::Applied(tx) | StatusChange::Unchanged(tx) | StatusChange::Stale(tx) => tx,
        }
    }
}
