//! Payment notifications pushed by the gateway and their mapping onto
//! transaction statuses.

use serde::{Deserialize, Serialize};

use super::transaction::{StatusUpdate, TransactionStatus};

/// HTTP notification body sent by Midtrans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentNotification {
    pub order_id: String,
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
    pub gross_amount: String,
    #[serde(default)]
    pub status_code: Option<String>,
    #[serde(default)]
    pub signature_key: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub transaction_time: Option<String>,
    #[serde(default)]
    pub settlement_time: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub merchant_id: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// What a notification asks the reconciler to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationIntent {
    Update(StatusUpdate),
    /// Gateway state this service does not track (refunds, authorizations...).
    Ignore(String),
}

impl PaymentNotification {
    /// Maps the gateway's `(transaction_status, fraud_status)` pair to a status.
    pub fn resolve_status(&self) -> Option<TransactionStatus> {
        let fraud = self.fraud_status.as_deref();
        match self.transaction_status.as_str() {
            "capture" => match fraud {
                Some("accept") => Some(TransactionStatus::Paid),
                Some("challenge") => Some(TransactionStatus::Challenge),
                Some("reject") | Some("deny") => Some(TransactionStatus::Rejected),
                _ => None,
            },
            "settlement" => Some(TransactionStatus::Paid),
            "deny" => Some(TransactionStatus::Rejected),
            "cancel" | "expire" => Some(TransactionStatus::Canceled),
            "pending" => Some(TransactionStatus::Pending),
            _ => None,
        }
    }

    pub fn intent(&self) -> NotificationIntent {
        match self.resolve_status() {
            Some(status) => NotificationIntent::Update(StatusUpdate {
                status,
                payment_method: self
                    .payment_type
                    .as_ref()
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty()),
            }),
            None => NotificationIntent::Ignore(format!(
                "unhandled transaction_status={} fraud_status={}",
                self.transaction_status,
                self.fraud_status.as_deref().unwrap_or("-")
            )),
        }
    }
}
