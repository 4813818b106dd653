pub mod notification;
pub mod transaction;

pub use notification::{NotificationIntent, PaymentNotification};
pub use transaction::{
    BuyerInfo, PurchaseSubject, StatusChange, StatusUpdate, Transaction, TransactionDraft,
    TransactionKind, TransactionStatus, Transition,
};
