pub mod reconciler;
pub mod transaction_creator;

pub use reconciler::{ReconcileError, ReconcileOutcome, WebhookReconciler};
pub use transaction_creator::{
    CreateError, EventPurchase, ProductPurchase, TransactionCreator, DEFAULT_MARKER_TTL,
};
