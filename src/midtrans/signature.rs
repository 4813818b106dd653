//! Midtrans notification signatures.
//!
//! `signature_key = hex(SHA512(order_id + status_code + gross_amount + server_key))`

use sha2::{Digest, Sha512};

use crate::domain::PaymentNotification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("notification is missing signature_key")]
    MissingSignature,

    #[error("notification is missing status_code")]
    MissingStatusCode,

    #[error("signature_key is not valid hex")]
    InvalidFormat,

    #[error("signature verification failed")]
    Mismatch,
}

/// Computes the expected signature for the given notification fields.
pub fn sign(order_id: &str, status_code: &str, gross_amount: &str, server_key: &str) -> String {
    hex::encode(digest(order_id, status_code, gross_amount, server_key))
}

fn digest(order_id: &str, status_code: &str, gross_amount: &str, server_key: &str) -> Vec<u8> {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hasher.finalize().to_vec()
}

#[derive(Clone)]
pub struct SignatureVerifier {
    server_key: String,
}

impl SignatureVerifier {
    pub fn new(server_key: impl Into<String>) -> Self {
        Self {
            server_key: server_key.into(),
        }
    }

    pub fn verify(&self, notification: &PaymentNotification) -> Result<(), SignatureError> {
        let provided = notification
            .signature_key
            .as_deref()
            .ok_or(SignatureError::MissingSignature)?;
        let status_code = notification
            .status_code
            .as_deref()
            .ok_or(SignatureError::MissingStatusCode)?;

        let provided = hex::decode(provided.trim()).map_err(|_| SignatureError::InvalidFormat)?;

        let expected = digest(
            &notification.order_id,
            status_code,
            &notification.gross_amount,
            &self.server_key,
        );

        if constant_time_eq(&expected, &provided) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
