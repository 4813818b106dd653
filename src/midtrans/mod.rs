pub mod client;
pub mod signature;

pub use client::MidtransClient;
pub use signature::{SignatureError, SignatureVerifier};
