use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ports::{CheckoutSession, CustomerDetails, GatewayError, PaymentGateway, SessionRequest};

const SNAP_TRANSACTIONS_PATH: &str = "/snap/v1/transactions";

/// Body of a Snap `create transaction` request.
#[derive(Debug, Clone, Serialize)]
pub struct SnapRequest {
    pub transaction_details: SnapTransactionDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_details: Option<CustomerDetails>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapTransactionDetails {
    pub order_id: String,
    pub gross_amount: i64,
}

/// Response from Snap. Both fields are optional because partial bodies happen.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapResponse {
    pub token: Option<String>,
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub error_messages: Vec<String>,
}

/// HTTP client for the Midtrans Snap hosted checkout API
#[derive(Clone)]
pub struct MidtransClient {
    client: Client,
    base_url: String,
    server_key: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl MidtransClient {
    /// Creates a new MidtransClient for the given Snap base URL
    pub fn new(base_url: String, server_key: String) -> Self {
        Self::with_circuit_breaker(base_url, server_key, 3, 60)
    }

    /// Creates a new MidtransClient with custom circuit breaker configuration
    pub fn with_circuit_breaker(
        base_url: String,
        server_key: String,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        MidtransClient {
            client,
            base_url,
            server_key,
            circuit_breaker,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    /// Builds the Snap request body. IDR amounts must be whole numbers.
    pub fn build_request(request: &SessionRequest) -> Result<SnapRequest, GatewayError> {
        let amount = &request.gross_amount;
        if amount.with_scale(0) != *amount {
            return Err(GatewayError::InvalidAmount(format!("{amount} has a fractional part")));
        }

        let gross_amount = amount
            .with_scale(0)
            .to_string()
            .parse::<i64>()
            .ok()
            .filter(|value| *value > 0)
            .ok_or_else(|| GatewayError::InvalidAmount(amount.to_string()))?;

        Ok(SnapRequest {
            transaction_details: SnapTransactionDetails {
                order_id: request.order_id.to_string(),
                gross_amount,
            },
            customer_details: request.customer.clone(),
        })
    }

    /// Opens a hosted checkout session
    pub async fn create_transaction(&self, request: &SessionRequest) -> Result<CheckoutSession, GatewayError> {
        let body = Self::build_request(request)?;
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), SNAP_TRANSACTIONS_PATH);
        let client = self.client.clone();
        let server_key = self.server_key.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .post(&url)
                    .basic_auth(server_key, None::<&str>)
                    .header(reqwest::header::ACCEPT, "application/json")
                    .json(&body)
                    .send()
                    .await?;

                let status = response.status();
                let text = response.text().await?;
                let snap = serde_json::from_str::<SnapResponse>(&text).unwrap_or_default();

                if !status.is_success() {
                    let message = if snap.error_messages.is_empty() {
                        text
                    } else {
                        snap.error_messages.join("; ")
                    };
                    return Err(GatewayError::Rejected {
                        status: status.as_u16(),
                        message,
                    });
                }

                match (snap.token, snap.redirect_url) {
                    (Some(token), Some(redirect_url))
                        if !token.trim().is_empty() && !redirect_url.trim().is_empty() =>
                    {
                        Ok(CheckoutSession { token, redirect_url })
                    }
                    _ => Err(GatewayError::EmptyResponse),
                }
            })
            .await;

        match result {
            Ok(session) => Ok(session),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitBreakerOpen(
                "Midtrans circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

#[async_trait]
impl PaymentGateway for MidtransClient {
    async fn create_session(&self, request: &SessionRequest) -> Result<CheckoutSession, GatewayError> {
        self.create_transaction(request).await
    }
}
