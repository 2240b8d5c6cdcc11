use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, RETRY_AFTER},
    Client,
    StatusCode,
};

use crate::{AccrualApiError, AccrualConfig, AccrualLookup, AccrualOutcome};

#[derive(Clone)]
pub struct AccrualApi {
    config: AccrualConfig,
    client: Arc<Client>,
}

impl AccrualApi {
    pub fn new(config: AccrualConfig) -> Result<Self, AccrualApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AccrualApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &AccrualConfig {
        &self.config
    }

    pub fn url(&self, order_number: &str) -> String {
        format!("{}/api/orders/{order_number}", self.config.base_url)
    }

    /// Asks the accrual service for the current state of a single order.
    ///
    /// * `200` yields the decoded outcome.
    /// * `204` means the service has not seen the order yet, and yields a `NEW` outcome.
    /// * `429` yields [`AccrualApiError::RateLimited`] carrying the `Retry-After` wait.
    /// * `5xx`, transport failures and undecodable bodies yield transient errors.
    pub async fn fetch_order_accrual(&self, order_number: &str) -> Result<AccrualOutcome, AccrualApiError> {
        let url = self.url(order_number);
        trace!("📡️ Sending accrual query: {url}");
        let response = self.client.get(url).send().await.map_err(|e| {
            debug!("📡️ Accrual query for {order_number} failed. {e}");
            AccrualApiError::Transport(e.to_string())
        })?;
        let status = response.status();
        match status {
            StatusCode::OK => {
                let outcome = response
                    .json::<AccrualOutcome>()
                    .await
                    .map_err(|e| AccrualApiError::JsonError(e.to_string()))?
                    .normalized();
                if outcome.order != order_number {
                    warn!("📡️ Accrual service answered query for {order_number} with order {}", outcome.order);
                }
                trace!("📡️ Order {order_number} is {}", outcome.status);
                Ok(outcome)
            },
            StatusCode::NO_CONTENT => {
                trace!("📡️ Order {order_number} is not registered with the accrual service");
                Ok(AccrualOutcome::unregistered(order_number))
            },
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = parse_retry_after(response.headers()).unwrap_or_else(|| {
                    warn!(
                        "📡️ Accrual service rate limited us without a usable Retry-After header. Waiting {}s.",
                        self.config.default_retry_after.as_secs_f64()
                    );
                    self.config.default_retry_after
                });
                debug!("📡️ Accrual service is rate limiting. Retry after {}s", retry_after.as_secs_f64());
                Err(AccrualApiError::RateLimited { retry_after })
            },
            s if s.is_server_error() => {
                let message = response.text().await.unwrap_or_default();
                Err(AccrualApiError::ServerError { status: s.as_u16(), message })
            },
            s => {
                let message = response.text().await.unwrap_or_default();
                Err(AccrualApiError::UnexpectedStatus { status: s.as_u16(), message })
            },
        }
    }
}

impl AccrualLookup for AccrualApi {
    async fn lookup(&self, order_number: &str) -> Result<AccrualOutcome, AccrualApiError> {
        self.fetch_order_accrual(order_number).await
    }
}

/// `Retry-After` is given in whole seconds by the accrual service.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
