//! Shared outbound HTTP client construction

use std::time::Duration;

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};

use crate::{Result, SeaguardError};

const USER_AGENT: &str = concat!("SeaGuard/", env!("CARGO_PKG_VERSION"));

/// How long an outbound call may take
#[derive(Debug, Clone, Copy)]
pub enum Deadline {
    /// Whole request, body included
    Total(Duration),
    /// Connect plus each individual read; suits long-lived streams
    PerRead(Duration),
}

/// Build a client that retries transient failures (connect errors, 5xx, 429)
/// with exponential backoff
pub fn build_client(deadline: Deadline, max_retries: u32) -> Result<ClientWithMiddleware> {
    let builder = reqwest::Client::builder().user_agent(USER_AGENT);
    let builder = match deadline {
        Deadline::Total(timeout) => builder.timeout(timeout),
        Deadline::PerRead(timeout) => builder.connect_timeout(timeout).read_timeout(timeout),
    };
    let client = builder
        .build()
        .map_err(|e| SeaguardError::internal(format!("Failed to create HTTP client: {e}")))?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
    Ok(ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}
