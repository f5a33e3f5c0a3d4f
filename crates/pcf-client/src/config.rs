//! Configuration types for pcf-client.

use std::time::Duration;

/// Retry policy for idempotent GET requests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier for each retry.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given retry number (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }

    /// Check if we should retry after the given number of failed attempts.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts <= self.max_retries
    }
}

/// Configuration for connecting to the webhook server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the server (e.g., "http://localhost:8790").
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// GET retry policy.
    pub retry: RetryConfig,
}

impl ClientConfig {
    /// Create a new configuration with the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }

    /// Assortment read endpoint; the other per-assortment URLs extend it.
    pub fn assortment_url(&self, assortment_id: &str) -> String {
        format!(
            "{}/webhook/assortment/{}",
            self.base_url,
            urlencoding::encode(assortment_id)
        )
    }

    /// Image upload endpoint.
    pub fn images_url(&self, assortment_id: &str) -> String {
        format!("{}/images", self.assortment_url(assortment_id))
    }

    /// Batch image delete endpoint.
    pub fn delete_images_url(&self, assortment_id: &str) -> String {
        format!("{}/images/delete", self.assortment_url(assortment_id))
    }

    /// Single image replace endpoint.
    pub fn replace_image_url(&self, assortment_id: &str) -> String {
        format!("{}/images/replace", self.assortment_url(assortment_id))
    }

    /// User modifications endpoint.
    pub fn modifications_url(&self, assortment_id: &str) -> String {
        format!("{}/modifications", self.assortment_url(assortment_id))
    }

    /// Load metrics endpoint.
    pub fn load_url(&self, assortment_id: &str) -> String {
        format!("{}/load", self.assortment_url(assortment_id))
    }

    /// Get the health check endpoint URL.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:8790")
    }
}
