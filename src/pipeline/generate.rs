//! Image generation: drive one provider call with timeout and retry.
//!
//! Prompt wording lives in [`crate::prompts`] and wire formats live in
//! [`crate::provider`]. This stage decides how often to call and when to
//! give up.
//!
//! ## Retry Strategy
//!
//! Each attempt is bounded by `api_timeout_secs`. Only transient failures
//! ([`ProviderError::is_retryable`]) are retried, with exponential backoff
//! `retry_backoff_ms * 2^(attempt-1)`. A rate-limit answer carrying
//! `Retry-After` waits at least that long. A "no image" answer is returned
//! immediately.

use crate::config::IllustratorConfig;
use crate::error::{Pdf2ImgError, ProviderError};
use crate::provider::{GeneratedImage, ImageProvider};
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Upper bound on a server-requested rate-limit wait.
const MAX_RETRY_AFTER_SECS: u64 = 30;

/// A successful generation.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub image: GeneratedImage,
    /// Provider calls made, including the successful one.
    pub attempts: u32,
    pub duration_ms: u64,
}

/// Request one image for `prompt`, retrying transient failures.
pub async fn generate_image(
    provider: &dyn ImageProvider,
    prompt: &str,
    config: &IllustratorConfig,
) -> Result<GenerationOutcome, Pdf2ImgError> {
    let start = Instant::now();
    let per_attempt = Duration::from_secs(config.api_timeout_secs);
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        let result = match timeout(per_attempt, provider.generate(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                secs: config.api_timeout_secs,
            }),
        };

        let err = match result {
            Ok(image) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                debug!(
                    "{}: image received after {} attempt(s) in {}ms",
                    provider.name(),
                    attempts,
                    duration_ms
                );
                return Ok(GenerationOutcome {
                    image,
                    attempts,
                    duration_ms,
                });
            }
            Err(e) => e,
        };

        let retries_used = attempts - 1;
        if !err.is_retryable() || retries_used >= config.max_retries {
            if err.is_soft() {
                warn!("{}: no image produced: {}", provider.name(), err);
            } else {
                warn!(
                    "{}: attempt {} failed, giving up: {}",
                    provider.name(),
                    attempts,
                    err
                );
            }
            return Err(err.into_request_error(provider.name(), attempts));
        }

        let backoff = backoff_for(&err, attempts, config.retry_backoff_ms);
        warn!(
            "{}: attempt {} failed ({}), retry {}/{} after {}ms",
            provider.name(),
            attempts,
            err,
            attempts,
            config.max_retries,
            backoff.as_millis()
        );
        sleep(backoff).await;
    }
}

/// Delay before attempt `attempt + 1`.
fn backoff_for(err: &ProviderError, attempt: u32, base_ms: u64) -> Duration {
    let exponential = Duration::from_millis(base_ms.saturating_mul(2u64.pow(attempt - 1)));
    match err {
        ProviderError::RateLimited {
            retry_after_secs: Some(secs),
        } => exponential.max(Duration::from_secs((*secs).min(MAX_RETRY_AFTER_SECS))),
        _ => exponential,
    }
}
