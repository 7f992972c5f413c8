//! # Stream Retry
//!
//! Wraps a provider's stream method with exponential backoff retry logic.
//!
//! **Key constraint**: Retries are only possible if no data has been yielded yet.
//! Once the first [`StreamEvent`] is emitted to the caller, the stream cannot be
//! restarted (the caller may have already acted on the events).
//!
//! The retry wrapper:
//! 1. Calls the stream factory
//! 2. If it fails before yielding any data, waits with backoff and retries
//! 3. Emits [`StreamEvent::Retry`] events before each retry wait
//! 4. Respects cancellation via `CancellationToken`
//!
//! [`StreamEvent`]: tron_core::StreamEvent

use std::future::Future;
use std::pin::Pin;

use futures::Stream;
use tokio_util::sync::CancellationToken;
use tron_core::events::{RetryErrorInfo, StreamEvent};
use tron_core::retry::RetryConfig;

use crate::provider::{ProviderError, StreamEventStream};

/// Configuration for stream retry behavior.
#[derive(Clone, Debug)]
pub struct StreamRetryConfig {
    /// Base retry config (max retries, backoff, jitter).
    pub retry: RetryConfig,
    /// Whether to emit [`StreamEvent::Retry`] events before each retry.
    pub emit_retry_events: bool,
    /// Cancellation token for aborting retries.
    pub cancel_token: Option<CancellationToken>,
}

impl Default for StreamRetryConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            emit_retry_events: true,
            cancel_token: None,
        }
    }
}

/// Type alias for the stream factory function.
///
/// Called on each retry attempt to create a new stream.
pub type StreamFactory = Box<
    dyn Fn() -> Pin<
            Box<
                dyn Future<
                        Output = Result<
                            Pin<Box<dyn Stream<Item = Result<StreamEvent, ProviderError>> + Send>>,
                            ProviderError,
                        >,
                    > + Send,
            >,
        > + Send,
>;

/// Wrap a stream factory with retry logic.
///
/// Returns a new stream that transparently retries on failure. The retry
/// is only attempted if no events have been yielded yet — once data starts
/// flowing, errors are passed through to the caller.
///
/// # Arguments
///
/// * `factory` - Creates a new stream on each attempt.
/// * `config` - Retry configuration.
pub fn with_provider_retry(
    factory: StreamFactory,
    config: StreamRetryConfig,
) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, ProviderError>> + Send>> {
    use futures::StreamExt;

    type Item = Result<StreamEvent, ProviderError>;

    #[allow(unused_assignments)] // has_yielded is read in the Err branch after Ok sets it
    Box::pin(async_stream::stream! {
        let max_retries = config.retry.max_retries;
        let mut attempt = 0u32;
        let mut has_yielded = false;

        loop {
            let stream_result: Result<StreamEventStream, ProviderError> = factory().await;
            match stream_result {
                Ok(inner) => {
                    let mut inner = std::pin::pin!(inner);
                    while let Some(item) = StreamExt::next(&mut inner).await {
                        has_yielded = true;
                        let v: Item = item;
                        yield v;
                    }
                    // Stream completed normally
                    break;
                }
                Err(err) => {
                    if has_yielded {
                        let v: Item = Err(err);
                        yield v;
                        break;
                    }

                    if !err.is_retryable() || attempt >= max_retries {
                        let v: Item = Err(err);
                        yield v;
                        break;
                    }

                    // Check cancellation
                    if let Some(ref token) = config.cancel_token {
                        if token.is_cancelled() {
                            let v: Item = Err(ProviderError::Cancelled);
                            yield v;
                            break;
                        }
                    }

                    attempt += 1;
                    let backoff_ms = tron_core::retry::calculate_backoff_delay(
                        attempt,
                        config.retry.base_delay_ms,
                        config.retry.max_delay_ms,
                        config.retry.jitter_factor,
                    );
                    // Respect Retry-After header if available (use the larger value)
                    let delay_ms = err.retry_after_ms().map_or(backoff_ms, |ra| backoff_ms.max(ra));

                    // Record retry metric
                    metrics::counter!("provider_retries_total", "category" => err.category().to_string()).increment(1);

                    // Emit retry event
                    if config.emit_retry_events {
                        let v: Item = Ok(StreamEvent::Retry {
                            attempt,
                            max_retries,
                            delay_ms,
                            error: RetryErrorInfo {
                                category: err.category().to_string(),
                                message: err.to_string(),
                                is_retryable: true,
                            },
                        });
                        yield v;
                    }

                    // Wait with cancellation support
                    if let Some(ref token) = config.cancel_token {
                        tokio::select! {
                            () = tokio::time::sleep(std::time::Duration::from_millis(delay_ms)) => {}
                            () = token.cancelled() => {
                                let v: Item = Err(ProviderError::Cancelled);
                                yield v;
                                break;
                            }
                        }
                    } else {
                        tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                    }
                }
            }
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
