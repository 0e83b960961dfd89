//! Transport-level retries for the collector's JSON-RPC client.
//!
//! Failed requests are re-sent after a backoff that doubles on every attempt,
//! capped at [`MAX_BACKOFF`]. Only transport errors are retried; a JSON-RPC
//! error response (e.g. an unknown transaction) is returned as is.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use alloy::{
    providers::{ProviderBuilder, RootProvider},
    rpc::{
        client::ClientBuilder,
        json_rpc::{RequestPacket, ResponsePacket},
    },
    transports::{http::ReqwestTransport, TransportError},
};
use tower::{retry::Policy, Layer, Service};
use tracing::debug;

/// Upper bound on a single backoff sleep.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct BackoffPolicy {
    base: Duration,
    attempt: u32,
    max_retries: u32,
}

impl BackoffPolicy {
    pub const fn new(base: Duration, max_retries: u32) -> Self {
        Self {
            base,
            attempt: 0,
            max_retries,
        }
    }

    /// Sleep before retry number `attempt + 1`.
    pub fn delay(&self) -> Duration {
        self.base
            .saturating_mul(1u32.checked_shl(self.attempt).unwrap_or(u32::MAX))
            .min(MAX_BACKOFF)
    }
}

impl Policy<RequestPacket, ResponsePacket, TransportError> for BackoffPolicy {
    type Future = Pin<Box<dyn Future<Output = Self> + Send + 'static>>;

    fn retry(
        &self,
        _req: &RequestPacket,
        result: Result<&ResponsePacket, &TransportError>,
    ) -> Option<Self::Future> {
        let err = result.err()?;
        if self.attempt >= self.max_retries {
            return None;
        }
        let delay = self.delay();
        debug!(attempt = self.attempt + 1, ?delay, "retrying rpc request: {err}");

        let mut next = self.clone();
        next.attempt += 1;
        Some(Box::pin(async move {
            tokio::time::sleep(delay).await;
            next
        }))
    }

    fn clone_request(&self, req: &RequestPacket) -> Option<RequestPacket> {
        Some(req.clone())
    }
}

#[derive(Debug)]
pub struct RetryLayer {
    policy: BackoffPolicy,
}

impl RetryLayer {
    pub const fn new(policy: BackoffPolicy) -> Self {
        Self { policy }
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService {
            inner,
            policy: self.policy.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryService<S> {
    inner: S,
    policy: BackoffPolicy,
}

impl<S> Service<RequestPacket> for RetryService<S>
where
    S: Service<RequestPacket, Response = ResponsePacket, Error = TransportError>
        + Send
        + 'static
        + Clone,
    S::Future: Send + 'static,
{
    type Response = ResponsePacket;
    type Error = TransportError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: RequestPacket) -> Self::Future {
        // The clone may not be ready; keep the polled service for this call.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let mut policy = self.policy.clone();

        Box::pin(async move {
            let mut res = inner.call(req.clone()).await;
            while let Some(next) = policy.retry(&req, res.as_ref()) {
                policy = next.await;
                res = inner.call(req.clone()).await;
            }
            res
        })
    }
}

/// HTTP provider whose requests go through [`RetryLayer`].
pub fn build_http_retry_provider(
    rpc_url: url::Url,
    backoff: Duration,
    max_retries: u32,
) -> RootProvider<RetryService<ReqwestTransport>> {
    let layer = RetryLayer::new(BackoffPolicy::new(backoff, max_retries));
    let client = ClientBuilder::default().layer(layer).http(rpc_url);
    ProviderBuilder::new().on_client(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let mut policy = BackoffPolicy::new(Duration::from_millis(100), 10);
        let mut delays = Vec::new();
        for _ in 0..4 {
            delays.push(policy.delay());
            policy.attempt += 1;
        }
        assert_eq!(
            delays,
            [100, 200, 400, 800].map(Duration::from_millis).to_vec()
        );

        policy.attempt = 40;
        assert_eq!(policy.delay(), MAX_BACKOFF);
    }

    #[test]
    fn zero_backoff_stays_zero() {
        let policy = BackoffPolicy::new(Duration::ZERO, 3);
        assert_eq!(policy.delay(), Duration::ZERO);
    }
}
