//! Single attempts against a single replica.

use std::{borrow::Cow, sync::Arc, time::Duration};

use futures::{future::BoxFuture, FutureExt};
use tokio::time::Instant;

use crate::{
    config::{ReplicaEndpoint, ReplicaId},
    errors::AttemptError,
};

/// Successful outcome of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Origin label of the replica that served the payload.
    pub replica: ReplicaId,
    /// URL the attempt was sent to.
    pub url: String,
    /// Response body, untouched.
    pub payload: Vec<u8>,
    /// Time between issuing the attempt and reading the full body.
    pub elapsed: Duration,
}

impl Reply {
    pub fn payload_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Performs one attempt against one replica.
///
/// Implementations must report every failure as an [`AttemptError`]; a failed attempt
/// never produces a `Reply`. The returned future is spawned onto its own task by the
/// fanout and hedged strategies, so it has to own everything it touches.
pub trait Invoker: Send + Sync + 'static {
    fn invoke(&self, replica: ReplicaEndpoint) -> BoxFuture<'static, Result<Reply, AttemptError>>;
}

impl<T: Invoker + ?Sized> Invoker for Arc<T> {
    fn invoke(&self, replica: ReplicaEndpoint) -> BoxFuture<'static, Result<Reply, AttemptError>> {
        (**self).invoke(replica)
    }
}

/// Invoker issuing a plain `GET` to the replica URL.
#[derive(Debug, Clone)]
pub struct HttpInvoker {
    http_client: reqwest::Client,
}

impl HttpInvoker {
    pub fn new(attempt_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(attempt_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { http_client }
    }
}

impl Invoker for HttpInvoker {
    fn invoke(&self, replica: ReplicaEndpoint) -> BoxFuture<'static, Result<Reply, AttemptError>> {
        let http_client = self.http_client.clone();

        async move {
            let start = Instant::now();

            let response = http_client
                .get(&replica.url)
                .send()
                .await
                .map_err(|e| AttemptError::Connection {
                    url: replica.url.clone(),
                    message: e.to_string(),
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(AttemptError::Status {
                    url: replica.url,
                    status: status.as_u16(),
                });
            }

            let payload = response.bytes().await.map_err(|e| AttemptError::Body {
                url: replica.url.clone(),
                message: e.to_string(),
            })?;

            let elapsed = start.elapsed();
            tracing::debug!(
                replica = %replica.id,
                elapsed_ms = elapsed.as_millis() as u64,
                "attempt completed"
            );

            Ok(Reply {
                replica: replica.id,
                url: replica.url,
                payload: payload.to_vec(),
                elapsed,
            })
        }
        .boxed()
    }
}
