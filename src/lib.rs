//! Request dispatch across interchangeable replicas, with three strategies for
//! trading backend load against tail latency.
//!
//! - **Simple**: one attempt against one replica. The baseline.
//! - **Fanout**: one attempt per replica, all at once; the first success wins.
//! - **Hedged**: attempts issued one at a time in replica order, a fixed stagger delay
//!   apart, until one succeeds. Slow attempts are never abandoned early: whichever
//!   attempt completes first wins, even if a later one was issued after it.
//!
//! # Quick Start
//!
//! ```no_run
//! use hedged_requests::{DispatchConfig, Dispatcher, ReplicaEndpoint};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let replicas = vec![
//!     ReplicaEndpoint::new("a", "http://localhost:8090/ishealthy"),
//!     ReplicaEndpoint::new("b", "http://localhost:8091/ishealthy"),
//!     ReplicaEndpoint::new("c", "http://localhost:8092/ishealthy"),
//! ];
//!
//! // The stagger delay should be the measured p99 of a single replica.
//! let config = DispatchConfig::from_p99(replicas, Duration::from_millis(16));
//! let dispatcher = Dispatcher::new(config);
//!
//! let reply = dispatcher.hedged().await?;
//! println!("{} from {}", reply.payload_text(), reply.replica);
//! # Ok(())
//! # }
//! ```
//!
//! # Failure handling
//!
//! A failed attempt never wins. A call fails with [`DispatchError::AllFailed`] once
//! every attempt it issued has failed, and with [`DispatchError::Timeout`] when it
//! exceeds `overall_timeout`. Attempts still in flight when a call ends are cancelled.

pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod invoker;
pub mod latency;
pub mod replica;
pub mod router;

pub use config::{DispatchConfig, ReplicaEndpoint, ReplicaId};
pub use dispatcher::{Dispatcher, ReplicaStatsSnapshot, Strategy};
pub use errors::{AttemptError, DispatchError};
pub use invoker::{HttpInvoker, Invoker, Reply};
pub use latency::LatencyRecorder;
