//! Dispatch call execution for the TUI dashboard.

use std::time::Instant;

use hedged_requests::{DispatchError, Reply, Strategy};
use tokio::sync::mpsc;

use crate::app::{App, AppEvent};

/// Spawns a dispatch call with the app's current strategy and replica count.
///
/// The call runs in a background task and reports through the provided channel.
pub fn spawn_dispatch(app: &App, tx: mpsc::UnboundedSender<AppEvent>) {
    let strategy = app.strategy;
    let dispatcher = app.dispatcher.clone();
    let replicas = app.active_replicas().to_vec();
    let stagger = app.stagger_delay();

    tokio::spawn(async move {
        let start = Instant::now();

        let result: Result<Reply, DispatchError> = match strategy {
            Strategy::Simple => match replicas.first() {
                Some(replica) => dispatcher.dispatch_simple(replica).await,
                None => Err(DispatchError::NoReplicas),
            },
            Strategy::Fanout => dispatcher.dispatch_fanout(&replicas).await,
            Strategy::Hedged => dispatcher.dispatch_hedged(&replicas, stagger).await,
        };

        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        let (replica, ok, message) = match result {
            Ok(reply) => {
                let message = format!("{} from {}", reply.payload_text(), reply.replica);
                (Some(reply.replica), true, message)
            }
            Err(e) => (None, false, e.to_string()),
        };

        let _ = tx.send(AppEvent::DispatchFinished {
            strategy,
            replica,
            latency_ms,
            ok,
            message,
        });
    });
}
