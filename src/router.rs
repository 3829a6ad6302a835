//! HTTP front door mapping each path to one dispatch strategy.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use crate::{
    dispatcher::{Dispatcher, ReplicaStatsSnapshot, Strategy},
    errors::DispatchError,
    invoker::{Invoker, Reply},
};

/// Origin label of the winning replica.
pub const REPLICA_HEADER: &str = "x-replica";
/// Elapsed milliseconds of the winning attempt.
pub const ATTEMPT_MS_HEADER: &str = "x-attempt-ms";

type SharedDispatcher<I> = Arc<Dispatcher<I>>;

/// Builds the routes: `GET /simple`, `GET /fanout`, `GET /hedged` and `GET /stats`.
pub fn router<I: Invoker>(dispatcher: Dispatcher<I>) -> Router {
    Router::new()
        .route("/simple", get(simple::<I>))
        .route("/fanout", get(fanout::<I>))
        .route("/hedged", get(hedged::<I>))
        .route("/stats", get(stats::<I>))
        .with_state(Arc::new(dispatcher))
}

async fn simple<I: Invoker>(State(dispatcher): State<SharedDispatcher<I>>) -> Response {
    run(&dispatcher, Strategy::Simple).await
}

async fn fanout<I: Invoker>(State(dispatcher): State<SharedDispatcher<I>>) -> Response {
    run(&dispatcher, Strategy::Fanout).await
}

async fn hedged<I: Invoker>(State(dispatcher): State<SharedDispatcher<I>>) -> Response {
    run(&dispatcher, Strategy::Hedged).await
}

async fn stats<I: Invoker>(
    State(dispatcher): State<SharedDispatcher<I>>,
) -> Json<BTreeMap<String, ReplicaStatsSnapshot>> {
    let snapshot = dispatcher
        .replica_stats()
        .into_iter()
        .map(|(id, s)| (id.to_string(), s))
        .collect();

    Json(snapshot)
}

async fn run<I: Invoker>(dispatcher: &Dispatcher<I>, strategy: Strategy) -> Response {
    tracing::info!(%strategy, "executing {strategy} request");

    match dispatcher.dispatch(strategy).await {
        Ok(reply) => reply_response(reply),
        Err(e) => (error_status(&e), e.to_string()).into_response(),
    }
}

fn reply_response(reply: Reply) -> Response {
    let body = format!("{} from {}", reply.payload_text(), reply.url);
    let headers = [
        (REPLICA_HEADER, reply.replica.to_string()),
        (ATTEMPT_MS_HEADER, reply.elapsed.as_millis().to_string()),
    ];

    (StatusCode::OK, headers, body).into_response()
}

fn error_status(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::NoReplicas => StatusCode::SERVICE_UNAVAILABLE,
        DispatchError::AllFailed(_) => StatusCode::BAD_GATEWAY,
        DispatchError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
    }
}
