//! Strategy behavior against a scripted invoker on a paused clock.
//!
//! Every replica gets a fixed behavior (reply after a delay, fail after a delay, or
//! never answer), so issue times and winners are exact.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use futures::{future::BoxFuture, FutureExt};
use hedged_requests::{
    AttemptError, DispatchConfig, DispatchError, Dispatcher, Invoker, ReplicaEndpoint, ReplicaId,
    Reply,
};
use tokio::time::Instant;

#[derive(Clone)]
enum Behavior {
    Reply(Duration),
    Fail(Duration),
    Hang,
}

#[derive(Clone, Default)]
struct ScriptedInvoker {
    behaviors: Arc<HashMap<String, Behavior>>,
    issued: Arc<Mutex<Vec<(String, Instant)>>>,
    completed: Arc<AtomicUsize>,
}

impl ScriptedInvoker {
    fn new(behaviors: &[(&str, Behavior)]) -> Self {
        Self {
            behaviors: Arc::new(
                behaviors
                    .iter()
                    .map(|(id, b)| (id.to_string(), b.clone()))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    fn issued_ids(&self) -> Vec<String> {
        self.issued.lock().unwrap().iter().map(|(id, _)| id.clone()).collect()
    }

    fn issued_at(&self, id: &str) -> Option<Instant> {
        self.issued
            .lock()
            .unwrap()
            .iter()
            .find(|(issued, _)| issued == id)
            .map(|(_, at)| *at)
    }

    fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

impl Invoker for ScriptedInvoker {
    fn invoke(&self, replica: ReplicaEndpoint) -> BoxFuture<'static, Result<Reply, AttemptError>> {
        self.issued
            .lock()
            .unwrap()
            .push((replica.id.to_string(), Instant::now()));

        let behavior = self
            .behaviors
            .get(replica.id.as_str())
            .cloned()
            .unwrap_or(Behavior::Hang);
        let completed = Arc::clone(&self.completed);

        async move {
            match behavior {
                Behavior::Reply(latency) => {
                    tokio::time::sleep(latency).await;
                    completed.fetch_add(1, Ordering::SeqCst);
                    Ok(Reply {
                        replica: replica.id,
                        url: replica.url,
                        payload: b"Healthy".to_vec(),
                        elapsed: latency,
                    })
                }
                Behavior::Fail(after) => {
                    tokio::time::sleep(after).await;
                    completed.fetch_add(1, Ordering::SeqCst);
                    Err(AttemptError::Connection {
                        url: replica.url,
                        message: "connection refused".into(),
                    })
                }
                Behavior::Hang => futures::future::pending().await,
            }
        }
        .boxed()
    }
}

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

fn endpoints(ids: &[&str]) -> Vec<ReplicaEndpoint> {
    ids.iter()
        .map(|id| ReplicaEndpoint::new(*id, format!("http://{id}/ishealthy")))
        .collect()
}

fn dispatcher(invoker: &ScriptedInvoker, ids: &[&str]) -> Dispatcher<ScriptedInvoker> {
    let cfg = DispatchConfig::new(endpoints(ids))
        .with_stagger_delay(ms(16))
        .with_overall_timeout(ms(1_000));
    Dispatcher::with_invoker(cfg, invoker.clone())
}

fn assert_between(actual: Duration, low: Duration, high: Duration) {
    assert!(
        actual >= low && actual < high,
        "expected {actual:?} in [{low:?}, {high:?})"
    );
}

// Scenario A: the stagger fires before the primary answers, the backup is issued, and
// the primary still wins because it resolves first.
#[tokio::test(start_paused = true)]
async fn hedged_primary_wins_after_backup_issued() {
    let invoker = ScriptedInvoker::new(&[
        ("a", Behavior::Reply(ms(20))),
        ("b", Behavior::Reply(ms(5))),
        ("c", Behavior::Reply(ms(50))),
    ]);
    let d = dispatcher(&invoker, &["a", "b", "c"]);

    let start = Instant::now();
    let reply = d.hedged().await.unwrap();

    assert_eq!(reply.replica, ReplicaId::from("a"));
    assert_between(start.elapsed(), ms(20), ms(21));
    assert_eq!(invoker.issued_ids(), vec!["a", "b"]);
    assert_between(invoker.issued_at("b").unwrap() - start, ms(16), ms(17));
}

// Scenario B: the primary answers before the stagger delay, no backup is issued.
#[tokio::test(start_paused = true)]
async fn hedged_fast_primary_issues_nothing_else() {
    let invoker = ScriptedInvoker::new(&[
        ("a", Behavior::Reply(ms(10))),
        ("b", Behavior::Reply(ms(5))),
        ("c", Behavior::Reply(ms(50))),
    ]);
    let d = dispatcher(&invoker, &["a", "b", "c"]);

    let start = Instant::now();
    let reply = d.hedged().await.unwrap();

    assert_eq!(reply.replica, ReplicaId::from("a"));
    assert_between(start.elapsed(), ms(10), ms(11));
    assert_eq!(invoker.issued_ids(), vec!["a"]);
}

#[tokio::test(start_paused = true)]
async fn hedged_later_attempt_can_win() {
    let invoker = ScriptedInvoker::new(&[
        ("a", Behavior::Reply(ms(100))),
        ("b", Behavior::Reply(ms(5))),
        ("c", Behavior::Reply(ms(50))),
    ]);
    let d = dispatcher(&invoker, &["a", "b", "c"]);

    let start = Instant::now();
    let reply = d.hedged().await.unwrap();

    assert_eq!(reply.replica, ReplicaId::from("b"));
    assert_between(start.elapsed(), ms(21), ms(22));
    assert_eq!(invoker.issued_ids(), vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn hedged_issues_in_order_one_stagger_apart() {
    let invoker = ScriptedInvoker::new(&[
        ("a", Behavior::Reply(ms(100))),
        ("b", Behavior::Reply(ms(100))),
        ("c", Behavior::Reply(ms(30))),
    ]);
    let d = dispatcher(&invoker, &["a", "b", "c"]);

    let start = Instant::now();
    let reply = d.hedged().await.unwrap();

    // c is issued at t=32 and answers at t=62, well before a (t=100) and b (t=116).
    assert_eq!(reply.replica, ReplicaId::from("c"));
    assert_between(start.elapsed(), ms(62), ms(63));
    assert_eq!(invoker.issued_ids(), vec!["a", "b", "c"]);

    let a_at = invoker.issued_at("a").unwrap() - start;
    let b_at = invoker.issued_at("b").unwrap() - start;
    let c_at = invoker.issued_at("c").unwrap() - start;
    assert_between(a_at, ms(0), ms(1));
    assert_between(b_at, ms(16), ms(17));
    assert_between(c_at, ms(32), ms(34));
}

#[tokio::test(start_paused = true)]
async fn hedged_single_replica_waits_without_stagger() {
    let invoker = ScriptedInvoker::new(&[("a", Behavior::Reply(ms(300)))]);
    let d = dispatcher(&invoker, &["a"]);

    let start = Instant::now();
    let reply = d.hedged().await.unwrap();

    assert_eq!(reply.replica, ReplicaId::from("a"));
    assert_between(start.elapsed(), ms(300), ms(301));
    assert_eq!(invoker.issued_ids(), vec!["a"]);
}

#[tokio::test(start_paused = true)]
async fn hedged_failure_moves_to_next_replica_immediately() {
    let invoker = ScriptedInvoker::new(&[
        ("a", Behavior::Fail(ms(2))),
        ("b", Behavior::Reply(ms(5))),
        ("c", Behavior::Reply(ms(5))),
    ]);
    let d = dispatcher(&invoker, &["a", "b", "c"]);

    let start = Instant::now();
    let reply = d.hedged().await.unwrap();

    assert_eq!(reply.replica, ReplicaId::from("b"));
    assert_between(invoker.issued_at("b").unwrap() - start, ms(2), ms(3));
    assert_eq!(invoker.issued_ids(), vec!["a", "b"]);
    assert_eq!(d.replica_stats()[&ReplicaId::from("a")].errors, 1);
}

#[tokio::test(start_paused = true)]
async fn hedged_failure_never_wins_over_pending_attempt() {
    let invoker = ScriptedInvoker::new(&[
        ("a", Behavior::Reply(ms(40))),
        ("b", Behavior::Fail(ms(1))),
    ]);
    let d = dispatcher(&invoker, &["a", "b"]);

    let reply = d.hedged().await.unwrap();

    assert_eq!(reply.replica, ReplicaId::from("a"));
    assert_eq!(invoker.issued_ids(), vec!["a", "b"]);
}

// Scenario C: nothing is reachable, the call fails instead of blocking.
#[tokio::test(start_paused = true)]
async fn all_replicas_failing_yields_aggregate_error() {
    let ids = ["a", "b", "c"];
    let invoker = ScriptedInvoker::new(&[
        ("a", Behavior::Fail(ms(1))),
        ("b", Behavior::Fail(ms(1))),
        ("c", Behavior::Fail(ms(1))),
    ]);
    let d = dispatcher(&invoker, &ids);

    for result in [d.hedged().await, d.fanout().await] {
        match result {
            Err(DispatchError::AllFailed(failures)) => {
                assert_eq!(failures.len(), 3);
                assert!(failures.iter().all(|(_, e)| e.is_connection()));
            }
            other => panic!("expected AllFailed, got {other:?}"),
        }
    }

    match d.simple().await {
        Err(DispatchError::AllFailed(failures)) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, ReplicaId::from("a"));
        }
        other => panic!("expected AllFailed, got {other:?}"),
    }

    // hedged + fanout + simple
    assert_eq!(d.replica_stats()[&ReplicaId::from("a")].errors, 3);
}

#[tokio::test(start_paused = true)]
async fn hedged_aggregate_error_lists_failures_in_issue_order() {
    let invoker = ScriptedInvoker::new(&[
        ("a", Behavior::Fail(ms(3))),
        ("b", Behavior::Fail(ms(3))),
    ]);
    let d = dispatcher(&invoker, &["a", "b"]);

    match d.hedged().await {
        Err(DispatchError::AllFailed(failures)) => {
            let ids: Vec<_> = failures.iter().map(|(id, _)| id.to_string()).collect();
            assert_eq!(ids, vec!["a", "b"]);
        }
        other => panic!("expected AllFailed, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn unresponsive_replicas_hit_overall_deadline() {
    let invoker = ScriptedInvoker::new(&[
        ("a", Behavior::Hang),
        ("b", Behavior::Hang),
        ("c", Behavior::Hang),
    ]);
    let cfg = DispatchConfig::new(endpoints(&["a", "b", "c"]))
        .with_stagger_delay(ms(16))
        .with_overall_timeout(ms(200));
    let d = Dispatcher::with_invoker(cfg, invoker.clone());

    let start = Instant::now();
    let result = d.hedged().await;

    assert!(matches!(result, Err(DispatchError::Timeout(t)) if t == ms(200)));
    assert_between(start.elapsed(), ms(200), ms(201));
    assert_eq!(invoker.issued_ids(), vec!["a", "b", "c"]);

    assert!(matches!(d.fanout().await, Err(DispatchError::Timeout(_))));
    assert!(matches!(d.simple().await, Err(DispatchError::Timeout(_))));
}

#[tokio::test(start_paused = true)]
async fn fanout_issues_everything_at_once_and_earliest_wins() {
    let invoker = ScriptedInvoker::new(&[
        ("a", Behavior::Reply(ms(30))),
        ("b", Behavior::Reply(ms(10))),
        ("c", Behavior::Reply(ms(20))),
    ]);
    let d = dispatcher(&invoker, &["a", "b", "c"]);

    let start = Instant::now();
    let reply = d.fanout().await.unwrap();

    assert_eq!(reply.replica, ReplicaId::from("b"));
    assert_between(start.elapsed(), ms(10), ms(11));
    assert_eq!(invoker.issued_ids(), vec!["a", "b", "c"]);
    for id in ["a", "b", "c"] {
        assert_eq!(invoker.issued_at(id).unwrap(), start);
    }
}

#[tokio::test(start_paused = true)]
async fn fanout_skips_failures() {
    let invoker = ScriptedInvoker::new(&[
        ("a", Behavior::Fail(ms(1))),
        ("b", Behavior::Reply(ms(25))),
        ("c", Behavior::Fail(ms(2))),
    ]);
    let d = dispatcher(&invoker, &["a", "b", "c"]);

    let reply = d.fanout().await.unwrap();

    assert_eq!(reply.replica, ReplicaId::from("b"));
    let stats = d.replica_stats();
    assert_eq!(stats[&ReplicaId::from("a")].errors, 1);
    assert_eq!(stats[&ReplicaId::from("c")].errors, 1);
    assert_eq!(stats[&ReplicaId::from("b")].wins, 1);
}

#[tokio::test(start_paused = true)]
async fn losing_attempts_are_cancelled() {
    let invoker = ScriptedInvoker::new(&[
        ("a", Behavior::Reply(ms(5))),
        ("b", Behavior::Reply(ms(50))),
        ("c", Behavior::Reply(ms(50))),
    ]);
    let d = dispatcher(&invoker, &["a", "b", "c"]);

    d.fanout().await.unwrap();
    tokio::time::sleep(ms(100)).await;

    assert_eq!(invoker.completed(), 1);
}

#[tokio::test(start_paused = true)]
async fn hedged_backup_cancelled_when_primary_wins() {
    let invoker = ScriptedInvoker::new(&[
        ("a", Behavior::Reply(ms(20))),
        ("b", Behavior::Reply(ms(5))),
    ]);
    let d = dispatcher(&invoker, &["a", "b"]);

    d.hedged().await.unwrap();
    tokio::time::sleep(ms(100)).await;

    // b would have finished at t=21
    assert_eq!(invoker.completed(), 1);
}

#[tokio::test(start_paused = true)]
async fn fanout_of_one_matches_simple() {
    let invoker = ScriptedInvoker::new(&[("a", Behavior::Reply(ms(12)))]);
    let d = dispatcher(&invoker, &["a"]);
    let replica = d.replicas()[0].clone();

    let simple = d.dispatch_simple(&replica).await.unwrap();
    let fanout = d.dispatch_fanout(std::slice::from_ref(&replica)).await.unwrap();

    assert_eq!(simple, fanout);
}

#[tokio::test(start_paused = true)]
async fn simple_passes_attempt_through() {
    let invoker = ScriptedInvoker::new(&[("a", Behavior::Reply(ms(7)))]);
    let d = dispatcher(&invoker, &["a", "b"]);
    let replica = d.replicas()[0].clone();

    let standalone = invoker.invoke(replica.clone()).await.unwrap();
    let simple = d.dispatch_simple(&replica).await.unwrap();

    assert_eq!(simple, standalone);
    assert_eq!(simple.payload_text(), "Healthy");
    assert_eq!(invoker.issued_ids(), vec!["a", "a"]);
}

#[tokio::test(start_paused = true)]
async fn explicit_replica_lists_override_config() {
    let invoker = ScriptedInvoker::new(&[
        ("a", Behavior::Reply(ms(100))),
        ("z", Behavior::Reply(ms(1))),
    ]);
    let d = dispatcher(&invoker, &["a"]);

    let reply = d
        .dispatch_hedged(&endpoints(&["a", "z"]), ms(4))
        .await
        .unwrap();

    assert_eq!(reply.replica, ReplicaId::from("z"));
    assert_between(invoker.issued_at("z").unwrap() - invoker.issued_at("a").unwrap(), ms(4), ms(5));
}

#[tokio::test(start_paused = true)]
async fn empty_replica_set_is_rejected() {
    let invoker = ScriptedInvoker::default();
    let d = dispatcher(&invoker, &[]);

    assert!(matches!(d.simple().await, Err(DispatchError::NoReplicas)));
    assert!(matches!(d.fanout().await, Err(DispatchError::NoReplicas)));
    assert!(matches!(d.hedged().await, Err(DispatchError::NoReplicas)));
    assert!(invoker.issued_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn concurrent_calls_are_independent() {
    let invoker = ScriptedInvoker::new(&[
        ("a", Behavior::Reply(ms(20))),
        ("b", Behavior::Reply(ms(5))),
    ]);
    let d = dispatcher(&invoker, &["a", "b"]);

    let (hedged, fanout) = tokio::join!(d.hedged(), d.fanout());

    assert_eq!(hedged.unwrap().replica, ReplicaId::from("a"));
    assert_eq!(fanout.unwrap().replica, ReplicaId::from("b"));

    let stats = d.replica_stats();
    assert_eq!(stats[&ReplicaId::from("a")].wins, 1);
    assert_eq!(stats[&ReplicaId::from("b")].wins, 1);
}

#[tokio::test(start_paused = true)]
async fn reset_stats_clears_counters() {
    let invoker = ScriptedInvoker::new(&[("a", Behavior::Reply(ms(3)))]);
    let d = dispatcher(&invoker, &["a"]);

    d.simple().await.unwrap();
    assert_eq!(d.replica_stats()[&ReplicaId::from("a")].wins, 1);
    assert!((d.replica_stats()[&ReplicaId::from("a")].avg_latency_ms - 3.0).abs() < 1e-9);

    d.reset_stats();
    let stats = d.replica_stats();
    assert_eq!(stats[&ReplicaId::from("a")].wins, 0);
    assert_eq!(stats[&ReplicaId::from("a")].avg_latency_ms, 0.0);
}
