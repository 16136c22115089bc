//! Asynchronous (streaming) session behavior: callback delivery order,
//! cooperative cancellation, session exclusivity, and helper reuse.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use perfpoll_core::config::{PollConfig, Termination};
use perfpoll_core::types::Snapshot;
use perfpoll_core::value::CounterValue;
use perfpoll_engine::{PollError, Poller};
use perfpoll_provider::sim::{SimClass, SimEnumerator, SimLocator, SimRowSpec};

const CLASS: &str = "Win32_PerfRawData_Tcpip_NetworkInterface";

type Collected = Arc<Mutex<Vec<Snapshot>>>;

fn locator_with_rows() -> (SimLocator, SimClass) {
    let locator = SimLocator::new();
    let class = locator.add_class(CLASS);
    class.push_table(vec![SimRowSpec::new()
        .text("Name", "Ethernet")
        .uint64("BytesTotalPersec", 1000)]);
    (locator, class)
}

fn connect(locator: &SimLocator, termination: Termination) -> Poller<SimEnumerator> {
    let config = PollConfig::new(CLASS).with_termination(termination);
    Poller::connect(locator, config).expect("connect")
}

fn collector() -> (Collected, impl FnMut(&PollConfig, &Snapshot) + Send + 'static) {
    let collected: Collected = Arc::new(Mutex::new(Vec::new()));
    let sink = collected.clone();
    let callback = move |_config: &PollConfig, snapshot: &Snapshot| {
        sink.lock().expect("collector lock").push(snapshot.clone());
    };
    (collected, callback)
}

async fn wait_until_idle(poller: &mut Poller<SimEnumerator>) {
    while poller.is_running() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn streaming_session_delivers_snapshots_in_cycle_order() {
    let (locator, _class) = locator_with_rows();
    let mut poller = connect(&locator, Termination::by_fires(3));
    let bytes = poller.bind("BytesTotalPersec");

    let (collected, callback) = collector();
    poller.query_callback(callback).await.expect("spawn");
    wait_until_idle(&mut poller).await;

    let snapshots = collected.lock().expect("lock");
    assert_eq!(snapshots.len(), 3);
    assert!(snapshots[0].is_first());
    assert_eq!(snapshots[1].previous, snapshots[0].current);
    assert_eq!(snapshots[2].previous, snapshots[1].current);
    assert_eq!(
        snapshots[2].column(bytes).expect("column")[0],
        CounterValue::Uint64(1000)
    );
}

#[tokio::test(start_paused = true)]
async fn unbounded_streaming_runs_until_cancelled() {
    let (locator, _class) = locator_with_rows();
    let mut poller = connect(&locator, Termination::unbounded());
    poller.bind("BytesTotalPersec");

    let (collected, callback) = collector();
    poller.query_callback(callback).await.expect("spawn");

    // Let a few cycles through before cancelling.
    while collected.lock().expect("lock").len() < 3 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    poller.cancel().await.expect("cancel");
    assert!(!poller.is_running());

    let after_cancel = collected.lock().expect("lock").len();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(
        collected.lock().expect("lock").len(),
        after_cancel,
        "no cycles may be emitted after cancel acknowledges"
    );

    // Idempotent after acknowledgment.
    poller.cancel().await.expect("cancel again");
}

#[tokio::test(start_paused = true)]
async fn starting_while_running_fails_without_disturbing_the_session() {
    let (locator, _class) = locator_with_rows();
    let mut poller = connect(&locator, Termination::unbounded());
    poller.bind("BytesTotalPersec");

    let (collected, callback) = collector();
    poller.query_callback(callback).await.expect("spawn");

    let err = poller.query().await.unwrap_err();
    assert!(matches!(err, PollError::SessionActive), "got: {err}");
    let (_, second_callback) = collector();
    let err = poller.query_callback(second_callback).await.unwrap_err();
    assert!(matches!(err, PollError::SessionActive), "got: {err}");

    // The original session is still alive and still emitting.
    assert!(poller.is_running());
    let seen = collected.lock().expect("lock").len();
    while collected.lock().expect("lock").len() <= seen {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    poller.cancel().await.expect("cancel");
}

#[tokio::test(start_paused = true)]
async fn helper_is_reusable_after_cancel() {
    let (locator, _class) = locator_with_rows();
    let mut poller = connect(&locator, Termination::unbounded());
    let bytes = poller.bind("BytesTotalPersec");

    let (collected, callback) = collector();
    poller.query_callback(callback).await.expect("spawn");
    while collected.lock().expect("lock").is_empty() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    poller.cancel().await.expect("cancel");

    // The helper's termination is still unbounded, so a synchronous query
    // on it stays rejected even though the helper itself is reusable.
    let err = poller.query().await.unwrap_err();
    assert!(matches!(
        err,
        PollError::Config(perfpoll_core::error::ConfigError::UnboundedSyncQuery)
    ));

    // A fresh streaming session on the same helper works.
    let (collected, callback) = collector();
    poller.query_callback(callback).await.expect("respawn");
    while collected.lock().expect("lock").len() < 2 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    poller.cancel().await.expect("cancel");
    let snapshots = collected.lock().expect("lock");
    assert!(snapshots[0].column(bytes).is_some());
}

#[tokio::test(start_paused = true)]
async fn naturally_finished_session_is_reaped_on_next_start() {
    let (locator, _class) = locator_with_rows();
    let mut poller = connect(&locator, Termination::by_fires(1));
    let bytes = poller.bind("BytesTotalPersec");

    let (collected, callback) = collector();
    poller.query_callback(callback).await.expect("spawn");
    wait_until_idle(&mut poller).await;
    assert_eq!(collected.lock().expect("lock").len(), 1);

    // No cancel call: the next start reclaims the driver by itself.
    let snapshots = poller.query().await.expect("query");
    assert_eq!(snapshots.len(), 1);
    assert!(snapshots[0].column(bytes).is_some());
    // Each session starts its previous/current chain fresh.
    assert!(snapshots[0].is_first());
}

#[tokio::test(start_paused = true)]
async fn cancelled_session_emits_no_partial_cycle() {
    let (locator, class) = locator_with_rows();
    let mut poller = connect(&locator, Termination::unbounded());
    poller.bind("BytesTotalPersec");

    let (collected, callback) = collector();
    poller.query_callback(callback).await.expect("spawn");
    while collected.lock().expect("lock").is_empty() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    poller.cancel().await.expect("cancel");

    // Every emitted snapshot is a complete cycle and every row released.
    assert_eq!(class.live_rows(), 0);
    for snapshot in collected.lock().expect("lock").iter() {
        assert!(!snapshot.current.is_empty());
    }
}
