//! Periodic scheduling behavior observed through the public API.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use hostvisor::{
    Controller, HostHandler, PeriodicTask, PeriodicTaskHandler, Request, RunMode, TaskOp,
};

use common::{wait_until, MockConnector, MockState, Recorder};

const WAIT: Duration = Duration::from_secs(3);

/// Controller plus a registered recorder, with every interval raised to
/// `interval_secs` so tests control the cadence themselves.
async fn polling_fixture(interval_secs: u32) -> (Arc<Controller>, Arc<MockState>, Arc<Recorder>) {
    let state = MockState::new();
    let controller = Controller::new(MockConnector(Arc::clone(&state)));
    let recorder = Recorder::new();
    controller.register_host_handler(recorder.clone() as Arc<dyn HostHandler>);
    controller.register_periodic_task_handler(recorder.clone() as Arc<dyn PeriodicTaskHandler>);

    for task in PeriodicTask::ALL {
        controller
            .set_periodic_task_interval(task, interval_secs)
            .unwrap();
    }
    controller.add_host("h", "127.0.0.1", 31416).await.unwrap();
    (controller, state, recorder)
}

#[tokio::test(flavor = "multi_thread")]
async fn hosts_are_not_polled_until_scheduling_is_enabled() {
    let (controller, state, _recorder) = polling_fixture(1).await;

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert!(state.requests().is_empty());

    controller.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn enabled_host_is_polled_and_stops_after_removal() {
    let (controller, _state, recorder) = polling_fixture(1).await;

    controller.schedule_periodic_tasks("h", true).await.unwrap();
    assert!(wait_until(WAIT, || recorder.polls_of(PeriodicTask::Tasks) >= 1).await);

    controller.remove_host("h").await.unwrap();
    assert_eq!(recorder.count_event("removed:h"), 1);

    let seen = recorder.polls.lock().unwrap().len();
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(seen, recorder.polls.lock().unwrap().len());

    controller.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn first_poll_fires_immediately_even_with_long_intervals() {
    let (controller, _state, recorder) = polling_fixture(3600).await;

    controller.schedule_periodic_tasks("h", true).await.unwrap();
    for task in PeriodicTask::ALL {
        assert!(
            wait_until(WAIT, || recorder.polls_of(task) == 1).await,
            "missing initial {} poll",
            task.as_label()
        );
    }

    controller.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn nudge_forces_prompt_reexecution() {
    let (controller, _state, recorder) = polling_fixture(3600).await;

    controller.schedule_periodic_tasks("h", true).await.unwrap();
    assert!(wait_until(WAIT, || recorder.polls_of(PeriodicTask::ProjectStatus) == 1).await);

    controller
        .reschedule_now("h", PeriodicTask::ProjectStatus)
        .await
        .unwrap();
    assert!(
        wait_until(Duration::from_secs(1), || {
            recorder.polls_of(PeriodicTask::ProjectStatus) >= 2
        })
        .await,
        "nudged poll did not fire within a second"
    );

    controller.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn task_op_refreshes_the_task_list() {
    let (controller, _state, recorder) = polling_fixture(3600).await;

    controller.schedule_periodic_tasks("h", true).await.unwrap();
    assert!(wait_until(WAIT, || recorder.polls_of(PeriodicTask::Tasks) == 1).await);

    let pending = controller
        .task_op("h", TaskOp::Abort, "http://u/", "wu1")
        .await
        .unwrap();
    assert!(pending.await.unwrap());

    assert!(
        wait_until(Duration::from_secs(1), || {
            recorder.polls_of(PeriodicTask::Tasks) >= 2
        })
        .await,
        "task op did not trigger a task refresh"
    );

    controller.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn message_polls_echo_the_last_seen_seqno() {
    let (controller, state, _recorder) = polling_fixture(3600).await;
    controller
        .set_periodic_task_interval(PeriodicTask::Messages, 1)
        .unwrap();
    state.messages_seqno.store(42, Ordering::SeqCst);

    controller.schedule_periodic_tasks("h", true).await.unwrap();

    let seqno_requested = |state: &MockState, wanted: u64| {
        state.count_requests(|r| matches!(r, Request::Messages { seqno } if *seqno == wanted)) >= 1
    };

    // first poll announces nothing seen yet, later polls echo 42
    assert!(wait_until(WAIT, || seqno_requested(&state, 0)).await);
    assert!(wait_until(WAIT, || seqno_requested(&state, 42)).await);

    // the daemon moves on; the next request follows
    state.messages_seqno.store(57, Ordering::SeqCst);
    assert!(wait_until(WAIT, || seqno_requested(&state, 57)).await);

    controller.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn at_most_one_poll_per_kind_is_in_flight() {
    let (controller, state, _recorder) = polling_fixture(1).await;
    state.block_execute.store(true, Ordering::SeqCst);

    controller.schedule_periodic_tasks("h", true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1200)).await;

    // the first poll blocks the serial worker forever; with the pending
    // flags held, the scheduler must not have queued any kind twice
    let requests = state.requests();
    assert_eq!(requests.len(), 1, "only the in-flight poll may execute");

    tokio::time::timeout(WAIT, controller.shutdown())
        .await
        .expect("shutdown must cancel the blocked poll");
}

#[tokio::test(flavor = "multi_thread")]
async fn active_only_flag_reaches_task_polls() {
    let (controller, state, recorder) = polling_fixture(3600).await;

    controller.schedule_periodic_tasks("h", true).await.unwrap();
    assert!(wait_until(WAIT, || recorder.polls_of(PeriodicTask::Tasks) == 1).await);
    assert_eq!(
        state.count_requests(|r| matches!(r, Request::Tasks { active_only: false })),
        1
    );

    controller.active_only_tasks("h", true).await.unwrap();
    assert!(
        wait_until(Duration::from_secs(1), || {
            state.count_requests(|r| matches!(r, Request::Tasks { active_only: true })) >= 1
        })
        .await,
        "flag change did not refresh the task list"
    );

    controller.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn poll_rate_roughly_matches_the_interval() {
    let (controller, _state, recorder) = polling_fixture(3600).await;
    controller
        .set_periodic_task_interval(PeriodicTask::CcStatus, 1)
        .unwrap();

    controller.schedule_periodic_tasks("h", true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    controller.shutdown().await;

    let polls = recorder.polls_of(PeriodicTask::CcStatus);
    assert!(
        (2..=4).contains(&polls),
        "expected about one poll per second, saw {polls}"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_polls_reach_host_handlers_and_recover() {
    let (controller, state, recorder) = polling_fixture(1).await;
    *state.fail_kind.lock().unwrap() = Some(hostvisor::RpcErrorKind::Client);

    controller.schedule_periodic_tasks("h", true).await.unwrap();
    assert!(
        wait_until(WAIT, || {
            recorder.count_event("error:h:rpc_client_error") >= 1
        })
        .await
    );

    // retries resume at the next interval once the daemon recovers
    *state.fail_kind.lock().unwrap() = None;
    assert!(wait_until(WAIT, || recorder.polls_of(PeriodicTask::Tasks) >= 1).await);

    controller.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn commands_and_polls_share_the_serial_queue() {
    let (controller, state, recorder) = polling_fixture(1).await;

    controller.schedule_periodic_tasks("h", true).await.unwrap();
    assert!(wait_until(WAIT, || !state.requests().is_empty()).await);

    let pending = controller.run_mode("h", RunMode::Never).await.unwrap();
    assert!(pending.await.unwrap());
    assert!(
        state.count_requests(|r| matches!(r, Request::SetRunMode { .. })) >= 1,
        "command executed on the shared queue"
    );
    assert!(recorder.polls.lock().unwrap().len() >= 1);

    controller.shutdown().await;
}
