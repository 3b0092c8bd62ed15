//! End-to-end runs of groups on in-process workers

use async_trait::async_trait;
use cohort_config::{ComputeDurations, ExecutionConfig};
use cohort_core::{CancelReason, FunctionKind, Outcome, TaskIndex, TaskState, UnavailableReason};
use cohort_execution::{
    ExecutionError, InProcessLauncher, LaunchRequest, Lifecycle, ResultSender, RunOutcome,
    RunReport, Session, WorkerHandle, WorkerLauncher,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_test::assert_ok;

const POLL: Duration = Duration::from_millis(50);

fn config(square_ms: u64, add_ms: u64, subtract_ms: u64) -> ExecutionConfig {
    ExecutionConfig {
        poll_interval: POLL,
        compute_durations: ComputeDurations {
            square: Duration::from_millis(square_ms),
            add_constant: Duration::from_millis(add_ms),
            subtract_constant: Duration::from_millis(subtract_ms),
        },
        ..ExecutionConfig::default()
    }
}

fn outcomes(session: &Session) -> Vec<Outcome> {
    session
        .summarize()
        .unwrap()
        .into_iter()
        .map(|entry| entry.outcome)
        .collect()
}

async fn run_to_report(session: &mut Session) -> RunReport {
    match assert_ok!(session.run().await) {
        RunOutcome::Finished(report) => report,
        other => panic!("group did not run: {:?}", other),
    }
}

fn add_all_kinds(session: &mut Session) {
    for kind in FunctionKind::all() {
        session.add_task(*kind, None).unwrap();
    }
}

/// Fails to start one chosen task, runs the rest in-process
struct FailingLauncher {
    fail: TaskIndex,
}

#[async_trait]
impl WorkerLauncher for FailingLauncher {
    async fn launch(
        &self,
        request: LaunchRequest,
        result_tx: ResultSender,
    ) -> Result<Box<dyn WorkerHandle>, ExecutionError> {
        if request.index == self.fail {
            return Err(ExecutionError::LaunchFailed("no capacity".to_string()));
        }
        InProcessLauncher::new().launch(request, result_tx).await
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}

/// One chosen worker dies after `after` without delivering anything
struct CrashingLauncher {
    crash: TaskIndex,
    after: Duration,
}

struct CrashingWorker {
    join: Option<JoinHandle<()>>,
}

#[async_trait]
impl WorkerHandle for CrashingWorker {
    fn id(&self) -> &str {
        "crashing"
    }

    fn pid(&self) -> Option<u32> {
        None
    }

    async fn kill(&mut self) -> Result<(), ExecutionError> {
        if let Some(join) = &self.join {
            join.abort();
        }
        Ok(())
    }

    async fn reap(&mut self) -> Result<(), ExecutionError> {
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
        Ok(())
    }
}

#[async_trait]
impl WorkerLauncher for CrashingLauncher {
    async fn launch(
        &self,
        request: LaunchRequest,
        result_tx: ResultSender,
    ) -> Result<Box<dyn WorkerHandle>, ExecutionError> {
        if request.index != self.crash {
            return InProcessLauncher::new().launch(request, result_tx).await;
        }

        let after = self.after;
        let join = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            drop(result_tx);
        });
        Ok(Box::new(CrashingWorker { join: Some(join) }))
    }

    fn backend(&self) -> &'static str {
        "crashing"
    }
}

/// Takes `delay` to start one chosen task and records when workers are killed
struct SlowStartLauncher {
    slow: TaskIndex,
    delay: Duration,
    started: Instant,
    kills: Arc<Mutex<Vec<(TaskIndex, Duration)>>>,
}

struct RecordingWorker {
    index: TaskIndex,
    inner: Box<dyn WorkerHandle>,
    started: Instant,
    kills: Arc<Mutex<Vec<(TaskIndex, Duration)>>>,
}

#[async_trait]
impl WorkerHandle for RecordingWorker {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn pid(&self) -> Option<u32> {
        self.inner.pid()
    }

    async fn kill(&mut self) -> Result<(), ExecutionError> {
        self.kills
            .lock()
            .unwrap()
            .push((self.index, self.started.elapsed()));
        self.inner.kill().await
    }

    async fn reap(&mut self) -> Result<(), ExecutionError> {
        self.inner.reap().await
    }
}

#[async_trait]
impl WorkerLauncher for SlowStartLauncher {
    async fn launch(
        &self,
        request: LaunchRequest,
        result_tx: ResultSender,
    ) -> Result<Box<dyn WorkerHandle>, ExecutionError> {
        if request.index == self.slow {
            tokio::time::sleep(self.delay).await;
        }
        let index = request.index;
        let inner = InProcessLauncher::new().launch(request, result_tx).await?;
        Ok(Box::new(RecordingWorker {
            index,
            inner,
            started: self.started,
            kills: self.kills.clone(),
        }))
    }

    fn backend(&self) -> &'static str {
        "slow_start"
    }
}

#[tokio::test(start_paused = true)]
async fn test_all_kinds_complete() {
    let mut session = Session::new(&config(300, 500, 700)).unwrap();
    session.declare_group(4, None).unwrap();
    add_all_kinds(&mut session);

    let report = run_to_report(&mut session).await;

    assert_eq!(
        outcomes(&session),
        vec![
            Outcome::Available(16),
            Outcome::Available(14),
            Outcome::Available(-1)
        ]
    );
    assert_eq!(report.available, 3);
    assert_eq!(report.cancelled, 0);
    assert!(!report.group_timed_out);
    assert_eq!(report.open_channels, 0);
    assert_eq!(session.group().unwrap().lifecycle(), Lifecycle::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_completion_order_does_not_matter() {
    // Last task finishes first
    let mut session = Session::new(&config(700, 500, 100)).unwrap();
    session.declare_group(-3, None).unwrap();
    add_all_kinds(&mut session);
    session.add_task(FunctionKind::Square, None).unwrap();

    run_to_report(&mut session).await;

    assert_eq!(
        outcomes(&session),
        vec![
            Outcome::Available(9),
            Outcome::Available(7),
            Outcome::Available(-8),
            Outcome::Available(9)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_task_timeout_cancels_only_that_task() {
    let mut session = Session::new(&config(5_000, 200, 300)).unwrap();
    session.declare_group(4, None).unwrap();
    session
        .add_task(FunctionKind::Square, Some(Duration::from_secs(1)))
        .unwrap();
    session.add_task(FunctionKind::AddConstant, None).unwrap();
    session
        .add_task(FunctionKind::SubtractConstant, Some(Duration::from_secs(2)))
        .unwrap();

    let report = run_to_report(&mut session).await;

    assert_eq!(
        session.group().unwrap().state(TaskIndex(1)),
        Some(TaskState::Cancelled(CancelReason::TaskTimeout))
    );
    assert_eq!(outcomes(&session)[1], Outcome::Available(14));
    assert_eq!(outcomes(&session)[2], Outcome::Available(-1));
    assert_eq!(report.available, 2);
    assert_eq!(report.cancelled, 1);
    assert!(report.elapsed < Duration::from_secs(2));
    assert_eq!(report.open_channels, 0);
}

#[tokio::test(start_paused = true)]
async fn test_group_timeout_returns_promptly() {
    let mut session = Session::new(&config(10_000, 10_000, 10_000)).unwrap();
    session
        .declare_group(4, Some(Duration::from_secs(2)))
        .unwrap();
    add_all_kinds(&mut session);

    let report = run_to_report(&mut session).await;

    assert!(report.group_timed_out);
    assert!(report.elapsed >= Duration::from_secs(2));
    assert!(report.elapsed < Duration::from_secs(2) + POLL * 2);
    assert_eq!(report.cancelled, 3);
    assert_eq!(report.open_channels, 0);
    for outcome in outcomes(&session) {
        assert_eq!(outcome.cancel_reason(), Some(CancelReason::GroupTimeout));
    }
}

#[tokio::test(start_paused = true)]
async fn test_group_timeout_keeps_finished_values() {
    let mut session = Session::new(&config(100, 10_000, 10_000)).unwrap();
    session
        .declare_group(5, Some(Duration::from_secs(1)))
        .unwrap();
    add_all_kinds(&mut session);

    let report = run_to_report(&mut session).await;

    assert!(report.group_timed_out);
    let outcomes = outcomes(&session);
    assert_eq!(outcomes[0], Outcome::Available(25));
    assert_eq!(outcomes[1].cancel_reason(), Some(CancelReason::GroupTimeout));
    assert_eq!(outcomes[2].cancel_reason(), Some(CancelReason::GroupTimeout));
}

#[tokio::test(start_paused = true)]
async fn test_group_deadline_longer_than_work() {
    let mut session = Session::new(&config(100, 200, 300)).unwrap();
    session
        .declare_group(2, Some(Duration::from_secs(5)))
        .unwrap();
    add_all_kinds(&mut session);

    let report = run_to_report(&mut session).await;
    assert!(!report.group_timed_out);
    assert_eq!(report.available, 3);

    // The disarmed group timer must not fire later
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(outcomes(&session)[0], Outcome::Available(4));
}

#[tokio::test(start_paused = true)]
async fn test_each_task_ends_exactly_once() {
    // Deadlines race the computations they guard
    let mut session = Session::new(&config(100, 100, 100)).unwrap();
    session.declare_group(1, None).unwrap();
    for _ in 0..12 {
        for kind in FunctionKind::all() {
            session
                .add_task(*kind, Some(Duration::from_millis(100)))
                .unwrap();
        }
    }

    let report = run_to_report(&mut session).await;

    assert_eq!(report.available + report.cancelled, 36);
    for outcome in outcomes(&session) {
        match outcome {
            Outcome::Available(_) => {}
            other => assert_eq!(other.cancel_reason(), Some(CancelReason::TaskTimeout)),
        }
    }
    assert_eq!(report.open_channels, 0);
}

#[tokio::test(start_paused = true)]
async fn test_second_run_is_a_no_op() {
    let mut session = Session::new(&config(10, 10, 10)).unwrap();
    session.declare_group(4, None).unwrap();
    add_all_kinds(&mut session);

    run_to_report(&mut session).await;
    let before = outcomes(&session);

    assert_eq!(
        assert_ok!(session.run().await),
        RunOutcome::AlreadyCompleted
    );
    assert_eq!(outcomes(&session), before);
    assert!(matches!(
        session.add_task(FunctionKind::Square, None),
        Err(ExecutionError::GroupCompleted(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_empty_group_stays_runnable() {
    let mut session = Session::new(&config(10, 10, 10)).unwrap();
    session.declare_group(4, None).unwrap();

    assert_eq!(assert_ok!(session.run().await), RunOutcome::NoTasks);
    assert_eq!(session.group().unwrap().lifecycle(), Lifecycle::NotStarted);

    session.add_task(FunctionKind::Square, None).unwrap();
    run_to_report(&mut session).await;
    assert_eq!(outcomes(&session), vec![Outcome::Available(16)]);
}

#[tokio::test(start_paused = true)]
async fn test_new_group_replaces_completed_one() {
    let mut session = Session::new(&config(10, 10, 10)).unwrap();
    session.declare_group(4, None).unwrap();
    add_all_kinds(&mut session);
    run_to_report(&mut session).await;

    let id = session.declare_group(10, None).unwrap();
    assert_eq!(id.0, 1);
    session.add_task(FunctionKind::AddConstant, None).unwrap();

    let report = run_to_report(&mut session).await;
    assert_eq!(report.group, id);
    assert_eq!(outcomes(&session), vec![Outcome::Available(20)]);
}

#[tokio::test(start_paused = true)]
async fn test_launch_failure_spares_the_others() {
    let launcher = Arc::new(FailingLauncher { fail: TaskIndex(2) });
    let mut session = Session::with_launcher(launcher, &config(100, 100, 100));
    session.declare_group(4, None).unwrap();
    add_all_kinds(&mut session);

    let report = run_to_report(&mut session).await;

    let outcomes = outcomes(&session);
    assert_eq!(outcomes[0], Outcome::Available(16));
    assert!(outcomes[1].is_launch_failure());
    assert_eq!(outcomes[2], Outcome::Available(-1));
    assert_eq!(report.open_channels, 0);
}

#[tokio::test(start_paused = true)]
async fn test_lost_channel_cancels_only_its_task() {
    let launcher = Arc::new(CrashingLauncher {
        crash: TaskIndex(2),
        after: Duration::from_millis(200),
    });
    let mut session = Session::with_launcher(launcher, &config(100, 100, 1_000));
    session.declare_group(4, None).unwrap();
    add_all_kinds(&mut session);

    let report = run_to_report(&mut session).await;

    assert!(report.infrastructure_error.is_none());
    let outcomes = outcomes(&session);
    assert_eq!(outcomes[0], Outcome::Available(16));
    assert_eq!(outcomes[1].cancel_reason(), Some(CancelReason::WorkerFailure));
    assert_eq!(outcomes[2], Outcome::Available(-1));
    assert_eq!(report.available, 2);
    assert_eq!(report.cancelled, 1);
    assert_eq!(report.open_channels, 0);
    assert_eq!(session.group().unwrap().lifecycle(), Lifecycle::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_worker_dying_at_once_spares_the_others() {
    let launcher = Arc::new(CrashingLauncher {
        crash: TaskIndex(1),
        after: Duration::ZERO,
    });
    let mut session = Session::with_launcher(launcher, &config(100, 100, 100));
    session.declare_group(4, None).unwrap();
    add_all_kinds(&mut session);

    run_to_report(&mut session).await;

    assert_eq!(
        outcomes(&session),
        vec![
            Outcome::Unavailable(UnavailableReason::Cancelled(CancelReason::WorkerFailure)),
            Outcome::Available(14),
            Outcome::Available(-1)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_run_can_be_retried() {
    let mut session = Session::new(&config(10_000, 10_000, 10_000)).unwrap();
    session.declare_group(4, None).unwrap();
    add_all_kinds(&mut session);

    let abandoned = tokio::time::timeout(Duration::from_secs(1), session.run()).await;
    assert!(abandoned.is_err());
    assert_eq!(session.group().unwrap().lifecycle(), Lifecycle::NotStarted);
    assert_eq!(
        outcomes(&session),
        vec![Outcome::Unavailable(UnavailableReason::NotYetRun); 3]
    );

    let report = run_to_report(&mut session).await;
    assert_eq!(report.available, 3);
    assert_eq!(outcomes(&session)[0], Outcome::Available(16));
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_run_does_not_block_new_groups() {
    let mut session = Session::new(&config(10_000, 10_000, 10_000)).unwrap();
    session.declare_group(4, None).unwrap();
    add_all_kinds(&mut session);

    assert!(tokio::time::timeout(Duration::from_millis(500), session.run())
        .await
        .is_err());

    let id = session.declare_group(6, None).unwrap();
    assert_eq!(id.0, 1);
    assert_eq!(session.group().unwrap().lifecycle(), Lifecycle::NotStarted);
}

#[tokio::test(start_paused = true)]
async fn test_slow_launch_does_not_delay_other_timers() {
    let kills = Arc::new(Mutex::new(Vec::new()));
    let launcher = Arc::new(SlowStartLauncher {
        slow: TaskIndex(2),
        delay: Duration::from_secs(1),
        started: Instant::now(),
        kills: kills.clone(),
    });
    let mut session = Session::with_launcher(launcher, &config(5_000, 100, 100));
    session.declare_group(4, None).unwrap();
    session
        .add_task(FunctionKind::Square, Some(Duration::from_millis(100)))
        .unwrap();
    session.add_task(FunctionKind::AddConstant, None).unwrap();

    run_to_report(&mut session).await;

    let outcomes = outcomes(&session);
    assert_eq!(outcomes[0].cancel_reason(), Some(CancelReason::TaskTimeout));
    assert_eq!(outcomes[1], Outcome::Available(14));

    // Task 1 is killed on time while task 2 is still starting
    let kills = kills.lock().unwrap();
    assert_eq!(kills.len(), 1);
    assert_eq!(kills[0].0, TaskIndex(1));
    assert!(kills[0].1 < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_group_timeout_while_a_task_is_starting() {
    let launcher = Arc::new(SlowStartLauncher {
        slow: TaskIndex(2),
        delay: Duration::from_secs(1),
        started: Instant::now(),
        kills: Arc::new(Mutex::new(Vec::new())),
    });
    let mut session = Session::with_launcher(launcher, &config(5_000, 100, 100));
    session
        .declare_group(4, Some(Duration::from_millis(500)))
        .unwrap();
    add_all_kinds(&mut session);

    let report = run_to_report(&mut session).await;

    assert!(report.group_timed_out);
    assert_eq!(report.cancelled, 3);
    assert_eq!(report.open_channels, 0);
    for outcome in outcomes(&session) {
        assert_eq!(outcome.cancel_reason(), Some(CancelReason::GroupTimeout));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_task_ends_exactly_once_across_threads() {
    let config = ExecutionConfig {
        poll_interval: Duration::from_millis(2),
        compute_durations: ComputeDurations {
            square: Duration::from_millis(20),
            add_constant: Duration::from_millis(20),
            subtract_constant: Duration::from_millis(20),
        },
        ..ExecutionConfig::default()
    };

    for round in 0..10 {
        let mut session = Session::new(&config).unwrap();
        session.declare_group(round, None).unwrap();
        for _ in 0..10 {
            for kind in FunctionKind::all() {
                session
                    .add_task(*kind, Some(Duration::from_millis(20)))
                    .unwrap();
            }
        }

        let report = run_to_report(&mut session).await;

        assert_eq!(report.available + report.cancelled, 30);
        assert_eq!(report.open_channels, 0);
        for entry in session.summarize().unwrap() {
            match entry.outcome {
                Outcome::Available(value) => assert_eq!(value, entry.kind.apply(round)),
                other => assert_eq!(other.cancel_reason(), Some(CancelReason::TaskTimeout)),
            }
        }
    }
}
